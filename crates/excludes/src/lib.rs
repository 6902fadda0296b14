//!
//! # Watch Excludes
//!
//! Keeps the file watcher's exclude set in sync with per-project ignore files
//! (`<project>/.che/fileWatcherExcludes` by default), tells subscribed remote endpoints about
//! every change and lets them edit the ignore files through JSON-RPC style requests.

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;
mod error;
pub mod ignore_file;
mod notifier;
mod project;
mod rpc;
mod tracker;

pub use config::ExcludesConfig;
pub use error::{ExcludesError, JsonRpcError};
pub use notifier::{methods, EndpointId, RemoteTransmitter};
pub use project::{FsProjectRegistry, Project, ProjectRegistry};
pub use rpc::ExcludesRequestHandler;
pub use tracker::IgnoreRuleTracker;
