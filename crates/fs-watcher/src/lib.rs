//!
//! # File Watcher
//!
//! Watches a dynamically changing set of paths and path patterns on top of a native
//! filesystem event stream.
//!
//! - Directories are registered with the native watcher once, no matter how many
//!   subscriptions need them, and released when the last one goes away;
//! - Path subscriptions receive create, modify and delete callbacks for one exact path;
//! - Matcher subscriptions are re-discovered by walking the root on a fixed interval, so
//!   paths that appear later are picked up and paths that vanish are released;
//! - Paths in the shared [`ExcludeSet`] only reach callbacks that opted into seeing them;
//! - The whole process can be suspended, dropping every event until it is resumed.
//!
//! ## Basic example
//!
//! ```no_run
//! use wsa_fs_watcher::{Callbacks, FileWatcherConfig, FileWatcherManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wsa_fs_watcher::WatcherError> {
//!     let manager = FileWatcherManager::new(FileWatcherConfig::new("/projects"))?;
//!
//!     let id = manager.register_by_path(
//!         "/projects/demo/README.md",
//!         Callbacks::new().on_modify(|path| println!("{path} changed")),
//!     );
//!
//!     manager.unregister_by_path(id);
//!     manager.shutdown().await;
//!
//!     Ok(())
//! }
//! ```

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

mod backend;
mod callback;
mod config;
mod error;
mod event;
mod exclude;
mod manager;
mod matcher;
mod path_table;
mod pattern_table;
mod platform;
mod registry;

pub use backend::{EventSink, NotifyBackend, WatchBackend};
pub use callback::{Callback, Callbacks};
pub use config::FileWatcherConfig;
pub use error::WatcherError;
pub use event::WatchEventKind;
pub use exclude::ExcludeSet;
pub use manager::FileWatcherManager;
pub use matcher::{GlobMatcher, PathMatcher};
pub use path_table::PathSubscriptionTable;
pub use pattern_table::PatternSubscriptionTable;
pub use platform::Sensitivity;
pub use registry::{EventDispatcher, WatchGeneration, WatchKeyRegistry};

use std::fmt;

/// Opaque handle identifying one subscriber's callback triple inside the table that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
	#[must_use]
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for RegistrationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Monotonic source of [`RegistrationId`]s, one per table
#[derive(Debug, Default)]
pub(crate) struct RegistrationIds(std::sync::atomic::AtomicU64);

impl RegistrationIds {
	pub(crate) fn next(&self) -> RegistrationId {
		RegistrationId(
			self.0
				.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
				.wrapping_add(1),
		)
	}
}
