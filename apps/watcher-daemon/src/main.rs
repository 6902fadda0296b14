use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{
	io::{self, AsyncBufReadExt, BufReader},
	signal,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wsa_fs_watcher::{Callbacks, FileWatcherManager, GlobMatcher, PathMatcher};
use wsa_watch_excludes::{
	EndpointId, ExcludesRequestHandler, FsProjectRegistry, IgnoreRuleTracker, JsonRpcError,
	RemoteTransmitter,
};

mod config;
mod stdio;

use config::DaemonConfig;
use stdio::{JsonRpcRequest, JsonRpcResponse, StdoutTransmitter, STDIO_ENDPOINT};

#[derive(Parser, Debug)]
#[command(
	name = "wsa-watcher-daemon",
	about = "Watches a workspace and keeps project ignore files live"
)]
struct Cli {
	/// Workspace root, every directory right under it is a project
	#[arg(long)]
	workspace: PathBuf,

	/// TOML configuration file
	#[arg(long)]
	config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("info,wsa_fs_watcher=debug")),
		)
		.init();

	let cli = Cli::parse();

	let mut config = match &cli.config {
		Some(path) => DaemonConfig::load(path)?,
		None => DaemonConfig::default(),
	};
	config.watcher.root.clone_from(&cli.workspace);

	let manager = FileWatcherManager::new(config.watcher.clone())
		.context("starting the file watcher")?;

	let glob_registration = if config.watch_globs.is_empty() {
		None
	} else {
		let matcher = GlobMatcher::new(&cli.workspace, &config.watch_globs)
			.context("building watch globs")?;

		Some(manager.register_by_matcher(
			Arc::new(matcher) as Arc<dyn PathMatcher>,
			Callbacks::new()
				.on_create(|path| info!(%path, "Created;"))
				.on_modify(|path| info!(%path, "Modified;"))
				.on_delete(|path| info!(%path, "Deleted;")),
		))
	};

	let tracker = IgnoreRuleTracker::start(
		Arc::clone(&manager),
		Arc::new(FsProjectRegistry::new(&cli.workspace)),
		Arc::new(StdoutTransmitter) as Arc<dyn RemoteTransmitter>,
		config.excludes.clone(),
	)
	.await;

	info!(workspace = %cli.workspace.display(), "Watcher daemon ready;");

	tokio::select! {
		() = serve_stdio(ExcludesRequestHandler::new(Arc::clone(&tracker))) => {
			info!("Stdin closed, shutting down");
		}
		res = signal::ctrl_c() => {
			if let Err(e) = res {
				warn!(?e, "Unable to listen for shutdown signal;");
			}
			info!("Received shutdown signal");
		}
	}

	tracker.shutdown();
	if let Some(id) = glob_registration {
		manager.unregister_by_matcher(id);
	}
	manager.shutdown().await;

	Ok(())
}

/// Answers one JSON-RPC request per stdin line until stdin closes
async fn serve_stdio(handler: ExcludesRequestHandler) {
	let endpoint = EndpointId::from(STDIO_ENDPOINT);
	let mut lines = BufReader::new(io::stdin()).lines();

	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(e) => {
				warn!(?e, "Failed to read request from stdin;");
				break;
			}
		};

		if line.trim().is_empty() {
			continue;
		}

		let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
			Ok(JsonRpcRequest {
				method, params, id, ..
			}) => {
				debug!(%method, "Received request;");
				JsonRpcResponse::new(id, handler.handle(&endpoint, &method, params))
			}
			Err(e) => JsonRpcResponse::new(
				None,
				Err(JsonRpcError {
					code: 400,
					message: format!("malformed request: {e}"),
				}),
			),
		};

		stdio::write_line(&response);
	}
}
