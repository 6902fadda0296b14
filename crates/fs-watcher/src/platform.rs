use std::time::Duration;

use notify::{Config, RecommendedWatcher, Watcher, WatcherKind};
use tracing::debug;

const HIGH_SENSITIVITY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How responsive change detection ended up being on this platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
	High,
	Default,
}

/// Picks the native watcher configuration for the requested sensitivity.
///
/// Event-driven backends (inotify, FSEvents, ReadDirectoryChangesW) have nothing to tune, so
/// only the polling fallback honours a high sensitivity request, by polling more often.
pub(crate) fn probe(high_sensitivity: bool) -> (Config, Sensitivity) {
	probe_for(<RecommendedWatcher as Watcher>::kind(), high_sensitivity)
}

fn probe_for(kind: WatcherKind, high_sensitivity: bool) -> (Config, Sensitivity) {
	let config = Config::default();

	if high_sensitivity && kind == WatcherKind::PollWatcher {
		debug!(?kind, "Native watcher supports high sensitivity;");
		return (
			config.with_poll_interval(HIGH_SENSITIVITY_POLL_INTERVAL),
			Sensitivity::High,
		);
	}

	debug!(?kind, high_sensitivity, "Using default watcher sensitivity;");
	(config, Sensitivity::Default)
}
