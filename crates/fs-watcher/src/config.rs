use crate::WatcherError;

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use wsa_utils::error::FileIOError;

const DEFAULT_RESCAN_INTERVAL_MS: u64 = 2_000;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;

/// Settings for a [`crate::FileWatcherManager`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWatcherConfig {
	/// Root of the tree walked to discover matcher subscriptions
	pub root: PathBuf,
	/// Lower bound between the starts of two consecutive rescans
	pub rescan_interval_ms: u64,
	/// How long each background task gets to finish on shutdown before being aborted
	pub shutdown_grace_ms: u64,
	/// Ask the platform for more responsive change detection when it supports it
	pub high_sensitivity: bool,
}

impl Default for FileWatcherConfig {
	fn default() -> Self {
		Self {
			root: PathBuf::from("/projects"),
			rescan_interval_ms: DEFAULT_RESCAN_INTERVAL_MS,
			shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
			high_sensitivity: true,
		}
	}
}

impl FileWatcherConfig {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			..Default::default()
		}
	}

	#[must_use]
	pub const fn with_rescan_interval(mut self, interval: Duration) -> Self {
		self.rescan_interval_ms = duration_to_millis(interval);
		self
	}

	#[must_use]
	pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
		self.shutdown_grace_ms = duration_to_millis(grace);
		self
	}

	#[must_use]
	pub const fn with_high_sensitivity(mut self, high_sensitivity: bool) -> Self {
		self.high_sensitivity = high_sensitivity;
		self
	}

	/// Reads a TOML file, every missing field taking its default value
	pub fn load(path: impl AsRef<Path>) -> Result<Self, WatcherError> {
		let path = path.as_ref();

		let contents = fs::read_to_string(path).map_err(|e| {
			FileIOError::from_std_io_err_with_msg(path, e, "reading file watcher config")
		})?;

		let config = toml::from_str::<Self>(&contents)?;
		config.validate()?;

		Ok(config)
	}

	pub fn validate(&self) -> Result<(), WatcherError> {
		if self.rescan_interval_ms == 0 {
			return Err(WatcherError::InvalidConfig(
				"rescan_interval_ms must be greater than zero".to_string(),
			));
		}

		Ok(())
	}

	#[must_use]
	pub const fn rescan_interval(&self) -> Duration {
		Duration::from_millis(self.rescan_interval_ms)
	}

	#[must_use]
	pub const fn shutdown_grace(&self) -> Duration {
		Duration::from_millis(self.shutdown_grace_ms)
	}
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_to_millis(duration: Duration) -> u64 {
	duration.as_millis() as u64
}
