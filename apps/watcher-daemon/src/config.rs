use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wsa_fs_watcher::FileWatcherConfig;
use wsa_watch_excludes::ExcludesConfig;

/// Everything the daemon reads from its TOML file; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
	pub watcher: FileWatcherConfig,
	pub excludes: ExcludesConfig,
	/// Globs whose matches under the workspace get their changes logged
	pub watch_globs: Vec<String>,
}

impl DaemonConfig {
	pub fn load(path: &Path) -> Result<Self> {
		let contents = fs::read_to_string(path)
			.with_context(|| format!("reading daemon config '{}'", path.display()))?;

		let config = toml::from_str::<Self>(&contents)
			.with_context(|| format!("decoding daemon config '{}'", path.display()))?;
		config.watcher.validate()?;

		Ok(config)
	}
}
