use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where each project keeps its ignore file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludesConfig {
	/// Directory right under the project root holding the ignore file
	pub sentinel_dir: String,
	pub file_name: String,
}

impl Default for ExcludesConfig {
	fn default() -> Self {
		Self {
			sentinel_dir: ".che".to_string(),
			file_name: "fileWatcherExcludes".to_string(),
		}
	}
}

impl ExcludesConfig {
	/// Location of the ignore file relative to a project root
	#[must_use]
	pub fn ignore_file(&self) -> PathBuf {
		PathBuf::from(&self.sentinel_dir).join(&self.file_name)
	}
}
