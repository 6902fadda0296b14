use std::path::PathBuf;

use thiserror::Error;
use wsa_utils::error::{FileIOError, NonUtf8PathError};

#[derive(Error, Debug)]
pub enum WatcherError {
	#[error("native watcher error: {0}")]
	Notify(#[from] notify::Error),
	#[error("unable to watch directory <path='{}'>: {source}", .path.display())]
	Watch {
		path: PathBuf,
		#[source]
		source: notify::Error,
	},
	#[error("unable to unwatch directory <path='{}'>: {source}", .path.display())]
	Unwatch {
		path: PathBuf,
		#[source]
		source: notify::Error,
	},
	#[error("invalid glob: {0}")]
	Glob(#[from] globset::Error),
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
	#[error("configuration decode error: {0}")]
	ConfigDecode(#[from] toml::de::Error),

	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error(transparent)]
	NonUtf8Path(#[from] NonUtf8PathError),
}
