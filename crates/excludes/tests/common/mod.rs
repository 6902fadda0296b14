#![allow(dead_code, clippy::unwrap_used)]

use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;
use wsa_fs_watcher::{FileWatcherConfig, FileWatcherManager, WatchBackend, WatcherError};
use wsa_watch_excludes::{
	EndpointId, ExcludesConfig, FsProjectRegistry, IgnoreRuleTracker, RemoteTransmitter,
};

/// Accepts every watch and never reports anything, so only rescans and direct reloads happen
pub struct QuietBackend;

impl WatchBackend for QuietBackend {
	fn watch(&mut self, _: &Path) -> Result<(), WatcherError> {
		Ok(())
	}

	fn unwatch(&mut self, _: &Path) -> Result<(), WatcherError> {
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
	pub endpoint: EndpointId,
	pub method: String,
	pub params: Option<Value>,
}

#[derive(Default)]
pub struct RecordingTransmitter(Mutex<Vec<Sent>>);

impl RecordingTransmitter {
	pub fn sent_to(&self, endpoint: &str) -> Vec<Sent> {
		self.0
			.lock()
			.iter()
			.filter(|sent| sent.endpoint.0 == endpoint)
			.cloned()
			.collect()
	}

	pub fn clear(&self) {
		self.0.lock().clear();
	}
}

impl RemoteTransmitter for RecordingTransmitter {
	fn notify(&self, endpoint: &EndpointId, method: &str, params: Option<Value>) {
		self.0.lock().push(Sent {
			endpoint: endpoint.clone(),
			method: method.to_string(),
			params,
		});
	}
}

pub struct Workspace {
	pub dir: TempDir,
}

impl Workspace {
	pub fn new() -> Self {
		Self {
			dir: tempfile::tempdir().unwrap(),
		}
	}

	pub fn root(&self) -> &Path {
		self.dir.path()
	}

	pub fn path(&self, relative: &str) -> PathBuf {
		self.root().join(relative)
	}

	pub fn mkdir(&self, relative: &str) -> PathBuf {
		let path = self.path(relative);
		fs::create_dir_all(&path).unwrap();
		path
	}

	pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
		let path = self.path(relative);
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(&path, contents).unwrap();
		path
	}

	pub fn read(&self, relative: &str) -> String {
		fs::read_to_string(self.path(relative)).unwrap()
	}

	pub fn quiet_manager(&self) -> Arc<FileWatcherManager> {
		FileWatcherManager::with_backend(self.config(Duration::from_secs(3600)), |_, _| {
			Ok(QuietBackend)
		})
		.unwrap()
	}

	pub fn config(&self, rescan_interval: Duration) -> FileWatcherConfig {
		FileWatcherConfig::new(self.root())
			.with_rescan_interval(rescan_interval)
			.with_shutdown_grace(Duration::from_secs(1))
	}

	pub async fn start_tracker(
		&self,
		manager: Arc<FileWatcherManager>,
	) -> (Arc<IgnoreRuleTracker>, Arc<RecordingTransmitter>) {
		let transmitter = Arc::new(RecordingTransmitter::default());

		let tracker = IgnoreRuleTracker::start(
			manager,
			Arc::new(FsProjectRegistry::new(self.root())),
			Arc::clone(&transmitter) as Arc<dyn RemoteTransmitter>,
			ExcludesConfig::default(),
		)
		.await;

		(tracker, transmitter)
	}
}
