#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use std::{
	collections::HashSet,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use notify::{
	event::{CreateKind, DataChange, ModifyKind, RemoveKind},
	Event, EventKind,
};
use parking_lot::Mutex;
use tokio::{sync::mpsc, time::timeout};
use wsa_fs_watcher::{
	Callbacks, EventSink, FileWatcherConfig, FileWatcherManager, WatchBackend, WatchEventKind,
	WatcherError,
};

pub const WAIT: Duration = Duration::from_secs(5);

const FLUSH_DIR: &str = "/__flush__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
	Watch(PathBuf),
	Unwatch(PathBuf),
}

/// In-memory backend recording every call; directories can be made to refuse watching
#[derive(Clone, Default)]
pub struct ScriptedBackend {
	calls: Arc<Mutex<Vec<BackendCall>>>,
	refused: Arc<Mutex<HashSet<PathBuf>>>,
}

impl WatchBackend for ScriptedBackend {
	fn watch(&mut self, dir: &Path) -> Result<(), WatcherError> {
		if self.refused.lock().contains(dir) {
			return Err(WatcherError::Watch {
				path: dir.to_path_buf(),
				source: notify::Error::path_not_found(),
			});
		}

		self.calls.lock().push(BackendCall::Watch(dir.to_path_buf()));
		Ok(())
	}

	fn unwatch(&mut self, dir: &Path) -> Result<(), WatcherError> {
		self.calls
			.lock()
			.push(BackendCall::Unwatch(dir.to_path_buf()));
		Ok(())
	}
}

pub struct Harness {
	pub manager: Arc<FileWatcherManager>,
	sink: EventSink,
	backend: ScriptedBackend,
}

impl Harness {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self::with_config(
			FileWatcherConfig::new(root)
				.with_rescan_interval(Duration::from_secs(3600))
				.with_shutdown_grace(Duration::from_secs(1)),
		)
	}

	pub fn with_config(config: FileWatcherConfig) -> Self {
		let backend = ScriptedBackend::default();
		let mut captured = None;

		let manager = FileWatcherManager::with_backend(config, |sink, _| {
			captured = Some(sink);
			Ok(backend.clone())
		})
		.unwrap();

		Self {
			manager,
			sink: captured.unwrap(),
			backend,
		}
	}

	pub fn emit(&self, kind: EventKind, path: impl Into<PathBuf>) {
		self.sink.push(Ok(Event::new(kind).add_path(path.into())));
	}

	pub fn emit_create(&self, path: impl Into<PathBuf>) {
		self.emit(EventKind::Create(CreateKind::File), path);
	}

	pub fn emit_modify(&self, path: impl Into<PathBuf>) {
		self.emit(EventKind::Modify(ModifyKind::Data(DataChange::Content)), path);
	}

	pub fn emit_remove(&self, path: impl Into<PathBuf>) {
		self.emit(EventKind::Remove(RemoveKind::Any), path);
	}

	pub fn refuse(&self, dir: impl Into<PathBuf>) {
		self.backend.refused.lock().insert(dir.into());
	}

	pub fn allow(&self, dir: impl AsRef<Path>) {
		self.backend.refused.lock().remove(dir.as_ref());
	}

	/// Backend calls, leaving out the ones made by [`Self::flush`]
	pub fn calls(&self) -> Vec<BackendCall> {
		self.backend
			.calls
			.lock()
			.iter()
			.filter(|call| {
				let (BackendCall::Watch(dir) | BackendCall::Unwatch(dir)) = call;
				dir.as_path() != Path::new(FLUSH_DIR)
			})
			.cloned()
			.collect()
	}

	/// Waits until every event emitted so far went through the event loop
	pub async fn flush(&self) {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let marker = Path::new(FLUSH_DIR).join("marker");

		let id = self.manager.register_by_path(
			&marker,
			Callbacks::new().on_create(move |_| {
				let _ = tx.send(());
			}),
		);

		self.emit_create(&marker);
		timeout(WAIT, rx.recv()).await.unwrap().unwrap();

		self.manager.unregister_by_path(id);
	}
}

pub type Received = mpsc::UnboundedReceiver<(WatchEventKind, String)>;

/// Callbacks reporting every event they get
pub fn recorder() -> (Callbacks, Received) {
	let (tx, rx) = mpsc::unbounded_channel();

	let callbacks = Callbacks::new()
		.on_create({
			let tx = tx.clone();
			move |path| {
				let _ = tx.send((WatchEventKind::Create, path.to_string()));
			}
		})
		.on_modify({
			let tx = tx.clone();
			move |path| {
				let _ = tx.send((WatchEventKind::Modify, path.to_string()));
			}
		})
		.on_delete(move |path| {
			let _ = tx.send((WatchEventKind::Delete, path.to_string()));
		});

	(callbacks, rx)
}

pub async fn next(rx: &mut Received) -> (WatchEventKind, String) {
	timeout(WAIT, rx.recv())
		.await
		.expect("timed out waiting for a callback")
		.expect("callback channel closed")
}

pub fn drain(rx: &mut Received) -> Vec<(WatchEventKind, String)> {
	let mut received = vec![];
	while let Ok(event) = rx.try_recv() {
		received.push(event);
	}
	received
}
