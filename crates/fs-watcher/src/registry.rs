use crate::{
	event::{self, WatchEventKind},
	ExcludeSet, WatchBackend,
};

use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	pin::pin,
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Arc,
	},
};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::stream::Merge;
use notify::Event;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

/// Receives every resolved event drained by the registry's event loop
pub trait EventDispatcher: Send + Sync {
	fn dispatch(&self, path: &Path, kind: WatchEventKind);

	/// Events on excluded paths, only for subscribers that see through the exclusions
	fn dispatch_excluded(&self, _path: &Path, _kind: WatchEventKind) {}

	/// These native watches are gone because their directory was removed
	fn watches_purged(&self, _purged: &[(PathBuf, WatchGeneration)]) {}
}

/// Identifies one incarnation of a directory's native watch.
///
/// Releasing a reference with a stale generation (the directory vanished and was watched again
/// since) leaves the current watch alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchGeneration(u64);

#[derive(Debug)]
struct WatchedDirectory {
	references: usize,
	generation: WatchGeneration,
}

/// Reference counted native directory watches.
///
/// The directory is handed to the backend on its first reference and taken back on its last.
pub struct WatchKeyRegistry {
	keys: Mutex<HashMap<PathBuf, WatchedDirectory>>,
	backend: Mutex<Option<Box<dyn WatchBackend>>>,
	generations: AtomicU64,
	suspended: Arc<AtomicBool>,
	excludes: ExcludeSet,
}

impl WatchKeyRegistry {
	pub(crate) fn new(
		backend: Box<dyn WatchBackend>,
		suspended: Arc<AtomicBool>,
		excludes: ExcludeSet,
	) -> Self {
		Self {
			keys: Mutex::default(),
			backend: Mutex::new(Some(backend)),
			generations: AtomicU64::new(0),
			suspended,
			excludes,
		}
	}

	/// Takes a reference on `dir`, creating its native watch if this is the first one.
	///
	/// Returns `None` when the native watch couldn't be created; the directory then simply goes
	/// unwatched and no reference is held.
	pub fn register(&self, dir: &Path) -> Option<WatchGeneration> {
		let mut keys = self.keys.lock();

		if let Some(watched) = keys.get_mut(dir) {
			watched.references += 1;
			trace!(
				dir = %dir.display(),
				references = watched.references,
				"Reusing native watch;"
			);
			return Some(watched.generation);
		}

		let mut backend_guard = self.backend.lock();
		let Some(backend) = backend_guard.as_mut() else {
			debug!(dir = %dir.display(), "Registry is closed, not watching directory;");
			return None;
		};

		if let Err(e) = backend.watch(dir) {
			warn!(?e, "Unable to watch directory, it will go unwatched;");
			return None;
		}

		let generation = WatchGeneration(self.generations.fetch_add(1, Ordering::Relaxed));
		keys.insert(
			dir.to_path_buf(),
			WatchedDirectory {
				references: 1,
				generation,
			},
		);

		debug!(dir = %dir.display(), "Started watching directory;");

		Some(generation)
	}

	/// Drops a reference on `dir`, cancelling the native watch with the last one.
	///
	/// Unknown directories and stale generations are ignored.
	pub fn unregister(&self, dir: &Path, generation: WatchGeneration) {
		let mut keys = self.keys.lock();

		let Some(watched) = keys.get_mut(dir) else {
			trace!(dir = %dir.display(), "Unregistering a directory that isn't watched;");
			return;
		};

		if watched.generation != generation {
			trace!(dir = %dir.display(), "Ignoring release of a stale watch;");
			return;
		}

		watched.references -= 1;
		if watched.references > 0 {
			return;
		}

		keys.remove(dir);
		self.cancel(dir);
	}

	/// Forgets `dir` and every watched directory beneath it, whatever their reference counts.
	///
	/// Returns the purged watches so their holders can tell they lost them.
	pub(crate) fn purge(&self, dir: &Path) -> Vec<(PathBuf, WatchGeneration)> {
		let mut keys = self.keys.lock();

		let stale = keys
			.keys()
			.filter(|watched| watched.starts_with(dir))
			.cloned()
			.collect::<Vec<_>>();

		stale
			.into_iter()
			.filter_map(|watched| {
				let removed = keys.remove(&watched)?;
				self.cancel(&watched);
				debug!(dir = %watched.display(), "Purged watch of removed directory;");
				Some((watched, removed.generation))
			})
			.collect()
	}

	/// Cancels every native watch and closes the backend; later registrations are refused
	pub(crate) fn close(&self) {
		let mut keys = self.keys.lock();

		for (dir, _) in keys.drain() {
			self.cancel(&dir);
		}

		// Dropping the backend closes the native service
		self.backend.lock().take();

		debug!("Closed watch key registry");
	}

	fn cancel(&self, dir: &Path) {
		if let Some(backend) = self.backend.lock().as_mut() {
			if let Err(e) = backend.unwatch(dir) {
				// The directory is usually already gone
				debug!(?e, "Failed to cancel native watch;");
			} else {
				debug!(dir = %dir.display(), "Stopped watching directory;");
			}
		}
	}

	/// Stops delivering events until [`Self::resume`]; events in the meantime are dropped
	pub fn suspend(&self) {
		if !self.suspended.swap(true, Ordering::AcqRel) {
			info!("File watching suspended");
		}
	}

	pub fn resume(&self) {
		if self.suspended.swap(false, Ordering::AcqRel) {
			info!("File watching resumed");
		}
	}

	#[must_use]
	pub fn is_suspended(&self) -> bool {
		self.suspended.load(Ordering::Acquire)
	}

	#[must_use]
	pub fn watched_directories(&self) -> Vec<PathBuf> {
		let mut dirs = self.keys.lock().keys().cloned().collect::<Vec<_>>();
		dirs.sort();
		dirs
	}

	#[must_use]
	pub fn reference_count(&self, dir: impl AsRef<Path>) -> usize {
		self.keys
			.lock()
			.get(dir.as_ref())
			.map_or(0, |watched| watched.references)
	}

	fn is_watched(&self, dir: &Path) -> bool {
		self.keys.lock().contains_key(dir)
	}

	pub(crate) fn handle_event(
		&self,
		result: notify::Result<Event>,
		dispatcher: &dyn EventDispatcher,
	) {
		let event = match result {
			Ok(event) => event,
			Err(e) => {
				error!(?e, "Watcher error;");
				return;
			}
		};

		// Checked here too, events queued before a suspension must not slip through
		let suspended = self.is_suspended();

		if event.need_rescan() {
			warn!(paths = ?event.paths, "Native event queue overflowed, some events were lost;");
		}

		for (path, kind) in event::resolve(event) {
			if suspended {
				trace!(path = %path.display(), ?kind, "Discarding file system event while suspended;");
			} else if self.excludes.is_excluded(&path) {
				trace!(path = %path.display(), ?kind, "Event on excluded path;");
				dispatcher.dispatch_excluded(&path, kind);
			} else {
				trace!(path = %path.display(), ?kind, "Dispatching file system event;");
				dispatcher.dispatch(&path, kind);
			}

			if kind == WatchEventKind::Delete && self.is_watched(&path) {
				let purged = self.purge(&path);
				dispatcher.watches_purged(&purged);
			}
		}
	}

	/// Drains native events until told to stop or until every backend sender is gone
	pub(crate) async fn run_event_loop(
		self: Arc<Self>,
		dispatcher: Arc<dyn EventDispatcher>,
		events_rx: chan::Receiver<notify::Result<Event>>,
		stop_rx: chan::Receiver<()>,
	) {
		enum StreamMessage {
			NewEvent(notify::Result<Event>),
			Stop,
		}

		let mut msg_stream = pin!((
			events_rx.map(StreamMessage::NewEvent),
			stop_rx.map(|()| StreamMessage::Stop),
		)
			.merge());

		while let Some(msg) = msg_stream.next().await {
			match msg {
				StreamMessage::NewEvent(result) => self.handle_event(result, dispatcher.as_ref()),

				StreamMessage::Stop => {
					debug!("Stopping file watcher event loop");
					break;
				}
			}
		}
	}
}
