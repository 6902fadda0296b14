use crate::{event, platform, FileWatcherConfig, Sensitivity, WatcherError};

use std::{
	path::Path,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use async_channel as chan;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, trace};

/// The native directory watch primitive.
///
/// Implementors report events through the [`EventSink`] they were built with. Dropping the
/// backend closes the native service.
pub trait WatchBackend: Send + 'static {
	fn watch(&mut self, dir: &Path) -> Result<(), WatcherError>;

	fn unwatch(&mut self, dir: &Path) -> Result<(), WatcherError>;
}

/// Hands raw native events over to the event loop.
///
/// While suspended only errors and events that may remove a path get through, the event loop
/// still needs those to forget the watches of deleted directories.
#[derive(Debug, Clone)]
pub struct EventSink {
	events_tx: chan::Sender<notify::Result<Event>>,
	suspended: Arc<AtomicBool>,
}

impl EventSink {
	pub(crate) const fn new(
		events_tx: chan::Sender<notify::Result<Event>>,
		suspended: Arc<AtomicBool>,
	) -> Self {
		Self {
			events_tx,
			suspended,
		}
	}

	pub fn push(&self, result: notify::Result<Event>) {
		if self.suspended.load(Ordering::Acquire)
			&& result.as_ref().is_ok_and(|raw| !event::may_delete(raw))
		{
			trace!(?result, "Discarding file system event while suspended;");
			return;
		}

		if self.events_tx.is_closed() {
			trace!("Tried to send file system events to a closed channel;");
			return;
		}

		// SAFETY: never blocks as this is an unbounded channel
		if self.events_tx.try_send(result).is_err() {
			error!("Unable to send file system event to the event loop;");
		}
	}
}

/// [`WatchBackend`] over the platform's recommended `notify` watcher
pub struct NotifyBackend {
	watcher: RecommendedWatcher,
	sensitivity: Sensitivity,
}

impl NotifyBackend {
	pub fn new(sink: EventSink, config: &FileWatcherConfig) -> Result<Self, WatcherError> {
		let (notify_config, sensitivity) = platform::probe(config.high_sensitivity);

		let watcher = RecommendedWatcher::new(move |result| sink.push(result), notify_config)?;

		Ok(Self {
			watcher,
			sensitivity,
		})
	}

	#[must_use]
	pub const fn sensitivity(&self) -> Sensitivity {
		self.sensitivity
	}
}

impl WatchBackend for NotifyBackend {
	fn watch(&mut self, dir: &Path) -> Result<(), WatcherError> {
		self.watcher
			.watch(dir, RecursiveMode::NonRecursive)
			.map_err(|source| WatcherError::Watch {
				path: dir.to_path_buf(),
				source,
			})
	}

	fn unwatch(&mut self, dir: &Path) -> Result<(), WatcherError> {
		self.watcher
			.unwatch(dir)
			.map_err(|source| WatcherError::Unwatch {
				path: dir.to_path_buf(),
				source,
			})
	}
}
