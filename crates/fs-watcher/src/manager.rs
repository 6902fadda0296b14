use crate::{
	Callbacks, EventDispatcher, EventSink, ExcludeSet, FileWatcherConfig, NotifyBackend,
	PathMatcher, PathSubscriptionTable, PatternSubscriptionTable, RegistrationId, WatchBackend,
	WatchKeyRegistry, WatcherError,
};

use std::{
	future::Future,
	path::PathBuf,
	sync::{atomic::AtomicBool, Arc},
	time::Duration,
};

use async_channel as chan;
use parking_lot::Mutex;
use tokio::{
	spawn,
	task::{spawn_blocking, JoinHandle},
	time::timeout,
};
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

struct BackgroundTask {
	name: &'static str,
	handle: JoinHandle<()>,
	stop_tx: chan::Sender<()>,
}

impl BackgroundTask {
	/// Keeps `run` going, restarting it whenever it panics, until it returns on its own
	fn spawn<F, Fut>(name: &'static str, run: F) -> Self
	where
		F: Fn(chan::Receiver<()>) -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let (stop_tx, stop_rx) = chan::bounded(1);

		let handle = spawn(
			async move {
				while let Err(e) = spawn(run(stop_rx.clone()).in_current_span()).await {
					if e.is_panic() {
						error!(?e, task = name, "Background task panicked;");
					} else {
						trace!(task = name, "Background task was cancelled and will exit...");
						break;
					}
					trace!(task = name, "Restarting background task...");
				}

				debug!(task = name, "Background task gracefully shutdown");
			}
			.in_current_span(),
		);

		Self {
			name,
			handle,
			stop_tx,
		}
	}

	async fn stop(mut self, grace: Duration) {
		if self.stop_tx.send(()).await.is_err() {
			trace!(task = self.name, "Background task already finished;");
		}

		match timeout(grace, &mut self.handle).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => error!(?e, task = self.name, "Failed to join background task;"),
			Err(_) => {
				warn!(
					task = self.name,
					?grace,
					"Background task didn't stop in time, aborting it;"
				);
				self.handle.abort();
			}
		}
	}
}

/// Owns the watch registry, both subscription tables, the exclude set and the two background
/// tasks feeding them.
///
/// Must be created inside a tokio runtime. Call [`Self::shutdown`] to release native watches.
pub struct FileWatcherManager {
	config: FileWatcherConfig,
	excludes: ExcludeSet,
	registry: Arc<WatchKeyRegistry>,
	paths: Arc<PathSubscriptionTable>,
	patterns: Arc<PatternSubscriptionTable>,
	tasks: Mutex<Vec<BackgroundTask>>,
}

impl FileWatcherManager {
	/// Watches with the platform's native backend
	pub fn new(config: FileWatcherConfig) -> Result<Arc<Self>, WatcherError> {
		Self::with_backend(config, NotifyBackend::new)
	}

	#[instrument(skip(backend_factory), fields(root = %config.root.display()), err)]
	pub fn with_backend<B, F>(
		config: FileWatcherConfig,
		backend_factory: F,
	) -> Result<Arc<Self>, WatcherError>
	where
		B: WatchBackend,
		F: FnOnce(EventSink, &FileWatcherConfig) -> Result<B, WatcherError>,
	{
		config.validate()?;

		let (events_tx, events_rx) = chan::unbounded();
		let suspended = Arc::new(AtomicBool::new(false));

		let backend = backend_factory(EventSink::new(events_tx, Arc::clone(&suspended)), &config)?;

		let excludes = ExcludeSet::new();
		let registry = Arc::new(WatchKeyRegistry::new(
			Box::new(backend),
			suspended,
			excludes.clone(),
		));
		let paths = Arc::new(PathSubscriptionTable::new(Arc::clone(&registry)));
		let patterns = Arc::new(PatternSubscriptionTable::new(
			config.root.clone(),
			Arc::clone(&paths),
		));

		let event_loop = BackgroundTask::spawn("event_loop", {
			let registry = Arc::clone(&registry);
			let dispatcher = Arc::clone(&paths) as Arc<dyn EventDispatcher>;
			move |stop_rx| {
				Arc::clone(&registry).run_event_loop(
					Arc::clone(&dispatcher),
					events_rx.clone(),
					stop_rx,
				)
			}
		});

		let rescan_loop = BackgroundTask::spawn("rescan_loop", {
			let patterns = Arc::clone(&patterns);
			let interval = config.rescan_interval();
			move |stop_rx| Arc::clone(&patterns).run_rescan_loop(interval, stop_rx)
		});

		info!(
			interval = ?config.rescan_interval(),
			"File watcher started;"
		);

		Ok(Arc::new(Self {
			config,
			excludes,
			registry,
			paths,
			patterns,
			tasks: Mutex::new(vec![event_loop, rescan_loop]),
		}))
	}

	/// Calls back on create, modify and delete of exactly `path`
	pub fn register_by_path(
		&self,
		path: impl Into<PathBuf>,
		callbacks: Callbacks,
	) -> RegistrationId {
		self.paths.watch(path, callbacks)
	}

	pub fn unregister_by_path(&self, id: RegistrationId) -> bool {
		self.paths.unwatch(id)
	}

	/// Calls back for every path under the root that satisfies `matcher`, from the next rescan on
	pub fn register_by_matcher(
		&self,
		matcher: Arc<dyn PathMatcher>,
		callbacks: Callbacks,
	) -> RegistrationId {
		self.patterns.watch(matcher, callbacks)
	}

	pub fn unregister_by_matcher(&self, id: RegistrationId) -> bool {
		self.patterns.unwatch(id)
	}

	pub fn suspend(&self) {
		self.registry.suspend();
	}

	pub fn resume(&self) {
		self.registry.resume();
	}

	#[must_use]
	pub fn is_suspended(&self) -> bool {
		self.registry.is_suspended()
	}

	/// Runs one rescan right away, waiting for any rescan already in progress first
	pub async fn rescan(&self) {
		let patterns = Arc::clone(&self.patterns);
		if let Err(e) = spawn_blocking(move || patterns.tick()).await {
			error!(?e, "On demand rescan failed;");
		}
	}

	/// Stops both background tasks and cancels every native watch. Never fails
	pub async fn shutdown(&self) {
		let tasks = std::mem::take(&mut *self.tasks.lock());
		if tasks.is_empty() {
			return;
		}

		let grace = self.config.shutdown_grace();
		for task in tasks {
			task.stop(grace).await;
		}

		self.registry.close();

		info!("File watcher shutdown");
	}

	#[must_use]
	pub fn excludes(&self) -> &ExcludeSet {
		&self.excludes
	}

	#[must_use]
	pub const fn config(&self) -> &FileWatcherConfig {
		&self.config
	}

	#[must_use]
	pub fn registry(&self) -> &WatchKeyRegistry {
		&self.registry
	}

	#[must_use]
	pub fn path_table(&self) -> &PathSubscriptionTable {
		&self.paths
	}

	#[must_use]
	pub fn pattern_table(&self) -> &PatternSubscriptionTable {
		&self.patterns
	}
}

impl Drop for FileWatcherManager {
	fn drop(&mut self) {
		for task in self.tasks.get_mut().drain(..) {
			if task.stop_tx.try_send(()).is_err() {
				task.handle.abort();
			}
		}
	}
}
