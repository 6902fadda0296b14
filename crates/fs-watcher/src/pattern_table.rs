use crate::{
	matcher::same_matcher, Callback, Callbacks, PathMatcher, PathSubscriptionTable,
	RegistrationId, RegistrationIds,
};

use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	pin::pin,
	sync::Arc,
	time::Duration,
};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::stream::Merge;
use parking_lot::Mutex;
use tokio::{
	task::spawn_blocking,
	time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, trace, warn};
use walkdir::WalkDir;
use wsa_utils::path_to_str;

struct MatcherRegistration {
	callbacks: Callbacks,
	/// Matched path -> the path table subscription made for it
	paths: HashMap<PathBuf, RegistrationId>,
	/// Whether a walk has already run for this registration; later discoveries are new files
	walked: bool,
}

struct MatcherSubscription {
	matcher: Arc<dyn PathMatcher>,
	registrations: HashMap<RegistrationId, MatcherRegistration>,
}

/// Callbacks subscribed to every path under the root that satisfies a matcher.
///
/// Matching paths are discovered by [`Self::tick`], which runs on a fixed interval and keeps a
/// path table subscription alive for each of them until the path disappears.
pub struct PatternSubscriptionTable {
	root: PathBuf,
	paths: Arc<PathSubscriptionTable>,
	ids: RegistrationIds,
	matchers: Mutex<Vec<MatcherSubscription>>,
	ticking: Mutex<()>,
}

impl PatternSubscriptionTable {
	pub(crate) fn new(root: impl Into<PathBuf>, paths: Arc<PathSubscriptionTable>) -> Self {
		Self {
			root: root.into(),
			paths,
			ids: RegistrationIds::default(),
			matchers: Mutex::default(),
			ticking: Mutex::default(),
		}
	}

	/// Nothing is discovered until the next tick
	pub fn watch(&self, matcher: Arc<dyn PathMatcher>, callbacks: Callbacks) -> RegistrationId {
		let id = self.ids.next();
		let registration = MatcherRegistration {
			callbacks,
			paths: HashMap::new(),
			walked: false,
		};

		let mut matchers = self.matchers.lock();

		if let Some(subscription) = matchers
			.iter_mut()
			.find(|subscription| same_matcher(&subscription.matcher, &matcher))
		{
			subscription.registrations.insert(id, registration);
		} else {
			matchers.push(MatcherSubscription {
				matcher,
				registrations: HashMap::from([(id, registration)]),
			});
		}

		trace!(%id, "Watching matcher;");

		id
	}

	/// Returns `false` if `id` wasn't a live registration of this table
	pub fn unwatch(&self, id: RegistrationId) -> bool {
		let removed = {
			let mut matchers = self.matchers.lock();

			let Some((idx, removed)) =
				matchers
					.iter_mut()
					.enumerate()
					.find_map(|(idx, subscription)| {
						subscription
							.registrations
							.remove(&id)
							.map(|removed| (idx, removed))
					})
			else {
				return false;
			};

			if matchers[idx].registrations.is_empty() {
				matchers.swap_remove(idx);
			}

			removed
		};

		for path_id in removed.paths.into_values() {
			self.paths.unwatch(path_id);
		}

		trace!(%id, "Unwatched matcher;");

		true
	}

	#[must_use]
	pub fn matched_paths(&self, id: RegistrationId) -> Vec<PathBuf> {
		let mut paths = self
			.matchers
			.lock()
			.iter()
			.find_map(|subscription| subscription.registrations.get(&id))
			.map(|registration| registration.paths.keys().cloned().collect::<Vec<_>>())
			.unwrap_or_default();

		paths.sort();
		paths
	}

	#[must_use]
	pub fn matcher_count(&self) -> usize {
		self.matchers.lock().len()
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// One rescan: forget vanished paths, then walk the root for new matches.
	///
	/// A path whose directory was removed and recreated since the last tick is released and
	/// discovered again, so it gets a live watch and an `on_create`.
	///
	/// Blocking; concurrent calls run one after the other.
	pub fn tick(&self) {
		let owed = {
			let _ticking = self.ticking.lock();
			self.prune();
			self.discover()
		};

		for (callback, path) in owed {
			match path_to_str(&path) {
				Ok(path) => callback(path),
				Err(e) => warn!(?e, "Skipping discovery of a path callbacks can't receive;"),
			}
		}
	}

	fn prune(&self) {
		let known = self
			.matchers
			.lock()
			.iter()
			.flat_map(|subscription| subscription.registrations.iter())
			.flat_map(|(id, registration)| {
				registration
					.paths
					.iter()
					.map(|(path, path_id)| (*id, path.clone(), *path_id))
			})
			.collect::<Vec<_>>();

		let gone = known
			.into_iter()
			.filter(|(_, path, path_id)| {
				!path.try_exists().unwrap_or(false) || self.paths.has_lost_watch(*path_id)
			})
			.map(|(id, path, _)| (id, path))
			.collect::<Vec<_>>();

		if gone.is_empty() {
			return;
		}

		let released = {
			let mut matchers = self.matchers.lock();

			gone.into_iter()
				.filter_map(|(id, path)| {
					matchers
						.iter_mut()
						.find_map(|subscription| subscription.registrations.get_mut(&id))
						.and_then(|registration| registration.paths.remove(&path))
						.map(|path_id| (path_id, path))
				})
				.collect::<Vec<_>>()
		};

		for (path_id, path) in released {
			debug!(path = %path.display(), "Matched path is gone or unwatched, releasing it;");
			self.paths.unwatch(path_id);
		}
	}

	/// Returns the `on_create` callbacks owed for paths that appeared since the last walk
	fn discover(&self) -> Vec<(Callback, PathBuf)> {
		let snapshot = self
			.matchers
			.lock()
			.iter()
			.map(|subscription| {
				(
					Arc::clone(&subscription.matcher),
					subscription.registrations.keys().copied().collect::<Vec<_>>(),
				)
			})
			.collect::<Vec<_>>();

		if snapshot.is_empty() {
			return vec![];
		}

		let mut found = Vec::new();

		for entry in WalkDir::new(&self.root).follow_links(false) {
			let entry = match entry {
				Ok(entry) => entry,
				Err(e) => {
					warn!(?e, root = %self.root.display(), "Error while walking watch root;");
					continue;
				}
			};

			let matched = snapshot
				.iter()
				.enumerate()
				.filter(|(_, (matcher, _))| matcher.matches(entry.path()))
				.map(|(idx, _)| idx)
				.collect::<Vec<_>>();

			if !matched.is_empty() {
				found.push((entry.into_path(), matched));
			}
		}

		let mut owed = Vec::new();
		let mut matchers = self.matchers.lock();

		for (path, matched) in found {
			for idx in matched {
				let (matcher, ids) = &snapshot[idx];

				let Some(subscription) = matchers
					.iter_mut()
					.find(|subscription| same_matcher(&subscription.matcher, matcher))
				else {
					continue;
				};

				for id in ids {
					let Some(registration) = subscription.registrations.get_mut(id) else {
						continue;
					};

					if registration.paths.contains_key(&path) {
						continue;
					}

					let path_id = self
						.paths
						.watch(path.clone(), registration.callbacks.clone());
					registration.paths.insert(path.clone(), path_id);

					debug!(%id, path = %path.display(), "Matcher discovered path;");

					if registration.walked {
						if let Some(on_create) = &registration.callbacks.on_create {
							owed.push((Arc::clone(on_create), path.clone()));
						}
					}
				}
			}
		}

		for (matcher, ids) in &snapshot {
			if let Some(subscription) = matchers
				.iter_mut()
				.find(|subscription| same_matcher(&subscription.matcher, matcher))
			{
				for id in ids {
					if let Some(registration) = subscription.registrations.get_mut(id) {
						registration.walked = true;
					}
				}
			}
		}

		owed
	}

	/// Ticks every `interval` until stopped; a slow tick delays the next one instead of overlapping
	pub(crate) async fn run_rescan_loop(
		self: Arc<Self>,
		interval: Duration,
		stop_rx: chan::Receiver<()>,
	) {
		enum StreamMessage {
			Tick,
			Stop,
		}

		let mut rescan_interval = interval_at(Instant::now() + interval, interval);
		// In case of doubt check: https://docs.rs/tokio/latest/tokio/time/enum.MissedTickBehavior.html
		rescan_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

		let mut msg_stream = pin!((
			IntervalStream::new(rescan_interval).map(|_| StreamMessage::Tick),
			stop_rx.map(|()| StreamMessage::Stop),
		)
			.merge());

		while let Some(msg) = msg_stream.next().await {
			match msg {
				StreamMessage::Tick => {
					let table = Arc::clone(&self);
					if let Err(e) = spawn_blocking(move || table.tick()).await {
						error!(?e, "Rescan failed;");
					}
				}

				StreamMessage::Stop => {
					debug!("Stopping rescan loop");
					break;
				}
			}
		}
	}
}
