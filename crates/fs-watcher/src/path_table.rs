use crate::{
	Callback, Callbacks, EventDispatcher, RegistrationId, RegistrationIds, WatchEventKind,
	WatchGeneration, WatchKeyRegistry,
};

use std::{
	collections::{HashMap, HashSet},
	path::{Path, PathBuf},
	sync::Arc,
};

use parking_lot::RwLock;
use tracing::{trace, warn};
use wsa_utils::path_to_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
	Active(WatchGeneration),
	/// The native watch was refused, there is no reference to give back
	Refused,
	/// The watched directory was removed, taking the native watch with it
	Lost,
}

#[derive(Debug)]
struct PathSubscription {
	path: PathBuf,
	watched_dir: PathBuf,
	watch: WatchState,
	callbacks: Callbacks,
}

#[derive(Debug, Default)]
struct Subscriptions {
	by_id: HashMap<RegistrationId, PathSubscription>,
	by_path: HashMap<PathBuf, HashSet<RegistrationId>>,
}

/// Callbacks subscribed to exact paths.
///
/// Each subscription holds one reference on the directory whose events cover its path: the path
/// itself for directories, its parent otherwise.
pub struct PathSubscriptionTable {
	registry: Arc<WatchKeyRegistry>,
	ids: RegistrationIds,
	subscriptions: RwLock<Subscriptions>,
}

impl PathSubscriptionTable {
	pub(crate) fn new(registry: Arc<WatchKeyRegistry>) -> Self {
		Self {
			registry,
			ids: RegistrationIds::default(),
			subscriptions: RwLock::default(),
		}
	}

	pub fn watch(&self, path: impl Into<PathBuf>, callbacks: Callbacks) -> RegistrationId {
		let path = path.into();

		let watched_dir = if path.is_dir() {
			path.clone()
		} else {
			path.parent().map_or_else(|| path.clone(), Path::to_path_buf)
		};

		let watch = self
			.registry
			.register(&watched_dir)
			.map_or(WatchState::Refused, WatchState::Active);
		let id = self.ids.next();

		trace!(%id, path = %path.display(), "Watching path;");

		let mut subscriptions = self.subscriptions.write();
		subscriptions
			.by_path
			.entry(path.clone())
			.or_default()
			.insert(id);
		subscriptions.by_id.insert(
			id,
			PathSubscription {
				path,
				watched_dir,
				watch,
				callbacks,
			},
		);

		id
	}

	/// Returns `false` if `id` wasn't a live subscription of this table
	pub fn unwatch(&self, id: RegistrationId) -> bool {
		let removed = {
			let mut subscriptions = self.subscriptions.write();

			let Some(removed) = subscriptions.by_id.remove(&id) else {
				return false;
			};

			if let Some(ids) = subscriptions.by_path.get_mut(&removed.path) {
				ids.remove(&id);
				if ids.is_empty() {
					subscriptions.by_path.remove(&removed.path);
				}
			}

			removed
		};

		trace!(%id, path = %removed.path.display(), "Unwatched path;");

		if let WatchState::Active(generation) = removed.watch {
			self.registry.unregister(&removed.watched_dir, generation);
		}

		true
	}

	#[must_use]
	pub fn subscription_count(&self) -> usize {
		self.subscriptions.read().by_id.len()
	}

	#[must_use]
	pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
		self.subscriptions.read().by_path.contains_key(path.as_ref())
	}

	/// Whether the directory `id` was watched through got removed since it subscribed.
	///
	/// Such a subscription only hears about its path again if something else watches the
	/// directory; it has to be replaced to get a native watch of its own.
	#[must_use]
	pub fn has_lost_watch(&self, id: RegistrationId) -> bool {
		self.subscriptions
			.read()
			.by_id
			.get(&id)
			.is_some_and(|subscription| subscription.watch == WatchState::Lost)
	}

	#[must_use]
	pub fn registry(&self) -> &Arc<WatchKeyRegistry> {
		&self.registry
	}
}

impl PathSubscriptionTable {
	fn invoke(&self, path: &Path, kind: WatchEventKind, excluded: bool) {
		let callbacks = {
			let subscriptions = self.subscriptions.read();

			let Some(ids) = subscriptions.by_path.get(path) else {
				return;
			};

			let mut ids = ids.iter().copied().collect::<Vec<_>>();
			ids.sort_unstable();

			ids.into_iter()
				.filter_map(|id| subscriptions.by_id.get(&id))
				.filter(|subscription| !excluded || subscription.callbacks.see_excluded)
				.filter_map(|subscription| subscription.callbacks.for_kind(kind))
				.map(Arc::clone)
				.collect::<Vec<Callback>>()
		};

		if callbacks.is_empty() {
			return;
		}

		let path = match path_to_str(path) {
			Ok(path) => path,
			Err(e) => {
				warn!(?e, "Skipping event on a path callbacks can't receive;");
				return;
			}
		};

		for callback in callbacks {
			callback(path);
		}
	}
}

impl EventDispatcher for PathSubscriptionTable {
	fn dispatch(&self, path: &Path, kind: WatchEventKind) {
		self.invoke(path, kind, false);
	}

	fn dispatch_excluded(&self, path: &Path, kind: WatchEventKind) {
		self.invoke(path, kind, true);
	}

	fn watches_purged(&self, purged: &[(PathBuf, WatchGeneration)]) {
		let purged = purged
			.iter()
			.map(|(dir, generation)| (dir.as_path(), *generation))
			.collect::<HashMap<_, _>>();

		let mut subscriptions = self.subscriptions.write();

		for (id, subscription) in &mut subscriptions.by_id {
			let WatchState::Active(generation) = subscription.watch else {
				continue;
			};

			if purged.get(subscription.watched_dir.as_path()) == Some(&generation) {
				trace!(%id, path = %subscription.path.display(), "Subscription lost its watch;");
				subscription.watch = WatchState::Lost;
			}
		}
	}
}
