use std::{collections::BTreeSet, fmt, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

/// Wire names of the remote methods
pub mod methods {
	pub const SUBSCRIBE: &str = "fileWatcher/excludes/subscribe";
	pub const UNSUBSCRIBE: &str = "fileWatcher/excludes/unsubscribe";
	pub const CHANGED: &str = "fileWatcher/excludes/changed";
	pub const CLEANUP: &str = "fileWatcher/excludes/cleanup";
	pub const ADD_TO_EXCLUDES: &str = "fileWatcher/excludes/addToExcludes";
	pub const REMOVE_FROM_EXCLUDES: &str = "fileWatcher/excludes/removeFromExcludes";
}

/// A remote peer able to receive notifications
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub String);

impl fmt::Display for EndpointId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for EndpointId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

/// Fire and forget delivery of a notification to one endpoint
pub trait RemoteTransmitter: Send + Sync {
	fn notify(&self, endpoint: &EndpointId, method: &str, params: Option<Value>);
}

/// Endpoints subscribed to exclude changes
pub(crate) struct ExcludesNotifier {
	transmitter: Arc<dyn RemoteTransmitter>,
	subscribers: Mutex<BTreeSet<EndpointId>>,
}

impl ExcludesNotifier {
	pub(crate) fn new(transmitter: Arc<dyn RemoteTransmitter>) -> Self {
		Self {
			transmitter,
			subscribers: Mutex::default(),
		}
	}

	/// Sends the excludes computed by `current` to `endpoint`, then adds it to the subscribers.
	///
	/// Broadcasts are held off meanwhile, so the endpoint can't miss one nor receive an older
	/// state after a newer one.
	pub(crate) fn subscribe(&self, endpoint: EndpointId, current: impl FnOnce() -> Vec<String>) {
		let mut subscribers = self.subscribers.lock();
		self.send(&endpoint, &current());

		trace!(%endpoint, "Endpoint subscribed to excludes;");
		subscribers.insert(endpoint);
	}

	pub(crate) fn unsubscribe(&self, endpoint: &EndpointId) {
		trace!(%endpoint, "Endpoint unsubscribed from excludes;");
		self.subscribers.lock().remove(endpoint);
	}

	/// Sends `excludes` to a single endpoint; an empty list is sent as a cleanup
	pub(crate) fn send(&self, endpoint: &EndpointId, excludes: &[String]) {
		if excludes.is_empty() {
			self.transmitter.notify(endpoint, methods::CLEANUP, None);
		} else {
			self.transmitter.notify(
				endpoint,
				methods::CHANGED,
				Some(Value::from(excludes.to_vec())),
			);
		}
	}

	/// `current` runs under the subscribers lock, so what each endpoint last got is the latest
	pub(crate) fn broadcast(&self, current: impl FnOnce() -> Vec<String>) {
		let subscribers = self.subscribers.lock();
		let excludes = current();

		for endpoint in subscribers.iter() {
			self.send(endpoint, &excludes);
		}
	}
}
