use crate::{methods, EndpointId, ExcludesError, IgnoreRuleTracker, JsonRpcError};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{instrument, trace};

/// Answers the remote `fileWatcher/excludes/*` requests
#[derive(Clone)]
pub struct ExcludesRequestHandler {
	tracker: Arc<IgnoreRuleTracker>,
}

impl ExcludesRequestHandler {
	#[must_use]
	pub const fn new(tracker: Arc<IgnoreRuleTracker>) -> Self {
		Self { tracker }
	}

	#[instrument(skip(self, params), fields(%endpoint))]
	pub fn handle(
		&self,
		endpoint: &EndpointId,
		method: &str,
		params: Option<Value>,
	) -> Result<Value, JsonRpcError> {
		trace!("Handling excludes request");

		self.dispatch(endpoint, method, params).map_err(Into::into)
	}

	fn dispatch(
		&self,
		endpoint: &EndpointId,
		method: &str,
		params: Option<Value>,
	) -> Result<Value, ExcludesError> {
		match method {
			methods::SUBSCRIBE => {
				self.tracker.subscribe(endpoint.clone());
				Ok(Value::Null)
			}

			methods::UNSUBSCRIBE => {
				self.tracker.unsubscribe(endpoint);
				Ok(Value::Null)
			}

			methods::ADD_TO_EXCLUDES => self
				.tracker
				.add_to_excludes(&decode::<Vec<String>>(params)?)
				.map(Value::Bool),

			methods::REMOVE_FROM_EXCLUDES => self
				.tracker
				.remove_from_excludes(&decode::<Vec<String>>(params)?)
				.map(Value::Bool),

			unknown => Err(ExcludesError::UnknownMethod(unknown.to_string())),
		}
	}
}

fn decode<T: DeserializeOwned>(params: Option<Value>) -> Result<T, ExcludesError> {
	serde_json::from_value(params.unwrap_or_default()).map_err(Into::into)
}
