use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use wsa_watch_excludes::{EndpointId, JsonRpcError, RemoteTransmitter};

/// The peer on the other side of stdin/stdout
pub const STDIO_ENDPOINT: &str = "stdio";

/// JSON-RPC 2.0 request structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
	pub jsonrpc: String,
	pub method: String,
	#[serde(default)]
	pub params: Option<Value>,
	pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
	pub jsonrpc: String,
	pub id: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
	pub fn new(id: Option<Value>, outcome: Result<Value, JsonRpcError>) -> Self {
		let (result, error) = match outcome {
			Ok(result) => (Some(result), None),
			Err(e) => (None, Some(e)),
		};

		Self {
			jsonrpc: "2.0".to_string(),
			id,
			result,
			error,
		}
	}
}

#[derive(Debug, Serialize)]
struct JsonRpcNotification<'a> {
	jsonrpc: &'static str,
	method: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	params: Option<Value>,
}

/// Writes one JSON document per line to stdout
pub fn write_line(message: &impl Serialize) {
	let mut stdout = io::stdout().lock();

	let res = serde_json::to_writer(&mut stdout, message)
		.map_err(io::Error::from)
		.and_then(|()| stdout.write_all(b"\n"))
		.and_then(|()| stdout.flush());

	if let Err(e) = res {
		error!(?e, "Failed to write to stdout;");
	}
}

/// Delivers notifications for the stdio peer as JSON-RPC notification lines
pub struct StdoutTransmitter;

impl RemoteTransmitter for StdoutTransmitter {
	fn notify(&self, endpoint: &EndpointId, method: &str, params: Option<Value>) {
		if endpoint.0 != STDIO_ENDPOINT {
			error!(%endpoint, method, "No route to endpoint;");
			return;
		}

		write_line(&JsonRpcNotification {
			jsonrpc: "2.0",
			method,
			params,
		});
	}
}
