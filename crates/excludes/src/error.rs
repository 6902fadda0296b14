use serde::{Deserialize, Serialize};
use thiserror::Error;
use wsa_utils::error::{FileIOError, NonUtf8PathError};

const BAD_REQUEST: i32 = 400;
const INTERNAL_SERVER_ERROR: i32 = 500;

#[derive(Error, Debug)]
pub enum ExcludesError {
	// User errors
	#[error("path not found: {0}")]
	PathNotFound(String),
	#[error("path doesn't belong to any project: {0}")]
	NoProject(String),
	#[error("invalid request parameters: {0}")]
	InvalidParams(#[from] serde_json::Error),
	#[error("unknown method: {0}")]
	UnknownMethod(String),
	#[error(transparent)]
	NonUtf8Path(#[from] NonUtf8PathError),

	// Internal Errors
	#[error(transparent)]
	FileIO(#[from] FileIOError),
}

/// Error answered to a remote invoker, with an HTTP like status code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
	pub code: i32,
	pub message: String,
}

impl From<ExcludesError> for JsonRpcError {
	fn from(err: ExcludesError) -> Self {
		let code = match err {
			ExcludesError::PathNotFound(_)
			| ExcludesError::NoProject(_)
			| ExcludesError::InvalidParams(_)
			| ExcludesError::UnknownMethod(_)
			| ExcludesError::NonUtf8Path(_) => BAD_REQUEST,

			ExcludesError::FileIO(_) => INTERNAL_SERVER_ERROR,
		};

		Self {
			code,
			message: err.to_string(),
		}
	}
}
