pub mod error;

use std::path::Path;

use error::NonUtf8PathError;

/// Borrow a path as UTF-8, failing with the offending path otherwise
pub fn path_to_str(path: &Path) -> Result<&str, NonUtf8PathError> {
	path.to_str().ok_or_else(|| NonUtf8PathError(path.into()))
}
