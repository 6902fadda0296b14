use crate::ExcludesError;

use std::{
	fs,
	io::{self, Write},
	path::{Component, Path, PathBuf},
};

use tempfile::NamedTempFile;
use wsa_utils::{error::FileIOError, path_to_str};

/// A top level project of the workspace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Project {
	pub name: String,
	/// Absolute path of the project root
	pub base: PathBuf,
}

impl Project {
	/// `/name`, the project's path as remote peers see it
	#[must_use]
	pub fn workspace_path(&self) -> String {
		format!("/{}", self.name)
	}
}

/// Knows which projects exist and gives file access inside the workspace.
///
/// Workspace paths are `/`-rooted strings relative to the workspace root, e.g. `/P/src/Main.java`.
pub trait ProjectRegistry: Send + Sync {
	fn workspace_root(&self) -> &Path;

	fn projects(&self) -> Result<Vec<Project>, ExcludesError>;

	/// The project `path` belongs to, if any
	fn project_for(&self, path: &Path) -> Option<Project>;

	fn to_absolute(&self, workspace_path: &str) -> PathBuf {
		self.workspace_root()
			.join(workspace_path.trim_start_matches('/'))
	}

	fn to_workspace_path(&self, path: &Path) -> Result<String, ExcludesError> {
		let relative = path.strip_prefix(self.workspace_root()).unwrap_or(path);
		Ok(format!("/{}", path_to_str(relative)?.trim_start_matches('/')))
	}

	/// `None` when the file doesn't exist
	fn read_file(&self, path: &Path) -> Result<Option<String>, ExcludesError>;

	/// Replaces the whole file, creating missing parent directories
	fn write_file(&self, path: &Path, contents: &str) -> Result<(), ExcludesError>;

	fn exists(&self, path: &Path) -> bool;
}

/// Every direct, non hidden, sub-directory of the workspace root is a project
#[derive(Debug, Clone)]
pub struct FsProjectRegistry {
	root: PathBuf,
}

impl FsProjectRegistry {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn project_named(&self, name: &str) -> Option<Project> {
		if name.starts_with('.') {
			return None;
		}

		let base = self.root.join(name);
		base.is_dir().then(|| Project {
			name: name.to_string(),
			base,
		})
	}
}

impl ProjectRegistry for FsProjectRegistry {
	fn workspace_root(&self) -> &Path {
		&self.root
	}

	fn projects(&self) -> Result<Vec<Project>, ExcludesError> {
		let mut projects = fs::read_dir(&self.root)
			.map_err(|e| FileIOError::from((self.root.as_path(), e)))?
			.filter_map(Result::ok)
			.filter_map(|entry| {
				entry
					.file_name()
					.to_str()
					.and_then(|name| self.project_named(name))
			})
			.collect::<Vec<_>>();

		projects.sort();

		Ok(projects)
	}

	fn project_for(&self, path: &Path) -> Option<Project> {
		match path.strip_prefix(&self.root).ok()?.components().next()? {
			Component::Normal(name) => self.project_named(name.to_str()?),
			_ => None,
		}
	}

	fn read_file(&self, path: &Path) -> Result<Option<String>, ExcludesError> {
		match fs::read_to_string(path) {
			Ok(contents) => Ok(Some(contents)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(FileIOError::from((path, e)).into()),
		}
	}

	fn write_file(&self, path: &Path, contents: &str) -> Result<(), ExcludesError> {
		let parent = path.parent().unwrap_or(&self.root);

		fs::create_dir_all(parent).map_err(|e| FileIOError::from((parent, e)))?;

		// Written aside then renamed over, so readers never see a half written file
		let mut temp = NamedTempFile::new_in(parent).map_err(|e| FileIOError::from((parent, e)))?;
		temp.write_all(contents.as_bytes())
			.map_err(|e| FileIOError::from((temp.path(), e)))?;
		temp.persist(path)
			.map_err(|e| FileIOError::from((path, e.error)))?;

		Ok(())
	}

	fn exists(&self, path: &Path) -> bool {
		path.try_exists().unwrap_or(false)
	}
}
