use std::{
	collections::{BTreeSet, HashMap, HashSet},
	path::{Path, PathBuf},
	sync::Arc,
};

use parking_lot::RwLock;

/// Excluded absolute paths, grouped by the project root whose ignore file produced them.
///
/// Cloning shares the same underlying set.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet(Arc<RwLock<HashMap<PathBuf, HashSet<PathBuf>>>>);

impl ExcludeSet {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// A path is excluded if it is, or lives under, any recorded exclude of any project
	#[must_use]
	pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
		let path = path.as_ref();

		self.0
			.read()
			.values()
			.flatten()
			.any(|excluded| path.starts_with(excluded))
	}

	/// Replaces a project's excludes wholesale, returning whether anything changed.
	///
	/// An empty set forgets the project.
	pub fn replace(&self, project: impl Into<PathBuf>, excludes: HashSet<PathBuf>) -> bool {
		let project = project.into();
		let mut projects = self.0.write();

		if excludes.is_empty() {
			return projects
				.remove(&project)
				.is_some_and(|previous| !previous.is_empty());
		}

		projects
			.insert(project, excludes.clone())
			.map_or(true, |previous| previous != excludes)
	}

	/// Forgets a project's excludes, returning whether it had any
	pub fn remove(&self, project: impl AsRef<Path>) -> bool {
		self.0
			.write()
			.remove(project.as_ref())
			.is_some_and(|previous| !previous.is_empty())
	}

	#[must_use]
	pub fn project_excludes(&self, project: impl AsRef<Path>) -> HashSet<PathBuf> {
		self.0
			.read()
			.get(project.as_ref())
			.cloned()
			.unwrap_or_default()
	}

	/// Every excluded path across all projects
	#[must_use]
	pub fn all(&self) -> BTreeSet<PathBuf> {
		self.0.read().values().flatten().cloned().collect()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.read().values().all(HashSet::is_empty)
	}
}
