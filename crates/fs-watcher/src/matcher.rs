use crate::WatcherError;

use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Predicate deciding whether a path found while walking the root belongs to a subscription
pub trait PathMatcher: Send + Sync {
	fn matches(&self, path: &Path) -> bool;
}

impl<F> PathMatcher for F
where
	F: Fn(&Path) -> bool + Send + Sync,
{
	fn matches(&self, path: &Path) -> bool {
		self(path)
	}
}

/// Two matchers are the same subscription target only if they are the same allocation
pub(crate) fn same_matcher(a: &Arc<dyn PathMatcher>, b: &Arc<dyn PathMatcher>) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Matches paths whose file name, or path relative to `root`, satisfies any of the globs
#[derive(Debug, Clone)]
pub struct GlobMatcher {
	root: PathBuf,
	globs: GlobSet,
}

impl GlobMatcher {
	pub fn new(
		root: impl Into<PathBuf>,
		globs: impl IntoIterator<Item = impl AsRef<str>>,
	) -> Result<Self, WatcherError> {
		let globs = globs
			.into_iter()
			.map(|glob| Glob::new(glob.as_ref()))
			.collect::<Result<Vec<_>, _>>()?
			.into_iter()
			.fold(&mut GlobSetBuilder::new(), |builder, glob| builder.add(glob))
			.build()?;

		Ok(Self {
			root: root.into(),
			globs,
		})
	}
}

impl PathMatcher for GlobMatcher {
	fn matches(&self, path: &Path) -> bool {
		path.file_name()
			.is_some_and(|file_name| self.globs.is_match(file_name))
			|| path
				.strip_prefix(&self.root)
				.is_ok_and(|relative| self.globs.is_match(relative))
	}
}
