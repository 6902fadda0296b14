use std::path::{Path, PathBuf};

use notify::{
	event::{ModifyKind, RenameMode},
	Event, EventKind,
};

/// The three kinds of change a subscriber can be told about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
	Create,
	Modify,
	Delete,
}

/// Flattens a native event into `(path, kind)` pairs, in the order they must be dispatched.
///
/// Access events and anything we can't classify are dropped. Ambiguous renames are settled by
/// checking whether the path still exists.
pub(crate) fn resolve(event: Event) -> Vec<(PathBuf, WatchEventKind)> {
	let Event { kind, paths, .. } = event;

	match kind {
		EventKind::Create(_) => with_kind(paths, WatchEventKind::Create),

		EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
			with_kind(paths, WatchEventKind::Delete)
		}

		EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
			with_kind(paths, WatchEventKind::Create)
		}

		EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
			let mut paths = paths.into_iter();
			paths
				.next()
				.map(|from| (from, WatchEventKind::Delete))
				.into_iter()
				.chain(paths.map(|to| (to, WatchEventKind::Create)))
				.collect()
		}

		EventKind::Modify(ModifyKind::Name(_)) => paths
			.into_iter()
			.map(|path| {
				let kind = if exists(&path) {
					WatchEventKind::Create
				} else {
					WatchEventKind::Delete
				};
				(path, kind)
			})
			.collect(),

		EventKind::Modify(_) => with_kind(paths, WatchEventKind::Modify),

		EventKind::Any => paths
			.into_iter()
			.map(|path| {
				let kind = if exists(&path) {
					WatchEventKind::Modify
				} else {
					WatchEventKind::Delete
				};
				(path, kind)
			})
			.collect(),

		EventKind::Access(_) | EventKind::Other => vec![],
	}
}

/// Whether [`resolve`] could turn `event` into a deletion
pub(crate) const fn may_delete(event: &Event) -> bool {
	matches!(
		event.kind,
		EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) | EventKind::Any
	)
}

fn with_kind(paths: Vec<PathBuf>, kind: WatchEventKind) -> Vec<(PathBuf, WatchEventKind)> {
	paths.into_iter().map(|path| (path, kind)).collect()
}

fn exists(path: &Path) -> bool {
	path.try_exists().unwrap_or(false)
}
