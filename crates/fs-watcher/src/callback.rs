use std::{fmt, sync::Arc};

/// Receives the absolute path an event happened on
pub type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Create, modify and delete callbacks for one subscription, each independently optional.
///
/// A missing callback means the subscriber isn't interested in that kind of event.
#[derive(Clone, Default)]
pub struct Callbacks {
	pub(crate) on_create: Option<Callback>,
	pub(crate) on_modify: Option<Callback>,
	pub(crate) on_delete: Option<Callback>,
	pub(crate) see_excluded: bool,
}

impl Callbacks {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Not interested in anything; keeps the watch alive without reacting to it
	#[must_use]
	pub fn noop() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn on_create(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
		self.on_create = Some(Arc::new(f));
		self
	}

	#[must_use]
	pub fn on_modify(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
		self.on_modify = Some(Arc::new(f));
		self
	}

	#[must_use]
	pub fn on_delete(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
		self.on_delete = Some(Arc::new(f));
		self
	}

	/// Keep receiving events on paths the [`ExcludeSet`](crate::ExcludeSet) covers
	#[must_use]
	pub fn see_excluded(mut self) -> Self {
		self.see_excluded = true;
		self
	}

	pub(crate) fn for_kind(&self, kind: crate::WatchEventKind) -> Option<&Callback> {
		match kind {
			crate::WatchEventKind::Create => self.on_create.as_ref(),
			crate::WatchEventKind::Modify => self.on_modify.as_ref(),
			crate::WatchEventKind::Delete => self.on_delete.as_ref(),
		}
	}
}

impl fmt::Debug for Callbacks {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callbacks")
			.field("on_create", &self.on_create.is_some())
			.field("on_modify", &self.on_modify.is_some())
			.field("on_delete", &self.on_delete.is_some())
			.field("see_excluded", &self.see_excluded)
			.finish()
	}
}
