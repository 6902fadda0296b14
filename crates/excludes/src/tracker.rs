use crate::{
	ignore_file, notifier::ExcludesNotifier, EndpointId, ExcludesConfig, ExcludesError, Project,
	ProjectRegistry, RemoteTransmitter,
};

use std::{
	collections::{BTreeMap, HashSet},
	path::{Path, PathBuf},
	sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};
use wsa_fs_watcher::{Callbacks, ExcludeSet, FileWatcherManager, PathMatcher, RegistrationId};

/// Keeps the watcher's exclude set equal to what the projects' ignore files say.
///
/// Ignore files are found through two matcher subscriptions: one for the sentinel directory of
/// each project and one for the ignore file inside it.
pub struct IgnoreRuleTracker {
	manager: Arc<FileWatcherManager>,
	projects: Arc<dyn ProjectRegistry>,
	notifier: ExcludesNotifier,
	config: ExcludesConfig,
	registrations: Mutex<Vec<RegistrationId>>,
}

impl IgnoreRuleTracker {
	/// Loads every project's ignore file and starts following changes to them
	#[instrument(skip_all, fields(root = %projects.workspace_root().display()))]
	pub async fn start(
		manager: Arc<FileWatcherManager>,
		projects: Arc<dyn ProjectRegistry>,
		transmitter: Arc<dyn RemoteTransmitter>,
		config: ExcludesConfig,
	) -> Arc<Self> {
		let tracker = Arc::new(Self {
			manager,
			projects,
			notifier: ExcludesNotifier::new(transmitter),
			config,
			registrations: Mutex::default(),
		});

		tracker.watch_ignore_files();
		tracker.load_all();

		// Picks up the files that already exist without waiting for the first interval
		tracker.manager.rescan().await;

		info!(
			excludes = tracker.manager.excludes().all().len(),
			"Ignore rule tracker started;"
		);

		tracker
	}

	fn watch_ignore_files(self: &Arc<Self>) {
		let sentinel_dir = {
			let projects = Arc::clone(&self.projects);
			let sentinel_dir = self.config.sentinel_dir.clone();
			move |path: &Path| {
				path.file_name().is_some_and(|name| name == sentinel_dir.as_str())
					&& path.is_dir()
					&& is_project_base(projects.as_ref(), path.parent())
			}
		};

		let ignore_file = {
			let projects = Arc::clone(&self.projects);
			let relative = self.config.ignore_file();
			move |path: &Path| {
				path.ends_with(&relative)
					&& is_project_base(
						projects.as_ref(),
						path.parent().and_then(Path::parent),
					)
			}
		};

		// A project can exclude its own sentinel directory, its rules must stay live regardless
		let sentinel_callbacks = Callbacks::new()
			.on_create(self.callback(|tracker, path| tracker.reload_project_of(path)))
			.on_delete(self.callback(|tracker, path| tracker.forget_project_of(path)))
			.see_excluded();

		let ignore_file_callbacks = Callbacks::new()
			.on_create(self.callback(|tracker, path| tracker.reload_project_of(path)))
			.on_modify(self.callback(|tracker, path| tracker.reload_project_of(path)))
			.on_delete(self.callback(|tracker, path| tracker.forget_project_of(path)))
			.see_excluded();

		let mut registrations = self.registrations.lock();
		registrations.push(
			self.manager
				.register_by_matcher(Arc::new(sentinel_dir) as Arc<dyn PathMatcher>, sentinel_callbacks),
		);
		registrations.push(
			self.manager
				.register_by_matcher(Arc::new(ignore_file) as Arc<dyn PathMatcher>, ignore_file_callbacks),
		);
	}

	/// Callbacks only hold a weak reference, the manager must not keep the tracker alive
	fn callback(
		self: &Arc<Self>,
		f: impl Fn(&Self, &Path) + Send + Sync + 'static,
	) -> impl Fn(&str) + Send + Sync + 'static {
		let tracker: Weak<Self> = Arc::downgrade(self);
		move |path: &str| {
			if let Some(tracker) = tracker.upgrade() {
				f(&tracker, Path::new(path));
			}
		}
	}

	fn load_all(&self) {
		match self.projects.projects() {
			Ok(projects) => {
				for project in &projects {
					self.reload(project);
				}
			}
			Err(e) => error!(?e, "Failed to list projects;"),
		}
	}

	/// `path` is either a sentinel directory or an ignore file
	fn reload_project_of(&self, path: &Path) {
		if let Some(project) = self.projects.project_for(path) {
			self.reload(&project);
		}
	}

	fn forget_project_of(&self, path: &Path) {
		if let Some(project) = self.projects.project_for(path) {
			if self.manager.excludes().remove(&project.base) {
				debug!(project = %project.name, "Dropped project excludes;");
				self.broadcast();
			}
		}
	}

	fn ignore_file_of(&self, project: &Project) -> PathBuf {
		project.base.join(self.config.ignore_file())
	}

	/// Re-reads a project's ignore file, telling subscribers if the excludes changed
	fn reload(&self, project: &Project) {
		let excludes = match self.projects.read_file(&self.ignore_file_of(project)) {
			Ok(Some(contents)) => ignore_file::load(&project.base, &contents, |path| {
				self.projects.exists(path)
			}),
			Ok(None) => HashSet::new(),
			Err(e) => {
				error!(?e, project = %project.name, "Failed to read ignore file;");
				return;
			}
		};

		if self.manager.excludes().replace(&project.base, excludes) {
			debug!(project = %project.name, "Reloaded project excludes;");
			self.broadcast();
		}
	}

	/// Workspace paths of every exclude, sorted
	fn current(&self) -> Vec<String> {
		self.manager
			.excludes()
			.all()
			.iter()
			.filter_map(|path| {
				self.projects
					.to_workspace_path(path)
					.inspect_err(|e| warn!(?e, "Skipping exclude remote peers can't receive;"))
					.ok()
			})
			.collect()
	}

	fn broadcast(&self) {
		self.notifier.broadcast(|| self.current());
	}

	/// The new subscriber is told about the current excludes right away
	pub fn subscribe(&self, endpoint: EndpointId) {
		self.notifier.subscribe(endpoint, || self.current());
	}

	pub fn unsubscribe(&self, endpoint: &EndpointId) {
		self.notifier.unsubscribe(endpoint);
	}

	/// Adds workspace paths to their projects' ignore files.
	///
	/// Returns `false` when every path was already excluded. Nothing is written if any path is
	/// missing or outside every project, and a batch whose files can't all be written leaves
	/// them as they were.
	pub fn add_to_excludes(&self, paths: &[String]) -> Result<bool, ExcludesError> {
		self.try_add_to_excludes(paths)
			.inspect_err(|e| error!(?e, "Failed to add excludes;"))
	}

	fn try_add_to_excludes(&self, paths: &[String]) -> Result<bool, ExcludesError> {
		let mut additions = BTreeMap::<Project, Vec<String>>::new();

		for workspace_path in paths {
			let path = self.projects.to_absolute(workspace_path);

			if !self.projects.exists(&path) {
				return Err(ExcludesError::PathNotFound(workspace_path.clone()));
			}

			let project = self
				.projects
				.project_for(&path)
				.ok_or_else(|| ExcludesError::NoProject(workspace_path.clone()))?;

			if self.manager.excludes().is_excluded(&path) {
				debug!(%workspace_path, "Already excluded;");
				continue;
			}

			let entry = ignore_file::render(path.strip_prefix(&project.base).unwrap_or(&path));
			let entries = additions.entry(project).or_default();
			if !entries.contains(&entry) {
				entries.push(entry);
			}
		}

		if additions.is_empty() {
			return Ok(false);
		}

		let mut edits = Vec::with_capacity(additions.len());
		for (project, entries) in &additions {
			let file = self.ignore_file_of(project);
			let previous = self.projects.read_file(&file)?;
			let contents = ignore_file::append(previous.as_deref().unwrap_or_default(), entries);
			edits.push(IgnoreFileEdit {
				file,
				previous,
				contents,
			});
		}

		self.apply(&edits)?;

		for project in additions.keys() {
			self.reload(project);
		}

		Ok(true)
	}

	/// Writes every edit or, on the first failure, puts back the files already written
	fn apply(&self, edits: &[IgnoreFileEdit]) -> Result<(), ExcludesError> {
		for (idx, edit) in edits.iter().enumerate() {
			if let Err(e) = self.projects.write_file(&edit.file, &edit.contents) {
				for written in &edits[..idx] {
					let restored = written.previous.as_deref().unwrap_or_default();
					if let Err(e) = self.projects.write_file(&written.file, restored) {
						error!(?e, file = %written.file.display(), "Failed to restore ignore file;");
					}
				}

				return Err(e);
			}
		}

		Ok(())
	}

	/// Drops workspace paths from their projects' ignore files, returning whether any was there
	pub fn remove_from_excludes(&self, paths: &[String]) -> Result<bool, ExcludesError> {
		self.try_remove_from_excludes(paths)
			.inspect_err(|e| error!(?e, "Failed to remove excludes;"))
	}

	fn try_remove_from_excludes(&self, paths: &[String]) -> Result<bool, ExcludesError> {
		let mut removals = BTreeMap::<Project, HashSet<String>>::new();

		for workspace_path in paths {
			let path = self.projects.to_absolute(workspace_path);

			let project = self
				.projects
				.project_for(&path)
				.ok_or_else(|| ExcludesError::NoProject(workspace_path.clone()))?;

			let entry = ignore_file::render(path.strip_prefix(&project.base).unwrap_or(&path));
			if let Some(entry) = ignore_file::normalize(&entry) {
				removals
					.entry(project)
					.or_default()
					.insert(entry.to_string());
			}
		}

		let mut changed = vec![];
		let mut edits = vec![];

		for (project, entries) in removals {
			let file = self.ignore_file_of(&project);
			let Some(previous) = self.projects.read_file(&file)? else {
				continue;
			};

			let (contents, removed) = ignore_file::remove(&previous, &entries);
			if removed {
				edits.push(IgnoreFileEdit {
					file,
					previous: Some(previous),
					contents,
				});
				changed.push(project);
			}
		}

		self.apply(&edits)?;

		for project in &changed {
			self.reload(project);
		}

		Ok(!changed.is_empty())
	}

	#[must_use]
	pub fn excludes(&self) -> &ExcludeSet {
		self.manager.excludes()
	}

	#[must_use]
	pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
		self.manager.excludes().is_excluded(path)
	}

	/// Stops following ignore files; the excludes loaded so far stay in place
	pub fn shutdown(&self) {
		for id in self.registrations.lock().drain(..) {
			self.manager.unregister_by_matcher(id);
		}

		info!("Ignore rule tracker shutdown");
	}
}

/// A pending rewrite of one ignore file
struct IgnoreFileEdit {
	file: PathBuf,
	/// What to put back if the batch fails; a missing file comes back empty
	previous: Option<String>,
	contents: String,
}

fn is_project_base(projects: &dyn ProjectRegistry, dir: Option<&Path>) -> bool {
	dir.and_then(|dir| projects.project_for(dir))
		.is_some_and(|project| Some(project.base.as_path()) == dir)
}
