//! Reading and editing the plain text ignore file.
//!
//! One entry per line, relative to the project root. A lone `/` stands for the project root
//! itself; leading and trailing slashes are otherwise not significant.

use std::{
	collections::HashSet,
	path::{Path, PathBuf},
};

/// Normal form of one line: `None` for blank lines, `""` for the project root
#[must_use]
pub fn normalize(line: &str) -> Option<&str> {
	let line = line.trim();
	if line.is_empty() {
		return None;
	}

	Some(line.trim_matches('/'))
}

#[must_use]
pub fn resolve(project_base: &Path, entry: &str) -> PathBuf {
	if entry.is_empty() {
		project_base.to_path_buf()
	} else {
		project_base.join(entry)
	}
}

/// Absolute excluded paths listed in `contents`, keeping only the ones `exists` accepts
pub fn load(
	project_base: &Path,
	contents: &str,
	exists: impl Fn(&Path) -> bool,
) -> HashSet<PathBuf> {
	contents
		.lines()
		.filter_map(normalize)
		.map(|entry| resolve(project_base, entry))
		.filter(|path| exists(path))
		.collect()
}

/// How `relative` (to the project root) is written in the ignore file
#[must_use]
pub fn render(relative: &Path) -> String {
	let entry = relative
		.components()
		.map(|component| component.as_os_str().to_string_lossy())
		.collect::<Vec<_>>()
		.join("/");

	if entry.is_empty() {
		"/".to_string()
	} else {
		entry
	}
}

/// `contents` with `entries` added as new lines
#[must_use]
pub fn append(contents: &str, entries: &[String]) -> String {
	let mut appended = contents.to_string();

	if !appended.is_empty() && !appended.ends_with('\n') {
		appended.push('\n');
	}

	for entry in entries {
		appended.push_str(entry);
		appended.push('\n');
	}

	appended
}

/// `contents` without the lines naming any of `entries` (in normal form), and whether any went
#[must_use]
pub fn remove(contents: &str, entries: &HashSet<String>) -> (String, bool) {
	let mut removed = false;
	let mut kept = String::with_capacity(contents.len());

	for line in contents.lines() {
		if normalize(line).is_some_and(|entry| entries.contains(entry)) {
			removed = true;
		} else {
			kept.push_str(line);
			kept.push('\n');
		}
	}

	(kept, removed)
}
