//! File system walker for discovering C/C++ sources to index.
//!
//! Honors `.gitignore` (without requiring a git repository), the
//! `.symgraphignore` file, configured glob ignore patterns, the configured
//! extension list and the maximum file size.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Settings;
use crate::config::IGNORE_FILE;

pub struct FileWalker {
    settings: Arc<Settings>,
}

impl FileWalker {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Walk `root` and return matching files in sorted order.
    pub fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false)
            .add_custom_ignore_filename(IGNORE_FILE);

        let mut overrides = ignore::overrides::OverrideBuilder::new(root);
        for pattern in &self.settings.indexing.ignore_patterns {
            // A leading `!` turns an override glob into an exclusion
            if let Err(e) = overrides.add(&format!("!{pattern}")) {
                tracing::warn!("[walker] invalid ignore pattern '{pattern}': {e}");
            }
        }
        match overrides.build() {
            Ok(overrides) => {
                builder.overrides(overrides);
            }
            Err(e) => tracing::warn!("[walker] ignoring override patterns: {e}"),
        }

        let indexing = &self.settings.indexing;
        let mut files: Vec<PathBuf> = builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter(|entry| indexing.accepts(entry.path()))
            .filter(|entry| {
                let within_limit = entry
                    .metadata()
                    .map(|m| m.len() <= indexing.max_file_size)
                    .unwrap_or(false);
                if !within_limit {
                    crate::debug_event!("walker", "skipped", "{} exceeds size limit", entry.path().display());
                }
                within_limit
            })
            .map(|entry| entry.into_path())
            .collect();

        files.sort();
        files
    }

    /// Whether a single path under `root` passes the extension and
    /// hidden-component filters. Used by the watcher, which sees paths one
    /// at a time.
    pub fn accepts(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        self.settings.indexing.accepts(path)
            && !relative.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .is_some_and(|s| s.starts_with('.') && s != "." && s != "..")
            })
    }
}

/// Project-relative, `/`-separated form of `path`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}
