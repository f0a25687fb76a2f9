//! Recursive file system watching.
//!
//! ```text
//! notify callback --(bounded channel)--> worker thread --> ChangeQueue
//! ```
//!
//! The notify callback only maps events to [`ChangeEvent`]s and sends them
//! into a bounded channel. It never touches index state.

mod debouncer;
mod error;

use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

pub use debouncer::{ChangeKind, ChangeQueue, PendingChange};
pub use error::WatchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Map a notify event to per-path change kinds. Access events and
/// anything unrecognized are dropped.
pub fn classify(event: &Event) -> Vec<ChangeEvent> {
    let single = |kind: ChangeKind| -> Vec<ChangeEvent> {
        event
            .paths
            .iter()
            .map(|path| ChangeEvent {
                path: path.clone(),
                kind,
            })
            .collect()
    };

    match event.kind {
        EventKind::Create(_) => single(ChangeKind::Created),
        EventKind::Remove(_) => single(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => single(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => single(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => vec![
            ChangeEvent {
                path: event.paths[0].clone(),
                kind: ChangeKind::Deleted,
            },
            ChangeEvent {
                path: event.paths[1].clone(),
                kind: ChangeKind::Created,
            },
        ],
        // Metadata-only changes do not alter symbols
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) | EventKind::Any => single(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

/// Owns the notify watcher; dropping it stops event intake.
pub struct FileWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher").field("root", &self.root).finish()
    }
}

impl FileWatcher {
    /// Watch `root` recursively, forwarding accepted changes to `sender`.
    pub fn start(
        root: &Path,
        accept: impl Fn(&Path) -> bool + Send + 'static,
        sender: Sender<ChangeEvent>,
    ) -> Result<Self, WatchError> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in classify(&event) {
                    if accept(&change.path) {
                        // Blocks when the worker falls behind; fails only
                        // once the worker is gone
                        let _ = sender.send(change);
                    }
                }
            }
            Err(e) => tracing::warn!("[watcher] event error: {e}"),
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

        crate::debug_event!("watcher", "started", "{}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
