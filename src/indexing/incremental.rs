//! Incremental re-indexing driven by file system events.
//!
//! State machine per project:
//!
//! ```text
//! Idle -> Watching -> (event) -> Queued -> (debounce elapsed) -> Processing -> Watching
//! ```
//!
//! One worker thread owns the event receiver. It records incoming events in
//! the [`ChangeQueue`] and, on every tick, drains one capped batch of ready
//! changes under the processing mutex, so only one batch ever mutates the
//! index at a time. A batch that fails to apply falls back to a full
//! rebuild of the project.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::Serialize;

use super::indexer::ProjectIndexer;
use super::project::ProjectIndex;
use super::walker::{FileWalker, relative_path};
use crate::error::{IndexError, IndexResult};
use crate::parsing::FileExtraction;
use crate::storage::VectorDocument;
use crate::watcher::{ChangeEvent, ChangeKind, ChangeQueue, FileWatcher, PendingChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerState {
    Idle,
    Watching,
    Queued,
    Processing,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncrementalStats {
    pub files_monitored: usize,
    pub changes_detected: u64,
    pub incremental_updates: u64,
    pub full_rebuilds: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub is_monitoring: bool,
    pub pending_changes: usize,
}

#[derive(Debug, Default)]
struct Counters {
    changes_detected: u64,
    incremental_updates: u64,
    full_rebuilds: u64,
    last_update: Option<DateTime<Utc>>,
}

struct Shared {
    indexer: Arc<ProjectIndexer>,
    project_id: String,
    root: PathBuf,
    index: RwLock<ProjectIndex>,
    queue: Mutex<ChangeQueue>,
    processing: Mutex<()>,
    busy: AtomicBool,
    monitoring: AtomicBool,
    counters: Mutex<Counters>,
    batch_size: usize,
}

struct Monitor {
    watcher: FileWatcher,
    stop: Sender<()>,
    worker: JoinHandle<()>,
}

pub struct IncrementalIndexer {
    shared: Arc<Shared>,
    monitor: Mutex<Option<Monitor>>,
}

impl IncrementalIndexer {
    /// Open (load or build) the index for `root` and prepare to monitor it.
    pub fn new(indexer: Arc<ProjectIndexer>, root: &Path) -> IndexResult<Self> {
        let index = indexer.open(root)?;
        Ok(Self::with_index(indexer, index))
    }

    pub fn with_index(indexer: Arc<ProjectIndexer>, index: ProjectIndex) -> Self {
        let watch = &indexer.settings().watch;
        let queue = ChangeQueue::new(watch.debounce_ms);
        let batch_size = watch.batch_size.max(1);

        Self {
            shared: Arc::new(Shared {
                project_id: index.project_id().to_string(),
                root: index.root().to_path_buf(),
                index: RwLock::new(index),
                queue: Mutex::new(queue),
                processing: Mutex::new(()),
                busy: AtomicBool::new(false),
                monitoring: AtomicBool::new(false),
                counters: Mutex::new(Counters::default()),
                batch_size,
                indexer,
            }),
            monitor: Mutex::new(None),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.shared.project_id
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Read access to the live index.
    pub fn index(&self) -> RwLockReadGuard<'_, ProjectIndex> {
        self.shared.index.read()
    }

    /// Start watching the project root. Returns false when the watcher or
    /// worker could not be started; the failure is logged.
    pub fn start_monitoring(&self) -> bool {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return true;
        }

        let watch = &self.shared.indexer.settings().watch;
        let (event_tx, event_rx) = bounded::<ChangeEvent>(watch.queue_capacity.max(1));
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let tick_every = Duration::from_millis(watch.tick_ms.max(1));

        let root = self.shared.root.clone();
        let walker = FileWalker::new(self.shared.indexer.settings().clone());
        let accept = move |path: &Path| walker.accepts(&root, path);

        let watcher = match FileWatcher::start(&self.shared.root, accept, event_tx) {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::warn!("[incremental] {}", IndexError::from(e));
                return false;
            }
        };

        let shared = self.shared.clone();
        let worker = std::thread::Builder::new()
            .name(format!("symgraph-watch-{}", self.shared.project_id))
            .spawn(move || shared.run_worker(event_rx, stop_rx, tick_every));
        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                tracing::warn!(
                    "[incremental] {}",
                    IndexError::WatchStartFailure {
                        reason: format!("worker thread: {e}")
                    }
                );
                return false;
            }
        };

        self.shared.monitoring.store(true, Ordering::SeqCst);
        *monitor = Some(Monitor {
            watcher,
            stop: stop_tx,
            worker,
        });
        crate::log_event!("incremental", "monitoring", "{}", self.shared.root.display());
        true
    }

    /// Stop intake, join the worker and discard undrained changes.
    pub fn stop_monitoring(&self) {
        let Some(monitor) = self.monitor.lock().take() else {
            return;
        };
        drop(monitor.watcher);
        let _ = monitor.stop.send(());
        if monitor.worker.join().is_err() {
            tracing::warn!("[incremental] worker thread panicked");
        }
        self.shared.monitoring.store(false, Ordering::SeqCst);
        self.shared.queue.lock().clear();
        crate::log_event!("incremental", "stopped", "{}", self.shared.project_id);
    }

    pub fn is_monitoring(&self) -> bool {
        self.shared.monitoring.load(Ordering::SeqCst)
    }

    /// Queue a change by hand. Paths outside the configured extensions are
    /// ignored; returns whether the change was queued.
    pub fn queue_file_change(&self, path: impl Into<PathBuf>, kind: ChangeKind) -> bool {
        let path = self.shared.absolute(path.into());
        if !self.shared.accepts(&path) {
            return false;
        }
        self.shared.record(ChangeEvent { path, kind });
        true
    }

    /// Apply one batch of changes whose debounce window has elapsed.
    /// Returns how many changes were applied.
    pub fn process_pending(&self) -> IndexResult<usize> {
        self.shared.process_ready()
    }

    /// Re-extract `paths` immediately, bypassing the debounce window. An
    /// empty list forces a full rebuild.
    pub fn force_update(&self, paths: &[PathBuf]) -> IndexResult<usize> {
        let _processing = self.shared.processing.lock();
        if paths.is_empty() {
            self.shared.fallback()?;
            return Ok(0);
        }

        let batch: Vec<PendingChange> = paths
            .iter()
            .map(|path| {
                let path = self.shared.absolute(path.clone());
                self.shared.queue.lock().remove(&path);
                PendingChange {
                    path,
                    kind: ChangeKind::Modified,
                }
            })
            .collect();
        self.shared.apply_or_rebuild(batch)
    }

    pub fn state(&self) -> IndexerState {
        if self.shared.busy.load(Ordering::SeqCst) {
            IndexerState::Processing
        } else if !self.is_monitoring() {
            IndexerState::Idle
        } else if self.shared.queue.lock().has_pending() {
            IndexerState::Queued
        } else {
            IndexerState::Watching
        }
    }

    pub fn statistics(&self) -> IncrementalStats {
        let counters = self.shared.counters.lock();
        IncrementalStats {
            files_monitored: self.shared.index.read().files().count(),
            changes_detected: counters.changes_detected,
            incremental_updates: counters.incremental_updates,
            full_rebuilds: counters.full_rebuilds,
            last_update: counters.last_update,
            is_monitoring: self.is_monitoring(),
            pending_changes: self.shared.queue.lock().len(),
        }
    }
}

impl Drop for IncrementalIndexer {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

impl Shared {
    fn absolute(&self, path: PathBuf) -> PathBuf {
        if path.is_relative() {
            self.root.join(path)
        } else {
            path
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        self.indexer.walker().accepts(&self.root, path)
    }

    fn record(&self, event: ChangeEvent) {
        crate::debug_event!("incremental", "queued", "{:?} {}", event.kind, event.path.display());
        self.queue.lock().record(event.path, event.kind);
        self.counters.lock().changes_detected += 1;
    }

    fn run_worker(&self, events: Receiver<ChangeEvent>, stop: Receiver<()>, tick_every: Duration) {
        let ticker = tick(tick_every);
        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(event) => self.record(event),
                    Err(_) => break,
                },
                recv(stop) -> _ => break,
                recv(ticker) -> _ => {
                    if let Err(e) = self.process_ready() {
                        tracing::error!("[incremental] {e}");
                    }
                }
            }
        }
        crate::debug_event!("incremental", "worker exit", "{}", self.project_id);
    }

    fn process_ready(&self) -> IndexResult<usize> {
        let _processing = self.processing.lock();
        let batch = self.queue.lock().take_ready(self.batch_size);
        if batch.is_empty() {
            return Ok(0);
        }
        self.apply_or_rebuild(batch)
    }

    /// Caller holds the processing mutex.
    fn apply_or_rebuild(&self, batch: Vec<PendingChange>) -> IndexResult<usize> {
        self.busy.store(true, Ordering::SeqCst);
        let count = batch.len();
        let result = self.apply_batch(batch);
        let outcome = match result {
            Ok(()) => {
                let mut counters = self.counters.lock();
                counters.incremental_updates += 1;
                counters.last_update = Some(Utc::now());
                crate::debug_event!("incremental", "applied", "{count} changes");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("[incremental] {e}; falling back to full rebuild");
                self.fallback().map(|()| count)
            }
        };
        self.busy.store(false, Ordering::SeqCst);
        outcome
    }

    fn apply_batch(&self, batch: Vec<PendingChange>) -> IndexResult<()> {
        let failed = |e: IndexError| IndexError::IncrementalApplyFailure { reason: e.to_string() };
        let merger = self.indexer.merger();

        // Parse outside the index lock
        let mut updates: Vec<(String, Option<FileExtraction>)> = Vec::with_capacity(batch.len());
        for change in batch {
            let rel = relative_path(&self.root, &change.path);
            let extraction = match change.kind {
                ChangeKind::Deleted => None,
                ChangeKind::Created | ChangeKind::Modified if !change.path.is_file() => None,
                ChangeKind::Created | ChangeKind::Modified => {
                    let (_, extraction) = merger.extract_file(&self.root, &change.path).map_err(failed)?;
                    Some(extraction)
                }
            };
            updates.push((rel, extraction));
        }

        let lock = self.indexer.project_lock(&self.project_id);
        let _guard = lock.lock();
        let vectors = self.indexer.vectors();
        let mut index = self.index.write();

        for (rel, extraction) in updates {
            vectors.delete_by_file(&self.project_id, &rel).map_err(failed)?;
            match extraction {
                None => {
                    let removed = index.remove_file(&rel);
                    crate::debug_event!("incremental", "removed", "{rel}: {} symbols", removed.len());
                }
                Some(extraction) => {
                    index.replace_file(&rel, extraction);
                    let documents: Vec<VectorDocument> = index
                        .symbols_in_file(&rel)
                        .into_iter()
                        .map(|symbol| VectorDocument::from_symbol(&self.project_id, symbol))
                        .collect();
                    vectors.upsert(documents).map_err(failed)?;
                }
            }
        }

        self.indexer.persist(&index, |_| {}).map_err(failed)?;
        Ok(())
    }

    /// Full rebuild replacing the live index. Caller holds the processing
    /// mutex.
    fn fallback(&self) -> IndexResult<()> {
        let rebuilt = self.indexer.rebuild(&self.project_id, &self.root)?;
        *self.index.write() = rebuilt;
        let mut counters = self.counters.lock();
        counters.full_rebuilds += 1;
        counters.last_update = Some(Utc::now());
        crate::log_event!("incremental", "full rebuild", "{}", self.project_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Settings;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _workspace: TempDir,
        project: PathBuf,
        indexer: Arc<ProjectIndexer>,
    }

    fn fixture(debounce_ms: u64) -> Fixture {
        let workspace = TempDir::new().unwrap();
        let project = workspace.path().join("proj");
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("foo.c"), "int foo(void) { return bar(); }\n").unwrap();
        fs::write(project.join("bar.c"), "int bar(void) { return 1; }\n").unwrap();

        let mut settings = Settings::default();
        settings.index_path = workspace.path().join("index");
        settings.indexing.parallel_threads = 1;
        settings.watch.debounce_ms = debounce_ms;
        settings.watch.tick_ms = 10;
        let indexer = Arc::new(ProjectIndexer::new(Arc::new(settings)).unwrap());
        Fixture {
            project: project.canonicalize().unwrap(),
            _workspace: workspace,
            indexer,
        }
    }

    #[test]
    fn test_delete_removes_symbols() {
        let f = fixture(0);
        let incremental = IncrementalIndexer::new(f.indexer.clone(), &f.project).unwrap();

        fs::remove_file(f.project.join("bar.c")).unwrap();
        assert!(incremental.queue_file_change("bar.c", ChangeKind::Deleted));
        assert_eq!(incremental.process_pending().unwrap(), 1);

        let index = incremental.index();
        assert!(index.symbols_in_file("bar.c").is_empty());
        assert!(index.find_by_name("bar").is_empty());
        drop(index);

        let stats = incremental.statistics();
        assert_eq!(stats.incremental_updates, 1);
        assert_eq!(stats.full_rebuilds, 0);
        assert_eq!(stats.changes_detected, 1);
        assert_eq!(stats.files_monitored, 1);
    }

    #[test]
    fn test_pending_waits_for_window() {
        let f = fixture(60_000);
        let incremental = IncrementalIndexer::new(f.indexer.clone(), &f.project).unwrap();

        assert!(incremental.queue_file_change("foo.c", ChangeKind::Modified));
        assert!(!incremental.queue_file_change("notes.txt", ChangeKind::Modified));
        assert_eq!(incremental.process_pending().unwrap(), 0);
        assert_eq!(incremental.statistics().pending_changes, 1);
        // Not monitoring, so the queue does not change the state
        assert_eq!(incremental.state(), IndexerState::Idle);
    }

    #[test]
    fn test_force_update_reparses_now() {
        let f = fixture(60_000);
        let incremental = IncrementalIndexer::new(f.indexer.clone(), &f.project).unwrap();

        fs::write(f.project.join("bar.c"), "int baz(void) { return 2; }\n").unwrap();
        assert_eq!(incremental.force_update(&[PathBuf::from("bar.c")]).unwrap(), 1);

        let index = incremental.index();
        assert!(index.find_by_name("bar").is_empty());
        assert_eq!(index.find_by_name("baz").len(), 1);
    }

    #[test]
    fn test_force_update_empty_is_full_rebuild() {
        let f = fixture(0);
        let incremental = IncrementalIndexer::new(f.indexer.clone(), &f.project).unwrap();
        incremental.force_update(&[]).unwrap();
        assert_eq!(incremental.statistics().full_rebuilds, 1);
    }

    #[test]
    fn test_start_and_stop_monitoring() {
        let f = fixture(0);
        let incremental = IncrementalIndexer::new(f.indexer.clone(), &f.project).unwrap();
        assert_eq!(incremental.state(), IndexerState::Idle);

        assert!(incremental.start_monitoring());
        assert!(incremental.start_monitoring());
        assert!(incremental.is_monitoring());

        incremental.stop_monitoring();
        assert!(!incremental.is_monitoring());
        assert_eq!(incremental.state(), IndexerState::Idle);
        assert_eq!(incremental.statistics().pending_changes, 0);
    }
}
