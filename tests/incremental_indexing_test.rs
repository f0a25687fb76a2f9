//! Incremental updates: manual queueing, forced updates, fallback and the
//! live watcher.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use symgraph::storage::{MemoryVectorStore, VectorDocument};
use symgraph::{
    ChangeKind, IncrementalIndexer, IndexError, IndexResult, IndexerState, ProjectIndexer, Settings, VectorStore,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    project: PathBuf,
    indexer: Arc<ProjectIndexer>,
}

fn fixture(debounce_ms: u64) -> Fixture {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("app");
    fs::create_dir_all(project.join("src")).unwrap();
    fs::write(project.join("src/main.c"), "int helper(int);\nint main(void) { return helper(1); }\n").unwrap();
    fs::write(project.join("src/helper.c"), "int helper(int x) { return x + 1; }\n").unwrap();

    let mut settings = Settings::default();
    settings.index_path = dir.path().join("index");
    settings.indexing.parallel_threads = 2;
    settings.watch.debounce_ms = debounce_ms;
    settings.watch.tick_ms = 20;

    Fixture {
        indexer: Arc::new(ProjectIndexer::new(Arc::new(settings)).unwrap()),
        project,
        _dir: dir,
    }
}

fn names(indexer: &IncrementalIndexer) -> HashSet<String> {
    indexer.index().symbols().iter().map(|s| s.name.clone()).collect()
}

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    condition()
}

#[test]
fn test_delete_removes_symbols_and_edges() {
    let fx = fixture(0);
    let incremental = IncrementalIndexer::new(fx.indexer.clone(), &fx.project).unwrap();
    assert_eq!(incremental.index().graph().edge_count(), 1);

    fs::remove_file(fx.project.join("src/helper.c")).unwrap();
    assert!(incremental.queue_file_change("src/helper.c", ChangeKind::Deleted));
    assert_eq!(incremental.process_pending().unwrap(), 1);

    assert_eq!(names(&incremental), HashSet::from(["main".to_string()]));
    assert_eq!(incremental.index().graph().edge_count(), 0);
    assert!(!incremental.index().contains_file("src/helper.c"));

    // Persisted state matches the live index
    let reloaded = fx.indexer.load(&fx.project).unwrap().unwrap();
    assert!(reloaded.find_by_name("helper").is_empty());
}

#[test]
fn test_modify_re_resolves_calls() {
    let fx = fixture(0);
    let incremental = IncrementalIndexer::new(fx.indexer.clone(), &fx.project).unwrap();

    fs::write(
        fx.project.join("src/helper.c"),
        "int twice(int x) { return x * 2; }\nint helper(int x) { return twice(x); }\n",
    )
    .unwrap();
    incremental.queue_file_change(fx.project.join("src/helper.c"), ChangeKind::Modified);
    incremental.process_pending().unwrap();

    let index = incremental.index();
    let main = index.find_by_name("main")[0].id.clone();
    let reached: HashSet<String> = index.callees(&main, 2).iter().map(|s| s.name.clone()).collect();
    assert_eq!(reached, HashSet::from(["helper".to_string(), "twice".to_string()]));
}

#[test]
fn test_created_file_joins_existing_calls() {
    let fx = fixture(0);
    fs::write(fx.project.join("src/main.c"), "int main(void) { return later(); }\n").unwrap();
    let incremental = IncrementalIndexer::new(fx.indexer.clone(), &fx.project).unwrap();
    assert_eq!(incremental.index().graph().edge_count(), 0);

    fs::write(fx.project.join("src/later.c"), "int later(void) { return 0; }\n").unwrap();
    incremental.queue_file_change("src/later.c", ChangeKind::Created);
    incremental.process_pending().unwrap();

    let index = incremental.index();
    let later = index.find_by_name("later")[0].id.clone();
    let callers: Vec<&str> = index.callers(&later, 1).iter().map(|s| s.name.as_str()).collect();
    assert_eq!(callers, vec!["main"]);
}

#[test]
fn test_incremental_matches_full_rebuild() {
    let fx = fixture(0);
    let incremental = IncrementalIndexer::new(fx.indexer.clone(), &fx.project).unwrap();

    fs::write(fx.project.join("src/extra.h"), "#define EXTRA 1\ntypedef int extra_t;\n").unwrap();
    fs::remove_file(fx.project.join("src/helper.c")).unwrap();
    incremental.queue_file_change("src/extra.h", ChangeKind::Created);
    incremental.queue_file_change("src/helper.c", ChangeKind::Deleted);
    assert_eq!(incremental.process_pending().unwrap(), 2);

    let live = incremental.index().snapshot();
    let rebuilt = fx.indexer.rebuild(incremental.project_id(), &fx.project).unwrap().snapshot();
    assert_eq!(live.symbols, rebuilt.symbols);
    assert_eq!(live.files, rebuilt.files);
}

#[test]
fn test_changes_wait_for_debounce() {
    let fx = fixture(60_000);
    let incremental = IncrementalIndexer::new(fx.indexer.clone(), &fx.project).unwrap();

    incremental.queue_file_change("src/helper.c", ChangeKind::Modified);
    assert_eq!(incremental.process_pending().unwrap(), 0);
    assert_eq!(incremental.statistics().pending_changes, 1);

    // Files outside the configured extensions are never queued
    assert!(!incremental.queue_file_change("notes.txt", ChangeKind::Created));
    assert_eq!(incremental.statistics().changes_detected, 1);

    // force_update bypasses the window and consumes the pending entry
    assert_eq!(incremental.force_update(&[PathBuf::from("src/helper.c")]).unwrap(), 1);
    assert_eq!(incremental.statistics().pending_changes, 0);
}

/// Fails every per-file delete so incremental batches cannot apply, while
/// full rebuilds (clear + upsert) still succeed.
#[derive(Default)]
struct BrokenDeletes {
    inner: MemoryVectorStore,
    tripped: AtomicBool,
}

impl VectorStore for BrokenDeletes {
    fn upsert(&self, documents: Vec<VectorDocument>) -> IndexResult<()> {
        self.inner.upsert(documents)
    }

    fn delete_by_file(&self, _project_id: &str, file_path: &str) -> IndexResult<usize> {
        self.tripped.store(true, Ordering::SeqCst);
        Err(IndexError::General(format!("cannot delete {file_path}")))
    }

    fn clear(&self, project_id: &str) -> IndexResult<()> {
        self.inner.clear(project_id)
    }
}

#[test]
fn test_failed_batch_falls_back_to_full_rebuild() {
    let fx = fixture(0);
    let vectors = Arc::new(BrokenDeletes::default());
    let settings = fx.indexer.settings().clone();
    let indexer = Arc::new(ProjectIndexer::new(settings).unwrap().with_vector_store(vectors.clone()));
    let incremental = IncrementalIndexer::new(indexer, &fx.project).unwrap();

    fs::write(fx.project.join("src/helper.c"), "int renamed(int x) { return x; }\n").unwrap();
    incremental.queue_file_change("src/helper.c", ChangeKind::Modified);
    incremental.process_pending().unwrap();

    assert!(vectors.tripped.load(Ordering::SeqCst));
    let stats = incremental.statistics();
    assert_eq!(stats.full_rebuilds, 1);
    assert_eq!(stats.incremental_updates, 0);

    let current = names(&incremental);
    assert!(current.contains("renamed"));
    assert!(!current.contains("helper"));
    assert_eq!(vectors.inner.files(), vec!["src/helper.c".to_string(), "src/main.c".to_string()]);
}

#[test]
fn test_watcher_applies_file_changes() {
    let fx = fixture(50);
    let incremental = IncrementalIndexer::new(fx.indexer.clone(), &fx.project).unwrap();
    assert_eq!(incremental.state(), IndexerState::Idle);

    assert!(incremental.start_monitoring());
    assert!(incremental.is_monitoring());

    let path: &Path = &fx.project.join("src/watched.c");
    fs::write(path, "void watched(void) { helper(2); }\n").unwrap();
    assert!(
        wait_for(Duration::from_secs(10), || names(&incremental).contains("watched")),
        "watcher never picked up the new file"
    );

    {
        let index = incremental.index();
        let watched = index.find_by_name("watched")[0].id.clone();
        let callees: Vec<&str> = index.callees(&watched, 1).iter().map(|s| s.name.as_str()).collect();
        assert_eq!(callees, vec!["helper"]);
    }

    fs::remove_file(path).unwrap();
    assert!(
        wait_for(Duration::from_secs(10), || !names(&incremental).contains("watched")),
        "watcher never picked up the deletion"
    );

    incremental.stop_monitoring();
    assert!(!incremental.is_monitoring());
    assert_eq!(incremental.state(), IndexerState::Idle);
    assert!(incremental.statistics().incremental_updates >= 2);
}
