//! Debounce queue for file change events.
//!
//! Each path keeps one entry with a coalesced change kind and the time of
//! its last event. An entry becomes ready once it has been quiet for the
//! debounce window. Ready entries leave in the order their paths were last
//! touched, capped per batch; the rest stay queued ahead of newer entries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Kind recorded when `next` follows `self` for the same path.
    pub fn coalesce(self, next: ChangeKind) -> ChangeKind {
        match (self, next) {
            (_, ChangeKind::Deleted) => ChangeKind::Deleted,
            (ChangeKind::Deleted, _) => ChangeKind::Modified,
            (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
            (_, next) => next,
        }
    }
}

/// A change that survived debouncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

#[derive(Debug)]
struct Entry {
    kind: ChangeKind,
    last_change: Instant,
    seq: u64,
}

#[derive(Debug)]
pub struct ChangeQueue {
    pending: HashMap<PathBuf, Entry>,
    window: Duration,
    next_seq: u64,
}

impl ChangeQueue {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            window: Duration::from_millis(debounce_ms),
            next_seq: 0,
        }
    }

    /// Record a change, resetting the path's debounce timer.
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        self.record_at(path, kind, Instant::now());
    }

    pub(crate) fn record_at(&mut self, path: PathBuf, kind: ChangeKind, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending
            .entry(path)
            .and_modify(|entry| {
                entry.kind = entry.kind.coalesce(kind);
                entry.last_change = now;
                entry.seq = seq;
            })
            .or_insert(Entry {
                kind,
                last_change: now,
                seq,
            });
    }

    /// Take up to `limit` changes that have been quiet for the window.
    pub fn take_ready(&mut self, limit: usize) -> Vec<PendingChange> {
        self.take_ready_at(limit, Instant::now())
    }

    pub(crate) fn take_ready_at(&mut self, limit: usize, now: Instant) -> Vec<PendingChange> {
        let mut ready: Vec<(u64, PathBuf)> = self
            .pending
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_change) >= self.window)
            .map(|(path, entry)| (entry.seq, path.clone()))
            .collect();
        ready.sort_unstable_by_key(|(seq, _)| *seq);
        ready.truncate(limit);

        ready
            .into_iter()
            .filter_map(|(_, path)| {
                self.pending
                    .remove(&path)
                    .map(|entry| PendingChange { path, kind: entry.kind })
            })
            .collect()
    }

    /// Take everything regardless of the window.
    pub fn drain_all(&mut self) -> Vec<PendingChange> {
        let mut all: Vec<(u64, PathBuf, ChangeKind)> = self
            .pending
            .drain()
            .map(|(path, entry)| (entry.seq, path, entry.kind))
            .collect();
        all.sort_unstable_by_key(|(seq, _, _)| *seq);
        all.into_iter()
            .map(|(_, path, kind)| PendingChange { path, kind })
            .collect()
    }

    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_ready_after_window() {
        let mut queue = ChangeQueue::new(50);
        let path = PathBuf::from("/p/a.c");
        queue.record(path.clone(), ChangeKind::Modified);

        assert!(queue.take_ready(10).is_empty());
        assert!(queue.has_pending());

        sleep(ms(60));
        let ready = queue.take_ready(10);
        assert_eq!(
            ready,
            vec![PendingChange {
                path,
                kind: ChangeKind::Modified
            }]
        );
        assert!(!queue.has_pending());
    }

    #[test]
    fn test_record_resets_timer() {
        let start = Instant::now();
        let mut queue = ChangeQueue::new(50);
        let path = PathBuf::from("/p/a.c");

        queue.record_at(path.clone(), ChangeKind::Modified, start);
        queue.record_at(path.clone(), ChangeKind::Modified, start + ms(30));

        assert!(queue.take_ready_at(10, start + ms(60)).is_empty());
        assert_eq!(queue.take_ready_at(10, start + ms(80)).len(), 1);
    }

    #[test]
    fn test_batch_cap_keeps_overflow_in_front() {
        let start = Instant::now();
        let mut queue = ChangeQueue::new(10);
        for name in ["a.c", "b.c", "c.c"] {
            queue.record_at(PathBuf::from(name), ChangeKind::Modified, start);
        }

        let first = queue.take_ready_at(2, start + ms(20));
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].path, PathBuf::from("a.c"));
        assert_eq!(first[1].path, PathBuf::from("b.c"));

        queue.record_at(PathBuf::from("d.c"), ChangeKind::Created, start + ms(1));
        let second = queue.take_ready_at(2, start + ms(20));
        assert_eq!(second[0].path, PathBuf::from("c.c"));
        assert_eq!(second[1].path, PathBuf::from("d.c"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_coalescing() {
        use ChangeKind::*;
        assert_eq!(Created.coalesce(Modified), Created);
        assert_eq!(Modified.coalesce(Modified), Modified);
        assert_eq!(Created.coalesce(Deleted), Deleted);
        assert_eq!(Modified.coalesce(Deleted), Deleted);
        assert_eq!(Deleted.coalesce(Created), Modified);
        assert_eq!(Deleted.coalesce(Modified), Modified);

        let start = Instant::now();
        let mut queue = ChangeQueue::new(0);
        queue.record_at(PathBuf::from("a.c"), Created, start);
        queue.record_at(PathBuf::from("a.c"), Modified, start);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_all()[0].kind, Created);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut queue = ChangeQueue::new(50);
        queue.record(PathBuf::from("a.c"), ChangeKind::Modified);
        queue.record(PathBuf::from("b.c"), ChangeKind::Modified);
        queue.remove(Path::new("a.c"));
        assert_eq!(queue.len(), 1);
        queue.clear();
        assert!(!queue.has_pending());
    }
}
