//! Bounded, newest-first activity log

use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::types::ActivityEntry;

/// Default number of entries kept before the oldest are evicted
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Append-only audit trail with a fixed capacity.
///
/// The front of the deque is the newest entry. Appends past capacity drop
/// exactly one entry from the back. The lock is synchronous and never held
/// across an await, so an append cannot be cut off by a cancelled future.
#[derive(Debug)]
pub struct ActivityLog {
    entries: RwLock<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<ActivityEntry>> {
        // entries are plain data, a panicked writer cannot leave them torn
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<ActivityEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Append an entry, returning the evicted one if the log was full
    pub fn append(&self, entry: ActivityEntry) -> Option<ActivityEntry> {
        let mut entries = self.write();
        let evicted = if entries.len() >= self.capacity {
            entries.pop_back()
        } else {
            None
        };
        entries.push_front(entry);
        evicted
    }

    /// Newest-first copy, optionally filtered to one credential
    pub fn snapshot(&self, credential_id: Option<Uuid>, limit: usize) -> Vec<ActivityEntry> {
        let entries = self.read();
        entries
            .iter()
            .filter(|e| credential_id.map_or(true, |id| e.credential_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Run `f` over a consistent view of all entries, newest first
    pub fn with_entries<R>(&self, f: impl FnOnce(&VecDeque<ActivityEntry>) -> R) -> R {
        let entries = self.read();
        f(&entries)
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityAction, Actor};
    use std::sync::Arc;

    fn entry(credential_id: Uuid, name: &str) -> ActivityEntry {
        ActivityEntry::success(ActivityAction::Used, credential_id, name, &Actor::system())
    }

    #[test]
    fn test_newest_first_with_filter_and_limit() {
        let log = ActivityLog::new(10);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        log.append(entry(a, "a1"));
        log.append(entry(b, "b1"));
        log.append(entry(a, "a2"));

        let all: Vec<_> = log.snapshot(None, 10).into_iter().map(|e| e.credential_name).collect();
        assert_eq!(all, vec!["a2", "b1", "a1"]);

        let only_a: Vec<_> = log.snapshot(Some(a), 1).into_iter().map(|e| e.credential_name).collect();
        assert_eq!(only_a, vec!["a2"]);
    }

    #[test]
    fn test_capacity_evicts_exactly_oldest() {
        let log = ActivityLog::new(3);
        let id = Uuid::new_v4();

        for i in 0..3 {
            assert!(log.append(entry(id, &format!("e{i}"))).is_none());
        }
        let evicted = log.append(entry(id, "e3")).unwrap();
        assert_eq!(evicted.credential_name, "e0");
        assert_eq!(log.len(), 3);

        let names: Vec<_> = log.snapshot(None, 10).into_iter().map(|e| e.credential_name).collect();
        assert_eq!(names, vec!["e3", "e2", "e1"]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let log = ActivityLog::new(0);
        log.append(entry(Uuid::new_v4(), "x"));
        log.append(entry(Uuid::new_v4(), "y"));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_stay_bounded() {
        let log = Arc::new(ActivityLog::new(50));
        let id = Uuid::new_v4();

        let tasks: Vec<_> = (0..200)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move {
                    log.append(entry(id, &i.to_string()));
                    log.snapshot(None, 100).len()
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            assert!(task.unwrap() <= 50);
        }
        assert_eq!(log.len(), 50);
    }
}
