//! Seen-item cache shared by every stream feeding the ingest filter.
//!
//! The only mutating operation is [`SeenCache::check_and_mark`], which tests and
//! inserts under one lock so two streams racing on the same id cannot both win.
//!
//! # Memory Behavior
//!
//! With capacity `0` the set only grows. With a positive capacity the cache keeps
//! the `capacity` most recent ids and evicts the oldest first.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
struct Inner {
    ids: HashSet<String>,
    /// Insertion order; only maintained when bounded.
    order: VecDeque<String>,
}

#[derive(Debug, Default)]
pub struct SeenCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl SeenCache {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `capacity == 0` means unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        (self.capacity > 0).then_some(self.capacity)
    }

    pub fn seen(&self, id: &str) -> bool {
        self.inner.lock().ids.contains(id)
    }

    pub fn mark_seen(&self, id: &str) {
        self.check_and_mark(id);
    }

    /// Returns true if `id` was not seen before (and is now recorded).
    pub fn check_and_mark(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.ids.contains(id) {
            return false;
        }
        inner.ids.insert(id.to_string());

        if self.capacity > 0 {
            inner.order.push_back(id.to_string());
            while inner.order.len() > self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.ids.remove(&oldest);
                }
            }
        }
        true
    }

    /// Snapshot; may change right after the call.
    pub fn len(&self) -> usize {
        self.inner.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().ids.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn first_check_wins_second_loses() {
        let cache = SeenCache::unbounded();
        assert!(!cache.seen("abc"));
        assert!(cache.check_and_mark("abc"));
        assert!(cache.seen("abc"));
        assert!(!cache.check_and_mark("abc"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn mark_seen_is_idempotent() {
        let cache = SeenCache::unbounded();
        cache.mark_seen("x");
        cache.mark_seen("x");
        assert_eq!(cache.len(), 1);
        assert!(cache.capacity().is_none());
    }

    #[test]
    fn bounded_cache_evicts_oldest_first() {
        let cache = SeenCache::with_capacity(2);
        assert!(cache.check_and_mark("a"));
        assert!(cache.check_and_mark("b"));
        assert!(cache.check_and_mark("c"));

        assert_eq!(cache.len(), 2);
        assert!(!cache.seen("a"));
        assert!(cache.seen("b"));
        assert!(cache.seen("c"));
        // Evicted ids count as new again.
        assert!(cache.check_and_mark("a"));
        assert!(!cache.seen("b"));
    }

    #[test]
    fn concurrent_marks_admit_each_id_once() {
        let cache = Arc::new(SeenCache::unbounded());
        let ids: Vec<String> = (0..2_000).map(|i| format!("t1_{i}")).collect();
        let ids = Arc::new(ids);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let ids = Arc::clone(&ids);
                thread::spawn(move || ids.iter().filter(|id| cache.check_and_mark(id)).count())
            })
            .collect();

        let admitted: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(admitted, 2_000);
        assert_eq!(cache.len(), 2_000);
    }
}
