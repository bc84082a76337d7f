//! Keyed expiring maps for in-flight correlation state.
//!
//! Every request that awaits an asynchronous callback lives in one of these
//! queues until the callback arrives, the operator answers, or the entry
//! outlives `clean_ms` and the reaper removes it. Capacity overflow is
//! reported to the caller, never queued.
//!
//! All operations serialise on a single mutex per queue and none of them
//! performs I/O while holding it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue \"{queue}\" is at capacity ({capacity})")]
    AtCapacity {
        queue: &'static str,
        capacity: usize,
    },

    #[error("key \"{key}\" is already present in queue \"{queue}\"")]
    DuplicateKey { queue: &'static str, key: Uuid },
}

struct Entry<V> {
    created_at: Instant,
    value: Arc<V>,
}

/// A bounded map from correlation UUID to `Arc<V>` with TTL expiry.
pub struct TtlQueue<V> {
    name: &'static str,
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<Uuid, Entry<V>>>,
}

impl<V> TtlQueue<V> {
    /// `clean_ms` is both the entry lifetime and the reaper interval.
    pub fn new(name: &'static str, clean_ms: u64, capacity: usize) -> Self {
        Self {
            name,
            ttl: Duration::from_millis(clean_ms),
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry<V>>> {
        // A poisoned queue mutex means a panic inside a non-awaiting
        // critical section; the map itself is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a new record. Fails on duplicate key or at capacity.
    pub fn push(&self, key: Uuid, value: V) -> Result<(), QueueError> {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            return Err(QueueError::AtCapacity {
                queue: self.name,
                capacity: self.capacity,
            });
        }
        if entries.contains_key(&key) {
            return Err(QueueError::DuplicateKey {
                queue: self.name,
                key,
            });
        }
        entries.insert(
            key,
            Entry {
                created_at: Instant::now(),
                value: Arc::new(value),
            },
        );
        Ok(())
    }

    /// Insert unless the key is already present. Returns `true` when the
    /// value was inserted, `false` when an entry already existed (used to
    /// coalesce repeated enrollment envelope-headers).
    pub fn push_if_absent(&self, key: Uuid, value: V) -> Result<bool, QueueError> {
        let mut entries = self.lock();
        if entries.contains_key(&key) {
            return Ok(false);
        }
        if entries.len() >= self.capacity {
            return Err(QueueError::AtCapacity {
                queue: self.name,
                capacity: self.capacity,
            });
        }
        entries.insert(
            key,
            Entry {
                created_at: Instant::now(),
                value: Arc::new(value),
            },
        );
        Ok(true)
    }

    /// Atomic get-and-remove. Once this returns `Some`, no other task can
    /// reach the record through the queue.
    pub fn pop(&self, key: &Uuid) -> Option<Arc<V>> {
        self.lock().remove(key).map(|e| e.value)
    }

    /// Peek without removal.
    pub fn get(&self, key: &Uuid) -> Option<Arc<V>> {
        self.lock().get(key).map(|e| Arc::clone(&e.value))
    }

    /// Linear scan by secondary predicate, e.g. locating an enrollment
    /// session from a child-image UUID. O(N); N is bounded by capacity.
    pub fn find<F>(&self, pred: F) -> Option<Arc<V>>
    where
        F: Fn(&V) -> bool,
    {
        self.lock()
            .values()
            .find(|e| pred(&e.value))
            .map(|e| Arc::clone(&e.value))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove every entry older than the queue TTL. Returns how many were
    /// removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, e| {
            let keep = e.created_at.elapsed() <= self.ttl;
            if !keep {
                tracing::info!(queue = self.name, key = %key, "removing expired entry");
            }
            keep
        });
        before - entries.len()
    }
}

impl<V> TtlQueue<V>
where
    V: Send + Sync + 'static,
{
    /// Run the background reaper until `cancel` is triggered.
    pub fn spawn_reaper(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(queue.ttl);
            // The first tick fires immediately; skip it so fresh entries
            // get a full lifetime.
            interval.tick().await;
            tracing::debug!(queue = queue.name, "reaper started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(queue = queue.name, "reaper stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = queue.purge_expired();
                        if removed > 0 {
                            tracing::debug!(queue = queue.name, removed, "reaper purged entries");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(clean_ms: u64, capacity: usize) -> TtlQueue<String> {
        TtlQueue::new("test", clean_ms, capacity)
    }

    #[test]
    fn push_then_get_then_pop() {
        let q = queue(60_000, 8);
        let k = Uuid::new_v4();
        q.push(k, "hello".into()).unwrap();

        assert_eq!(q.get(&k).as_deref(), Some(&"hello".to_string()));
        assert_eq!(q.len(), 1);

        let popped = q.pop(&k).unwrap();
        assert_eq!(*popped, "hello");
        assert!(q.pop(&k).is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn duplicate_push_fails_until_popped() {
        let q = queue(60_000, 8);
        let k = Uuid::new_v4();
        q.push(k, "first".into()).unwrap();

        let err = q.push(k, "second".into()).unwrap_err();
        assert_eq!(err, QueueError::DuplicateKey { queue: "test", key: k });

        q.pop(&k);
        q.push(k, "second".into()).unwrap();
    }

    #[test]
    fn capacity_overflow_is_reported() {
        let q = queue(60_000, 2);
        q.push(Uuid::new_v4(), "a".into()).unwrap();
        q.push(Uuid::new_v4(), "b".into()).unwrap();

        let err = q.push(Uuid::new_v4(), "c".into()).unwrap_err();
        assert_eq!(
            err,
            QueueError::AtCapacity {
                queue: "test",
                capacity: 2
            }
        );
    }

    #[test]
    fn push_if_absent_coalesces() {
        let q = queue(60_000, 8);
        let k = Uuid::new_v4();
        assert!(q.push_if_absent(k, "session".into()).unwrap());
        assert!(!q.push_if_absent(k, "again".into()).unwrap());
        assert_eq!(q.get(&k).as_deref(), Some(&"session".to_string()));
    }

    #[test]
    fn find_by_secondary_predicate() {
        let q = queue(60_000, 8);
        q.push(Uuid::new_v4(), "alpha".into()).unwrap();
        q.push(Uuid::new_v4(), "beta".into()).unwrap();

        let hit = q.find(|v| v.starts_with('b')).unwrap();
        assert_eq!(*hit, "beta");
        assert!(q.find(|v| v == "gamma").is_none());
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let q = queue(0, 8);
        let k = Uuid::new_v4();
        q.push(k, "doomed".into()).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(q.purge_expired(), 1);
        assert!(q.get(&k).is_none());

        let fresh = queue(60_000, 8);
        fresh.push(Uuid::new_v4(), "alive".into()).unwrap();
        assert_eq!(fresh.purge_expired(), 0);
        assert_eq!(fresh.len(), 1);
    }

    #[tokio::test]
    async fn reaper_purges_in_background() {
        let q = Arc::new(TtlQueue::<String>::new("reaped", 20, 8));
        let cancel = CancellationToken::new();
        let handle = q.spawn_reaper(cancel.clone());

        q.push(Uuid::new_v4(), "short-lived".into()).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(q.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
