//! Async mutexes keyed by id.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Slot {
    mutex: Arc<Mutex<()>>,
    /// Holders plus waiters.
    users: usize,
}

type Table<K> = std::sync::Mutex<HashMap<K, Slot>>;

fn table<K>(table: &Table<K>) -> std::sync::MutexGuard<'_, HashMap<K, Slot>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One async mutex per key, created on first use and dropped once nobody
/// holds or waits on it.
///
/// The table lock is synchronous and held only to fetch or release a slot,
/// never across the caller's critical section.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    table: Arc<Table<K>>,
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            table: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    ///
    /// The slot is released when the returned guard drops, including when
    /// this future is dropped while still waiting.
    pub async fn lock(&self, key: &K) -> KeyedGuard<K> {
        let mutex = {
            let mut slots = table(&self.table);
            let slot = slots.entry(key.clone()).or_default();
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };
        let mut guard = KeyedGuard {
            table: Arc::clone(&self.table),
            key: key.clone(),
            held: None,
        };
        guard.held = Some(mutex.lock_owned().await);
        guard
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        table(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one key of a [`KeyedLocks`].
#[derive(Debug)]
pub struct KeyedGuard<K: Eq + Hash> {
    table: Arc<Table<K>>,
    key: K,
    held: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        self.held.take();
        let mut slots = table(&self.table);
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_lock_serializes_same_key() {
        let locks = Arc::new(KeyedLocks::<String>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();

        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(&"m".to_string()).await;
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(1)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_different_keys_do_not_block() {
        let locks = KeyedLocks::<u32>::new();
        let _a = locks.lock(&1).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(&2)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_guard_drop_releases_slot() {
        let locks = KeyedLocks::<u32>::new();
        let guard = locks.lock(&1).await;
        assert_eq!(locks.len(), 1);

        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_slot_kept_while_waiter_queued() {
        let locks = KeyedLocks::<u32>::new();
        let first = locks.lock(&1).await;

        let mut second = Box::pin(locks.lock(&1));
        let early = tokio::time::timeout(Duration::from_millis(5), &mut second).await;
        assert!(early.is_err());
        drop(first);
        assert_eq!(locks.len(), 1);

        drop(second.await);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_releases_slot() {
        let locks = KeyedLocks::<u32>::new();
        let held = locks.lock(&1).await;

        let waited = tokio::time::timeout(Duration::from_millis(5), locks.lock(&1)).await;
        assert!(waited.is_err());
        assert_eq!(locks.len(), 1);

        drop(held);
        assert!(locks.is_empty());
    }
}
