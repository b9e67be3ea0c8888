use dashmap::DashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type Slot = Arc<Mutex<()>>;

/// In-process mutual exclusion keyed by an arbitrary identifier
///
/// Each key gets its own async mutex, created on first use and dropped once
/// the last holder or waiter goes away, so the map only ever contains keys
/// that are currently contended. Different keys never block each other.
pub struct KeyedLock<K>
where
    K: Eq + Hash,
{
    slots: Arc<DashMap<K, Slot>>,
}

impl<K> Clone for KeyedLock<K>
where
    K: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    fn slot(&self, key: &K) -> Slot {
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait until the lock for `key` is free and take it
    ///
    /// Dropping the returned future before it resolves (e.g. under
    /// `tokio::time::timeout`) leaves no slot behind for `key`.
    pub async fn acquire(&self, key: K) -> KeyedLockGuard<K> {
        let mut waiter = Waiter {
            key: Some(key.clone()),
            slots: &self.slots,
        };
        let guard = self.slot(&key).lock_owned().await;
        waiter.key = None;
        debug!("Acquired keyed lock {}", key);

        KeyedLockGuard {
            guard: Some(guard),
            key,
            slots: self.slots.clone(),
        }
    }
}

/// Reclaims the slot of a waiter cancelled before it got the lock
struct Waiter<'a, K>
where
    K: Eq + Hash,
{
    key: Option<K>,
    slots: &'a DashMap<K, Slot>,
}

impl<K> Drop for Waiter<'_, K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        // The pending lock future has already released its reference, so
        // only the map entry is left when nobody else holds or waits.
        if let Some(key) = self.key.take() {
            self.slots
                .remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);
        }
    }
}

/// Holds the lock for one key; released on drop
pub struct KeyedLockGuard<K>
where
    K: Eq + Hash,
{
    guard: Option<OwnedMutexGuard<()>>,
    key: K,
    slots: Arc<DashMap<K, Slot>>,
}

impl<K> Drop for KeyedLockGuard<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        // Map entry plus this guard: nobody is waiting on the slot.
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 2);
        self.guard.take();
    }
}
