use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slot = Arc<Mutex<()>>;

/// Registry of per-key mutual-exclusion handles.
///
/// Handles are created lazily with an atomic insert-if-absent and dropped
/// again once nobody holds or waits on them, so the registry only grows with
/// contention, never with the number of keys ever seen.
pub struct InFlightGuards<K>
where
    K: Eq + Hash + Clone,
{
    slots: Arc<DashMap<K, Slot>>,
}

impl<K> InFlightGuards<K>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Wait until no other task holds the guard for `key`, then take it.
    ///
    /// The registry shard lock is held only while the handle is looked up or
    /// created, never while waiting.
    pub async fn acquire(&self, key: &K) -> InFlightGuard<K> {
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let permit = slot.lock_owned().await;
        InFlightGuard {
            key: key.clone(),
            slots: Arc::clone(&self.slots),
            permit: Some(permit),
        }
    }

    /// Number of keys that currently have a handle.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no key is contended.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop handles nobody references any more.
    pub fn prune(&self) {
        self.slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}

impl<K> Default for InFlightGuards<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for InFlightGuards<K>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightGuards")
            .field("len", &self.slots.len())
            .finish()
    }
}

/// Exclusive hold on a key. Released on drop, whatever the outcome of the
/// work done under it.
pub struct InFlightGuard<K>
where
    K: Eq + Hash + Clone,
{
    key: K,
    slots: Arc<DashMap<K, Slot>>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for InFlightGuard<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        // The permit owns a clone of the slot: release it first so the count
        // below only sees the registry entry and any waiters.
        drop(self.permit.take());
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}
