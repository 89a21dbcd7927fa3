//! Per-row locks for the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use common::{OrderId, ProductId};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle entries are pruned once the table grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

/// A lockable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Product(ProductId),
    Order(OrderId),
}

/// Table of row mutexes, created on first use.
///
/// Guards are owned so a unit of work can hold them across awaits and
/// release them all at once when it is dropped.
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    entries: Arc<Mutex<HashMap<LockKey, Arc<Mutex<()>>>>>,
}

impl LockTable {
    /// Waits for and takes the lock on `key`.
    pub async fn acquire(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let handle = {
            let mut entries = self.entries.lock().await;
            if entries.len() > PRUNE_THRESHOLD {
                entries.retain(|_, handle| Arc::strong_count(handle) > 1);
            }
            entries.entry(key).or_default().clone()
        };
        handle.lock_owned().await
    }

    /// Returns the number of keys currently tracked.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
