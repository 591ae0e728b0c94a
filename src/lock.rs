//! Per-key async mutual exclusion.
//!
//! Each active key maps to a binary semaphore plus a count of the tasks that
//! hold or wait for it. The count is changed only under the map's mutex, so
//! the decrement that reaches zero and the removal of the slot happen in one
//! critical section: a new acquirer either sees the slot (and bumps the count
//! first) or creates a fresh one. Idle semaphores go back to a bounded pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_POOL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("keyed lock semaphore was closed")]
    Closed,
}

struct Slot {
    semaphore: Arc<Semaphore>,
    /// Holders plus waiters
    holders: usize,
}

struct Slots {
    active: HashMap<String, Slot>,
    pool: Vec<Arc<Semaphore>>,
    pool_capacity: usize,
}

struct Inner {
    slots: Mutex<Slots>,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        // The critical sections never panic midway, so a poisoned map is still consistent
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, key: &str) -> Arc<Semaphore> {
        let mut guard = self.slots();
        let slots = &mut *guard;
        let pool = &mut slots.pool;
        let slot = slots.active.entry(key.to_string()).or_insert_with(|| Slot {
            semaphore: pool
                .pop()
                .unwrap_or_else(|| Arc::new(Semaphore::new(1))),
            holders: 0,
        });
        slot.holders += 1;
        slot.semaphore.clone()
    }

    fn unregister(&self, key: &str) {
        let mut guard = self.slots();
        let slots = &mut *guard;

        let remaining = match slots.active.get_mut(key) {
            Some(slot) => {
                slot.holders -= 1;
                slot.holders
            }
            None => return,
        };

        if remaining == 0 {
            if let Some(slot) = slots.active.remove(key) {
                if slots.pool.len() < slots.pool_capacity {
                    slots.pool.push(slot.semaphore);
                }
            }
        }
    }
}

/// Mutual exclusion scoped to a string key (a room id)
#[derive(Clone)]
pub struct KeyedLock {
    inner: Arc<Inner>,
}

impl Default for KeyedLock {
    fn default() -> Self {
        Self::with_pool_capacity(DEFAULT_POOL_CAPACITY)
    }
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool_capacity(pool_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(Slots {
                    active: HashMap::new(),
                    pool: Vec::new(),
                    pool_capacity,
                }),
            }),
        }
    }

    /// Wait until no other task holds `key`, then hold it until the guard drops.
    ///
    /// Holders of the same key are served in FIFO order. Dropping the returned
    /// future while it waits gives up the place in line without leaking the slot.
    pub async fn lock(&self, key: &str) -> Result<KeyedLockGuard, LockError> {
        let semaphore = self.inner.register(key);
        let mut guard = KeyedLockGuard {
            inner: self.inner.clone(),
            key: key.to_string(),
            permit: None,
        };
        let permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| LockError::Closed)?;
        guard.permit = Some(permit);
        Ok(guard)
    }

    /// Take `key` only if nobody holds or waits for it
    pub fn try_lock(&self, key: &str) -> Option<KeyedLockGuard> {
        let semaphore = self.inner.register(key);
        let mut guard = KeyedLockGuard {
            inner: self.inner.clone(),
            key: key.to_string(),
            permit: None,
        };
        guard.permit = Some(semaphore.try_acquire_owned().ok()?);
        Some(guard)
    }

    /// Non-blocking check. Not atomic with a later `lock`, so callers must
    /// re-validate their state after acquiring.
    pub fn is_locked(&self, key: &str) -> bool {
        self.inner
            .slots()
            .active
            .get(key)
            .is_some_and(|slot| slot.semaphore.available_permits() == 0)
    }

    /// Keys with at least one holder or waiter
    pub fn active_keys(&self) -> usize {
        self.inner.slots().active.len()
    }

    /// Idle semaphores kept for reuse
    pub fn pooled(&self) -> usize {
        self.inner.slots().pool.len()
    }
}

/// Holds a key until dropped; release runs on every exit path
pub struct KeyedLockGuard {
    inner: Arc<Inner>,
    key: String,
    permit: Option<OwnedSemaphorePermit>,
}

impl KeyedLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        // Free the semaphore before the slot can be pooled
        self.permit.take();
        self.inner.unregister(&self.key);
    }
}
