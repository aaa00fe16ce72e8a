//! Per-user mutual exclusion for synchronization runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use contentflow_core::UserId;

type LockMap = HashMap<UserId, Arc<Mutex<()>>>;

/// Serializes work per user while different users proceed in parallel.
///
/// Map entries exist only while a user's lock is held or awaited.
#[derive(Clone, Default)]
pub struct UserLock {
    locks: Arc<StdMutex<LockMap>>,
}

impl UserLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `user` is free and take it.
    pub async fn acquire(&self, user: UserId) -> UserLockGuard {
        let entry = {
            let mut locks = lock_map(&self.locks);
            Arc::clone(locks.entry(user).or_default())
        };
        let guard = entry.lock_owned().await;
        debug!(user_id = user, "user lock acquired");
        UserLockGuard {
            user,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Users currently holding or waiting for their lock.
    pub fn active_users(&self) -> usize {
        lock_map(&self.locks).len()
    }
}

/// Held for the duration of one user's run; releases on drop.
pub struct UserLockGuard {
    user: UserId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<StdMutex<LockMap>>,
}

impl UserLockGuard {
    pub fn user(&self) -> UserId {
        self.user
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = lock_map(&self.locks);
        // Only the map itself still points at the mutex: nobody is waiting.
        if locks.get(&self.user).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(&self.user);
        }
        debug!(user_id = self.user, "user lock released");
    }
}

fn lock_map(locks: &StdMutex<LockMap>) -> MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}
