//! Per-user critical sections.
//!
//! Serialises `get -> decide -> put` for one `user_id` while letting
//! different users proceed in parallel. Idle entries are removed when the
//! last guard for a user is dropped.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Registry of async mutexes keyed by `user_id`
#[derive(Default, Clone)]
pub struct UserLocks {
    locks: Arc<LockMap>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`.
    pub async fn lock(&self, user_id: &str) -> UserGuard {
        let mutex = self
            .locks
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone();
        let guard = mutex.lock_owned().await;

        UserGuard {
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
            user_id: user_id.to_string(),
        }
    }

    /// Number of users with a live entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl std::fmt::Debug for UserLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserLocks")
            .field("active", &self.locks.len())
            .finish()
    }
}

/// Held for the duration of one ceremony step
pub struct UserGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
    user_id: String,
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        // Release first so the map holds the only remaining reference when idle.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.user_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
