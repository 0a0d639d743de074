//! Per-member single-writer locks
//!
//! Two acquire runs for the same member would both read the same candidate
//! pool and headroom and could overshoot the quota. Mutating workflows hold the
//! initiating member's lock end to end; different members never contend.
//!
//! An entry lives only while someone holds or waits for it.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct MemberLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive access to one member's workflows; released on drop
#[derive(Debug)]
pub struct MemberGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    identity: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for MemberGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map's reference is the only one left when idle
        drop(self.guard.take());
        self.locks
            .remove_if(&self.identity, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl MemberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`'s workflows
    pub async fn lock(&self, identity: &str) -> MemberGuard<'_> {
        // Clone out of the map so no shard guard is held across the await
        let lock = self
            .locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        MemberGuard {
            locks: &self.locks,
            identity: identity.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// True while some workflow holds `identity`'s lock
    pub fn is_locked(&self, identity: &str) -> bool {
        self.locks
            .get(identity)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.len()
    }
}
