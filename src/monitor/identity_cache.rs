//! Transient cache correlating a process start with its later stop
//!
//! The owner identity resolved when a process starts is kept here until the
//! matching stop event takes it out, or until the expiry sweep drops it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Cached owner identity of a live process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub process_id: u32,
    pub sid: String,
    /// Set when the entry is created; not refreshed by later reads
    pub last_access: Instant,
}

/// Concurrent pid -> identity map.
///
/// All operations hold a single lock for the duration of one map operation;
/// the sweep holds it for one pass over the entries.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: Mutex<HashMap<u32, ProcessIdentity>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the identity of a started process, replacing any previous entry for the pid
    pub fn on_process_start(&self, process_id: u32, sid: impl Into<String>) {
        self.on_process_start_at(process_id, sid, Instant::now());
    }

    pub fn on_process_start_at(&self, process_id: u32, sid: impl Into<String>, now: Instant) {
        let identity = ProcessIdentity {
            process_id,
            sid: sid.into(),
            last_access: now,
        };
        self.lock().insert(process_id, identity);
    }

    /// Remove and return the cached identity for a stopped process.
    ///
    /// `None` when the start was never seen, was filtered out, or has expired.
    pub fn on_process_stop(&self, process_id: u32) -> Option<String> {
        self.lock().remove(&process_id).map(|identity| identity.sid)
    }

    /// Drop every entry older than `expiry` at `now`. Returns the number removed.
    pub fn sweep_expired(&self, expiry: Duration, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|pid, identity| {
            let expired = now.saturating_duration_since(identity.last_access) > expiry;
            if expired {
                log::trace!("Evicting expired identity for PID {} ({})", pid, identity.sid);
            }
            !expired
        });
        before - entries.len()
    }

    /// Number of live entries
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Look at an entry without removing it
    #[cfg(test)]
    pub fn peek(&self, process_id: u32) -> Option<ProcessIdentity> {
        self.lock().get(&process_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, ProcessIdentity>> {
        // Every critical section leaves the map consistent, so a poisoned lock is still usable
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
