use std::collections::HashMap;

use async_trait::async_trait;
use rowguard_application::{ExpiringLock, LockHandle, LockRelease};
use rowguard_core::AppResult;
use rowguard_domain::{LockKey, LockTtl};
use tokio::sync::Mutex;
use tokio::time::Instant;


/// Table size at which acquisitions sweep out expired entries.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct LockEntry {
    token: String,
    expires_at: Instant,
}

impl LockEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local expiring lock for single-instance deployments and tests.
///
/// Entries are checked against their expiry on every access; expired entries
/// behave exactly like absent ones.
#[derive(Default)]
pub struct InMemoryExpiringLock {
    entries: Mutex<HashMap<LockKey, LockEntry>>,
}

impl InMemoryExpiringLock {
    /// Creates an empty in-memory lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn expiry_from(now: Instant, ttl: LockTtl) -> Instant {
        now.checked_add(ttl.as_duration()).unwrap_or(now)
    }
}

#[async_trait]
impl ExpiringLock for InMemoryExpiringLock {
    async fn try_acquire(
        &self,
        key: &LockKey,
        holder_id: &str,
        ttl: LockTtl,
    ) -> AppResult<Option<LockHandle>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(None);
        }

        if entries.len() >= PRUNE_THRESHOLD {
            entries.retain(|_, entry| entry.is_live(now));
        }

        let handle = LockHandle::issue(key.clone(), holder_id, ttl);
        entries.insert(
            key.clone(),
            LockEntry {
                token: handle.token.clone(),
                expires_at: Self::expiry_from(now, ttl),
            },
        );

        Ok(Some(handle))
    }

    async fn is_held(&self, key: &LockKey) -> AppResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .await
            .get(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    async fn is_held_by(&self, handle: &LockHandle) -> AppResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .await
            .get(&handle.key)
            .is_some_and(|entry| entry.is_live(now) && entry.token == handle.token))
    }

    async fn release(&self, handle: &LockHandle) -> AppResult<LockRelease> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries.get(&handle.key) else {
            return Ok(LockRelease::NotHeld);
        };

        let live = entry.is_live(now);
        let owned = live && entry.token == handle.token;
        if owned || !live {
            entries.remove(&handle.key);
        }

        Ok(if owned {
            LockRelease::Released
        } else {
            LockRelease::NotHeld
        })
    }

    async fn renew(&self, handle: &LockHandle, ttl: LockTtl) -> AppResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match entries.get_mut(&handle.key) {
            Some(entry) if entry.is_live(now) && entry.token == handle.token => {
                entry.expires_at = Self::expiry_from(now, ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
