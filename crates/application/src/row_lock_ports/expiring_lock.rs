use async_trait::async_trait;
use rowguard_core::AppResult;
use rowguard_domain::{LockKey, LockTtl};

/// One acquisition of a named expiring lock.
///
/// The token is unique per acquisition, so a holder whose lock expired and
/// was re-acquired elsewhere can never release the new holder's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    /// Shared-store key the lock lives under.
    pub key: LockKey,
    /// Holder token used for compare-and-delete release.
    pub token: String,
    /// Expiry the lock was acquired or renewed with.
    pub ttl: LockTtl,
}

impl LockHandle {
    /// Issues a handle with a fresh token for the given holder identity.
    #[must_use]
    pub fn issue(key: LockKey, holder_id: &str, ttl: LockTtl) -> Self {
        Self {
            key,
            token: format!("{holder_id}:{}", uuid::Uuid::new_v4()),
            ttl,
        }
    }

    /// Rebuilds a handle from a token previously returned to a caller.
    #[must_use]
    pub fn from_token(key: LockKey, token: impl Into<String>, ttl: LockTtl) -> Self {
        Self {
            key,
            token: token.into(),
            ttl,
        }
    }
}

/// Outcome of a compare-and-delete release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRelease {
    /// The key held this handle's token and was removed.
    Released,
    /// The key was absent, expired or owned by another token.
    NotHeld,
}

/// Distributed, expiring mutual exclusion over lock keys.
///
/// Implementations never block or retry; contention is reported immediately
/// and store failures surface as internal errors.
#[async_trait]
pub trait ExpiringLock: Send + Sync {
    /// Atomically sets the key when absent, returning `None` when it is held.
    ///
    /// The caller owns `holder_id` validation; adapters only fail with
    /// `Internal`.
    async fn try_acquire(
        &self,
        key: &LockKey,
        holder_id: &str,
        ttl: LockTtl,
    ) -> AppResult<Option<LockHandle>>;

    /// Reports whether any holder currently owns the key.
    async fn is_held(&self, key: &LockKey) -> AppResult<bool>;

    /// Reports whether the key is currently owned by this handle's token.
    async fn is_held_by(&self, handle: &LockHandle) -> AppResult<bool>;

    /// Removes the key only when it still carries this handle's token.
    async fn release(&self, handle: &LockHandle) -> AppResult<LockRelease>;

    /// Extends the expiry and returns false when token ownership changed.
    async fn renew(&self, handle: &LockHandle, ttl: LockTtl) -> AppResult<bool>;
}
