//! Two-tier row lock coordination.
//!
//! Tier one is an expiring lock in a shared store that rejects contention
//! before any storage transaction is opened. Tier two is the storage engine's
//! own `SELECT ... FOR UPDATE`, which confirms the row exists and guards it
//! against writers that bypass this service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rowguard_core::{AppError, AppResult, NonEmptyString};
use rowguard_domain::{LockKey, LockTtl, Row, RowId};
use tracing::{debug, info};

use crate::row_lock_ports::{ExpiringLock, LockHandle, LockRelease, RowRepository};

mod guard;

#[cfg(test)]
mod tests;

use guard::ReleasePolicy;

/// A confirmed lock on one row, returned to the caller that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLock {
    /// Locked row.
    pub row_id: RowId,
    /// Tier-one handle; its token is required to release or renew.
    pub handle: LockHandle,
    /// Moment the tier-one lock lapses unless renewed.
    pub expires_at: DateTime<Utc>,
}

impl RowLock {
    fn new(row_id: RowId, handle: LockHandle) -> Self {
        let expires_at =
            Utc::now() + chrono::Duration::seconds(i64::from(handle.ttl.as_seconds()));
        Self {
            row_id,
            handle,
            expires_at,
        }
    }
}

/// Application service sequencing the distributed and storage row locks.
///
/// Holds no mutable state; all exclusion is delegated to the two stores, so
/// clones may be shared freely across request tasks and processes.
#[derive(Clone)]
pub struct RowLockCoordinator {
    lock: Arc<dyn ExpiringLock>,
    rows: Arc<dyn RowRepository>,
    holder_id: NonEmptyString,
    ttl: LockTtl,
}

impl RowLockCoordinator {
    /// Creates a coordinator for one process identity.
    #[must_use]
    pub fn new(
        lock: Arc<dyn ExpiringLock>,
        rows: Arc<dyn RowRepository>,
        holder_id: NonEmptyString,
        ttl: LockTtl,
    ) -> Self {
        Self {
            lock,
            rows,
            holder_id,
            ttl,
        }
    }

    /// Returns the lock key used for one row.
    #[must_use]
    pub fn lock_key(&self, row_id: RowId) -> LockKey {
        LockKey::for_row(row_id)
    }

    /// Returns the configured tier-one expiry.
    #[must_use]
    pub fn lock_ttl(&self) -> LockTtl {
        self.ttl
    }

    /// Acquires both lock tiers for a row.
    ///
    /// Fails with `AlreadyLocked` without touching storage when another
    /// caller holds the row. A missing row or a storage failure releases the
    /// tier-one lock before returning.
    pub async fn acquire(&self, row_id: RowId) -> AppResult<RowLock> {
        let handle = self.acquire_tier_one(row_id).await?;

        self.guarded(row_id, &handle, ReleasePolicy::OnFailure, async {
            self.rows
                .select_for_update(row_id)
                .await?
                .ok_or_else(|| row_not_found(row_id))
        })
        .await?;

        info!(%row_id, key = %handle.key, "row locked");
        Ok(RowLock::new(row_id, handle))
    }

    /// Releases a row lock previously returned by [`Self::acquire`].
    ///
    /// Fails with `NotLocked` when the row is unlocked, expired, or held
    /// under a different token. Never deletes another holder's lock.
    pub async fn release(&self, row_id: RowId, token: &str) -> AppResult<()> {
        let key = self.lock_key(row_id);
        if !self.lock.is_held(&key).await? {
            return Err(row_not_locked(row_id));
        }

        let handle = LockHandle::from_token(key, token, self.ttl);
        match self.lock.release(&handle).await? {
            LockRelease::Released => {
                info!(%row_id, key = %handle.key, "row unlocked");
                Ok(())
            }
            LockRelease::NotHeld => {
                debug!(%row_id, key = %handle.key, "release token does not own row lock");
                Err(row_not_locked(row_id))
            }
        }
    }

    /// Locks a row, updates it and releases the lock in one critical section.
    ///
    /// The tier-one lock is released whatever the update outcome.
    pub async fn update_and_release(&self, row_id: RowId, name: &str) -> AppResult<Row> {
        let handle = self.acquire_tier_one(row_id).await?;
        self.update_then_release(row_id, &handle, name).await
    }

    /// Updates a row the caller already locked, then releases the lock.
    ///
    /// Fails with `NotLocked` when the token no longer owns the row lock.
    /// Once ownership is confirmed the lock is released whatever the update
    /// outcome.
    pub async fn update_held_and_release(
        &self,
        row_id: RowId,
        token: &str,
        name: &str,
    ) -> AppResult<Row> {
        let handle = LockHandle::from_token(self.lock_key(row_id), token, self.ttl);
        if !self.lock.is_held_by(&handle).await? {
            return Err(row_not_locked(row_id));
        }

        self.update_then_release(row_id, &handle, name).await
    }

    /// Extends the expiry of a row lock held under the given token.
    pub async fn renew(&self, row_id: RowId, token: &str) -> AppResult<RowLock> {
        let handle = LockHandle::from_token(self.lock_key(row_id), token, self.ttl);
        if !self.lock.renew(&handle, self.ttl).await? {
            return Err(row_not_locked(row_id));
        }

        debug!(
            %row_id,
            key = %handle.key,
            ttl_seconds = self.ttl.as_seconds(),
            "row lock renewed"
        );
        Ok(RowLock::new(row_id, handle))
    }

    async fn acquire_tier_one(&self, row_id: RowId) -> AppResult<LockHandle> {
        let key = self.lock_key(row_id);
        self.lock
            .try_acquire(&key, self.holder_id.as_str(), self.ttl)
            .await?
            .ok_or_else(|| {
                debug!(%row_id, %key, "row lock denied");
                AppError::AlreadyLocked(format!("Row {row_id} is already locked."))
            })
    }

    async fn update_then_release(
        &self,
        row_id: RowId,
        handle: &LockHandle,
        name: &str,
    ) -> AppResult<Row> {
        let row = self
            .guarded(row_id, handle, ReleasePolicy::Always, async {
                self.rows
                    .update_locked(row_id, name)
                    .await?
                    .ok_or_else(|| row_not_found(row_id))
            })
            .await?;

        info!(%row_id, key = %handle.key, "row updated and unlocked");
        Ok(row)
    }
}

fn row_not_found(row_id: RowId) -> AppError {
    AppError::NotFound(format!("Row {row_id} not found."))
}

fn row_not_locked(row_id: RowId) -> AppError {
    AppError::NotLocked(format!("Row {row_id} is not locked."))
}
