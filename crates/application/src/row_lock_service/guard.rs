use std::sync::Arc;

use rowguard_core::AppResult;
use rowguard_domain::RowId;
use tracing::{debug, warn};

use crate::row_lock_ports::{ExpiringLock, LockHandle, LockRelease};

use super::RowLockCoordinator;

/// When a guarded section gives its tier-one lock back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReleasePolicy {
    /// Keep the lock on success; release it on every failure exit.
    OnFailure,
    /// Release the lock on every exit.
    Always,
}

impl ReleasePolicy {
    fn releases<T>(self, outcome: &AppResult<T>) -> bool {
        match self {
            Self::OnFailure => outcome.is_err(),
            Self::Always => true,
        }
    }
}

/// Releases a tier-one lock when dropped while still armed.
///
/// Covers a guarded future dropped mid-flight, e.g. on client disconnect.
/// The release then runs as a detached task on the current runtime.
struct AbandonGuard {
    lock: Arc<dyn ExpiringLock>,
    row_id: RowId,
    handle: Option<LockHandle>,
}

impl AbandonGuard {
    fn arm(lock: Arc<dyn ExpiringLock>, row_id: RowId, handle: &LockHandle) -> Self {
        Self {
            lock,
            row_id,
            handle: Some(handle.clone()),
        }
    }

    fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let row_id = self.row_id;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                %row_id,
                key = %handle.key,
                "no runtime to release abandoned tier-one lock; it will lapse at expiry"
            );
            return;
        };

        debug!(%row_id, key = %handle.key, "guarded section abandoned; releasing lock");
        let lock = Arc::clone(&self.lock);
        runtime.spawn(async move {
            release_quietly(lock.as_ref(), row_id, &handle).await;
        });
    }
}

impl RowLockCoordinator {
    /// Runs storage work while holding a tier-one lock.
    ///
    /// The release is a compensating step: its own failure is logged and
    /// never replaces the outcome of `work`, since the lock expiry bounds
    /// how long a missed release can block other callers. Dropping the
    /// future before it completes still releases the lock.
    pub(super) async fn guarded<T, F>(
        &self,
        row_id: RowId,
        handle: &LockHandle,
        policy: ReleasePolicy,
        work: F,
    ) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let guard = AbandonGuard::arm(Arc::clone(&self.lock), row_id, handle);

        let outcome = work.await;
        if policy.releases(&outcome) {
            release_quietly(self.lock.as_ref(), row_id, handle).await;
        }

        guard.disarm();
        outcome
    }
}

async fn release_quietly(lock: &dyn ExpiringLock, row_id: RowId, handle: &LockHandle) {
    match lock.release(handle).await {
        Ok(LockRelease::Released) => {
            debug!(%row_id, key = %handle.key, "tier-one lock released");
        }
        Ok(LockRelease::NotHeld) => {
            warn!(
                %row_id,
                key = %handle.key,
                "tier-one lock expired before release"
            );
        }
        Err(error) => {
            warn!(
                %row_id,
                key = %handle.key,
                error = %error,
                "failed to release tier-one lock; it will lapse at expiry"
            );
        }
    }
}
