use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use rowguard_core::{AppError, AppResult, NonEmptyString};
use rowguard_domain::{LockKey, LockTtl, Row, RowId};

use crate::row_lock_ports::{ExpiringLock, LockHandle, LockRelease, RowRepository};

use super::RowLockCoordinator;

#[derive(Default)]
struct FakeExpiringLock {
    entries: Mutex<HashMap<String, String>>,
    fail_releases: Mutex<bool>,
    release_calls: Mutex<u32>,
}

impl FakeExpiringLock {
    async fn holder_of(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Simulates expiry followed by another process taking the key.
    async fn steal(&self, key: &str, token: &str) {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), token.to_owned());
    }
}

#[async_trait]
impl ExpiringLock for FakeExpiringLock {
    async fn try_acquire(
        &self,
        key: &LockKey,
        holder_id: &str,
        ttl: LockTtl,
    ) -> AppResult<Option<LockHandle>> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(key.as_str()) {
            return Ok(None);
        }

        let handle = LockHandle::issue(key.clone(), holder_id, ttl);
        entries.insert(key.as_str().to_owned(), handle.token.clone());
        Ok(Some(handle))
    }

    async fn is_held(&self, key: &LockKey) -> AppResult<bool> {
        Ok(self.entries.lock().await.contains_key(key.as_str()))
    }

    async fn is_held_by(&self, handle: &LockHandle) -> AppResult<bool> {
        Ok(self
            .entries
            .lock()
            .await
            .get(handle.key.as_str())
            .is_some_and(|token| *token == handle.token))
    }

    async fn release(&self, handle: &LockHandle) -> AppResult<LockRelease> {
        *self.release_calls.lock().await += 1;
        if *self.fail_releases.lock().await {
            return Err(AppError::Internal("simulated lock store outage".to_owned()));
        }

        let mut entries = self.entries.lock().await;
        if entries
            .get(handle.key.as_str())
            .is_some_and(|token| *token == handle.token)
        {
            entries.remove(handle.key.as_str());
            return Ok(LockRelease::Released);
        }

        Ok(LockRelease::NotHeld)
    }

    async fn renew(&self, handle: &LockHandle, _ttl: LockTtl) -> AppResult<bool> {
        self.is_held_by(handle).await
    }
}

#[derive(Default)]
struct FakeRowRepository {
    rows: Mutex<HashMap<RowId, Row>>,
    select_calls: Mutex<u32>,
    update_calls: Mutex<u32>,
    fail_selects: Mutex<bool>,
    fail_updates: Mutex<bool>,
    stall_selects: Mutex<bool>,
    stall_updates: Mutex<bool>,
}

impl FakeRowRepository {
    fn with_rows(row_ids: &[i64]) -> Self {
        let rows = row_ids
            .iter()
            .map(|id| {
                let row_id = RowId::new(*id);
                (row_id, Row::new(row_id, format!("row-{id}"), Utc::now()))
            })
            .collect();

        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }
}

#[async_trait]
impl RowRepository for FakeRowRepository {
    async fn select_for_update(&self, row_id: RowId) -> AppResult<Option<Row>> {
        *self.select_calls.lock().await += 1;
        if *self.stall_selects.lock().await {
            std::future::pending::<()>().await;
        }
        if *self.fail_selects.lock().await {
            return Err(AppError::Internal("simulated connection reset".to_owned()));
        }

        Ok(self.rows.lock().await.get(&row_id).cloned())
    }

    async fn update_locked(&self, row_id: RowId, name: &str) -> AppResult<Option<Row>> {
        *self.update_calls.lock().await += 1;
        if *self.stall_updates.lock().await {
            std::future::pending::<()>().await;
        }
        if *self.fail_updates.lock().await {
            return Err(AppError::Internal("simulated deadlock".to_owned()));
        }

        let mut rows = self.rows.lock().await;
        let Some(row) = rows.get_mut(&row_id) else {
            return Ok(None);
        };

        *row = Row::new(row_id, name, Utc::now());
        Ok(Some(row.clone()))
    }
}

fn build_coordinator(
    lock: Arc<FakeExpiringLock>,
    rows: Arc<FakeRowRepository>,
) -> RowLockCoordinator {
    RowLockCoordinator::new(
        lock,
        rows,
        NonEmptyString::new("test-process").unwrap_or_else(|_| unreachable!()),
        LockTtl::default(),
    )
}

/// Lets detached release tasks run until the key is free or the budget runs out.
async fn settle_release(lock: &FakeExpiringLock, key: &str) {
    for _ in 0..100 {
        if lock.holder_of(key).await.is_none() {
            return;
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn second_caller_is_denied_until_first_releases() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let caller_a = build_coordinator(lock.clone(), rows.clone());
    let caller_b = build_coordinator(lock, rows);
    let row_id = RowId::new(5);

    let held = caller_a.acquire(row_id).await;
    assert!(held.is_ok());
    let held = held.unwrap_or_else(|_| unreachable!());
    assert_eq!(held.handle.key.as_str(), "lock:row:5");
    assert!(held.handle.token.starts_with("test-process:"));

    let denied = caller_b.acquire(row_id).await;
    assert!(matches!(denied, Err(AppError::AlreadyLocked(_))));

    let released = caller_a.release(row_id, held.handle.token.as_str()).await;
    assert!(released.is_ok());

    let reacquired = caller_b.acquire(row_id).await;
    assert!(reacquired.is_ok());
}

#[tokio::test]
async fn denied_acquire_never_opens_storage_transaction() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let coordinator = build_coordinator(lock, rows.clone());

    assert!(coordinator.acquire(RowId::new(5)).await.is_ok());
    assert!(matches!(
        coordinator.acquire(RowId::new(5)).await,
        Err(AppError::AlreadyLocked(_))
    ));

    assert_eq!(*rows.select_calls.lock().await, 1);
}

#[tokio::test]
async fn missing_row_returns_not_found_without_residual_lock() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let coordinator = build_coordinator(lock.clone(), rows);
    let row_id = RowId::new(999);

    let first = coordinator.acquire(row_id).await;
    assert!(matches!(first, Err(AppError::NotFound(_))));
    assert!(lock.holder_of("lock:row:999").await.is_none());

    let second = coordinator.acquire(row_id).await;
    assert!(matches!(second, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn storage_failure_during_acquire_releases_tier_one() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    *rows.fail_selects.lock().await = true;
    let coordinator = build_coordinator(lock.clone(), rows.clone());

    let result = coordinator.acquire(RowId::new(5)).await;
    assert!(matches!(result, Err(AppError::Internal(_))));
    assert!(lock.holder_of("lock:row:5").await.is_none());

    *rows.fail_selects.lock().await = false;
    assert!(coordinator.acquire(RowId::new(5)).await.is_ok());
}

#[tokio::test]
async fn release_without_acquire_returns_not_locked() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let coordinator = build_coordinator(lock.clone(), rows);

    let result = coordinator.release(RowId::new(5), "nobody:token").await;
    assert!(matches!(result, Err(AppError::NotLocked(_))));
    assert_eq!(*lock.release_calls.lock().await, 0);
}

#[tokio::test]
async fn late_release_never_deletes_new_holder_lock() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let coordinator = build_coordinator(lock.clone(), rows);
    let row_id = RowId::new(5);

    let stale = coordinator
        .acquire(row_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    lock.steal("lock:row:5", "other-process:fresh").await;

    let result = coordinator
        .release(row_id, stale.handle.token.as_str())
        .await;
    assert!(matches!(result, Err(AppError::NotLocked(_))));
    assert_eq!(
        lock.holder_of("lock:row:5").await.as_deref(),
        Some("other-process:fresh")
    );
}

#[tokio::test]
async fn update_and_release_writes_row_and_frees_lock() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let coordinator = build_coordinator(lock.clone(), rows);

    let updated = coordinator.update_and_release(RowId::new(5), "renamed").await;
    assert!(matches!(updated, Ok(ref row) if row.name() == "renamed"));
    assert!(lock.holder_of("lock:row:5").await.is_none());
}

#[tokio::test]
async fn update_and_release_frees_lock_when_update_fails() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    *rows.fail_updates.lock().await = true;
    let coordinator = build_coordinator(lock.clone(), rows);

    let result = coordinator.update_and_release(RowId::new(5), "renamed").await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    assert!(coordinator.acquire(RowId::new(5)).await.is_ok());
}

#[tokio::test]
async fn update_and_release_of_missing_row_frees_lock() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::default());
    let coordinator = build_coordinator(lock.clone(), rows);

    let result = coordinator.update_and_release(RowId::new(7), "renamed").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(lock.holder_of("lock:row:7").await.is_none());
}

#[tokio::test]
async fn update_and_release_on_locked_row_is_denied_without_writing() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let coordinator = build_coordinator(lock, rows.clone());

    assert!(coordinator.acquire(RowId::new(5)).await.is_ok());
    let result = coordinator.update_and_release(RowId::new(5), "renamed").await;

    assert!(matches!(result, Err(AppError::AlreadyLocked(_))));
    assert_eq!(*rows.update_calls.lock().await, 0);
}

#[tokio::test]
async fn failed_compensating_release_keeps_update_outcome() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    *lock.fail_releases.lock().await = true;
    let coordinator = build_coordinator(lock.clone(), rows);

    let result = coordinator.update_and_release(RowId::new(5), "renamed").await;
    assert!(result.is_ok());
    assert_eq!(*lock.release_calls.lock().await, 1);
}

#[tokio::test]
async fn held_update_requires_owning_token() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let coordinator = build_coordinator(lock.clone(), rows.clone());
    let row_id = RowId::new(5);

    let held = coordinator
        .acquire(row_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    let foreign = coordinator
        .update_held_and_release(row_id, "intruder:token", "hijacked")
        .await;
    assert!(matches!(foreign, Err(AppError::NotLocked(_))));
    assert_eq!(*rows.update_calls.lock().await, 0);

    let owned = coordinator
        .update_held_and_release(row_id, held.handle.token.as_str(), "renamed")
        .await;
    assert!(matches!(owned, Ok(ref row) if row.name() == "renamed"));
    assert!(lock.holder_of("lock:row:5").await.is_none());
}

#[tokio::test]
async fn renew_requires_owning_token() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let coordinator = build_coordinator(lock, rows);
    let row_id = RowId::new(5);

    let held = coordinator
        .acquire(row_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    let renewed = coordinator.renew(row_id, held.handle.token.as_str()).await;
    assert!(matches!(renewed, Ok(ref lease) if lease.expires_at >= held.expires_at));

    let foreign = coordinator.renew(row_id, "intruder:token").await;
    assert!(matches!(foreign, Err(AppError::NotLocked(_))));
}

#[tokio::test]
async fn concurrent_acquires_grant_exactly_one_caller() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    let coordinator = build_coordinator(lock, rows);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.acquire(RowId::new(5)).await })
        })
        .collect();

    let mut granted = 0;
    let mut denied = 0;
    for task in tasks {
        match task.await.unwrap_or_else(|_| unreachable!()) {
            Ok(_) => granted += 1,
            Err(AppError::AlreadyLocked(_)) => denied += 1,
            Err(error) => panic!("unexpected acquire failure: {error}"),
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(denied, 15);
}

#[tokio::test]
async fn acquire_dropped_mid_storage_frees_tier_one() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    *rows.stall_selects.lock().await = true;
    let coordinator = build_coordinator(lock.clone(), rows.clone());

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), coordinator.acquire(RowId::new(5))).await;
    assert!(abandoned.is_err());

    settle_release(&lock, "lock:row:5").await;
    assert!(lock.holder_of("lock:row:5").await.is_none());

    *rows.stall_selects.lock().await = false;
    assert!(coordinator.acquire(RowId::new(5)).await.is_ok());
}

#[tokio::test]
async fn update_dropped_mid_storage_frees_tier_one() {
    let lock = Arc::new(FakeExpiringLock::default());
    let rows = Arc::new(FakeRowRepository::with_rows(&[5]));
    *rows.stall_updates.lock().await = true;
    let coordinator = build_coordinator(lock.clone(), rows.clone());

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        coordinator.update_and_release(RowId::new(5), "renamed"),
    )
    .await;
    assert!(abandoned.is_err());

    settle_release(&lock, "lock:row:5").await;
    assert!(lock.holder_of("lock:row:5").await.is_none());
    assert_eq!(*lock.release_calls.lock().await, 1);
}
