use std::sync::Arc;

use rowguard_application::{ExpiringLock, RowLockCoordinator};
use rowguard_core::AppError;
use rowguard_infrastructure::{InMemoryExpiringLock, PostgresRowRepository, RedisExpiringLock};
use sqlx::PgPool;
use tracing::warn;

use crate::api_config::{ApiConfig, LockStoreConfig};
use crate::state::AppState;

use super::redis::build_redis_client;

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let redis_client = match config.lock_store {
        LockStoreConfig::Redis => Some(build_redis_client(config.redis_url.as_str())?),
        LockStoreConfig::InMemory => None,
    };

    let expiring_lock: Arc<dyn ExpiringLock> = match redis_client.clone() {
        Some(redis_client) => Arc::new(RedisExpiringLock::new(redis_client)),
        None => {
            warn!("LOCK_STORE=memory only coordinates requests within this process");
            Arc::new(InMemoryExpiringLock::new())
        }
    };

    let row_lock_coordinator = RowLockCoordinator::new(
        expiring_lock,
        Arc::new(PostgresRowRepository::new(pool.clone())),
        config.lock_holder_id.clone(),
        config.lock_ttl,
    );

    Ok(AppState {
        row_lock_coordinator,
        postgres_pool: pool,
        redis_required: redis_client.is_some(),
        redis_client,
    })
}
