use rowguard_application::RowLockCoordinator;
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub row_lock_coordinator: RowLockCoordinator,
    pub postgres_pool: PgPool,
    pub redis_client: Option<redis::Client>,
    pub redis_required: bool,
}
