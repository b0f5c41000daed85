use async_trait::async_trait;
use rowguard_core::AppResult;
use rowguard_domain::{Row, RowId};

/// Storage-engine port for transactional row locks.
#[async_trait]
pub trait RowRepository: Send + Sync {
    /// Reads one row with `SELECT ... FOR UPDATE` inside its own transaction.
    ///
    /// Returns `None` when the row does not exist.
    async fn select_for_update(&self, row_id: RowId) -> AppResult<Option<Row>>;

    /// Locks one row and updates its name within a single transaction.
    ///
    /// Returns `None` and writes nothing when the row does not exist.
    async fn update_locked(&self, row_id: RowId, name: &str) -> AppResult<Option<Row>>;
}
