use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use rowguard_application::RowRepository;
use rowguard_core::AppResult;
use rowguard_domain::{Row, RowId};
use tokio::sync::Mutex;

/// In-memory row repository.
///
/// The map lock stands in for the storage engine's row lock; it is held for
/// the whole select-then-update sequence.
#[derive(Default)]
pub struct InMemoryRowRepository {
    rows: Mutex<BTreeMap<RowId, Row>>,
}

impl InMemoryRowRepository {
    /// Creates an empty row repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one row.
    pub async fn insert(&self, row_id: RowId, name: impl Into<String>) -> Row {
        let row = Row::new(row_id, name, Utc::now());
        self.rows.lock().await.insert(row_id, row.clone());
        row
    }

    /// Removes one row, returning whether it existed.
    pub async fn remove(&self, row_id: RowId) -> bool {
        self.rows.lock().await.remove(&row_id).is_some()
    }
}

#[async_trait]
impl RowRepository for InMemoryRowRepository {
    async fn select_for_update(&self, row_id: RowId) -> AppResult<Option<Row>> {
        Ok(self.rows.lock().await.get(&row_id).cloned())
    }

    async fn update_locked(&self, row_id: RowId, name: &str) -> AppResult<Option<Row>> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.get_mut(&row_id) else {
            return Ok(None);
        };

        *row = Row::new(row_id, name, Utc::now());
        Ok(Some(row.clone()))
    }
}
