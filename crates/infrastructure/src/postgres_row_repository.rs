use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rowguard_application::RowRepository;
use rowguard_core::{AppError, AppResult};
use rowguard_domain::{Row, RowId};
use sqlx::{FromRow, PgPool, Postgres, Transaction};


/// PostgreSQL-backed row repository for `example_table`.
#[derive(Clone)]
pub struct PostgresRowRepository {
    pool: PgPool,
}

impl PostgresRowRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self, row_id: RowId) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start row lock transaction for row '{row_id}': {error}"
            ))
        })
    }
}

#[derive(Debug, FromRow)]
struct ExampleRow {
    id: i64,
    name: String,
    updated_at: DateTime<Utc>,
}

impl From<ExampleRow> for Row {
    fn from(value: ExampleRow) -> Self {
        Row::new(RowId::new(value.id), value.name, value.updated_at)
    }
}

async fn lock_row(
    transaction: &mut Transaction<'static, Postgres>,
    row_id: RowId,
) -> AppResult<Option<ExampleRow>> {
    sqlx::query_as::<_, ExampleRow>(
        r#"
        SELECT id, name, updated_at
        FROM example_table
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(row_id.as_i64())
    .fetch_optional(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to lock row '{row_id}': {error}")))
}

#[async_trait]
impl RowRepository for PostgresRowRepository {
    async fn select_for_update(&self, row_id: RowId) -> AppResult<Option<Row>> {
        let mut transaction = self.begin(row_id).await?;
        let row = lock_row(&mut transaction, row_id).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit row lock transaction for row '{row_id}': {error}"
            ))
        })?;

        Ok(row.map(Row::from))
    }

    async fn update_locked(&self, row_id: RowId, name: &str) -> AppResult<Option<Row>> {
        let mut transaction = self.begin(row_id).await?;

        if lock_row(&mut transaction, row_id).await?.is_none() {
            transaction.rollback().await.map_err(|error| {
                AppError::Internal(format!(
                    "failed to roll back row update transaction for row '{row_id}': {error}"
                ))
            })?;
            return Ok(None);
        }

        let updated = sqlx::query_as::<_, ExampleRow>(
            r#"
            UPDATE example_table
            SET name = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, name, updated_at
            "#,
        )
        .bind(row_id.as_i64())
        .bind(name)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update row '{row_id}': {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit row update transaction for row '{row_id}': {error}"
            ))
        })?;

        Ok(Some(Row::from(updated)))
    }
}
