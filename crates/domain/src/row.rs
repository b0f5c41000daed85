//! Row identity and the persisted example row.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rowguard_core::AppError;
use serde::{Deserialize, Serialize};

/// Primary key of one row in the example table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(i64);

impl RowId {
    /// Creates a row identifier from its primary key value.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying primary key value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for RowId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for RowId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid row id '{value}': {error}")))
    }
}

impl Display for RowId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Snapshot of one persisted row as read inside a storage transaction.
///
/// Rows are never cached between calls; every snapshot comes from the
/// storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    id: RowId,
    name: String,
    updated_at: DateTime<Utc>,
}

impl Row {
    /// Creates a row snapshot.
    #[must_use]
    pub fn new(id: RowId, name: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            updated_at,
        }
    }

    /// Returns the row identifier.
    #[must_use]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Returns the mutable example column.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the last modification timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
