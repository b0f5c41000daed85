//! Lock naming and expiry invariants.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use rowguard_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::RowId;

/// Namespace shared by every row lock key.
pub const LOCK_KEY_PREFIX: &str = "lock:row";

/// Lock expiry used when none is configured.
pub const DEFAULT_LOCK_TTL_SECONDS: u32 = 30;

/// Shared-store key naming the distributed lock of one row.
///
/// Derived deterministically from the row identifier, so every process
/// computes the same key for the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockKey(String);

impl LockKey {
    /// Derives the lock key for one row.
    #[must_use]
    pub fn for_row(row_id: RowId) -> Self {
        Self(format!("{LOCK_KEY_PREFIX}:{row_id}"))
    }

    /// Returns the key as stored in the shared store.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for LockKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Positive lock expiry in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct LockTtl(u32);

impl LockTtl {
    /// Creates a validated lock TTL.
    pub fn from_seconds(seconds: u32) -> AppResult<Self> {
        if seconds == 0 {
            return Err(AppError::Validation(
                "lock ttl must be greater than zero seconds".to_owned(),
            ));
        }

        Ok(Self(seconds))
    }

    /// Returns the TTL in seconds.
    #[must_use]
    pub fn as_seconds(&self) -> u32 {
        self.0
    }

    /// Returns the TTL as a standard duration.
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.0))
    }
}

impl Default for LockTtl {
    fn default() -> Self {
        Self(DEFAULT_LOCK_TTL_SECONDS)
    }
}

impl TryFrom<u32> for LockTtl {
    type Error = AppError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_seconds(value)
    }
}

impl From<LockTtl> for u32 {
    fn from(value: LockTtl) -> Self {
        value.0
    }
}
