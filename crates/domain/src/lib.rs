//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod lock;
mod row;

pub use lock::{DEFAULT_LOCK_TTL_SECONDS, LOCK_KEY_PREFIX, LockKey, LockTtl};
pub use row::{Row, RowId};
