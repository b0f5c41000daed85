//! Application services and ports.

#![forbid(unsafe_code)]

mod row_lock_ports;
mod row_lock_service;

pub use row_lock_ports::{ExpiringLock, LockHandle, LockRelease, RowRepository};
pub use row_lock_service::{RowLock, RowLockCoordinator};
