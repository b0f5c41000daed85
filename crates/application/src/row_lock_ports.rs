mod expiring_lock;
mod row_repository;

pub use expiring_lock::{ExpiringLock, LockHandle, LockRelease};
pub use row_repository::RowRepository;
