//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_expiring_lock;
mod in_memory_row_repository;
mod postgres_row_repository;
mod redis_expiring_lock;

pub use in_memory_expiring_lock::InMemoryExpiringLock;
pub use in_memory_row_repository::InMemoryRowRepository;
pub use postgres_row_repository::PostgresRowRepository;
pub use redis_expiring_lock::RedisExpiringLock;
