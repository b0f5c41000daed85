//! Redis-backed expiring lock for row coordination.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use rowguard_application::{ExpiringLock, LockHandle, LockRelease};
use rowguard_core::{AppError, AppResult};
use rowguard_domain::{LockKey, LockTtl};


const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

const RENEW_LOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('EXPIRE', KEYS[1], ARGV[2])
else
  return 0
end
"#;

/// Redis implementation of the expiring lock port.
///
/// Acquisition is a single `SET key token NX EX ttl`, so the key can never
/// exist without an expiry. Release and renewal run as Lua scripts that
/// compare the stored token before touching the key.
#[derive(Clone)]
pub struct RedisExpiringLock {
    client: redis::Client,
}

impl RedisExpiringLock {
    /// Creates one lock adapter.
    #[must_use]
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl ExpiringLock for RedisExpiringLock {
    async fn try_acquire(
        &self,
        key: &LockKey,
        holder_id: &str,
        ttl: LockTtl,
    ) -> AppResult<Option<LockHandle>> {
        let handle = LockHandle::issue(key.clone(), holder_id, ttl);
        let mut connection = self.connection().await?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(key.as_str())
            .arg(handle.token.as_str())
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_seconds())
            .query_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to acquire row lock '{key}': {error}"))
            })?;

        Ok(reply.map(|_| handle))
    }

    async fn is_held(&self, key: &LockKey) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        connection
            .exists::<_, bool>(key.as_str())
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to inspect row lock '{key}': {error}"))
            })
    }

    async fn is_held_by(&self, handle: &LockHandle) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        let token: Option<String> = connection
            .get(handle.key.as_str())
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to read row lock '{}': {error}",
                    handle.key
                ))
            })?;

        Ok(token.as_deref() == Some(handle.token.as_str()))
    }

    async fn release(&self, handle: &LockHandle) -> AppResult<LockRelease> {
        let script = Script::new(RELEASE_LOCK_SCRIPT);
        let mut connection = self.connection().await?;

        let deleted = script
            .key(handle.key.as_str())
            .arg(handle.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to release row lock '{}': {error}",
                    handle.key
                ))
            })?;

        Ok(if deleted > 0 {
            LockRelease::Released
        } else {
            LockRelease::NotHeld
        })
    }

    async fn renew(&self, handle: &LockHandle, ttl: LockTtl) -> AppResult<bool> {
        let script = Script::new(RENEW_LOCK_SCRIPT);
        let mut connection = self.connection().await?;

        let renewed = script
            .key(handle.key.as_str())
            .arg(handle.token.as_str())
            .arg(i64::from(ttl.as_seconds()))
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to renew row lock '{}': {error}",
                    handle.key
                ))
            })?;

        Ok(renewed > 0)
    }
}
