use redis::AsyncCommands;

use crate::dto::HealthDependencyStatus;

use super::{dependency_error, dependency_ok};

pub(super) async fn check_postgres(pool: sqlx::PgPool) -> HealthDependencyStatus {
    let check = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await;

    match check {
        Ok(_) => dependency_ok(),
        Err(error) => dependency_error(format!("postgres check failed: {error}")),
    }
}

pub(super) async fn check_redis(
    redis_client: Option<redis::Client>,
    redis_required: bool,
) -> HealthDependencyStatus {
    let Some(redis_client) = redis_client else {
        return if redis_required {
            dependency_error("redis client is not configured".to_owned())
        } else {
            HealthDependencyStatus {
                status: "disabled",
                detail: None,
            }
        };
    };

    let mut connection = match redis_client.get_multiplexed_async_connection().await {
        Ok(connection) => connection,
        Err(error) => return dependency_error(format!("redis connection failed: {error}")),
    };

    match connection.ping::<String>().await {
        Ok(value) if value.eq_ignore_ascii_case("pong") => dependency_ok(),
        Ok(value) => dependency_error(format!("unexpected redis ping response: {value}")),
        Err(error) => dependency_error(format!("redis ping failed: {error}")),
    }
}
