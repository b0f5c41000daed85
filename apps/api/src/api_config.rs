use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rowguard_core::{AppError, NonEmptyString};
use rowguard_domain::{DEFAULT_LOCK_TTL_SECONDS, LockTtl};
use tracing_subscriber::EnvFilter;


/// Backing store for tier-one row locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStoreConfig {
    Redis,
    InMemory,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub lock_store: LockStoreConfig,
    pub lock_ttl: LockTtl,
    pub lock_holder_id: NonEmptyString,
    pub api_host: String,
    pub api_port: u16,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        migrate_only: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;

        let database_max_connections =
            parse_or_default(&lookup, "DATABASE_MAX_CONNECTIONS", 10_u32)?;
        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        let redis_url =
            lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_owned());

        let lock_store = match lookup("LOCK_STORE")
            .unwrap_or_else(|| "redis".to_owned())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "redis" => LockStoreConfig::Redis,
            "memory" | "in_memory" => LockStoreConfig::InMemory,
            other => {
                return Err(AppError::Validation(format!(
                    "LOCK_STORE must be either 'redis' or 'memory', got '{other}'"
                )));
            }
        };

        let lock_ttl = LockTtl::from_seconds(parse_or_default(
            &lookup,
            "LOCK_TTL_SECONDS",
            DEFAULT_LOCK_TTL_SECONDS,
        )?)
        .map_err(|_| {
            AppError::Validation("LOCK_TTL_SECONDS must be greater than zero".to_owned())
        })?;

        let lock_holder_id = match lookup("LOCK_HOLDER_ID") {
            Some(value) => NonEmptyString::new(value).map_err(|_| {
                AppError::Validation("LOCK_HOLDER_ID must not be empty".to_owned())
            })?,
            None => NonEmptyString::new(format!("rowguard-api-{}", uuid::Uuid::new_v4()))?,
        };

        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = parse_or_default(&lookup, "API_PORT", 3001_u16)?;

        Ok(Self {
            migrate_only,
            database_url,
            database_max_connections,
            redis_url,
            lock_store,
            lock_ttl,
            lock_holder_id,
            api_host,
            api_port,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|value| !value.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        None => Ok(default),
    }
}
