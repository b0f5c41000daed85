use rowguard_application::RowLock;
use rowguard_domain::Row;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
    pub redis: HealthDependencyStatus,
}

/// Reachability of one backing store.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-dependency-status.ts"
)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    pub detail: Option<String>,
}

/// Generic confirmation payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/message-response.ts"
)]
pub struct MessageResponse {
    pub message: String,
}

/// API representation of a held row lock.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/lock-response.ts"
)]
pub struct LockResponse {
    pub row_id: i64,
    pub lock_key: String,
    pub token: String,
    pub ttl_seconds: u32,
    pub expires_at: String,
    pub message: String,
}

impl LockResponse {
    pub fn new(lock: RowLock, message: String) -> Self {
        Self {
            row_id: lock.row_id.as_i64(),
            lock_key: lock.handle.key.as_str().to_owned(),
            token: lock.handle.token,
            ttl_seconds: lock.handle.ttl.as_seconds(),
            expires_at: lock.expires_at.to_rfc3339(),
            message,
        }
    }
}

/// API representation of an updated row.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/row-response.ts"
)]
pub struct RowResponse {
    pub id: i64,
    pub name: String,
    pub updated_at: String,
    pub message: String,
}

impl RowResponse {
    pub fn new(row: &Row, message: String) -> Self {
        Self {
            id: row.id().as_i64(),
            name: row.name().to_owned(),
            updated_at: row.updated_at().to_rfc3339(),
            message,
        }
    }
}

/// Incoming payload naming the lock token to release or renew.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/lock-token-request.ts"
)]
pub struct LockTokenRequest {
    pub token: Option<String>,
}

/// Incoming payload for a row update.
///
/// Without a token the update locks the row itself.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-row-request.ts"
)]
pub struct UpdateRowRequest {
    pub name: Option<String>,
    pub token: Option<String>,
}

/// Query-string form of a row update.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRowQuery {
    pub new_name: Option<String>,
    pub token: Option<String>,
}
