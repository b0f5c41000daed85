use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use rowguard_core::AppError;
use rowguard_domain::RowId;
use serde::de::DeserializeOwned;

use crate::dto::{
    LockResponse, LockTokenRequest, MessageResponse, RowResponse, UpdateRowQuery,
    UpdateRowRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;


pub async fn lock_row_handler(
    State(state): State<AppState>,
    Path(row_id): Path<String>,
) -> ApiResult<Json<LockResponse>> {
    let row_id = row_id.parse::<RowId>()?;
    let lock = state.row_lock_coordinator.acquire(row_id).await?;

    Ok(Json(LockResponse::new(
        lock,
        format!("Row {row_id} locked successfully."),
    )))
}

pub async fn unlock_row_handler(
    State(state): State<AppState>,
    Path(row_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    let row_id = row_id.parse::<RowId>()?;
    let token = parse_lock_token(row_id, &body)?;
    state
        .row_lock_coordinator
        .release(row_id, token.as_str())
        .await?;

    Ok(Json(MessageResponse {
        message: format!("Row {row_id} unlocked successfully."),
    }))
}

pub async fn renew_row_lock_handler(
    State(state): State<AppState>,
    Path(row_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<LockResponse>> {
    let row_id = row_id.parse::<RowId>()?;
    let token = parse_lock_token(row_id, &body)?;
    let lock = state
        .row_lock_coordinator
        .renew(row_id, token.as_str())
        .await?;

    Ok(Json(LockResponse::new(
        lock,
        format!("Row {row_id} lock renewed."),
    )))
}

pub async fn update_row_handler(
    State(state): State<AppState>,
    Path(row_id): Path<String>,
    Query(query): Query<UpdateRowQuery>,
    body: Bytes,
) -> ApiResult<Json<RowResponse>> {
    let row_id = row_id.parse::<RowId>()?;
    let payload: UpdateRowRequest = parse_json_body(&body, "update")?;

    let name = payload
        .name
        .or(query.new_name)
        .ok_or_else(|| AppError::Validation("name is required".to_owned()))?;
    let token = payload.token.or(query.token).filter(|token| !token.trim().is_empty());

    let coordinator = &state.row_lock_coordinator;
    let row = match token {
        Some(token) => {
            coordinator
                .update_held_and_release(row_id, token.as_str(), name.as_str())
                .await?
        }
        None => coordinator.update_and_release(row_id, name.as_str()).await?,
    };

    Ok(Json(RowResponse::new(
        &row,
        format!("Row {row_id} updated and unlocked successfully."),
    )))
}

/// A missing or blank token cannot own any lock, so it reads as `NotLocked`.
fn parse_lock_token(row_id: RowId, body: &[u8]) -> Result<String, AppError> {
    let payload: LockTokenRequest = parse_json_body(body, "lock token")?;

    payload
        .token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AppError::NotLocked(format!("Row {row_id} is not locked.")))
}

fn parse_json_body<T>(body: &[u8], label: &str) -> Result<T, AppError>
where
    T: Default + DeserializeOwned,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body)
        .map_err(|error| AppError::Validation(format!("invalid {label} payload: {error}")))
}
