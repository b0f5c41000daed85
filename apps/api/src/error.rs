use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rowguard_core::AppError;
use serde::Serialize;
use tracing::error;
use ts_rs::TS;

/// API error payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/error-response.ts"
)]
pub struct ErrorResponse {
    message: String,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            AppError::Validation(_) | AppError::AlreadyLocked(_) | AppError::NotLocked(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match &self.0 {
            AppError::Validation(message)
            | AppError::NotFound(message)
            | AppError::AlreadyLocked(message)
            | AppError::NotLocked(message) => message.clone(),
            AppError::Internal(_) => "internal server error".to_owned(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_internal() {
            error!(error = %self.0, "request failed");
        }

        let status = self.status();
        let payload = Json(ErrorResponse {
            message: self.public_message(),
        });

        (status, payload).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
