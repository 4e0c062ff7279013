use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use lotkeeper_core::DomainError;
use lotkeeper_infra::{IntakeError, LockError, LotStoreError};
use lotkeeper_inventory::BatchError;

/// Reserve/consume failures keep the `{ success: false, error }` body shape.
pub fn batch_error_to_response(err: BatchError) -> Response {
    let status = match &err {
        BatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        BatchError::InsufficientStock { .. } => StatusCode::CONFLICT,
        BatchError::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status,
        axum::Json(json!({
            "success": false,
            "error": err.to_string(),
            "code": err.code(),
            "shortfalls": err.shortfalls(),
        })),
    )
        .into_response()
}

pub fn intake_error_to_response(err: IntakeError) -> Response {
    match err {
        IntakeError::Domain(DomainError::Validation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        IntakeError::Domain(DomainError::InvalidId(msg)) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        IntakeError::Domain(DomainError::Conflict(msg)) | IntakeError::Store(LotStoreError::Conflict(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        IntakeError::Domain(DomainError::InvariantViolation(msg)) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        IntakeError::Store(e) => json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_failure", e.to_string()),
        IntakeError::Lock(e @ LockError::Timeout { .. }) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "lock_timeout", e.to_string())
        }
        IntakeError::Lock(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "lock_error", e.to_string()),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
