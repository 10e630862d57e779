use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use clinicrx_core::DomainError;
use clinicrx_infra::{PersistenceError, WorkflowError};

/// Handler-level error; every variant renders as `{ "error": code, "message": ... }`.
#[derive(Debug)]
pub enum ApiError {
    Workflow(WorkflowError),
    Internal(String),
}

impl From<WorkflowError> for ApiError {
    fn from(value: WorkflowError) -> Self {
        ApiError::Workflow(value)
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        ApiError::Workflow(WorkflowError::Domain(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Workflow(WorkflowError::Domain(err)) => domain_error_to_response(err),
            ApiError::Workflow(WorkflowError::Persistence(err)) => persistence_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidDiscount(_) => json_error(StatusCode::BAD_REQUEST, "invalid_discount", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::InsufficientStock {
            descriptor,
            batch_id,
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": message,
                "descriptor": descriptor,
                "batch_id": batch_id.to_string(),
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
        DomainError::SequenceExhausted { .. } => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "sequence_exhausted", message)
        }
    }
}

pub fn persistence_error_to_response(err: PersistenceError) -> Response {
    tracing::error!(error = %err, "store error");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
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
