//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but insufficient permissions.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unprocessable entity - well-formed input the domain rejects
    /// (e.g. a regressed meter reading).
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            Self::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "unprocessable",
                msg.clone(),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<aqua_billing_store::StoreError> for ApiError {
    fn from(err: aqua_billing_store::StoreError) -> Self {
        match err {
            aqua_billing_store::StoreError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            aqua_billing_store::StoreError::AlreadyExists { entity, key } => {
                Self::Conflict(format!("{entity} already exists: {key}"))
            }
            aqua_billing_store::StoreError::InvalidState(msg) => Self::Conflict(msg),
            aqua_billing_store::StoreError::Database(msg)
            | aqua_billing_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<aqua_billing_core::BillingError> for ApiError {
    fn from(err: aqua_billing_core::BillingError) -> Self {
        use aqua_billing_core::BillingError;

        match err {
            BillingError::BillAlreadyExists { meter_id, period } => Self::Conflict(format!(
                "bill already exists for meter {meter_id} in period {period}"
            )),
            BillingError::BillAlreadyPaid { bill_id } => {
                Self::Conflict(format!("bill already paid: {bill_id}"))
            }
            BillingError::NegativeUsage {
                meter_id,
                start,
                end,
            } => Self::Unprocessable(format!(
                "negative usage for meter {meter_id}: start={start}, end={end}"
            )),
            BillingError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            BillingError::ExternalService { service, message } => {
                Self::ExternalService(format!("{service}: {message}"))
            }
            BillingError::InvalidId(e) => Self::BadRequest(e.to_string()),
            BillingError::InvalidAmount(msg) | BillingError::Validation(msg) => {
                Self::BadRequest(msg)
            }
            BillingError::Storage(msg)
            | BillingError::Serialization(msg)
            | BillingError::Configuration(msg) => Self::Internal(msg),
        }
    }
}

impl From<crate::midtrans::MidtransError> for ApiError {
    fn from(err: crate::midtrans::MidtransError) -> Self {
        match err {
            crate::midtrans::MidtransError::Configuration(msg) => Self::Internal(msg),
            other => Self::ExternalService(other.to_string()),
        }
    }
}
