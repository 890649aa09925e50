//! Error types for the retail API.
//!
//! Every handler returns `ApiResult<T>`. Store and business errors convert
//! into `ApiError` with `?`; the response body is always
//! `{"code": "...", "message": "...", "details": {...}}`.
//!
//! Internal failures are logged here and reach the client only as a
//! generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use retail_core::{CoreError, ValidationError};
use retail_db::DbError;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::mpesa::MpesaError;

/// Machine readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InsufficientStock,
    InsufficientHqStock,
    TotalMismatch,
    Conflict,
    Unauthorized,
    Forbidden,
    PaymentGatewayError,
    DatabaseError,
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError
            | ErrorCode::InsufficientStock
            | ErrorCode::InsufficientHqStock
            | ErrorCode::TotalMismatch => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::PaymentGatewayError => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error returned to HTTP clients.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden, "Insufficient permissions")
    }

    pub fn internal() -> Self {
        Self::new(ErrorCode::Internal, "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(_) => ApiError::validation(message),
            CoreError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, message),
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => ApiError::new(ErrorCode::InsufficientStock, message).with_details(json!({
                "productId": product_id,
                "available": available,
                "requested": requested,
            })),
            CoreError::InsufficientHqStock {
                product_id,
                available,
                requested,
            } => ApiError::new(ErrorCode::InsufficientHqStock, message).with_details(json!({
                "productId": product_id,
                "available": available,
                "requested": requested,
            })),
            CoreError::ProductNotAtHq { product_id } => {
                ApiError::new(ErrorCode::InsufficientHqStock, message)
                    .with_details(json!({ "productId": product_id, "available": 0 }))
            }
            // No restock source: a stock rule failure, not a missing resource.
            CoreError::NoHeadquarters => ApiError::new(ErrorCode::InsufficientHqStock, message),
            CoreError::TotalMismatch { reported, computed } => {
                ApiError::new(ErrorCode::TotalMismatch, message)
                    .with_details(json!({ "reported": reported, "computed": computed }))
            }
            CoreError::InvalidStatusTransition { .. } | CoreError::Conflict(_) => {
                ApiError::conflict(message)
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, err.to_string()),
            DbError::UniqueViolation { .. } => ApiError::conflict(err.to_string()),
            DbError::ForeignKeyViolation { .. } => {
                ApiError::conflict("Record is still referenced by other data")
            }
            other => {
                error!(error = %other, "Store failure");
                ApiError::new(ErrorCode::DatabaseError, "Database error")
            }
        }
    }
}

impl From<MpesaError> for ApiError {
    fn from(err: MpesaError) -> Self {
        error!(error = %err, "M-Pesa gateway failure");
        ApiError::new(ErrorCode::PaymentGatewayError, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_details() {
        let err: ApiError = DbError::Domain(CoreError::InsufficientStock {
            product_id: "P1".to_string(),
            available: 5,
            requested: 6,
        })
        .into();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        let details = err.details.unwrap();
        assert_eq!(details["productId"], "P1");
        assert_eq!(details["available"], 5);
        assert_eq!(details["requested"], 6);
    }

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                DbError::not_found("Branch", "B9").into(),
                StatusCode::NOT_FOUND,
            ),
            (
                DbError::duplicate("users.email", "a@b.co").into(),
                StatusCode::CONFLICT,
            ),
            (
                CoreError::InvalidStatusTransition {
                    entity: "sale".to_string(),
                    from: "paid".to_string(),
                    to: "failed".to_string(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                ValidationError::required("name").into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                DbError::Domain(CoreError::NoHeadquarters).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                DbError::Internal("disk I/O error".to_string()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "{:?}", err);
        }
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err: ApiError = DbError::QueryFailed("no such table: sales".to_string()).into();
        assert_eq!(err.message, "Database error");
    }

    #[test]
    fn test_code_serialization() {
        let body = serde_json::to_value(ApiError::forbidden()).unwrap();
        assert_eq!(body["code"], "FORBIDDEN");
        assert!(body.get("details").is_none());
    }
}
