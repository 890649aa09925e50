//! # Error Types
//!
//! Domain-specific error types for retail-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  retail-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  retail-db errors (separate crate)                                     │
//! │  └── DbError          - Store failures (wraps CoreError as Domain)     │
//! │                                                                         │
//! │  retail-api errors                                                     │
//! │  └── ApiError         - What HTTP clients see (status + JSON body)     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the ledger and its processors.
///
/// Every variant carries enough context for the caller to correct the
/// request (which product, how much was available, ...).
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Branch stock cannot cover the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// POST /branches/B1/sales { P1 × 6 }
    ///      │
    ///      ▼
    /// StockEntry(B1, P1).quantity = 5
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: "P1", available: 5, requested: 6 }
    ///      │
    ///      ▼
    /// Transaction rolled back, stock still 5
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// HQ stock cannot cover a restock transfer.
    #[error("Insufficient stock in HQ for product {product_id}: available {available}, requested {requested}")]
    InsufficientHqStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// No branch is flagged as headquarters.
    #[error("Headquarters not found")]
    NoHeadquarters,

    /// HQ has no stock row for the product.
    #[error("Product {product_id} is not available in HQ")]
    ProductNotAtHq { product_id: String },

    /// Client-reported total disagrees with the server recomputation.
    #[error("Total mismatch: reported {reported}, computed {computed}")]
    TotalMismatch { reported: i64, computed: i64 },

    /// A status change that the state machine does not allow.
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// The request conflicts with current state (duplicate, already done, ...).
    #[error("{0}")]
    Conflict(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
/// Raised before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid email, invalid phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value inside one request (e.g., repeated clientTxnId).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "P1".to_string(),
            available: 5,
            requested: 6,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product P1: available 5, requested 6"
        );

        let err = CoreError::TotalMismatch {
            reported: 1000,
            computed: 900,
        };
        assert_eq!(err.to_string(), "Total mismatch: reported 1000, computed 900");
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("branchId").to_string(), "branchId is required");

        let err = ValidationError::TooShort {
            field: "password".to_string(),
            min: 6,
        };
        assert_eq!(err.to_string(), "password must be at least 6 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::must_be_positive("quantity").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
