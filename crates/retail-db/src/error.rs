//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Business rule (CoreError)           │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──── DbError::Domain(CoreError)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (retail-api) ← status code + JSON body                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Processors return `DbResult<T>` for both kinds of failure, so a handler
//! matches one error type and a `?` inside a transaction rolls it back no
//! matter which layer failed.

use retail_core::{CoreError, ValidationError};
use thiserror::Error;

/// Store failures, plus business-rule failures raised mid-transaction.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write. `field` is the `table.column` list
    /// SQLite reports, e.g. `sales.client_txn_id` for a replayed offline sale,
    /// `users.email`, `branches.name`, or the single-HQ partial index.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Deleting a branch/product that stock, sales or restocks still point
    /// at, or inserting a line for a product that does not exist.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A column CHECK failed. For `stock.quantity >= 0` this means a ledger
    /// write got past the availability check.
    #[error("Check constraint failed: {constraint}")]
    CheckViolation { constraint: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Business rule violation raised inside a transaction.
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True for a unique-constraint failure on the given `table.column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(column))
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Classifies a SQLite error message by constraint kind.
///
/// ```text
/// "UNIQUE constraint failed: sales.client_txn_id"  → UniqueViolation
/// "FOREIGN KEY constraint failed"                  → ForeignKeyViolation
/// "CHECK constraint failed: quantity >= 0"         → CheckViolation
/// anything else                                    → QueryFailed
/// ```
fn classify_sqlite_message(msg: &str) -> DbError {
    if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
        DbError::duplicate(field, "unknown")
    } else if msg.starts_with("FOREIGN KEY constraint failed") {
        DbError::ForeignKeyViolation {
            message: msg.to_string(),
        }
    } else if let Some(constraint) = msg.strip_prefix("CHECK constraint failed: ") {
        DbError::CheckViolation {
            constraint: constraint.to_string(),
        }
    } else {
        DbError::QueryFailed(msg.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => classify_sqlite_message(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
