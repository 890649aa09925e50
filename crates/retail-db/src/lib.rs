//! # retail-db: Database Layer for the Retail Backend
//!
//! SQLite storage for branches, products, stock, sales, orders and payments,
//! plus the processors that keep stock and sales consistent.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Retail Backend Data Flow                         │
//! │                                                                         │
//! │  HTTP handler (POST /branches/{id}/sales)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    retail-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐      │   │
//! │  │   │  Database    │   │  Processors  │   │ Repositories │      │   │
//! │  │   │  (pool.rs)   │   │ sale/restock │   │ branch/sale  │      │   │
//! │  │   │              │──►│ payment/sync │──►│ order/...    │      │   │
//! │  │   │  SqlitePool  │   │ one tx each  │   │ *_in helpers │      │   │
//! │  │   └──────────────┘   └──────┬───────┘   └──────────────┘      │   │
//! │  │                             │                                   │   │
//! │  │                      ┌──────▼───────┐   ┌──────────────┐      │   │
//! │  │                      │ StockLedger  │   │  Migrations  │      │   │
//! │  │                      │ atomic adjust│   │  (embedded)  │      │   │
//! │  │                      └──────────────┘   └──────────────┘      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign keys on)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`ledger`] - The `(branch, product) → quantity` store
//! - [`processor`] - Transactional sale, order, restock, payment and sync flows
//! - [`repository`] - Table-family repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use retail_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("retail.db")).await?;
//!
//! let sale = db
//!     .sale_processor()
//!     .create_sale(&branch_id, &user_id, &request)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod processor;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ledger::StockLedger;
pub use pool::{Database, DbConfig};

pub use processor::payment::{PaymentReconciler, ReconcileOutcome};
pub use processor::restock::RestockProcessor;
pub use processor::sale::SaleProcessor;
pub use processor::sync::SyncProcessor;
