//! # retail-core: Pure Business Logic for the Retail Backend
//!
//! This crate holds the rules of the inventory-and-sale ledger as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Retail Backend Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 retail-api (axum REST server)                   │   │
//! │  │   /sales  /orders  /restock  /sync  /payments/mpesa/callback    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ retail-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │ validation│  │   │
//! │  │   │  Branch   │  │   Money   │  │  totals   │  │   rules   │  │   │
//! │  │   │   Sale    │  │  (cents)  │  │  status   │  │   phone   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐                                 │   │
//! │  │   │  gateway  │  │  report   │                                 │   │
//! │  │   │ callback  │  │  periods  │                                 │   │
//! │  │   └───────────┘  └───────────┘                                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          retail-db (stock ledger, processors, repositories)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Branch, Product, StockEntry, Sale, Order, Payment, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`ledger`] - Line totals, total verification, status mapping
//! - [`gateway`] - Mobile-money callback payload and its normalised form
//! - [`report`] - Report periods, stock health scoring, restock suggestions
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use retail_core::ledger::{line_total, verify_total};
//! use retail_core::money::Money;
//!
//! let line = line_total(Money::from_cents(5_000), 3).unwrap();
//! assert_eq!(line.cents(), 15_000);
//!
//! // The client claimed 15,000 cents, which matches.
//! assert!(verify_total(Money::from_cents(15_000), line).is_ok());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod gateway;
pub mod ledger;
pub mod money;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single sale or order.
pub const MAX_LINE_ITEMS: usize = 100;

/// Maximum quantity of a single product on one sale line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum quantity moved by one HQ→branch transfer line.
pub const MAX_TRANSFER_QUANTITY: i64 = 100_000;

/// Maximum records accepted in one offline sync batch.
pub const MAX_SYNC_BATCH: usize = 500;

/// Stock below this quantity counts as low.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Stock at or below this quantity counts as critical.
pub const CRITICAL_STOCK_THRESHOLD: i64 = 3;

/// HQ stock below this quantity is flagged in the HQ overview.
pub const HQ_LOW_STOCK_THRESHOLD: i64 = 50;
