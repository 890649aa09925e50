//! # Domain Types
//!
//! Core domain types shared by the database layer and the REST API.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────┐   ┌────────────────────┐   ┌─────────────┐            │
//! │  │   Branch    │──►│    StockEntry      │◄──│   Product   │            │
//! │  │ is_hq flag  │   │ (branch, product)  │   │ brand,price │            │
//! │  └─────────────┘   │ quantity >= 0      │   └─────────────┘            │
//! │                    └─────────┬──────────┘                              │
//! │          ┌───────────────────┼────────────────────┐                    │
//! │          ▼                   ▼                    ▼                    │
//! │  ┌─────────────┐   ┌──────────────────┐   ┌──────────────────────┐     │
//! │  │ Sale        │   │ RestockLog       │   │ InventoryAdjustment  │     │
//! │  │ └ SaleItem  │   │ HQ → branch      │   │ admin set            │     │
//! │  └─────────────┘   └──────────────────┘   └──────────────────────┘     │
//! │  ┌─────────────┐   ┌──────────────────┐                                │
//! │  │ Order       │──►│ Payment (1:1)    │                                │
//! │  │ └ OrderItem │   │ checkout token   │                                │
//! │  └─────────────┘   └──────────────────┘                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every StockEntry mutation happens in a transaction that also writes one of
//! the records underneath it (sale/order item, restock log, adjustment).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

/// Implements `as_str`, `Display` and `FromStr` for a lowercase status enum.
macro_rules! status_strings {
    ($ty:ident, $field:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Wire/database spelling of the status.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s,)+
                }
            }

            /// All accepted spellings, for error messages.
            pub fn allowed() -> Vec<String> {
                vec![$($s.to_string()),+]
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($s => Ok($ty::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: $field.to_string(),
                        allowed: $ty::allowed(),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Users
// =============================================================================

/// Access role carried in the JWT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

status_strings!(Role, "role", { Admin => "admin", Customer => "customer" });

/// A registered user (password hash never leaves the database layer).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Branch
// =============================================================================

/// A retail location. Exactly one branch is the headquarters and is the
/// only restock source.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub location: String,
    pub is_headquarters: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A brand-scoped catalog entry.
///
/// `price_cents` is authoritative for new online sales only; line items keep
/// the price captured when they were written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub description: Option<String>,
    pub price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the live price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Quantity of one product held at one branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub branch_id: String,
    pub product_id: String,
    pub quantity: i64,
    #[ts(as = "Option<String>")]
    pub last_restocked: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A stock row joined with its branch and product, for inventory views.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockView {
    pub branch_id: String,
    pub branch_name: String,
    pub product_id: String,
    pub product_name: String,
    pub brand: String,
    pub price_cents: i64,
    pub quantity: i64,
    #[ts(as = "Option<String>")]
    pub last_restocked: Option<DateTime<Utc>>,
}

/// Audit row for an admin stock correction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustment {
    pub id: String,
    pub branch_id: String,
    pub product_id: String,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub reason: String,
    pub adjusted_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Immutable audit record of one HQ→branch transfer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RestockLog {
    pub id: String,
    pub branch_id: String,
    pub product_id: String,
    pub quantity_added: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub restocked_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
///
/// ```text
/// pending ──► paid
///    │ ├────► failed
///    │ └────► cancelled
/// (terminal states accept no further transition)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

status_strings!(SaleStatus, "status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl SaleStatus {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, SaleStatus::Pending)
    }

    pub const fn can_transition_to(&self, next: SaleStatus) -> bool {
        matches!(self, SaleStatus::Pending) && !matches!(next, SaleStatus::Pending)
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Pending
    }
}

// =============================================================================
// Order / Payment Status
// =============================================================================

/// Fulfilment status of an online order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Processing,
    Completed,
    Cancelled,
}

status_strings!(OrderStatus, "status", {
    Processing => "processing",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl OrderStatus {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Processing)
    }

    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(self, OrderStatus::Processing) && !matches!(next, OrderStatus::Processing)
    }
}

/// Status of a payment (and the payment view of an order).
///
/// At most one terminal transition happens per checkout token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

status_strings!(PaymentStatus, "paymentStatus", {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

impl PaymentStatus {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// Payment channel of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Mpesa,
}

// =============================================================================
// Sale
// =============================================================================

/// One customer transaction at one branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub branch_id: String,
    pub user_id: String,
    pub total_cents: i64,
    pub status: SaleStatus,
    /// External payment reference reported by the client or gateway.
    pub payment_ref: Option<String>,
    pub payment_method: Option<String>,
    /// Idempotency token of an offline-originated sale.
    pub client_txn_id: Option<String>,
    /// Device that uploaded the offline sale.
    pub client_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// When the server accepted an offline sale.
    #[ts(as = "Option<String>")]
    pub synced_at: Option<DateTime<Utc>>,
}

/// A line item of a sale. Uses the snapshot pattern: the unit price is
/// frozen at the time the sale is written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sale together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleWithItems {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Order
// =============================================================================

/// An online order paid through mobile money.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub branch_id: String,
    pub total_cents: i64,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub mpesa_transaction_id: Option<String>,
    pub order_status: OrderStatus,
    pub phone: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A line item of an order, with brand and price snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_brand: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An order together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// =============================================================================
// Payment
// =============================================================================

/// The mobile-money payment of an order (one-to-one).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub phone: String,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    /// Receipt number once completed, `MPESA_<checkout>` while pending.
    pub transaction_id: Option<String>,
    /// Gateway checkout token; the callback idempotency key.
    pub checkout_request_id: Option<String>,
    /// Raw callback body kept for audit.
    pub gateway_response: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Offline Sync
// =============================================================================

/// Classification of one offline sale record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Duplicate,
    InsufficientStock,
    Failed,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_status_transitions() {
        assert!(SaleStatus::Pending.can_transition_to(SaleStatus::Paid));
        assert!(SaleStatus::Pending.can_transition_to(SaleStatus::Cancelled));
        assert!(!SaleStatus::Pending.can_transition_to(SaleStatus::Pending));
        assert!(!SaleStatus::Paid.can_transition_to(SaleStatus::Failed));
        assert!(SaleStatus::Failed.is_terminal());
        assert_eq!(SaleStatus::default(), SaleStatus::Pending);
    }

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("PAID".parse::<SaleStatus>().unwrap(), SaleStatus::Paid);
        assert_eq!(" cancelled ".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);

        let err = "refunded".parse::<SaleStatus>().unwrap_err();
        assert!(matches!(err, ValidationError::NotAllowed { .. }));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&SaleStatus::Paid).unwrap(), "\"paid\"");
        assert_eq!(
            serde_json::to_string(&SyncStatus::InsufficientStock).unwrap(),
            "\"insufficient_stock\""
        );
    }
}
