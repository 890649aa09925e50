//! # Processors
//!
//! Multi-statement operations that must be all-or-nothing. Each public
//! method opens one transaction, runs every stock movement and insert on
//! it, and commits only when everything succeeded.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Processor Transaction                            │
//! │                                                                         │
//! │  begin_write() ──► validate refs ──► apply_lines ──► insert rows        │
//! │                         │               │               │               │
//! │                         └───── any Err ─┴───────────────┘               │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                      tx dropped → ROLLBACK (no partial effects)        │
//! │                                                                         │
//! │  all Ok ──► tx.commit()                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`sale::SaleProcessor`] - in-store sales and online orders
//! - [`restock::RestockProcessor`] - HQ → branch transfers
//! - [`payment::PaymentReconciler`] - gateway callback settlement
//! - [`sync::SyncProcessor`] - offline batch replay and admin resolution

pub mod payment;
pub mod restock;
pub mod sale;
pub mod sync;

use retail_core::ledger::{line_total, LineRequest, PricedLine};
use retail_core::validation::{validate_line_count, validate_quantity, validate_required};
use retail_core::CoreError;
use sqlx::SqliteConnection;

use crate::error::{DbError, DbResult};
use crate::ledger::StockLedger;
use crate::repository::product;

/// Takes stock for every line at `branch_id` and resolves its price.
///
/// Lines without a unit price use the live product price. A branch with no
/// stock row for a product reports `available: 0`.
pub(crate) async fn apply_lines(
    conn: &mut SqliteConnection,
    branch_id: &str,
    lines: &[LineRequest],
) -> DbResult<Vec<PricedLine>> {
    validate_line_count(lines.len())?;
    for line in lines {
        validate_required("productId", &line.product_id)?;
        validate_quantity(line.quantity)?;
    }

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let product = product::require_in(conn, &line.product_id).await?;

        match StockLedger::adjust(conn, branch_id, &line.product_id, -line.quantity).await {
            Ok(_) => {}
            Err(DbError::Domain(CoreError::NotFound { .. })) => {
                return Err(CoreError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    available: 0,
                    requested: line.quantity,
                }
                .into());
            }
            Err(e) => return Err(e),
        }

        let unit_price = line.unit_price.unwrap_or_else(|| product.price());
        priced.push(PricedLine {
            product_id: product.id,
            product_name: product.name,
            brand: product.brand,
            quantity: line.quantity,
            unit_price,
            line_total: line_total(unit_price, line.quantity)?,
        });
    }

    Ok(priced)
}

/// Puts stock back for `(product_id, quantity)` pairs, recreating rows that
/// were removed in the meantime. Pairs are owned so the future stays `Send`
/// for every caller lifetime.
pub(crate) async fn release_items(
    conn: &mut SqliteConnection,
    branch_id: &str,
    items: &[(String, i64)],
) -> DbResult<()> {
    for (product_id, quantity) in items {
        StockLedger::ensure_exists(conn, branch_id, product_id).await?;
        StockLedger::adjust(conn, branch_id, product_id, *quantity).await?;
    }
    Ok(())
}
