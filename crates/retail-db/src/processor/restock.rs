//! # Restock Transfer Processor
//!
//! Moves quantity from the headquarters stock row to a destination branch.
//! This is the only operation that touches two stock rows of the same
//! product, so both moves and the audit log share one transaction.
//!
//! ## Transfer
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   HQ (P1: 100)                            Branch B2 (P1: 12)            │
//! │        │                                         ▲                      │
//! │        │  adjust(HQ, P1, -30)                    │ adjust(B2, P1, +30)  │
//! │        └──────────────── 30 units ───────────────┘                      │
//! │                                                                         │
//! │   HQ (P1: 70)                             Branch B2 (P1: 42)            │
//! │                                                                         │
//! │   restock_logs += { B2, P1, added 30, previous 12, new 42, actor }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Bulk transfers run every item on the same transaction; the first failing
//! item aborts the batch.

use chrono::Utc;
use retail_core::validation::{validate_line_count, validate_required, validate_transfer_quantity};
use retail_core::{CoreError, RestockLog, StockEntry};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::ledger::StockLedger;
use crate::pool::begin_write;
use crate::repository::{branch, product, restock};

/// Body of `POST /restock`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockRequest {
    pub branch_id: String,
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Body of `POST /restock/bulk`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRestockRequest {
    pub branch_id: String,
    pub items: Vec<RestockItem>,
}

/// Result of one transfer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockOutcome {
    /// Destination row after the transfer.
    pub stock: StockEntry,
    pub hq_remaining: i64,
    pub log: RestockLog,
}

#[derive(Debug, Clone)]
pub struct RestockProcessor {
    pool: SqlitePool,
}

impl RestockProcessor {
    pub fn new(pool: SqlitePool) -> Self {
        RestockProcessor { pool }
    }

    pub async fn restock(&self, request: &RestockRequest, actor: &str) -> DbResult<RestockOutcome> {
        let mut tx = begin_write(&self.pool).await?;

        let hq_id = resolve_headquarters(&mut tx).await?;
        branch::require_in(&mut tx, &request.branch_id).await?;
        let outcome = transfer(
            &mut tx,
            &hq_id,
            &request.branch_id,
            &request.product_id,
            request.quantity,
            actor,
        )
        .await?;

        tx.commit().await?;
        Ok(outcome)
    }

    /// All items or none.
    pub async fn bulk_restock(
        &self,
        request: &BulkRestockRequest,
        actor: &str,
    ) -> DbResult<Vec<RestockOutcome>> {
        validate_line_count(request.items.len())?;

        let mut tx = begin_write(&self.pool).await?;

        let hq_id = resolve_headquarters(&mut tx).await?;
        branch::require_in(&mut tx, &request.branch_id).await?;

        let mut outcomes = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let outcome = transfer(
                &mut tx,
                &hq_id,
                &request.branch_id,
                &item.product_id,
                item.quantity,
                actor,
            )
            .await?;
            outcomes.push(outcome);
        }

        tx.commit().await?;

        info!(
            branch_id = %request.branch_id,
            items = outcomes.len(),
            "Bulk restock committed"
        );
        Ok(outcomes)
    }
}

async fn resolve_headquarters(conn: &mut SqliteConnection) -> DbResult<String> {
    let hq = branch::headquarters_in(conn)
        .await?
        .ok_or(CoreError::NoHeadquarters)?;
    Ok(hq.id)
}

/// One HQ → branch move on the caller's transaction.
async fn transfer(
    conn: &mut SqliteConnection,
    hq_id: &str,
    branch_id: &str,
    product_id: &str,
    quantity: i64,
    actor: &str,
) -> DbResult<RestockOutcome> {
    validate_required("productId", product_id)?;
    validate_transfer_quantity(quantity)?;
    if hq_id == branch_id {
        return Err(CoreError::Conflict("Headquarters cannot restock itself".to_string()).into());
    }

    product::require_in(conn, product_id).await?;

    if StockLedger::get(conn, hq_id, product_id).await?.is_none() {
        return Err(CoreError::ProductNotAtHq {
            product_id: product_id.to_string(),
        }
        .into());
    }

    let hq_remaining = match StockLedger::adjust(conn, hq_id, product_id, -quantity).await {
        Ok(remaining) => remaining,
        Err(DbError::Domain(CoreError::InsufficientStock {
            available,
            requested,
            ..
        })) => {
            return Err(CoreError::InsufficientHqStock {
                product_id: product_id.to_string(),
                available,
                requested,
            }
            .into());
        }
        Err(e) => return Err(e),
    };

    StockLedger::ensure_exists(conn, branch_id, product_id).await?;
    let new_quantity = StockLedger::adjust(conn, branch_id, product_id, quantity).await?;

    let log = RestockLog {
        id: Uuid::new_v4().to_string(),
        branch_id: branch_id.to_string(),
        product_id: product_id.to_string(),
        quantity_added: quantity,
        previous_quantity: new_quantity - quantity,
        new_quantity,
        restocked_by: actor.to_string(),
        created_at: Utc::now(),
    };
    restock::insert_log_in(conn, &log).await?;

    let stock = sqlx::query_as::<_, StockEntry>(
        r#"
        SELECT branch_id, product_id, quantity, last_restocked, updated_at
        FROM stock_entries
        WHERE branch_id = ?1 AND product_id = ?2
        "#,
    )
    .bind(branch_id)
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;

    info!(
        branch_id = %branch_id,
        product_id = %product_id,
        quantity,
        hq_remaining,
        new_quantity,
        "Restock transferred"
    );

    Ok(RestockOutcome {
        stock,
        hq_remaining,
        log,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::restock::RestockHistoryFilter;
    use crate::testing::fixture;

    #[tokio::test]
    async fn test_transfer_conserves_quantity() {
        let f = fixture().await;
        f.stock(&f.hq.id, &f.coke.id, 100).await;
        f.stock(&f.branch.id, &f.coke.id, 12).await;

        let outcome = f
            .db
            .restock_processor()
            .restock(
                &RestockRequest {
                    branch_id: f.branch.id.clone(),
                    product_id: f.coke.id.clone(),
                    quantity: 30,
                },
                &f.admin.id,
            )
            .await
            .unwrap();

        assert_eq!(outcome.hq_remaining, 70);
        assert_eq!(outcome.stock.quantity, 42);
        assert!(outcome.stock.last_restocked.is_some());
        assert_eq!(outcome.log.previous_quantity, 12);
        assert_eq!(outcome.log.new_quantity, 42);
        assert_eq!(outcome.log.restocked_by, f.admin.id);

        let history = f
            .db
            .restocks()
            .history(&RestockHistoryFilter::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_creates_destination_row() {
        let f = fixture().await;
        f.stock(&f.hq.id, &f.fanta.id, 20).await;

        let outcome = f
            .db
            .restock_processor()
            .restock(
                &RestockRequest {
                    branch_id: f.branch.id.clone(),
                    product_id: f.fanta.id.clone(),
                    quantity: 20,
                },
                &f.admin.id,
            )
            .await
            .unwrap();

        assert_eq!(outcome.hq_remaining, 0);
        assert_eq!(outcome.stock.quantity, 20);
        assert_eq!(outcome.log.previous_quantity, 0);
    }

    #[tokio::test]
    async fn test_insufficient_hq_stock() {
        let f = fixture().await;
        f.stock(&f.hq.id, &f.coke.id, 10).await;

        let err = f
            .db
            .restock_processor()
            .restock(
                &RestockRequest {
                    branch_id: f.branch.id.clone(),
                    product_id: f.coke.id.clone(),
                    quantity: 11,
                },
                &f.admin.id,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientHqStock { available: 10, requested: 11, .. })
        ));
        assert!(f.db.stock().get(&f.branch.id, &f.coke.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_product_not_at_hq() {
        let f = fixture().await;

        let err = f
            .db
            .restock_processor()
            .restock(
                &RestockRequest {
                    branch_id: f.branch.id.clone(),
                    product_id: f.coke.id.clone(),
                    quantity: 1,
                },
                &f.admin.id,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::ProductNotAtHq { .. })));
    }

    #[tokio::test]
    async fn test_bulk_aborts_on_first_failure() {
        let f = fixture().await;
        f.stock(&f.hq.id, &f.coke.id, 50).await;
        f.stock(&f.hq.id, &f.fanta.id, 5).await;

        let err = f
            .db
            .restock_processor()
            .bulk_restock(
                &BulkRestockRequest {
                    branch_id: f.branch.id.clone(),
                    items: vec![
                        RestockItem {
                            product_id: f.coke.id.clone(),
                            quantity: 20,
                        },
                        RestockItem {
                            product_id: f.fanta.id.clone(),
                            quantity: 6,
                        },
                    ],
                },
                &f.admin.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientHqStock { .. })
        ));

        let hq_coke = f.db.stock().get(&f.hq.id, &f.coke.id).await.unwrap().unwrap();
        assert_eq!(hq_coke.quantity, 50);
        assert!(f.db.stock().get(&f.branch.id, &f.coke.id).await.unwrap().is_none());
        assert!(f
            .db
            .restocks()
            .history(&RestockHistoryFilter::default())
            .await
            .unwrap()
            .is_empty());
    }
}
