//! # Stock Ledger
//!
//! The keyed store `(branch_id, product_id) → quantity` shared by every
//! processor.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get(branch, product)             → Option<quantity>                    │
//! │  ensure_exists(branch, product)   → creates a 0-quantity row if absent │
//! │  adjust(branch, product, delta)   → new quantity                        │
//! │       fails InsufficientStock when quantity + delta < 0                 │
//! │       fails NotFound when the row does not exist                        │
//! │  set(branch, product, qty, ...)   → audited absolute correction         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call takes the caller's connection, normally `&mut *tx`. The ledger
//! never opens or commits a transaction of its own.
//!
//! ## Why `adjust` is one statement
//! ```text
//! UPDATE stock_entries
//!    SET quantity = quantity + delta
//!  WHERE branch_id = ? AND product_id = ?
//!    AND quantity + delta >= 0          ◄── check and write are atomic
//! RETURNING quantity
//! ```
//! The guard lives in the WHERE clause, so two concurrent sales cannot both
//! read "5 left" and both take 5. The loser's UPDATE matches zero rows and
//! reports the shortfall. The `CHECK (quantity >= 0)` column constraint is
//! the last line behind it.

use chrono::Utc;
use retail_core::{CoreError, InventoryAdjustment};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

/// Stateless accessor for `stock_entries`.
pub struct StockLedger;

impl StockLedger {
    /// Current quantity, or `None` when the row does not exist.
    pub async fn get(
        conn: &mut SqliteConnection,
        branch_id: &str,
        product_id: &str,
    ) -> DbResult<Option<i64>> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM stock_entries WHERE branch_id = ?1 AND product_id = ?2",
        )
        .bind(branch_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(quantity)
    }

    /// Creates a zero-quantity row if none exists.
    pub async fn ensure_exists(
        conn: &mut SqliteConnection,
        branch_id: &str,
        product_id: &str,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO stock_entries (branch_id, product_id, quantity, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?3)
            "#,
        )
        .bind(branch_id)
        .bind(product_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Adds `delta` (negative to take stock) and returns the new quantity.
    ///
    /// A positive delta also stamps `last_restocked`.
    pub async fn adjust(
        conn: &mut SqliteConnection,
        branch_id: &str,
        product_id: &str,
        delta: i64,
    ) -> DbResult<i64> {
        let now = Utc::now();

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE stock_entries SET
                quantity = quantity + ?1,
                updated_at = ?2,
                last_restocked = CASE WHEN ?1 > 0 THEN ?2 ELSE last_restocked END
            WHERE branch_id = ?3 AND product_id = ?4 AND quantity + ?1 >= 0
            RETURNING quantity
            "#,
        )
        .bind(delta)
        .bind(now)
        .bind(branch_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(quantity) = updated {
            debug!(branch_id = %branch_id, product_id = %product_id, delta, quantity, "Stock adjusted");
            return Ok(quantity);
        }

        // Zero rows matched: either the row is missing or the guard failed.
        match Self::get(conn, branch_id, product_id).await? {
            None => Err(CoreError::not_found(
                "Stock entry",
                format!("{}/{}", branch_id, product_id),
            )
            .into()),
            Some(available) => Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                available,
                requested: -delta,
            }
            .into()),
        }
    }

    /// Sets an absolute quantity (creating the row if needed) and writes an
    /// `inventory_adjustments` row in the caller's transaction.
    pub async fn set(
        conn: &mut SqliteConnection,
        branch_id: &str,
        product_id: &str,
        quantity: i64,
        reason: &str,
        adjusted_by: &str,
    ) -> DbResult<InventoryAdjustment> {
        Self::ensure_exists(conn, branch_id, product_id).await?;
        let previous = Self::get(conn, branch_id, product_id).await?.unwrap_or(0);
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE stock_entries SET
                quantity = ?1,
                updated_at = ?2,
                last_restocked = CASE WHEN ?1 > ?3 THEN ?2 ELSE last_restocked END
            WHERE branch_id = ?4 AND product_id = ?5
            "#,
        )
        .bind(quantity)
        .bind(now)
        .bind(previous)
        .bind(branch_id)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

        let adjustment = InventoryAdjustment {
            id: Uuid::new_v4().to_string(),
            branch_id: branch_id.to_string(),
            product_id: product_id.to_string(),
            previous_quantity: previous,
            new_quantity: quantity,
            reason: reason.to_string(),
            adjusted_by: adjusted_by.to_string(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO inventory_adjustments (
                id, branch_id, product_id, previous_quantity, new_quantity,
                reason, adjusted_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.branch_id)
        .bind(&adjustment.product_id)
        .bind(adjustment.previous_quantity)
        .bind(adjustment.new_quantity)
        .bind(&adjustment.reason)
        .bind(&adjustment.adjusted_by)
        .bind(adjustment.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(
            branch_id = %branch_id,
            product_id = %product_id,
            previous,
            quantity,
            "Stock set by adjustment"
        );

        Ok(adjustment)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::testing::{fixture, Fixture};

    #[tokio::test]
    async fn test_adjust_rejects_oversell_and_keeps_quantity() {
        let Fixture { db, branch, coke, .. } = fixture().await;
        let mut tx = db.pool().begin().await.unwrap();

        StockLedger::set(&mut *tx, &branch.id, &coke.id, 5, "count", "tester")
            .await
            .unwrap();

        let err = StockLedger::adjust(&mut *tx, &branch.id, &coke.id, -6)
            .await
            .unwrap_err();
        match err {
            DbError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let quantity = StockLedger::get(&mut *tx, &branch.id, &coke.id).await.unwrap();
        assert_eq!(quantity, Some(5));

        assert_eq!(
            StockLedger::adjust(&mut *tx, &branch.id, &coke.id, -5).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_adjust_missing_row_is_not_found() {
        let Fixture { db, branch, coke, .. } = fixture().await;
        let mut tx = db.pool().begin().await.unwrap();

        let err = StockLedger::adjust(&mut *tx, &branch.id, &coke.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NotFound { .. })));

        StockLedger::ensure_exists(&mut *tx, &branch.id, &coke.id)
            .await
            .unwrap();
        StockLedger::ensure_exists(&mut *tx, &branch.id, &coke.id)
            .await
            .unwrap();
        assert_eq!(
            StockLedger::adjust(&mut *tx, &branch.id, &coke.id, 4).await.unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn test_set_writes_adjustment_row() {
        let Fixture { db, branch, coke, .. } = fixture().await;
        let mut tx = db.pool().begin().await.unwrap();

        let first = StockLedger::set(&mut *tx, &branch.id, &coke.id, 12, "delivery", "tester")
            .await
            .unwrap();
        assert_eq!(first.previous_quantity, 0);
        assert_eq!(first.new_quantity, 12);

        let second = StockLedger::set(&mut *tx, &branch.id, &coke.id, 7, "shrinkage", "tester")
            .await
            .unwrap();
        assert_eq!(second.previous_quantity, 12);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_adjustments")
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }
}
