//! # Stock Repository
//!
//! Read views over `stock_entries` and the audited admin adjustment. All
//! quantity arithmetic goes through [`StockLedger`].

use retail_core::validation::{validate_required, validate_stock_level};
use retail_core::{InventoryAdjustment, StockEntry, StockView};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::ledger::StockLedger;
use crate::pool::begin_write;
use crate::repository::{branch, product};

const VIEW_SELECT: &str = r#"
    SELECT
        s.branch_id,
        b.name AS branch_name,
        s.product_id,
        p.name AS product_name,
        p.brand,
        p.price_cents,
        s.quantity,
        s.last_restocked
    FROM stock_entries s
    JOIN branches b ON b.id = s.branch_id
    JOIN products p ON p.id = s.product_id
"#;

/// Body of `PUT /stock/adjust`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub branch_id: String,
    pub product_id: String,
    /// New absolute quantity.
    pub quantity: i64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    pub async fn get(&self, branch_id: &str, product_id: &str) -> DbResult<Option<StockEntry>> {
        let entry = sqlx::query_as::<_, StockEntry>(
            r#"
            SELECT branch_id, product_id, quantity, last_restocked, updated_at
            FROM stock_entries
            WHERE branch_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(branch_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Every stock row of a branch, joined with product data.
    pub async fn branch_inventory(&self, branch_id: &str) -> DbResult<Vec<StockView>> {
        let rows = sqlx::query_as::<_, StockView>(&format!(
            "{} WHERE s.branch_id = ?1 ORDER BY p.brand, p.name",
            VIEW_SELECT
        ))
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Stock of one product across all branches.
    pub async fn product_stock(&self, product_id: &str) -> DbResult<Vec<StockView>> {
        let rows = sqlx::query_as::<_, StockView>(&format!(
            "{} WHERE s.product_id = ?1 ORDER BY b.is_headquarters DESC, b.name",
            VIEW_SELECT
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sets a stock level and records who did it and why.
    pub async fn adjust(
        &self,
        input: &StockAdjustment,
        adjusted_by: &str,
    ) -> DbResult<InventoryAdjustment> {
        validate_stock_level(input.quantity)?;
        validate_required("reason", &input.reason)?;

        let mut tx = begin_write(&self.pool).await?;

        branch::require_in(&mut tx, &input.branch_id).await?;
        product::require_in(&mut tx, &input.product_id).await?;

        let adjustment = StockLedger::set(
            &mut tx,
            &input.branch_id,
            &input.product_id,
            input.quantity,
            input.reason.trim(),
            adjusted_by,
        )
        .await?;

        tx.commit().await?;

        info!(
            branch_id = %adjustment.branch_id,
            product_id = %adjustment.product_id,
            previous = adjustment.previous_quantity,
            new = adjustment.new_quantity,
            adjusted_by = %adjusted_by,
            "Stock adjusted by admin"
        );

        Ok(adjustment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::testing::fixture;
    use retail_core::CoreError;

    #[tokio::test]
    async fn test_adjust_creates_row_and_views_show_it() {
        let f = fixture().await;

        let adj = f
            .db
            .stock()
            .adjust(
                &StockAdjustment {
                    branch_id: f.branch.id.clone(),
                    product_id: f.coke.id.clone(),
                    quantity: 24,
                    reason: "Opening count".to_string(),
                },
                &f.admin.id,
            )
            .await
            .unwrap();
        assert_eq!(adj.previous_quantity, 0);
        assert_eq!(adj.new_quantity, 24);

        let inventory = f.db.stock().branch_inventory(&f.branch.id).await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].product_name, f.coke.name);
        assert_eq!(inventory[0].quantity, 24);

        let across = f.db.stock().product_stock(&f.coke.id).await.unwrap();
        assert_eq!(across.len(), 1);
        assert_eq!(across[0].branch_name, f.branch.name);
    }

    #[tokio::test]
    async fn test_adjust_unknown_branch_is_not_found() {
        let f = fixture().await;

        let err = f
            .db
            .stock()
            .adjust(
                &StockAdjustment {
                    branch_id: "missing".to_string(),
                    product_id: f.coke.id.clone(),
                    quantity: 1,
                    reason: "x".to_string(),
                },
                &f.admin.id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NotFound { .. })));
    }
}
