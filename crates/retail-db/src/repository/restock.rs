//! # Restock Repository
//!
//! Read side of HQ→branch transfers: the audit log, the HQ overview and
//! top-up suggestions. Transfers themselves are written by
//! [`RestockProcessor`](crate::processor::restock::RestockProcessor).

use chrono::{DateTime, Utc};
use retail_core::report::{suggested_restock, HqStockOverview, RestockSuggestion};
use retail_core::{CoreError, RestockLog, StockView, HQ_LOW_STOCK_THRESHOLD};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::error::DbResult;
use crate::repository::branch;

/// Filters of `GET /restock/history`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockHistoryFilter {
    pub branch_id: Option<String>,
    pub product_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RestockRepository {
    pool: SqlitePool,
}

impl RestockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RestockRepository { pool }
    }

    /// Transfer log, newest first. `limit` defaults to 100 and is capped at 1000.
    pub async fn history(&self, filter: &RestockHistoryFilter) -> DbResult<Vec<RestockLog>> {
        let limit = filter.limit.unwrap_or(100).clamp(1, 1000);

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT id, branch_id, product_id, quantity_added, previous_quantity,
                   new_quantity, restocked_by, created_at
            FROM restock_logs
            WHERE 1 = 1
            "#,
        );

        if let Some(branch_id) = &filter.branch_id {
            qb.push(" AND branch_id = ").push_bind(branch_id.clone());
        }
        if let Some(product_id) = &filter.product_id {
            qb.push(" AND product_id = ").push_bind(product_id.clone());
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

        let logs = qb
            .build_query_as::<RestockLog>()
            .fetch_all(&self.pool)
            .await?;

        Ok(logs)
    }

    /// HQ inventory with its total value and count of rows under 50.
    pub async fn hq_overview(&self) -> DbResult<HqStockOverview> {
        let mut conn = self.pool.acquire().await?;
        let hq = branch::headquarters_in(&mut conn)
            .await?
            .ok_or(CoreError::NoHeadquarters)?;

        let items = sqlx::query_as::<_, StockView>(
            r#"
            SELECT s.branch_id, b.name AS branch_name, s.product_id, p.name AS product_name,
                   p.brand, p.price_cents, s.quantity, s.last_restocked
            FROM stock_entries s
            JOIN branches b ON b.id = s.branch_id
            JOIN products p ON p.id = s.product_id
            WHERE s.branch_id = ?1
            ORDER BY p.brand, p.name
            "#,
        )
        .bind(&hq.id)
        .fetch_all(&mut *conn)
        .await?;

        let total_value_cents: i64 = items.iter().map(|i| i.quantity * i.price_cents).sum();
        let low_stock_count = items
            .iter()
            .filter(|i| i.quantity < HQ_LOW_STOCK_THRESHOLD)
            .count() as i64;

        Ok(HqStockOverview {
            branch_id: hq.id,
            branch_name: hq.name,
            items,
            total_value_cents,
            low_stock_count,
        })
    }

    /// Non-HQ rows under `threshold`, with a top-up quantity capped by HQ stock.
    pub async fn suggestions(&self, threshold: i64) -> DbResult<Vec<RestockSuggestion>> {
        let mut conn = self.pool.acquire().await?;
        let hq = branch::headquarters_in(&mut conn)
            .await?
            .ok_or(CoreError::NoHeadquarters)?;

        let rows = sqlx::query_as::<_, RestockSuggestion>(
            r#"
            SELECT s.branch_id, b.name AS branch_name, s.product_id, p.name AS product_name,
                   p.brand, s.quantity AS current_stock,
                   COALESCE(h.quantity, 0) AS hq_available
            FROM stock_entries s
            JOIN branches b ON b.id = s.branch_id
            JOIN products p ON p.id = s.product_id
            LEFT JOIN stock_entries h ON h.product_id = s.product_id AND h.branch_id = ?1
            WHERE s.branch_id != ?1 AND s.quantity < ?2
            ORDER BY s.quantity, b.name, p.name
            "#,
        )
        .bind(&hq.id)
        .bind(threshold)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.suggested_quantity =
                    suggested_restock(threshold, row.current_stock, row.hq_available);
                row
            })
            .collect())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn insert_log_in(conn: &mut SqliteConnection, log: &RestockLog) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO restock_logs (
            id, branch_id, product_id, quantity_added, previous_quantity,
            new_quantity, restocked_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&log.id)
    .bind(&log.branch_id)
    .bind(&log.product_id)
    .bind(log.quantity_added)
    .bind(log.previous_quantity)
    .bind(log.new_quantity)
    .bind(&log.restocked_by)
    .bind(log.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;

    #[tokio::test]
    async fn test_hq_overview_values_stock() {
        let f = fixture().await;
        f.stock(&f.hq.id, &f.coke.id, 100).await;
        f.stock(&f.hq.id, &f.fanta.id, 20).await;

        let overview = f.db.restocks().hq_overview().await.unwrap();
        assert_eq!(overview.branch_id, f.hq.id);
        assert_eq!(overview.items.len(), 2);
        assert_eq!(
            overview.total_value_cents,
            100 * f.coke.price_cents + 20 * f.fanta.price_cents
        );
        assert_eq!(overview.low_stock_count, 1);
    }

    #[tokio::test]
    async fn test_suggestions_are_capped_by_hq() {
        let f = fixture().await;
        f.stock(&f.hq.id, &f.coke.id, 5).await;
        f.stock(&f.branch.id, &f.coke.id, 2).await;
        f.stock(&f.branch.id, &f.fanta.id, 30).await;

        let suggestions = f.db.restocks().suggestions(10).await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].product_id, f.coke.id);
        assert_eq!(suggestions[0].current_stock, 2);
        assert_eq!(suggestions[0].hq_available, 5);
        assert_eq!(suggestions[0].suggested_quantity, 5);
    }
}
