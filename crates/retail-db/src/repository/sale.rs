//! # Sale Repository
//!
//! Read side of sales and the row writers the processors call inside their
//! transactions.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (SaleProcessor / SyncProcessor, one transaction)            │
//! │     └── stock taken, header + items inserted                           │
//! │         status: pending, or paid/failed from offline payment info      │
//! │                                                                         │
//! │  2. SETTLE (admin status update or sync resolve)                       │
//! │     └── pending → paid | failed | cancelled                            │
//! │     └── cancelled / deleted restores stock                             │
//! │                                                                         │
//! │  3. TERMINAL                                                           │
//! │     └── no further transitions                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use retail_core::{Sale, SaleItem, SaleStatus, SaleWithItems};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const SALE_COLUMNS: &str = r#"
    id, branch_id, user_id, total_cents, status, payment_ref, payment_method,
    client_txn_id, client_id, created_at, updated_at, synced_at
"#;

const ITEM_COLUMNS: &str =
    "id, sale_id, product_id, quantity, unit_price_cents, line_total_cents, created_at";

/// Sync history of one client device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSyncStatus {
    pub client_id: String,
    pub total_synced: i64,
    pub pending: i64,
    pub paid: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    /// A sale with its line items.
    pub async fn get_with_items(&self, id: &str) -> DbResult<Option<SaleWithItems>> {
        let mut conn = self.pool.acquire().await?;
        let Some(sale) = get_in(&mut conn, id).await? else {
            return Ok(None);
        };
        let items = items_in(&mut conn, id).await?;
        Ok(Some(SaleWithItems { sale, items }))
    }

    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let mut conn = self.pool.acquire().await?;
        items_in(&mut conn, sale_id).await
    }

    /// Newest first.
    pub async fn list(&self, limit: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales ORDER BY created_at DESC LIMIT ?1",
            SALE_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    pub async fn list_by_user(&self, user_id: &str, limit: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            SALE_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Newest first. `owner` restricts to one user's sales before the limit
    /// is applied, so a customer's page is never short.
    pub async fn list_by_branch(
        &self,
        branch_id: &str,
        owner: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE branch_id = ?1 AND (?2 IS NULL OR user_id = ?2) \
             ORDER BY created_at DESC LIMIT ?3",
            SALE_COLUMNS
        ))
        .bind(branch_id)
        .bind(owner)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Same owner rule as [`Self::list_by_branch`].
    pub async fn list_by_status(
        &self,
        status: SaleStatus,
        owner: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE status = ?1 AND (?2 IS NULL OR user_id = ?2) \
             ORDER BY created_at DESC LIMIT ?3",
            SALE_COLUMNS
        ))
        .bind(status)
        .bind(owner)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    pub async fn find_by_client_txn_id(&self, client_txn_id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        find_by_client_txn_id_in(&mut conn, client_txn_id).await
    }

    /// Offline sales that were synced but are still pending.
    pub async fn pending_synced(&self) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {} FROM sales
            WHERE client_txn_id IS NOT NULL AND status = 'pending'
            ORDER BY created_at
            "#,
            SALE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Per-status counts of a client's synced sales.
    pub async fn client_sync_status(&self, client_id: &str) -> DbResult<ClientSyncStatus> {
        let (total, pending, paid, failed, cancelled, last): (
            i64,
            i64,
            i64,
            i64,
            i64,
            Option<DateTime<Utc>>,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'paid' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END), 0),
                MAX(synced_at)
            FROM sales
            WHERE client_id = ?1 AND client_txn_id IS NOT NULL
            "#,
        )
        .bind(client_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ClientSyncStatus {
            client_id: client_id.to_string(),
            total_synced: total,
            pending,
            paid,
            failed,
            cancelled,
            last_synced_at: last,
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>(&format!(
        "SELECT {} FROM sales WHERE id = ?1",
        SALE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(sale)
}

pub(crate) async fn find_by_client_txn_id_in(
    conn: &mut SqliteConnection,
    client_txn_id: &str,
) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>(&format!(
        "SELECT {} FROM sales WHERE client_txn_id = ?1",
        SALE_COLUMNS
    ))
    .bind(client_txn_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(sale)
}

pub(crate) async fn items_in(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(&format!(
        "SELECT {} FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, id",
        ITEM_COLUMNS
    ))
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

pub(crate) async fn insert_in(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, branch_id = %sale.branch_id, total_cents = sale.total_cents, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, branch_id, user_id, total_cents, status, payment_ref, payment_method,
            client_txn_id, client_id, created_at, updated_at, synced_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.branch_id)
    .bind(&sale.user_id)
    .bind(sale.total_cents)
    .bind(sale.status)
    .bind(&sale.payment_ref)
    .bind(&sale.payment_method)
    .bind(&sale.client_txn_id)
    .bind(&sale.client_id)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .bind(sale.synced_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_item_in(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, quantity, unit_price_cents, line_total_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Moves a sale out of `pending`. Returns false when it was no longer pending.
pub(crate) async fn settle_in(
    conn: &mut SqliteConnection,
    id: &str,
    next: SaleStatus,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE sales SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = 'pending'",
    )
    .bind(id)
    .bind(next)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM sales WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
