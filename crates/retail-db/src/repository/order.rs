//! # Order Repository
//!
//! Online orders and their items. Orders are written by
//! [`SaleProcessor::create_order`](crate::processor::sale::SaleProcessor::create_order)
//! and settled by the payment reconciler or an admin.

use chrono::{DateTime, Utc};
use retail_core::{Order, OrderItem, OrderStatus, OrderWithItems, PaymentStatus};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const ORDER_COLUMNS: &str = r#"
    id, user_id, branch_id, total_cents, payment_status, payment_method,
    mpesa_transaction_id, order_status, phone, created_at, updated_at, completed_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, order_id, product_id, product_brand, quantity, unit_price_cents,
    line_total_cents, created_at
"#;

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    pub async fn get_with_items(&self, id: &str) -> DbResult<Option<OrderWithItems>> {
        let mut conn = self.pool.acquire().await?;
        let Some(order) = get_in(&mut conn, id).await? else {
            return Ok(None);
        };
        let items = items_in(&mut conn, id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// A user's orders, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE id = ?1",
        ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

pub(crate) async fn items_in(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY created_at, id",
        ITEM_COLUMNS
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

pub(crate) async fn insert_in(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, branch_id = %order.branch_id, total_cents = order.total_cents, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, branch_id, total_cents, payment_status, payment_method,
            mpesa_transaction_id, order_status, phone, created_at, updated_at, completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(&order.branch_id)
    .bind(order.total_cents)
    .bind(order.payment_status)
    .bind(order.payment_method)
    .bind(&order.mpesa_transaction_id)
    .bind(order.order_status)
    .bind(&order.phone)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.completed_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_item_in(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, product_brand, quantity, unit_price_cents,
            line_total_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.product_brand)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Moves an order out of `processing`, setting both status columns.
/// Returns false when the order was no longer processing.
pub(crate) async fn settle_in(
    conn: &mut SqliteConnection,
    id: &str,
    order_status: OrderStatus,
    payment_status: PaymentStatus,
    mpesa_transaction_id: Option<&str>,
    completed_at: Option<DateTime<Utc>>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            order_status = ?2,
            payment_status = ?3,
            mpesa_transaction_id = COALESCE(?4, mpesa_transaction_id),
            completed_at = COALESCE(?5, completed_at),
            updated_at = ?6
        WHERE id = ?1 AND order_status = 'processing'
        "#,
    )
    .bind(id)
    .bind(order_status)
    .bind(payment_status)
    .bind(mpesa_transaction_id)
    .bind(completed_at)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
