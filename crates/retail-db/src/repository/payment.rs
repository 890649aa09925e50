//! # Payment Repository
//!
//! One payment row per order. The row is created `pending` with the order;
//! initiating the STK push attaches the gateway checkout token, which the
//! callback later uses to find the row again.
//!
//! ```text
//! create_order ──► payments(status=pending, checkout=NULL)
//!                        │
//! STK push ok  ──► attach_checkout(order, "ws_CO_...")
//!                        │
//! callback     ──► PaymentReconciler (by checkout token)
//! ```

use chrono::Utc;
use retail_core::{CoreError, Payment};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};

const PAYMENT_COLUMNS: &str = r#"
    id, order_id, phone, amount_cents, status, transaction_id,
    checkout_request_id, gateway_response, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE order_id = ?1",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Records the gateway checkout token of a pending payment.
    ///
    /// The phone used for the push replaces the one captured at order time.
    pub async fn attach_checkout(
        &self,
        order_id: &str,
        phone: &str,
        checkout_request_id: &str,
    ) -> DbResult<Payment> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                checkout_request_id = ?2,
                transaction_id = ?3,
                phone = ?4,
                updated_at = ?5
            WHERE order_id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(checkout_request_id)
        .bind(format!("MPESA_{}", checkout_request_id))
        .bind(phone)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_by_order(order_id).await? {
                None => Err(DbError::not_found("Payment", order_id)),
                Some(p) => Err(CoreError::Conflict(format!("Payment is already {}", p.status)).into()),
            };
        }

        info!(order_id = %order_id, checkout_request_id = %checkout_request_id, "Checkout token attached");

        self.get_by_order(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", order_id))
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn insert_in(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, order_id, phone, amount_cents, status, transaction_id,
            checkout_request_id, gateway_response, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.order_id)
    .bind(&payment.phone)
    .bind(payment.amount_cents)
    .bind(payment.status)
    .bind(&payment.transaction_id)
    .bind(&payment.checkout_request_id)
    .bind(&payment.gateway_response)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn get_by_checkout_in(
    conn: &mut SqliteConnection,
    checkout_request_id: &str,
) -> DbResult<Option<Payment>> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {} FROM payments WHERE checkout_request_id = ?1",
        PAYMENT_COLUMNS
    ))
    .bind(checkout_request_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(payment)
}

pub(crate) async fn get_by_order_in(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Option<Payment>> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {} FROM payments WHERE order_id = ?1",
        PAYMENT_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(payment)
}

/// Completes or fails a pending payment. Returns false when it was already
/// terminal, which makes a replayed callback a no-op.
pub(crate) async fn finish_in(
    conn: &mut SqliteConnection,
    id: &str,
    succeeded: bool,
    transaction_id: Option<&str>,
    gateway_response: Option<&str>,
) -> DbResult<bool> {
    let status = if succeeded { "completed" } else { "failed" };

    let result = sqlx::query(
        r#"
        UPDATE payments SET
            status = ?2,
            transaction_id = COALESCE(?3, transaction_id),
            gateway_response = COALESCE(?4, gateway_response),
            updated_at = ?5
        WHERE id = ?1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(transaction_id)
    .bind(gateway_response)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
