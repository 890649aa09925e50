//! # Sale / Order Processor
//!
//! The online path of the ledger: in-store sales and customer orders are
//! priced from the live catalog and take stock in the same transaction that
//! writes the header and its items.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    branch exists?                          no  → NotFound               │
//! │    for each line:                                                       │
//! │      product exists?                       no  → NotFound               │
//! │      UPDATE stock ... WHERE qty >= n       0 rows → InsufficientStock   │
//! │      price = product.price_cents (snapshot)                             │
//! │    total = Σ price × qty                                                │
//! │    INSERT header (pending / processing)                                 │
//! │    INSERT items                                                         │
//! │    [order] INSERT payment (pending)                                     │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error drops the transaction before commit, so a failing second line
//! leaves the first line's stock untouched.

use chrono::Utc;
use retail_core::ledger::{sum_lines, verify_total, LineRequest, PricedLine};
use retail_core::validation::normalize_phone;
use retail_core::{
    CoreError, Money, Order, OrderItem, OrderStatus, OrderWithItems, Payment, PaymentMethod,
    PaymentStatus, Sale, SaleItem, SaleStatus, SaleWithItems,
};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::processor::{apply_lines, release_items};
use crate::repository::{branch, order, payment, sale};

// =============================================================================
// Requests
// =============================================================================

/// One requested line of an online sale or order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Body of `POST /branches/{id}/sales`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequest {
    pub items: Vec<SaleLine>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_ref: Option<String>,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub branch_id: String,
    pub phone: String,
    pub items: Vec<SaleLine>,
    /// Client-computed total; checked against the server total when present.
    #[serde(default)]
    pub total_cents: Option<i64>,
}

/// A created order together with its pending payment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    #[serde(flatten)]
    pub order: OrderWithItems,
    pub payment: Payment,
}

fn live_lines(items: &[SaleLine]) -> Vec<LineRequest> {
    items
        .iter()
        .map(|l| LineRequest::live(l.product_id.clone(), l.quantity))
        .collect()
}

// =============================================================================
// Processor
// =============================================================================

#[derive(Debug, Clone)]
pub struct SaleProcessor {
    pool: SqlitePool,
}

impl SaleProcessor {
    pub fn new(pool: SqlitePool) -> Self {
        SaleProcessor { pool }
    }

    /// Records an in-store sale at `branch_id` with status `pending`.
    pub async fn create_sale(
        &self,
        branch_id: &str,
        user_id: &str,
        request: &SaleRequest,
    ) -> DbResult<SaleWithItems> {
        let mut tx = begin_write(&self.pool).await?;

        branch::require_in(&mut tx, branch_id).await?;
        let lines = apply_lines(&mut tx, branch_id, &live_lines(&request.items)).await?;
        let total = sum_lines(&lines)?;

        let now = Utc::now();
        let header = Sale {
            id: Uuid::new_v4().to_string(),
            branch_id: branch_id.to_string(),
            user_id: user_id.to_string(),
            total_cents: total.cents(),
            status: SaleStatus::Pending,
            payment_ref: request.payment_ref.clone(),
            payment_method: request.payment_method.clone(),
            client_txn_id: None,
            client_id: None,
            created_at: now,
            updated_at: now,
            synced_at: None,
        };
        let created = write_sale(&mut tx, header, &lines).await?;

        tx.commit().await?;

        info!(
            sale_id = %created.sale.id,
            branch_id = %branch_id,
            total_cents = created.sale.total_cents,
            items = created.items.len(),
            "Sale created"
        );

        Ok(created)
    }

    /// Places an M-Pesa order: stock taken, order `processing`, payment
    /// `pending` for the full total.
    pub async fn create_order(&self, user_id: &str, request: &OrderRequest) -> DbResult<PlacedOrder> {
        let phone = normalize_phone(&request.phone)?;

        let mut tx = begin_write(&self.pool).await?;

        branch::require_in(&mut tx, &request.branch_id).await?;
        let lines = apply_lines(&mut tx, &request.branch_id, &live_lines(&request.items)).await?;
        let total = sum_lines(&lines)?;
        if let Some(reported) = request.total_cents {
            verify_total(Money::from_cents(reported), total)?;
        }

        let now = Utc::now();
        let header = Order {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            branch_id: request.branch_id.clone(),
            total_cents: total.cents(),
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Mpesa,
            mpesa_transaction_id: None,
            order_status: OrderStatus::Processing,
            phone: phone.clone(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        order::insert_in(&mut tx, &header).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: header.id.clone(),
                product_id: line.product_id.clone(),
                product_brand: line.brand.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                line_total_cents: line.line_total.cents(),
                created_at: now,
            };
            order::insert_item_in(&mut tx, &item).await?;
            items.push(item);
        }

        let pending = Payment {
            id: Uuid::new_v4().to_string(),
            order_id: header.id.clone(),
            phone,
            amount_cents: total.cents(),
            status: PaymentStatus::Pending,
            transaction_id: None,
            checkout_request_id: None,
            gateway_response: None,
            created_at: now,
            updated_at: now,
        };
        payment::insert_in(&mut tx, &pending).await?;

        tx.commit().await?;

        info!(
            order_id = %header.id,
            branch_id = %header.branch_id,
            total_cents = header.total_cents,
            "Order placed"
        );

        Ok(PlacedOrder {
            order: OrderWithItems { order: header, items },
            payment: pending,
        })
    }

    /// Admin status change of a sale. Only `pending` sales move; cancelling
    /// puts the stock back.
    pub async fn update_sale_status(&self, id: &str, next: SaleStatus) -> DbResult<Sale> {
        let mut tx = begin_write(&self.pool).await?;

        let current = sale::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", id))?;
        check_sale_transition(&current, next)?;

        if !sale::settle_in(&mut tx, id, next).await? {
            return Err(CoreError::Conflict(format!("Sale {} is no longer pending", id)).into());
        }

        if next == SaleStatus::Cancelled {
            let returned: Vec<(String, i64)> = sale::items_in(&mut tx, id)
                .await?
                .into_iter()
                .map(|i| (i.product_id, i.quantity))
                .collect();
            release_items(
                &mut tx,
                &current.branch_id,
                &returned,
            )
            .await?;
        }

        let updated = sale::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;
        tx.commit().await?;

        info!(sale_id = %id, from = %current.status, to = %next, "Sale status updated");
        Ok(updated)
    }

    /// Admin status change of an order.
    ///
    /// Completing marks payment completed and stamps `completed_at`;
    /// cancelling releases the stock and fails a still-pending payment.
    pub async fn update_order_status(&self, id: &str, next: OrderStatus) -> DbResult<Order> {
        let mut tx = begin_write(&self.pool).await?;

        let current = order::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", id))?;
        if current.order_status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Order is already {}",
                current.order_status
            ))
            .into());
        }
        if !current.order_status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                entity: "Order".to_string(),
                from: current.order_status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        let succeeded = next == OrderStatus::Completed;
        let (payment_status, completed_at) = if succeeded {
            (PaymentStatus::Completed, Some(Utc::now()))
        } else {
            (PaymentStatus::Failed, None)
        };

        if !order::settle_in(&mut tx, id, next, payment_status, None, completed_at).await? {
            return Err(CoreError::Conflict(format!("Order {} is no longer processing", id)).into());
        }

        if let Some(p) = payment::get_by_order_in(&mut tx, id).await? {
            payment::finish_in(&mut tx, &p.id, succeeded, None, None).await?;
        }

        if next == OrderStatus::Cancelled {
            cancel_order_stock(&mut tx, &current).await?;
        }

        let updated = order::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;
        tx.commit().await?;

        info!(order_id = %id, from = %current.order_status, to = %next, "Order status updated");
        Ok(updated)
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Terminal sales are a Conflict; `pending → pending` is an invalid move.
pub(crate) fn check_sale_transition(current: &Sale, next: SaleStatus) -> DbResult<()> {
    if current.status.is_terminal() {
        return Err(CoreError::Conflict(format!("Sale is already {}", current.status)).into());
    }
    if !current.status.can_transition_to(next) {
        return Err(CoreError::InvalidStatusTransition {
            entity: "Sale".to_string(),
            from: current.status.to_string(),
            to: next.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Inserts a sale header and one item per priced line.
pub(crate) async fn write_sale(
    conn: &mut SqliteConnection,
    header: Sale,
    lines: &[PricedLine],
) -> DbResult<SaleWithItems> {
    sale::insert_in(conn, &header).await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: header.id.clone(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            line_total_cents: line.line_total.cents(),
            created_at: header.created_at,
        };
        sale::insert_item_in(conn, &item).await?;
        items.push(item);
    }

    Ok(SaleWithItems { sale: header, items })
}

/// Returns an order's items to its branch.
pub(crate) async fn cancel_order_stock(conn: &mut SqliteConnection, o: &Order) -> DbResult<()> {
    let returned: Vec<(String, i64)> = order::items_in(conn, &o.id)
        .await?
        .into_iter()
        .map(|i| (i.product_id, i.quantity))
        .collect();
    release_items(
        conn,
        &o.branch_id,
        &returned,
    )
    .await
}

// =============================================================================
// Unit Tests
// =============================================================================
