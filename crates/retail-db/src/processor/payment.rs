//! # Payment Reconciliation Processor
//!
//! Applies a gateway payment result to the payment and its order, at most
//! once per checkout token.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │                    ┌──────────── ResultCode = 0 ──► completed           │
//! │   pending ─────────┤                 order: completed / completed       │
//! │                    │                                                    │
//! │                    └──────────── ResultCode ≠ 0 ──► failed              │
//! │                                      order: cancelled / failed          │
//! │                                      stock released                     │
//! │                                                                         │
//! │   completed | failed ── any callback ──► no-op (AlreadyTerminal)       │
//! │   unknown token      ── any callback ──► no-op (UnknownToken)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The HTTP handler acknowledges the gateway whatever this returns; errors
//! are only logged there.

use chrono::Utc;
use retail_core::gateway::PaymentNotification;
use retail_core::{OrderStatus, PaymentStatus};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;
use crate::pool::begin_write;
use crate::processor::sale::cancel_order_stock;
use crate::repository::{order, payment};

/// What a notification did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Completed { order_id: String },
    Failed { order_id: String },
    /// No payment carries this checkout token.
    UnknownToken,
    /// The payment already reached a terminal status.
    AlreadyTerminal { order_id: String },
}

#[derive(Debug, Clone)]
pub struct PaymentReconciler {
    pool: SqlitePool,
}

impl PaymentReconciler {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentReconciler { pool }
    }

    pub async fn reconcile(&self, notification: &PaymentNotification) -> DbResult<ReconcileOutcome> {
        let mut tx = begin_write(&self.pool).await?;

        let Some(current) =
            payment::get_by_checkout_in(&mut tx, &notification.checkout_request_id).await?
        else {
            warn!(
                checkout_request_id = %notification.checkout_request_id,
                "Callback for unknown checkout token"
            );
            return Ok(ReconcileOutcome::UnknownToken);
        };

        let succeeded = notification.is_success();
        let receipt = notification.receipt_number.as_deref();

        let transitioned = payment::finish_in(
            &mut tx,
            &current.id,
            succeeded,
            if succeeded { receipt } else { None },
            Some(notification.raw.as_str()),
        )
        .await?;

        if !transitioned {
            warn!(
                checkout_request_id = %notification.checkout_request_id,
                order_id = %current.order_id,
                status = %current.status,
                "Replayed callback for terminal payment ignored"
            );
            return Ok(ReconcileOutcome::AlreadyTerminal {
                order_id: current.order_id,
            });
        }

        let outcome = if succeeded {
            order::settle_in(
                &mut tx,
                &current.order_id,
                OrderStatus::Completed,
                PaymentStatus::Completed,
                receipt,
                Some(Utc::now()),
            )
            .await?;
            ReconcileOutcome::Completed {
                order_id: current.order_id.clone(),
            }
        } else {
            let settled = order::settle_in(
                &mut tx,
                &current.order_id,
                OrderStatus::Cancelled,
                PaymentStatus::Failed,
                None,
                None,
            )
            .await?;
            if settled {
                if let Some(o) = order::get_in(&mut tx, &current.order_id).await? {
                    cancel_order_stock(&mut tx, &o).await?;
                }
            }
            ReconcileOutcome::Failed {
                order_id: current.order_id.clone(),
            }
        };

        tx.commit().await?;

        info!(
            checkout_request_id = %notification.checkout_request_id,
            order_id = %current.order_id,
            result_code = notification.result_code,
            succeeded,
            "Payment reconciled"
        );

        Ok(outcome)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
