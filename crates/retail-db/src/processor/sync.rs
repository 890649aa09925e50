//! # Offline Sync Processor
//!
//! Replays sales recorded by point-of-sale clients while they were offline.
//! Every record gets its own transaction, so one bad record never rolls
//! back its neighbours.
//!
//! ## Per-Record Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record ──► clientTxnId already stored? ───────────── yes → duplicate  │
//! │               │ no                                                      │
//! │               ▼                                                         │
//! │             branch + items present? ───────────────── no  → failed     │
//! │               │                                                         │
//! │               ▼  BEGIN                                                  │
//! │             take stock at client prices ──── shortfall → insufficient  │
//! │               │                                          _stock         │
//! │               ▼                                                         │
//! │             Σ lines == totalCents? ─────────────────── no  → failed    │
//! │               │                                                         │
//! │               ▼                                                         │
//! │             status from paymentInfo.status                              │
//! │             INSERT sale + items                                         │
//! │               │  COMMIT                                                 │
//! │               ▼                                                         │
//! │             synced                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Offline records keep the price the client charged; the server only
//! checks that the reported total adds up.

use chrono::{DateTime, Utc};
use retail_core::ledger::{sale_status_from_payment_report, sum_lines, verify_total, LineRequest};
use retail_core::validation::{validate_price_cents, validate_required};
use retail_core::{
    CoreError, Money, Sale, SaleStatus, SyncStatus, ValidationError, MAX_SYNC_BATCH,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::processor::sale::{check_sale_transition, write_sale};
use crate::processor::{apply_lines, release_items};
use crate::repository::{branch, sale};

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /sync`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBatch {
    pub client_id: String,
    pub sales: Vec<OfflineSale>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSale {
    pub client_txn_id: String,
    #[serde(default)]
    pub branch_id: String,
    #[serde(default)]
    pub items: Vec<OfflineLine>,
    pub total_cents: i64,
    #[serde(default)]
    pub payment_info: Option<OfflinePaymentInfo>,
    /// Client clock at the time of sale.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflinePaymentInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Admin decision on a pending synced sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveAction {
    Approve,
    Reject,
    Delete,
}

/// Body of `POST /sync/resolve`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub sale_id: String,
    pub action: ResolveAction,
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub client_txn_id: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub total: usize,
    pub synced: usize,
    pub duplicate: usize,
    pub insufficient_stock: usize,
    pub failed: usize,
}

impl SyncSummary {
    fn count(&mut self, status: SyncStatus) {
        self.total += 1;
        match status {
            SyncStatus::Synced => self.synced += 1,
            SyncStatus::Duplicate => self.duplicate += 1,
            SyncStatus::InsufficientStock => self.insufficient_stock += 1,
            SyncStatus::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub client_id: String,
    pub results: Vec<SyncResult>,
    pub summary: SyncSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSale {
    pub sale_id: String,
    pub action: ResolveAction,
    /// `None` after a delete.
    pub sale: Option<Sale>,
}

impl SyncResult {
    fn new(client_txn_id: &str, status: SyncStatus) -> Self {
        SyncResult {
            client_txn_id: client_txn_id.to_string(),
            status,
            sale_id: None,
            message: None,
        }
    }

    fn with_sale(mut self, sale_id: impl Into<String>) -> Self {
        self.sale_id = Some(sale_id.into());
        self
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// =============================================================================
// Processor
// =============================================================================

#[derive(Debug, Clone)]
pub struct SyncProcessor {
    pool: SqlitePool,
}

impl SyncProcessor {
    pub fn new(pool: SqlitePool) -> Self {
        SyncProcessor { pool }
    }

    /// Replays a batch, one transaction per record. Only a malformed batch
    /// (no client id, empty, or too large) fails as a whole.
    pub async fn sync_batch(&self, batch: &SyncBatch, user_id: &str) -> DbResult<SyncReport> {
        validate_required("clientId", &batch.client_id)?;
        if batch.sales.is_empty() || batch.sales.len() > MAX_SYNC_BATCH {
            return Err(ValidationError::OutOfRange {
                field: "sales".to_string(),
                min: 1,
                max: MAX_SYNC_BATCH as i64,
            }
            .into());
        }

        let mut results = Vec::with_capacity(batch.sales.len());
        let mut summary = SyncSummary::default();

        for record in &batch.sales {
            let result = self.sync_one(&batch.client_id, user_id, record).await;
            summary.count(result.status);
            results.push(result);
        }

        info!(
            client_id = %batch.client_id,
            total = summary.total,
            synced = summary.synced,
            duplicate = summary.duplicate,
            insufficient_stock = summary.insufficient_stock,
            failed = summary.failed,
            "Offline batch synced"
        );

        Ok(SyncReport {
            client_id: batch.client_id.clone(),
            results,
            summary,
        })
    }

    async fn sync_one(&self, client_id: &str, user_id: &str, record: &OfflineSale) -> SyncResult {
        let txn_id = record.client_txn_id.as_str();

        if txn_id.trim().is_empty() {
            return SyncResult::new(txn_id, SyncStatus::Failed).with_message("clientTxnId is required");
        }

        match self.replay(client_id, user_id, record).await {
            Ok(sale_id) => SyncResult::new(txn_id, SyncStatus::Synced).with_sale(sale_id),
            Err(err) => classify(txn_id, err),
        }
    }

    async fn replay(&self, client_id: &str, user_id: &str, record: &OfflineSale) -> DbResult<String> {
        let mut tx = begin_write(&self.pool).await?;

        if let Some(existing) = sale::find_by_client_txn_id_in(&mut tx, &record.client_txn_id).await? {
            return Err(DbError::duplicate("sales.client_txn_id", existing.id));
        }

        validate_required("branchId", &record.branch_id)?;
        if record.items.is_empty() {
            return Err(ValidationError::required("items").into());
        }

        let mut lines = Vec::with_capacity(record.items.len());
        for item in &record.items {
            validate_price_cents(item.unit_price_cents)?;
            lines.push(LineRequest::client_priced(
                item.product_id.clone(),
                item.quantity,
                Money::from_cents(item.unit_price_cents),
            ));
        }

        branch::require_in(&mut tx, &record.branch_id).await?;
        let priced = apply_lines(&mut tx, &record.branch_id, &lines).await?;
        verify_total(Money::from_cents(record.total_cents), sum_lines(&priced)?)?;

        let payment = record.payment_info.clone().unwrap_or_default();
        let now = Utc::now();
        let header = Sale {
            id: Uuid::new_v4().to_string(),
            branch_id: record.branch_id.clone(),
            user_id: user_id.to_string(),
            total_cents: record.total_cents,
            status: sale_status_from_payment_report(payment.status.as_deref()),
            payment_ref: payment.reference,
            payment_method: payment.method,
            client_txn_id: Some(record.client_txn_id.clone()),
            client_id: Some(client_id.to_string()),
            created_at: record.created_at.unwrap_or(now),
            updated_at: now,
            synced_at: Some(now),
        };
        let created = write_sale(&mut tx, header, &priced).await?;

        tx.commit().await?;
        Ok(created.sale.id)
    }

    /// Approves, rejects or deletes a pending sale. Delete puts every
    /// item's stock back before removing the sale.
    pub async fn resolve(&self, request: &ResolveRequest) -> DbResult<ResolvedSale> {
        let mut tx = begin_write(&self.pool).await?;

        let current = sale::get_in(&mut tx, &request.sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", &request.sale_id))?;

        let resolved = match request.action {
            ResolveAction::Approve | ResolveAction::Reject => {
                let next = if request.action == ResolveAction::Approve {
                    SaleStatus::Paid
                } else {
                    SaleStatus::Failed
                };
                check_sale_transition(&current, next)?;
                if !sale::settle_in(&mut tx, &current.id, next).await? {
                    return Err(CoreError::Conflict(format!(
                        "Sale {} is no longer pending",
                        current.id
                    ))
                    .into());
                }
                sale::get_in(&mut tx, &current.id).await?
            }
            ResolveAction::Delete => {
                if current.status.is_terminal() {
                    return Err(
                        CoreError::Conflict(format!("Sale is already {}", current.status)).into(),
                    );
                }
                let returned: Vec<(String, i64)> = sale::items_in(&mut tx, &current.id)
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
                sale::delete_in(&mut tx, &current.id).await?;
                None
            }
        };

        tx.commit().await?;

        info!(sale_id = %current.id, action = ?request.action, "Sale resolved");

        Ok(ResolvedSale {
            sale_id: current.id,
            action: request.action,
            sale: resolved,
        })
    }
}

/// Maps a record's failure to its classification.
fn classify(txn_id: &str, err: DbError) -> SyncResult {
    match err {
        e if e.is_unique_violation_on("client_txn_id") => {
            let result = SyncResult::new(txn_id, SyncStatus::Duplicate)
                .with_message("Sale already synced");
            match e {
                DbError::UniqueViolation { value, .. } if value != "unknown" => {
                    result.with_sale(value)
                }
                _ => result,
            }
        }
        DbError::Domain(e @ CoreError::InsufficientStock { .. }) => {
            SyncResult::new(txn_id, SyncStatus::InsufficientStock).with_message(e.to_string())
        }
        DbError::Domain(e) => {
            warn!(client_txn_id = %txn_id, error = %e, "Offline sale rejected");
            SyncResult::new(txn_id, SyncStatus::Failed).with_message(e.to_string())
        }
        e @ DbError::NotFound { .. } => {
            SyncResult::new(txn_id, SyncStatus::Failed).with_message(e.to_string())
        }
        other => {
            error!(client_txn_id = %txn_id, error = %other, "Offline sale failed");
            SyncResult::new(txn_id, SyncStatus::Failed).with_message("Internal error")
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, Fixture};

    fn record(f: &Fixture, txn: &str, qty: i64, unit: i64, total: i64) -> OfflineSale {
        OfflineSale {
            client_txn_id: txn.to_string(),
            branch_id: f.branch.id.clone(),
            items: vec![OfflineLine {
                product_id: f.coke.id.clone(),
                quantity: qty,
                unit_price_cents: unit,
            }],
            total_cents: total,
            payment_info: None,
            created_at: None,
        }
    }

    fn batch(sales: Vec<OfflineSale>) -> SyncBatch {
        SyncBatch {
            client_id: "till-01".to_string(),
            sales,
        }
    }

    #[tokio::test]
    async fn test_resubmission_is_duplicate_without_stock_change() {
        let f = fixture().await;
        f.stock(&f.branch.id, &f.coke.id, 10).await;
        let processor = f.db.sync_processor();
        let input = batch(vec![record(&f, "T-1", 2, 6_000, 12_000)]);

        let first = processor.sync_batch(&input, &f.customer.id).await.unwrap();
        assert_eq!(first.results[0].status, SyncStatus::Synced);
        let sale_id = first.results[0].sale_id.clone().unwrap();

        let second = processor.sync_batch(&input, &f.customer.id).await.unwrap();
        assert_eq!(second.results[0].status, SyncStatus::Duplicate);
        assert_eq!(second.results[0].sale_id.as_deref(), Some(sale_id.as_str()));
        assert_eq!(second.summary.duplicate, 1);

        let stock = f.db.stock().get(&f.branch.id, &f.coke.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 8);
    }

    #[tokio::test]
    async fn test_client_price_is_kept() {
        let f = fixture().await;
        f.stock(&f.branch.id, &f.coke.id, 10).await;

        let report = f
            .db
            .sync_processor()
            .sync_batch(&batch(vec![record(&f, "T-1", 3, 5_000, 15_000)]), &f.customer.id)
            .await
            .unwrap();

        let sale_id = report.results[0].sale_id.clone().unwrap();
        let stored = f.db.sales().get_with_items(&sale_id).await.unwrap().unwrap();
        assert_eq!(stored.items[0].unit_price_cents, 5_000);
        assert_eq!(stored.sale.total_cents, 15_000);
        assert_eq!(stored.sale.client_id.as_deref(), Some("till-01"));
        assert!(stored.sale.synced_at.is_some());
    }

    #[tokio::test]
    async fn test_records_are_isolated() {
        let f = fixture().await;
        f.stock(&f.branch.id, &f.coke.id, 5).await;

        let short = record(&f, "T-2", 50, 6_000, 300_000);
        let mismatch = record(&f, "T-3", 1, 6_000, 1);
        let mut no_branch = record(&f, "T-4", 1, 6_000, 6_000);
        no_branch.branch_id = String::new();

        let report = f
            .db
            .sync_processor()
            .sync_batch(
                &batch(vec![
                    record(&f, "T-1", 2, 6_000, 12_000),
                    short,
                    mismatch,
                    no_branch,
                ]),
                &f.customer.id,
            )
            .await
            .unwrap();

        let statuses: Vec<SyncStatus> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                SyncStatus::Synced,
                SyncStatus::InsufficientStock,
                SyncStatus::Failed,
                SyncStatus::Failed,
            ]
        );
        assert_eq!(
            report.summary,
            SyncSummary {
                total: 4,
                synced: 1,
                duplicate: 0,
                insufficient_stock: 1,
                failed: 2,
            }
        );

        // Only the synced record took stock.
        let stock = f.db.stock().get(&f.branch.id, &f.coke.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 3);
    }

    #[tokio::test]
    async fn test_payment_info_sets_initial_status() {
        let f = fixture().await;
        f.stock(&f.branch.id, &f.coke.id, 10).await;

        let mut paid = record(&f, "T-1", 1, 6_000, 6_000);
        paid.payment_info = Some(OfflinePaymentInfo {
            status: Some("completed".to_string()),
            method: Some("mpesa".to_string()),
            reference: Some("NLJ7RT61SV".to_string()),
        });
        let pending = record(&f, "T-2", 1, 6_000, 6_000);

        let report = f
            .db
            .sync_processor()
            .sync_batch(&batch(vec![paid, pending]), &f.customer.id)
            .await
            .unwrap();

        let paid_sale = f
            .db
            .sales()
            .get_by_id(report.results[0].sale_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid_sale.status, SaleStatus::Paid);
        assert_eq!(paid_sale.payment_ref.as_deref(), Some("NLJ7RT61SV"));

        let pending = f.db.sales().pending_synced().await.unwrap();
        assert_eq!(pending.len(), 1);

        let status = f.db.sales().client_sync_status("till-01").await.unwrap();
        assert_eq!(status.total_synced, 2);
        assert_eq!(status.paid, 1);
        assert_eq!(status.pending, 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let f = fixture().await;
        let err = f
            .db
            .sync_processor()
            .sync_batch(&batch(vec![]), &f.customer.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_resolve_delete_restores_stock() {
        let f = fixture().await;
        f.stock(&f.branch.id, &f.coke.id, 10).await;
        let processor = f.db.sync_processor();

        let report = processor
            .sync_batch(&batch(vec![record(&f, "T-1", 4, 6_000, 24_000)]), &f.customer.id)
            .await
            .unwrap();
        let sale_id = report.results[0].sale_id.clone().unwrap();

        let resolved = processor
            .resolve(&ResolveRequest {
                sale_id: sale_id.clone(),
                action: ResolveAction::Delete,
            })
            .await
            .unwrap();
        assert!(resolved.sale.is_none());
        assert!(f.db.sales().get_by_id(&sale_id).await.unwrap().is_none());
        assert!(f.db.sales().items(&sale_id).await.unwrap().is_empty());

        let stock = f.db.stock().get(&f.branch.id, &f.coke.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 10);
    }

    #[tokio::test]
    async fn test_resolve_approve_then_conflict() {
        let f = fixture().await;
        f.stock(&f.branch.id, &f.coke.id, 10).await;
        let processor = f.db.sync_processor();

        let report = processor
            .sync_batch(&batch(vec![record(&f, "T-1", 1, 6_000, 6_000)]), &f.customer.id)
            .await
            .unwrap();
        let sale_id = report.results[0].sale_id.clone().unwrap();

        let approved = processor
            .resolve(&ResolveRequest {
                sale_id: sale_id.clone(),
                action: ResolveAction::Approve,
            })
            .await
            .unwrap();
        assert_eq!(approved.sale.unwrap().status, SaleStatus::Paid);

        let err = processor
            .resolve(&ResolveRequest {
                sale_id,
                action: ResolveAction::Delete,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Conflict(_))));
    }
}
