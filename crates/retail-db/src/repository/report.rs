//! # Report Repository
//!
//! Aggregates for the admin reports and stock alerts. Only `paid` sales
//! count toward revenue.
//!
//! ```text
//! ReportPeriod::start(now) ──► created_at >= start ──► SUM / COUNT / GROUP BY
//! ```

use chrono::{DateTime, Duration, Utc};
use retail_core::report::{
    stock_health, AlertSummary, BranchAlertCount, BranchPerformance, BrandSales, DailySales,
    LowStockGroup, ProductAlertCount, ProductSales, ReportPeriod, RevenueSummary, SalesReport,
    StockAlert,
};
use retail_core::{Money, CRITICAL_STOCK_THRESHOLD, LOW_STOCK_THRESHOLD};
use sqlx::SqlitePool;

use crate::error::DbResult;

const ALERT_SELECT: &str = r#"
    SELECT s.branch_id, b.name AS branch_name, s.product_id, p.name AS product_name,
           p.brand, s.quantity AS current_stock
    FROM stock_entries s
    JOIN branches b ON b.id = s.branch_id
    JOIN products p ON p.id = s.product_id
"#;

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    async fn paid_totals(
        &self,
        since: DateTime<Utc>,
        branch_id: Option<&str>,
    ) -> DbResult<(i64, i64)> {
        let totals: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_cents), 0), COUNT(*)
            FROM sales
            WHERE status = 'paid' AND created_at >= ?1 AND (?2 IS NULL OR branch_id = ?2)
            "#,
        )
        .bind(since)
        .bind(branch_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }

    async fn brand_breakdown(
        &self,
        since: DateTime<Utc>,
        branch_id: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<BrandSales>> {
        let rows = sqlx::query_as::<_, BrandSales>(
            r#"
            SELECT p.brand AS brand,
                   COALESCE(SUM(si.line_total_cents), 0) AS revenue_cents,
                   COALESCE(SUM(si.quantity), 0) AS units_sold,
                   COUNT(DISTINCT s.id) AS sales_count
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN products p ON p.id = si.product_id
            WHERE s.status = 'paid' AND s.created_at >= ?1 AND (?2 IS NULL OR s.branch_id = ?2)
            GROUP BY p.brand
            ORDER BY revenue_cents DESC, p.brand
            LIMIT ?3
            "#,
        )
        .bind(since)
        .bind(branch_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.average_price_cents = Money::from_cents(row.revenue_cents)
                    .average_over(row.units_sold)
                    .cents();
                row
            })
            .collect())
    }

    /// Revenue, count and brand breakdown over a period.
    pub async fn sales_report(
        &self,
        period: ReportPeriod,
        branch_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<SalesReport> {
        let since = period.start(now);
        let (total_revenue_cents, total_sales) = self.paid_totals(since, branch_id).await?;
        let brand_breakdown = self.brand_breakdown(since, branch_id, -1).await?;

        Ok(SalesReport {
            period,
            branch_id: branch_id.map(str::to_string),
            total_revenue_cents,
            total_sales,
            brand_breakdown,
            generated_at: now,
        })
    }

    /// Revenue per branch with each branch's top five products.
    pub async fn branch_performance(
        &self,
        period: ReportPeriod,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<BranchPerformance>> {
        let since = period.start(now);

        let branches: Vec<(String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT b.id, b.name, COALESCE(SUM(s.total_cents), 0), COUNT(s.id)
            FROM branches b
            LEFT JOIN sales s
                   ON s.branch_id = b.id AND s.status = 'paid' AND s.created_at >= ?1
            GROUP BY b.id, b.name
            ORDER BY 3 DESC, b.name
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut report = Vec::with_capacity(branches.len());
        for (branch_id, branch_name, total_revenue_cents, total_sales) in branches {
            let top_products = sqlx::query_as::<_, ProductSales>(
                r#"
                SELECT si.product_id, p.name AS product_name,
                       SUM(si.quantity) AS quantity,
                       SUM(si.line_total_cents) AS revenue_cents
                FROM sale_items si
                JOIN sales s ON s.id = si.sale_id
                JOIN products p ON p.id = si.product_id
                WHERE s.branch_id = ?1 AND s.status = 'paid' AND s.created_at >= ?2
                GROUP BY si.product_id, p.name
                ORDER BY revenue_cents DESC
                LIMIT 5
                "#,
            )
            .bind(&branch_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

            report.push(BranchPerformance {
                branch_id,
                branch_name,
                total_revenue_cents,
                total_sales,
                top_products,
            });
        }

        Ok(report)
    }

    /// Totals, average sale and top ten brands.
    pub async fn revenue_summary(
        &self,
        period: ReportPeriod,
        now: DateTime<Utc>,
    ) -> DbResult<RevenueSummary> {
        let since = period.start(now);
        let (total_revenue_cents, total_sales) = self.paid_totals(since, None).await?;
        let top_brands = self.brand_breakdown(since, None, 10).await?;

        Ok(RevenueSummary {
            period,
            total_revenue_cents,
            total_sales,
            average_sale_cents: Money::from_cents(total_revenue_cents)
                .average_over(total_sales)
                .cents(),
            top_brands,
            generated_at: now,
        })
    }

    /// Per-day paid revenue over the last `days` days.
    pub async fn daily_trend(&self, days: i64, now: DateTime<Utc>) -> DbResult<Vec<DailySales>> {
        let since = now - Duration::days(days);

        let rows = sqlx::query_as::<_, DailySales>(
            r#"
            SELECT substr(created_at, 1, 10) AS date,
                   COALESCE(SUM(total_cents), 0) AS revenue_cents,
                   COUNT(*) AS sales
            FROM sales
            WHERE status = 'paid' AND created_at >= ?1
            GROUP BY substr(created_at, 1, 10)
            ORDER BY date
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Stock
    // -------------------------------------------------------------------------

    /// Rows below `threshold`, optionally for one branch, lowest first.
    /// Reorder level is twice the threshold.
    pub async fn low_stock_alerts(
        &self,
        threshold: i64,
        branch_id: Option<&str>,
    ) -> DbResult<Vec<StockAlert>> {
        let rows = sqlx::query_as::<_, StockAlert>(&format!(
            "{} WHERE s.quantity < ?1 AND (?2 IS NULL OR s.branch_id = ?2) ORDER BY s.quantity, b.name, p.name",
            ALERT_SELECT
        ))
        .bind(threshold)
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.threshold = threshold;
                row.reorder_level = threshold * 2;
                row
            })
            .collect())
    }

    /// Rows at or below the critical level (3). Reorder level is 10.
    pub async fn critical_alerts(&self) -> DbResult<Vec<StockAlert>> {
        let rows = sqlx::query_as::<_, StockAlert>(&format!(
            "{} WHERE s.quantity <= ?1 ORDER BY s.quantity, b.name, p.name",
            ALERT_SELECT
        ))
        .bind(CRITICAL_STOCK_THRESHOLD)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.threshold = CRITICAL_STOCK_THRESHOLD;
                row.reorder_level = LOW_STOCK_THRESHOLD;
                row
            })
            .collect())
    }

    /// Low-stock rows grouped by branch.
    pub async fn low_stock_by_branch(&self, threshold: i64) -> DbResult<Vec<LowStockGroup>> {
        let mut rows = self.low_stock_alerts(threshold, None).await?;
        rows.sort_by(|a, b| a.branch_name.cmp(&b.branch_name));

        let mut groups: Vec<LowStockGroup> = Vec::new();
        for row in rows {
            match groups.last_mut() {
                Some(group) if group.branch_id == row.branch_id => group.items.push(row),
                _ => groups.push(LowStockGroup {
                    branch_id: row.branch_id.clone(),
                    branch_name: row.branch_name.clone(),
                    items: vec![row],
                }),
            }
        }

        Ok(groups)
    }

    /// Alert counts and overall stock health.
    pub async fn alert_summary(&self, now: DateTime<Utc>) -> DbResult<AlertSummary> {
        let (total, low, critical, out): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN quantity < ?1 THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN quantity <= ?2 THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN quantity = 0 THEN 1 ELSE 0 END), 0)
            FROM stock_entries
            "#,
        )
        .bind(LOW_STOCK_THRESHOLD)
        .bind(CRITICAL_STOCK_THRESHOLD)
        .fetch_one(&self.pool)
        .await?;

        let branches = sqlx::query_as::<_, BranchAlertCount>(
            r#"
            SELECT b.id AS branch_id, b.name AS branch_name, COUNT(*) AS alert_count
            FROM stock_entries s
            JOIN branches b ON b.id = s.branch_id
            WHERE s.quantity < ?1
            GROUP BY b.id, b.name
            ORDER BY alert_count DESC, b.name
            "#,
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_all(&self.pool)
        .await?;

        let top_products = sqlx::query_as::<_, ProductAlertCount>(
            r#"
            SELECT p.id AS product_id, p.name AS product_name, p.brand, COUNT(*) AS alert_count
            FROM stock_entries s
            JOIN products p ON p.id = s.product_id
            WHERE s.quantity < ?1
            GROUP BY p.id, p.name, p.brand
            ORDER BY alert_count DESC, p.name
            LIMIT 5
            "#,
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_all(&self.pool)
        .await?;

        Ok(AlertSummary {
            total_stock_rows: total,
            low_stock_count: low,
            critical_count: critical,
            out_of_stock_count: out,
            branches,
            top_products,
            health: stock_health(total, low, critical),
            generated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::sale::{SaleLine, SaleRequest};
    use crate::testing::fixture;
    use retail_core::report::StockHealth;
    use retail_core::SaleStatus;

    #[tokio::test]
    async fn test_only_paid_sales_count() {
        let f = fixture().await;
        f.stock(&f.branch.id, &f.coke.id, 50).await;
        f.stock(&f.branch.id, &f.fanta.id, 50).await;

        let processor = f.db.sale_processor();
        let paid = processor
            .create_sale(
                &f.branch.id,
                &f.customer.id,
                &SaleRequest {
                    items: vec![
                        SaleLine { product_id: f.coke.id.clone(), quantity: 2 },
                        SaleLine { product_id: f.fanta.id.clone(), quantity: 1 },
                    ],
                    payment_method: None,
                    payment_ref: None,
                },
            )
            .await
            .unwrap();
        processor
            .update_sale_status(&paid.sale.id, SaleStatus::Paid)
            .await
            .unwrap();

        // Still pending, so excluded.
        processor
            .create_sale(
                &f.branch.id,
                &f.customer.id,
                &SaleRequest {
                    items: vec![SaleLine { product_id: f.coke.id.clone(), quantity: 1 }],
                    payment_method: None,
                    payment_ref: None,
                },
            )
            .await
            .unwrap();

        let now = Utc::now();
        let report = f
            .db
            .reports()
            .sales_report(ReportPeriod::Today, None, now)
            .await
            .unwrap();
        assert_eq!(report.total_sales, 1);
        assert_eq!(report.total_revenue_cents, paid.sale.total_cents);
        assert_eq!(report.brand_breakdown.len(), 2);

        let coke = report
            .brand_breakdown
            .iter()
            .find(|b| b.brand == f.coke.brand)
            .unwrap();
        assert_eq!(coke.units_sold, 2);
        assert_eq!(coke.average_price_cents, f.coke.price_cents);

        let summary = f
            .db
            .reports()
            .revenue_summary(ReportPeriod::Month, now)
            .await
            .unwrap();
        assert_eq!(summary.average_sale_cents, paid.sale.total_cents);

        let perf = f
            .db
            .reports()
            .branch_performance(ReportPeriod::Week, now)
            .await
            .unwrap();
        let branch = perf.iter().find(|p| p.branch_id == f.branch.id).unwrap();
        assert_eq!(branch.total_sales, 1);
        assert_eq!(branch.top_products.len(), 2);

        let trend = f.db.reports().daily_trend(30, now).await.unwrap();
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].sales, 1);
    }

    #[tokio::test]
    async fn test_alert_summary_health() {
        let f = fixture().await;
        f.stock(&f.hq.id, &f.coke.id, 100).await;
        f.stock(&f.hq.id, &f.fanta.id, 100).await;
        f.stock(&f.branch.id, &f.coke.id, 0).await;
        f.stock(&f.branch.id, &f.fanta.id, 8).await;

        let summary = f.db.reports().alert_summary(Utc::now()).await.unwrap();
        assert_eq!(summary.total_stock_rows, 4);
        assert_eq!(summary.low_stock_count, 2);
        assert_eq!(summary.critical_count, 1);
        assert_eq!(summary.out_of_stock_count, 1);
        assert_eq!(summary.branches.len(), 1);
        assert_eq!(summary.branches[0].alert_count, 2);
        assert_eq!(summary.health, StockHealth::Critical);

        let critical = f.db.reports().critical_alerts().await.unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].reorder_level, 10);

        let low = f
            .db
            .reports()
            .low_stock_alerts(10, Some(&f.branch.id))
            .await
            .unwrap();
        assert_eq!(low.len(), 2);
        assert_eq!(low[0].current_stock, 0);
        assert_eq!(low[0].reorder_level, 20);

        let grouped = f.db.reports().low_stock_by_branch(10).await.unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].items.len(), 2);
    }
}
