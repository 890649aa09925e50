//! # Reporting Rules
//!
//! Report windows, stock health scoring and restock suggestions, plus the row
//! types the reporting queries produce.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Report Period
// =============================================================================

/// Time window of a sales report, anchored at "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Today,
    Week,
    Month,
    Year,
}

impl ReportPeriod {
    /// Start of the window.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use retail_core::report::ReportPeriod;
    ///
    /// let now = Utc.with_ymd_and_hms(2026, 3, 15, 14, 30, 0).unwrap();
    /// let start = ReportPeriod::Today.start(now);
    /// assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap());
    /// ```
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            ReportPeriod::Today => {
                let date = now.date_naive();
                Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
            }
            ReportPeriod::Week => now - Duration::days(7),
            ReportPeriod::Month => now.checked_sub_months(Months::new(1)).unwrap_or(now),
            ReportPeriod::Year => now.checked_sub_months(Months::new(12)).unwrap_or(now),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Today => "today",
            ReportPeriod::Week => "week",
            ReportPeriod::Month => "month",
            ReportPeriod::Year => "year",
        }
    }

    /// Parses an optional query value, falling back to `default` when absent.
    pub fn parse_or(raw: Option<&str>, default: ReportPeriod) -> Result<Self, ValidationError> {
        match raw {
            None => Ok(default),
            Some(s) if s.trim().is_empty() => Ok(default),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(ReportPeriod::Today),
            "week" => Ok(ReportPeriod::Week),
            "month" => Ok(ReportPeriod::Month),
            "year" => Ok(ReportPeriod::Year),
            _ => Err(ValidationError::NotAllowed {
                field: "period".to_string(),
                allowed: vec![
                    "today".to_string(),
                    "week".to_string(),
                    "month".to_string(),
                    "year".to_string(),
                ],
            }),
        }
    }
}

/// Clamps the daily-trend window to 1..=365 days (default 30).
pub fn trend_days(requested: Option<i64>) -> i64 {
    match requested {
        Some(d) if (1..=365).contains(&d) => d,
        _ => 30,
    }
}

// =============================================================================
// Stock Health
// =============================================================================

/// Overall stock health across all branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum StockHealth {
    Unknown,
    Critical,
    Warning,
    Caution,
    Healthy,
}

/// Scores stock health from row counts.
///
/// ```text
/// no rows            → unknown
/// critical > 10 %    → critical
/// low      > 25 %    → warning
/// low      > 10 %    → caution
/// otherwise          → healthy
/// ```
pub fn stock_health(total_rows: i64, low_rows: i64, critical_rows: i64) -> StockHealth {
    if total_rows <= 0 {
        return StockHealth::Unknown;
    }
    // Integer percentages: x / total > p%  ⇔  100·x > p·total
    if critical_rows * 100 > total_rows * 10 {
        StockHealth::Critical
    } else if low_rows * 100 > total_rows * 25 {
        StockHealth::Warning
    } else if low_rows * 100 > total_rows * 10 {
        StockHealth::Caution
    } else {
        StockHealth::Healthy
    }
}

/// Quantity to move so a branch reaches twice the threshold, capped by HQ.
pub fn suggested_restock(threshold: i64, current: i64, hq_available: i64) -> i64 {
    let target = threshold * 2 - current;
    target.min(hq_available).max(0)
}

// =============================================================================
// Report Rows
// =============================================================================

/// Revenue of one brand inside a report window.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BrandSales {
    pub brand: String,
    pub revenue_cents: i64,
    pub units_sold: i64,
    pub sales_count: i64,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub average_price_cents: i64,
}

/// Revenue of one product at one branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

/// One day of the daily sales trend.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    pub date: String,
    pub revenue_cents: i64,
    pub sales: i64,
}

/// Sales report over a window.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub period: ReportPeriod,
    pub branch_id: Option<String>,
    pub total_revenue_cents: i64,
    pub total_sales: i64,
    pub brand_breakdown: Vec<BrandSales>,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
}

/// Per-branch performance inside a window.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BranchPerformance {
    pub branch_id: String,
    pub branch_name: String,
    pub total_revenue_cents: i64,
    pub total_sales: i64,
    pub top_products: Vec<ProductSales>,
}

/// Revenue totals with the best-selling brands.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub period: ReportPeriod,
    pub total_revenue_cents: i64,
    pub total_sales: i64,
    pub average_sale_cents: i64,
    pub top_brands: Vec<BrandSales>,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
}

/// Stock row flagged by an alert rule.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    pub branch_id: String,
    pub branch_name: String,
    pub product_id: String,
    pub product_name: String,
    pub brand: String,
    pub current_stock: i64,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub threshold: i64,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub reorder_level: i64,
}

/// Low-stock rows of one branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LowStockGroup {
    pub branch_id: String,
    pub branch_name: String,
    pub items: Vec<StockAlert>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BranchAlertCount {
    pub branch_id: String,
    pub branch_name: String,
    pub alert_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductAlertCount {
    pub product_id: String,
    pub product_name: String,
    pub brand: String,
    pub alert_count: i64,
}

/// Stock alert overview across all branches.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub total_stock_rows: i64,
    pub low_stock_count: i64,
    pub critical_count: i64,
    pub out_of_stock_count: i64,
    pub branches: Vec<BranchAlertCount>,
    pub top_products: Vec<ProductAlertCount>,
    pub health: StockHealth,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
}

/// HQ inventory with its valuation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct HqStockOverview {
    pub branch_id: String,
    pub branch_name: String,
    pub items: Vec<crate::types::StockView>,
    pub total_value_cents: i64,
    pub low_stock_count: i64,
}

/// A branch row that should be topped up from HQ.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RestockSuggestion {
    pub branch_id: String,
    pub branch_name: String,
    pub product_id: String,
    pub product_name: String,
    pub brand: String,
    pub current_stock: i64,
    pub hq_available: i64,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub suggested_quantity: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
