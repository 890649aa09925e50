//! Sales and stock reports (admin only). Only paid sales count.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{middleware, Json, Router};
use chrono::Utc;
use retail_core::report::{
    trend_days, BranchPerformance, DailySales, LowStockGroup, ReportPeriod, RevenueSummary,
    SalesReport,
};
use serde::Deserialize;

use crate::auth::require_admin;
use crate::error::ApiResult;
use crate::routes::restock::ThresholdQuery;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports/sales", get(sales))
        .route("/reports/branches", get(branches))
        .route("/reports/low-stock", get(low_stock))
        .route("/reports/revenue", get(revenue))
        .route("/reports/daily", get(daily))
        .route_layer(middleware::from_fn(require_admin))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub period: Option<String>,
    pub branch_id: Option<String>,
    pub days: Option<i64>,
}

impl ReportQuery {
    fn period_or(&self, default: ReportPeriod) -> ApiResult<ReportPeriod> {
        Ok(ReportPeriod::parse_or(self.period.as_deref(), default)?)
    }
}

/// GET /reports/sales?period=week&branchId=
async fn sales(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<SalesReport>> {
    let period = query.period_or(ReportPeriod::Week)?;
    let branch_id = query.branch_id.as_deref().filter(|b| !b.is_empty());
    Ok(Json(
        state
            .db
            .reports()
            .sales_report(period, branch_id, Utc::now())
            .await?,
    ))
}

/// GET /reports/branches?period=week
async fn branches(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Vec<BranchPerformance>>> {
    let period = query.period_or(ReportPeriod::Week)?;
    Ok(Json(
        state.db.reports().branch_performance(period, Utc::now()).await?,
    ))
}

/// GET /reports/low-stock?threshold=10
async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<ThresholdQuery>,
) -> ApiResult<Json<Vec<LowStockGroup>>> {
    Ok(Json(
        state.db.reports().low_stock_by_branch(query.threshold()).await?,
    ))
}

/// GET /reports/revenue?period=month
async fn revenue(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<RevenueSummary>> {
    let period = query.period_or(ReportPeriod::Month)?;
    Ok(Json(
        state.db.reports().revenue_summary(period, Utc::now()).await?,
    ))
}

/// GET /reports/daily?days=30
async fn daily(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Vec<DailySales>>> {
    Ok(Json(
        state
            .db
            .reports()
            .daily_trend(trend_days(query.days), Utc::now())
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_only_paid_sales_count() {
        let app = TestApp::new().await;
        app.stock(&app.branch.id, &app.coke.id, 10).await;

        for quantity in [1, 2] {
            app.post(
                &format!("/api/v1/branches/{}/sales", app.branch.id),
                Some(&app.admin_token),
                json!({ "items": [{ "productId": app.coke.id, "quantity": quantity }] }),
            )
            .await;
        }
        let (_, sales) = app.get("/api/v1/sales", Some(&app.admin_token)).await;
        let paid_id = sales
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["totalCents"] == 13_000)
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        app.patch(
            &format!("/api/v1/sales/{}/status", paid_id),
            Some(&app.admin_token),
            json!({ "status": "paid" }),
        )
        .await;

        let (status, report) = app
            .get("/api/v1/reports/sales?period=today", Some(&app.admin_token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["totalRevenueCents"], 13_000);
        assert_eq!(report["totalSales"], 1);
        assert_eq!(report["brandBreakdown"][0]["brand"], "Coke");
        assert_eq!(report["brandBreakdown"][0]["unitsSold"], 2);

        let (_, revenue) = app.get("/api/v1/reports/revenue", Some(&app.admin_token)).await;
        assert_eq!(revenue["averageSaleCents"], 13_000);
    }

    #[tokio::test]
    async fn test_unknown_period_rejected() {
        let app = TestApp::new().await;

        let (status, body) = app
            .get("/api/v1/reports/sales?period=decade", Some(&app.admin_token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_reports_are_admin_only() {
        let app = TestApp::new().await;

        let (status, _) = app
            .get("/api/v1/reports/daily", Some(&app.customer_token))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.get("/api/v1/reports/daily?days=7", Some(&app.admin_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }
}
