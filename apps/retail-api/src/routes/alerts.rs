//! Stock alerts (admin only).

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{middleware, Json, Router};
use chrono::Utc;
use retail_core::report::{AlertSummary, StockAlert};
use retail_core::LOW_STOCK_THRESHOLD;
use serde::Deserialize;

use crate::auth::require_admin;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/alerts/low-stock", get(low_stock))
        .route("/alerts/critical", get(critical))
        .route("/alerts/summary", get(summary))
        .route_layer(middleware::from_fn(require_admin))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertQuery {
    pub threshold: Option<i64>,
    pub branch_id: Option<String>,
}

/// GET /alerts/low-stock?threshold=10&branchId=
async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> ApiResult<Json<Vec<StockAlert>>> {
    let threshold = query
        .threshold
        .filter(|t| *t > 0)
        .unwrap_or(LOW_STOCK_THRESHOLD);
    let branch_id = query.branch_id.as_deref().filter(|b| !b.is_empty());
    Ok(Json(
        state
            .db
            .reports()
            .low_stock_alerts(threshold, branch_id)
            .await?,
    ))
}

/// GET /alerts/critical - rows at or below the critical level.
async fn critical(State(state): State<AppState>) -> ApiResult<Json<Vec<StockAlert>>> {
    Ok(Json(state.db.reports().critical_alerts().await?))
}

/// GET /alerts/summary
async fn summary(State(state): State<AppState>) -> ApiResult<Json<AlertSummary>> {
    Ok(Json(state.db.reports().alert_summary(Utc::now()).await?))
}
