//! HQ → branch restock routes (admin only).

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use retail_core::report::{HqStockOverview, RestockSuggestion};
use retail_core::{RestockLog, LOW_STOCK_THRESHOLD};
use retail_db::processor::restock::{BulkRestockRequest, RestockOutcome, RestockRequest};
use retail_db::repository::restock::RestockHistoryFilter;
use serde::Deserialize;

use crate::auth::{require_admin, CurrentUser};
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/restock", post(restock))
        .route("/restock/bulk", post(bulk_restock))
        .route("/restock/hq-stock", get(hq_stock))
        .route("/restock/history", get(history))
        .route("/restock/suggestions", get(suggestions))
        .route_layer(middleware::from_fn(require_admin))
}

#[derive(Debug, Default, Deserialize)]
pub struct ThresholdQuery {
    pub threshold: Option<i64>,
}

impl ThresholdQuery {
    pub fn threshold(&self) -> i64 {
        self.threshold
            .filter(|t| *t > 0)
            .unwrap_or(LOW_STOCK_THRESHOLD)
    }
}

/// POST /restock
async fn restock(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<RestockRequest>,
) -> ApiResult<Json<RestockOutcome>> {
    let outcome = state
        .db
        .restock_processor()
        .restock(&payload, &user.id)
        .await?;
    Ok(Json(outcome))
}

/// POST /restock/bulk - all lines or none.
async fn bulk_restock(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<BulkRestockRequest>,
) -> ApiResult<Json<Vec<RestockOutcome>>> {
    let outcomes = state
        .db
        .restock_processor()
        .bulk_restock(&payload, &user.id)
        .await?;
    Ok(Json(outcomes))
}

/// GET /restock/hq-stock
async fn hq_stock(State(state): State<AppState>) -> ApiResult<Json<HqStockOverview>> {
    Ok(Json(state.db.restocks().hq_overview().await?))
}

/// GET /restock/history?branchId&productId&from&to&limit
async fn history(
    State(state): State<AppState>,
    Query(filter): Query<RestockHistoryFilter>,
) -> ApiResult<Json<Vec<RestockLog>>> {
    Ok(Json(state.db.restocks().history(&filter).await?))
}

/// GET /restock/suggestions?threshold=10
async fn suggestions(
    State(state): State<AppState>,
    Query(query): Query<ThresholdQuery>,
) -> ApiResult<Json<Vec<RestockSuggestion>>> {
    Ok(Json(
        state.db.restocks().suggestions(query.threshold()).await?,
    ))
}
