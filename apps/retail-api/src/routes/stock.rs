//! Admin stock correction.

use axum::extract::State;
use axum::routing::put;
use axum::{middleware, Json, Router};
use retail_core::InventoryAdjustment;
use retail_db::repository::stock::StockAdjustment;

use crate::auth::{require_admin, CurrentUser};
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stock/adjust", put(adjust))
        .route_layer(middleware::from_fn(require_admin))
}

/// PUT /stock/adjust - sets an absolute quantity with an audit row.
async fn adjust(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<StockAdjustment>,
) -> ApiResult<Json<InventoryAdjustment>> {
    Ok(Json(state.db.stock().adjust(&payload, &user.id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_adjust_records_previous_quantity() {
        let app = TestApp::new().await;
        app.stock(&app.branch.id, &app.coke.id, 12).await;

        let (status, body) = app
            .put(
                "/api/v1/stock/adjust",
                Some(&app.admin_token),
                json!({
                    "branchId": app.branch.id,
                    "productId": app.coke.id,
                    "quantity": 9,
                    "reason": "Damaged crate"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["previousQuantity"], 12);
        assert_eq!(body["newQuantity"], 9);
        assert_eq!(body["adjustedBy"], app.admin.id.as_str());
        assert_eq!(app.quantity(&app.branch.id, &app.coke.id).await, 9);
    }

    #[tokio::test]
    async fn test_adjust_is_admin_only() {
        let app = TestApp::new().await;

        let (status, _) = app
            .put(
                "/api/v1/stock/adjust",
                Some(&app.customer_token),
                json!({
                    "branchId": app.branch.id,
                    "productId": app.coke.id,
                    "quantity": 1,
                    "reason": "x"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
