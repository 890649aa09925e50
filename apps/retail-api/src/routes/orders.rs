//! Online order routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{middleware, Json, Router};
use retail_core::{Order, OrderStatus, OrderWithItems};
use retail_db::processor::sale::{OrderRequest, PlacedOrder};
use tracing::info;

use crate::auth::{require_admin, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::routes::sales::StatusUpdate;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let user_routes = Router::new()
        .route("/orders", post(create).get(list))
        .route("/orders/{id}", get(get_by_id));

    let admin_routes = Router::new()
        .route("/orders/{id}/status", patch(update_status))
        .route_layer(middleware::from_fn(require_admin));

    user_routes.merge(admin_routes)
}

/// POST /orders - reserves stock and opens a pending payment.
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<OrderRequest>,
) -> ApiResult<(StatusCode, Json<PlacedOrder>)> {
    let placed = state
        .db
        .sale_processor()
        .create_order(&user.id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

/// GET /orders - the caller's orders, newest first.
async fn list(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.db.orders().list_by_user(&user.id).await?))
}

/// GET /orders/{id}
async fn get_by_id(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderWithItems>> {
    let order = state
        .db
        .orders()
        .get_with_items(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", &id))?;

    if !user.can_access(&order.order.user_id) {
        return Err(ApiError::forbidden());
    }
    Ok(Json(order))
}

/// PATCH /orders/{id}/status - admin completion or cancellation.
async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdate>,
) -> ApiResult<Json<Order>> {
    let next: OrderStatus = payload.status.parse()?;
    let order = state
        .db
        .sale_processor()
        .update_order_status(&id, next)
        .await?;

    info!(order_id = %order.id, status = %order.order_status, admin_id = %user.id, "Order status changed");
    Ok(Json(order))
}
