//! Branch routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use retail_core::{Branch, StockView};
use retail_db::repository::branch::{BranchUpdate, NewBranch};

use crate::auth::require_admin;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let read_routes = Router::new()
        .route("/branches", get(list))
        .route("/branches/{id}", get(get_by_id))
        .route("/branches/{id}/inventory", get(inventory));

    let manage_routes = Router::new()
        .route("/branches", post(create))
        .route("/branches/{id}", put(update).delete(delete))
        .route_layer(middleware::from_fn(require_admin));

    read_routes.merge(manage_routes)
}

/// GET /branches
async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Branch>>> {
    Ok(Json(state.db.branches().list().await?))
}

/// GET /branches/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Branch>> {
    let branch = state
        .db
        .branches()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Branch", &id))?;
    Ok(Json(branch))
}

/// GET /branches/{id}/inventory - every stock row of the branch.
async fn inventory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<StockView>>> {
    if state.db.branches().get_by_id(&id).await?.is_none() {
        return Err(ApiError::not_found("Branch", &id));
    }
    Ok(Json(state.db.stock().branch_inventory(&id).await?))
}

/// POST /branches
async fn create(
    State(state): State<AppState>,
    Json(payload): Json<NewBranch>,
) -> ApiResult<(StatusCode, Json<Branch>)> {
    let branch = state.db.branches().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

/// PUT /branches/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<BranchUpdate>,
) -> ApiResult<Json<Branch>> {
    Ok(Json(state.db.branches().update(&id, &payload).await?))
}

/// DELETE /branches/{id}
async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.db.branches().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
