//! Offline sync routes.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use retail_core::Sale;
use retail_db::processor::sync::{ResolveRequest, ResolvedSale, SyncBatch, SyncReport};
use retail_db::repository::sale::ClientSyncStatus;
use tracing::info;

use crate::auth::{require_admin, CurrentUser};
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let user_routes = Router::new()
        .route("/sync", post(sync_batch))
        .route("/sync/status/{client_id}", get(client_status));

    let admin_routes = Router::new()
        .route("/sync/pending", get(pending))
        .route("/sync/resolve", post(resolve))
        .route_layer(middleware::from_fn(require_admin));

    user_routes.merge(admin_routes)
}

/// POST /sync - per-record results; one bad record never fails the batch.
async fn sync_batch(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(batch): Json<SyncBatch>,
) -> ApiResult<Json<SyncReport>> {
    let report = state
        .db
        .sync_processor()
        .sync_batch(&batch, &user.id)
        .await?;
    Ok(Json(report))
}

/// GET /sync/status/{clientId}
async fn client_status(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> ApiResult<Json<ClientSyncStatus>> {
    Ok(Json(state.db.sales().client_sync_status(&client_id).await?))
}

/// GET /sync/pending
async fn pending(State(state): State<AppState>) -> ApiResult<Json<Vec<Sale>>> {
    Ok(Json(state.db.sales().pending_synced().await?))
}

/// POST /sync/resolve
async fn resolve(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ResolveRequest>,
) -> ApiResult<Json<ResolvedSale>> {
    let resolved = state.db.sync_processor().resolve(&payload).await?;
    info!(sale_id = %resolved.sale_id, action = ?resolved.action, admin_id = %user.id, "Synced sale resolved");
    Ok(Json(resolved))
}
