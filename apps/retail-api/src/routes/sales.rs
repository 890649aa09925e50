//! Sale routes.
//!
//! Customers see only their own sales; admins see everything.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{middleware, Json, Router};
use retail_core::{Sale, SaleStatus, SaleWithItems};
use retail_db::processor::sale::SaleRequest;
use serde::Deserialize;
use tracing::info;

use crate::auth::{require_admin, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::routes::ListQuery;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let user_routes = Router::new()
        .route("/branches/{id}/sales", post(create).get(list_by_branch))
        .route("/sales", get(list))
        .route("/sales/{id}", get(get_by_id))
        .route("/sales/status/{status}", get(list_by_status));

    let admin_routes = Router::new()
        .route("/sales/{id}/status", patch(update_status))
        .route_layer(middleware::from_fn(require_admin));

    user_routes.merge(admin_routes)
}

/// Body of a status change.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// Customers only list their own sales; admins list everyone's.
fn owner_filter(user: &CurrentUser) -> Option<&str> {
    if user.is_admin() {
        None
    } else {
        Some(user.id.as_str())
    }
}

/// POST /branches/{id}/sales - online sale at live prices.
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(branch_id): Path<String>,
    Json(payload): Json<SaleRequest>,
) -> ApiResult<(StatusCode, Json<SaleWithItems>)> {
    let sale = state
        .db
        .sale_processor()
        .create_sale(&branch_id, &user.id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// GET /sales
async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Sale>>> {
    let sales = if user.is_admin() {
        state.db.sales().list(query.limit()).await?
    } else {
        state.db.sales().list_by_user(&user.id, query.limit()).await?
    };
    Ok(Json(sales))
}

/// GET /sales/{id}
async fn get_by_id(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleWithItems>> {
    let sale = state
        .db
        .sales()
        .get_with_items(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", &id))?;

    if !user.can_access(&sale.sale.user_id) {
        return Err(ApiError::forbidden());
    }
    Ok(Json(sale))
}

/// GET /branches/{id}/sales
async fn list_by_branch(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(branch_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Sale>>> {
    let sales = state
        .db
        .sales()
        .list_by_branch(&branch_id, owner_filter(&user), query.limit())
        .await?;
    Ok(Json(sales))
}

/// GET /sales/status/{status}
async fn list_by_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(status): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Sale>>> {
    let status: SaleStatus = status.parse()?;
    let sales = state
        .db
        .sales()
        .list_by_status(status, owner_filter(&user), query.limit())
        .await?;
    Ok(Json(sales))
}

/// PATCH /sales/{id}/status - admin; cancelling a pending sale restores stock.
async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdate>,
) -> ApiResult<Json<Sale>> {
    let next: SaleStatus = payload.status.parse()?;
    let sale = state
        .db
        .sale_processor()
        .update_sale_status(&id, next)
        .await?;

    info!(sale_id = %sale.id, status = %sale.status, admin_id = %user.id, "Sale status changed");
    Ok(Json(sale))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_sale_decrements_stock_at_live_price() {
        let app = TestApp::new().await;
        app.stock(&app.branch.id, &app.coke.id, 5).await;

        let (status, sale) = app
            .post(
                &format!("/api/v1/branches/{}/sales", app.branch.id),
                Some(&app.customer_token),
                json!({ "items": [{ "productId": app.coke.id, "quantity": 2 }] }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sale["totalCents"], 13_000);
        assert_eq!(sale["status"], "pending");
        assert_eq!(sale["items"][0]["unitPriceCents"], 6_500);
        assert_eq!(app.quantity(&app.branch.id, &app.coke.id).await, 3);
    }

    #[tokio::test]
    async fn test_oversell_reports_availability() {
        let app = TestApp::new().await;
        app.stock(&app.branch.id, &app.coke.id, 5).await;

        let (status, body) = app
            .post(
                &format!("/api/v1/branches/{}/sales", app.branch.id),
                Some(&app.customer_token),
                json!({ "items": [{ "productId": app.coke.id, "quantity": 6 }] }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["details"]["available"], 5);
        assert_eq!(body["details"]["requested"], 6);
        assert_eq!(app.quantity(&app.branch.id, &app.coke.id).await, 5);
    }

    #[tokio::test]
    async fn test_admin_cancel_restores_stock() {
        let app = TestApp::new().await;
        app.stock(&app.branch.id, &app.coke.id, 5).await;

        let (_, sale) = app
            .post(
                &format!("/api/v1/branches/{}/sales", app.branch.id),
                Some(&app.customer_token),
                json!({ "items": [{ "productId": app.coke.id, "quantity": 4 }] }),
            )
            .await;
        let path = format!("/api/v1/sales/{}/status", sale["id"].as_str().unwrap());

        let (status, _) = app
            .patch(&path, Some(&app.customer_token), json!({ "status": "cancelled" }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, updated) = app
            .patch(&path, Some(&app.admin_token), json!({ "status": "cancelled" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "cancelled");
        assert_eq!(app.quantity(&app.branch.id, &app.coke.id).await, 5);

        let (status, _) = app
            .patch(&path, Some(&app.admin_token), json!({ "status": "paid" }))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_customer_pages_are_filtered_before_limit() {
        let app = TestApp::new().await;
        app.stock(&app.branch.id, &app.coke.id, 10).await;
        let path = format!("/api/v1/branches/{}/sales", app.branch.id);
        let line = json!({ "items": [{ "productId": app.coke.id, "quantity": 1 }] });

        let (_, own) = app.post(&path, Some(&app.customer_token), line.clone()).await;
        for _ in 0..3 {
            app.post(&path, Some(&app.admin_token), line.clone()).await;
        }

        let (status, page) = app
            .get(&format!("{}?limit=1", path), Some(&app.customer_token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page.as_array().unwrap().len(), 1);
        assert_eq!(page[0]["id"], own["id"]);

        let (_, page) = app
            .get("/api/v1/sales/status/pending?limit=1", Some(&app.customer_token))
            .await;
        assert_eq!(page.as_array().unwrap().len(), 1);
        assert_eq!(page[0]["id"], own["id"]);

        let (_, page) = app
            .get(&format!("{}?limit=2", path), Some(&app.admin_token))
            .await;
        assert_eq!(page.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_customers_only_see_their_sales() {
        let app = TestApp::new().await;
        app.stock(&app.branch.id, &app.coke.id, 5).await;

        let (_, sale) = app
            .post(
                &format!("/api/v1/branches/{}/sales", app.branch.id),
                Some(&app.admin_token),
                json!({ "items": [{ "productId": app.coke.id, "quantity": 1 }] }),
            )
            .await;

        let (_, mine) = app.get("/api/v1/sales", Some(&app.customer_token)).await;
        assert!(mine.as_array().unwrap().is_empty());

        let (status, _) = app
            .get(
                &format!("/api/v1/sales/{}", sale["id"].as_str().unwrap()),
                Some(&app.customer_token),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, pending) = app
            .get("/api/v1/sales/status/pending", Some(&app.admin_token))
            .await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let (status, _) = app
            .get("/api/v1/sales/status/refunded", Some(&app.admin_token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
