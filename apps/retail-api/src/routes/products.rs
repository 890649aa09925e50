//! Product catalog routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use retail_core::{Product, StockView};
use retail_db::repository::product::{NewProduct, ProductUpdate};

use crate::auth::require_admin;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let read_routes = Router::new()
        .route("/products", get(list))
        .route("/products/{id}", get(get_by_id))
        .route("/products/{id}/stock", get(stock))
        .route("/products/brand/{brand}", get(by_brand));

    let manage_routes = Router::new()
        .route("/products", post(create))
        .route("/products/{id}", put(update).delete(delete))
        .route_layer(middleware::from_fn(require_admin));

    read_routes.merge(manage_routes)
}

/// GET /products
async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.products().list().await?))
}

/// GET /products/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    let product = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &id))?;
    Ok(Json(product))
}

/// GET /products/brand/{brand} - case-insensitive.
async fn by_brand(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.products().list_by_brand(&brand).await?))
}

/// GET /products/{id}/stock - stock of the product in every branch.
async fn stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<StockView>>> {
    if state.db.products().get_by_id(&id).await?.is_none() {
        return Err(ApiError::not_found("Product", &id));
    }
    Ok(Json(state.db.stock().product_stock(&id).await?))
}

/// POST /products
async fn create(
    State(state): State<AppState>,
    Json(payload): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.db.products().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().update(&id, &payload).await?))
}

/// DELETE /products/{id}
async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.db.products().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
