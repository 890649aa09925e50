//! # HTTP Routes
//!
//! Every route lives under `/api/v1`. Each module exposes a `router()` and
//! marks its admin-only routes with [`require_admin`]; this module wraps the
//! protected set in [`require_auth`].
//!
//! ```text
//! /api/v1
//! ├── public      health, auth/register|login|logout, payments/mpesa/callback
//! └── require_auth
//!     ├── user    branches, products, sales, orders, payments, sync
//!     └── require_admin
//!                 branch/product writes, stock/adjust, restock, reports, alerts
//! ```

use axum::middleware;
use axum::Router;
use serde::Deserialize;

use crate::auth::require_auth;
use crate::state::AppState;

pub mod alerts;
pub mod auth;
pub mod branches;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reports;
pub mod restock;
pub mod sales;
pub mod stock;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

/// All `/api/v1` routes with their auth layers, still needing state.
pub fn api_router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .merge(health::router())
        .merge(auth::public_router())
        .merge(payments::callback_router());

    let protected = Router::new()
        .merge(auth::router())
        .merge(branches::router())
        .merge(products::router())
        .merge(stock::router())
        .merge(sales::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(restock::router())
        .merge(sync::router())
        .merge(reports::router())
        .merge(alerts::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public.merge(protected)
}

/// `?limit=` of list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 500)
    }
}
