//! # Retail API
//!
//! REST server for a multi-branch retail business: catalog, branch stock,
//! sales, M-Pesa orders, HQ restocking, offline till sync and reports.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Retail API Server                              │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Auth          │  │  Catalog/Stock │  │  Sales & Orders            ││
//! │  │                │  │                │  │                            ││
//! │  │ • register     │  │ • branches     │  │ • branch sales             ││
//! │  │ • login/logout │  │ • products     │  │ • orders + M-Pesa          ││
//! │  │ • me           │  │ • stock/adjust │  │ • payment callback         ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Restock       │  │  Offline Sync  │  │  Reports & Alerts          ││
//! │  │                │  │                │  │                            ││
//! │  │ • HQ → branch  │  │ • batch upload │  │ • sales/revenue/daily      ││
//! │  │ • bulk/history │  │ • resolve      │  │ • low-stock/critical       ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │  SQLite (retail-db) │ JWT + argon2 │ CORS │ request logging       │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! See [`config`] for the environment variables.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod mpesa;
pub mod routes;
pub mod state;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// The complete application: `/api/v1` routes, logging, tracing and CORS.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .nest("/api/v1", routes::api_router(&state))
        .layer(axum::middleware::from_fn(middleware::request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins = config.cors_origin_list();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}
