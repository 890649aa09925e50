//! Request logging middleware.
//!
//! One line per request with method, matched route, status and latency.
//! The level follows the status class: 5xx → error, 4xx → warn, else info.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{error, info, warn};

pub async fn request_logger(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        error!(%method, %path, status, latency_ms, "Request failed");
    } else if response.status().is_client_error() {
        warn!(%method, %path, status, latency_ms, "Request rejected");
    } else {
        info!(%method, %path, status, latency_ms, "Request completed");
    }

    response
}
