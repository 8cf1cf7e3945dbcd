//! Per-request latency and error observation.

use axum::{extract::MatchedPath, middleware::Next, response::Response};
use std::sync::Arc;
use std::time::Instant;

use crate::domains::automation::MetricsStore;

/// Records response time and error outcome per matched route template.
pub async fn metrics_middleware(
    metrics: Arc<MetricsStore>,
    request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    let is_error = response.status().is_server_error() || response.status().is_client_error();
    metrics.record_response(&endpoint, duration_ms, is_error);
    response
}
