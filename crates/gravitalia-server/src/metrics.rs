//! Request counters exposed on `GET /metrics` in the OpenMetrics text format.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use tracing::warn;

const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Classic Prometheus client buckets, in seconds.
const BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    requests: Counter,
    duration: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let requests = Counter::default();
        // The encoder appends `_total` to counters.
        registry.register(
            "http_requests",
            "Tracks the number of HTTP requests",
            requests.clone(),
        );
        let duration = Histogram::new(BUCKETS.into_iter());
        registry.register(
            "http_request_duration_seconds",
            "Tracks the latencies for HTTP requests",
            duration.clone(),
        );

        Self {
            registry: Arc::new(registry),
            requests,
            duration,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

async fn track(State(metrics): State<Metrics>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    metrics.requests.inc();
    metrics.duration.observe(start.elapsed().as_secs_f64());
    response
}

async fn export(State(metrics): State<Metrics>) -> Response {
    let mut body = String::new();
    if let Err(e) = encode(&mut body, &metrics.registry) {
        warn!("Cannot encode metrics: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

/// Adds `GET /metrics` and times every request going through `app`.
pub fn instrument(app: Router, metrics: Metrics) -> Router {
    app.route("/metrics", get(export).with_state(metrics.clone()))
        .layer(middleware::from_fn_with_state(metrics, track))
}
