use std::future::ready;
use std::time::Instant;

use axum::{
    body::Body, extract::MatchedPath, http::Request, middleware::Next, response::IntoResponse,
    routing::get, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub use metrics_exporter_prometheus::BuildError;

/// Histogram buckets, from 5ms up to the default provider timeout and beyond.
const LATENCY_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets(LATENCY_SECONDS)?
        .install_recorder()
}

/// Mount `/metrics` on the router and wrap it with [`track_metrics`].
///
/// Installing the global recorder more than once per process fails, so callers only do this
/// when exporting is enabled in their config. Tests leave it off.
pub fn with_metrics_routes(router: Router, service: &'static str) -> Result<Router, BuildError> {
    let recorder_handle = setup_metrics_recorder()?;
    metrics::gauge!("service_info", "service" => service).set(1.0);

    Ok(router
        .route("/metrics", get(move || ready(recorder_handle.render())))
        .layer(axum::middleware::from_fn(track_metrics)))
}

/// Middleware recording a request counter and a latency histogram per matched route.
pub async fn track_metrics(req: Request<Body>, next: Next) -> impl IntoResponse {
    let start = Instant::now();

    // Route template, not the raw path: `/flags/:name` is unbounded.
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched_path) => matched_path.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };
    let method = req.method().to_string();

    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("path", path),
        ("status", response.status().as_u16().to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_requests_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());

    response
}
