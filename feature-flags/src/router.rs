use std::sync::Arc;

use axum::{http::Method, routing::get, Router};
use common_metrics::BuildError;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{self, DemoContent};
use crate::snapshot::FeatureFlagSnapshot;

#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<FeatureFlagSnapshot>,
    pub content: Arc<DemoContent>,
    pub gate_flag: Arc<str>,
}

async fn index() -> &'static str {
    "feature-flags"
}

async fn ok() -> &'static str {
    "ok"
}

pub fn router(
    snapshot: Arc<FeatureFlagSnapshot>,
    content: DemoContent,
    gate_flag: &str,
    metrics: bool,
) -> Result<Router, BuildError> {
    let state = AppState {
        snapshot,
        content: Arc::new(content),
        gate_flag: Arc::from(gate_flag),
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    let status_router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(ok))
        .route("/_liveness", get(ok));

    let flags_router = Router::new()
        .route("/flags", get(handlers::all_flags))
        .route("/flag-names", get(handlers::flag_names))
        .route(
            "/flags/:name",
            get(handlers::get_flag).put(handlers::override_flag),
        )
        .route("/hello", get(handlers::gated_hello))
        .route("/hellon", get(handlers::gated_hello))
        .route("/helloff", get(handlers::hello_off));

    let router = Router::new()
        .merge(status_router)
        .merge(flags_router)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Installing a global recorder when used as a library (during tests etc) does not work well.
    if metrics {
        common_metrics::with_metrics_routes(router, "feature-flags")
    } else {
        Ok(router)
    }
}
