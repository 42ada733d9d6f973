use std::sync::Arc;

use axum::{http::Method, routing::get, Router};
use common_metrics::BuildError;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::dispatcher::NotificationDispatcher;
use crate::handlers;

async fn index() -> &'static str {
    "sms-sender"
}

async fn ok() -> &'static str {
    "ok"
}

pub fn router(
    dispatcher: Arc<NotificationDispatcher>,
    metrics: bool,
) -> Result<Router, BuildError> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    let status_router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(ok))
        .route("/_liveness", get(ok));

    let sms_router = Router::new()
        .route("/sms", get(handlers::send_sms))
        .route("/asyncsms", get(handlers::send_sms_async))
        .route("/groupsms", get(handlers::send_group_sms));

    let router = Router::new()
        .merge(status_router)
        .merge(sms_router)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(dispatcher);

    // Installing a global recorder when used as a library (during tests etc) does not work well.
    if metrics {
        common_metrics::with_metrics_routes(router, "sms-sender")
    } else {
        Ok(router)
    }
}
