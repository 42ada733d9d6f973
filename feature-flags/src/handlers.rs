use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;

use crate::api::{DemoValueResponse, FlagResponse, OverrideRequest};
use crate::router::AppState;

const FLAG_ENABLED_STATUS: &str = "the feature flag is enabled";
const FLAG_DISABLED_STATUS: &str = "the feature flag is not enabled";

/// Values served by the gated content endpoints.
#[derive(Debug, Clone)]
pub struct DemoContent {
    pub question: String,
    pub answer: String,
}

pub async fn all_flags(State(state): State<AppState>) -> Json<BTreeMap<String, bool>> {
    Json(state.snapshot.all_flags().into_iter().collect())
}

pub async fn flag_names(State(state): State<AppState>) -> Json<Vec<String>> {
    let mut names: Vec<String> = state.snapshot.all_names().into_iter().collect();
    names.sort();
    Json(names)
}

pub async fn get_flag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<FlagResponse> {
    let enabled = state.snapshot.is_enabled(&name);
    Json(FlagResponse { name, enabled })
}

pub async fn override_flag(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<OverrideRequest>,
) -> Json<FlagResponse> {
    state.snapshot.override_flag(&name, request.enabled);
    tracing::info!(flag = name.as_str(), enabled = request.enabled, "overrode feature flag");
    metrics::counter!("feature_flag_overrides_total").increment(1);

    Json(FlagResponse {
        name,
        enabled: request.enabled,
    })
}

/// Serves the enabled or disabled variant depending on the gate flag.
pub async fn gated_hello(State(state): State<AppState>) -> Json<DemoValueResponse> {
    if state.snapshot.is_enabled(&state.gate_flag) {
        hello_enabled(&state.content)
    } else {
        hello_disabled(&state.content)
    }
}

pub async fn hello_off(State(state): State<AppState>) -> Json<DemoValueResponse> {
    hello_disabled(&state.content)
}

fn hello_enabled(content: &DemoContent) -> Json<DemoValueResponse> {
    demo_value(content, FLAG_ENABLED_STATUS)
}

fn hello_disabled(content: &DemoContent) -> Json<DemoValueResponse> {
    demo_value(content, FLAG_DISABLED_STATUS)
}

fn demo_value(content: &DemoContent, status: &str) -> Json<DemoValueResponse> {
    Json(DemoValueResponse {
        question: content.question.clone(),
        answer: content.answer.clone(),
        feature_flag_status: status.to_owned(),
    })
}
