use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::collections::HashMap;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let response = RootResponse {
        message: state.settings().api().project_name.clone(),
        version: state.settings().api().version.clone(),
    };

    Json(response)
}

pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut status = "healthy".to_string();
    let mut components = HashMap::new();

    match tokio::fs::metadata(state.tests().root()).await {
        Ok(meta) if meta.is_dir() => {
            components.insert("tests_root".to_string(), "healthy".to_string());
        }
        Ok(_) => {
            components.insert("tests_root".to_string(), "unhealthy: not a directory".to_string());
            status = "unhealthy".to_string();
        }
        Err(err) => {
            components.insert("tests_root".to_string(), format!("unhealthy: {err}"));
            status = "unhealthy".to_string();
        }
    }

    // Persistence is optional, so a missing configuration never degrades the
    // health verdict.
    let supabase = if state.supabase().is_some() { "configured" } else { "not_configured" };
    components.insert("supabase".to_string(), supabase.to_string());

    Json(HealthResponse { service: "tryout-api".to_string(), status, components })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
