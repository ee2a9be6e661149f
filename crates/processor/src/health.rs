//! `/health`, `/ready`, `/metrics` for the processing plane (spec §6,
//! §10.4 — "metrics exposed on both binaries"). Adapted from
//! `siem-collector::health`.

use crate::state::ProcessorState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub fn router() -> Router<ProcessorState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
}

async fn metrics(State(state): State<ProcessorState>) -> impl IntoResponse {
    state.metrics_registry.metrics_text()
}

async fn health_check(State(state): State<ProcessorState>) -> impl IntoResponse {
    let event_bus_up = probe_event_bus(&state).await;
    Json(json!({
        "status": "healthy",
        "service": "siem-processor",
        "version": env!("CARGO_PKG_VERSION"),
        "checks": { "event_bus": if event_bus_up { "up" } else { "down" } }
    }))
}

async fn readiness_check(State(state): State<ProcessorState>) -> impl IntoResponse {
    let event_bus_up = probe_event_bus(&state).await;
    let body = Json(json!({
        "status": if event_bus_up { "ready" } else { "not_ready" },
        "checks": { "event_bus": if event_bus_up { "up" } else { "down" } }
    }));

    if event_bus_up {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}

async fn probe_event_bus(state: &ProcessorState) -> bool {
    let mut conn = state.redis.clone();
    let ping = tokio::time::timeout(
        PROBE_TIMEOUT,
        redis::cmd("PING").query_async::<_, String>(&mut conn),
    )
    .await;
    matches!(ping, Ok(Ok(_)))
}
