//! `/health` and `/ready` (spec §6), adapted from the donor's
//! `erp-api::health` — the donor's Postgres `check_health` call is replaced
//! by the event-bus/rate-limit-KV probe this spec's §6 calls for.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics_registry.metrics_text()
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (event_bus_up, rate_limit_kv_up) = probe_downstreams(&state).await;

    Json(json!({
        "status": "healthy",
        "service": "siem-collector",
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "event_bus": if event_bus_up { "up" } else { "down" },
            "rate_limit_kv": if rate_limit_kv_up { "up" } else { "down" },
        }
    }))
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let (event_bus_up, rate_limit_kv_up) = probe_downstreams(&state).await;
    let ready = event_bus_up && rate_limit_kv_up;

    let body = Json(json!({
        "status": if ready { "ready" } else { "not_ready" },
        "checks": {
            "event_bus": if event_bus_up { "up" } else { "down" },
            "rate_limit_kv": if rate_limit_kv_up { "up" } else { "down" },
        }
    }));

    if ready {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}

/// Both the rate-limiter and the Redis-Streams-backed event bus sit behind
/// the same connection, so liveness is one `PING` probed with a deadline.
async fn probe_downstreams(state: &AppState) -> (bool, bool) {
    let mut conn = state.redis.clone();
    let ping = tokio::time::timeout(
        PROBE_TIMEOUT,
        redis::cmd("PING").query_async::<_, String>(&mut conn),
    )
    .await;
    let up = matches!(ping, Ok(Ok(_)));
    (up, up)
}
