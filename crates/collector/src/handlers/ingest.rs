//! `/ingest`, `/ingest/batch`, `/ingest/raw` (spec §4.E), with every
//! rate-limit dimension from spec §4.C enforced per request.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use siem_core::{
    BusMessage, Error, Event, RequestContext, MAX_BATCH_BYTES, MAX_BATCH_EVENTS, MIN_BATCH_EVENTS,
};
use validator::Validate;

const RAW_LOGS_TOPIC: &str = "raw_logs";

const IP_RAW_LIMIT_PER_MIN: u32 = 100;
const IP_TYPED_LIMIT_PER_MIN: u32 = 1000;
const IP_BATCH_LIMIT_PER_MIN: u32 = 100;

/// Which of the three ingestion shapes a request took (spec §4.C) — each
/// carries its own per-client-IP rate-limit ceiling.
#[derive(Clone, Copy)]
enum IngestKind {
    Single,
    Raw,
    Batch,
}

impl IngestKind {
    fn ip_limit(self) -> u32 {
        match self {
            IngestKind::Single => IP_TYPED_LIMIT_PER_MIN,
            IngestKind::Raw => IP_RAW_LIMIT_PER_MIN,
            IngestKind::Batch => IP_BATCH_LIMIT_PER_MIN,
        }
    }

    fn label(self) -> &'static str {
        match self {
            IngestKind::Single => "ip_ingest_single",
            IngestKind::Raw => "ip_ingest_raw",
            IngestKind::Batch => "ip_ingest_batch",
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ingest", post(ingest_single))
        .route("/ingest/batch", post(ingest_batch))
        .route("/ingest/raw", post(ingest_raw))
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    source: String,
}

#[derive(Debug, Deserialize)]
pub struct RawLogRequest {
    pub source: String,
    pub log_line: String,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchLogEvents {
    pub events: Vec<Event>,
}

#[derive(Debug, Serialize)]
struct BatchEventResult {
    index: usize,
    status: &'static str,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    total: usize,
    accepted: usize,
    rejected: usize,
    results: Vec<BatchEventResult>,
}

async fn ingest_single(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(event): Json<Event>,
) -> Result<impl IntoResponse, ApiError> {
    let username = principal(&ctx)?;
    check_rate_limits(&state, &ctx, &username, IngestKind::Single, 1).await?;

    let event = validate_and_stamp(event)?;
    let source = event.source.clone();
    publish(&state, event).await?;

    state
        .metrics
        .ingestion_requests_total
        .with_label_values(&["ingest", "200"])
        .inc();

    Ok(Json(IngestResponse { status: "accepted", source }))
}

async fn ingest_raw(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<RawLogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = principal(&ctx)?;
    check_rate_limits(&state, &ctx, &username, IngestKind::Raw, 1).await?;

    let data = state
        .parser
        .parse_line(&payload.log_line, payload.format.as_deref())
        .map_err(|e| Error::bad_request(format!("failed to parse log line: {e}")))?;
    let data = match data {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    let event = state.parser.create_event(data, payload.source.clone(), "log");

    let event = validate_and_stamp(event)?;
    let source = event.source.clone();
    publish(&state, event).await?;

    state
        .metrics
        .ingestion_requests_total
        .with_label_values(&["ingest_raw", "200"])
        .inc();

    Ok(Json(IngestResponse { status: "accepted", source }))
}

async fn ingest_batch(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(batch): Json<BatchLogEvents>,
) -> Result<impl IntoResponse, ApiError> {
    let events = batch.events;
    let username = principal(&ctx)?;

    if events.len() < MIN_BATCH_EVENTS || events.len() > MAX_BATCH_EVENTS {
        return Err(Error::validation(format!(
            "batch must contain between {MIN_BATCH_EVENTS} and {MAX_BATCH_EVENTS} events"
        ))
        .into());
    }
    let total_bytes: usize = events.iter().map(Event::data_size).sum();
    if total_bytes > MAX_BATCH_BYTES {
        return Err(Error::validation(format!(
            "batch payload of {total_bytes} bytes exceeds the {MAX_BATCH_BYTES} byte ceiling"
        ))
        .into());
    }

    check_rate_limits(&state, &ctx, &username, IngestKind::Batch, events.len() as u32).await?;

    let mut results = Vec::with_capacity(events.len());
    let mut accepted = 0usize;

    for (index, event) in events.into_iter().enumerate() {
        match validate_and_stamp(event) {
            Ok(event) => match publish(&state, event).await {
                Ok(()) => {
                    accepted += 1;
                    results.push(BatchEventResult { index, status: "accepted", error: None });
                }
                Err(e) => {
                    results.push(BatchEventResult {
                        index,
                        status: "rejected",
                        error: Some(e.to_string()),
                    });
                }
            },
            Err(e) => {
                results.push(BatchEventResult {
                    index,
                    status: "rejected",
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let total = results.len();
    state
        .metrics
        .ingestion_requests_total
        .with_label_values(&["ingest_batch", "200"])
        .inc();

    Ok(Json(BatchResponse {
        total,
        accepted,
        rejected: total - accepted,
        results,
    }))
}

fn principal(ctx: &RequestContext) -> Result<String, ApiError> {
    ctx.username
        .clone()
        .ok_or_else(|| Error::unauthorized("request is missing an authenticated principal").into())
}

fn validate_and_stamp(event: Event) -> Result<Event, Error> {
    event
        .validate()
        .map_err(|e| Error::validation(format!("event failed validation: {e}")))?;
    if event.data_size() > siem_core::MAX_EVENT_DATA_BYTES {
        return Err(Error::validation(format!(
            "event data of {} bytes exceeds the {} byte ceiling",
            event.data_size(),
            siem_core::MAX_EVENT_DATA_BYTES
        )));
    }
    Ok(event.with_default_timestamp())
}

async fn publish(state: &AppState, event: Event) -> Result<(), Error> {
    let payload = serde_json::to_vec(&event)
        .map_err(|e| Error::internal(format!("failed to serialize event: {e}")))?;

    state
        .event_bus
        .produce(
            RAW_LOGS_TOPIC,
            BusMessage {
                key: event.source.clone(),
                payload,
                compressed: true,
            },
        )
        .await
}

/// Enforces every rate-limit dimension from spec §4.C independently; the
/// first exhausted dimension wins the rejection.
async fn check_rate_limits(
    state: &AppState,
    ctx: &RequestContext,
    username: &str,
    kind: IngestKind,
    event_count: u32,
) -> Result<(), ApiError> {
    let ip = ctx.source_ip.as_deref().unwrap_or("unknown");

    let ip_key = format!("ingest_rate_ip:{ip}:{}", kind.label());
    reject_if_exceeded(state, kind.label(), &ip_key, kind.ip_limit()).await?;

    let user_limit = siem_core::config::PerUserLimits::rate_limit(username, 1000);
    let user_key = format!("ingest_rate:{username}");
    reject_if_exceeded(state, "principal_ingest", &user_key, user_limit).await?;

    if matches!(kind, IngestKind::Batch) {
        let batch_limit = siem_core::config::PerUserLimits::batch_limit(username, 100);
        let batch_key = format!("batch_rate:{username}");
        reject_if_exceeded(state, "principal_batch", &batch_key, batch_limit).await?;

        let event_limit = siem_core::config::PerUserLimits::event_limit(username, 10000);
        let event_key = format!("event_count:{username}");
        reject_if_count_exceeded(state, "principal_event_count", &event_key, event_limit, event_count)
            .await?;
    }

    Ok(())
}

async fn reject_if_exceeded(
    state: &AppState,
    dimension: &str,
    key: &str,
    limit: u32,
) -> Result<(), ApiError> {
    let decision = state.rate_limits.check(key, limit, 60).await?;
    if !decision.allowed {
        state
            .metrics
            .rate_limit_rejections_total
            .with_label_values(&[dimension])
            .inc();
        return Err(Error::rate_limited(format!(
            "rate limit exceeded for {dimension} (limit={}, remaining={}, reset={}s)",
            decision.limit, decision.remaining, decision.reset_seconds
        ))
        .add_metadata("rate_limit_limit", decision.limit.into())
        .add_metadata("rate_limit_remaining", decision.remaining.into())
        .add_metadata("rate_limit_reset", decision.reset_seconds.into())
        .into());
    }
    Ok(())
}

async fn reject_if_count_exceeded(
    state: &AppState,
    dimension: &str,
    key: &str,
    limit: u32,
    increment_by: u32,
) -> Result<(), ApiError> {
    // Event-count limits admit a variable increment per request, unlike the
    // fixed-1-per-call dimensions above, so they bypass `RateLimitStore`'s
    // single-increment contract and talk to Redis directly (spec §4.C).
    let mut conn = state.redis.clone();
    let count: u32 = redis::AsyncCommands::incr(&mut conn, key, increment_by)
        .await
        .map_err(Error::from)?;
    let ttl: i64 = redis::AsyncCommands::ttl(&mut conn, key).await.unwrap_or(-1);
    if ttl == -1 {
        let _: std::result::Result<(), _> = redis::AsyncCommands::expire(&mut conn, key, 60).await;
    }

    if count > limit {
        state
            .metrics
            .rate_limit_rejections_total
            .with_label_values(&[dimension])
            .inc();
        let reset = if ttl >= 0 { ttl } else { 60 };
        return Err(Error::rate_limited(format!(
            "rate limit exceeded for {dimension} (limit={limit}, count={count})"
        ))
        .add_metadata("rate_limit_limit", limit.into())
        .add_metadata("rate_limit_remaining", 0u32.into())
        .add_metadata("rate_limit_reset", reset.into())
        .into());
    }
    Ok(())
}
