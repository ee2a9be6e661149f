//! Ingestion-plane HTTP server (spec §4.A-§4.F, §6).
//!
//! Middleware stack and bootstrap shape are ported from the donor's
//! `erp-api::main` — security headers, request id, tracing, compression,
//! CORS, in that order — with the donor's tenant-context layer and
//! Postgres-specific bootstrap (migrations, `DatabasePool`) dropped since
//! this pipeline has neither.

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use siem_core::Config;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod error;
mod handlers;
mod health;
mod middleware;
mod parsers;
mod producer;
mod state;
mod users;

use crate::middleware::{
    auth::{auth_middleware, require_scope},
    request_id::request_id_middleware,
    security_headers::security_headers_middleware,
};
use crate::state::AppState;
use siem_core::Scope;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("starting siem-collector...");

    let config = Config::load()?;
    info!(environment = %config.app.environment, "configuration loaded");

    let port = config.server.port;
    let state = AppState::new(config).await?;
    info!("ingestion-plane state initialized");

    let app = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("siem-collector shutdown complete");
    Ok(())
}

fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = build_cors_layer(&state.config.cors)?;

    let protected = handlers::ingest::router()
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(axum::middleware::from_fn(require_scope(Scope::LogsWrite)));

    let router = Router::new()
        .merge(handlers::auth::router())
        .merge(health::router())
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(security_headers_middleware))
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
        .fallback(handler_404);

    Ok(router)
}

fn build_cors_layer(cors_config: &siem_core::config::CorsConfig) -> anyhow::Result<CorsLayer> {
    let mut cors = CorsLayer::new();

    if cors_config.frontend_url == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origin: HeaderValue = cors_config.frontend_url.parse()?;
        cors = cors.allow_origin(origin);
    }

    let methods: Result<Vec<Method>, _> =
        cors_config.allowed_methods.iter().map(|m| m.parse()).collect();
    cors = cors.allow_methods(methods?);

    let headers: Result<Vec<HeaderName>, _> =
        cors_config.allowed_headers.iter().map(|h| h.parse()).collect();
    cors = cors.allow_headers(headers?);

    cors = cors
        .allow_credentials(cors_config.allow_credentials)
        .max_age(std::time::Duration::from_secs(cors_config.max_age_seconds));

    Ok(cors)
}

async fn handler_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "resource not found" })),
    )
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siem_collector=debug,siem_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl+c"),
        _ = terminate => info!("received terminate signal"),
    }
}
