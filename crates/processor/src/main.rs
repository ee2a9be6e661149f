//! Processing-plane bootstrap (spec §4.G-§4.N, §10.4): poll `raw_logs`,
//! dedup, enrich, run detections, archive/index, dispatch alerts, and run
//! playbooks — one bounded worker pool per poll batch, alongside a minimal
//! `/health`+`/metrics` HTTP surface mirroring the ingestion plane's.

use axum::Router;
use siem_core::{Config, Event};
use std::net::SocketAddr;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod alerts;
mod archiver;
mod bus;
mod consumer;
mod dedup;
mod detection;
mod enricher;
mod health;
mod index_writer;
mod playbooks;
mod providers;
mod state;

use crate::consumer::Consumer;
use crate::state::ProcessorState;

/// Caps how many events are processed concurrently within one poll batch.
const MAX_CONCURRENT_EVENTS: usize = 16;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("starting siem-processor...");

    let config = Config::load()?;
    info!(environment = %config.app.environment, "configuration loaded");

    let metrics_port = config.metrics.port;
    let topic = config.event_bus.raw_logs_topic.clone();
    let group = config.event_bus.consumer_group.clone();
    let sweep_interval = std::time::Duration::from_secs(config.dedup.cache_cleanup_interval_seconds);

    let state = ProcessorState::new(config).await?;
    info!("processing-plane state initialized");

    let sweeper = state.dedup.spawn_sweeper(sweep_interval);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let (http_shutdown_tx, http_shutdown_rx) = tokio::sync::oneshot::channel();

    let consumer = Consumer::new(state.event_bus.clone(), topic, group);
    let pipeline_state = state.clone();
    let consumer_task = tokio::spawn(async move {
        consumer
            .run(shutdown_rx, move |event| {
                let pipeline_state = pipeline_state.clone();
                async move { process_event(pipeline_state, event).await }
            })
            .await;
    });

    let app = Router::new().merge(health::router()).with_state(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
    info!(%addr, "metrics/health surface listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let http_task = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = http_shutdown_rx.await;
            })
            .await;
    });

    shutdown_signal().await;
    info!("shutdown signal received, draining...");
    let _ = shutdown_tx.send(());
    let _ = http_shutdown_tx.send(());
    let _ = consumer_task.await;
    let _ = http_task.await;
    sweeper.abort();

    info!("siem-processor shutdown complete");
    Ok(())
}

/// Runs one event through the full pipeline: dedup gate, enrichment,
/// detection, archival, indexing, alert dispatch, playbook execution. A
/// duplicate event is dropped before any downstream work runs (spec §4.H).
async fn process_event(state: ProcessorState, event: Event) -> siem_core::Result<()> {
    if state.dedup.is_duplicate(&event) {
        state
            .metrics
            .dedup_events_total
            .with_label_values(&["duplicate"])
            .inc();
        return Ok(());
    }
    state
        .metrics
        .dedup_events_total
        .with_label_values(&["unique"])
        .inc();

    let enriched = state.enricher.enrich(event).await;
    let alerts = state.detection.evaluate(&enriched);

    let event_id = uuid::Uuid::new_v4().to_string();
    if state.config.archive.enabled {
        archiver::archive_if_eligible(
            state.object_store.as_ref(),
            &state.config.archive.bucket,
            &enriched,
            &event_id,
            &state.metrics,
        )
        .await;
    }

    if let Err(e) = state
        .index_writer
        .write_batch(&state.config.index.index_prefix, std::slice::from_ref(&enriched))
        .await
    {
        error!(error = %e, "failed to write event to the search index");
        state
            .metrics
            .index_write_failures_total
            .with_label_values(&[&state.config.index.index_prefix])
            .inc();
    }

    if !alerts.is_empty() {
        let mut tasks = JoinSet::new();
        for alert in alerts {
            let dispatcher = state.alerts.clone();
            let playbooks = state.playbooks.clone();
            tasks.spawn(async move {
                dispatcher.dispatch(&alert).await;
                playbooks.run(&alert).await;
            });
            if tasks.len() >= MAX_CONCURRENT_EVENTS {
                let _ = tasks.join_next().await;
            }
        }
        while tasks.join_next().await.is_some() {}
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siem_processor=debug,siem_core=debug".into()),
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

