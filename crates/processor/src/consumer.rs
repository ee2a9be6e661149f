//! Event-bus consumer (spec §4.G): polls `raw_logs` under consumer group
//! `log_processor`, decompresses and decodes each record, and hands
//! decoded events to a callback. Offsets commit only after the callback
//! succeeds, giving the pipeline at-least-once delivery.

use flate2::read::GzDecoder;
use siem_core::{Error, ErrorCode, Event, EventBus, Result};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Mirrors the prototype's 1s poll timeout.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const POLL_BATCH_SIZE: usize = 100;

pub struct Consumer {
    bus: Arc<dyn EventBus>,
    topic: String,
    group: String,
}

impl Consumer {
    pub fn new(bus: Arc<dyn EventBus>, topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
            group: group.into(),
        }
    }

    /// Runs the poll loop until `shutdown` resolves. `handle` is awaited once
    /// per decoded event; its offset is committed only if `handle` returns
    /// `Ok`, so a processing failure leaves the record for redelivery.
    pub async fn run<F, Fut>(&self, mut shutdown: tokio::sync::oneshot::Receiver<()>, mut handle: F)
    where
        F: FnMut(Event) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        loop {
            if shutdown.try_recv().is_ok() {
                return;
            }

            let records = match self.bus.poll(&self.topic, &self.group, POLL_BATCH_SIZE).await {
                Ok(records) => records,
                Err(e) => {
                    error!(error = %e, topic = %self.topic, "event bus poll failed, retrying");
                    tokio::time::sleep(POLL_INTERVAL).await;
                    continue;
                }
            };

            if records.is_empty() {
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }

            let mut committed = Vec::with_capacity(records.len());
            for record in records {
                match decode(&record.payload, record.compressed) {
                    Ok(event) => match handle(event).await {
                        Ok(()) => committed.push(record.id),
                        Err(e) => warn!(record_id = %record.id, error = %e, "event processing failed, leaving uncommitted"),
                    },
                    Err(e) => {
                        error!(record_id = %record.id, error = %e, "failed to decode event, dropping");
                        committed.push(record.id);
                    }
                }
            }

            if let Err(e) = self.bus.commit(&self.topic, &self.group, &committed).await {
                error!(error = %e, topic = %self.topic, "failed to commit offsets");
            }
        }
    }
}

fn decode(payload: &[u8], compressed: bool) -> Result<Event> {
    let bytes = if compressed {
        let mut decoder = GzDecoder::new(payload);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::new(ErrorCode::InternalError, format!("failed to gunzip event payload: {e}")))?;
        out
    } else {
        payload.to_vec()
    };
    serde_json::from_slice(&bytes).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use siem_core::Severity;
    use std::io::Write;

    fn sample_event() -> Event {
        Event {
            source: "test".to_string(),
            event_type: "authentication".to_string(),
            timestamp: None,
            severity: Severity::Info,
            vendor: None,
            data: serde_json::json!({ "status": "success" }),
            metadata: Default::default(),
            enriched: None,
        }
    }

    #[test]
    fn decodes_uncompressed_payload() {
        let event = sample_event();
        let payload = serde_json::to_vec(&event).unwrap();
        let decoded = decode(&payload, false).unwrap();
        assert_eq!(decoded.event_type, "authentication");
    }

    #[test]
    fn decodes_gzip_compressed_payload() {
        let event = sample_event();
        let payload = serde_json::to_vec(&event).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = decode(&compressed, true).unwrap();
        assert_eq!(decoded.source, "test");
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(decode(b"not json", false).is_err());
    }
}
