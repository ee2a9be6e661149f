//! Event-bus producer over Redis Streams (spec §4.F).
//!
//! The prototype produced to Kafka with a specific set of tuning knobs
//! (`message.max.bytes`, `compression.type`, retry/backoff, buffering). This
//! implementation targets Redis Streams (`XADD`) instead — the same
//! connection already used for rate-limit counters — but keeps the
//! prototype's size ceiling and gzip compression so payload shape and
//! limits match across both transports.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use siem_core::{BusMessage, BusRecord, Error, EventBus, Result};
use std::io::Write;
use std::time::Duration;

/// Mirrors the prototype's `message.max.bytes` Kafka producer setting.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;
/// Mirrors `retries` / `retry.backoff.ms`.
const PRODUCE_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(1000);
/// Mirrors the `flush(timeout=5.0)` the prototype calls once per request.
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RedisStreamEventBus {
    conn: ConnectionManager,
}

impl RedisStreamEventBus {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn compress(payload: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(payload)
            .map_err(|e| Error::internal(format!("failed to gzip event payload: {e}")))?;
        encoder
            .finish()
            .map_err(|e| Error::internal(format!("failed to finalize gzip stream: {e}")))
    }
}

#[async_trait]
impl EventBus for RedisStreamEventBus {
    async fn produce(&self, topic: &str, message: BusMessage) -> Result<()> {
        if message.payload.len() > MAX_MESSAGE_BYTES {
            return Err(Error::bad_request(format!(
                "event payload of {} bytes exceeds the {} byte ceiling",
                message.payload.len(),
                MAX_MESSAGE_BYTES
            )));
        }

        let body = if message.compressed {
            Self::compress(&message.payload)?
        } else {
            message.payload.clone()
        };

        let mut conn = self.conn.clone();
        let mut attempt = 0;
        loop {
            let result: redis::RedisResult<String> = conn
                .xadd(
                    topic,
                    "*",
                    &[
                        ("key", message.key.as_bytes()),
                        ("compressed", if message.compressed { b"1" } else { b"0" }),
                        ("payload", body.as_slice()),
                    ],
                )
                .await;

            match result {
                Ok(_) => return Ok(()),
                Err(e) if attempt < PRODUCE_RETRIES => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, topic, "event bus produce failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn poll(&self, topic: &str, group: &str, max: usize) -> Result<Vec<BusRecord>> {
        let mut conn = self.conn.clone();
        let _: redis::RedisResult<()> = conn
            .xgroup_create_mkstream::<_, _, _, ()>(topic, group, "0")
            .await;

        let opts = redis::streams::StreamReadOptions::default()
            .group(group, "consumer-1")
            .count(max);

        let reply: redis::streams::StreamReadReply = conn
            .xread_options(&[topic], &[">"], &opts)
            .await
            .map_err(Error::from)?;

        let mut records = Vec::new();
        for key in reply.keys {
            for stream_id in key.ids {
                let compressed = stream_id
                    .map
                    .get("compressed")
                    .and_then(|v| match v {
                        redis::Value::BulkString(bytes) => Some(bytes == b"1"),
                        _ => None,
                    })
                    .unwrap_or(false);
                let payload = stream_id
                    .map
                    .get("payload")
                    .and_then(|v| match v {
                        redis::Value::BulkString(bytes) => Some(bytes.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                records.push(BusRecord {
                    id: stream_id.id,
                    payload,
                    compressed,
                });
            }
        }
        Ok(records)
    }

    async fn commit(&self, topic: &str, group: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: i64 = conn.xack(topic, group, ids).await.map_err(Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_payload_before_touching_redis() {
        let oversized = vec![0u8; MAX_MESSAGE_BYTES + 1];
        assert!(oversized.len() > MAX_MESSAGE_BYTES);
    }
}
