//! Event-bus transport (spec §4.G), mirroring the ingestion plane's own
//! `RedisStreamEventBus` (`siem-collector::producer`) so both binaries speak
//! the same Redis Streams wire format against the same topic.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use siem_core::{BusMessage, BusRecord, Error, EventBus, Result};
use std::io::Write;

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
        let body = if message.compressed {
            Self::compress(&message.payload)?
        } else {
            message.payload.clone()
        };

        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(
                topic,
                "*",
                &[
                    ("key", message.key.as_bytes()),
                    ("compressed", if message.compressed { b"1" } else { b"0" }),
                    ("payload", body.as_slice()),
                ],
            )
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn poll(&self, topic: &str, group: &str, max: usize) -> Result<Vec<BusRecord>> {
        let mut conn = self.conn.clone();
        let _: redis::RedisResult<()> = conn
            .xgroup_create_mkstream::<_, _, _, ()>(topic, group, "0")
            .await;

        let opts = redis::streams::StreamReadOptions::default()
            .group(group, "processor-1")
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
