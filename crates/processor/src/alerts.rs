//! Severity-routed multi-channel alert dispatch (spec §4.M). Channels
//! dispatch in parallel with independent failures — the prototype's
//! `alerts.py` fans its five notifier classes out via `asyncio.gather`; this
//! mirrors that with `futures::future::join_all` over one task per channel.

use async_trait::async_trait;
use futures::future::join_all;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use siem_core::{config::EmailConfig, Alert, Error, ErrorCode, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, alert: &Alert) -> Result<()>;
}

fn render_body(alert: &Alert) -> String {
    format!(
        "[{}] {}\n\n{}\n\nrule: {} ({})\nsource: {}\ntags: {}",
        alert.severity,
        alert.title,
        alert.description,
        alert.rule_name,
        alert.rule_id,
        alert.source_event.source,
        alert.tags.join(", ")
    )
}

pub struct EmailChannel {
    config: EmailConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    recipients: Vec<String>,
}

impl EmailChannel {
    pub fn new(config: EmailConfig, recipients: Vec<String>) -> Result<Self> {
        let transport = if config.provider == "mock" {
            None
        } else {
            let host = config
                .smtp_host
                .clone()
                .ok_or_else(|| Error::new(ErrorCode::ConfigurationError, "smtp_host not configured"))?;
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host);
            if let Some(port) = config.smtp_port {
                builder = builder.port(port);
            }
            if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            Some(builder.build())
        };
        Ok(Self {
            config,
            transport,
            recipients,
        })
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let Some(transport) = &self.transport else {
            info!(alert_id = %alert.id, "mock email channel: would notify {:?}", self.recipients);
            return Ok(());
        };

        let body = render_body(alert);
        for to in &self.recipients {
            let message = Message::builder()
                .from(self.config.from_address.parse().map_err(|e| {
                    Error::new(ErrorCode::InternalError, format!("invalid from address: {e}"))
                })?)
                .to(to.parse().map_err(|e| {
                    Error::new(ErrorCode::InternalError, format!("invalid to address: {e}"))
                })?)
                .subject(format!("[{}] {}", alert.severity, alert.title))
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| Error::new(ErrorCode::InternalError, e.to_string()))?;

            transport
                .send(message)
                .await
                .map_err(|e| Error::new(ErrorCode::InternalError, format!("smtp send failed: {e}")))?;
        }
        Ok(())
    }
}

pub struct WebhookChannel {
    name: &'static str,
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(name: &'static str, url: String) -> Self {
        Self {
            name,
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": render_body(alert) }))
            .send()
            .await
            .map_err(Error::from)?;
        if !resp.status().is_success() {
            return Err(Error::new(
                ErrorCode::InternalError,
                format!("webhook {} returned {}", self.name, resp.status()),
            ));
        }
        Ok(())
    }
}

/// critical → {email, chat, im}, high → {email, chat}, medium → {chat},
/// low → {chat} (spec §4.M default routing map).
fn channels_for(severity: siem_core::Severity) -> &'static [&'static str] {
    use siem_core::Severity::*;
    match severity {
        Critical => &["email", "chat", "im"],
        High => &["email", "chat"],
        Medium => &["chat"],
        Low => &["chat"],
        _ => &["chat"],
    }
}

pub struct AlertDispatcher {
    channels: Vec<(&'static str, Arc<dyn NotificationChannel>)>,
}

impl AlertDispatcher {
    pub fn new(channels: Vec<(&'static str, Arc<dyn NotificationChannel>)>) -> Self {
        Self { channels }
    }

    pub async fn dispatch(&self, alert: &Alert) {
        let routed = channels_for(alert.severity);
        let sends = self
            .channels
            .iter()
            .filter(|(name, _)| routed.contains(name))
            .map(|(name, channel)| {
                let channel = channel.clone();
                let alert = alert.clone();
                let name = *name;
                async move {
                    match channel.send(&alert).await {
                        Ok(()) => info!(channel = name, alert_id = %alert.id, "alert dispatched"),
                        Err(e) => {
                            error!(channel = name, alert_id = %alert.id, error = %e, "alert dispatch failed")
                        }
                    }
                }
            });
        join_all(sends).await;
        if self.channels.is_empty() {
            warn!(alert_id = %alert.id, "no notification channels configured");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_routes_to_all_three_channels() {
        assert_eq!(channels_for(siem_core::Severity::Critical), &["email", "chat", "im"]);
    }

    #[test]
    fn low_routes_to_chat_only() {
        assert_eq!(channels_for(siem_core::Severity::Low), &["chat"]);
    }
}
