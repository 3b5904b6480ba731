//! Destinations for status-change events.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::events::StatusChangeEvent;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned HTTP {0}")]
    Status(u16),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, event: &StatusChangeEvent) -> Result<(), SinkError>;
}

/// Writes every event to the log.
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, event: &StatusChangeEvent) -> Result<(), SinkError> {
        log::info!(
            "[{}] {} {}/{} -> {}/{}",
            event.run_id,
            event.run_kind,
            event.old_phase,
            event.old_status,
            event.new_phase,
            event.new_status
        );
        Ok(())
    }
}

/// POSTs each event as JSON to a fixed URL.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(url: impl Into<String>) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, event: &StatusChangeEvent) -> Result<(), SinkError> {
        let response = self.client.post(&self.url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        Ok(())
    }
}
