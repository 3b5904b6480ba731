//! Engine configuration
//!
//! Values come from CLI flags or their environment variables (see `main.rs`):
//! - `ENGINE_PORT`: HTTP port (default: 7730)
//! - `DISPATCH_POLL_WINDOW_MS`: long-poll window (default: 30000)
//! - `DISPATCH_RETRY_INTERVAL_MS`: sleep between re-queries (default: 1000)
//! - `AGENT_HEARTBEAT_INTERVAL_MS`: agent counts as online within this (default: 60000)
//! - `EVENT_BUS_CAPACITY`: status-change bus size (default: 256)
//! - `EVENT_WEBHOOK_URL`: optional status-change webhook
//! - `ENGINE_WORKERS`: actix worker count (default: 10)

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    pub poll_window_ms: u64,
    pub poll_retry_interval_ms: u64,
    pub agent_heartbeat_interval_ms: u64,
    pub event_bus_capacity: usize,
    pub event_webhook_url: Option<String>,
    pub workers: usize,
}

impl EngineConfig {
    pub const DEFAULT_PORT: u16 = 7730;
    pub const DEFAULT_POLL_WINDOW_MS: u64 = 30_000;
    pub const DEFAULT_POLL_RETRY_INTERVAL_MS: u64 = 1_000;
    pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 60_000;
    pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 256;
    pub const DEFAULT_WORKERS: usize = 10;

    pub fn poll_window(&self) -> Duration {
        Duration::from_millis(self.poll_window_ms)
    }

    pub fn poll_retry_interval(&self) -> Duration {
        Duration::from_millis(self.poll_retry_interval_ms)
    }

    pub fn agent_heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.agent_heartbeat_interval_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Non-empty webhook URL, if one was configured.
    pub fn webhook_url(&self) -> Option<&str> {
        self.event_webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: Self::DEFAULT_PORT,
            poll_window_ms: Self::DEFAULT_POLL_WINDOW_MS,
            poll_retry_interval_ms: Self::DEFAULT_POLL_RETRY_INTERVAL_MS,
            agent_heartbeat_interval_ms: Self::DEFAULT_HEARTBEAT_INTERVAL_MS,
            event_bus_capacity: Self::DEFAULT_EVENT_BUS_CAPACITY,
            event_webhook_url: None,
            workers: Self::DEFAULT_WORKERS,
        }
    }
}
