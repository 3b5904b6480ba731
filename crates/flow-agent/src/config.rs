use std::path::PathBuf;
use std::time::Duration;

use flow_core::{DeletionPolicy, TaskType};

/// Agent settings, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub engine_url: String,
    pub name: String,
    pub host: String,
    pub version: String,
    /// Empty means the Agent accepts no TaskRuns at all.
    pub task_types: Vec<TaskType>,
    pub poll_window_ms: u64,
    pub default_timeout_ms: u64,
    pub deletion_policy: DeletionPolicy,
    pub transport_retry_delay_ms: u64,
    pub admission_timeout_ms: u64,
    pub cleanup_delay_ms: u64,
    pub work_dir: PathBuf,
}

impl AgentConfig {
    pub const DEFAULT_ENGINE_URL: &'static str = "http://localhost:7730";
    pub const DEFAULT_TASK_TYPES: &'static str = "template,custom,script";
    pub const DEFAULT_POLL_WINDOW_MS: u64 = 30_000;
    pub const DEFAULT_TIMEOUT_MS: u64 = 3_600_000;
    pub const DEFAULT_TRANSPORT_RETRY_MS: u64 = 5_000;
    pub const DEFAULT_ADMISSION_TIMEOUT_MS: u64 = 600_000;
    pub const DEFAULT_CLEANUP_DELAY_MS: u64 = 1_000;

    pub fn poll_window(&self) -> Duration {
        Duration::from_millis(self.poll_window_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn transport_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transport_retry_delay_ms)
    }

    pub fn admission_timeout(&self) -> Duration {
        Duration::from_millis(self.admission_timeout_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            engine_url: Self::DEFAULT_ENGINE_URL.to_string(),
            name: "flow-agent".to_string(),
            host: default_host(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            task_types: TaskType::AGENT_EXECUTABLE.to_vec(),
            poll_window_ms: Self::DEFAULT_POLL_WINDOW_MS,
            default_timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            deletion_policy: DeletionPolicy::Never,
            transport_retry_delay_ms: Self::DEFAULT_TRANSPORT_RETRY_MS,
            admission_timeout_ms: Self::DEFAULT_ADMISSION_TIMEOUT_MS,
            cleanup_delay_ms: Self::DEFAULT_CLEANUP_DELAY_MS,
            work_dir: std::env::temp_dir().join("flow-agent"),
        }
    }
}

/// Host name from the environment, `localhost` when unknown.
pub fn default_host() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Parse a comma separated capability list. A blank list is valid and empty.
pub fn parse_task_types(raw: &str) -> Result<Vec<TaskType>, String> {
    let mut types = Vec::new();
    for label in raw.split(',').map(str::trim).filter(|l| !l.is_empty()) {
        let task_type: TaskType = label.parse()?;
        if !types.contains(&task_type) {
            types.push(task_type);
        }
    }
    Ok(types)
}
