use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::TaskType;

/// A registered worker process that claims and executes runs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub version: String,
    /// Capability set: the TaskRun types this Agent accepts.
    #[serde(default)]
    pub task_types: Vec<TaskType>,
    pub creation_date: DateTime<Utc>,
    /// Heartbeat marker, bumped on every poll call.
    pub last_connected_date: DateTime<Utc>,
}

/// Body of `POST /agent/register`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegistration {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub task_types: Vec<TaskType>,
    #[serde(default)]
    pub version: String,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        version: impl Into<String>,
        task_types: Vec<TaskType>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            host: host.into(),
            version: version.into(),
            task_types,
            creation_date: now,
            last_connected_date: now,
        }
    }

    pub fn from_registration(registration: AgentRegistration) -> Self {
        Self::new(
            registration.name,
            registration.host,
            registration.version,
            registration.task_types,
        )
    }

    /// Whether the last poll happened within `heartbeat` of `now`.
    pub fn is_online(&self, now: DateTime<Utc>, heartbeat: std::time::Duration) -> bool {
        let elapsed = (now - self.last_connected_date).num_milliseconds();
        elapsed >= 0 && (elapsed as u128) <= heartbeat.as_millis()
    }
}
