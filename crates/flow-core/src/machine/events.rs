//! Run events - everything that may move a run along its axes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{RunResult, RunStatus};

/// Terminal outcome carried by an `End` event.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub status: RunStatus,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub results: Vec<RunResult>,
}

impl RunOutcome {
    pub fn succeeded(message: Option<String>, results: Vec<RunResult>) -> Self {
        Self {
            status: RunStatus::Succeeded,
            status_message: message,
            results,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            status_message: Some(message.into()),
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// An Agent takes ownership of a dispatchable run.
    Claim { agent_ref: String },
    /// The owning Agent began executing the run.
    Start,
    /// Execution finished with a terminal outcome.
    End(RunOutcome),
    /// External actor aborts the run.
    Cancel,
    /// External actor aborts the run because its timeout elapsed.
    Timeout,
    /// Engine-owned side effects are done; the run becomes immutable.
    Finalize,
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Claim { agent_ref } => write!(f, "Claim({agent_ref})"),
            RunEvent::Start => f.write_str("Start"),
            RunEvent::End(outcome) => write!(f, "End({})", outcome.status),
            RunEvent::Cancel => f.write_str("Cancel"),
            RunEvent::Timeout => f.write_str("Timeout"),
            RunEvent::Finalize => f.write_str("Finalize"),
        }
    }
}
