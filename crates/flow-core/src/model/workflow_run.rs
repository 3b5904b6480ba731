use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{RunParam, RunPhase, RunResult, RunStatus, RunTiming, Workspace};

/// One execution instance of a Workflow.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: String,
    pub workflow_ref: String,
    /// Revision pinned at submit time.
    #[serde(default)]
    pub workflow_revision_ref: String,
    pub phase: RunPhase,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_override: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Milliseconds; inherited from the revision when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default)]
    pub params: Vec<RunParam>,
    #[serde(default)]
    pub results: Vec<RunResult>,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Null until an Agent claims the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_ref: Option<String>,
    /// Phase in which the run was last handed to an Agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_in: Option<RunPhase>,
    #[serde(default = "default_trigger")]
    pub trigger: String,
    #[serde(flatten)]
    pub timing: RunTiming,
}

fn default_trigger() -> String {
    "engine".to_string()
}

impl WorkflowRun {
    /// A fresh run, ready to be claimed.
    pub fn new(workflow_ref: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_ref: workflow_ref.into(),
            workflow_revision_ref: String::new(),
            phase: RunPhase::Pending,
            status: RunStatus::Ready,
            status_override: None,
            status_message: None,
            timeout: None,
            retries: None,
            params: Vec::new(),
            results: Vec::new(),
            workspaces: Vec::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            agent_ref: None,
            claimed_in: None,
            trigger: default_trigger(),
            timing: RunTiming::default(),
        }
    }

    pub fn with_workspace(mut self, workspace: Workspace) -> Self {
        self.workspaces.push(workspace);
        self
    }

    pub fn has_workspaces(&self) -> bool {
        !self.workspaces.is_empty()
    }

    /// The status reported to users: the override wins once set.
    pub fn effective_status(&self) -> RunStatus {
        self.status_override.unwrap_or(self.status)
    }
}
