use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{
    DeletionPolicy, RunParam, RunPhase, RunResult, RunStatus, RunTiming, TaskType, Workspace,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// A result the task promises to produce.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ResultSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// What to run for a TaskRun.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunSpec {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub results: Vec<ResultSpec>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub debug: bool,
    /// Falls back to the Agent's configured default when unset.
    #[serde(default)]
    pub deletion: Option<DeletionPolicy>,
}

impl TaskRunSpec {
    /// The image, if present and non-empty.
    pub fn image(&self) -> Option<&str> {
        self.image
            .as_deref()
            .map(str::trim)
            .filter(|image| !image.is_empty())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyOutcome {
    #[default]
    Success,
    Failure,
    Always,
}

/// Upstream edge consumed by the Engine's DAG evaluator.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependency {
    pub task_run_ref: String,
    #[serde(default)]
    pub outcome: DependencyOutcome,
}

/// One execution instance of a single Task within a WorkflowRun.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub workflow_run_ref: String,
    #[serde(default)]
    pub workflow_ref: String,
    #[serde(default)]
    pub workflow_revision_ref: String,
    #[serde(default)]
    pub task_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_version: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub params: Vec<RunParam>,
    #[serde(default)]
    pub results: Vec<RunResult>,
    #[serde(default)]
    pub spec: TaskRunSpec,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    /// Milliseconds; the Agent's default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    pub phase: RunPhase,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_in: Option<RunPhase>,
    #[serde(flatten)]
    pub timing: RunTiming,
}

impl TaskRun {
    /// A fresh run, ready to be claimed.
    pub fn new(
        workflow_run_ref: impl Into<String>,
        name: impl Into<String>,
        task_type: TaskType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_type,
            workflow_run_ref: workflow_run_ref.into(),
            workflow_ref: String::new(),
            workflow_revision_ref: String::new(),
            task_ref: String::new(),
            task_version: None,
            name: name.into(),
            params: Vec::new(),
            results: Vec::new(),
            spec: TaskRunSpec::default(),
            workspaces: Vec::new(),
            timeout: None,
            phase: RunPhase::Pending,
            status: RunStatus::Ready,
            status_message: None,
            dependencies: Vec::new(),
            labels: BTreeMap::new(),
            agent_ref: None,
            claimed_in: None,
            timing: RunTiming::default(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.spec.image = Some(image.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.spec.script = Some(script.into());
        self
    }

    pub fn with_deletion(mut self, policy: DeletionPolicy) -> Self {
        self.spec.deletion = Some(policy);
        self
    }
}
