//! Enumerations and small value types shared by every run record.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle axis of a run. Monotonic per run.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Pending,
    Queued,
    Running,
    Completed,
    Finalized,
}

impl RunPhase {
    /// Position on the lifecycle axis; a run never moves to a lower rank.
    pub fn rank(self) -> u8 {
        match self {
            RunPhase::Pending => 0,
            RunPhase::Queued => 1,
            RunPhase::Running => 2,
            RunPhase::Completed => 3,
            RunPhase::Finalized => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RunPhase::Pending => "pending",
            RunPhase::Queued => "queued",
            RunPhase::Running => "running",
            RunPhase::Completed => "completed",
            RunPhase::Finalized => "finalized",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RunPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(RunPhase::Pending),
            "queued" => Ok(RunPhase::Queued),
            "running" => Ok(RunPhase::Running),
            "completed" => Ok(RunPhase::Completed),
            "finalized" => Ok(RunPhase::Finalized),
            other => Err(format!("invalid run phase: {other}")),
        }
    }
}

/// Outcome axis of a run.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    NotStarted,
    Ready,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
    Skipped,
    Invalid,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded
                | RunStatus::Failed
                | RunStatus::Cancelled
                | RunStatus::TimedOut
                | RunStatus::Skipped
                | RunStatus::Invalid
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            RunStatus::NotStarted => "notstarted",
            RunStatus::Ready => "ready",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::TimedOut => "timedout",
            RunStatus::Skipped => "skipped",
            RunStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "notstarted" => Ok(RunStatus::NotStarted),
            "ready" => Ok(RunStatus::Ready),
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            "timedout" => Ok(RunStatus::TimedOut),
            "skipped" => Ok(RunStatus::Skipped),
            "invalid" => Ok(RunStatus::Invalid),
            other => Err(format!("invalid run status: {other}")),
        }
    }
}

/// Kind of task a TaskRun executes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Start,
    End,
    Template,
    Custom,
    Generic,
    Decision,
    Approval,
    SetWfProperty,
    Manual,
    EventWait,
    AcquireLock,
    ReleaseLock,
    RunWorkflow,
    RunScheduledWorkflow,
    Script,
    SetWfStatus,
    Sleep,
}

impl TaskType {
    pub const ALL: [TaskType; 17] = [
        TaskType::Start,
        TaskType::End,
        TaskType::Template,
        TaskType::Custom,
        TaskType::Generic,
        TaskType::Decision,
        TaskType::Approval,
        TaskType::SetWfProperty,
        TaskType::Manual,
        TaskType::EventWait,
        TaskType::AcquireLock,
        TaskType::ReleaseLock,
        TaskType::RunWorkflow,
        TaskType::RunScheduledWorkflow,
        TaskType::Script,
        TaskType::SetWfStatus,
        TaskType::Sleep,
    ];

    /// Only these types run as containers on an Agent; the rest stay inside the Engine.
    pub const AGENT_EXECUTABLE: [TaskType; 3] =
        [TaskType::Template, TaskType::Custom, TaskType::Script];

    pub fn is_agent_executable(self) -> bool {
        Self::AGENT_EXECUTABLE.contains(&self)
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskType::Start => "start",
            TaskType::End => "end",
            TaskType::Template => "template",
            TaskType::Custom => "custom",
            TaskType::Generic => "generic",
            TaskType::Decision => "decision",
            TaskType::Approval => "approval",
            TaskType::SetWfProperty => "setwfproperty",
            TaskType::Manual => "manual",
            TaskType::EventWait => "eventwait",
            TaskType::AcquireLock => "acquirelock",
            TaskType::ReleaseLock => "releaselock",
            TaskType::RunWorkflow => "runworkflow",
            TaskType::RunScheduledWorkflow => "runscheduledworkflow",
            TaskType::Script => "script",
            TaskType::SetWfStatus => "setwfstatus",
            TaskType::Sleep => "sleep",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        TaskType::ALL
            .iter()
            .copied()
            .find(|task_type| task_type.label() == wanted)
            .ok_or_else(|| format!("invalid task type: {wanted}"))
    }
}

/// When the Agent asks the executor to delete the underlying execution resource.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    #[default]
    Never,
    OnSuccess,
    Always,
}

impl DeletionPolicy {
    pub fn deletes_after(self, succeeded: bool) -> bool {
        match self {
            DeletionPolicy::Never => false,
            DeletionPolicy::OnSuccess => succeeded,
            DeletionPolicy::Always => true,
        }
    }
}

impl FromStr for DeletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" => Ok(DeletionPolicy::Never),
            "onsuccess" | "on_success" | "on-success" => Ok(DeletionPolicy::OnSuccess),
            "always" => Ok(DeletionPolicy::Always),
            other => Err(format!(
                "invalid deletion policy: {other} (expected Never, OnSuccess or Always)"
            )),
        }
    }
}

/// Which record a status change refers to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    WorkflowRun,
    TaskRun,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::WorkflowRun => f.write_str("workflowrun"),
            RunKind::TaskRun => f.write_str("taskrun"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunParam {
    pub name: String,
    pub value: serde_json::Value,
}

impl RunParam {
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Params are an ordered list whose names must be non-empty and unique.
pub fn validate_params(params: &[RunParam]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for param in params {
        if param.name.trim().is_empty() {
            return Err("param name must not be empty".to_string());
        }
        if !seen.insert(param.name.as_str()) {
            return Err(format!("duplicate param name: {}", param.name));
        }
    }
    Ok(())
}

/// Ids and names that end up as file or volume names on an Agent must be
/// plain `[A-Za-z0-9._-]` tokens, and never `.` or `..`.
pub fn validate_name(field: &str, value: &str) -> Result<(), String> {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if value.is_empty() || !plain || value == "." || value == ".." {
        return Err(format!("{field} {value:?} must be a plain [A-Za-z0-9._-] name"));
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RunResult {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
        }
    }
}

/// Volume lifetime: shared by every run of a Workflow, or private to one WorkflowRun.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceScope {
    Workflow,
    WorkflowRun,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub name: String,
    #[serde(rename = "type")]
    pub scope: WorkspaceScope,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Creation/start/duration bookkeeping common to every run.
///
/// `duration` (ms) only carries meaning once `start_time` is set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunTiming {
    #[serde(default = "Utc::now")]
    pub creation_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: u64,
}

impl RunTiming {
    pub fn created_at(creation_date: DateTime<Utc>) -> Self {
        Self {
            creation_date,
            start_time: None,
            duration: 0,
        }
    }

    pub fn mark_started(&mut self, at: DateTime<Utc>) {
        if self.start_time.is_none() {
            self.start_time = Some(at);
        }
    }

    pub fn mark_ended(&mut self, at: DateTime<Utc>) {
        if let Some(started) = self.start_time {
            self.duration = (at - started).num_milliseconds().max(0) as u64;
        }
    }
}

impl Default for RunTiming {
    fn default() -> Self {
        Self::created_at(Utc::now())
    }
}
