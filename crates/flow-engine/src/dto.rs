//! Request and response bodies that are not run records themselves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use flow_core::{
    validate_name, validate_params, Agent, RunFilter, RunParam, TaskDependency, TaskRun, TaskRunSpec, TaskType,
    Workspace, WorkflowRun,
};

use crate::error::AppError;

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn plain_name(field: &str, value: &str) -> Result<(), AppError> {
    validate_name(field, value).map_err(AppError::Validation)
}

fn check_workspaces(workspaces: &[Workspace]) -> Result<(), AppError> {
    workspaces
        .iter()
        .try_for_each(|workspace| plain_name("workspace name", &workspace.name))
}

/// Intake body for `POST /workflowrun`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub workflow_ref: String,
    #[serde(default)]
    pub workflow_revision_ref: String,
    #[serde(default)]
    pub params: Vec<RunParam>,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub trigger: Option<String>,
}

impl WorkflowRunRequest {
    pub fn into_run(self) -> Result<WorkflowRun, AppError> {
        if self.workflow_ref.trim().is_empty() {
            return Err(AppError::Validation("workflowRef must not be empty".to_string()));
        }
        validate_params(&self.params).map_err(AppError::Validation)?;
        check_workspaces(&self.workspaces)?;

        let mut run = WorkflowRun::new(self.workflow_ref);
        if let Some(id) = non_empty(self.id) {
            plain_name("id", &id)?;
            run.id = id;
        }
        if let Some(trigger) = non_empty(self.trigger) {
            run.trigger = trigger;
        }
        run.workflow_revision_ref = self.workflow_revision_ref;
        run.params = self.params;
        run.workspaces = self.workspaces;
        run.labels = self.labels;
        run.annotations = self.annotations;
        run.timeout = self.timeout;
        run.retries = self.retries;
        Ok(run)
    }
}

/// Intake body for `POST /taskrun`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub workflow_run_ref: String,
    #[serde(default)]
    pub workflow_ref: String,
    #[serde(default)]
    pub workflow_revision_ref: String,
    #[serde(default)]
    pub task_ref: String,
    #[serde(default)]
    pub task_version: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub params: Vec<RunParam>,
    #[serde(default)]
    pub spec: TaskRunSpec,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl TaskRunRequest {
    pub fn into_run(self) -> Result<TaskRun, AppError> {
        if self.workflow_run_ref.trim().is_empty() {
            return Err(AppError::Validation("workflowRunRef must not be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".to_string()));
        }
        validate_params(&self.params).map_err(AppError::Validation)?;
        check_workspaces(&self.workspaces)?;
        for result in &self.spec.results {
            plain_name("result name", &result.name)?;
        }

        let mut run = TaskRun::new(self.workflow_run_ref, self.name, self.task_type);
        if let Some(id) = non_empty(self.id) {
            plain_name("id", &id)?;
            run.id = id;
        }
        run.workflow_ref = self.workflow_ref;
        run.workflow_revision_ref = self.workflow_revision_ref;
        run.task_ref = self.task_ref;
        run.task_version = self.task_version;
        run.params = self.params;
        run.spec = self.spec;
        run.workspaces = self.workspaces;
        run.timeout = self.timeout;
        run.dependencies = self.dependencies;
        run.labels = self.labels;
        Ok(run)
    }
}

/// Query string for the run list endpoints; values are comma separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunListQuery {
    pub phase: Option<String>,
    pub status: Option<String>,
    pub workflow_run_ref: Option<String>,
}

impl RunListQuery {
    pub fn into_filter(self) -> Result<RunFilter, AppError> {
        Ok(RunFilter {
            phases: parse_list(self.phase.as_deref())?,
            statuses: parse_list(self.status.as_deref())?,
            workflow_run_ref: non_empty(self.workflow_run_ref),
        })
    }
}

fn parse_list<T>(raw: Option<&str>) -> Result<Vec<T>, AppError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().map_err(AppError::Validation))
        .collect()
}

/// Agent listing entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    #[serde(flatten)]
    pub agent: Agent,
    pub online: bool,
}
