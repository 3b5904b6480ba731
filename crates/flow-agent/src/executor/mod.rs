//! Task Executor: the backend that physically runs a TaskRun.

mod process;

pub use process::LocalProcessExecutor;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use flow_core::{EnvVar, RunParam, RunResult, TaskRun, Workspace, WorkspaceScope};

pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The backend refused the request before anything ran.
    #[error("{0}")]
    AdmissionDenied(String),

    #[error("{0}")]
    Execution(String),

    #[error("executor I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A workspace resolved to the volume reference the executor provisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRef {
    pub name: String,
    pub reference: String,
    pub mount_path: Option<String>,
}

/// Volume reference for a workspace.
///
/// Workflow-scoped volumes outlive a run and are keyed by the Workflow;
/// run-scoped volumes are keyed by the WorkflowRun.
pub fn workspace_reference(workspace: &Workspace, workflow_ref: &str, workflow_run_id: &str) -> String {
    match workspace.scope {
        WorkspaceScope::Workflow => format!("wf-{}-{}", workflow_ref, workspace.name),
        WorkspaceScope::WorkflowRun => format!("wfrun-{}-{}", workflow_run_id, workspace.name),
    }
}

/// Everything the executor needs to run one TaskRun.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub task_run_id: String,
    pub workflow_run_id: String,
    pub image: String,
    pub command: Option<String>,
    pub script: Option<String>,
    pub arguments: Vec<String>,
    pub params: Vec<RunParam>,
    pub env: Vec<EnvVar>,
    /// Names of the results the task promises to produce.
    pub result_names: Vec<String>,
    pub working_dir: Option<String>,
    pub workspaces: Vec<WorkspaceRef>,
    pub debug: bool,
    /// How long resource creation may take before it counts as rejected.
    pub admission_timeout: Duration,
    pub timeout: Duration,
}

impl ExecutionRequest {
    pub fn for_task_run(
        run: &TaskRun,
        image: &str,
        admission_timeout: Duration,
        default_timeout: Duration,
    ) -> Self {
        let workspaces = run
            .workspaces
            .iter()
            .map(|workspace| WorkspaceRef {
                name: workspace.name.clone(),
                reference: workspace_reference(workspace, &run.workflow_ref, &run.workflow_run_ref),
                mount_path: workspace.mount_path.clone(),
            })
            .collect();

        Self {
            task_run_id: run.id.clone(),
            workflow_run_id: run.workflow_run_ref.clone(),
            image: image.to_string(),
            command: run.spec.command.clone(),
            script: run.spec.script.clone(),
            arguments: run.spec.arguments.clone(),
            params: run.params.clone(),
            env: run.spec.env.clone(),
            result_names: run.spec.results.iter().map(|r| r.name.clone()).collect(),
            working_dir: run.spec.working_dir.clone(),
            workspaces,
            debug: run.spec.debug,
            admission_timeout,
            timeout: run
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(default_timeout),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResponse {
    pub message: Option<String>,
    pub results: Vec<RunResult>,
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Create the volume if absent.
    async fn ensure_workspace(&self, reference: &str) -> ExecutorResult<()>;

    async fn delete_workspace(&self, reference: &str) -> ExecutorResult<()>;

    /// Run to completion, bounded by `request.timeout`.
    async fn execute(&self, request: ExecutionRequest) -> ExecutorResult<ExecutionResponse>;

    /// Abort an execution. A cancel that arrives before `execute` still
    /// applies to it once it starts.
    async fn cancel(&self, task_run_id: &str) -> ExecutorResult<()>;

    /// Remove ephemeral parameter artifacts.
    async fn cleanup_parameters(&self, task_run_id: &str) -> ExecutorResult<()>;

    /// Remove the execution resource itself.
    async fn delete_execution(&self, task_run_id: &str) -> ExecutorResult<()>;
}
