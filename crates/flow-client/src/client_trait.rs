use async_trait::async_trait;

use flow_core::{AgentRegistration, RunOutcome, TaskRun, WorkflowRun};

use crate::error::ClientResult;

/// Dispatch and callback operations the Agent performs against the Engine.
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Returns the id the Engine assigned to this Agent.
    async fn register_agent(&self, registration: &AgentRegistration) -> ClientResult<String>;

    /// Long-poll; empty when the poll window elapsed without work.
    async fn claim_workflow_runs(&self, agent_id: &str) -> ClientResult<Vec<WorkflowRun>>;

    /// Long-poll; empty when the poll window elapsed without work.
    async fn claim_task_runs(&self, agent_id: &str) -> ClientResult<Vec<TaskRun>>;

    async fn start_workflow(&self, id: &str) -> ClientResult<()>;

    async fn finalize_workflow(&self, id: &str) -> ClientResult<()>;

    /// Returns the run as persisted after the call; a run cancelled before
    /// it started comes back terminal.
    async fn start_task(&self, id: &str) -> ClientResult<TaskRun>;

    async fn end_task(&self, id: &str, outcome: &RunOutcome) -> ClientResult<()>;
}
