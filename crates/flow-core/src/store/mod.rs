//! Run Store: persistence for runs and agents.

mod memory;

pub use memory::MemoryRunStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::dispatch::ClaimQuery;
use crate::machine::{RunEvent, Transition, TransitionError};
use crate::model::{Agent, RunPhase, RunStatus, TaskRun, WorkflowRun};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// The persisted run after an event, plus what the event did to it.
#[derive(Debug, Clone)]
pub struct Applied<T> {
    pub run: T,
    pub transition: Transition,
}

/// List filter; empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub phases: Vec<RunPhase>,
    pub statuses: Vec<RunStatus>,
    /// TaskRuns only.
    pub workflow_run_ref: Option<String>,
}

impl RunFilter {
    pub fn matches(&self, phase: RunPhase, status: RunStatus) -> bool {
        (self.phases.is_empty() || self.phases.contains(&phase))
            && (self.statuses.is_empty() || self.statuses.contains(&status))
    }
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn register_agent(&self, agent: Agent) -> StoreResult<Agent>;

    async fn get_agent(&self, id: &str) -> StoreResult<Option<Agent>>;

    /// Bump the heartbeat; `None` when the agent is unknown.
    async fn touch_agent(&self, id: &str, at: DateTime<Utc>) -> StoreResult<Option<Agent>>;

    async fn list_agents(&self) -> StoreResult<Vec<Agent>>;

    async fn insert_workflow_run(&self, run: WorkflowRun) -> StoreResult<WorkflowRun>;

    async fn get_workflow_run(&self, id: &str) -> StoreResult<Option<WorkflowRun>>;

    async fn list_workflow_runs(&self, filter: &RunFilter) -> StoreResult<Vec<WorkflowRun>>;

    async fn insert_task_run(&self, run: TaskRun) -> StoreResult<TaskRun>;

    async fn get_task_run(&self, id: &str) -> StoreResult<Option<TaskRun>>;

    async fn list_task_runs(&self, filter: &RunFilter) -> StoreResult<Vec<TaskRun>>;

    /// Evaluate `event` and persist the result in one exclusive step.
    async fn apply_workflow_run_event(
        &self,
        id: &str,
        event: &RunEvent,
    ) -> StoreResult<Applied<WorkflowRun>>;

    async fn apply_task_run_event(
        &self,
        id: &str,
        event: &RunEvent,
    ) -> StoreResult<Applied<TaskRun>>;

    /// Atomically hand every matching WorkflowRun to the querying agent.
    async fn claim_workflow_runs(
        &self,
        query: &ClaimQuery,
    ) -> StoreResult<Vec<Applied<WorkflowRun>>>;

    /// Atomically hand every matching TaskRun to the querying agent.
    async fn claim_task_runs(&self, query: &ClaimQuery) -> StoreResult<Vec<Applied<TaskRun>>>;
}
