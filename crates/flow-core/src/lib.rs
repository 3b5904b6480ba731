//! flow-core - run model, run state machine and run store
//!
//! Shared by the Engine (dispatch + callback services) and the Agent
//! (poller + run processor).

pub mod dispatch;
#[cfg(feature = "logging")]
pub mod logging;
pub mod machine;
pub mod model;
pub mod store;

pub use dispatch::{task_run_handoff, workflow_run_handoff, ClaimQuery, Handoff};
pub use machine::{
    advance, apply_event, RunEvent, RunOutcome, RunRecord, RunState, Transition, TransitionError,
};
pub use model::{
    validate_name, validate_params, Agent, AgentRegistration, DeletionPolicy, DependencyOutcome,
    EnvVar, ResultSpec, RunKind, RunParam, RunPhase, RunResult, RunStatus, RunTiming,
    TaskDependency, TaskRun, TaskRunSpec, TaskType, Workspace, WorkspaceScope, WorkflowRun,
};
pub use store::{Applied, MemoryRunStore, RunFilter, RunStore, StoreError, StoreResult};
