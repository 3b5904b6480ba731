//! Run model
//!
//! Records shared over the wire between the Engine and its Agents.

mod agent;
mod task_run;
mod types;
mod workflow_run;

pub use agent::{Agent, AgentRegistration};
pub use task_run::{DependencyOutcome, EnvVar, ResultSpec, TaskDependency, TaskRun, TaskRunSpec};
pub use types::{
    validate_name, validate_params, DeletionPolicy, RunKind, RunParam, RunPhase, RunResult,
    RunStatus, RunTiming, TaskType, Workspace, WorkspaceScope,
};
pub use workflow_run::WorkflowRun;
