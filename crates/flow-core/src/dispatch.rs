//! Dispatch predicates: which runs an Agent may receive from a poll.
//!
//! Pending runs are claimed through the state machine. Completed runs are
//! handed over once more (teardown for WorkflowRuns, abort for cancelled or
//! timed out TaskRuns) and `claimed_in` records that the hand-off happened.

use crate::model::{RunPhase, RunStatus, TaskRun, TaskType, WorkflowRun};

/// Who is polling and what they accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimQuery {
    pub agent_id: String,
    /// `None` accepts every type; TaskRun claims only.
    pub task_types: Option<Vec<TaskType>>,
}

impl ClaimQuery {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            task_types: None,
        }
    }

    pub fn with_task_types(mut self, task_types: Vec<TaskType>) -> Self {
        self.task_types = Some(task_types);
        self
    }

    fn accepts(&self, task_type: TaskType) -> bool {
        self.task_types
            .as_ref()
            .map_or(true, |types| types.contains(&task_type))
    }
}

/// How a matching run is handed to the Agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Dispatchable run: apply `Claim`.
    Claim,
    /// Completed run: deliver as-is, state untouched.
    Signal,
}

fn owned_by_or_unowned(agent_ref: Option<&str>, agent_id: &str) -> bool {
    agent_ref.map_or(true, |owner| owner == agent_id)
}

pub fn workflow_run_handoff(run: &WorkflowRun, query: &ClaimQuery) -> Option<Handoff> {
    match run.phase {
        RunPhase::Pending if run.status == RunStatus::Ready => Some(Handoff::Claim),
        RunPhase::Completed
            if run.claimed_in != Some(RunPhase::Completed)
                && owned_by_or_unowned(run.agent_ref.as_deref(), &query.agent_id) =>
        {
            Some(Handoff::Signal)
        }
        _ => None,
    }
}

pub fn task_run_handoff(run: &TaskRun, query: &ClaimQuery) -> Option<Handoff> {
    if !query.accepts(run.task_type) {
        return None;
    }
    match run.phase {
        RunPhase::Pending if run.status == RunStatus::Ready => Some(Handoff::Claim),
        // Only the Agent running it has anything to abort.
        RunPhase::Completed
            if matches!(run.status, RunStatus::Cancelled | RunStatus::TimedOut)
                && run.claimed_in != Some(RunPhase::Completed)
                && run.agent_ref.as_deref() == Some(query.agent_id.as_str()) =>
        {
            Some(Handoff::Signal)
        }
        _ => None,
    }
}
