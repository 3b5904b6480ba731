use chrono::{DateTime, Utc};

use super::events::RunEvent;
use super::transitions::{advance, RunState, Transition, TransitionError};
use crate::model::{RunKind, RunPhase, RunResult, RunTiming, TaskRun, WorkflowRun};

/// A persisted run the state machine can drive.
pub trait RunRecord {
    const KIND: RunKind;

    fn id(&self) -> &str;
    fn state(&self) -> RunState;
    fn set_state(&mut self, state: RunState);
    fn timing_mut(&mut self) -> &mut RunTiming;
    fn set_outcome(&mut self, message: Option<String>, results: Vec<RunResult>);
    /// Record the phase in which the run was last handed to an Agent.
    fn set_claimed_in(&mut self, phase: RunPhase);
}

/// Apply `event` to `run` in place and report what changed.
///
/// Timing and outcome fields are only touched when the transition changed
/// the run, so replays leave the record exactly as it was.
pub fn apply_event<R: RunRecord>(
    run: &mut R,
    event: &RunEvent,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    let before = run.state();
    let after = advance(&before, event)?;
    let transition = Transition::between(&before, &after);
    if !transition.changed {
        return Ok(transition);
    }

    run.set_state(after);
    match event {
        RunEvent::Start => run.timing_mut().mark_started(now),
        RunEvent::End(outcome) => {
            run.timing_mut().mark_ended(now);
            run.set_outcome(outcome.status_message.clone(), outcome.results.clone());
        }
        RunEvent::Cancel | RunEvent::Timeout => run.timing_mut().mark_ended(now),
        RunEvent::Claim { .. } | RunEvent::Finalize => {}
    }
    Ok(transition)
}

impl RunRecord for WorkflowRun {
    const KIND: RunKind = RunKind::WorkflowRun;

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> RunState {
        RunState {
            phase: self.phase,
            status: self.status,
            agent_ref: self.agent_ref.clone(),
        }
    }

    fn set_state(&mut self, state: RunState) {
        self.phase = state.phase;
        self.status = state.status;
        self.agent_ref = state.agent_ref;
    }

    fn timing_mut(&mut self) -> &mut RunTiming {
        &mut self.timing
    }

    fn set_outcome(&mut self, message: Option<String>, results: Vec<RunResult>) {
        self.status_message = message;
        self.results = results;
    }

    fn set_claimed_in(&mut self, phase: RunPhase) {
        self.claimed_in = Some(phase);
    }
}

impl RunRecord for TaskRun {
    const KIND: RunKind = RunKind::TaskRun;

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> RunState {
        RunState {
            phase: self.phase,
            status: self.status,
            agent_ref: self.agent_ref.clone(),
        }
    }

    fn set_state(&mut self, state: RunState) {
        self.phase = state.phase;
        self.status = state.status;
        self.agent_ref = state.agent_ref;
    }

    fn timing_mut(&mut self) -> &mut RunTiming {
        &mut self.timing
    }

    fn set_outcome(&mut self, message: Option<String>, results: Vec<RunResult>) {
        self.status_message = message;
        self.results = results;
    }

    fn set_claimed_in(&mut self, phase: RunPhase) {
        self.claimed_in = Some(phase);
    }
}
