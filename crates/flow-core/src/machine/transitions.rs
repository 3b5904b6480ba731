//! State transitions - the pure `advance(run, event) -> run'` function.

use thiserror::Error;

use super::events::RunEvent;
use crate::model::{RunPhase, RunStatus};

/// Error type for rejected transitions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Invalid transition from {phase}/{status} with event {event}")]
    InvalidTransition {
        phase: RunPhase,
        status: RunStatus,
        event: String,
    },

    #[error("Run already claimed by agent {0}")]
    AlreadyClaimed(String),

    #[error("End requires a terminal status, got {0}")]
    NonTerminalOutcome(RunStatus),
}

/// The part of a run the state machine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub phase: RunPhase,
    pub status: RunStatus,
    pub agent_ref: Option<String>,
}

impl RunState {
    pub fn new(phase: RunPhase, status: RunStatus) -> Self {
        Self {
            phase,
            status,
            agent_ref: None,
        }
    }

    pub fn is_dispatchable(&self) -> bool {
        self.phase == RunPhase::Pending && self.status == RunStatus::Ready
    }
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from_phase: RunPhase,
    pub from_status: RunStatus,
    pub to_phase: RunPhase,
    pub to_status: RunStatus,
    /// Whether phase, status or owner actually changed.
    pub changed: bool,
}

impl Transition {
    pub fn between(from: &RunState, to: &RunState) -> Self {
        Self {
            from_phase: from.phase,
            from_status: from.status,
            to_phase: to.phase,
            to_status: to.status,
            changed: from != to,
        }
    }
}

/// Compute the next state for `event`.
///
/// Replays against a run that already reached the target are `Ok` with an
/// unchanged state; finalized runs absorb every event.
pub fn advance(state: &RunState, event: &RunEvent) -> Result<RunState, TransitionError> {
    use RunPhase::*;

    if state.phase == Finalized {
        return Ok(state.clone());
    }

    let invalid = || TransitionError::InvalidTransition {
        phase: state.phase,
        status: state.status,
        event: event.to_string(),
    };

    match event {
        RunEvent::Claim { agent_ref } => {
            if state.is_dispatchable() {
                return Ok(RunState {
                    phase: Queued,
                    status: state.status,
                    agent_ref: Some(agent_ref.clone()),
                });
            }
            match &state.agent_ref {
                Some(owner) if owner == agent_ref && state.phase == Queued => Ok(state.clone()),
                Some(owner) if owner != agent_ref => {
                    Err(TransitionError::AlreadyClaimed(owner.clone()))
                }
                _ => Err(invalid()),
            }
        }
        RunEvent::Start => match state.phase {
            Queued => Ok(RunState {
                phase: Running,
                status: RunStatus::Running,
                agent_ref: state.agent_ref.clone(),
            }),
            Running | Completed => Ok(state.clone()),
            Pending | Finalized => Err(invalid()),
        },
        RunEvent::End(outcome) => {
            if !outcome.status.is_terminal() {
                return Err(TransitionError::NonTerminalOutcome(outcome.status));
            }
            match state.phase {
                Running => Ok(RunState {
                    phase: Completed,
                    status: outcome.status,
                    agent_ref: state.agent_ref.clone(),
                }),
                Completed => Ok(state.clone()),
                Pending | Queued | Finalized => Err(invalid()),
            }
        }
        RunEvent::Cancel | RunEvent::Timeout => {
            if state.phase == Completed {
                return Ok(state.clone());
            }
            let status = if matches!(event, RunEvent::Cancel) {
                RunStatus::Cancelled
            } else {
                RunStatus::TimedOut
            };
            Ok(RunState {
                phase: Completed,
                status,
                agent_ref: state.agent_ref.clone(),
            })
        }
        RunEvent::Finalize => match state.phase {
            Completed => Ok(RunState {
                phase: Finalized,
                status: state.status,
                agent_ref: state.agent_ref.clone(),
            }),
            _ => Err(invalid()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::RunOutcome;

    const PHASES: [RunPhase; 5] = [
        RunPhase::Pending,
        RunPhase::Queued,
        RunPhase::Running,
        RunPhase::Completed,
        RunPhase::Finalized,
    ];

    const STATUSES: [RunStatus; 9] = [
        RunStatus::NotStarted,
        RunStatus::Ready,
        RunStatus::Running,
        RunStatus::Succeeded,
        RunStatus::Failed,
        RunStatus::Cancelled,
        RunStatus::TimedOut,
        RunStatus::Skipped,
        RunStatus::Invalid,
    ];

    fn claim(agent: &str) -> RunEvent {
        RunEvent::Claim {
            agent_ref: agent.to_string(),
        }
    }

    fn ready() -> RunState {
        RunState::new(RunPhase::Pending, RunStatus::Ready)
    }

    #[test]
    fn claim_succeeds_only_on_pending_ready() {
        for phase in PHASES {
            for status in STATUSES {
                let state = RunState::new(phase, status);
                let result = advance(&state, &claim("agent-1"));
                let changed = matches!(&result, Ok(next) if *next != state);
                assert_eq!(
                    changed,
                    phase == RunPhase::Pending && status == RunStatus::Ready,
                    "claim on {phase}/{status}"
                );
            }
        }
    }

    #[test]
    fn claim_queues_and_keeps_status() {
        let next = advance(&ready(), &claim("agent-1")).unwrap();
        assert_eq!(next.phase, RunPhase::Queued);
        assert_eq!(next.status, RunStatus::Ready);
        assert_eq!(next.agent_ref.as_deref(), Some("agent-1"));
    }

    #[test]
    fn claim_is_idempotent_for_owner_and_exclusive_across_agents() {
        let claimed = advance(&ready(), &claim("agent-1")).unwrap();
        assert_eq!(advance(&claimed, &claim("agent-1")).unwrap(), claimed);
        assert_eq!(
            advance(&claimed, &claim("agent-2")),
            Err(TransitionError::AlreadyClaimed("agent-1".to_string()))
        );
    }

    #[test]
    fn start_requires_queued_and_replays_are_noops() {
        assert!(advance(&ready(), &RunEvent::Start).is_err());

        let queued = advance(&ready(), &claim("a")).unwrap();
        let running = advance(&queued, &RunEvent::Start).unwrap();
        assert_eq!(running.phase, RunPhase::Running);
        assert_eq!(running.status, RunStatus::Running);
        assert_eq!(advance(&running, &RunEvent::Start).unwrap(), running);
    }

    #[test]
    fn end_completes_running_run_with_carried_status() {
        let queued = advance(&ready(), &claim("a")).unwrap();
        let running = advance(&queued, &RunEvent::Start).unwrap();
        let ended = advance(&running, &RunEvent::End(RunOutcome::failed("boom"))).unwrap();
        assert_eq!(ended.phase, RunPhase::Completed);
        assert_eq!(ended.status, RunStatus::Failed);
    }

    #[test]
    fn end_is_replay_safe_on_terminal_run() {
        let completed = RunState::new(RunPhase::Completed, RunStatus::Cancelled);
        let outcome = RunEvent::End(RunOutcome::succeeded(None, Vec::new()));
        assert_eq!(advance(&completed, &outcome).unwrap(), completed);
        assert_eq!(advance(&completed, &outcome).unwrap(), completed);
    }

    #[test]
    fn end_rejects_non_terminal_status_and_unstarted_runs() {
        let running = RunState::new(RunPhase::Running, RunStatus::Running);
        let outcome = RunOutcome {
            status: RunStatus::Running,
            status_message: None,
            results: Vec::new(),
        };
        assert_eq!(
            advance(&running, &RunEvent::End(outcome)),
            Err(TransitionError::NonTerminalOutcome(RunStatus::Running))
        );

        let queued = RunState::new(RunPhase::Queued, RunStatus::Ready);
        assert!(advance(&queued, &RunEvent::End(RunOutcome::failed("x"))).is_err());
    }

    #[test]
    fn cancel_and_timeout_complete_any_non_terminal_phase() {
        for phase in [RunPhase::Pending, RunPhase::Queued, RunPhase::Running] {
            let state = RunState::new(phase, RunStatus::Ready);
            let cancelled = advance(&state, &RunEvent::Cancel).unwrap();
            assert_eq!(cancelled.phase, RunPhase::Completed);
            assert_eq!(cancelled.status, RunStatus::Cancelled);

            let timed_out = advance(&state, &RunEvent::Timeout).unwrap();
            assert_eq!(timed_out.status, RunStatus::TimedOut);
        }

        let succeeded = RunState::new(RunPhase::Completed, RunStatus::Succeeded);
        assert_eq!(advance(&succeeded, &RunEvent::Cancel).unwrap(), succeeded);
    }

    #[test]
    fn finalize_requires_completed() {
        let running = RunState::new(RunPhase::Running, RunStatus::Running);
        assert!(advance(&running, &RunEvent::Finalize).is_err());

        let completed = RunState::new(RunPhase::Completed, RunStatus::Succeeded);
        let finalized = advance(&completed, &RunEvent::Finalize).unwrap();
        assert_eq!(finalized.phase, RunPhase::Finalized);
        assert_eq!(finalized.status, RunStatus::Succeeded);
    }

    #[test]
    fn finalized_absorbs_every_event() {
        let finalized = RunState::new(RunPhase::Finalized, RunStatus::Succeeded);
        for event in [
            claim("a"),
            RunEvent::Start,
            RunEvent::End(RunOutcome::failed("late")),
            RunEvent::Cancel,
            RunEvent::Timeout,
            RunEvent::Finalize,
        ] {
            assert_eq!(advance(&finalized, &event).unwrap(), finalized);
        }
    }

    #[test]
    fn phase_never_moves_backwards() {
        let events = [
            claim("a"),
            RunEvent::Start,
            RunEvent::End(RunOutcome::failed("x")),
            RunEvent::Cancel,
            RunEvent::Timeout,
            RunEvent::Finalize,
        ];
        for phase in PHASES {
            for status in STATUSES {
                let state = RunState::new(phase, status);
                for event in &events {
                    if let Ok(next) = advance(&state, event) {
                        assert!(next.phase.rank() >= state.phase.rank());
                    }
                }
            }
        }
    }

    #[test]
    fn transition_reports_change() {
        let from = ready();
        let to = advance(&from, &claim("a")).unwrap();
        let transition = Transition::between(&from, &to);
        assert!(transition.changed);
        assert_eq!(transition.from_phase, RunPhase::Pending);
        assert_eq!(transition.to_phase, RunPhase::Queued);
        assert!(!Transition::between(&to, &to).changed);
    }
}
