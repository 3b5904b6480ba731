use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flow_core::{RunKind, RunPhase, RunStatus, Transition};

/// Metadata attached to every event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    /// Unique event ID (UUID v4)
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl EventMeta {
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            occurred_at: Utc::now(),
        }
    }
}

impl Default for EventMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// A persisted phase/status change of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeEvent {
    pub meta: EventMeta,
    pub run_kind: RunKind,
    pub run_id: String,
    pub old_phase: RunPhase,
    pub new_phase: RunPhase,
    pub old_status: RunStatus,
    pub new_status: RunStatus,
}

impl StatusChangeEvent {
    /// `None` for replays that left the run untouched.
    pub fn from_transition(
        run_kind: RunKind,
        run_id: impl Into<String>,
        transition: &Transition,
    ) -> Option<Self> {
        if !transition.changed {
            return None;
        }
        Some(Self {
            meta: EventMeta::new(),
            run_kind,
            run_id: run_id.into(),
            old_phase: transition.from_phase,
            new_phase: transition.to_phase,
            old_status: transition.from_status,
            new_status: transition.to_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(changed: bool) -> Transition {
        Transition {
            from_phase: RunPhase::Running,
            from_status: RunStatus::Running,
            to_phase: RunPhase::Completed,
            to_status: RunStatus::Succeeded,
            changed,
        }
    }

    #[test]
    fn unchanged_transition_produces_no_event() {
        assert!(StatusChangeEvent::from_transition(RunKind::TaskRun, "t1", &transition(false))
            .is_none());
    }

    #[test]
    fn event_serializes_old_and_new_axes() {
        let event =
            StatusChangeEvent::from_transition(RunKind::TaskRun, "t1", &transition(true)).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["runKind"], "taskrun");
        assert_eq!(value["runId"], "t1");
        assert_eq!(value["oldPhase"], "running");
        assert_eq!(value["newPhase"], "completed");
        assert_eq!(value["newStatus"], "succeeded");
        assert!(value["meta"]["eventId"].is_string());
    }
}
