//! Run state machine
//!
//! Pure phase/status transition rules shared by Engine and Agent.

mod events;
mod record;
mod transitions;

pub use events::{RunEvent, RunOutcome};
pub use record::{apply_event, RunRecord};
pub use transitions::{advance, RunState, Transition, TransitionError};
