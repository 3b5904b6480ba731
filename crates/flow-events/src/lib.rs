//! flow-events - status-change notifications
//!
//! The Engine emits one [`StatusChangeEvent`] per persisted transition onto a
//! bounded [`StatusBus`]; a [`StatusWorker`] drains it into the configured
//! [`EventSink`]s.

pub mod bus;
pub mod events;
pub mod sink;
pub mod worker;

pub use bus::StatusBus;
pub use events::{EventMeta, StatusChangeEvent};
pub use sink::{EventSink, LogSink, SinkError, WebhookSink};
pub use worker::StatusWorker;
