use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::events::StatusChangeEvent;

/// A bounded channel-based status-change bus
///
/// Uses `try_send` for non-blocking emission. If the channel is full or the
/// worker is gone, events are dropped and counted in the `dropped` counter.
/// The state change that produced the event is already persisted either way.
#[derive(Clone)]
pub struct StatusBus {
    tx: mpsc::Sender<StatusChangeEvent>,
    dropped: Arc<AtomicU64>,
}

impl StatusBus {
    /// Returns the bus (for emitting events) and the receiver (for the worker)
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<StatusChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    pub fn emit(&self, event: StatusChangeEvent) {
        if let Err(err) = self.tx.try_send(event) {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "bus full",
                mpsc::error::TrySendError::Closed(_) => "bus closed",
            };
            log::warn!("Dropped status-change event ({reason}), {total} dropped so far");
        }
    }

    /// Emit when `event` is present; replays yield `None` and emit nothing.
    pub fn emit_opt(&self, event: Option<StatusChangeEvent>) {
        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Get the number of dropped events since the bus was created
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
