use std::sync::Arc;

use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::StatusChangeEvent;
use crate::sink::EventSink;

/// Worker that drains the bus and fans every event out to the sinks
pub struct StatusWorker {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl StatusWorker {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    /// Spawn the worker task; it stops once every bus handle is dropped.
    pub fn spawn(self, mut receiver: mpsc::Receiver<StatusChangeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("StatusWorker started with {} sink(s)", self.sinks.len());
            while let Some(event) = receiver.recv().await {
                self.dispatch(&event).await;
            }
            info!("StatusWorker stopped");
        })
    }

    async fn dispatch(&self, event: &StatusChangeEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(event).await {
                warn!(
                    "[{}] Failed to deliver status change to {} sink: {}",
                    event.run_id,
                    sink.name(),
                    e
                );
            }
        }
    }
}
