use std::sync::Arc;

use flow_core::RunStore;
use flow_events::StatusBus;

use crate::config::EngineConfig;
use crate::services::dispatch_service::PollSettings;
use crate::services::{CallbackService, DispatchService};

/// Shared by every actix worker.
pub struct AppState {
    pub dispatch: DispatchService,
    pub callbacks: CallbackService,
    pub bus: StatusBus,
    pub config: EngineConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn RunStore>, bus: StatusBus, config: EngineConfig) -> Self {
        let poll = PollSettings {
            window: config.poll_window(),
            retry_interval: config.poll_retry_interval(),
        };
        Self {
            dispatch: DispatchService::new(Arc::clone(&store), bus.clone(), poll),
            callbacks: CallbackService::new(store, bus.clone()),
            bus,
            config,
        }
    }
}
