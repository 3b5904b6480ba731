use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use log::{error, info, warn};

use flow_core::{MemoryRunStore, RunStore};
use flow_events::{EventSink, LogSink, StatusBus, StatusWorker, WebhookSink};

use crate::config::EngineConfig;
use crate::controllers::{
    agent_controller, system_controller, task_run_controller, workflow_run_controller,
};
use crate::state::AppState;

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.configure(agent_controller::config)
        .configure(workflow_run_controller::config)
        .configure(task_run_controller::config)
        .configure(system_controller::config);
}

fn build_sinks(config: &EngineConfig) -> Vec<Arc<dyn EventSink>> {
    let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(LogSink)];
    if let Some(url) = config.webhook_url() {
        match WebhookSink::new(url) {
            Ok(sink) => {
                info!("Forwarding status changes to {}", url);
                sinks.push(Arc::new(sink));
            }
            Err(e) => warn!("Webhook sink disabled: {}", e),
        }
    }
    sinks
}

/// Build the shared state and start the status worker.
pub fn build_state(store: Arc<dyn RunStore>, config: EngineConfig) -> web::Data<AppState> {
    let (bus, receiver) = StatusBus::new(config.event_bus_capacity);
    StatusWorker::new(build_sinks(&config)).spawn(receiver);
    web::Data::new(AppState::new(store, bus, config))
}

pub async fn run(config: EngineConfig) -> io::Result<()> {
    let address = config.bind_address();
    let workers = config.workers.max(1);
    info!(
        "Poll window {}ms, retry interval {}ms",
        config.poll_window_ms, config.poll_retry_interval_ms
    );

    // Claims are only atomic within this process: run a single Engine per store.
    let store: Arc<dyn RunStore> = Arc::new(MemoryRunStore::new());
    let state = build_state(store, config);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .workers(workers)
    .bind(&address)?
    .run();

    info!("Starting engine on http://{address}");

    if let Err(e) = server.await {
        error!("Engine server error: {}", e);
        return Err(e);
    }
    Ok(())
}
