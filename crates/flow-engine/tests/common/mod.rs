#![allow(dead_code)]

use std::sync::Arc;

use actix_web::web;
use flow_core::MemoryRunStore;
use flow_engine::server::build_state;
use flow_engine::{AppState, EngineConfig};

pub fn test_state(poll_window_ms: u64, poll_retry_interval_ms: u64) -> web::Data<AppState> {
    let config = EngineConfig {
        poll_window_ms,
        poll_retry_interval_ms,
        ..EngineConfig::default()
    };
    build_state(Arc::new(MemoryRunStore::new()), config)
}
