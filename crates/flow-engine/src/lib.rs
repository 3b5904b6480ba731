//! flow-engine - the Engine side of the run protocol
//!
//! Hosts the Dispatch Service (agent registration and long-poll claims) and
//! the Callback API (idempotent start/end/finalize) over actix-web.

pub mod config;
pub mod controllers;
pub mod dto;
pub mod error;
pub mod server;
pub mod services;
pub mod state;

pub use config::EngineConfig;
pub use error::{AppError, Result};
pub use state::AppState;
