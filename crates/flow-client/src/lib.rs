//! flow-client - the Agent's handle on the Engine
//!
//! [`EngineApi`] is the seam the poller and run processor depend on;
//! [`EngineClient`] is the HTTP implementation, built once at startup and
//! shared by reference.

pub mod client;
pub mod client_trait;
pub mod error;

pub use client::{EngineClient, EngineClientConfig};
pub use client_trait::EngineApi;
pub use error::{ClientError, ClientResult};
