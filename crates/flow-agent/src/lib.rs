//! flow-agent - claims runs from the Engine and executes them
//!
//! The [`poller::Poller`] long-polls the Engine for WorkflowRuns and TaskRuns
//! and hands every claimed run to the [`processor::RunProcessor`], which
//! drives it through a [`executor::TaskExecutor`].

pub mod config;
pub mod error;
pub mod executor;
pub mod poller;
pub mod processor;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AgentConfig;
pub use error::ProcessorError;
pub use executor::{LocalProcessExecutor, TaskExecutor};
pub use poller::Poller;
pub use processor::RunProcessor;
