//! Run Processor: drives one claimed run to its next callback.
//!
//! Every failure is caught at the run boundary. TaskRun failures become
//! `EndTask(failed, ..)`; WorkflowRun failures are only logged because the
//! Engine has no callback to fail a WorkflowRun.

mod task;
mod workflow;

use std::sync::Arc;
use std::time::Duration;

use flow_client::EngineApi;
use flow_core::{DeletionPolicy, TaskRun, WorkflowRun};

use crate::config::AgentConfig;
use crate::executor::TaskExecutor;

pub use task::{TaskDisposition, TaskReport};
pub use workflow::WorkflowDisposition;

/// Knobs the processor takes from [`AgentConfig`].
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub default_timeout: Duration,
    pub admission_timeout: Duration,
    pub deletion_policy: DeletionPolicy,
    pub cleanup_delay: Duration,
}

impl From<&AgentConfig> for ProcessorSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            default_timeout: config.default_timeout(),
            admission_timeout: config.admission_timeout(),
            deletion_policy: config.deletion_policy,
            cleanup_delay: config.cleanup_delay(),
        }
    }
}

pub struct RunProcessor {
    engine: Arc<dyn EngineApi>,
    executor: Arc<dyn TaskExecutor>,
    settings: ProcessorSettings,
}

impl RunProcessor {
    pub fn new(
        engine: Arc<dyn EngineApi>,
        executor: Arc<dyn TaskExecutor>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            engine,
            executor,
            settings,
        }
    }

    /// Process a WorkflowRun and log whatever went wrong.
    pub async fn handle_workflow_run(&self, run: WorkflowRun) {
        match self.process_workflow_run(&run).await {
            Ok(disposition) => log::debug!("[{}] workflow run {:?}", run.id, disposition),
            Err(e) => log::error!("[{}] workflow run processing failed: {}", run.id, e),
        }
    }

    /// Process a TaskRun and log whatever went wrong.
    pub async fn handle_task_run(&self, run: TaskRun) {
        match self.process_task_run(&run).await {
            Ok(TaskDisposition::Ended(report)) => log::info!(
                "[{}] task run ended {}",
                run.id,
                report.outcome.status
            ),
            Ok(disposition) => log::debug!("[{}] task run {:?}", run.id, disposition),
            Err(e) => log::error!("[{}] task run processing failed: {}", run.id, e),
        }
    }
}
