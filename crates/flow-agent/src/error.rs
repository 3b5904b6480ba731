use thiserror::Error;

use flow_client::ClientError;

use crate::executor::ExecutorError;

/// Failures while processing one claimed run.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("TaskRun {0} has no image")]
    MissingImage(String),

    #[error("admission denied: {0}")]
    AdmissionDenied(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Transport(#[from] ClientError),
}

impl ProcessorError {
    /// Message reported to the Engine with `EndTask(failed, ..)`.
    pub fn status_message(&self) -> String {
        match self {
            ProcessorError::MissingImage(_) => "NO_TASK_IMAGE".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ExecutorError> for ProcessorError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::AdmissionDenied(reason) => ProcessorError::AdmissionDenied(reason),
            other => ProcessorError::Execution(other.to_string()),
        }
    }
}
