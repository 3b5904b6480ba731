use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Transport failures talking to the Engine.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("engine request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("engine request failed: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("invalid engine url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status: 404, .. })
    }
}
