use shared::{domain::Scope, error::ErrorCode};
use thiserror::Error;

/// Failure of a single page fetch. Never escapes a controller mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request rejected with status {status} ({code:?}): {message}")]
    Status {
        status: u16,
        code: ErrorCode,
        message: String,
    },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            code: ErrorCode::from_status(status),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { code, .. } => {
                matches!(code, ErrorCode::RateLimited | ErrorCode::Internal)
            }
            FetchError::Decode(_) => false,
        }
    }
}

/// Programming errors in how a list is wired together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no resource is mapped for scope '{0}'")]
    UnmappedScope(Scope),
    #[error("invalid resource endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}
