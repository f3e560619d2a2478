//! Error types for the assistant core.

/// Session store precondition failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A message was handed to the store without an id.
    #[error("message id must not be empty")]
    EmptyMessageId,
}

/// Failures reported by a model backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The selected model has no backend configuration.
    #[error("model configuration not found for {0}")]
    UnknownModel(String),

    /// The backend did not answer within the allowed window.
    #[error("no response after {0} seconds")]
    Timeout(u64),

    /// Any other provider-side failure.
    #[error("backend request failed: {0}")]
    Request(String),
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}
