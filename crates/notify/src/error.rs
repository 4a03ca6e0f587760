//! Error types for the notification system.

use thiserror::Error;

/// Errors that can occur when talking to a messaging gateway.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rate limited by the service
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The platform API rejected the call
    #[error("{method} rejected ({code}): {description}")]
    Api {
        method: &'static str,
        code: i64,
        description: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors returned by operator command handlers.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The operator supplied unusable arguments; the text is shown back to them.
    #[error("{0}")]
    Usage(String),

    /// The handler failed while doing its work.
    #[error("command failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CommandError {
    /// Wrap any error as a handler failure.
    pub fn failed(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Failed(Box::new(error))
    }
}
