//! Error types for rule engine operations

use thiserror::Error;

/// Main error type for rule engine operations
#[derive(Debug, Error)]
pub enum RewriteError {
    /// Pattern rejected by the regex dialect
    #[error("Invalid rule pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A command field failed validation
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Message `type` is missing or not part of the protocol
    #[error("Unknown message type")]
    UnknownCommand { kind: Option<String> },

    /// Message `type` is known but its fields do not fit
    #[error("Malformed {kind} message: {reason}")]
    MalformedCommand { kind: String, reason: String },

    /// Persistence boundary failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filter engine boundary failure
    #[error("Filter engine error: {0}")]
    FilterEngine(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The dispatcher mailbox is no longer running
    #[error("Command channel closed")]
    ChannelClosed,
}

impl RewriteError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the caller sent something the engine refuses, as opposed
    /// to a backend failing underneath it.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RewriteError::InvalidPattern { .. }
                | RewriteError::Validation { .. }
                | RewriteError::UnknownCommand { .. }
                | RewriteError::MalformedCommand { .. }
        )
    }
}

impl From<serde_json::Error> for RewriteError {
    fn from(err: serde_json::Error) -> Self {
        RewriteError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for RewriteError {
    fn from(err: sqlx::Error) -> Self {
        RewriteError::Storage(err.to_string())
    }
}
