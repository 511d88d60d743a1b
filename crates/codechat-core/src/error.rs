//! Error types for the codechat engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire engine.
///
/// Errors raised *inside* executed code are not represented here: they are
/// data and end up in `ExecutionResult::output`. Every variant below is an
/// infrastructure failure that the caller has to surface to the user.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CodechatError {
    /// The backend never reached `ready`, has died, or cannot be located.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Communication with the backend failed while creating or driving a session.
    #[error("Session transport error: {0}")]
    SessionTransport(String),

    /// A run exceeded the configured execution timeout.
    #[error("Execution timed out after {seconds}s")]
    ExecutionTimedOut { seconds: u64 },

    /// The shadow interpreter exited with a nonzero status.
    #[error("Replay failed (stderr: {stderr})")]
    ReplayFailed { stdout: String, stderr: String },

    /// IO error on the conversation tree or an artifact.
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "JSON", "TOML"
        message: String,
    },

    #[error("Conversation not found: '{id}'")]
    ConversationNotFound { id: String },

    #[error("Message {message_id} not found in conversation '{conversation_id}'")]
    MessageNotFound {
        conversation_id: String,
        message_id: u64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CodechatError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a BackendUnavailable error
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable(message.into())
    }

    /// Creates a SessionTransport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::SessionTransport(message.into())
    }

    /// Creates a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Creates a ConversationNotFound error
    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        Self::ConversationNotFound { id: id.into() }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::SessionTransport(_))
    }

    /// Check if this error indicates a missing conversation or message.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound { .. } | Self::MessageNotFound { .. }
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for CodechatError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for CodechatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for CodechatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, CodechatError>`.
pub type Result<T> = std::result::Result<T, CodechatError>;
