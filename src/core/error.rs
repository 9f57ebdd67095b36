//! Error types for the bridge.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bridge operations.
#[derive(Error, Debug)]
pub enum Error {
    // Envelope errors
    #[error("Not an external envelope")]
    NotAnEnvelope,

    #[error("Envelope missing field: {0}")]
    EnvelopeMissingField(String),

    // Improvement pipeline errors
    #[error("Improver not found: {0}")]
    ImproverNotFound(String),

    #[error("Improver failed: {0}")]
    ImproverFailed(String),

    // Directory errors
    #[error("Directory request failed: {0}")]
    DirectoryUnavailable(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    // Collaborator errors
    #[error("Text generation failed: {0}")]
    GenerationFailed(String),

    #[error("Tool invocation failed: {0}")]
    ToolInvocationFailed(String),

    #[error("Delivery failed to {url}: {reason}")]
    DeliveryFailed { url: String, reason: String },

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
