//! Protocol error types.

use eversity_providers::{ProviderError, ProviderErrorKind};
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: u32 },

    /// Failed to serialize or parse a message.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid protocol version in message.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection closed before the full message was received.
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    /// Zero-length frame received.
    #[error("empty message")]
    EmptyMessage,

    /// The peer answered with a response that does not fit the request.
    #[error("unexpected response: expected {expected}, got {received}")]
    UnexpectedResponse {
        expected: &'static str,
        received: &'static str,
    },

    /// Operation timed out.
    #[error("timeout during {operation}")]
    Timeout { operation: String },
}

impl ProtocolError {
    /// Returns the provider error kind this failure is reported as.
    ///
    /// Transport failures are `Unavailable`, a peer speaking another
    /// version is a misconfiguration, and garbled payloads are bad data.
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Io(_) | Self::IncompleteMessage { .. } | Self::EmptyMessage | Self::Timeout { .. } => {
                ProviderErrorKind::Unavailable
            }
            Self::UnsupportedVersion(_) => ProviderErrorKind::CapabilityMismatch,
            Self::Serialization(_) | Self::MessageTooLarge { .. } => {
                ProviderErrorKind::DataValidation
            }
            Self::UnexpectedResponse { .. } => ProviderErrorKind::Unknown,
        }
    }
}

impl From<ProtocolError> for ProviderError {
    fn from(err: ProtocolError) -> Self {
        ProviderError::new(err.kind(), err.to_string()).with_source(err)
    }
}
