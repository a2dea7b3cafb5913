//! CLI error types.

use eversity_core::{CodecError, TracingError};
use eversity_protocol::ProtocolError;
use eversity_providers::{ConfigError, ProviderError};
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("invalid data: {0}")]
    Codec(#[from] CodecError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("logging setup failed: {0}")]
    Tracing(#[from] TracingError),

    /// Rejected command-line arguments, including `--help` requests.
    #[error("{0}")]
    Arguments(#[from] clap::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// Returns the process exit code, following `sysexits.h`.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Provider(err) => err.kind().exit_code(),
            Self::Protocol(err) => err.kind().exit_code(),
            Self::Codec(_) => 65,
            Self::Usage(_) => 64,
            Self::Arguments(err) => u8::try_from(err.exit_code()).unwrap_or(64),
            Self::Io(_) => 74,
            Self::Config(_) => 78,
            Self::Tracing(_) => 70,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eversity_providers::ProviderErrorKind;

    #[test]
    fn provider_kinds_keep_their_codes() {
        for kind in ProviderErrorKind::ALL {
            let err = CliError::from(ProviderError::new(kind, "boom"));
            assert_eq!(err.exit_code(), kind.exit_code());
        }
    }

    #[test]
    fn other_codes() {
        assert_eq!(CliError::Usage("no".into()).exit_code(), 64);
        assert_eq!(
            CliError::from(ConfigError::Invalid("bad".into())).exit_code(),
            78
        );
        assert_eq!(
            CliError::from(std::io::Error::other("disk")).exit_code(),
            74
        );
        assert_eq!(
            CliError::from(ProtocolError::Timeout {
                operation: "fetch".into()
            })
            .exit_code(),
            69
        );
    }

    #[test]
    fn provider_message_is_shown_as_is() {
        let err = CliError::from(ProviderError::authorization("token expired"));
        assert!(err.to_string().contains("token expired"));
    }
}
