//! The provider error taxonomy.
//!
//! Every failure that crosses the provider boundary is a [`ProviderError`]
//! carrying one of a closed set of [`ProviderErrorKind`]s. Each kind has a
//! stable wire code, a retryability flag, an operator-facing message class
//! and a process exit code. [`ProviderError::classify`] maps any other error
//! into the taxonomy without dropping it.

use std::error::Error as StdError;
use std::fmt;

use eversity_core::{CodecError, ProviderId, ValidationError};
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// The integration cannot be reached, timed out, or has been deregistered.
    Unavailable,
    /// The operation was not declared by the provider.
    CapabilityMismatch,
    /// The integration returned data that violates the data model.
    DataValidation,
    /// The integration refused the request.
    Authorization,
    /// Anything else.
    Unknown,
}

impl ProviderErrorKind {
    pub const ALL: [ProviderErrorKind; 5] = [
        Self::Unavailable,
        Self::CapabilityMismatch,
        Self::DataValidation,
        Self::Authorization,
        Self::Unknown,
    ];

    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Returns the stable wire code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "provider_unavailable",
            Self::CapabilityMismatch => "capability_mismatch",
            Self::DataValidation => "data_validation",
            Self::Authorization => "authorization",
            Self::Unknown => "unknown_provider_error",
        }
    }

    /// Parses a wire code; unrecognized codes map to [`Self::Unknown`].
    pub fn from_code(code: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == code)
            .unwrap_or(Self::Unknown)
    }

    /// Returns the operator-facing message class.
    pub fn message_class(&self) -> &'static str {
        match self {
            Self::Unavailable => "integration unavailable",
            Self::CapabilityMismatch => "misconfiguration",
            Self::DataValidation => "bad upstream data",
            Self::Authorization => "access denied",
            Self::Unknown => "integration failure",
        }
    }

    /// Returns the process exit code reported for this kind (sysexits).
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Unavailable => 69,
            Self::CapabilityMismatch => 78,
            Self::DataValidation => 65,
            Self::Authorization => 77,
            Self::Unknown => 70,
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while interacting with a provider.
#[derive(Debug, Error)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    /// The provider that generated this error.
    provider: Option<ProviderId>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given kind and message.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    /// Creates a capability mismatch error.
    pub fn capability_mismatch(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::CapabilityMismatch, message)
    }

    /// Creates a data validation error.
    pub fn data_validation(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::DataValidation, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authorization, message)
    }

    /// Creates an unknown error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unknown, message)
    }

    /// Maps any error into the taxonomy.
    ///
    /// - a `ProviderError` is returned unchanged
    /// - a `ValidationError` or `CodecError` becomes `DataValidation`
    /// - an I/O error or an elapsed deadline becomes `Unavailable`
    /// - anything else becomes `Unknown`
    ///
    /// The original error is kept as the source in every case but the first.
    pub fn classify<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let err = match err.into().downcast::<ProviderError>() {
            Ok(err) => return *err,
            Err(err) => err,
        };
        let err = match err.downcast::<ValidationError>() {
            Ok(err) => return Self::from(*err),
            Err(err) => err,
        };
        let err = match err.downcast::<CodecError>() {
            Ok(err) => return Self::from(*err),
            Err(err) => err,
        };
        let err = match err.downcast::<std::io::Error>() {
            Ok(err) => return Self::from(*err),
            Err(err) => err,
        };
        let err = match err.downcast::<tokio::time::error::Elapsed>() {
            Ok(err) => return Self::from(*err),
            Err(err) => err,
        };
        Self {
            kind: ProviderErrorKind::Unknown,
            message: err.to_string(),
            provider: None,
            source: Some(err),
        }
    }

    /// Sets the provider for this error, unless one is already set.
    pub fn with_provider(mut self, provider: &ProviderId) -> Self {
        if self.provider.is_none() {
            self.provider = Some(provider.clone());
        }
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider, if set.
    pub fn provider(&self) -> Option<&ProviderId> {
        self.provider.as_ref()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns a copy without the source chain.
    pub fn detached(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            provider: self.provider.clone(),
            source: None,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<ValidationError> for ProviderError {
    fn from(err: ValidationError) -> Self {
        Self::data_validation(err.to_string()).with_source(err)
    }
}

impl From<CodecError> for ProviderError {
    fn from(err: CodecError) -> Self {
        Self::data_validation(err.to_string()).with_source(err)
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        Self::unavailable(err.to_string()).with_source(err)
    }
}

impl From<tokio::time::error::Elapsed> for ProviderError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::unavailable("deadline exceeded").with_source(err)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_retryable() {
        for kind in ProviderErrorKind::ALL {
            assert_eq!(kind.is_retryable(), kind == ProviderErrorKind::Unavailable);
        }
    }

    #[test]
    fn codes_round_trip() {
        for kind in ProviderErrorKind::ALL {
            assert_eq!(ProviderErrorKind::from_code(kind.as_str()), kind);
        }
        assert_eq!(
            ProviderErrorKind::from_code("something_new"),
            ProviderErrorKind::Unknown
        );
    }

    #[test]
    fn message_classes_and_exit_codes_are_distinct() {
        let mut classes: Vec<&str> = ProviderErrorKind::ALL
            .iter()
            .map(ProviderErrorKind::message_class)
            .collect();
        let mut codes: Vec<u8> = ProviderErrorKind::ALL
            .iter()
            .map(ProviderErrorKind::exit_code)
            .collect();
        classes.sort_unstable();
        classes.dedup();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(classes.len(), ProviderErrorKind::ALL.len());
        assert_eq!(codes.len(), ProviderErrorKind::ALL.len());
        assert!(codes.iter().all(|code| *code != 0));
    }

    #[test]
    fn provider_error_display() {
        let provider = ProviderId::new("schools-by").unwrap();
        let err = ProviderError::unavailable("connection refused").with_provider(&provider);
        let display = format!("{}", err);
        assert!(display.contains("[schools-by]"));
        assert!(display.contains("provider_unavailable"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn with_provider_keeps_the_first() {
        let first = ProviderId::new("remote").unwrap();
        let second = ProviderId::new("registry").unwrap();
        let err = ProviderError::unknown("boom")
            .with_provider(&first)
            .with_provider(&second);
        assert_eq!(err.provider(), Some(&first));
    }

    #[test]
    fn classify_keeps_provider_errors() {
        let err = ProviderError::classify(ProviderError::authorization("token revoked"));
        assert_eq!(err.kind(), ProviderErrorKind::Authorization);
        assert_eq!(err.message(), "token revoked");
    }

    #[test]
    fn classify_validation_errors() {
        let err = ProviderError::classify(ValidationError::empty("Group", "title"));
        assert_eq!(err.kind(), ProviderErrorKind::DataValidation);
        assert!(err.source().is_some());
    }

    #[test]
    fn classify_io_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ProviderError::classify(io);
        assert_eq!(err.kind(), ProviderErrorKind::Unavailable);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn classify_elapsed_deadline() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            ProviderError::classify(elapsed).kind(),
            ProviderErrorKind::Unavailable
        );
    }

    #[test]
    fn classify_anything_else_as_unknown() {
        #[derive(Debug, Error)]
        #[error("upstream exploded")]
        struct Upstream;

        let err = ProviderError::classify(Upstream);
        assert_eq!(err.kind(), ProviderErrorKind::Unknown);
        assert_eq!(err.message(), "upstream exploded");
        assert!(err.source().unwrap().downcast_ref::<Upstream>().is_some());

        let err = ProviderError::classify("plain message");
        assert_eq!(err.kind(), ProviderErrorKind::Unknown);
    }
}
