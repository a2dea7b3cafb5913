//! Request and response types for the provider protocol.

use eversity_core::{ProviderDescriptor, ProviderId};
use eversity_providers::{
    Acknowledgement, Entity, EntityQuery, ProviderError, ProviderErrorKind, Submission,
};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Message envelope wrapping all protocol messages.
///
/// Every message exchanged between a registry and an out-of-process
/// integration is wrapped in this envelope, which provides versioning and
/// request correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Unique request ID for correlation.
    pub request_id: String,
    /// The actual payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current protocol version.
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Creates a request envelope.
    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    /// Creates a response envelope.
    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    /// Checks if this envelope uses a compatible protocol version.
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Requests sent to an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ask for the provider descriptor.
    Describe,

    /// Run a query.
    Fetch { query: EntityQuery },

    /// Send a write.
    Submit { submission: Submission },

    /// Ping to check liveness.
    Ping,
}

impl Request {
    /// Returns the request name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Describe => "describe",
            Self::Fetch { .. } => "fetch",
            Self::Submit { .. } => "submit",
            Self::Ping => "ping",
        }
    }
}

/// Responses sent back by an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Descriptor { descriptor: ProviderDescriptor },

    Entities { entities: Vec<Entity> },

    Acknowledgement { acknowledgement: Acknowledgement },

    /// The request failed.
    Error(ErrorPayload),

    Pong,
}

impl Response {
    /// Creates an error response from a provider error.
    pub fn error(err: &ProviderError) -> Self {
        Self::Error(ErrorPayload::from(err))
    }

    /// Returns the response name, as used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Descriptor { .. } => "descriptor",
            Self::Entities { .. } => "entities",
            Self::Acknowledgement { .. } => "acknowledgement",
            Self::Error(_) => "error",
            Self::Pong => "pong",
        }
    }
}

/// A provider error on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable [`ProviderErrorKind`] code.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
}

impl ErrorPayload {
    /// Rebuilds the provider error; unknown codes become `Unknown`.
    pub fn into_error(self) -> ProviderError {
        let error = ProviderError::new(ProviderErrorKind::from_code(&self.code), self.message);
        match &self.provider {
            Some(provider) => error.with_provider(provider),
            None => error,
        }
    }
}

impl From<&ProviderError> for ErrorPayload {
    fn from(err: &ProviderError) -> Self {
        Self {
            code: err.kind().as_str().to_string(),
            message: err.message().to_string(),
            provider: err.provider().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eversity_core::GroupId;
    use insta::assert_json_snapshot;

    #[test]
    fn request_wire_shape() {
        let envelope = Envelope::request(
            "req-1",
            Request::Fetch {
                query: EntityQuery::Timetable {
                    group: GroupId::new(10).unwrap(),
                },
            },
        );
        assert_json_snapshot!(envelope, @r###"
        {
          "protocol_version": "1",
          "request_id": "req-1",
          "payload": {
            "type": "fetch",
            "query": {
              "query": "timetable",
              "group": 10
            }
          }
        }
        "###);
    }

    #[test]
    fn error_response_wire_shape() {
        let err = ProviderError::authorization("token revoked")
            .with_provider(&ProviderId::new("schools-by").unwrap());
        assert_json_snapshot!(Response::error(&err), @r###"
        {
          "type": "error",
          "code": "authorization",
          "message": "token revoked",
          "provider": "schools-by"
        }
        "###);
    }

    #[test]
    fn error_payload_restores_kind() {
        for kind in ProviderErrorKind::ALL {
            let err = ProviderError::new(kind, "boom");
            assert_eq!(ErrorPayload::from(&err).into_error().kind(), kind);
        }

        let payload = ErrorPayload {
            code: "rate_limited".into(),
            message: "slow down".into(),
            provider: None,
        };
        let err = payload.into_error();
        assert_eq!(err.kind(), ProviderErrorKind::Unknown);
        assert_eq!(err.message(), "slow down");
    }

    #[test]
    fn incompatible_version() {
        let json = r#"{"protocol_version":"2","request_id":"x","payload":{"type":"ping"}}"#;
        let envelope: Envelope<Request> = serde_json::from_str(json).unwrap();
        assert!(!envelope.is_compatible());
        assert_eq!(envelope.payload.name(), "ping");
    }
}
