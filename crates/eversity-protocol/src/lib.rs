//! Wire protocol for out-of-process providers.
//!
//! An integration can run in its own process and still speak the provider
//! contract: the registry side holds a [`RemoteProvider`], the integration
//! side runs [`serve_connection`] (or [`serve_unix`]) around its
//! [`Provider`](eversity_providers::Provider).
//!
//! # Protocol Overview
//!
//! Messages are sent as length-prefixed JSON:
//! - 4 bytes: message length (u32, big-endian)
//! - N bytes: JSON payload
//!
//! Every message is wrapped in an [`Envelope`] containing:
//! - `protocol_version`: Always "1" for this version
//! - `request_id`: UUID for request/response correlation
//! - `payload`: The actual request or response
//!
//! Failures travel as [`Response::Error`] with the stable error kind code,
//! so the caller sees the same `ProviderErrorKind` the integration raised.
//!
//! # Example
//!
//! ```rust
//! use eversity_protocol::{Envelope, Request, decode_message, encode_message};
//!
//! let request = Envelope::request("req-123", Request::Ping);
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod client;
mod error;
mod framing;
mod server;
mod types;

#[cfg(unix)]
pub use client::UnixConnector;
pub use client::{Connector, RemoteProvider};
pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameReader, FrameWriter, decode_message, encode_message};
pub use server::serve_connection;
#[cfg(unix)]
pub use server::{bind_unix, serve_unix};
pub use types::{Envelope, ErrorPayload, Request, Response};

/// Protocol version constant.
pub const PROTOCOL_VERSION: &str = "1";

/// Maximum message size (1 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
