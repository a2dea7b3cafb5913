//! Provider contract, error taxonomy and registry.
//!
//! - [`Provider`] - The trait every school-system integration implements
//! - [`EntityQuery`], [`Entity`], [`Submission`] - What flows across it
//! - [`ProviderError`] - The closed error taxonomy every failure maps into
//! - [`ProviderRegistry`] - Routes calls by provider id and tracks health
//! - [`MemoryProvider`] - A provider serving an in-memory [`Dataset`]
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Schools.by   │   │ Dataset file │   │ Remote socket│
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ integration  │   │MemoryProvider│   │RemoteProvider│
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │                  │                  │
//!        │             Provider                │
//!        └──────────────────┼──────────────────┘
//!                           ▼
//!                 ┌───────────────────┐
//!                 │ ProviderRegistry  │  capability check, deadline,
//!                 └───────────────────┘  validation, health
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod provider;
pub mod query;
pub mod registry;

pub use config::{ConfigError, RegistryConfig};
pub use error::{ProviderError, ProviderErrorKind, ProviderResult};
pub use memory::{Dataset, FETCH_BELL_SCHEDULE, MemoryProvider};
pub use provider::{BoxFuture, ErrorProvider, Provider};
pub use query::{
    Acknowledgement, Entity, EntityQuery, OPERATIONS, OperationCall, Submission, operation,
};
pub use registry::{ProviderRegistry, ProviderState, RegistrationStatus, RegistryBuilder};
