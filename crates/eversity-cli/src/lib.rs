//! Command-line front end for Eversity providers.
//!
//! This crate provides the `eversity` binary: schema export, document
//! validation, and provider operations whose flags are generated from the
//! operation metadata in `eversity-providers`.

pub mod bindings;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};
