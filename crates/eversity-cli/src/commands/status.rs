//! Status command.

use eversity_core::{ProviderDescriptor, to_json_pretty};
use eversity_providers::RegistrationStatus;
use serde::Serialize;
use tracing::warn;

use crate::cli::SourceArgs;
use crate::commands::open_registry;
use crate::config::CliConfig;
use crate::error::CliResult;

#[derive(Serialize)]
struct Report<'a> {
    descriptor: &'a ProviderDescriptor,
    registrations: Vec<RegistrationStatus>,
}

/// Start the provider and print its descriptor and registration state.
///
/// A provider that fails to start is still reported, with the failure in
/// `last_error`.
pub async fn run(config: &CliConfig, source: &SourceArgs, id: &str) -> CliResult<()> {
    let (registry, id) = open_registry(config, source, id).await?;
    if let Err(err) = registry.start(&id).await {
        warn!(provider = %id, error = %err, "Provider failed to start");
    }
    let report = Report {
        descriptor: registry.descriptor(&id)?,
        registrations: registry.snapshot().await,
    };
    let output = to_json_pretty(&report)?;
    registry.deregister(&id).await?;
    println!("{output}");
    Ok(())
}
