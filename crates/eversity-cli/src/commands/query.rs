//! Query command: runs one provider operation through a registry.

use std::time::Duration;

use eversity_core::{CodecError, ProviderId, metadata, to_json_pretty};
use eversity_providers::{Entity, OperationCall, ProviderRegistry};
use serde_json::Value;
use tracing::{debug, warn};

use crate::bindings;
use crate::cli::SourceArgs;
use crate::commands::open_registry;
use crate::config::CliConfig;
use crate::error::CliResult;

/// Options of one `query` invocation.
#[derive(Debug, Clone)]
pub struct QueryOptions<'a> {
    pub source: &'a SourceArgs,
    /// Identifier given to a dataset provider.
    pub id: &'a str,
    pub deadline: Option<Duration>,
    pub redact: bool,
    /// Operation name followed by its flags.
    pub operation: &'a [String],
}

/// Run the operation and print its result as JSON.
pub async fn run(config: &CliConfig, options: QueryOptions<'_>) -> CliResult<()> {
    let call = bindings::parse(options.operation)?;
    let (registry, id) = open_registry(config, options.source, options.id).await?;
    let output = execute(&registry, &id, call, options.deadline, options.redact).await;

    if let Err(err) = registry.deregister(&id).await {
        warn!(provider = %id, error = %err, "Provider did not stop cleanly");
    }
    println!("{}", to_json_pretty(&output?)?);
    Ok(())
}

async fn execute(
    registry: &ProviderRegistry,
    id: &ProviderId,
    call: OperationCall,
    deadline: Option<Duration>,
    redact: bool,
) -> CliResult<Value> {
    registry.start(id).await?;
    debug!(provider = %id, capability = %call.capability(), "Running operation");
    match call {
        OperationCall::Fetch(query) => {
            let entities = registry.fetch(id, query, deadline).await?;
            let rendered = entities
                .iter()
                .map(|entity| render(entity, redact))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(rendered))
        }
        OperationCall::Submit(submission) => {
            let acknowledgement = registry.submit(id, submission, deadline).await?;
            Ok(serde_json::to_value(acknowledgement).map_err(CodecError::from)?)
        }
    }
}

fn render(entity: &Entity, redact: bool) -> Result<Value, CodecError> {
    let value = serde_json::to_value(entity)?;
    if !redact {
        return Ok(value);
    }
    Ok(match metadata::entity(entity.kind().as_str()) {
        Some(meta) => meta.redact(&value),
        None => value,
    })
}
