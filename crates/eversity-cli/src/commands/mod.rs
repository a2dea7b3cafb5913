//! Subcommand implementations.

pub mod config;
pub mod operations;
pub mod query;
pub mod schema;
pub mod serve;
pub mod status;
pub mod validate;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use eversity_core::{CodecError, ProviderId, from_json};
use eversity_providers::{Dataset, MemoryProvider, Provider, ProviderRegistry};
use tracing::debug;

use crate::cli::SourceArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Reads a file, or stdin when the path is `-`.
pub(crate) fn read_input(path: &Path) -> CliResult<String> {
    if path.as_os_str() == "-" {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        return Ok(input);
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Loads and checks a dataset file.
pub(crate) fn load_dataset(path: &Path) -> CliResult<Dataset> {
    Ok(from_json(&read_input(path)?)?)
}

/// Wraps a dataset file in a [`MemoryProvider`] named `id`.
pub(crate) fn memory_provider(path: &Path, id: &str) -> CliResult<MemoryProvider> {
    let id = ProviderId::new(id).map_err(CodecError::from)?;
    let dataset = load_dataset(path)?;
    debug!(
        provider = %id,
        people = dataset.people.len(),
        lessons = dataset.lessons.len(),
        marks = dataset.marks.len(),
        "Loaded dataset"
    );
    Ok(MemoryProvider::new(id, dataset).map_err(CodecError::from)?)
}

/// Builds a registry holding the provider named by `source`.
///
/// The provider is registered but not started.
pub(crate) async fn open_registry(
    config: &CliConfig,
    source: &SourceArgs,
    id: &str,
) -> CliResult<(ProviderRegistry, ProviderId)> {
    let provider: Arc<dyn Provider> = match (&source.dataset, &source.socket) {
        (Some(path), _) => Arc::new(memory_provider(path, id)?),
        (None, Some(socket)) => connect(config, socket).await?,
        (None, None) => {
            return Err(CliError::Usage(
                "either --dataset or --socket is required".into(),
            ));
        }
    };
    let id = provider.describe().id;
    let registry = ProviderRegistry::builder(config.registry.clone())
        .register_shared(provider)?
        .build()?;
    Ok((registry, id))
}

#[cfg(unix)]
async fn connect(config: &CliConfig, socket: &Path) -> CliResult<Arc<dyn Provider>> {
    use eversity_protocol::{RemoteProvider, UnixConnector};

    let remote =
        RemoteProvider::connect(UnixConnector::new(socket), config.registry.default_deadline)
            .await?;
    Ok(Arc::new(remote))
}

#[cfg(not(unix))]
async fn connect(_config: &CliConfig, _socket: &Path) -> CliResult<Arc<dyn Provider>> {
    Err(CliError::Usage(
        "socket providers are only supported on Unix".into(),
    ))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dataset_source_builds_a_registry() {
        let (_dir, path) = fixtures::dataset_file();
        let source = SourceArgs {
            dataset: Some(path),
            socket: None,
        };
        let (registry, id) = open_registry(&CliConfig::default(), &source, "school")
            .await
            .unwrap();
        assert_eq!(id.as_str(), "school");
        assert_eq!(registry.ids().count(), 1);
    }

    #[test]
    fn bad_dataset_is_a_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"people": [{"id": 0}]}"#).unwrap();
        assert!(matches!(load_dataset(&path), Err(CliError::Codec(_))));

        let missing = dir.path().join("absent.json");
        assert!(matches!(load_dataset(&missing), Err(CliError::Io(_))));
    }

    #[test]
    fn provider_id_is_checked() {
        let (_dir, path) = fixtures::dataset_file();
        assert!(matches!(
            memory_provider(&path, "Not An Id"),
            Err(CliError::Codec(_))
        ));
    }
}
