//! Serve command: exposes a dataset to other processes over the provider
//! protocol.

use std::path::Path;

use crate::error::CliResult;

/// Serve the dataset on `socket` until Ctrl-C.
#[cfg(unix)]
pub async fn run(dataset: &Path, socket: &Path, id: &str) -> CliResult<()> {
    use std::sync::Arc;

    use eversity_protocol::{bind_unix, serve_unix};
    use eversity_providers::Provider;
    use tracing::{debug, error, info};

    use crate::commands::memory_provider;

    let provider = memory_provider(dataset, id)?;
    let descriptor = provider.describe();
    provider.on_load()?;

    let listener = bind_unix(socket).await?;
    info!(
        provider = %descriptor.id,
        socket = %socket.display(),
        capabilities = descriptor.capabilities.len(),
        "Serving dataset"
    );
    let provider: Arc<dyn Provider> = Arc::new(provider);
    serve_unix(listener, Arc::clone(&provider), async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
        }
    })
    .await?;

    provider.on_unload();
    if let Err(err) = std::fs::remove_file(socket) {
        debug!(error = %err, "Socket already removed");
    }
    info!("Server stopped");
    Ok(())
}

#[cfg(not(unix))]
pub async fn run(_dataset: &Path, _socket: &Path, _id: &str) -> CliResult<()> {
    Err(crate::error::CliError::Usage(
        "serving over a socket is only supported on Unix".into(),
    ))
}
