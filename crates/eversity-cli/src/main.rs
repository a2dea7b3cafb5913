//! eversity CLI entry point.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use eversity_core::init_tracing;

use eversity_cli::cli::{Cli, Command, ConfigAction};
use eversity_cli::commands;
use eversity_cli::commands::query::QueryOptions;
use eversity_cli::config::CliConfig;
use eversity_cli::error::{CliError, CliResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match &e {
                // Operation flags are parsed late; let clap format them.
                CliError::Arguments(err) => {
                    let _ = err.print();
                }
                other => eprintln!("error: {other}"),
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(CliConfig::default_path);
    // Usable even when the file is broken.
    if let Command::Config {
        action: ConfigAction::Path,
    } = cli.command
    {
        return commands::config::path(&config_path);
    }

    let config = match cli.config {
        Some(ref path) => CliConfig::load_from(path)?,
        None => CliConfig::load()?,
    };

    let tracing = config.logging.tracing_config(cli.debug)?;
    if let Err(err) = init_tracing(tracing) {
        eprintln!("warning: {err}");
    }

    match cli.command {
        Command::Schema { entity } => commands::schema::run(entity.as_deref()),
        Command::Validate {
            entity,
            file,
            redact,
        } => commands::validate::run(&entity, &file, redact),
        Command::Operations => commands::operations::run(),
        Command::Query {
            source,
            id,
            deadline_ms,
            redact,
            operation,
        } => {
            let options = QueryOptions {
                source: &source,
                id: &id,
                deadline: deadline_ms.map(Duration::from_millis),
                redact,
                operation: &operation,
            };
            commands::query::run(&config, options).await
        }
        Command::Status { source, id } => commands::status::run(&config, &source, &id).await,
        Command::Serve {
            dataset,
            socket,
            id,
        } => commands::serve::run(&dataset, &socket, &id).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
