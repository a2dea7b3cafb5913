//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// eversity - School attendance data from any provider
#[derive(Debug, Parser)]
#[command(name = "eversity")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "EVERSITY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the JSON schema of the data model, or of one entity
    Schema {
        /// Entity name (e.g. `attendance_mark`); all entities when omitted
        entity: Option<String>,
    },

    /// Validate a JSON document against an entity and print it normalized
    Validate {
        /// Entity name (e.g. `person`, `dataset`)
        entity: String,

        /// JSON file to validate; `-` reads stdin
        file: PathBuf,

        /// Replace sensitive fields with a placeholder
        #[arg(long)]
        redact: bool,
    },

    /// List the provider operations and their flags
    Operations,

    /// Run a provider operation
    #[command(after_help = "Run `eversity operations` for the list of operations.")]
    Query {
        #[command(flatten)]
        source: SourceArgs,

        /// Provider identifier for a dataset source
        #[arg(long, default_value = "memory")]
        id: String,

        /// Deadline for the call in milliseconds (defaults to the configured one)
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Replace sensitive fields with a placeholder
        #[arg(long)]
        redact: bool,

        /// Operation name followed by its flags
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "OPERATION"
        )]
        operation: Vec<String>,
    },

    /// Show the registration state of a provider
    Status {
        #[command(flatten)]
        source: SourceArgs,

        /// Provider identifier for a dataset source
        #[arg(long, default_value = "memory")]
        id: String,
    },

    /// Serve a dataset over the provider protocol
    Serve {
        /// Dataset JSON file
        #[arg(long)]
        dataset: PathBuf,

        /// Socket path to listen on
        #[arg(long, env = "EVERSITY_SOCKET")]
        socket: PathBuf,

        /// Provider identifier to serve the dataset as
        #[arg(long, default_value = "memory")]
        id: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Where a provider comes from.
#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Answer from a dataset JSON file
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Forward to an integration listening on this socket
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the current configuration
    Dump,
    /// Validate the configuration file
    Validate,
    /// Show the configuration file path
    Path,
}
