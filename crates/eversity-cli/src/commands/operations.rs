//! Operations command.

use crate::bindings;
use crate::error::CliResult;

/// Print every provider operation with its flags.
pub fn run() -> CliResult<()> {
    let mut command = bindings::command().name("eversity query --dataset <FILE>");
    println!("{}", command.render_long_help());
    for operation in eversity_providers::OPERATIONS {
        if let Some(subcommand) = command.find_subcommand_mut(operation.name) {
            println!("{}", subcommand.render_long_help());
        }
    }
    Ok(())
}
