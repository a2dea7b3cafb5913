//! Command-line bindings generated from operation metadata.
//!
//! Each entry of [`OPERATIONS`] becomes a subcommand, and each of its
//! parameters a `--flag` named by [`FieldMeta::flag_name`] with the field doc
//! as help text. Parsed values are handed to [`OperationCall::bind`], so the
//! command line accepts exactly what the wire format accepts.

use clap::{Arg, ArgAction, ArgMatches, Command};
use eversity_core::{FieldKind, FieldMeta};
use eversity_providers::{OPERATIONS, OperationCall};
use serde_json::{Map, Value};

use crate::error::{CliError, CliResult};

/// Builds the operation command tree.
pub fn command() -> Command {
    let mut command = Command::new("operation")
        .about("Provider operations")
        .no_binary_name(true)
        .subcommand_required(true)
        .arg_required_else_help(true);
    for operation in OPERATIONS {
        let mut subcommand = Command::new(operation.name)
            .about(operation.doc)
            .after_help(format!("Requires the `{}` capability.", operation.capability));
        for param in operation.params {
            subcommand = subcommand.arg(arg(param));
        }
        command = command.subcommand(subcommand);
    }
    command
}

fn arg(param: &'static FieldMeta) -> Arg {
    let arg = Arg::new(param.name)
        .long(param.flag_name().into_owned())
        .value_name(param.kind.value_name())
        .help(param.doc)
        .required(param.required);
    match param.kind {
        FieldKind::Integer => arg.value_parser(clap::value_parser!(i64)),
        FieldKind::List(FieldKind::Integer) => arg
            .value_parser(clap::value_parser!(i64))
            .action(ArgAction::Append),
        FieldKind::List(_) => arg.action(ArgAction::Append),
        FieldKind::Boolean => arg.value_parser(clap::value_parser!(bool)),
        FieldKind::Enum(values) => arg.value_parser(values.to_vec()),
        _ => arg,
    }
}

/// Parses an operation and its flags, e.g.
/// `["fetch-roster", "--group", "10", "--date", "2022-09-05"]`.
pub fn parse<I, T>(args: I) -> CliResult<OperationCall>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    let Some((name, matches)) = matches.subcommand() else {
        return Err(CliError::Usage("no operation given".into()));
    };
    let Some(operation) = eversity_providers::operation(name) else {
        return Err(CliError::Usage(format!("unknown operation `{name}`")));
    };

    let mut params = Map::new();
    for param in operation.params {
        if let Some(value) = value(param, matches)? {
            params.insert(param.name.to_string(), value);
        }
    }
    Ok(OperationCall::bind(name, params)?)
}

fn value(param: &FieldMeta, matches: &ArgMatches) -> CliResult<Option<Value>> {
    let value = match param.kind {
        FieldKind::Integer => matches.get_one::<i64>(param.name).map(|id| Value::from(*id)),
        FieldKind::Boolean => matches.get_one::<bool>(param.name).map(|flag| Value::from(*flag)),
        FieldKind::List(FieldKind::Integer) => matches
            .get_many::<i64>(param.name)
            .map(|ids| ids.copied().map(Value::from).collect()),
        FieldKind::List(_) => matches
            .get_many::<String>(param.name)
            .map(|items| items.cloned().map(Value::from).collect()),
        FieldKind::Object(_) | FieldKind::Map => match matches.get_one::<String>(param.name) {
            Some(raw) => Some(object(param, raw)?),
            None => None,
        },
        _ => matches.get_one::<String>(param.name).cloned().map(Value::from),
    };
    Ok(value)
}

/// Object parameters take inline JSON, or `@path` to read it from a file.
fn object(param: &FieldMeta, raw: &str) -> CliResult<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text)
        .map_err(|err| CliError::Usage(format!("--{}: invalid JSON: {err}", param.flag_name())))
}
