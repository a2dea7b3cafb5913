//! Validate command: decodes a document as an entity and prints it back
//! in normalized form.

use std::path::Path;

use eversity_core::{
    AttendanceMark, AuthenticationToken, BellSchedule, CodecError, Described, EntityMeta, Group,
    LessonSlot, Person, ProviderDescriptor, Subject, Timetable, Validate, from_json, metadata,
    to_json_pretty,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::commands::read_input;
use crate::error::{CliError, CliResult};

/// Entities accepted by the command, besides `dataset`.
pub const ENTITIES: &[&str] = &[
    "person",
    "group",
    "subject",
    "lesson_slot",
    "attendance_mark",
    "timetable",
    "bell_schedule",
    "authentication_token",
    "provider_descriptor",
];

/// Validate `file` as `entity` and print the normalized document.
pub fn run(entity: &str, file: &Path, redact: bool) -> CliResult<()> {
    let input = read_input(file)?;
    println!("{}", normalize(entity, &input, redact)?);
    Ok(())
}

fn normalize(entity: &str, input: &str, redact: bool) -> CliResult<String> {
    let (value, meta) = match entity {
        "person" => decode::<Person>(input)?,
        "group" => decode::<Group>(input)?,
        "subject" => decode::<Subject>(input)?,
        "lesson_slot" => decode::<LessonSlot>(input)?,
        "attendance_mark" => decode::<AttendanceMark>(input)?,
        "timetable" => decode::<Timetable>(input)?,
        "bell_schedule" => decode::<BellSchedule>(input)?,
        "authentication_token" => decode::<AuthenticationToken>(input)?,
        "provider_descriptor" => decode::<ProviderDescriptor>(input)?,
        "dataset" => {
            let dataset: eversity_providers::Dataset = from_json(input)?;
            let value = serde_json::to_value(&dataset).map_err(CodecError::from)?;
            let value = if redact { redact_dataset(&value) } else { value };
            return Ok(to_json_pretty(&value)?);
        }
        other => {
            return Err(CliError::Usage(format!(
                "cannot validate `{other}`; expected dataset or one of: {}",
                ENTITIES.join(", ")
            )));
        }
    };
    let value = if redact { meta.redact(&value) } else { value };
    Ok(to_json_pretty(&value)?)
}

fn decode<T>(input: &str) -> Result<(Value, &'static EntityMeta), CodecError>
where
    T: DeserializeOwned + Serialize + Validate + Described,
{
    let entity: T = from_json(input)?;
    Ok((serde_json::to_value(&entity)?, T::meta()))
}

/// Redacts each collection of a dataset through its entity metadata.
fn redact_dataset(value: &Value) -> Value {
    let Value::Object(object) = value else {
        return value.clone();
    };
    let redacted = object
        .iter()
        .map(|(key, inner)| {
            let meta = match key.as_str() {
                "people" => metadata::entity("person"),
                "groups" => metadata::entity("group"),
                "lessons" => metadata::entity("lesson_slot"),
                "timetables" => metadata::entity("timetable"),
                "bell_schedule" => metadata::entity("bell_schedule"),
                "marks" => metadata::entity("attendance_mark"),
                _ => None,
            };
            let inner = match (meta, inner) {
                (Some(meta), Value::Array(items)) => {
                    Value::Array(items.iter().map(|item| meta.redact(item)).collect())
                }
                (Some(meta), _) => meta.redact(inner),
                (None, _) => inner.clone(),
            };
            (key.clone(), inner)
        })
        .collect();
    Value::Object(redacted)
}
