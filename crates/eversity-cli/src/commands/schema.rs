//! Schema command.

use eversity_core::{metadata, to_json_pretty};

use crate::error::{CliError, CliResult};

/// Print the schema of one entity, or a document with all of them.
pub fn run(entity: Option<&str>) -> CliResult<()> {
    println!("{}", render(entity)?);
    Ok(())
}

fn render(entity: Option<&str>) -> CliResult<String> {
    let schema = match entity {
        Some(name) => metadata::entity(name)
            .ok_or_else(|| {
                let known: Vec<&str> = metadata::entities().iter().map(|meta| meta.name).collect();
                CliError::Usage(format!(
                    "unknown entity `{name}`; expected one of: {}",
                    known.join(", ")
                ))
            })?
            .schema(),
        None => metadata::schema_document(),
    };
    Ok(to_json_pretty(&schema)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_entity() {
        let schema: serde_json::Value =
            serde_json::from_str(&render(Some("authentication_token")).unwrap()).unwrap();
        assert_eq!(schema["title"], "authentication_token");
        assert_eq!(schema["properties"]["token"]["x-sensitive"], true);
    }

    #[test]
    fn whole_document() {
        let document: serde_json::Value = serde_json::from_str(&render(None).unwrap()).unwrap();
        let definitions = document["definitions"].as_object().unwrap();
        assert_eq!(definitions.len(), metadata::entities().len());
        assert!(definitions.contains_key("attendance_mark"));
    }

    #[test]
    fn unknown_entity_lists_the_known_ones() {
        let err = render(Some("grade")).unwrap_err();
        assert!(matches!(err, CliError::Usage(ref message) if message.contains("lesson_slot")));
    }
}
