//! Declarative descriptions of entities and operations.
//!
//! Every data model entity carries a static [`EntityMeta`] table through the
//! [`Described`] trait. The tables drive schema export, redaction of
//! sensitive fields, and generated command-line bindings. Nothing here
//! changes how values behave at runtime.

use std::borrow::Cow;

use serde_json::{Map, Value, json};

use crate::descriptor::Capability;

/// Placeholder written in place of sensitive values.
pub const REDACTED: &str = "<redacted>";

/// The shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    /// ISO 8601 calendar date.
    Date,
    /// Local time of day.
    Time,
    /// RFC 3339 instant.
    DateTime,
    Uuid,
    /// One of a closed set of string values.
    Enum(&'static [&'static str]),
    /// A nested entity, named by its [`EntityMeta::name`].
    Object(&'static str),
    List(&'static FieldKind),
    /// Free-form string keys and values.
    Map,
}

impl FieldKind {
    /// Returns the JSON-schema fragment for this kind.
    pub fn schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Date => json!({"type": "string", "format": "date"}),
            Self::Time => json!({"type": "string", "format": "time"}),
            Self::DateTime => json!({"type": "string", "format": "date-time"}),
            Self::Uuid => json!({"type": "string", "format": "uuid"}),
            Self::Enum(values) => json!({"type": "string", "enum": values}),
            Self::Object(name) => json!({"$ref": format!("#/definitions/{name}")}),
            Self::List(inner) => json!({"type": "array", "items": inner.schema()}),
            Self::Map => json!({"type": "object", "additionalProperties": {"type": "string"}}),
        }
    }

    /// Returns a short placeholder used in help text (e.g. `DATE`).
    pub fn value_name(&self) -> &'static str {
        match self {
            Self::String | Self::Enum(_) => "TEXT",
            Self::Integer => "ID",
            Self::Boolean => "BOOL",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "INSTANT",
            Self::Uuid => "UUID",
            Self::Object(_) | Self::Map => "JSON",
            Self::List(inner) => inner.value_name(),
        }
    }
}

/// Description of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    /// Serialized field name.
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Sensitive values are replaced by [`REDACTED`] in logs and exports.
    pub sensitive: bool,
    pub doc: &'static str,
    /// Command-line flag override; defaults to the dashed field name.
    pub flag: Option<&'static str>,
}

impl FieldMeta {
    /// A required field.
    pub const fn required(name: &'static str, kind: FieldKind, doc: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            sensitive: false,
            doc,
            flag: None,
        }
    }

    /// An optional field.
    pub const fn optional(name: &'static str, kind: FieldKind, doc: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, doc)
        }
    }

    /// Marks the field as sensitive.
    pub const fn sensitive(self) -> Self {
        Self {
            sensitive: true,
            ..self
        }
    }

    /// Overrides the command-line flag name.
    pub const fn flag(self, flag: &'static str) -> Self {
        Self {
            flag: Some(flag),
            ..self
        }
    }

    /// Returns the command-line flag name for this field.
    pub fn flag_name(&self) -> Cow<'static, str> {
        match self.flag {
            Some(flag) => Cow::Borrowed(flag),
            None if self.name.contains('_') => Cow::Owned(self.name.replace('_', "-")),
            None => Cow::Borrowed(self.name),
        }
    }
}

/// Description of an entity.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityMeta {
    /// Snake-case entity name, also used as the wire tag.
    pub name: &'static str,
    pub doc: &'static str,
    pub fields: &'static [FieldMeta],
}

impl EntityMeta {
    /// Looks up a field by its serialized name.
    pub fn field(&self, name: &str) -> Option<&'static FieldMeta> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns the serialized field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|field| field.name)
    }

    /// Returns a JSON-schema-like description of the entity.
    pub fn schema(&self) -> Value {
        let mut properties = Map::new();
        for field in self.fields {
            let mut schema = field.kind.schema();
            if let Value::Object(object) = &mut schema {
                object.insert("description".into(), Value::from(field.doc));
                if field.sensitive {
                    object.insert("x-sensitive".into(), Value::Bool(true));
                }
            }
            properties.insert(field.name.into(), schema);
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name)
            .collect();

        json!({
            "title": self.name,
            "description": self.doc,
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Returns a copy of `value` with sensitive fields replaced.
    ///
    /// Nested entities are redacted through their own metadata, looked up
    /// in [`entity`] by name.
    pub fn redact(&self, value: &Value) -> Value {
        let Value::Object(object) = value else {
            return value.clone();
        };
        let redacted = object
            .iter()
            .map(|(key, inner)| {
                let inner = match self.field(key) {
                    Some(field) if field.sensitive => Value::from(REDACTED),
                    Some(field) => redact_kind(&field.kind, inner),
                    None => inner.clone(),
                };
                (key.clone(), inner)
            })
            .collect();
        Value::Object(redacted)
    }
}

fn redact_kind(kind: &FieldKind, value: &Value) -> Value {
    match (kind, value) {
        (FieldKind::Object(name), _) => match entity(name) {
            Some(meta) => meta.redact(value),
            None => value.clone(),
        },
        (FieldKind::List(inner), Value::Array(items)) => {
            Value::Array(items.iter().map(|item| redact_kind(inner, item)).collect())
        }
        _ => value.clone(),
    }
}

/// Implemented by every data model entity.
pub trait Described {
    /// Returns the entity's metadata table.
    fn meta() -> &'static EntityMeta;
}

/// Description of a provider operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationMeta {
    /// Operation name, also the command-line subcommand.
    pub name: &'static str,
    /// Capability the provider must declare.
    pub capability: Capability,
    pub doc: &'static str,
    pub params: &'static [FieldMeta],
}

impl OperationMeta {
    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&'static FieldMeta> {
        self.params.iter().find(|param| param.name == name)
    }
}

static ENTITIES: &[&EntityMeta] = &[
    &crate::person::PERSON_META,
    &crate::person::NAME_META,
    &crate::person::ROLE_META,
    &crate::person::ROLE_GRANT_META,
    &crate::group::GROUP_META,
    &crate::group::GROUP_KIND_META,
    &crate::group::MEMBERSHIP_META,
    &crate::lesson::SUBJECT_META,
    &crate::lesson::LESSON_SLOT_META,
    &crate::time::TIME_RANGE_META,
    &crate::time::DATE_RANGE_META,
    &crate::time::PERIOD_META,
    &crate::attendance::ATTENDANCE_MARK_META,
    &crate::attendance::MARK_SOURCE_META,
    &crate::timetable::TIMETABLE_META,
    &crate::timetable::TIMETABLE_ENTRY_META,
    &crate::timetable::BELL_SCHEDULE_META,
    &crate::timetable::BELL_ENTRY_META,
    &crate::token::AUTHENTICATION_TOKEN_META,
    &crate::descriptor::PROVIDER_DESCRIPTOR_META,
];

/// Returns every entity description, in a stable order.
pub fn entities() -> &'static [&'static EntityMeta] {
    ENTITIES
}

/// Looks up an entity description by name.
pub fn entity(name: &str) -> Option<&'static EntityMeta> {
    ENTITIES.iter().copied().find(|meta| meta.name == name)
}

/// Returns a schema document with every entity under `definitions`.
pub fn schema_document() -> Value {
    let definitions: Map<String, Value> = ENTITIES
        .iter()
        .map(|meta| (meta.name.to_string(), meta.schema()))
        .collect();
    json!({ "definitions": definitions })
}

#[cfg(test)]
mod tests {
    use super::*;

    static SAMPLE: EntityMeta = EntityMeta {
        name: "sample",
        doc: "A sample",
        fields: &[
            FieldMeta::required("user_id", FieldKind::Integer, "Owner"),
            FieldMeta::required("secret", FieldKind::String, "Secret").sensitive(),
            FieldMeta::optional("token", FieldKind::Object("authentication_token"), "Nested"),
            FieldMeta::optional("on", FieldKind::Date, "Day").flag("date"),
        ],
    };

    #[test]
    fn flag_names() {
        assert_eq!(SAMPLE.fields[0].flag_name(), "user-id");
        assert_eq!(SAMPLE.fields[1].flag_name(), "secret");
        assert_eq!(SAMPLE.fields[3].flag_name(), "date");
    }

    #[test]
    fn schema_lists_required_fields() {
        let schema = SAMPLE.schema();
        assert_eq!(schema["title"], "sample");
        assert_eq!(schema["required"], json!(["user_id", "secret"]));
        assert_eq!(schema["properties"]["on"]["format"], "date");
        assert_eq!(schema["properties"]["secret"]["x-sensitive"], true);
        assert_eq!(
            schema["properties"]["token"]["$ref"],
            "#/definitions/authentication_token"
        );
    }

    #[test]
    fn redact_replaces_sensitive_and_recurses() {
        let value = json!({
            "user_id": 1,
            "secret": "hunter2",
            "token": {"token": "abc", "person": 1, "issued_at": "2022-09-01T08:00:00Z"},
            "extra": "kept",
        });
        let redacted = SAMPLE.redact(&value);
        assert_eq!(redacted["secret"], REDACTED);
        assert_eq!(redacted["token"]["token"], REDACTED);
        assert_eq!(redacted["token"]["person"], 1);
        assert_eq!(redacted["extra"], "kept");
        assert_eq!(redacted["user_id"], 1);
    }

    #[test]
    fn catalog_names_are_unique_and_resolvable() {
        let mut names: Vec<&str> = entities().iter().map(|meta| meta.name).collect();
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);

        for meta in entities() {
            for field in meta.fields {
                let mut kind = &field.kind;
                while let FieldKind::List(inner) = kind {
                    kind = inner;
                }
                if let FieldKind::Object(name) = kind {
                    assert!(entity(name).is_some(), "{}.{} -> {name}", meta.name, field.name);
                }
            }
        }
    }

    #[test]
    fn date_range_schema() {
        insta::assert_json_snapshot!(entity("date_range").unwrap().schema(), @r#"
        {
          "description": "Half-open interval of dates, open-ended without `until`",
          "properties": {
            "from": {
              "description": "First date",
              "format": "date",
              "type": "string"
            },
            "until": {
              "description": "Exclusive end date",
              "format": "date",
              "type": "string"
            }
          },
          "required": [
            "from"
          ],
          "title": "date_range",
          "type": "object"
        }
        "#);
    }

    #[test]
    fn schema_document_has_every_entity() {
        let document = schema_document();
        for meta in entities() {
            assert!(document["definitions"].get(meta.name).is_some());
        }
    }
}
