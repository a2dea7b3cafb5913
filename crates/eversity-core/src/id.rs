//! Identifier newtypes.
//!
//! Numeric identifiers are assigned by the upstream school information system
//! and are always positive. Attendance marks are identified by UUIDs so that
//! providers can mint them without coordination. Provider identifiers are
//! short lowercase tokens (e.g. `schools-by`, `memory`).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};

macro_rules! numeric_id {
    ($(#[$doc:meta])* $name:ident, $inner:ty, $repr:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = $repr, into = $repr)]
        pub struct $name($inner);

        impl $name {
            /// Creates an identifier, rejecting zero and negative values.
            pub fn new(value: $inner) -> ValidationResult<Self> {
                if value <= 0 {
                    return Err(ValidationError::non_positive(stringify!($name), "value", value));
                }
                Ok(Self(value))
            }

            /// Returns the raw value.
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl TryFrom<$inner> for $name {
            type Error = ValidationError;

            fn try_from(value: $inner) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a person (student or staff member).
    PersonId,
    i32,
    "i32"
);
numeric_id!(
    /// Identifier of a group (school class or subgroup).
    GroupId,
    i32,
    "i32"
);
numeric_id!(
    /// Identifier of a subject taught in lessons.
    SubjectId,
    i32,
    "i32"
);
numeric_id!(
    /// Identifier of a lesson slot.
    LessonId,
    i64,
    "i64"
);

/// Identifier of an attendance mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkId(Uuid);

impl MarkId {
    /// Mints a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for MarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase token: letters, digits, and single dashes, starting with a letter.
pub(crate) static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").expect("Invalid token regex")
});

/// Identifier of a registered provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    /// Creates a provider identifier.
    pub fn new(value: impl Into<String>) -> ValidationResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::empty("ProviderId", "value"));
        }
        if !TOKEN_REGEX.is_match(&value) {
            return Err(ValidationError::new(
                "ProviderId",
                "value",
                ValidationErrorKind::Malformed,
                format!("`{value}` is not a lowercase dash-separated token"),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProviderId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProviderId> for String {
    fn from(id: ProviderId) -> Self {
        id.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_reject_non_positive() {
        assert!(PersonId::new(1).is_ok());
        assert!(PersonId::new(0).is_err());
        assert!(LessonId::new(-5).is_err());

        let err = GroupId::new(0).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::NonPositive);
        assert_eq!(err.entity(), "GroupId");
    }

    #[test]
    fn numeric_ids_serialize_transparently() {
        let id = LessonId::new(9_000_000_001).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "9000000001");

        let parsed: PersonId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed.get(), 42);
    }

    #[test]
    fn numeric_ids_validate_on_deserialize() {
        assert!(serde_json::from_str::<PersonId>("0").is_err());
        assert!(serde_json::from_str::<SubjectId>("-1").is_err());
    }

    #[test]
    fn provider_id_format() {
        assert!(ProviderId::new("schools-by").is_ok());
        assert!(ProviderId::new("memory").is_ok());
        assert!(ProviderId::new("").is_err());
        assert!(ProviderId::new("Schools").is_err());
        assert!(ProviderId::new("has space").is_err());
        assert!(ProviderId::new("trailing-").is_err());
        assert!(ProviderId::new("9lives").is_err());
    }

    #[test]
    fn provider_id_deserialize_checks_format() {
        let id: ProviderId = serde_json::from_str("\"schools-by\"").unwrap();
        assert_eq!(id.as_str(), "schools-by");
        assert!(serde_json::from_str::<ProviderId>("\"NOPE\"").is_err());
    }

    #[test]
    fn mark_ids_are_unique() {
        assert_ne!(MarkId::generate(), MarkId::generate());
    }
}
