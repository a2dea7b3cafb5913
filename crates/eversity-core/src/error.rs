//! Validation errors for data model values.
//!
//! Every constructor in this crate that can reject its input returns a
//! [`ValidationError`]. The error names the entity and field that failed and
//! carries a [`ValidationErrorKind`] so callers can branch without parsing
//! the message.

use std::fmt;

use thiserror::Error;

/// The category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required text field is empty or blank.
    Empty,
    /// A numeric identifier or position is zero or negative.
    NonPositive,
    /// A range ends at or before its start.
    InvalidRange,
    /// Two temporally scoped values overlap where they must not.
    Overlap,
    /// A value references something that does not exist.
    MissingReference,
    /// A value appears twice where it must be unique.
    Duplicate,
    /// A value does not match its expected format.
    Malformed,
}

impl ValidationErrorKind {
    /// Returns the stable machine-readable name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::NonPositive => "non_positive",
            Self::InvalidRange => "invalid_range",
            Self::Overlap => "overlap",
            Self::MissingReference => "missing_reference",
            Self::Duplicate => "duplicate",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A data model value violated one of its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{entity}.{field}: {message} ({kind})")]
pub struct ValidationError {
    entity: &'static str,
    field: &'static str,
    kind: ValidationErrorKind,
    message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(
        entity: &'static str,
        field: &'static str,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity,
            field,
            kind,
            message: message.into(),
        }
    }

    /// Creates an error for an empty required field.
    pub fn empty(entity: &'static str, field: &'static str) -> Self {
        Self::new(entity, field, ValidationErrorKind::Empty, "must not be empty")
    }

    /// Creates an error for a non-positive number.
    pub fn non_positive(entity: &'static str, field: &'static str, value: impl fmt::Display) -> Self {
        Self::new(
            entity,
            field,
            ValidationErrorKind::NonPositive,
            format!("must be positive, got {value}"),
        )
    }

    /// Creates an error for a range whose end does not follow its start.
    pub fn invalid_range(
        entity: &'static str,
        field: &'static str,
        start: impl fmt::Display,
        end: impl fmt::Display,
    ) -> Self {
        Self::new(
            entity,
            field,
            ValidationErrorKind::InvalidRange,
            format!("end ({end}) must follow start ({start})"),
        )
    }

    /// Creates an error for a dangling reference.
    pub fn missing_reference(
        entity: &'static str,
        field: &'static str,
        reference: impl fmt::Display,
    ) -> Self {
        Self::new(
            entity,
            field,
            ValidationErrorKind::MissingReference,
            format!("references unknown {reference}"),
        )
    }

    /// Creates an error for a duplicated value.
    pub fn duplicate(entity: &'static str, field: &'static str, value: impl fmt::Display) -> Self {
        Self::new(
            entity,
            field,
            ValidationErrorKind::Duplicate,
            format!("duplicate value {value}"),
        )
    }

    /// Returns the entity name.
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Returns the offending field.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ValidationErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A specialized Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Fails with [`ValidationErrorKind::Empty`] when `value` is blank.
pub fn require_text(entity: &'static str, field: &'static str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::empty(entity, field))
    } else {
        Ok(())
    }
}
