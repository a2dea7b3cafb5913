//! JSON encoding of data model values.
//!
//! Decoding runs [`Validate::validate`] after deserialization, so a value
//! that breaks an entity-level invariant is reported as an error rather than
//! returned.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::{ValidationError, ValidationResult};

/// Entity-level invariants checked after construction or decoding.
pub trait Validate {
    /// Returns the first violated invariant, if any.
    fn validate(&self) -> ValidationResult<()>;
}

impl<T: Validate> Validate for [T] {
    fn validate(&self) -> ValidationResult<()> {
        self.iter().try_for_each(Validate::validate)
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> ValidationResult<()> {
        self.as_slice().validate()
    }
}

/// Errors from encoding or decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input is not valid JSON for the target type.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input decoded but violates an invariant.
    #[error("invalid value: {0}")]
    Invalid(#[from] ValidationError),
}

/// Encodes a value as JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

/// Encodes a value as pretty-printed JSON.
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Decodes and validates a value.
pub fn from_json<T: DeserializeOwned + Validate>(input: &str) -> Result<T, CodecError> {
    let value: T = serde_json::from_str(input)?;
    value.validate()?;
    Ok(value)
}

/// Decodes and validates a value from a parsed JSON tree.
pub fn from_value<T: DeserializeOwned + Validate>(value: serde_json::Value) -> Result<T, CodecError> {
    let value: T = serde_json::from_value(value)?;
    value.validate()?;
    Ok(value)
}
