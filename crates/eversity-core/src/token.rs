//! Authentication tokens issued to people.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Validate;
use crate::error::{ValidationResult, require_text};
use crate::id::PersonId;
use crate::metadata::{Described, EntityMeta, FieldKind, FieldMeta, REDACTED};

/// A bearer token issued to a person.
///
/// The `Debug` output never contains the token text.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationToken {
    pub token: String,
    pub person: PersonId,
    pub issued_at: DateTime<Utc>,
}

impl AuthenticationToken {
    pub fn new(token: impl Into<String>, person: PersonId, issued_at: DateTime<Utc>) -> ValidationResult<Self> {
        let token = Self {
            token: token.into(),
            person,
            issued_at,
        };
        token.validate()?;
        Ok(token)
    }
}

impl fmt::Debug for AuthenticationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationToken")
            .field("token", &REDACTED)
            .field("person", &self.person)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

impl Validate for AuthenticationToken {
    fn validate(&self) -> ValidationResult<()> {
        require_text("AuthenticationToken", "token", &self.token)
    }
}

pub(crate) static AUTHENTICATION_TOKEN_META: EntityMeta = EntityMeta {
    name: "authentication_token",
    doc: "A bearer token issued to a person",
    fields: &[
        FieldMeta::required("token", FieldKind::String, "Token text").sensitive(),
        FieldMeta::required("person", FieldKind::Integer, "Token owner"),
        FieldMeta::required("issued_at", FieldKind::DateTime, "When the token was issued"),
    ],
};

impl Described for AuthenticationToken {
    fn meta() -> &'static EntityMeta {
        &AUTHENTICATION_TOKEN_META
    }
}
