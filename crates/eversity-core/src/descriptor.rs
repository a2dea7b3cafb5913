//! Provider self-descriptions.
//!
//! A provider declares what it can do once, at registration, through a
//! [`ProviderDescriptor`]. The registry consults the descriptor before every
//! call and never invokes an operation the provider did not declare.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::Validate;
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult, require_text};
use crate::id::{ProviderId, TOKEN_REGEX};
use crate::metadata::{Described, EntityMeta, FieldKind, FieldMeta};

/// Version of the shared contract this crate implements.
pub const CONTRACT_VERSION: &str = "1";

/// An operation a provider may support, such as `fetch-schedule`.
///
/// Capabilities are open-ended: newer integrations can declare tokens this
/// crate does not know about, as long as they are lowercase dash-separated
/// words.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub const FETCH_SCHEDULE: Self = Self::from_static("fetch-schedule");
    pub const FETCH_ROSTER: Self = Self::from_static("fetch-roster");
    pub const FETCH_PEOPLE: Self = Self::from_static("fetch-people");
    pub const FETCH_ATTENDANCE: Self = Self::from_static("fetch-attendance");
    pub const FETCH_TIMETABLE: Self = Self::from_static("fetch-timetable");
    pub const SUBMIT_ATTENDANCE: Self = Self::from_static("submit-attendance");

    /// Creates a capability from a token known to be well-formed.
    ///
    /// Only for constants; use [`Capability::new`] for anything read at
    /// runtime.
    pub const fn from_static(token: &'static str) -> Self {
        Self(Cow::Borrowed(token))
    }

    /// Creates a capability, validating the token format.
    pub fn new(token: impl Into<String>) -> ValidationResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(ValidationError::empty("Capability", "token"));
        }
        if !TOKEN_REGEX.is_match(&token) {
            return Err(ValidationError::new(
                "Capability",
                "token",
                ValidationErrorKind::Malformed,
                format!("`{token}` is not a lowercase dash-separated token"),
            ));
        }
        Ok(Self(Cow::Owned(token)))
    }

    /// Returns the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Capability {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Capability> for String {
    fn from(capability: Capability) -> Self {
        capability.0.into_owned()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered set of capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability; returns false if it was already present.
    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    /// Returns true if the set contains `capability`.
    pub fn contains(&self, capability: &Capability) -> bool {
        self.0.contains(capability)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Whether a provider accepts writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    ReadOnly,
    ReadWrite,
}

/// The kinds of entity a provider can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Group,
    LessonSlot,
    AttendanceMark,
    Timetable,
    BellSchedule,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        Self::Person,
        Self::Group,
        Self::LessonSlot,
        Self::AttendanceMark,
        Self::Timetable,
        Self::BellSchedule,
    ];

    /// Returns the wire tag of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Group => "group",
            Self::LessonSlot => "lesson_slot",
            Self::AttendanceMark => "attendance_mark",
            Self::Timetable => "timetable",
            Self::BellSchedule => "bell_schedule",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a provider is and what it declares it can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Registry-unique identifier.
    pub id: ProviderId,
    /// Human-readable name.
    pub title: String,
    /// Integration version.
    pub version: String,
    pub author: String,
    pub capabilities: CapabilitySet,
    #[serde(default)]
    pub access: AccessMode,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub entity_kinds: BTreeSet<EntityKind>,
    /// The provider asks the server not to issue concurrent calls.
    #[serde(default)]
    pub serialized: bool,
    /// Contract version the provider was built against.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    CONTRACT_VERSION.to_string()
}

impl ProviderDescriptor {
    /// Creates a read-only descriptor with no capabilities.
    pub fn new(
        id: ProviderId,
        title: impl Into<String>,
        version: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            version: version.into(),
            author: author.into(),
            capabilities: CapabilitySet::new(),
            access: AccessMode::ReadOnly,
            entity_kinds: BTreeSet::new(),
            serialized: false,
            api_version: default_api_version(),
        }
    }

    /// Builder method to declare a capability.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Builder method to declare several capabilities.
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        for capability in capabilities {
            self.capabilities.insert(capability);
        }
        self
    }

    /// Builder method to set the access mode.
    pub fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    /// Builder method to declare a produced entity kind.
    pub fn with_entity_kind(mut self, kind: EntityKind) -> Self {
        self.entity_kinds.insert(kind);
        self
    }

    /// Builder method to request serialized calls.
    pub fn with_serialized(mut self, serialized: bool) -> Self {
        self.serialized = serialized;
        self
    }

    /// Returns true if the provider declared `capability`.
    pub fn supports(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Returns true if the provider accepts submissions.
    pub fn is_writable(&self) -> bool {
        self.access == AccessMode::ReadWrite
    }
}

impl Validate for ProviderDescriptor {
    fn validate(&self) -> ValidationResult<()> {
        require_text("ProviderDescriptor", "title", &self.title)?;
        require_text("ProviderDescriptor", "version", &self.version)?;
        require_text("ProviderDescriptor", "api_version", &self.api_version)
    }
}

pub(crate) static PROVIDER_DESCRIPTOR_META: EntityMeta = EntityMeta {
    name: "provider_descriptor",
    doc: "What a provider is and what it declares it can do",
    fields: &[
        FieldMeta::required("id", FieldKind::String, "Registry-unique identifier"),
        FieldMeta::required("title", FieldKind::String, "Human-readable name"),
        FieldMeta::required("version", FieldKind::String, "Integration version"),
        FieldMeta::required("author", FieldKind::String, "Integration author"),
        FieldMeta::required(
            "capabilities",
            FieldKind::List(&FieldKind::String),
            "Declared capability tokens",
        ),
        FieldMeta::optional(
            "access",
            FieldKind::Enum(&["read_only", "read_write"]),
            "Whether submissions are accepted",
        ),
        FieldMeta::optional(
            "entity_kinds",
            FieldKind::List(&FieldKind::Enum(&[
                "person",
                "group",
                "lesson_slot",
                "attendance_mark",
                "timetable",
                "bell_schedule",
            ])),
            "Entity kinds the provider produces",
        ),
        FieldMeta::optional("serialized", FieldKind::Boolean, "Asks for serialized calls"),
        FieldMeta::optional("api_version", FieldKind::String, "Contract version"),
    ],
};

impl Described for ProviderDescriptor {
    fn meta() -> &'static EntityMeta {
        &PROVIDER_DESCRIPTOR_META
    }
}
