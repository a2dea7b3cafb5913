//! Queries, entities and submissions exchanged with providers.
//!
//! An [`EntityQuery`] names exactly one capability. The registry refuses to
//! forward a query the provider did not declare, so integrations only ever
//! see requests they advertised.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use eversity_core::{
    AttendanceMark, BellSchedule, Capability, EntityKind, FieldKind, FieldMeta, Group, GroupId,
    LessonSlot, MarkId, OperationMeta, Person, PersonId, Timetable, Validate, ValidationError,
    ValidationErrorKind, ValidationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProviderError, ProviderResult};

/// A request for data from a provider.
///
/// Date ranges are inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum EntityQuery {
    /// Lesson slots of a group.
    Schedule {
        group: GroupId,
        from: NaiveDate,
        to: NaiveDate,
    },
    /// Members of a group on a date, as people.
    Roster { group: GroupId, on: NaiveDate },
    /// People by identifier.
    People { ids: Vec<PersonId> },
    /// Attendance marks of a group.
    Attendance {
        group: GroupId,
        from: NaiveDate,
        to: NaiveDate,
    },
    /// Timetables of a group.
    Timetable { group: GroupId },
    /// A query for a capability this crate does not model.
    Custom {
        capability: Capability,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        params: BTreeMap<String, String>,
    },
}

impl EntityQuery {
    /// Returns the capability a provider must declare to answer this query.
    pub fn capability(&self) -> Capability {
        match self {
            Self::Schedule { .. } => Capability::FETCH_SCHEDULE,
            Self::Roster { .. } => Capability::FETCH_ROSTER,
            Self::People { .. } => Capability::FETCH_PEOPLE,
            Self::Attendance { .. } => Capability::FETCH_ATTENDANCE,
            Self::Timetable { .. } => Capability::FETCH_TIMETABLE,
            Self::Custom { capability, .. } => capability.clone(),
        }
    }
}

impl Validate for EntityQuery {
    fn validate(&self) -> ValidationResult<()> {
        match self {
            Self::Schedule { from, to, .. } | Self::Attendance { from, to, .. } if to < from => {
                Err(ValidationError::invalid_range("EntityQuery", "to", from, to))
            }
            Self::People { ids } if ids.is_empty() => Err(ValidationError::empty("EntityQuery", "ids")),
            _ => Ok(()),
        }
    }
}

/// A data model value returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity {
    Person(Person),
    Group(Group),
    LessonSlot(LessonSlot),
    AttendanceMark(AttendanceMark),
    Timetable(Timetable),
    BellSchedule(BellSchedule),
}

impl Entity {
    /// Returns the kind of this entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Person(_) => EntityKind::Person,
            Self::Group(_) => EntityKind::Group,
            Self::LessonSlot(_) => EntityKind::LessonSlot,
            Self::AttendanceMark(_) => EntityKind::AttendanceMark,
            Self::Timetable(_) => EntityKind::Timetable,
            Self::BellSchedule(_) => EntityKind::BellSchedule,
        }
    }
}

impl Validate for Entity {
    fn validate(&self) -> ValidationResult<()> {
        match self {
            Self::Person(person) => person.validate(),
            Self::Group(group) => group.validate(),
            Self::LessonSlot(lesson) => lesson.validate(),
            Self::AttendanceMark(mark) => mark.validate(),
            Self::Timetable(timetable) => timetable.validate(),
            Self::BellSchedule(bells) => bells.validate(),
        }
    }
}

macro_rules! entity_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

entity_from!(Person, Group, LessonSlot, AttendanceMark, Timetable, BellSchedule);

/// A write sent to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "submission", rename_all = "snake_case")]
pub enum Submission {
    /// Record an attendance mark (or a correction of one).
    Attendance(AttendanceMark),
    /// A write for a capability this crate does not model.
    Custom {
        capability: Capability,
        #[serde(default)]
        payload: Value,
    },
}

impl Submission {
    /// Returns the capability a provider must declare to accept this write.
    pub fn capability(&self) -> Capability {
        match self {
            Self::Attendance(_) => Capability::SUBMIT_ATTENDANCE,
            Self::Custom { capability, .. } => capability.clone(),
        }
    }
}

impl Validate for Submission {
    fn validate(&self) -> ValidationResult<()> {
        match self {
            Self::Attendance(mark) => mark.validate(),
            Self::Custom { .. } => Ok(()),
        }
    }
}

/// A provider's receipt for a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub accepted_at: DateTime<Utc>,
    /// The mark recorded, for attendance submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark: Option<MarkId>,
    /// The submission had already been accepted; nothing changed.
    #[serde(default)]
    pub duplicate: bool,
}

impl Acknowledgement {
    /// Creates an acknowledgement accepted at `accepted_at`.
    pub fn new(accepted_at: DateTime<Utc>) -> Self {
        Self {
            accepted_at,
            mark: None,
            duplicate: false,
        }
    }

    /// Builder method to name the recorded mark.
    pub fn with_mark(mut self, mark: MarkId) -> Self {
        self.mark = Some(mark);
        self
    }

    /// Builder method to flag a repeated submission.
    pub fn with_duplicate(mut self, duplicate: bool) -> Self {
        self.duplicate = duplicate;
        self
    }
}

const GROUP_PARAM: FieldMeta = FieldMeta::required("group", FieldKind::Integer, "Group identifier");
const FROM_PARAM: FieldMeta = FieldMeta::required("from", FieldKind::Date, "First date (inclusive)");
const TO_PARAM: FieldMeta = FieldMeta::required("to", FieldKind::Date, "Last date (inclusive)");

/// The operations every integration may declare.
pub static OPERATIONS: &[OperationMeta] = &[
    OperationMeta {
        name: "fetch-schedule",
        capability: Capability::FETCH_SCHEDULE,
        doc: "Fetch the lesson slots of a group",
        params: &[GROUP_PARAM, FROM_PARAM, TO_PARAM],
    },
    OperationMeta {
        name: "fetch-roster",
        capability: Capability::FETCH_ROSTER,
        doc: "Fetch the members of a group on a date",
        params: &[
            GROUP_PARAM,
            FieldMeta::required("on", FieldKind::Date, "Date of the roster").flag("date"),
        ],
    },
    OperationMeta {
        name: "fetch-people",
        capability: Capability::FETCH_PEOPLE,
        doc: "Fetch people by identifier",
        params: &[FieldMeta::required(
            "ids",
            FieldKind::List(&FieldKind::Integer),
            "Person identifiers",
        )
        .flag("id")],
    },
    OperationMeta {
        name: "fetch-attendance",
        capability: Capability::FETCH_ATTENDANCE,
        doc: "Fetch the attendance marks of a group",
        params: &[GROUP_PARAM, FROM_PARAM, TO_PARAM],
    },
    OperationMeta {
        name: "fetch-timetable",
        capability: Capability::FETCH_TIMETABLE,
        doc: "Fetch the timetables of a group",
        params: &[GROUP_PARAM],
    },
    OperationMeta {
        name: "submit-attendance",
        capability: Capability::SUBMIT_ATTENDANCE,
        doc: "Record an attendance mark",
        params: &[FieldMeta::required(
            "mark",
            FieldKind::Object("attendance_mark"),
            "The mark, as JSON",
        )],
    },
];

/// Looks up an operation by name.
pub fn operation(name: &str) -> Option<&'static OperationMeta> {
    OPERATIONS.iter().find(|operation| operation.name == name)
}

/// A call bound from an operation name and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationCall {
    Fetch(EntityQuery),
    Submit(Submission),
}

impl OperationCall {
    /// Builds a call from an operation name and JSON-typed parameters, as
    /// produced by a command-line front end.
    pub fn bind(name: &str, mut params: Map<String, Value>) -> ProviderResult<Self> {
        let tag = match name {
            "fetch-schedule" => "schedule",
            "fetch-roster" => "roster",
            "fetch-people" => "people",
            "fetch-attendance" => "attendance",
            "fetch-timetable" => "timetable",
            "submit-attendance" => {
                let mark = params.remove("mark").ok_or_else(|| {
                    ProviderError::from(ValidationError::empty("Submission", "mark"))
                })?;
                let mark: AttendanceMark = eversity_core::from_value(mark)?;
                return Ok(Self::Submit(Submission::Attendance(mark)));
            }
            other => {
                return Err(ProviderError::from(ValidationError::new(
                    "OperationCall",
                    "name",
                    ValidationErrorKind::Malformed,
                    format!("unknown operation `{other}`"),
                )));
            }
        };
        params.insert("query".into(), Value::from(tag));
        let query: EntityQuery = eversity_core::from_value(Value::Object(params))?;
        Ok(Self::Fetch(query))
    }

    /// Returns the capability this call requires.
    pub fn capability(&self) -> Capability {
        match self {
            Self::Fetch(query) => query.capability(),
            Self::Submit(submission) => submission.capability(),
        }
    }
}
