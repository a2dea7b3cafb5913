//! Core types: people, groups, lessons, attendance, descriptors, metadata

pub mod attendance;
pub mod codec;
pub mod descriptor;
pub mod error;
pub mod group;
pub mod id;
pub mod lesson;
pub mod metadata;
pub mod person;
pub mod time;
pub mod timetable;
pub mod token;
pub mod tracing;

pub use attendance::{
    AbsenceReason, AttendanceLedger, AttendanceMark, AttendanceStatus, MarkSource,
    check_mark_references,
};
pub use codec::{CodecError, Validate, from_json, from_value, to_json, to_json_pretty};
pub use descriptor::{
    AccessMode, CONTRACT_VERSION, Capability, CapabilitySet, EntityKind, ProviderDescriptor,
};
pub use error::{ValidationError, ValidationErrorKind, ValidationResult};
pub use group::{Group, GroupKind, Membership, TeachingShift};
pub use id::{GroupId, LessonId, MarkId, PersonId, ProviderId, SubjectId};
pub use lesson::{LessonSlot, Subject};
pub use metadata::{Described, EntityMeta, FieldKind, FieldMeta, OperationMeta, REDACTED};
pub use person::{Name, Person, Role, RoleGrant, RoleScope};
pub use time::{DateRange, Period, TimeRange};
pub use timetable::{BellEntry, BellSchedule, CurrentPlaces, Timetable, TimetableEntry};
pub use token::AuthenticationToken;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
