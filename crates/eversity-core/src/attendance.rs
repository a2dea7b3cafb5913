//! Attendance marks and the append-only ledger that holds them.
//!
//! Marks are never edited. A correction is a new mark whose `supersedes`
//! field names the mark it replaces; the [`AttendanceLedger`] keeps every
//! mark and answers which one is authoritative.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Validate;
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};
use crate::id::{LessonId, MarkId, PersonId, ProviderId};
use crate::lesson::LessonSlot;
use crate::metadata::{Described, EntityMeta, FieldKind, FieldMeta};
use crate::person::Person;

/// Whether a person attended a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    /// Returns true for statuses that may carry an [`AbsenceReason`].
    pub fn allows_reason(&self) -> bool {
        matches!(self, Self::Absent | Self::Excused)
    }
}

/// Why a person was absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceReason {
    Illness,
    Healing,
    ParentalRequest,
    Decree,
    Other,
}

impl AbsenceReason {
    /// Returns the name shown to school staff.
    pub fn localized_name(&self) -> &'static str {
        match self {
            Self::Illness => "Болезнь",
            Self::Healing => "Лечение",
            Self::ParentalRequest => "Запрос от родителей",
            Self::Decree => "Приказ",
            Self::Other => "Другое",
        }
    }
}

impl fmt::Display for AbsenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.localized_name())
    }
}

/// Who recorded a mark.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkSource {
    /// Provider the mark came from.
    pub provider: ProviderId,
    /// Staff member who recorded it, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<PersonId>,
}

impl MarkSource {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            author: None,
        }
    }

    /// Builder method to set the author.
    pub fn with_author(mut self, author: PersonId) -> Self {
        self.author = Some(author);
        self
    }
}

/// One person's attendance at one lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub id: MarkId,
    pub person: PersonId,
    pub lesson: LessonId,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<AbsenceReason>,
    pub recorded_at: DateTime<Utc>,
    pub source: MarkSource,
    /// The mark this one corrects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<MarkId>,
}

impl AttendanceMark {
    /// Creates a mark with a fresh identifier.
    pub fn new(
        person: PersonId,
        lesson: LessonId,
        status: AttendanceStatus,
        recorded_at: DateTime<Utc>,
        source: MarkSource,
    ) -> Self {
        Self {
            id: MarkId::generate(),
            person,
            lesson,
            status,
            reason: None,
            recorded_at,
            source,
            supersedes: None,
        }
    }

    /// Builder method to set the absence reason.
    pub fn with_reason(mut self, reason: AbsenceReason) -> ValidationResult<Self> {
        self.reason = Some(reason);
        self.validate()?;
        Ok(self)
    }

    /// Creates a correction of this mark.
    ///
    /// The correction has a fresh identifier, the same person and lesson,
    /// and must not be recorded before the mark it supersedes.
    pub fn correct(
        &self,
        status: AttendanceStatus,
        recorded_at: DateTime<Utc>,
        source: MarkSource,
    ) -> ValidationResult<Self> {
        if recorded_at < self.recorded_at {
            return Err(ValidationError::invalid_range(
                "AttendanceMark",
                "recorded_at",
                self.recorded_at,
                recorded_at,
            ));
        }
        Ok(Self {
            supersedes: Some(self.id),
            ..Self::new(self.person, self.lesson, status, recorded_at, source)
        })
    }
}

impl Validate for AttendanceMark {
    fn validate(&self) -> ValidationResult<()> {
        if self.reason.is_some() && !self.status.allows_reason() {
            return Err(ValidationError::new(
                "AttendanceMark",
                "reason",
                ValidationErrorKind::Malformed,
                "only absent or excused marks carry a reason",
            ));
        }
        if self.supersedes == Some(self.id) {
            return Err(ValidationError::new(
                "AttendanceMark",
                "supersedes",
                ValidationErrorKind::Malformed,
                "a mark cannot supersede itself",
            ));
        }
        Ok(())
    }
}

/// Fails unless every mark references a known person and a known lesson.
pub fn check_mark_references(
    marks: &[AttendanceMark],
    people: &[Person],
    lessons: &[LessonSlot],
) -> ValidationResult<()> {
    let people: HashSet<PersonId> = people.iter().map(|person| person.id).collect();
    let lessons: HashSet<LessonId> = lessons.iter().map(|lesson| lesson.id).collect();

    for mark in marks {
        if !people.contains(&mark.person) {
            return Err(ValidationError::missing_reference(
                "AttendanceMark",
                "person",
                format_args!("person {}", mark.person),
            ));
        }
        if !lessons.contains(&mark.lesson) {
            return Err(ValidationError::missing_reference(
                "AttendanceMark",
                "lesson",
                format_args!("lesson {}", mark.lesson),
            ));
        }
    }
    Ok(())
}

/// An append-only sequence of attendance marks.
///
/// The ledger is owned by its caller; the shared layer never stores one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttendanceLedger {
    marks: Vec<AttendanceMark>,
}

impl AttendanceLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger by appending `marks` in order.
    pub fn from_marks(marks: impl IntoIterator<Item = AttendanceMark>) -> ValidationResult<Self> {
        let mut ledger = Self::new();
        for mark in marks {
            ledger.append(mark)?;
        }
        Ok(ledger)
    }

    /// Appends a mark.
    ///
    /// Rejects a mark whose id is already recorded, and a correction that
    /// supersedes an unknown mark or a mark for another person or lesson.
    pub fn append(&mut self, mark: AttendanceMark) -> ValidationResult<()> {
        mark.validate()?;
        if self.get(mark.id).is_some() {
            return Err(ValidationError::duplicate("AttendanceLedger", "id", mark.id));
        }
        if let Some(superseded) = mark.supersedes {
            let Some(original) = self.get(superseded) else {
                return Err(ValidationError::missing_reference(
                    "AttendanceLedger",
                    "supersedes",
                    format_args!("mark {superseded}"),
                ));
            };
            if original.person != mark.person || original.lesson != mark.lesson {
                return Err(ValidationError::new(
                    "AttendanceLedger",
                    "supersedes",
                    ValidationErrorKind::Malformed,
                    format!("mark {superseded} belongs to another person or lesson"),
                ));
            }
        }
        self.marks.push(mark);
        Ok(())
    }

    /// Looks up a mark by id.
    pub fn get(&self, id: MarkId) -> Option<&AttendanceMark> {
        self.marks.iter().find(|mark| mark.id == id)
    }

    /// Returns the mark that currently stands for `person` at `lesson`:
    /// the latest by `recorded_at`, the later append winning ties.
    pub fn authoritative(&self, person: PersonId, lesson: LessonId) -> Option<&AttendanceMark> {
        self.history(person, lesson)
            .fold(None, |best: Option<&AttendanceMark>, mark| match best {
                Some(best) if best.recorded_at > mark.recorded_at => Some(best),
                _ => Some(mark),
            })
    }

    /// Returns every mark for `person` at `lesson`, in append order.
    pub fn history(
        &self,
        person: PersonId,
        lesson: LessonId,
    ) -> impl Iterator<Item = &AttendanceMark> {
        self.marks
            .iter()
            .filter(move |mark| mark.person == person && mark.lesson == lesson)
    }

    /// Returns every mark, in append order.
    pub fn marks(&self) -> &[AttendanceMark] {
        &self.marks
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

pub(crate) static ATTENDANCE_MARK_META: EntityMeta = EntityMeta {
    name: "attendance_mark",
    doc: "One person's attendance at one lesson",
    fields: &[
        FieldMeta::required("id", FieldKind::Uuid, "Mark identifier"),
        FieldMeta::required("person", FieldKind::Integer, "Marked person"),
        FieldMeta::required("lesson", FieldKind::Integer, "Marked lesson"),
        FieldMeta::required(
            "status",
            FieldKind::Enum(&["present", "absent", "late", "excused"]),
            "Attendance status",
        ),
        FieldMeta::optional(
            "reason",
            FieldKind::Enum(&["illness", "healing", "parental_request", "decree", "other"]),
            "Absence reason",
        )
        .sensitive(),
        FieldMeta::required("recorded_at", FieldKind::DateTime, "When the mark was recorded"),
        FieldMeta::required("source", FieldKind::Object("mark_source"), "Who recorded the mark"),
        FieldMeta::optional("supersedes", FieldKind::Uuid, "Mark this one corrects"),
    ],
};

pub(crate) static MARK_SOURCE_META: EntityMeta = EntityMeta {
    name: "mark_source",
    doc: "Who recorded a mark",
    fields: &[
        FieldMeta::required("provider", FieldKind::String, "Provider the mark came from"),
        FieldMeta::optional("author", FieldKind::Integer, "Staff member who recorded it"),
    ],
};

impl Described for AttendanceMark {
    fn meta() -> &'static EntityMeta {
        &ATTENDANCE_MARK_META
    }
}

impl Described for MarkSource {
    fn meta() -> &'static EntityMeta {
        &MARK_SOURCE_META
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{GroupId, SubjectId};
    use crate::person::Name;
    use crate::time::TimeRange;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 9, 1, hour, minute, 0).unwrap()
    }

    fn source() -> MarkSource {
        MarkSource::new(ProviderId::new("memory").unwrap()).with_author(PersonId::new(99).unwrap())
    }

    fn person() -> PersonId {
        PersonId::new(1).unwrap()
    }

    fn lesson() -> LessonId {
        LessonId::new(100).unwrap()
    }

    fn absent() -> AttendanceMark {
        AttendanceMark::new(person(), lesson(), AttendanceStatus::Absent, at(8, 10), source())
            .with_reason(AbsenceReason::Illness)
            .unwrap()
    }

    #[test]
    fn localized_reason_names() {
        assert_eq!(AbsenceReason::Illness.localized_name(), "Болезнь");
        assert_eq!(AbsenceReason::ParentalRequest.to_string(), "Запрос от родителей");
    }

    #[test]
    fn present_mark_cannot_carry_reason() {
        let result = AttendanceMark::new(person(), lesson(), AttendanceStatus::Present, at(8, 0), source())
            .with_reason(AbsenceReason::Other);
        assert_eq!(result.unwrap_err().kind(), ValidationErrorKind::Malformed);
    }

    #[test]
    fn correction_supersedes_and_history_is_kept() {
        let original = absent();
        let correction = original
            .correct(AttendanceStatus::Late, at(8, 20), source())
            .unwrap();
        assert_eq!(correction.supersedes, Some(original.id));
        assert_ne!(correction.id, original.id);

        let ledger = AttendanceLedger::from_marks([original.clone(), correction.clone()]).unwrap();
        assert_eq!(ledger.authoritative(person(), lesson()), Some(&correction));

        let history: Vec<&AttendanceMark> = ledger.history(person(), lesson()).collect();
        assert_eq!(history, vec![&original, &correction]);
    }

    #[test]
    fn correction_cannot_predate_original() {
        assert!(absent().correct(AttendanceStatus::Present, at(8, 0), source()).is_err());
    }

    #[test]
    fn ledger_rejects_duplicates_and_dangling_supersedes() {
        let mark = absent();
        let mut ledger = AttendanceLedger::new();
        ledger.append(mark.clone()).unwrap();

        let err = ledger.append(mark.clone()).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::Duplicate);

        let mut dangling = AttendanceMark::new(person(), lesson(), AttendanceStatus::Present, at(9, 0), source());
        dangling.supersedes = Some(MarkId::generate());
        let err = ledger.append(dangling).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::MissingReference);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn ledger_rejects_cross_person_corrections() {
        let mark = absent();
        let mut other = mark.correct(AttendanceStatus::Present, at(9, 0), source()).unwrap();
        other.person = PersonId::new(2).unwrap();

        let mut ledger = AttendanceLedger::from_marks([mark]).unwrap();
        assert!(ledger.append(other).is_err());
    }

    #[test]
    fn authoritative_ties_go_to_later_append() {
        let first = AttendanceMark::new(person(), lesson(), AttendanceStatus::Absent, at(8, 10), source());
        let second = AttendanceMark::new(person(), lesson(), AttendanceStatus::Present, at(8, 10), source());
        let earlier = AttendanceMark::new(person(), lesson(), AttendanceStatus::Late, at(8, 5), source());

        let ledger =
            AttendanceLedger::from_marks([first, second.clone(), earlier]).unwrap();
        assert_eq!(ledger.authoritative(person(), lesson()), Some(&second));
        assert_eq!(ledger.authoritative(PersonId::new(7).unwrap(), lesson()), None);
    }

    #[test]
    fn mark_references_are_checked() {
        let people = vec![Person::new(person(), Name::new("Anna", "K").unwrap())];
        let lessons = vec![
            LessonSlot::new(
                lesson(),
                "Mathematics",
                SubjectId::new(1).unwrap(),
                GroupId::new(10).unwrap(),
                1,
                TimeRange::new(at(8, 0), at(8, 45)).unwrap(),
            )
            .unwrap(),
        ];
        let mark = absent();
        assert!(check_mark_references(std::slice::from_ref(&mark), &people, &lessons).is_ok());

        let mut stray = mark.clone();
        stray.lesson = LessonId::new(5).unwrap();
        let err = check_mark_references(&[stray], &people, &lessons).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::MissingReference);
        assert_eq!(err.field(), "lesson");

        assert!(check_mark_references(&[mark], &[], &lessons).is_err());
    }

    #[test]
    fn json_round_trip_and_field_names() {
        let original = absent();
        let mark = original.correct(AttendanceStatus::Excused, at(9, 0), source()).unwrap();
        let mark = AttendanceMark {
            reason: Some(AbsenceReason::Decree),
            ..mark
        };
        let value = serde_json::to_value(&mark).unwrap();
        assert_eq!(serde_json::from_value::<AttendanceMark>(value.clone()).unwrap(), mark);

        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        let mut names: Vec<&str> = AttendanceMark::meta().field_names().collect();
        keys.sort_unstable();
        names.sort_unstable();
        assert_eq!(keys, names);
    }

    #[test]
    fn redaction_hides_reason() {
        let value = serde_json::to_value(absent()).unwrap();
        let redacted = AttendanceMark::meta().redact(&value);
        assert_eq!(redacted["reason"], crate::metadata::REDACTED);
        assert_eq!(redacted["status"], "absent");
    }
}
