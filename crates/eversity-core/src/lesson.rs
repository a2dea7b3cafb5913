//! Subjects and scheduled lesson slots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::codec::Validate;
use crate::error::{ValidationError, ValidationResult, require_text};
use crate::group::TeachingShift;
use crate::id::{GroupId, LessonId, SubjectId};
use crate::metadata::{Described, EntityMeta, FieldKind, FieldMeta};
use crate::time::TimeRange;

/// A subject taught at the school.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub title: String,
}

impl Subject {
    pub fn new(id: SubjectId, title: impl Into<String>) -> ValidationResult<Self> {
        let subject = Self {
            id,
            title: title.into(),
        };
        subject.validate()?;
        Ok(subject)
    }
}

impl Validate for Subject {
    fn validate(&self) -> ValidationResult<()> {
        require_text("Subject", "title", &self.title)
    }
}

/// One scheduled lesson of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSlot {
    pub id: LessonId,
    pub title: String,
    pub subject: SubjectId,
    pub group: GroupId,
    /// Set when only a subgroup attends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<GroupId>,
    pub date: NaiveDate,
    /// One-based position in the day's timetable.
    pub place: u32,
    #[serde(default)]
    pub shift: TeachingShift,
    pub time: TimeRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl LessonSlot {
    /// Creates a first-shift lesson for the whole group.
    pub fn new(
        id: LessonId,
        title: impl Into<String>,
        subject: SubjectId,
        group: GroupId,
        place: u32,
        time: TimeRange,
    ) -> ValidationResult<Self> {
        let lesson = Self {
            id,
            title: title.into(),
            subject,
            group,
            subgroup: None,
            date: time.start().date_naive(),
            place,
            shift: TeachingShift::First,
            time,
            room: None,
        };
        lesson.validate()?;
        Ok(lesson)
    }

    /// Builder method to restrict the lesson to a subgroup.
    pub fn with_subgroup(mut self, subgroup: GroupId) -> ValidationResult<Self> {
        self.subgroup = Some(subgroup);
        self.validate()?;
        Ok(self)
    }

    /// Builder method to set the school date, when it differs from the UTC
    /// date of the start instant.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Builder method to set the shift.
    pub fn with_shift(mut self, shift: TeachingShift) -> Self {
        self.shift = shift;
        self
    }

    /// Builder method to set the room.
    pub fn with_room(mut self, room: impl Into<String>) -> ValidationResult<Self> {
        let room = room.into();
        require_text("LessonSlot", "room", &room)?;
        self.room = Some(room);
        Ok(self)
    }

    /// Returns true if the lesson is attended by `group`, either as the
    /// whole class or as the subgroup it is restricted to.
    pub fn is_attended_by(&self, group: GroupId) -> bool {
        match self.subgroup {
            Some(subgroup) => subgroup == group || self.group == group,
            None => self.group == group,
        }
    }
}

impl Validate for LessonSlot {
    fn validate(&self) -> ValidationResult<()> {
        require_text("LessonSlot", "title", &self.title)?;
        if self.place == 0 {
            return Err(ValidationError::non_positive("LessonSlot", "place", self.place));
        }
        if self.subgroup == Some(self.group) {
            return Err(ValidationError::duplicate("LessonSlot", "subgroup", self.group));
        }
        if let Some(room) = &self.room {
            require_text("LessonSlot", "room", room)?;
        }
        Ok(())
    }
}

pub(crate) static SUBJECT_META: EntityMeta = EntityMeta {
    name: "subject",
    doc: "A subject taught at the school",
    fields: &[
        FieldMeta::required("id", FieldKind::Integer, "Upstream subject identifier"),
        FieldMeta::required("title", FieldKind::String, "Subject name"),
    ],
};

pub(crate) static LESSON_SLOT_META: EntityMeta = EntityMeta {
    name: "lesson_slot",
    doc: "One scheduled lesson of a group",
    fields: &[
        FieldMeta::required("id", FieldKind::Integer, "Upstream lesson identifier"),
        FieldMeta::required("title", FieldKind::String, "Lesson title"),
        FieldMeta::required("subject", FieldKind::Integer, "Subject taught"),
        FieldMeta::required("group", FieldKind::Integer, "Attending class"),
        FieldMeta::optional("subgroup", FieldKind::Integer, "Attending subgroup"),
        FieldMeta::required("date", FieldKind::Date, "School date"),
        FieldMeta::required("place", FieldKind::Integer, "One-based timetable position"),
        FieldMeta::optional("shift", FieldKind::Enum(&["first", "second"]), "Teaching shift"),
        FieldMeta::required("time", FieldKind::Object("time_range"), "Start and end instants"),
        FieldMeta::optional("room", FieldKind::String, "Room"),
    ],
};

impl Described for Subject {
    fn meta() -> &'static EntityMeta {
        &SUBJECT_META
    }
}

impl Described for LessonSlot {
    fn meta() -> &'static EntityMeta {
        &LESSON_SLOT_META
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;
    use chrono::{TimeZone, Utc};

    fn time() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2022, 9, 1, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2022, 9, 1, 8, 45, 0).unwrap(),
        )
        .unwrap()
    }

    fn lesson() -> LessonSlot {
        LessonSlot::new(
            LessonId::new(1).unwrap(),
            "Mathematics",
            SubjectId::new(3).unwrap(),
            GroupId::new(10).unwrap(),
            1,
            time(),
        )
        .unwrap()
    }

    #[test]
    fn new_derives_date_from_start() {
        assert_eq!(lesson().date, NaiveDate::from_ymd_opt(2022, 9, 1).unwrap());
    }

    #[test]
    fn rejects_empty_title_and_zero_place() {
        let err = LessonSlot::new(
            LessonId::new(1).unwrap(),
            " ",
            SubjectId::new(3).unwrap(),
            GroupId::new(10).unwrap(),
            1,
            time(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::Empty);

        let err = LessonSlot::new(
            LessonId::new(1).unwrap(),
            "Mathematics",
            SubjectId::new(3).unwrap(),
            GroupId::new(10).unwrap(),
            0,
            time(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::NonPositive);
    }

    #[test]
    fn subgroup_attendance() {
        let lesson = lesson().with_subgroup(GroupId::new(11).unwrap()).unwrap();
        assert!(lesson.is_attended_by(GroupId::new(11).unwrap()));
        assert!(lesson.is_attended_by(GroupId::new(10).unwrap()));
        assert!(!lesson.is_attended_by(GroupId::new(12).unwrap()));
        assert!(lesson.with_subgroup(GroupId::new(10).unwrap()).is_err());
    }

    #[test]
    fn json_round_trip_and_field_names() {
        let lesson = lesson()
            .with_subgroup(GroupId::new(11).unwrap())
            .unwrap()
            .with_shift(TeachingShift::Second)
            .with_room("204")
            .unwrap();
        let value = serde_json::to_value(&lesson).unwrap();
        assert_eq!(serde_json::from_value::<LessonSlot>(value.clone()).unwrap(), lesson);

        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for name in LessonSlot::meta().field_names() {
            assert!(keys.contains(&name), "missing {name}");
        }
        assert_eq!(keys.len(), LessonSlot::meta().fields.len());
    }

    #[test]
    fn malformed_time_fails_to_deserialize() {
        let json = r#"{
            "id": 1, "title": "Mathematics", "subject": 3, "group": 10,
            "date": "2022-09-01", "place": 1,
            "time": {"start": "2022-09-01T08:45:00Z", "end": "2022-09-01T08:00:00Z"}
        }"#;
        assert!(serde_json::from_str::<LessonSlot>(json).is_err());
    }
}
