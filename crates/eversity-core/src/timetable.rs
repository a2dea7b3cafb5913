//! Weekly timetables and bell schedules.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::codec::Validate;
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};
use crate::group::TeachingShift;
use crate::id::GroupId;
use crate::lesson::Subject;
use crate::metadata::{Described, EntityMeta, FieldKind, FieldMeta};
use crate::time::{DateRange, Period};

/// A subject taught at a timetable place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub subject: Subject,
    /// One-based position in the day.
    pub place: u32,
}

/// The weekly timetable of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timetable {
    pub group: GroupId,
    pub effective: DateRange,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monday: Vec<TimetableEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tuesday: Vec<TimetableEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wednesday: Vec<TimetableEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thursday: Vec<TimetableEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub friday: Vec<TimetableEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub saturday: Vec<TimetableEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sunday: Vec<TimetableEntry>,
}

impl Timetable {
    /// Creates an empty timetable.
    pub fn new(group: GroupId, effective: DateRange) -> Self {
        Self {
            group,
            effective,
            monday: Vec::new(),
            tuesday: Vec::new(),
            wednesday: Vec::new(),
            thursday: Vec::new(),
            friday: Vec::new(),
            saturday: Vec::new(),
            sunday: Vec::new(),
        }
    }

    /// Builder method to set the entries of one weekday.
    pub fn with_day(mut self, day: Weekday, entries: Vec<TimetableEntry>) -> ValidationResult<Self> {
        check_day(&entries)?;
        *self.day_mut(day) = entries;
        Ok(self)
    }

    /// Returns the entries for a weekday.
    pub fn day(&self, day: Weekday) -> &[TimetableEntry] {
        match day {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    fn day_mut(&mut self, day: Weekday) -> &mut Vec<TimetableEntry> {
        match day {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        }
    }

    /// Returns the entries for `date`, or `None` if the timetable is not in
    /// effect on that date.
    pub fn on(&self, date: NaiveDate) -> Option<&[TimetableEntry]> {
        self.effective
            .contains(date)
            .then(|| self.day(date.weekday()))
    }
}

fn check_day(entries: &[TimetableEntry]) -> ValidationResult<()> {
    let mut places = HashSet::with_capacity(entries.len());
    for entry in entries {
        entry.subject.validate()?;
        if entry.place == 0 {
            return Err(ValidationError::non_positive("Timetable", "place", entry.place));
        }
        if !places.insert(entry.place) {
            return Err(ValidationError::duplicate("Timetable", "place", entry.place));
        }
    }
    Ok(())
}

impl Validate for Timetable {
    fn validate(&self) -> ValidationResult<()> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .try_for_each(|day| check_day(self.day(day)))
    }
}

/// When a timetable place starts and ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BellEntry {
    pub place: u32,
    pub period: Period,
}

/// The timetable places currently in progress, per shift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrentPlaces {
    pub first: Option<u32>,
    pub second: Option<u32>,
}

/// Lesson periods of both shifts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BellSchedule {
    #[serde(default)]
    pub first_shift: Vec<BellEntry>,
    #[serde(default)]
    pub second_shift: Vec<BellEntry>,
}

impl BellSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a period to a shift.
    pub fn with_period(mut self, shift: TeachingShift, place: u32, period: Period) -> ValidationResult<Self> {
        match shift {
            TeachingShift::First => self.first_shift.push(BellEntry { place, period }),
            TeachingShift::Second => self.second_shift.push(BellEntry { place, period }),
        }
        self.validate()?;
        Ok(self)
    }

    fn shift(&self, shift: TeachingShift) -> &[BellEntry] {
        match shift {
            TeachingShift::First => &self.first_shift,
            TeachingShift::Second => &self.second_shift,
        }
    }

    /// Returns the period of `place` in `shift`.
    pub fn period(&self, shift: TeachingShift, place: u32) -> Option<Period> {
        self.shift(shift)
            .iter()
            .find(|entry| entry.place == place)
            .map(|entry| entry.period)
    }

    /// Returns the places whose period strictly contains `time`.
    pub fn current_places(&self, time: NaiveTime) -> CurrentPlaces {
        let current = |shift| {
            self.shift(shift)
                .iter()
                .find(|entry| entry.period.contains_strictly(time))
                .map(|entry| entry.place)
        };
        CurrentPlaces {
            first: current(TeachingShift::First),
            second: current(TeachingShift::Second),
        }
    }
}

fn check_shift(entries: &[BellEntry]) -> ValidationResult<()> {
    for (index, entry) in entries.iter().enumerate() {
        if entry.place == 0 {
            return Err(ValidationError::non_positive("BellSchedule", "place", entry.place));
        }
        for earlier in &entries[..index] {
            if earlier.place == entry.place {
                return Err(ValidationError::duplicate("BellSchedule", "place", entry.place));
            }
            let disjoint =
                earlier.period.end() <= entry.period.start() || entry.period.end() <= earlier.period.start();
            if !disjoint {
                return Err(ValidationError::new(
                    "BellSchedule",
                    "period",
                    ValidationErrorKind::Overlap,
                    format!("places {} and {} overlap", earlier.place, entry.place),
                ));
            }
        }
    }
    Ok(())
}

impl Validate for BellSchedule {
    fn validate(&self) -> ValidationResult<()> {
        check_shift(&self.first_shift)?;
        check_shift(&self.second_shift)
    }
}

pub(crate) static TIMETABLE_META: EntityMeta = EntityMeta {
    name: "timetable",
    doc: "The weekly timetable of a group",
    fields: &[
        FieldMeta::required("group", FieldKind::Integer, "Group the timetable belongs to"),
        FieldMeta::required("effective", FieldKind::Object("date_range"), "When it is in effect"),
        FieldMeta::optional("monday", FieldKind::List(&FieldKind::Object("timetable_entry")), "Monday"),
        FieldMeta::optional("tuesday", FieldKind::List(&FieldKind::Object("timetable_entry")), "Tuesday"),
        FieldMeta::optional(
            "wednesday",
            FieldKind::List(&FieldKind::Object("timetable_entry")),
            "Wednesday",
        ),
        FieldMeta::optional("thursday", FieldKind::List(&FieldKind::Object("timetable_entry")), "Thursday"),
        FieldMeta::optional("friday", FieldKind::List(&FieldKind::Object("timetable_entry")), "Friday"),
        FieldMeta::optional("saturday", FieldKind::List(&FieldKind::Object("timetable_entry")), "Saturday"),
        FieldMeta::optional("sunday", FieldKind::List(&FieldKind::Object("timetable_entry")), "Sunday"),
    ],
};

pub(crate) static TIMETABLE_ENTRY_META: EntityMeta = EntityMeta {
    name: "timetable_entry",
    doc: "A subject taught at a timetable place",
    fields: &[
        FieldMeta::required("subject", FieldKind::Object("subject"), "Subject"),
        FieldMeta::required("place", FieldKind::Integer, "One-based position in the day"),
    ],
};

pub(crate) static BELL_SCHEDULE_META: EntityMeta = EntityMeta {
    name: "bell_schedule",
    doc: "Lesson periods of both shifts",
    fields: &[
        FieldMeta::optional(
            "first_shift",
            FieldKind::List(&FieldKind::Object("bell_entry")),
            "First shift periods",
        ),
        FieldMeta::optional(
            "second_shift",
            FieldKind::List(&FieldKind::Object("bell_entry")),
            "Second shift periods",
        ),
    ],
};

pub(crate) static BELL_ENTRY_META: EntityMeta = EntityMeta {
    name: "bell_entry",
    doc: "When a timetable place starts and ends",
    fields: &[
        FieldMeta::required("place", FieldKind::Integer, "One-based position in the day"),
        FieldMeta::required("period", FieldKind::Object("period"), "Start and end times"),
    ],
};

impl Described for Timetable {
    fn meta() -> &'static EntityMeta {
        &TIMETABLE_META
    }
}

impl Described for TimetableEntry {
    fn meta() -> &'static EntityMeta {
        &TIMETABLE_ENTRY_META
    }
}

impl Described for BellSchedule {
    fn meta() -> &'static EntityMeta {
        &BELL_SCHEDULE_META
    }
}

impl Described for BellEntry {
    fn meta() -> &'static EntityMeta {
        &BELL_ENTRY_META
    }
}
