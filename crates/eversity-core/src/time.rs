//! Time types for schedules and memberships.
//!
//! - [`TimeRange`]: a half-open instant interval `[start, end)` with `end > start`
//! - [`DateRange`]: a half-open date interval, possibly open-ended, used for
//!   validity periods (group membership, timetables)
//! - [`Period`]: a local time-of-day interval, used by bell schedules
//!
//! All three enforce their ordering invariant on construction and when
//! deserialized, so an inverted range cannot exist as a value.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::metadata::{Described, EntityMeta, FieldKind, FieldMeta};

/// A half-open interval of instants `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TimeRangeRepr")]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TimeRangeRepr {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<TimeRangeRepr> for TimeRange {
    type Error = ValidationError;

    fn try_from(repr: TimeRangeRepr) -> Result<Self, Self::Error> {
        Self::new(repr.start, repr.end)
    }
}

impl TimeRange {
    /// Creates a time range.
    ///
    /// Fails with [`ValidationErrorKind::InvalidRange`](crate::ValidationErrorKind::InvalidRange)
    /// unless `end` is strictly after `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<Self> {
        if end <= start {
            return Err(ValidationError::invalid_range("TimeRange", "end", start, end));
        }
        Ok(Self { start, end })
    }

    /// Creates a range from a start and a positive duration.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> ValidationResult<Self> {
        let end = start.checked_add_signed(duration).ok_or_else(|| {
            ValidationError::invalid_range("TimeRange", "end", start, format!("{start} + {duration}"))
        })?;
        Self::new(start, end)
    }

    /// Returns the start (inclusive).
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the end (exclusive).
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns the length of the range.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns true if `instant` falls inside the range.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Returns true if the two ranges share any instant.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A half-open interval of dates `[from, until)`.
///
/// `until = None` means the interval is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DateRangeRepr")]
pub struct DateRange {
    from: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    until: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct DateRangeRepr {
    from: NaiveDate,
    #[serde(default)]
    until: Option<NaiveDate>,
}

impl TryFrom<DateRangeRepr> for DateRange {
    type Error = ValidationError;

    fn try_from(repr: DateRangeRepr) -> Result<Self, Self::Error> {
        match repr.until {
            Some(until) => Self::bounded(repr.from, until),
            None => Ok(Self::since(repr.from)),
        }
    }
}

impl DateRange {
    /// Creates an open-ended range starting at `from`.
    pub fn since(from: NaiveDate) -> Self {
        Self { from, until: None }
    }

    /// Creates a bounded range; `until` is exclusive and must follow `from`.
    pub fn bounded(from: NaiveDate, until: NaiveDate) -> ValidationResult<Self> {
        if until <= from {
            return Err(ValidationError::invalid_range("DateRange", "until", from, until));
        }
        Ok(Self {
            from,
            until: Some(until),
        })
    }

    /// Returns the first date of the range.
    pub fn from(&self) -> NaiveDate {
        self.from
    }

    /// Returns the exclusive end, if bounded.
    pub fn until(&self) -> Option<NaiveDate> {
        self.until
    }

    /// Returns true if the range has no end.
    pub fn is_open_ended(&self) -> bool {
        self.until.is_none()
    }

    /// Returns true if `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && self.until.is_none_or(|until| date < until)
    }

    /// Returns true if the two ranges share any date.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        let self_before_other_ends = other.until.is_none_or(|until| self.from < until);
        let other_before_self_ends = self.until.is_none_or(|until| other.from < until);
        self_before_other_ends && other_before_self_ends
    }

    /// Returns a copy of this range closed at `until`.
    pub fn closed_at(&self, until: NaiveDate) -> ValidationResult<Self> {
        Self::bounded(self.from, until)
    }
}

/// A local time-of-day interval, such as a lesson period in a bell schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PeriodRepr")]
pub struct Period {
    start: NaiveTime,
    end: NaiveTime,
}

#[derive(Deserialize)]
struct PeriodRepr {
    start: NaiveTime,
    end: NaiveTime,
}

impl TryFrom<PeriodRepr> for Period {
    type Error = ValidationError;

    fn try_from(repr: PeriodRepr) -> Result<Self, Self::Error> {
        Self::new(repr.start, repr.end)
    }
}

impl Period {
    /// Creates a period; `start` must be strictly before `end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> ValidationResult<Self> {
        if end <= start {
            return Err(ValidationError::invalid_range("Period", "end", start, end));
        }
        Ok(Self { start, end })
    }

    /// Returns the start time.
    pub fn start(&self) -> NaiveTime {
        self.start
    }

    /// Returns the end time.
    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Returns true if `time` is strictly between start and end.
    ///
    /// The boundaries themselves belong to the breaks between periods.
    pub fn contains_strictly(&self, time: NaiveTime) -> bool {
        self.start < time && time < self.end
    }
}

pub(crate) static TIME_RANGE_META: EntityMeta = EntityMeta {
    name: "time_range",
    doc: "Half-open interval of instants",
    fields: &[
        FieldMeta::required("start", FieldKind::DateTime, "Start (inclusive)"),
        FieldMeta::required("end", FieldKind::DateTime, "End (exclusive), after start"),
    ],
};

pub(crate) static DATE_RANGE_META: EntityMeta = EntityMeta {
    name: "date_range",
    doc: "Half-open interval of dates, open-ended without `until`",
    fields: &[
        FieldMeta::required("from", FieldKind::Date, "First date"),
        FieldMeta::optional("until", FieldKind::Date, "Exclusive end date"),
    ],
};

pub(crate) static PERIOD_META: EntityMeta = EntityMeta {
    name: "period",
    doc: "Local time-of-day interval",
    fields: &[
        FieldMeta::required("start", FieldKind::Time, "Start time"),
        FieldMeta::required("end", FieldKind::Time, "End time, after start"),
    ],
};

impl Described for TimeRange {
    fn meta() -> &'static EntityMeta {
        &TIME_RANGE_META
    }
}

impl Described for DateRange {
    fn meta() -> &'static EntityMeta {
        &DATE_RANGE_META
    }
}

impl Described for Period {
    fn meta() -> &'static EntityMeta {
        &PERIOD_META
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 9, 1, h, m, 0).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn time_range_requires_end_after_start() {
        assert!(TimeRange::new(utc(8, 0), utc(8, 45)).is_ok());

        let err = TimeRange::new(utc(8, 45), utc(8, 0)).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::InvalidRange);

        let err = TimeRange::new(utc(8, 0), utc(8, 0)).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::InvalidRange);
    }

    #[test]
    fn starting_at_rejects_overflow() {
        let range = TimeRange::starting_at(utc(8, 0), Duration::minutes(45)).unwrap();
        assert_eq!(range.end(), utc(8, 45));

        let err = TimeRange::starting_at(utc(8, 0), Duration::MAX).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::InvalidRange);
        let err = TimeRange::starting_at(utc(8, 0), Duration::zero()).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::InvalidRange);
    }

    #[test]
    fn time_range_half_open() {
        let range = TimeRange::new(utc(8, 0), utc(8, 45)).unwrap();
        assert!(range.contains(utc(8, 0)));
        assert!(range.contains(utc(8, 44)));
        assert!(!range.contains(utc(8, 45)));
        assert_eq!(range.duration(), Duration::minutes(45));
    }

    #[test]
    fn time_range_overlap() {
        let first = TimeRange::new(utc(8, 0), utc(8, 45)).unwrap();
        let second = TimeRange::new(utc(8, 45), utc(9, 30)).unwrap();
        let spanning = TimeRange::new(utc(8, 30), utc(9, 0)).unwrap();
        assert!(!first.overlaps(&second));
        assert!(first.overlaps(&spanning));
        assert!(second.overlaps(&spanning));
    }

    #[test]
    fn time_range_deserialize_rejects_inverted() {
        let json = r#"{"start":"2022-09-01T09:00:00Z","end":"2022-09-01T08:00:00Z"}"#;
        let err = serde_json::from_str::<TimeRange>(json).unwrap_err();
        assert!(err.to_string().contains("TimeRange.end"));
    }

    #[test]
    fn date_range_open_ended() {
        let range = DateRange::since(date(9, 1));
        assert!(range.is_open_ended());
        assert!(range.contains(date(9, 1)));
        assert!(range.contains(date(12, 31)));
        assert!(!range.contains(date(8, 31)));
    }

    #[test]
    fn date_range_bounded_is_exclusive() {
        let range = DateRange::bounded(date(9, 1), date(10, 1)).unwrap();
        assert!(range.contains(date(9, 30)));
        assert!(!range.contains(date(10, 1)));
        assert!(DateRange::bounded(date(9, 1), date(9, 1)).is_err());
    }

    #[test]
    fn date_range_overlap() {
        let september = DateRange::bounded(date(9, 1), date(10, 1)).unwrap();
        let october = DateRange::bounded(date(10, 1), date(11, 1)).unwrap();
        let from_mid_september = DateRange::since(date(9, 15));
        let open = DateRange::since(date(1, 1));

        assert!(!september.overlaps(&october));
        assert!(!october.overlaps(&september));
        assert!(september.overlaps(&from_mid_september));
        assert!(open.overlaps(&from_mid_september));
        assert!(open.overlaps(&october));
    }

    #[test]
    fn date_range_serialization_omits_open_end() {
        let range = DateRange::since(date(9, 1));
        assert_eq!(serde_json::to_string(&range).unwrap(), r#"{"from":"2022-09-01"}"#);

        let parsed: DateRange = serde_json::from_str(r#"{"from":"2022-09-01"}"#).unwrap();
        assert_eq!(parsed, range);

        assert!(
            serde_json::from_str::<DateRange>(r#"{"from":"2022-09-01","until":"2022-08-01"}"#)
                .is_err()
        );
    }

    #[test]
    fn period_strict_containment() {
        let period = Period::new(time(8, 0), time(8, 45)).unwrap();
        assert!(!period.contains_strictly(time(8, 0)));
        assert!(period.contains_strictly(time(8, 1)));
        assert!(!period.contains_strictly(time(8, 45)));
        assert!(Period::new(time(9, 0), time(8, 0)).is_err());
    }
}
