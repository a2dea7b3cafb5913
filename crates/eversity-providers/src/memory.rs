//! A provider backed by an in-memory dataset.
//!
//! Answers every built-in query from a [`Dataset`] and records submitted
//! attendance marks in an [`AttendanceLedger`]. Useful for tests, demos and
//! offline work with exported data.

use std::collections::HashSet;

use chrono::Utc;
use eversity_core::{
    AccessMode, AttendanceLedger, AttendanceMark, BellSchedule, Capability, EntityKind, Group,
    GroupId, LessonId, LessonSlot, Person, PersonId, ProviderDescriptor, ProviderId, Timetable,
    Validate, ValidationError, ValidationResult, check_mark_references,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, Provider};
use crate::query::{Acknowledgement, Entity, EntityQuery, Submission};

/// Custom capability answered with the dataset's bell schedule.
pub const FETCH_BELL_SCHEDULE: Capability = Capability::from_static("fetch-bell-schedule");

/// Everything a [`MemoryProvider`] serves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub lessons: Vec<LessonSlot>,
    #[serde(default)]
    pub timetables: Vec<Timetable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bell_schedule: Option<BellSchedule>,
    /// Marks in ledger order.
    #[serde(default)]
    pub marks: Vec<AttendanceMark>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_person(mut self, person: Person) -> Self {
        self.people.push(person);
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_lesson(mut self, lesson: LessonSlot) -> Self {
        self.lessons.push(lesson);
        self
    }

    pub fn with_timetable(mut self, timetable: Timetable) -> Self {
        self.timetables.push(timetable);
        self
    }

    pub fn with_bell_schedule(mut self, bells: BellSchedule) -> Self {
        self.bell_schedule = Some(bells);
        self
    }

    pub fn with_mark(mut self, mark: AttendanceMark) -> Self {
        self.marks.push(mark);
        self
    }
}

impl Validate for Dataset {
    fn validate(&self) -> ValidationResult<()> {
        self.people.validate()?;
        self.groups.validate()?;
        self.lessons.validate()?;
        self.timetables.validate()?;
        if let Some(bells) = &self.bell_schedule {
            bells.validate()?;
        }

        unique("Dataset", "people", self.people.iter().map(|person| person.id))?;
        unique("Dataset", "groups", self.groups.iter().map(|group| group.id))?;
        unique("Dataset", "lessons", self.lessons.iter().map(|lesson| lesson.id))?;

        let people: HashSet<PersonId> = self.people.iter().map(|person| person.id).collect();
        for group in &self.groups {
            if let Some(membership) = group.members.iter().find(|m| !people.contains(&m.person)) {
                return Err(ValidationError::missing_reference(
                    "Group",
                    "members",
                    format_args!("person {}", membership.person),
                ));
            }
        }

        check_mark_references(&self.marks, &self.people, &self.lessons)?;
        AttendanceLedger::from_marks(self.marks.iter().cloned()).map(drop)
    }
}

fn unique<T>(entity: &'static str, field: &'static str, ids: impl Iterator<Item = T>) -> ValidationResult<()>
where
    T: std::hash::Hash + Eq + std::fmt::Display,
{
    let mut seen = HashSet::new();
    for id in ids {
        if seen.contains(&id) {
            return Err(ValidationError::duplicate(entity, field, id));
        }
        seen.insert(id);
    }
    Ok(())
}

#[derive(Debug)]
struct State {
    people: Vec<Person>,
    groups: Vec<Group>,
    lessons: Vec<LessonSlot>,
    timetables: Vec<Timetable>,
    bell_schedule: Option<BellSchedule>,
    ledger: AttendanceLedger,
}

impl State {
    fn lessons_of(&self, group: GroupId, from: chrono::NaiveDate, to: chrono::NaiveDate) -> Vec<&LessonSlot> {
        let mut lessons: Vec<&LessonSlot> = self
            .lessons
            .iter()
            .filter(|lesson| lesson.is_attended_by(group) && (from..=to).contains(&lesson.date))
            .collect();
        lessons.sort_by_key(|lesson| (lesson.date, lesson.place));
        lessons
    }

    fn answer(&self, query: EntityQuery) -> ProviderResult<Vec<Entity>> {
        let entities = match query {
            EntityQuery::Schedule { group, from, to } => self
                .lessons_of(group, from, to)
                .into_iter()
                .cloned()
                .map(Entity::from)
                .collect(),
            EntityQuery::Roster { group, on } => {
                let Some(group) = self.groups.iter().find(|candidate| candidate.id == group) else {
                    return Ok(Vec::new());
                };
                group
                    .members_on(on)
                    .into_iter()
                    .filter_map(|membership| self.people.iter().find(|p| p.id == membership.person))
                    .cloned()
                    .map(Entity::from)
                    .collect()
            }
            EntityQuery::People { ids } => ids
                .iter()
                .filter_map(|id| self.people.iter().find(|person| person.id == *id))
                .cloned()
                .map(Entity::from)
                .collect(),
            EntityQuery::Attendance { group, from, to } => {
                let lessons: HashSet<LessonId> = self
                    .lessons_of(group, from, to)
                    .into_iter()
                    .map(|lesson| lesson.id)
                    .collect();
                self.ledger
                    .marks()
                    .iter()
                    .filter(|mark| lessons.contains(&mark.lesson))
                    .cloned()
                    .map(Entity::from)
                    .collect()
            }
            EntityQuery::Timetable { group } => self
                .timetables
                .iter()
                .filter(|timetable| timetable.group == group)
                .cloned()
                .map(Entity::from)
                .collect(),
            EntityQuery::Custom { capability, .. } if capability == FETCH_BELL_SCHEDULE => {
                self.bell_schedule.iter().cloned().map(Entity::from).collect()
            }
            EntityQuery::Custom { capability, .. } => {
                return Err(ProviderError::capability_mismatch(format!(
                    "`{capability}` is not supported by this provider"
                )));
            }
        };
        Ok(entities)
    }

    fn record(&mut self, mark: AttendanceMark) -> ProviderResult<Acknowledgement> {
        let acknowledgement = Acknowledgement::new(Utc::now()).with_mark(mark.id);
        if let Some(existing) = self.ledger.get(mark.id) {
            if *existing == mark {
                return Ok(acknowledgement.with_duplicate(true));
            }
            return Err(ValidationError::duplicate("AttendanceMark", "id", mark.id).into());
        }
        check_mark_references(std::slice::from_ref(&mark), &self.people, &self.lessons)?;
        self.ledger.append(mark)?;
        Ok(acknowledgement)
    }
}

/// A read-write provider serving a [`Dataset`].
#[derive(Debug)]
pub struct MemoryProvider {
    descriptor: ProviderDescriptor,
    state: RwLock<State>,
}

impl MemoryProvider {
    /// Creates a provider serving `dataset` under `id`.
    ///
    /// Fails if the dataset is inconsistent.
    pub fn new(id: ProviderId, dataset: Dataset) -> ValidationResult<Self> {
        dataset.validate()?;
        let ledger = AttendanceLedger::from_marks(dataset.marks)?;

        let mut descriptor =
            ProviderDescriptor::new(id, "In-memory dataset", env!("CARGO_PKG_VERSION"), "Eversity")
                .with_capabilities([
                    Capability::FETCH_SCHEDULE,
                    Capability::FETCH_ROSTER,
                    Capability::FETCH_PEOPLE,
                    Capability::FETCH_ATTENDANCE,
                    Capability::FETCH_TIMETABLE,
                    Capability::SUBMIT_ATTENDANCE,
                    FETCH_BELL_SCHEDULE,
                ])
                .with_access(AccessMode::ReadWrite);
        for kind in EntityKind::ALL {
            descriptor = descriptor.with_entity_kind(kind);
        }

        Ok(Self {
            descriptor,
            state: RwLock::new(State {
                people: dataset.people,
                groups: dataset.groups,
                lessons: dataset.lessons,
                timetables: dataset.timetables,
                bell_schedule: dataset.bell_schedule,
                ledger,
            }),
        })
    }

    /// Builder method to refuse submissions.
    pub fn read_only(mut self) -> Self {
        self.descriptor = self.descriptor.with_access(AccessMode::ReadOnly);
        self
    }

    /// Returns a copy of the attendance ledger.
    pub async fn ledger(&self) -> AttendanceLedger {
        self.state.read().await.ledger.clone()
    }
}

impl Provider for MemoryProvider {
    fn describe(&self) -> ProviderDescriptor {
        self.descriptor.clone()
    }

    fn fetch(&self, query: EntityQuery) -> BoxFuture<'_, ProviderResult<Vec<Entity>>> {
        Box::pin(async move {
            let entities = self.state.read().await.answer(query)?;
            debug!(provider = %self.descriptor.id, count = entities.len(), "Answered query");
            Ok(entities)
        })
    }

    fn submit(&self, submission: Submission) -> BoxFuture<'_, ProviderResult<Acknowledgement>> {
        Box::pin(async move {
            match submission {
                Submission::Attendance(mark) => self.state.write().await.record(mark),
                Submission::Custom { capability, .. } => Err(ProviderError::capability_mismatch(
                    format!("`{capability}` is not supported by this provider"),
                )),
            }
        })
    }
}
