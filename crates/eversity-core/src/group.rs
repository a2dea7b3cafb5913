//! Classes, subgroups and their temporally scoped memberships.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::codec::Validate;
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult, require_text};
use crate::id::{GroupId, PersonId};
use crate::metadata::{Described, EntityMeta, FieldKind, FieldMeta};
use crate::time::DateRange;

/// The shift a group studies in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeachingShift {
    #[default]
    First,
    Second,
}

/// Whether a group is a whole class or a subgroup of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupKind {
    Class,
    Subgroup { parent: GroupId },
}

/// A person's membership in a group over a validity period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub person: PersonId,
    pub validity: DateRange,
    /// One-based position in the group's list (e.g. the class register).
    pub position: u32,
}

impl Membership {
    /// Creates a membership.
    pub fn new(person: PersonId, validity: DateRange, position: u32) -> ValidationResult<Self> {
        let membership = Self {
            person,
            validity,
            position,
        };
        membership.validate()?;
        Ok(membership)
    }
}

impl Validate for Membership {
    fn validate(&self) -> ValidationResult<()> {
        if self.position == 0 {
            return Err(ValidationError::non_positive(
                "Membership",
                "position",
                self.position,
            ));
        }
        Ok(())
    }
}

/// A school class or a subgroup of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    #[serde(default)]
    pub shift: TeachingShift,
    pub kind: GroupKind,
    pub validity: DateRange,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Membership>,
}

impl Group {
    /// Creates a group without members.
    pub fn new(
        id: GroupId,
        title: impl Into<String>,
        shift: TeachingShift,
        kind: GroupKind,
        validity: DateRange,
    ) -> ValidationResult<Self> {
        let group = Self {
            id,
            title: title.into(),
            shift,
            kind,
            validity,
            members: Vec::new(),
        };
        group.validate()?;
        Ok(group)
    }

    /// Builder method to add a membership.
    ///
    /// Rejects a membership overlapping an existing one for the same person.
    pub fn with_member(mut self, membership: Membership) -> ValidationResult<Self> {
        membership.validate()?;
        check_overlap(&self.members, &membership)?;
        self.members.push(membership);
        Ok(self)
    }

    /// Returns the memberships valid on `date`, ordered by position.
    pub fn members_on(&self, date: NaiveDate) -> Vec<&Membership> {
        let mut members: Vec<&Membership> = self
            .members
            .iter()
            .filter(|membership| membership.validity.contains(date))
            .collect();
        members.sort_by_key(|membership| membership.position);
        members
    }

    /// Returns true if `person` is a member on `date`.
    pub fn is_member(&self, person: PersonId, date: NaiveDate) -> bool {
        self.members
            .iter()
            .any(|membership| membership.person == person && membership.validity.contains(date))
    }

    /// Returns true if this is a subgroup.
    pub fn is_subgroup(&self) -> bool {
        matches!(self.kind, GroupKind::Subgroup { .. })
    }
}

fn check_overlap(existing: &[Membership], candidate: &Membership) -> ValidationResult<()> {
    let clash = existing.iter().find(|membership| {
        membership.person == candidate.person && membership.validity.overlaps(&candidate.validity)
    });
    match clash {
        Some(_) => Err(ValidationError::new(
            "Group",
            "members",
            ValidationErrorKind::Overlap,
            format!("person {} has overlapping memberships", candidate.person),
        )),
        None => Ok(()),
    }
}

impl Validate for Group {
    fn validate(&self) -> ValidationResult<()> {
        require_text("Group", "title", &self.title)?;
        if self.kind == (GroupKind::Subgroup { parent: self.id }) {
            return Err(ValidationError::new(
                "Group",
                "kind",
                ValidationErrorKind::Malformed,
                "a subgroup cannot be its own parent",
            ));
        }
        for (index, membership) in self.members.iter().enumerate() {
            membership.validate()?;
            check_overlap(&self.members[..index], membership)?;
        }
        Ok(())
    }
}

pub(crate) static GROUP_META: EntityMeta = EntityMeta {
    name: "group",
    doc: "A school class or a subgroup of one",
    fields: &[
        FieldMeta::required("id", FieldKind::Integer, "Upstream group identifier"),
        FieldMeta::required("title", FieldKind::String, "Display title, e.g. `10B`"),
        FieldMeta::optional("shift", FieldKind::Enum(&["first", "second"]), "Teaching shift"),
        FieldMeta::required("kind", FieldKind::Object("group_kind"), "Class or subgroup"),
        FieldMeta::required("validity", FieldKind::Object("date_range"), "When the group exists"),
        FieldMeta::optional(
            "members",
            FieldKind::List(&FieldKind::Object("membership")),
            "Temporally scoped memberships",
        ),
    ],
};

pub(crate) static GROUP_KIND_META: EntityMeta = EntityMeta {
    name: "group_kind",
    doc: "Whether a group is a whole class or a subgroup, tagged by `type`",
    fields: &[
        FieldMeta::required("type", FieldKind::Enum(&["class", "subgroup"]), "Group kind"),
        FieldMeta::optional("parent", FieldKind::Integer, "Parent class of a subgroup"),
    ],
};

pub(crate) static MEMBERSHIP_META: EntityMeta = EntityMeta {
    name: "membership",
    doc: "A person's membership in a group",
    fields: &[
        FieldMeta::required("person", FieldKind::Integer, "Member"),
        FieldMeta::required("validity", FieldKind::Object("date_range"), "Membership period"),
        FieldMeta::required("position", FieldKind::Integer, "One-based register position"),
    ],
};

impl Described for Group {
    fn meta() -> &'static EntityMeta {
        &GROUP_META
    }
}

impl Described for Membership {
    fn meta() -> &'static EntityMeta {
        &MEMBERSHIP_META
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, m, d).unwrap()
    }

    fn person(id: i32) -> PersonId {
        PersonId::new(id).unwrap()
    }

    fn class() -> Group {
        Group::new(
            GroupId::new(10).unwrap(),
            "10B",
            TeachingShift::First,
            GroupKind::Class,
            DateRange::since(date(9, 1)),
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_title() {
        let err = Group::new(
            GroupId::new(1).unwrap(),
            "",
            TeachingShift::First,
            GroupKind::Class,
            DateRange::since(date(9, 1)),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::Empty);
    }

    #[test]
    fn rejects_self_parented_subgroup() {
        let id = GroupId::new(4).unwrap();
        let result = Group::new(
            id,
            "10B-en",
            TeachingShift::First,
            GroupKind::Subgroup { parent: id },
            DateRange::since(date(9, 1)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_overlapping_memberships() {
        let first = Membership::new(person(1), DateRange::bounded(date(9, 1), date(11, 1)).unwrap(), 1)
            .unwrap();
        let overlapping = Membership::new(person(1), DateRange::since(date(10, 1)), 2).unwrap();

        let err = class()
            .with_member(first)
            .unwrap()
            .with_member(overlapping)
            .unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::Overlap);
    }

    #[test]
    fn consecutive_memberships_are_allowed() {
        let group = class()
            .with_member(
                Membership::new(person(1), DateRange::bounded(date(9, 1), date(11, 1)).unwrap(), 1)
                    .unwrap(),
            )
            .unwrap()
            .with_member(Membership::new(person(1), DateRange::since(date(11, 1)), 3).unwrap())
            .unwrap();
        assert!(group.is_member(person(1), date(10, 31)));
        assert!(group.is_member(person(1), date(11, 1)));
        assert!(!group.is_member(person(1), date(8, 31)));
    }

    #[test]
    fn members_on_is_ordered_by_position() {
        let group = class()
            .with_member(Membership::new(person(2), DateRange::since(date(9, 1)), 2).unwrap())
            .unwrap()
            .with_member(Membership::new(person(1), DateRange::since(date(9, 1)), 1).unwrap())
            .unwrap()
            .with_member(
                Membership::new(person(3), DateRange::bounded(date(9, 1), date(9, 10)).unwrap(), 3)
                    .unwrap(),
            )
            .unwrap();
        let ids: Vec<PersonId> = group.members_on(date(9, 15)).iter().map(|m| m.person).collect();
        assert_eq!(ids, vec![person(1), person(2)]);
    }

    #[test]
    fn membership_position_must_be_positive() {
        assert!(Membership::new(person(1), DateRange::since(date(9, 1)), 0).is_err());
    }

    #[test]
    fn validate_catches_overlap_from_json() {
        let json = r#"{
            "id": 10,
            "title": "10B",
            "kind": {"type": "class"},
            "validity": {"from": "2022-09-01"},
            "members": [
                {"person": 1, "validity": {"from": "2022-09-01"}, "position": 1},
                {"person": 1, "validity": {"from": "2022-10-01"}, "position": 2}
            ]
        }"#;
        let group: Group = serde_json::from_str(json).unwrap();
        assert_eq!(group.validate().unwrap_err().kind(), ValidationErrorKind::Overlap);
    }

    #[test]
    fn subgroup_kind_serialization() {
        let kind = GroupKind::Subgroup {
            parent: GroupId::new(10).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(kind).unwrap(),
            serde_json::json!({"type": "subgroup", "parent": 10})
        );
    }
}
