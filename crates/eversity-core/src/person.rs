//! People, their names, and the roles they hold.
//!
//! A [`Person`] is affiliated with groups through [`RoleGrant`]s. Each grant
//! carries a typed [`Role`] and the instant it was granted (and possibly
//! revoked), so affiliation is always evaluated at a point in time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Validate;
use crate::error::{ValidationError, ValidationResult, require_text};
use crate::id::{GroupId, PersonId, SubjectId};
use crate::metadata::{Described, EntityMeta, FieldKind, FieldMeta};

/// A person's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "NameRepr")]
pub struct Name {
    first: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    middle: Option<String>,
    last: String,
}

#[derive(Deserialize)]
struct NameRepr {
    first: String,
    #[serde(default)]
    middle: Option<String>,
    last: String,
}

impl TryFrom<NameRepr> for Name {
    type Error = ValidationError;

    fn try_from(repr: NameRepr) -> Result<Self, Self::Error> {
        let name = Self::new(repr.first, repr.last)?;
        match repr.middle {
            Some(middle) => name.with_middle(middle),
            None => Ok(name),
        }
    }
}

impl Name {
    /// Creates a name from first and last parts.
    pub fn new(first: impl Into<String>, last: impl Into<String>) -> ValidationResult<Self> {
        let first = first.into();
        let last = last.into();
        require_text("Name", "first", &first)?;
        require_text("Name", "last", &last)?;
        Ok(Self {
            first,
            middle: None,
            last,
        })
    }

    /// Sets the middle name (patronymic).
    pub fn with_middle(mut self, middle: impl Into<String>) -> ValidationResult<Self> {
        let middle = middle.into();
        require_text("Name", "middle", &middle)?;
        self.middle = Some(middle);
        Ok(self)
    }

    /// Returns the first name.
    pub fn first(&self) -> &str {
        &self.first
    }

    /// Returns the middle name, if any.
    pub fn middle(&self) -> Option<&str> {
        self.middle.as_deref()
    }

    /// Returns the last name.
    pub fn last(&self) -> &str {
        &self.last
    }

    /// Returns "first middle last", skipping a missing middle name.
    pub fn full(&self) -> String {
        match &self.middle {
            Some(middle) => format!("{} {} {}", self.first, middle, self.last),
            None => format!("{} {}", self.first, self.last),
        }
    }

    /// Returns the short form: first name followed by the middle name, or by
    /// the last name when there is no middle name.
    pub fn short_form(&self) -> String {
        format!("{} {}", self.first, self.middle.as_deref().unwrap_or(&self.last))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full())
    }
}

/// The scope a role applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleScope {
    /// Bound to a school class.
    Class,
    /// Bound to lessons of a subject in a class.
    Lesson,
    /// School-wide.
    School,
    /// Service operators, not school staff.
    Service,
}

/// A role held by a person.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "id")]
pub enum Role {
    /// A pupil of a class, optionally in some of its subgroups.
    #[serde(rename = "CLASS.Student")]
    Student {
        group: GroupId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        subgroups: Vec<GroupId>,
    },
    /// The form teacher of a class.
    #[serde(rename = "CLASS.ClassTeacher")]
    ClassTeacher { group: GroupId },
    /// Someone allowed to record absences for a class on behalf of another.
    #[serde(rename = "CLASS.AbsenceProvider")]
    AbsenceProvider {
        group: GroupId,
        delegated_by: PersonId,
    },
    /// A subject teacher for a class (or one of its subgroups).
    #[serde(rename = "LESSON.Teacher")]
    Teacher {
        subject: SubjectId,
        group: GroupId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subgroup: Option<GroupId>,
    },
    #[serde(rename = "SCHOOL.Principal")]
    Principal,
    #[serde(rename = "SCHOOL.VicePrincipal")]
    VicePrincipal,
    #[serde(rename = "SCHOOL.SocialTeacher")]
    SocialTeacher,
    #[serde(rename = "SERVICE.Administrator")]
    Administrator,
}

impl Role {
    /// Every role identifier, in declaration order.
    pub const IDS: &'static [&'static str] = &[
        "CLASS.Student",
        "CLASS.ClassTeacher",
        "CLASS.AbsenceProvider",
        "LESSON.Teacher",
        "SCHOOL.Principal",
        "SCHOOL.VicePrincipal",
        "SCHOOL.SocialTeacher",
        "SERVICE.Administrator",
    ];

    /// Returns the stable role identifier (e.g. `"CLASS.Student"`).
    pub fn id(&self) -> &'static str {
        match self {
            Self::Student { .. } => "CLASS.Student",
            Self::ClassTeacher { .. } => "CLASS.ClassTeacher",
            Self::AbsenceProvider { .. } => "CLASS.AbsenceProvider",
            Self::Teacher { .. } => "LESSON.Teacher",
            Self::Principal => "SCHOOL.Principal",
            Self::VicePrincipal => "SCHOOL.VicePrincipal",
            Self::SocialTeacher => "SCHOOL.SocialTeacher",
            Self::Administrator => "SERVICE.Administrator",
        }
    }

    /// Returns the scope of this role.
    pub fn scope(&self) -> RoleScope {
        match self {
            Self::Student { .. } | Self::ClassTeacher { .. } | Self::AbsenceProvider { .. } => {
                RoleScope::Class
            }
            Self::Teacher { .. } => RoleScope::Lesson,
            Self::Principal | Self::VicePrincipal | Self::SocialTeacher => RoleScope::School,
            Self::Administrator => RoleScope::Service,
        }
    }

    /// Returns the groups this role affiliates its holder with.
    pub fn groups(&self) -> Vec<GroupId> {
        match self {
            Self::Student { group, subgroups } => {
                let mut groups = Vec::with_capacity(1 + subgroups.len());
                groups.push(*group);
                groups.extend(subgroups.iter().copied());
                groups
            }
            Self::ClassTeacher { group } | Self::AbsenceProvider { group, .. } => vec![*group],
            Self::Teacher {
                group, subgroup, ..
            } => {
                let mut groups = vec![*group];
                groups.extend(*subgroup);
                groups
            }
            Self::Principal | Self::VicePrincipal | Self::SocialTeacher | Self::Administrator => {
                Vec::new()
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A role granted to a person over a period of time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
    /// The granted role.
    pub role: Role,
    /// When the role was granted.
    pub granted_at: DateTime<Utc>,
    /// When the role was revoked, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RoleGrant {
    /// Creates an unrevoked grant.
    pub fn new(role: Role, granted_at: DateTime<Utc>) -> Self {
        Self {
            role,
            granted_at,
            revoked_at: None,
        }
    }

    /// Returns a copy of this grant revoked at `at`.
    pub fn revoked(&self, at: DateTime<Utc>) -> ValidationResult<Self> {
        let grant = Self {
            revoked_at: Some(at),
            ..self.clone()
        };
        grant.validate()?;
        Ok(grant)
    }

    /// Returns true if the grant is in force at `at`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.granted_at <= at && self.revoked_at.is_none_or(|revoked| at < revoked)
    }
}

impl Validate for RoleGrant {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(revoked) = self.revoked_at {
            if revoked <= self.granted_at {
                return Err(ValidationError::invalid_range(
                    "RoleGrant",
                    "revoked_at",
                    self.granted_at,
                    revoked,
                ));
            }
        }
        Ok(())
    }
}

/// A student or staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Upstream identifier.
    pub id: PersonId,
    /// Full name.
    pub name: Name,
    /// Roles held now or in the past.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleGrant>,
}

impl Person {
    /// Creates a person without roles.
    pub fn new(id: PersonId, name: Name) -> Self {
        Self {
            id,
            name,
            roles: Vec::new(),
        }
    }

    /// Builder method to add a role grant.
    pub fn with_role(mut self, grant: RoleGrant) -> ValidationResult<Self> {
        grant.validate()?;
        self.roles.push(grant);
        Ok(self)
    }

    /// Returns the grants active at `at`.
    pub fn active_roles(&self, at: DateTime<Utc>) -> impl Iterator<Item = &RoleGrant> {
        self.roles.iter().filter(move |grant| grant.is_active_at(at))
    }

    /// Returns true if the person holds a role with `role_id` at `at`.
    pub fn has_role(&self, role_id: &str, at: DateTime<Utc>) -> bool {
        self.active_roles(at).any(|grant| grant.role.id() == role_id)
    }

    /// Returns the groups the person is affiliated with at `at`, deduplicated
    /// and sorted.
    pub fn groups_at(&self, at: DateTime<Utc>) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self
            .active_roles(at)
            .flat_map(|grant| grant.role.groups())
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }
}

impl Validate for Person {
    fn validate(&self) -> ValidationResult<()> {
        self.roles.iter().try_for_each(Validate::validate)
    }
}

pub(crate) static PERSON_META: EntityMeta = EntityMeta {
    name: "person",
    doc: "A student or staff member",
    fields: &[
        FieldMeta::required("id", FieldKind::Integer, "Upstream person identifier"),
        FieldMeta::required("name", FieldKind::Object("name"), "Full name"),
        FieldMeta::optional(
            "roles",
            FieldKind::List(&FieldKind::Object("role_grant")),
            "Roles held now or in the past",
        ),
    ],
};

pub(crate) static NAME_META: EntityMeta = EntityMeta {
    name: "name",
    doc: "A person's name",
    fields: &[
        FieldMeta::required("first", FieldKind::String, "First name"),
        FieldMeta::optional("middle", FieldKind::String, "Middle name (patronymic)"),
        FieldMeta::required("last", FieldKind::String, "Last name"),
    ],
};

pub(crate) static ROLE_META: EntityMeta = EntityMeta {
    name: "role",
    doc: "A role, tagged by `id`; the remaining fields depend on the role",
    fields: &[
        FieldMeta::required("id", FieldKind::Enum(Role::IDS), "Stable role identifier"),
        FieldMeta::optional("group", FieldKind::Integer, "Class the role is bound to"),
        FieldMeta::optional(
            "subgroups",
            FieldKind::List(&FieldKind::Integer),
            "Subgroups a student belongs to",
        ),
        FieldMeta::optional("delegated_by", FieldKind::Integer, "Person who delegated the role"),
        FieldMeta::optional("subject", FieldKind::Integer, "Subject taught"),
        FieldMeta::optional("subgroup", FieldKind::Integer, "Subgroup taught"),
    ],
};

pub(crate) static ROLE_GRANT_META: EntityMeta = EntityMeta {
    name: "role_grant",
    doc: "A role granted to a person over a period of time",
    fields: &[
        FieldMeta::required("role", FieldKind::Object("role"), "Granted role"),
        FieldMeta::required("granted_at", FieldKind::DateTime, "When the role was granted"),
        FieldMeta::optional("revoked_at", FieldKind::DateTime, "When the role was revoked"),
    ],
};

impl Described for Person {
    fn meta() -> &'static EntityMeta {
        &PERSON_META
    }
}

impl Described for Name {
    fn meta() -> &'static EntityMeta {
        &NAME_META
    }
}

impl Described for Role {
    fn meta() -> &'static EntityMeta {
        &ROLE_META
    }
}

impl Described for RoleGrant {
    fn meta() -> &'static EntityMeta {
        &ROLE_GRANT_META
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, month, day, 12, 0, 0).unwrap()
    }

    fn group(id: i32) -> GroupId {
        GroupId::new(id).unwrap()
    }

    #[test]
    fn name_forms() {
        let name = Name::new("Pavel", "Matusevich").unwrap();
        assert_eq!(name.full(), "Pavel Matusevich");
        assert_eq!(name.short_form(), "Pavel Matusevich");

        let name = name.with_middle("Ivanovich").unwrap();
        assert_eq!(name.to_string(), "Pavel Ivanovich Matusevich");
        assert_eq!(name.short_form(), "Pavel Ivanovich");
    }

    #[test]
    fn name_rejects_blank_parts() {
        assert!(Name::new("", "Last").is_err());
        assert!(Name::new("First", " ").is_err());
        assert!(Name::new("First", "Last").unwrap().with_middle("").is_err());
        assert!(serde_json::from_str::<Name>(r#"{"first":"","last":"X"}"#).is_err());
    }

    #[test]
    fn role_serializes_with_stable_id() {
        let role = Role::Student {
            group: group(7),
            subgroups: vec![],
        };
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json, serde_json::json!({"id": "CLASS.Student", "group": 7}));

        let principal: Role = serde_json::from_str(r#"{"id":"SCHOOL.Principal"}"#).unwrap();
        assert_eq!(principal, Role::Principal);
        assert_eq!(principal.scope(), RoleScope::School);
    }

    #[test]
    fn role_ids_match_serialized_tags() {
        let roles = [
            Role::Student {
                group: group(1),
                subgroups: vec![],
            },
            Role::ClassTeacher { group: group(1) },
            Role::AbsenceProvider {
                group: group(1),
                delegated_by: PersonId::new(1).unwrap(),
            },
            Role::Teacher {
                subject: SubjectId::new(1).unwrap(),
                group: group(1),
                subgroup: None,
            },
            Role::Principal,
            Role::VicePrincipal,
            Role::SocialTeacher,
            Role::Administrator,
        ];
        for (role, id) in roles.iter().zip(Role::IDS) {
            assert_eq!(role.id(), *id);
            assert_eq!(serde_json::to_value(role).unwrap()["id"], *id);
        }
    }

    #[test]
    fn grant_activity_window() {
        let grant = RoleGrant::new(Role::ClassTeacher { group: group(3) }, at(9, 1));
        assert!(!grant.is_active_at(at(8, 31)));
        assert!(grant.is_active_at(at(9, 1)));

        let revoked = grant.revoked(at(12, 1)).unwrap();
        assert!(revoked.is_active_at(at(11, 30)));
        assert!(!revoked.is_active_at(at(12, 1)));
        assert!(grant.revoked(at(8, 1)).is_err());
    }

    #[test]
    fn person_group_affiliation_is_temporal() {
        let student = Role::Student {
            group: group(10),
            subgroups: vec![group(11)],
        };
        let old = RoleGrant::new(
            Role::Student {
                group: group(5),
                subgroups: vec![],
            },
            at(1, 1),
        )
        .revoked(at(6, 1))
        .unwrap();

        let person = Person::new(PersonId::new(1).unwrap(), Name::new("Anna", "K").unwrap())
            .with_role(old)
            .unwrap()
            .with_role(RoleGrant::new(student, at(9, 1)))
            .unwrap();

        assert_eq!(person.groups_at(at(3, 1)), vec![group(5)]);
        assert_eq!(person.groups_at(at(10, 1)), vec![group(10), group(11)]);
        assert!(person.has_role("CLASS.Student", at(10, 1)));
        assert!(!person.has_role("CLASS.ClassTeacher", at(10, 1)));
    }

    #[test]
    fn person_validate_checks_grants() {
        let mut person = Person::new(PersonId::new(1).unwrap(), Name::new("A", "B").unwrap());
        person.roles.push(RoleGrant {
            role: Role::Principal,
            granted_at: at(9, 1),
            revoked_at: Some(at(8, 1)),
        });
        assert!(person.validate().is_err());
    }
}
