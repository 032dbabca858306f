use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::people::PersonId;
use super::property::PropertyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResidencyId(pub Uuid);

impl ResidencyId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Display for ResidencyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Owner,
    Resident,
    Manager,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Owner => "owner",
            Relationship::Resident => "resident",
            Relationship::Manager => "manager",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SurveyAccess,
    PropertyInfo,
    InviteResidents,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::SurveyAccess => "survey_access",
            Permission::PropertyInfo => "property_info",
            Permission::InviteResidents => "invite_residents",
        }
    }

    /// Grants applied to every newly provisioned residency.
    pub fn defaults() -> Vec<Permission> {
        vec![Permission::SurveyAccess, Permission::PropertyInfo]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Basic,
    Full,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Basic => "basic",
            AccessLevel::Full => "full",
        }
    }
}

/// Residency lifecycle. Removal never deletes the row; the edge flips to
/// `Ended` and drops out of every "current" query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Tenure {
    Current,
    Ended { on: NaiveDate, reason: String },
}

impl Tenure {
    pub fn is_current(&self) -> bool {
        matches!(self, Tenure::Current)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Residency {
    pub id: ResidencyId,
    pub person_id: PersonId,
    pub property_id: PropertyId,
    pub relationship: Relationship,
    pub permissions: Vec<Permission>,
    pub access_level: AccessLevel,
    pub can_invite_others: bool,
    pub is_primary_contact: bool,
    pub start_date: NaiveDate,
    pub tenure: Tenure,
    #[serde(default)]
    pub invited_by: Option<PersonId>,
}

impl Residency {
    pub fn is_current(&self) -> bool {
        self.tenure.is_current()
    }

    pub fn has_permission(&self, perm: Permission) -> bool {
        self.permissions.contains(&perm)
    }

    /// Whether this edge authorizes sending invitations for its property.
    pub fn may_invite(&self) -> bool {
        self.relationship == Relationship::Owner || self.has_permission(Permission::InviteResidents)
    }
}
