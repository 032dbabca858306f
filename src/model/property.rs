use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::people::PersonId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub Uuid);

impl PropertyId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Display for PropertyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub address: String,
    #[serde(default)]
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipKind {
    SoleOwner,
}

impl OwnershipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnershipKind::SoleOwner => "sole_owner",
        }
    }
}

/// Ownership as asserted during provisioning and verified by a reviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipClaim {
    pub id: Uuid,
    pub property_id: PropertyId,
    pub owner_id: PersonId,
    pub kind: OwnershipKind,
    pub reviewer_verified: bool,
    #[serde(default)]
    pub verified_by: Option<String>,
    pub verified_at: DateTime<Utc>,
}
