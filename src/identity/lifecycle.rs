use serde::{Deserialize, Serialize};

use crate::model::{Person, Residency};

use super::gateway::Identity;

/// Derived position in the onboarding funnel. Never stored; recomputed from
/// the three inputs on every routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unauthenticated,
    AuthenticatedNoProfile,
    ProfileNoProperties,
    HasProperties,
    Admin,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Unauthenticated => "unauthenticated",
            LifecycleState::AuthenticatedNoProfile => "authenticated_no_profile",
            LifecycleState::ProfileNoProperties => "profile_no_properties",
            LifecycleState::HasProperties => "has_properties",
            LifecycleState::Admin => "admin",
        }
    }
}

/// Classify a caller. Check order matters: admin wins before the residency
/// count, so an admin with zero properties still classifies as admin.
/// Ended residencies never count as property association.
pub fn classify(
    identity: Option<&Identity>,
    person: Option<&Person>,
    residencies: &[Residency],
) -> LifecycleState {
    if identity.is_none() {
        return LifecycleState::Unauthenticated;
    }
    let Some(person) = person else {
        return LifecycleState::AuthenticatedNoProfile;
    };
    if person.is_admin() {
        return LifecycleState::Admin;
    }
    if residencies.iter().any(|r| r.is_current()) {
        LifecycleState::HasProperties
    } else {
        LifecycleState::ProfileNoProperties
    }
}
