//! Profile setup and per-property resident administration.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::model::{
    AccessLevel, AccountStatus, AccountType, AuditAction, AuditEntry, IdentityLink, Permission,
    Person, PersonId, PropertyId, Relationship, Residency, ResidencyId, VerificationMethod,
};
use crate::store::Stores;

use super::audit_soft;

/// First-sign-in profile creation for a self-registered identity. The
/// person starts unverified with no residencies; access arrives later via
/// a request or an invitation.
pub fn setup_profile(
    stores: &Stores,
    identity: Option<&Identity>,
    first_name: &str,
    last_name: &str,
) -> AppResult<Person> {
    let first = first_name.trim();
    let last = last_name.trim();
    if first.is_empty() || last.is_empty() {
        return Err(AppError::validation("missing_fields", "first name and last name are required"));
    }
    let Some(identity) = identity else {
        return Err(AppError::auth("no_session", "sign in to set up a profile"));
    };
    if stores.people.find_by_identity(identity.id).is_some() {
        return Err(AppError::validation("profile_exists", "profile already exists for this user"));
    }

    let person = stores.people.insert(Person {
        id: PersonId::new(),
        identity: IdentityLink::Linked { identity_id: identity.id },
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: identity.email.clone(),
        account_status: AccountStatus::Unverified,
        account_type: AccountType::Resident,
        verification_method: VerificationMethod::EmailSignup,
        created_at: Utc::now(),
    })?;
    info!(target: "postern::access", "profile created person={} email={}", person.id, person.email);
    Ok(person)
}

/// A residency joined with its person, shaped for admin listings.
#[derive(Debug, Clone, Serialize)]
pub struct ResidentView {
    pub residency_id: ResidencyId,
    pub person_id: PersonId,
    pub name: String,
    pub email: String,
    pub relationship: Relationship,
    pub permissions: Vec<Permission>,
    pub access_level: AccessLevel,
    pub is_primary_contact: bool,
    pub start_date: NaiveDate,
}

/// Current residents of a property, primary contact first.
pub fn list_current_residents(
    stores: &Stores,
    property_id: PropertyId,
) -> AppResult<Vec<ResidentView>> {
    if stores.properties.get(property_id).is_none() {
        return Err(AppError::not_found("property_not_found", "property not found"));
    }
    let mut views: Vec<ResidentView> = stores
        .residencies
        .list_current_by_property(property_id)
        .into_iter()
        .map(|edge| {
            let (name, email) = stores
                .people
                .get(edge.person_id)
                .map(|p| (p.display_name(), p.email))
                .unwrap_or_else(|| ("Unknown".to_string(), String::new()));
            ResidentView {
                residency_id: edge.id,
                person_id: edge.person_id,
                name,
                email,
                relationship: edge.relationship,
                permissions: edge.permissions,
                access_level: edge.access_level,
                is_primary_contact: edge.is_primary_contact,
                start_date: edge.start_date,
            }
        })
        .collect();
    views.sort_by(|a, b| {
        b.is_primary_contact
            .cmp(&a.is_primary_contact)
            .then_with(|| a.start_date.cmp(&b.start_date))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(views)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateResident {
    pub relationship: Option<Relationship>,
    pub is_primary_contact: Option<bool>,
}

/// Change a current resident's relationship or primary-contact flag.
/// Promoting a new primary clears the flag across the property first, so
/// at most one current resident carries it.
pub fn update_resident(
    stores: &Stores,
    property_id: PropertyId,
    residency_id: ResidencyId,
    changes: UpdateResident,
) -> AppResult<Residency> {
    if changes.relationship.is_none() && changes.is_primary_contact.is_none() {
        return Err(AppError::validation("no_changes", "nothing to update"));
    }
    let Some(mut edge) = stores.residencies.get(residency_id) else {
        return Err(AppError::not_found("residency_not_found", "residency not found"));
    };
    if edge.property_id != property_id || !edge.is_current() {
        return Err(AppError::not_found(
            "residency_not_found",
            "no current residency with this id for the property",
        ));
    }

    if changes.is_primary_contact == Some(true) {
        stores.residencies.clear_primary_contact(property_id)?;
    }
    if let Some(relationship) = changes.relationship {
        edge.relationship = relationship;
    }
    if let Some(primary) = changes.is_primary_contact {
        edge.is_primary_contact = primary;
    }
    stores.residencies.update(edge)
}

/// Soft removal: end the tenure today with a reason. The edge stays for
/// history and drops out of every current view.
pub fn remove_resident(
    stores: &Stores,
    property_id: PropertyId,
    residency_id: ResidencyId,
    reason: Option<String>,
) -> AppResult<Residency> {
    let Some(edge) = stores.residencies.get(residency_id) else {
        return Err(AppError::not_found("residency_not_found", "residency not found"));
    };
    if edge.property_id != property_id {
        return Err(AppError::not_found(
            "residency_not_found",
            "no residency with this id for the property",
        ));
    }
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "Removed by admin".to_string());

    let ended = stores
        .residencies
        .end_tenure(residency_id, Utc::now().date_naive(), &reason)?;
    audit_soft(
        stores.audit.as_ref(),
        AuditEntry::new(
            property_id,
            AuditAction::ResidentRemoved,
            None,
            json!({
                "residency_id": residency_id,
                "person_id": ended.person_id,
                "reason": reason,
            }),
        ),
    );
    info!(target: "postern::access", "resident removed residency={} property={}", residency_id, property_id);
    Ok(ended)
}
