//! The shared identity-and-profile primitive both provisioning flows run.

use chrono::Utc;
use serde_json::json;

use crate::error::AppResult;
use crate::identity::IdentityGateway;
use crate::model::{
    AccountStatus, AccountType, IdentityLink, Person, PersonId, Relationship, VerificationMethod,
};
use crate::store::Stores;
use crate::tprintln;

use super::compensation::Compensations;
use super::normalize_email;

#[derive(Debug, Clone, Copy)]
pub struct ProvisionOutcome {
    pub person_id: PersonId,
    /// False when the person was already linked and nothing was touched.
    pub identity_created: bool,
}

/// Account type a claimed relationship provisions by default.
pub fn account_type_for(relationship: Relationship) -> AccountType {
    match relationship {
        Relationship::Owner => AccountType::Owner,
        Relationship::Resident | Relationship::Manager => AccountType::Resident,
    }
}

fn split_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let first = parts.next().unwrap_or("Guest").to_string();
    let rest: Vec<&str> = parts.collect();
    let last = if rest.is_empty() { "User".to_string() } else { rest.join(" ") };
    (first, last)
}

/// Create-or-reuse the auth identity and person record for an email,
/// linking the two. The identity write and the person write cannot share a
/// transaction, so a person-write failure deletes the identity created one
/// step earlier; an orphaned identity must never persist.
///
/// Idempotent by construction: a person already linked short-circuits, so
/// retrying a partially failed flow converges instead of duplicating.
pub fn provision_identity_and_profile(
    stores: &Stores,
    gateway: &dyn IdentityGateway,
    email: &str,
    full_name: &str,
    account_type: AccountType,
    verification: VerificationMethod,
) -> AppResult<ProvisionOutcome> {
    let email = normalize_email(email)?;
    let existing = stores.people.find_by_email(&email);
    if let Some(person) = &existing {
        if person.identity.is_linked() {
            return Ok(ProvisionOutcome { person_id: person.id, identity_created: false });
        }
    }

    let (first_name, last_name) = split_name(full_name);
    let metadata = json!({ "first_name": &first_name, "last_name": &last_name });
    let identity = gateway.create_identity(&email, true, metadata)?;
    let identity_id = identity.id;
    let mut comp = Compensations::new();
    comp.push("create_identity", move || gateway.delete_identity(identity_id));

    let person = match existing {
        None => stores.people.insert(Person {
            id: PersonId::new(),
            identity: IdentityLink::Linked { identity_id },
            first_name,
            last_name,
            email: email.clone(),
            account_status: AccountStatus::Verified,
            account_type,
            verification_method: verification,
            created_at: Utc::now(),
        })?,
        Some(mut person) => {
            // Keep the existing names and account type; only the link,
            // status and method change.
            person.identity = IdentityLink::Linked { identity_id };
            person.account_status = AccountStatus::Verified;
            person.verification_method = verification;
            stores.people.update(person)?
        }
    };

    comp.disarm();
    tprintln!("provision person={} email={}", person.id, email);
    Ok(ProvisionOutcome { person_id: person.id, identity_created: true })
}
