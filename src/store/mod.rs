//! Store interfaces consumed by the provisioning flows, and the bundle
//! handed to handlers. Every backend is sync and object-safe; the
//! application shares one instance behind `Arc<dyn …>`.
//!
//! Mutations return `AppResult` so uniqueness and status guards surface as
//! typed conflicts; lookups return `Option`/`Vec` like the in-memory
//! backend they front.

mod memory;
mod snapshot;

pub use memory::MemoryDirectory;
pub use snapshot::DirectorySnapshot;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::AppResult;
use crate::model::{
    AccessRequest, AuditEntry, IdentityId, InviteId, Invitation, OwnershipClaim, Person, PersonId,
    Property, PropertyId, RequestId, RequestStatus, Residency, ResidencyId,
};

pub trait PeopleStore: Send + Sync {
    fn get(&self, id: PersonId) -> Option<Person>;
    fn find_by_email(&self, email: &str) -> Option<Person>;
    fn find_by_identity(&self, identity_id: IdentityId) -> Option<Person>;
    /// Rejects a duplicate email or an identity already linked elsewhere.
    fn insert(&self, person: Person) -> AppResult<Person>;
    fn update(&self, person: Person) -> AppResult<Person>;
}

pub trait PropertyStore: Send + Sync {
    fn get(&self, id: PropertyId) -> Option<Property>;
    fn insert(&self, property: Property) -> AppResult<Property>;
    /// Case-insensitive address substring search, capped at `limit` rows.
    fn search(&self, query: &str, limit: usize) -> Vec<Property>;
}

pub trait ResidencyStore: Send + Sync {
    fn get(&self, id: ResidencyId) -> Option<Residency>;
    /// Rejects a second current edge for the same person and property.
    fn insert(&self, residency: Residency) -> AppResult<Residency>;
    fn update(&self, residency: Residency) -> AppResult<Residency>;
    fn list_current_by_property(&self, property_id: PropertyId) -> Vec<Residency>;
    fn list_current_by_person(&self, person_id: PersonId) -> Vec<Residency>;
    /// Drop the primary-contact flag from every current edge of a property.
    /// Returns how many edges changed.
    fn clear_primary_contact(&self, property_id: PropertyId) -> AppResult<usize>;
    /// Soft removal: flip tenure to ended. The row stays for history.
    fn end_tenure(&self, id: ResidencyId, on: NaiveDate, reason: &str) -> AppResult<Residency>;
}

pub trait OwnershipStore: Send + Sync {
    fn record(&self, claim: OwnershipClaim) -> AppResult<OwnershipClaim>;
    fn list_by_property(&self, property_id: PropertyId) -> Vec<OwnershipClaim>;
}

pub trait AccessRequestStore: Send + Sync {
    fn get(&self, id: RequestId) -> Option<AccessRequest>;
    /// Rejects a second pending request for the same property and email.
    fn insert(&self, request: AccessRequest) -> AppResult<AccessRequest>;
    fn list(&self, status: Option<RequestStatus>, property: Option<PropertyId>)
        -> Vec<AccessRequest>;
    /// Single-row review flip. Only a pending request can move; a request
    /// that is already terminal comes back as a conflict, so the first
    /// reviewer wins and the second learns it was already processed.
    fn set_reviewed(
        &self,
        id: RequestId,
        status: RequestStatus,
        reviewer: &str,
        notes: Option<&str>,
    ) -> AppResult<AccessRequest>;
    /// Compensation hook: reopen a just-reviewed request after downstream
    /// provisioning failed, clearing the review fields. Not part of the
    /// normal lifecycle.
    fn revert_review(&self, id: RequestId) -> AppResult<AccessRequest>;
}

pub trait InvitationStore: Send + Sync {
    fn get(&self, id: InviteId) -> Option<Invitation>;
    /// Rejects a second live (sent and unexpired) invitation for the same
    /// property and email. Lapsed invitations do not block a fresh one.
    fn insert(&self, invitation: Invitation) -> AppResult<Invitation>;
    fn find_by_token(&self, token: &str) -> Option<Invitation>;
    fn list_by_property(&self, property_id: PropertyId) -> Vec<Invitation>;
    /// Single-row accept flip, sent-only. Stamps `accepted_at`.
    fn mark_accepted(&self, id: InviteId) -> AppResult<Invitation>;
    /// Compensation hook: put a just-accepted invitation back to sent after
    /// downstream provisioning failed. Not part of the normal lifecycle.
    fn revert_accept(&self, id: InviteId) -> AppResult<Invitation>;
}

pub trait AuditLog: Send + Sync {
    fn append(&self, entry: AuditEntry) -> AppResult<()>;
    fn list_by_property(&self, property_id: PropertyId) -> Vec<AuditEntry>;
}

/// Everything the handlers and flows need, cloned freely.
#[derive(Clone)]
pub struct Stores {
    pub people: Arc<dyn PeopleStore>,
    pub properties: Arc<dyn PropertyStore>,
    pub residencies: Arc<dyn ResidencyStore>,
    pub ownership: Arc<dyn OwnershipStore>,
    pub requests: Arc<dyn AccessRequestStore>,
    pub invitations: Arc<dyn InvitationStore>,
    pub audit: Arc<dyn AuditLog>,
}

impl Stores {
    /// Volatile bundle for tests and ad-hoc tooling.
    pub fn in_memory() -> Self {
        Self::from_directory(Arc::new(MemoryDirectory::new()))
    }

    pub fn from_directory(dir: Arc<MemoryDirectory>) -> Self {
        Stores {
            people: dir.clone(),
            properties: dir.clone(),
            residencies: dir.clone(),
            ownership: dir.clone(),
            requests: dir.clone(),
            invitations: dir.clone(),
            audit: dir,
        }
    }
}
