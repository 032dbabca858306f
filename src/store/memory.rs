//! Single-process directory backend. All tables live under one RwLock so
//! each call sees and mutates a consistent state; the uniqueness and
//! status guards the traits promise run inside the write lock, which is
//! what makes concurrent duplicate submissions and double reviews resolve
//! to exactly one winner.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;

use crate::error::{AppError, AppResult};
use crate::model::{
    AccessRequest, AuditEntry, IdentityId, InviteId, Invitation, InvitationStatus, OwnershipClaim,
    Person, PersonId, Property, PropertyId, RequestId, RequestStatus, Residency, ResidencyId,
    Tenure,
};

use super::{
    AccessRequestStore, AuditLog, InvitationStore, OwnershipStore, PeopleStore, PropertyStore,
    ResidencyStore,
};

#[derive(Default)]
pub(super) struct DirectoryState {
    pub people: HashMap<PersonId, Person>,
    pub properties: HashMap<PropertyId, Property>,
    pub residencies: HashMap<ResidencyId, Residency>,
    pub ownership: Vec<OwnershipClaim>,
    pub requests: HashMap<RequestId, AccessRequest>,
    pub invitations: HashMap<InviteId, Invitation>,
    pub audit: Vec<AuditEntry>,
}

pub struct MemoryDirectory {
    pub(super) state: RwLock<DirectoryState>,
    /// Snapshot location; `None` keeps the directory purely in memory.
    pub(super) dir: Option<PathBuf>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self { state: RwLock::new(DirectoryState::default()), dir: None }
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl PeopleStore for MemoryDirectory {
    fn get(&self, id: PersonId) -> Option<Person> {
        self.state.read().people.get(&id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<Person> {
        let st = self.state.read();
        st.people.values().find(|p| same_email(&p.email, email)).cloned()
    }

    fn find_by_identity(&self, identity_id: IdentityId) -> Option<Person> {
        let st = self.state.read();
        st.people
            .values()
            .find(|p| p.identity.identity_id() == Some(identity_id))
            .cloned()
    }

    fn insert(&self, person: Person) -> AppResult<Person> {
        let mut st = self.state.write();
        if st.people.values().any(|p| same_email(&p.email, &person.email)) {
            return Err(AppError::conflict("email_in_use", "a person with this email already exists"));
        }
        if let Some(identity_id) = person.identity.identity_id() {
            if st.people.values().any(|p| p.identity.identity_id() == Some(identity_id)) {
                return Err(AppError::conflict(
                    "identity_in_use",
                    "this auth account is already linked to a person",
                ));
            }
        }
        st.people.insert(person.id, person.clone());
        Ok(person)
    }

    fn update(&self, person: Person) -> AppResult<Person> {
        let mut st = self.state.write();
        if !st.people.contains_key(&person.id) {
            return Err(AppError::not_found("person_not_found", "no such person"));
        }
        if st
            .people
            .values()
            .any(|p| p.id != person.id && same_email(&p.email, &person.email))
        {
            return Err(AppError::conflict("email_in_use", "a person with this email already exists"));
        }
        if let Some(identity_id) = person.identity.identity_id() {
            if st
                .people
                .values()
                .any(|p| p.id != person.id && p.identity.identity_id() == Some(identity_id))
            {
                return Err(AppError::conflict(
                    "identity_in_use",
                    "this auth account is already linked to a person",
                ));
            }
        }
        st.people.insert(person.id, person.clone());
        Ok(person)
    }
}

impl PropertyStore for MemoryDirectory {
    fn get(&self, id: PropertyId) -> Option<Property> {
        self.state.read().properties.get(&id).cloned()
    }

    fn insert(&self, property: Property) -> AppResult<Property> {
        let mut st = self.state.write();
        if st.properties.contains_key(&property.id) {
            return Err(AppError::conflict("property_exists", "a property with this id already exists"));
        }
        st.properties.insert(property.id, property.clone());
        Ok(property)
    }

    fn search(&self, query: &str, limit: usize) -> Vec<Property> {
        let needle = query.trim().to_lowercase();
        let st = self.state.read();
        let mut hits: Vec<Property> = st
            .properties
            .values()
            .filter(|p| p.address.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.address.cmp(&b.address));
        hits.truncate(limit);
        hits
    }
}

impl ResidencyStore for MemoryDirectory {
    fn get(&self, id: ResidencyId) -> Option<Residency> {
        self.state.read().residencies.get(&id).cloned()
    }

    fn insert(&self, residency: Residency) -> AppResult<Residency> {
        let mut st = self.state.write();
        let duplicate = st.residencies.values().any(|r| {
            r.person_id == residency.person_id
                && r.property_id == residency.property_id
                && r.is_current()
        });
        if duplicate {
            return Err(AppError::conflict(
                "already_resident",
                "this person already holds current residency at the property",
            ));
        }
        st.residencies.insert(residency.id, residency.clone());
        Ok(residency)
    }

    fn update(&self, residency: Residency) -> AppResult<Residency> {
        let mut st = self.state.write();
        if !st.residencies.contains_key(&residency.id) {
            return Err(AppError::not_found("residency_not_found", "no such residency"));
        }
        st.residencies.insert(residency.id, residency.clone());
        Ok(residency)
    }

    fn list_current_by_property(&self, property_id: PropertyId) -> Vec<Residency> {
        let st = self.state.read();
        let mut out: Vec<Residency> = st
            .residencies
            .values()
            .filter(|r| r.property_id == property_id && r.is_current())
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.start_date, a.id.0).cmp(&(b.start_date, b.id.0)));
        out
    }

    fn list_current_by_person(&self, person_id: PersonId) -> Vec<Residency> {
        let st = self.state.read();
        let mut out: Vec<Residency> = st
            .residencies
            .values()
            .filter(|r| r.person_id == person_id && r.is_current())
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.start_date, a.id.0).cmp(&(b.start_date, b.id.0)));
        out
    }

    fn clear_primary_contact(&self, property_id: PropertyId) -> AppResult<usize> {
        let mut st = self.state.write();
        let mut changed = 0usize;
        for r in st.residencies.values_mut() {
            if r.property_id == property_id && r.is_current() && r.is_primary_contact {
                r.is_primary_contact = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn end_tenure(&self, id: ResidencyId, on: NaiveDate, reason: &str) -> AppResult<Residency> {
        let mut st = self.state.write();
        let Some(r) = st.residencies.get_mut(&id) else {
            return Err(AppError::not_found("residency_not_found", "no such residency"));
        };
        if !r.is_current() {
            return Err(AppError::conflict("already_ended", "residency has already ended"));
        }
        r.tenure = Tenure::Ended { on, reason: reason.to_string() };
        r.is_primary_contact = false;
        Ok(r.clone())
    }
}

impl OwnershipStore for MemoryDirectory {
    fn record(&self, claim: OwnershipClaim) -> AppResult<OwnershipClaim> {
        let mut st = self.state.write();
        st.ownership.push(claim.clone());
        Ok(claim)
    }

    fn list_by_property(&self, property_id: PropertyId) -> Vec<OwnershipClaim> {
        let st = self.state.read();
        st.ownership.iter().filter(|c| c.property_id == property_id).cloned().collect()
    }
}

impl AccessRequestStore for MemoryDirectory {
    fn get(&self, id: RequestId) -> Option<AccessRequest> {
        self.state.read().requests.get(&id).cloned()
    }

    fn insert(&self, request: AccessRequest) -> AppResult<AccessRequest> {
        let mut st = self.state.write();
        let duplicate = st.requests.values().any(|r| {
            r.property_id == request.property_id
                && r.status == RequestStatus::Pending
                && same_email(&r.requester_email, &request.requester_email)
        });
        if duplicate {
            return Err(AppError::conflict(
                "duplicate_request",
                "a pending request for this property and email already exists",
            ));
        }
        st.requests.insert(request.id, request.clone());
        Ok(request)
    }

    fn list(
        &self,
        status: Option<RequestStatus>,
        property: Option<PropertyId>,
    ) -> Vec<AccessRequest> {
        let st = self.state.read();
        let mut out: Vec<AccessRequest> = st
            .requests
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .filter(|r| property.map_or(true, |p| r.property_id == p))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        out
    }

    fn set_reviewed(
        &self,
        id: RequestId,
        status: RequestStatus,
        reviewer: &str,
        notes: Option<&str>,
    ) -> AppResult<AccessRequest> {
        if !status.is_terminal() {
            return Err(AppError::internal("bad_review_status", "review must settle the request"));
        }
        let mut st = self.state.write();
        let Some(r) = st.requests.get_mut(&id) else {
            return Err(AppError::not_found("request_not_found", "no such access request"));
        };
        if r.status.is_terminal() {
            return Err(AppError::conflict("already_processed", "request has already been reviewed"));
        }
        r.status = status;
        r.reviewer = Some(reviewer.to_string());
        r.review_notes = notes.map(|n| n.to_string());
        r.reviewed_at = Some(Utc::now());
        Ok(r.clone())
    }

    fn revert_review(&self, id: RequestId) -> AppResult<AccessRequest> {
        let mut st = self.state.write();
        let Some(r) = st.requests.get_mut(&id) else {
            return Err(AppError::not_found("request_not_found", "no such access request"));
        };
        r.status = RequestStatus::Pending;
        r.reviewer = None;
        r.review_notes = None;
        r.reviewed_at = None;
        Ok(r.clone())
    }
}

impl InvitationStore for MemoryDirectory {
    fn get(&self, id: InviteId) -> Option<Invitation> {
        self.state.read().invitations.get(&id).cloned()
    }

    fn insert(&self, invitation: Invitation) -> AppResult<Invitation> {
        let now = Utc::now();
        let mut st = self.state.write();
        if st.invitations.values().any(|i| i.token == invitation.token) {
            return Err(AppError::internal("token_collision", "invitation token already in use"));
        }
        let live_duplicate = st.invitations.values().any(|i| {
            i.property_id == invitation.property_id
                && i.status == InvitationStatus::Sent
                && !i.is_expired(now)
                && same_email(&i.invitee_email, &invitation.invitee_email)
        });
        if live_duplicate {
            return Err(AppError::conflict(
                "duplicate_invitation",
                "a live invitation for this property and email already exists",
            ));
        }
        st.invitations.insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    fn find_by_token(&self, token: &str) -> Option<Invitation> {
        let st = self.state.read();
        st.invitations.values().find(|i| i.token == token).cloned()
    }

    fn list_by_property(&self, property_id: PropertyId) -> Vec<Invitation> {
        let st = self.state.read();
        let mut out: Vec<Invitation> = st
            .invitations
            .values()
            .filter(|i| i.property_id == property_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    fn mark_accepted(&self, id: InviteId) -> AppResult<Invitation> {
        let mut st = self.state.write();
        let Some(i) = st.invitations.get_mut(&id) else {
            return Err(AppError::not_found("invitation_not_found", "no such invitation"));
        };
        if i.status != InvitationStatus::Sent {
            return Err(AppError::conflict(
                "already_accepted",
                "invitation has already been accepted",
            ));
        }
        i.status = InvitationStatus::Accepted;
        i.accepted_at = Some(Utc::now());
        Ok(i.clone())
    }

    fn revert_accept(&self, id: InviteId) -> AppResult<Invitation> {
        let mut st = self.state.write();
        let Some(i) = st.invitations.get_mut(&id) else {
            return Err(AppError::not_found("invitation_not_found", "no such invitation"));
        };
        i.status = InvitationStatus::Sent;
        i.accepted_at = None;
        Ok(i.clone())
    }
}

impl AuditLog for MemoryDirectory {
    fn append(&self, entry: AuditEntry) -> AppResult<()> {
        self.state.write().audit.push(entry);
        Ok(())
    }

    fn list_by_property(&self, property_id: PropertyId) -> Vec<AuditEntry> {
        let st = self.state.read();
        st.audit.iter().filter(|e| e.property_id == property_id).cloned().collect()
    }
}
