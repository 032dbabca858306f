//! Access requests: the ask-and-review path onto a property.

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::identity::IdentityGateway;
use crate::model::{
    AccessLevel, AccessRequest, AuditAction, AuditEntry, OwnershipClaim, OwnershipKind,
    Permission, Relationship, RequestId, RequestStatus, Residency, ResidencyId, ReviewAction,
    Tenure, VerificationMethod,
};
use crate::store::Stores;

use super::compensation::Compensations;
use super::provision::{account_type_for, provision_identity_and_profile};
use super::{audit_soft, normalize_email};

#[derive(Debug, Clone)]
pub struct SubmitAccessRequest {
    pub property_id: crate::model::PropertyId,
    pub requester_email: String,
    pub requester_name: String,
    pub claimed_relationship: Relationship,
    pub message: Option<String>,
}

/// File a pending request against a property. Anonymous: no session is
/// required, the requester is identified by email alone.
pub fn submit_request(stores: &Stores, submit: SubmitAccessRequest) -> AppResult<AccessRequest> {
    let email = normalize_email(&submit.requester_email)?;
    let name = submit.requester_name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("missing_fields", "requester name is required"));
    }
    let Some(property) = stores.properties.get(submit.property_id) else {
        return Err(AppError::not_found("property_not_found", "property not found"));
    };

    let pending_dup = stores
        .requests
        .list(Some(RequestStatus::Pending), Some(property.id))
        .iter()
        .any(|r| r.requester_email.eq_ignore_ascii_case(&email));
    if pending_dup {
        return Err(AppError::conflict(
            "duplicate_request",
            "you already have a pending access request for this property",
        ));
    }
    if let Some(person) = stores.people.find_by_email(&email) {
        let holds = stores
            .residencies
            .list_current_by_person(person.id)
            .iter()
            .any(|r| r.property_id == property.id);
        if holds {
            return Err(AppError::conflict(
                "already_resident",
                "you already have access to this property",
            ));
        }
    }

    let request = stores.requests.insert(AccessRequest {
        id: RequestId::new(),
        property_id: property.id,
        requester_email: email.clone(),
        requester_name: name,
        claimed_relationship: submit.claimed_relationship,
        message: submit.message.filter(|m| !m.trim().is_empty()),
        status: RequestStatus::Pending,
        reviewer: None,
        review_notes: None,
        requested_at: Utc::now(),
        reviewed_at: None,
    })?;

    audit_soft(
        stores.audit.as_ref(),
        AuditEntry::new(
            property.id,
            AuditAction::AccessRequested,
            None,
            json!({
                "request_id": request.id,
                "requester_email": email,
                "claimed_relationship": request.claimed_relationship,
            }),
        ),
    );
    info!(target: "postern::access", "access requested property='{}' email={}", property.address, email);
    Ok(request)
}

#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub action: ReviewAction,
    pub reviewer: String,
    pub notes: Option<String>,
}

/// Settle a pending request. The store's pending-only flip decides the
/// winner under concurrent reviews; approval then provisions identity,
/// person, residency and (for owners) the ownership claim, unwinding back
/// through the flip if any of it fails so the request reopens.
pub fn review_request(
    stores: &Stores,
    gateway: &dyn IdentityGateway,
    id: RequestId,
    decision: ReviewDecision,
) -> AppResult<AccessRequest> {
    let reviewer = decision.reviewer.trim().to_string();
    if reviewer.is_empty() {
        return Err(AppError::validation("missing_fields", "reviewer is required"));
    }
    let Some(request) = stores.requests.get(id) else {
        return Err(AppError::not_found("request_not_found", "access request not found"));
    };
    if request.status.is_terminal() {
        return Err(AppError::conflict(
            "already_processed",
            "this request has already been reviewed",
        ));
    }

    let status = match decision.action {
        ReviewAction::Approve => RequestStatus::Approved,
        ReviewAction::Reject => RequestStatus::Rejected,
    };
    let reviewed = stores
        .requests
        .set_reviewed(id, status, &reviewer, decision.notes.as_deref())?;

    if decision.action == ReviewAction::Reject {
        audit_soft(
            stores.audit.as_ref(),
            AuditEntry::new(
                request.property_id,
                AuditAction::AccessDenied,
                Some(reviewer),
                json!({
                    "request_id": id,
                    "requester_email": request.requester_email,
                    "review_notes": reviewed.review_notes,
                }),
            ),
        );
        info!(target: "postern::access", "access denied request={} email={}", id, request.requester_email);
        return Ok(reviewed);
    }

    let mut comp = Compensations::new();
    comp.push("review_flip", || {
        stores.requests.revert_review(id).map(|_| ())
    });

    let outcome = provision_identity_and_profile(
        stores,
        gateway,
        &request.requester_email,
        &request.requester_name,
        account_type_for(request.claimed_relationship),
        VerificationMethod::ReviewerVerified,
    )?;

    let claimed_owner = request.claimed_relationship == Relationship::Owner;
    let residency = stores.residencies.insert(Residency {
        id: ResidencyId::new(),
        person_id: outcome.person_id,
        property_id: request.property_id,
        relationship: request.claimed_relationship,
        permissions: Permission::defaults(),
        access_level: if claimed_owner { AccessLevel::Full } else { AccessLevel::Basic },
        can_invite_others: claimed_owner,
        is_primary_contact: false,
        start_date: Utc::now().date_naive(),
        tenure: Tenure::Current,
        invited_by: None,
    })?;
    let residency_id = residency.id;
    comp.push("grant_residency", move || {
        stores
            .residencies
            .end_tenure(residency_id, Utc::now().date_naive(), "provisioning reversed")
            .map(|_| ())
    });

    if claimed_owner {
        stores.ownership.record(OwnershipClaim {
            id: Uuid::new_v4(),
            property_id: request.property_id,
            owner_id: outcome.person_id,
            kind: OwnershipKind::SoleOwner,
            reviewer_verified: true,
            verified_by: Some(reviewer.clone()),
            verified_at: Utc::now(),
        })?;
    }

    comp.disarm();
    audit_soft(
        stores.audit.as_ref(),
        AuditEntry::new(
            request.property_id,
            AuditAction::AccessGranted,
            Some(reviewer),
            json!({
                "request_id": id,
                "requester_email": request.requester_email,
                "person_id": outcome.person_id,
                "review_notes": reviewed.review_notes,
            }),
        ),
    );
    info!(target: "postern::access", "access granted request={} email={} person={}", id, request.requester_email, outcome.person_id);
    Ok(reviewed)
}
