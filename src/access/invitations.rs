//! Invitations: the owner-initiated path onto a property.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::{gen_token, IdentityGateway};
use crate::model::{
    AccessLevel, AccountType, AuditAction, AuditEntry, Invitation, InvitationStatus, InviteId,
    Permission, Person, PersonId, PropertyId, Relationship, Residency, ResidencyId, Tenure,
    VerificationMethod,
};
use crate::store::Stores;

use super::compensation::Compensations;
use super::provision::provision_identity_and_profile;
use super::{audit_soft, normalize_email};

#[derive(Debug, Clone)]
pub struct CreateInvitation {
    pub property_id: PropertyId,
    pub invitee_email: String,
    pub invitee_name: String,
    pub relationship: Relationship,
    /// None falls back to the standard grant set.
    pub permissions: Option<Vec<Permission>>,
    pub access_level: Option<AccessLevel>,
    pub can_invite_others: Option<bool>,
    pub message: Option<String>,
}

/// Issue an invitation for a property. The inviter must hold a current
/// residency there as an owner or with the invite grant; the snapshot of
/// grants taken here is exactly what acceptance will apply later, however
/// the property's defaults change in between.
pub fn create_invitation(
    stores: &Stores,
    inviter: &Person,
    create: CreateInvitation,
    ttl_days: i64,
) -> AppResult<Invitation> {
    let email = normalize_email(&create.invitee_email)?;
    let name = create.invitee_name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("missing_fields", "invitee name is required"));
    }
    let Some(property) = stores.properties.get(create.property_id) else {
        return Err(AppError::not_found("property_not_found", "property not found"));
    };

    let authorized = stores
        .residencies
        .list_current_by_person(inviter.id)
        .iter()
        .any(|r| r.property_id == property.id && r.may_invite());
    if !authorized {
        return Err(AppError::forbidden(
            "not_allowed",
            "you do not have permission to invite residents to this property",
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
                "this person already has access to this property",
            ));
        }
    }
    // Friendly pre-check; the store guard is the authority under races.
    let now = Utc::now();
    let live_dup = stores
        .invitations
        .list_by_property(property.id)
        .iter()
        .any(|i| {
            i.status == InvitationStatus::Sent
                && !i.is_expired(now)
                && i.invitee_email.eq_ignore_ascii_case(&email)
        });
    if live_dup {
        return Err(AppError::conflict(
            "duplicate_invitation",
            "an invitation has already been sent to this email address",
        ));
    }

    let invitation = stores.invitations.insert(Invitation {
        id: InviteId::new(),
        property_id: property.id,
        inviter_id: inviter.id,
        invitee_email: email.clone(),
        invitee_name: name,
        relationship: create.relationship,
        permissions: create.permissions.unwrap_or_else(Permission::defaults),
        access_level: create.access_level.unwrap_or(AccessLevel::Basic),
        can_invite_others: create.can_invite_others.unwrap_or(false),
        message: create.message.filter(|m| !m.trim().is_empty()),
        token: gen_token(),
        status: InvitationStatus::Sent,
        created_at: now,
        expires_at: now + Duration::days(ttl_days),
        accepted_at: None,
    })?;

    audit_soft(
        stores.audit.as_ref(),
        AuditEntry::new(
            property.id,
            AuditAction::InviteSent,
            Some(inviter.display_name()),
            json!({
                "invitation_id": invitation.id,
                "invitee_email": email,
                "relationship": invitation.relationship,
                "permissions": invitation.permissions,
            }),
        ),
    );
    info!(target: "postern::access", "invitation sent property='{}' email={}", property.address, email);
    Ok(invitation)
}

/// What the invitee sees before deciding. Never includes the token.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationPreview {
    pub invitation_id: InviteId,
    pub property_id: PropertyId,
    pub property_address: String,
    pub inviter_name: String,
    pub invitee_email: String,
    pub invitee_name: String,
    pub relationship: Relationship,
    pub permissions: Vec<Permission>,
    pub access_level: AccessLevel,
    pub can_invite_others: bool,
    pub expires_at: DateTime<Utc>,
}

/// Token checks shared by verify and accept, in fixed order: unknown,
/// then expired, then already used. An expired invitation reports
/// expiry even after someone accepted it.
fn lookup_live(stores: &Stores, token: &str) -> AppResult<Invitation> {
    if token.trim().is_empty() {
        return Err(AppError::validation("missing_fields", "invitation token is required"));
    }
    let Some(invitation) = stores.invitations.find_by_token(token) else {
        return Err(AppError::not_found("invalid_token", "invalid invitation token"));
    };
    if invitation.is_expired(Utc::now()) {
        return Err(AppError::expired("invitation_expired", "this invitation has expired"));
    }
    if invitation.status != InvitationStatus::Sent {
        return Err(AppError::conflict("already_used", "this invitation has already been used"));
    }
    Ok(invitation)
}

/// Read-only token check for the invitation landing page. Mutates nothing.
pub fn verify_invitation(stores: &Stores, token: &str) -> AppResult<InvitationPreview> {
    let invitation = lookup_live(stores, token)?;
    let property_address = stores
        .properties
        .get(invitation.property_id)
        .map(|p| p.address)
        .unwrap_or_default();
    let inviter_name = stores
        .people
        .get(invitation.inviter_id)
        .map(|p| p.display_name())
        .unwrap_or_else(|| "A property owner".to_string());
    Ok(InvitationPreview {
        invitation_id: invitation.id,
        property_id: invitation.property_id,
        property_address,
        inviter_name,
        invitee_email: invitation.invitee_email,
        invitee_name: invitation.invitee_name,
        relationship: invitation.relationship,
        permissions: invitation.permissions,
        access_level: invitation.access_level,
        can_invite_others: invitation.can_invite_others,
        expires_at: invitation.expires_at,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptOutcome {
    pub person_id: PersonId,
    pub identity_created: bool,
    /// The accept flow never signs the invitee in; they log in afterwards.
    pub requires_login: bool,
}

/// Accept an invitation. The sent-only flip is taken first and decides the
/// single winner under concurrent accepts; provisioning failure unwinds
/// the flip so the invitee can retry with the same token.
pub fn accept_invitation(
    stores: &Stores,
    gateway: &dyn IdentityGateway,
    token: &str,
    email: &str,
) -> AppResult<AcceptOutcome> {
    let email = normalize_email(email)?;
    let invitation = lookup_live(stores, token)?;
    if !invitation.invitee_email.eq_ignore_ascii_case(&email) {
        return Err(AppError::forbidden(
            "email_mismatch",
            "this invitation is for a different email address",
        ));
    }

    let accepted = stores.invitations.mark_accepted(invitation.id)?;
    let mut comp = Compensations::new();
    comp.push("accept_flip", || {
        stores.invitations.revert_accept(invitation.id).map(|_| ())
    });

    let outcome = provision_identity_and_profile(
        stores,
        gateway,
        &accepted.invitee_email,
        &accepted.invitee_name,
        AccountType::Resident,
        VerificationMethod::Invitation,
    )?;

    // Grants come from the invitation snapshot, not current defaults.
    stores.residencies.insert(Residency {
        id: ResidencyId::new(),
        person_id: outcome.person_id,
        property_id: accepted.property_id,
        relationship: accepted.relationship,
        permissions: accepted.permissions.clone(),
        access_level: accepted.access_level,
        can_invite_others: accepted.can_invite_others,
        is_primary_contact: false,
        start_date: Utc::now().date_naive(),
        tenure: Tenure::Current,
        invited_by: Some(accepted.inviter_id),
    })?;

    comp.disarm();
    audit_soft(
        stores.audit.as_ref(),
        AuditEntry::new(
            accepted.property_id,
            AuditAction::InvitationAccepted,
            Some(outcome.person_id.to_string()),
            json!({
                "invitation_id": accepted.id,
                "invitee_email": email,
                "invited_by": accepted.inviter_id,
            }),
        ),
    );
    info!(target: "postern::access", "invitation accepted id={} email={}", accepted.id, email);
    Ok(AcceptOutcome {
        person_id: outcome.person_id,
        identity_created: outcome.identity_created,
        requires_login: true,
    })
}
