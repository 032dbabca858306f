//! Provisioning flows: the shared identity-and-profile primitive, the
//! reviewer-gated access-request lifecycle, owner-issued invitations, and
//! resident management. Handlers call these free functions with the store
//! bundle and the identity gateway; everything here is transport-agnostic.

mod compensation;
mod invitations;
mod provision;
mod requests;
mod residents;

pub use compensation::Compensations;
pub use invitations::{
    accept_invitation, create_invitation, verify_invitation, AcceptOutcome, CreateInvitation,
    InvitationPreview,
};
pub use provision::{account_type_for, provision_identity_and_profile, ProvisionOutcome};
pub use requests::{review_request, submit_request, ReviewDecision, SubmitAccessRequest};
pub use residents::{
    list_current_residents, remove_resident, setup_profile, update_resident, ResidentView,
    UpdateResident,
};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};
use crate::model::AuditEntry;
use crate::store::AuditLog;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Trim, lowercase and shape-check an email taken from a payload.
pub(crate) fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::validation("missing_fields", "email is required"));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::validation("invalid_email", "email address is not valid"));
    }
    Ok(email)
}

/// Append an audit entry, swallowing failures. A completed provisioning is
/// never rolled back because the trail write failed.
pub(crate) fn audit_soft(log: &dyn AuditLog, entry: AuditEntry) {
    let action = entry.action;
    if let Err(err) = log.append(entry) {
        tracing::warn!(target: "postern::audit", "audit append failed action={} err={}", action.as_str(), err);
    }
}
