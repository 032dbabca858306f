//! Append-only audit trail for provisioning decisions. Each entry captures
//! which property was affected, what happened, who acted, and a free-form
//! detail payload. Entries are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::property::PropertyId;

/// Auditable lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AccessRequested,
    AccessGranted,
    AccessDenied,
    InviteSent,
    InvitationAccepted,
    ResidentRemoved,
}

impl AuditAction {
    /// Static string label, used in log lines and list filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AccessRequested => "access_requested",
            AuditAction::AccessGranted => "access_granted",
            AuditAction::AccessDenied => "access_denied",
            AuditAction::InviteSent => "invite_sent",
            AuditAction::InvitationAccepted => "invitation_accepted",
            AuditAction::ResidentRemoved => "resident_removed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub property_id: PropertyId,
    pub action: AuditAction,
    /// Person or reviewer label; absent for anonymous submissions.
    #[serde(default)]
    pub actor: Option<String>,
    pub detail: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        property_id: PropertyId,
        action: AuditAction,
        actor: Option<String>,
        detail: serde_json::Value,
    ) -> Self {
        AuditEntry { id: Uuid::new_v4(), property_id, action, actor, detail, at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_labels_are_snake_case() {
        assert_eq!(AuditAction::AccessRequested.as_str(), "access_requested");
        assert_eq!(AuditAction::InvitationAccepted.as_str(), "invitation_accepted");
        assert_eq!(
            serde_json::to_value(AuditAction::InviteSent).unwrap(),
            AuditAction::InviteSent.as_str()
        );
    }
}
