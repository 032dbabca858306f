//! Records for the two provisioning flows: reviewer-gated access requests
//! and owner-issued invitations. Status enums are one-way; approved,
//! rejected and accepted are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::people::PersonId;
use super::property::PropertyId;
use super::residency::{AccessLevel, Permission, Relationship};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InviteId(pub Uuid);

impl InviteId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Display for InviteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Only pending requests may be reviewed; the other two never change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Decision taken by a reviewer on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: RequestId,
    pub property_id: PropertyId,
    pub requester_email: String,
    pub requester_name: String,
    pub claimed_relationship: Relationship,
    #[serde(default)]
    pub message: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub review_notes: Option<String>,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Sent,
    Accepted,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Sent => "sent",
            InvitationStatus::Accepted => "accepted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvitationStatus::Accepted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InviteId,
    pub property_id: PropertyId,
    pub inviter_id: PersonId,
    pub invitee_email: String,
    pub invitee_name: String,
    pub relationship: Relationship,
    /// Grants frozen at send time; accept applies these exactly as stored.
    pub permissions: Vec<Permission>,
    pub access_level: AccessLevel,
    pub can_invite_others: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub token: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Expiry is a point-in-time comparison; nothing ever rewrites the
    /// status to an expired state.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
