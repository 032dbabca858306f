use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityId(pub Uuid);

impl IdentityId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Display for IdentityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonId(pub Uuid);

impl PersonId {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// Link between a person record and an external auth identity.
/// A person can exist before they ever sign in (e.g. created by a reviewer
/// while approving an access request), so the link is explicit rather than
/// an optional id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IdentityLink {
    Unlinked,
    Linked { identity_id: IdentityId },
}

impl IdentityLink {
    pub fn identity_id(&self) -> Option<IdentityId> {
        match self {
            IdentityLink::Unlinked => None,
            IdentityLink::Linked { identity_id } => Some(*identity_id),
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, IdentityLink::Linked { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Unverified,
    Verified,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Unverified => "unverified",
            AccountStatus::Verified => "verified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Resident,
    Owner,
    Admin,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Resident => "resident",
            AccountType::Owner => "owner",
            AccountType::Admin => "admin",
        }
    }
}

/// How the person record came to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    EmailSignup,
    ReviewerVerified,
    Invitation,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMethod::EmailSignup => "email_signup",
            VerificationMethod::ReviewerVerified => "reviewer_verified",
            VerificationMethod::Invitation => "invitation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub identity: IdentityLink,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_status: AccountStatus,
    pub account_type: AccountType,
    pub verification_method: VerificationMethod,
    pub created_at: DateTime<Utc>,
}

impl Person {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.account_type == AccountType::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_link_accessors() {
        let id = IdentityId::new();
        assert_eq!(IdentityLink::Unlinked.identity_id(), None);
        assert!(!IdentityLink::Unlinked.is_linked());
        let linked = IdentityLink::Linked { identity_id: id };
        assert_eq!(linked.identity_id(), Some(id));
        assert!(linked.is_linked());
    }

    #[test]
    fn identity_link_serde_is_tagged() {
        let json = serde_json::to_value(IdentityLink::Unlinked).unwrap();
        assert_eq!(json["state"], "unlinked");
        let linked = IdentityLink::Linked { identity_id: IdentityId::new() };
        let json = serde_json::to_value(linked).unwrap();
        assert_eq!(json["state"], "linked");
        assert!(json["identity_id"].is_string());
    }
}
