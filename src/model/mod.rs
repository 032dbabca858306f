pub mod access;
pub mod audit;
pub mod people;
pub mod property;
pub mod residency;

pub use access::{
    AccessRequest, Invitation, InvitationStatus, InviteId, RequestId, RequestStatus, ReviewAction,
};
pub use audit::{AuditAction, AuditEntry};
pub use people::{AccountStatus, AccountType, IdentityId, IdentityLink, Person, PersonId, VerificationMethod};
pub use property::{OwnershipClaim, OwnershipKind, Property, PropertyId};
pub use residency::{AccessLevel, Permission, Relationship, Residency, ResidencyId, Tenure};
