//! Access-request flow: submission guards, review saga, concurrency and
//! compensation. Exercises positive and negative paths end to end.

use std::sync::Arc;

use anyhow::Result;

use postern::access::{self, ReviewDecision, SubmitAccessRequest};
use postern::error::{AppError, AppResult};
use postern::identity::{classify, IdentityGateway, LifecycleState, MemoryGateway};
use postern::model::{
    AccessLevel, AccessRequest, AccountType, AuditAction, IdentityId, Person, PersonId, Property,
    PropertyId, Relationship, RequestStatus, ReviewAction, VerificationMethod,
};
use postern::store::{PeopleStore, Stores};

fn seed() -> (Stores, MemoryGateway, Property) {
    let stores = Stores::in_memory();
    let gw = MemoryGateway::new();
    let property = stores
        .properties
        .insert(Property { id: PropertyId::new(), address: "14 Garden Terrace".into(), zone: None })
        .unwrap();
    (stores, gw, property)
}

fn submit(
    stores: &Stores,
    property: PropertyId,
    email: &str,
    relationship: Relationship,
) -> AppResult<AccessRequest> {
    access::submit_request(
        stores,
        SubmitAccessRequest {
            property_id: property,
            requester_email: email.into(),
            requester_name: "Jordan Reyes".into(),
            claimed_relationship: relationship,
            message: Some("grew up here".into()),
        },
    )
}

fn approve(reviewer: &str) -> ReviewDecision {
    ReviewDecision {
        action: ReviewAction::Approve,
        reviewer: reviewer.into(),
        notes: Some("deed checked".into()),
    }
}

#[test]
fn owner_approval_provisions_everything() -> Result<()> {
    let (stores, gw, property) = seed();
    let request = submit(&stores, property.id, "jordan@example.com", Relationship::Owner)?;
    assert_eq!(request.status, RequestStatus::Pending);

    let reviewed = access::review_request(&stores, &gw, request.id, approve("hoa-board"))?;
    assert_eq!(reviewed.status, RequestStatus::Approved);
    assert_eq!(reviewed.reviewer.as_deref(), Some("hoa-board"));
    assert!(reviewed.reviewed_at.is_some());

    // Person: verified owner, linked to a live auth account.
    let person = stores.people.find_by_email("jordan@example.com").expect("person provisioned");
    assert_eq!(person.account_type, AccountType::Owner);
    assert_eq!(person.verification_method, VerificationMethod::ReviewerVerified);
    assert!(person.identity.is_linked());
    let token = gw.issue_token("jordan@example.com")?;
    let identity = gw.current(&postern::identity::RequestContext::with_token(token)).unwrap();

    // Residency: current owner edge with full access and invite rights.
    let edges = stores.residencies.list_current_by_property(property.id);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].relationship, Relationship::Owner);
    assert_eq!(edges[0].access_level, AccessLevel::Full);
    assert!(edges[0].can_invite_others);

    // Ownership claim carries the reviewer attribution.
    let claims = stores.ownership.list_by_property(property.id);
    assert_eq!(claims.len(), 1);
    assert!(claims[0].reviewer_verified);
    assert_eq!(claims[0].verified_by.as_deref(), Some("hoa-board"));
    assert_eq!(claims[0].owner_id, person.id);

    // They now classify straight into the portal.
    let state = classify(Some(&identity), Some(&person), &edges);
    assert_eq!(state, LifecycleState::HasProperties);

    // Audit trail: requested, then granted.
    let actions: Vec<AuditAction> =
        stores.audit.list_by_property(property.id).iter().map(|e| e.action).collect();
    assert!(actions.contains(&AuditAction::AccessRequested));
    assert!(actions.contains(&AuditAction::AccessGranted));
    Ok(())
}

#[test]
fn resident_approval_grants_basic_access_only() -> Result<()> {
    let (stores, gw, property) = seed();
    let request = submit(&stores, property.id, "tenant@example.com", Relationship::Resident)?;
    access::review_request(&stores, &gw, request.id, approve("hoa-board"))?;

    let person = stores.people.find_by_email("tenant@example.com").unwrap();
    assert_eq!(person.account_type, AccountType::Resident);
    let edges = stores.residencies.list_current_by_property(property.id);
    assert_eq!(edges[0].access_level, AccessLevel::Basic);
    assert!(!edges[0].can_invite_others);
    assert!(stores.ownership.list_by_property(property.id).is_empty());
    Ok(())
}

#[test]
fn duplicate_pending_conflicts_until_settled() -> Result<()> {
    let (stores, gw, property) = seed();
    submit(&stores, property.id, "eager@example.com", Relationship::Resident)?;

    // Case-insensitive duplicate while the first is still pending.
    let err = submit(&stores, property.id, "Eager@Example.com", Relationship::Owner).unwrap_err();
    assert_eq!(err.http_status(), 409);
    assert_eq!(err.code_str(), "duplicate_request");

    // Rejection settles the first; a fresh request is welcome again.
    let pending = stores.requests.list(Some(RequestStatus::Pending), Some(property.id));
    access::review_request(
        &stores,
        &gw,
        pending[0].id,
        ReviewDecision {
            action: ReviewAction::Reject,
            reviewer: "hoa-board".into(),
            notes: Some("no match on the deed".into()),
        },
    )?;
    let again = submit(&stores, property.id, "eager@example.com", Relationship::Resident)?;
    assert_eq!(again.status, RequestStatus::Pending);
    Ok(())
}

#[test]
fn rejection_provisions_nothing() -> Result<()> {
    let (stores, gw, property) = seed();
    let request = submit(&stores, property.id, "nope@example.com", Relationship::Owner)?;
    let reviewed = access::review_request(
        &stores,
        &gw,
        request.id,
        ReviewDecision { action: ReviewAction::Reject, reviewer: "hoa-board".into(), notes: None },
    )?;
    assert_eq!(reviewed.status, RequestStatus::Rejected);

    assert!(stores.people.find_by_email("nope@example.com").is_none());
    assert!(gw.issue_token("nope@example.com").is_err());
    assert!(stores.residencies.list_current_by_property(property.id).is_empty());
    let actions: Vec<AuditAction> =
        stores.audit.list_by_property(property.id).iter().map(|e| e.action).collect();
    assert!(actions.contains(&AuditAction::AccessDenied));
    assert!(!actions.contains(&AuditAction::AccessGranted));
    Ok(())
}

#[test]
fn settled_requests_cannot_be_reviewed_again() -> Result<()> {
    let (stores, gw, property) = seed();
    let request = submit(&stores, property.id, "once@example.com", Relationship::Resident)?;
    access::review_request(&stores, &gw, request.id, approve("hoa-board"))?;

    let err = access::review_request(&stores, &gw, request.id, approve("someone-else")).unwrap_err();
    assert_eq!(err.http_status(), 409);
    assert_eq!(err.code_str(), "already_processed");
    Ok(())
}

#[test]
fn review_input_is_validated() -> Result<()> {
    let (stores, gw, property) = seed();
    let request = submit(&stores, property.id, "valid@example.com", Relationship::Resident)?;

    let err = access::review_request(&stores, &gw, request.id, approve("  ")).unwrap_err();
    assert_eq!(err.http_status(), 400);

    let err = access::review_request(
        &stores,
        &gw,
        postern::model::RequestId::new(),
        approve("hoa-board"),
    )
    .unwrap_err();
    assert_eq!(err.http_status(), 404);
    Ok(())
}

#[test]
fn submission_guards_reject_bad_input() -> Result<()> {
    let (stores, _gw, property) = seed();

    let err = submit(&stores, PropertyId::new(), "x@example.com", Relationship::Owner).unwrap_err();
    assert_eq!(err.http_status(), 404);

    let err = submit(&stores, property.id, "not-an-email", Relationship::Owner).unwrap_err();
    assert_eq!(err.http_status(), 400);
    assert_eq!(err.code_str(), "invalid_email");

    let err = submit(&stores, property.id, "  ", Relationship::Owner).unwrap_err();
    assert_eq!(err.code_str(), "missing_fields");
    Ok(())
}

#[test]
fn existing_residents_cannot_request_again() -> Result<()> {
    let (stores, gw, property) = seed();
    let request = submit(&stores, property.id, "settled@example.com", Relationship::Resident)?;
    access::review_request(&stores, &gw, request.id, approve("hoa-board"))?;

    let err = submit(&stores, property.id, "settled@example.com", Relationship::Resident).unwrap_err();
    assert_eq!(err.http_status(), 409);
    assert_eq!(err.code_str(), "already_resident");
    Ok(())
}

#[test]
fn concurrent_reviews_pick_exactly_one_winner() -> Result<()> {
    let (stores, gw, property) = seed();
    let gw = Arc::new(gw);
    let request = submit(&stores, property.id, "raced@example.com", Relationship::Resident)?;

    let mut handles = Vec::new();
    for action in [ReviewAction::Approve, ReviewAction::Reject] {
        let stores = stores.clone();
        let gw = gw.clone();
        let id = request.id;
        handles.push(std::thread::spawn(move || {
            access::review_request(
                &stores,
                gw.as_ref(),
                id,
                ReviewDecision { action, reviewer: "racer".into(), notes: None },
            )
        }));
    }
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one review may settle the request");
    for loss in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(loss.http_status(), 409);
    }
    let settled = stores.requests.get(request.id).unwrap();
    assert!(settled.status.is_terminal());
    Ok(())
}

/// People store whose writes always fail. Reads pass through.
struct BrokenPeople(Arc<dyn PeopleStore>);

impl PeopleStore for BrokenPeople {
    fn get(&self, id: PersonId) -> Option<Person> {
        self.0.get(id)
    }
    fn find_by_email(&self, email: &str) -> Option<Person> {
        self.0.find_by_email(email)
    }
    fn find_by_identity(&self, identity_id: IdentityId) -> Option<Person> {
        self.0.find_by_identity(identity_id)
    }
    fn insert(&self, _person: Person) -> AppResult<Person> {
        Err(AppError::dependency("store_down", "people store unavailable"))
    }
    fn update(&self, _person: Person) -> AppResult<Person> {
        Err(AppError::dependency("store_down", "people store unavailable"))
    }
}

#[test]
fn failed_provisioning_reopens_the_request() -> Result<()> {
    let (stores, gw, property) = seed();
    let request = submit(&stores, property.id, "unlucky@example.com", Relationship::Owner)?;

    let broken = Stores { people: Arc::new(BrokenPeople(stores.people.clone())), ..stores.clone() };
    let err = access::review_request(&broken, &gw, request.id, approve("hoa-board")).unwrap_err();
    assert_eq!(err.http_status(), 500);

    // The flip was unwound: back to pending with review fields cleared.
    let reopened = stores.requests.get(request.id).unwrap();
    assert_eq!(reopened.status, RequestStatus::Pending);
    assert!(reopened.reviewer.is_none());
    assert!(reopened.reviewed_at.is_none());

    // Nothing half-provisioned is left behind.
    assert!(gw.issue_token("unlucky@example.com").is_err());
    assert!(stores.residencies.list_current_by_property(property.id).is_empty());

    // The same request can be reviewed again once the store is healthy.
    let reviewed = access::review_request(&stores, &gw, request.id, approve("hoa-board"))?;
    assert_eq!(reviewed.status, RequestStatus::Approved);
    assert!(stores.people.find_by_email("unlucky@example.com").is_some());
    Ok(())
}
