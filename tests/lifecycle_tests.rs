//! Lifecycle classification driven through the directory and gateway:
//! the same person walked from anonymous visitor to resident and back.

use anyhow::Result;
use chrono::Utc;

use postern::access;
use postern::identity::{
    classify, IdentityGateway, LifecycleState, MemoryGateway, RequestContext,
};
use postern::model::{
    AccessLevel, AccountStatus, AccountType, IdentityLink, Permission, Person, PersonId, Property,
    PropertyId, Relationship, Residency, ResidencyId, Tenure, VerificationMethod,
};
use postern::store::Stores;

fn resolve_state(gw: &MemoryGateway, stores: &Stores, token: &str) -> LifecycleState {
    let identity = gw.current(&RequestContext::with_token(token));
    let person = identity.as_ref().and_then(|i| stores.people.find_by_identity(i.id));
    let residencies = person
        .as_ref()
        .map(|p| stores.residencies.list_current_by_person(p.id))
        .unwrap_or_default();
    classify(identity.as_ref(), person.as_ref(), &residencies)
}

fn residency_for(person: PersonId, property: PropertyId, relationship: Relationship) -> Residency {
    Residency {
        id: ResidencyId::new(),
        person_id: person,
        property_id: property,
        relationship,
        permissions: Permission::defaults(),
        access_level: AccessLevel::Basic,
        can_invite_others: relationship == Relationship::Owner,
        is_primary_contact: false,
        start_date: Utc::now().date_naive(),
        tenure: Tenure::Current,
        invited_by: None,
    }
}

#[test]
fn signup_journey_walks_the_states() -> Result<()> {
    let stores = Stores::in_memory();
    let gw = MemoryGateway::new();
    let property = stores.properties.insert(Property {
        id: PropertyId::new(),
        address: "14 Garden Terrace".into(),
        zone: None,
    })?;

    // Nobody yet: a made-up token resolves to no identity.
    assert_eq!(resolve_state(&gw, &stores, "made-up"), LifecycleState::Unauthenticated);

    // Signed up, no profile.
    gw.create_identity("casey@example.com", false, serde_json::Value::Null)?;
    let token = gw.issue_token("casey@example.com")?;
    assert_eq!(resolve_state(&gw, &stores, &token), LifecycleState::AuthenticatedNoProfile);

    // Profile created, still no properties.
    let identity = gw.current(&RequestContext::with_token(token.clone())).unwrap();
    let person = access::setup_profile(&stores, Some(&identity), "Casey", "Nguyen")?;
    assert_eq!(resolve_state(&gw, &stores, &token), LifecycleState::ProfileNoProperties);

    // A current residency moves them to the full portal.
    let edge = stores
        .residencies
        .insert(residency_for(person.id, property.id, Relationship::Resident))?;
    assert_eq!(resolve_state(&gw, &stores, &token), LifecycleState::HasProperties);

    // Ending the tenure drops them back out.
    stores.residencies.end_tenure(edge.id, Utc::now().date_naive(), "moved away")?;
    assert_eq!(resolve_state(&gw, &stores, &token), LifecycleState::ProfileNoProperties);
    Ok(())
}

#[test]
fn admin_outranks_residency_state() -> Result<()> {
    let stores = Stores::in_memory();
    let gw = MemoryGateway::new();
    let property = stores.properties.insert(Property {
        id: PropertyId::new(),
        address: "3 Old Mill Lane".into(),
        zone: Some("north".into()),
    })?;

    let identity = gw.create_identity("warden@example.com", true, serde_json::Value::Null)?;
    let person = stores.people.insert(Person {
        id: PersonId::new(),
        identity: IdentityLink::Linked { identity_id: identity.id },
        first_name: "Sam".into(),
        last_name: "Warden".into(),
        email: "warden@example.com".into(),
        account_status: AccountStatus::Verified,
        account_type: AccountType::Admin,
        verification_method: VerificationMethod::ReviewerVerified,
        created_at: Utc::now(),
    })?;
    let token = gw.issue_token("warden@example.com")?;

    // Admin with zero residencies is still Admin, never ProfileNoProperties.
    assert_eq!(resolve_state(&gw, &stores, &token), LifecycleState::Admin);

    // Adding a residency does not demote them to a plain resident.
    stores
        .residencies
        .insert(residency_for(person.id, property.id, Relationship::Resident))?;
    assert_eq!(resolve_state(&gw, &stores, &token), LifecycleState::Admin);
    Ok(())
}

#[test]
fn classification_ignores_residency_order() -> Result<()> {
    let stores = Stores::in_memory();
    let gw = MemoryGateway::new();
    let a = stores.properties.insert(Property {
        id: PropertyId::new(),
        address: "1 Harbourside Walk".into(),
        zone: None,
    })?;
    let b = stores.properties.insert(Property {
        id: PropertyId::new(),
        address: "2 Harbourside Walk".into(),
        zone: None,
    })?;

    let identity = gw.create_identity("multi@example.com", true, serde_json::Value::Null)?;
    let person = access::setup_profile(&stores, Some(&identity), "Multi", "Home")?;

    let mut edges = vec![
        residency_for(person.id, a.id, Relationship::Owner),
        residency_for(person.id, b.id, Relationship::Resident),
    ];
    // One ended edge mixed in; it must not count.
    let mut ended = residency_for(person.id, b.id, Relationship::Manager);
    ended.tenure = Tenure::Ended { on: Utc::now().date_naive(), reason: "lease over".into() };
    edges.push(ended);

    let forward = classify(Some(&identity), Some(&person), &edges);
    edges.reverse();
    let backward = classify(Some(&identity), Some(&person), &edges);
    assert_eq!(forward, LifecycleState::HasProperties);
    assert_eq!(forward, backward);
    Ok(())
}

#[test]
fn ended_edges_alone_leave_profile_no_properties() -> Result<()> {
    let stores = Stores::in_memory();
    let gw = MemoryGateway::new();
    let identity = gw.create_identity("gone@example.com", true, serde_json::Value::Null)?;
    let person = access::setup_profile(&stores, Some(&identity), "Gone", "Away")?;

    let ended = Residency {
        tenure: Tenure::Ended { on: Utc::now().date_naive(), reason: "sold".into() },
        ..residency_for(person.id, PropertyId::new(), Relationship::Owner)
    };
    let state = classify(Some(&identity), Some(&person), &[ended]);
    assert_eq!(state, LifecycleState::ProfileNoProperties);
    Ok(())
}
