//!
//! postern HTTP server
//! -------------------
//! This module defines the Axum-based HTTP API for the property-access
//! portal.
//!
//! Responsibilities:
//! - Bearer-token resolution against the identity gateway.
//! - Lifecycle classification and route-policy decisions for the shell.
//! - Access-request, invitation, profile and resident endpoints
//!   delegating to the `access` flows.
//! - Demo property seeding on first run and startup inventory logs.
//! - Periodic directory snapshots when a data directory is configured.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::access;
use crate::access::{CreateInvitation, ReviewDecision, SubmitAccessRequest, UpdateResident};
use crate::error::{AppError, AppResult};
use crate::identity::{
    classify, decide, default_route, Identity, IdentityGateway, MemoryGateway, RequestContext,
    RouteDecision,
};
use crate::model::{
    AccessLevel, Permission, Person, Property, PropertyId, Relationship, RequestId, RequestStatus,
    ResidencyId, ReviewAction,
};
use crate::store::{MemoryDirectory, Stores};

pub const DEFAULT_INVITE_TTL_DAYS: i64 = 14;

const SEARCH_MIN_CHARS: usize = 3;
const SEARCH_LIMIT: usize = 20;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub gateway: Arc<dyn IdentityGateway>,
    pub invite_ttl_days: i64,
}

fn log_startup(data_dir: Option<&str>) {
    let cwd = std::env::current_dir().ok();
    let exe = std::env::current_exe().ok();
    let dir_env = std::env::var("POSTERN_DATA_DIR").ok();
    info!(
        target: "startup",
        "postern starting. cwd={:?}, exe={:?}, data_dir_param={:?}, POSTERN_DATA_DIR_env={:?}",
        cwd, exe, data_dir, dir_env
    );
}

fn seed_demo_properties(stores: &Stores) -> AppResult<()> {
    const ADDRESSES: [(&str, Option<&str>); 6] = [
        ("1 Harbourside Walk", Some("waterfront")),
        ("2 Harbourside Walk", Some("waterfront")),
        ("14 Garden Terrace", None),
        ("15 Garden Terrace", None),
        ("3 Old Mill Lane", Some("north")),
        ("8 Orchard Close", None),
    ];
    for (address, zone) in ADDRESSES {
        stores.properties.insert(Property {
            id: PropertyId::new(),
            address: address.to_string(),
            zone: zone.map(|z| z.to_string()),
        })?;
    }
    Ok(())
}

/// Start the portal HTTP server bound to the given port.
///
/// Loads (or creates) the directory under `data_dir` when one is given,
/// seeds demo properties on a completely empty first run, and mounts all
/// HTTP routes. `invite_ttl_days` sets how long new invitations stay
/// acceptable.
pub async fn run_with_config(
    http_port: u16,
    data_dir: Option<&str>,
    invite_ttl_days: i64,
) -> anyhow::Result<()> {
    log_startup(data_dir);

    let directory = match data_dir {
        Some(dir) => Arc::new(
            MemoryDirectory::load_or_default(dir)
                .with_context(|| format!("While opening directory under: {}", dir))?,
        ),
        None => Arc::new(MemoryDirectory::new()),
    };
    let stores = Stores::from_directory(directory.clone());

    // An empty first run gets a handful of demo addresses so search and
    // request-access work out of the box.
    if stores.properties.search("", 1).is_empty() {
        println!("Empty startup detected, creating demo properties");
        if let Err(e) = seed_demo_properties(&stores) {
            tracing::warn!("Failed to seed demo properties: {}", e);
        }
    }

    // Background snapshot ticker; interval in seconds, default 30,
    // 0 or negative disables.
    let interval_sec: i64 = std::env::var("POSTERN_SNAPSHOT_INTERVAL_SEC")
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(30);
    if data_dir.is_some() && interval_sec > 0 {
        let dir_for_ticker = directory.clone();
        tokio::spawn(async move {
            use std::time::Duration;
            loop {
                tokio::time::sleep(Duration::from_secs(interval_sec as u64)).await;
                if let Err(e) = dir_for_ticker.persist() {
                    tracing::warn!("directory snapshot failed: {}", e);
                }
            }
        });
    } else if data_dir.is_some() {
        tracing::info!("snapshot_ticker" = false, "Directory snapshot ticker disabled");
    }

    let app_state = AppState {
        stores,
        gateway: Arc::new(MemoryGateway::new()),
        invite_ttl_days,
    };
    let app = router(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Backward-compatible entry that uses defaults
/// Convenience entry point using default port 7878 and data root "data".
pub async fn run() -> anyhow::Result<()> {
    run_with_config(7878, Some("data"), DEFAULT_INVITE_TTL_DAYS).await
}

/// Mount all routes onto the given state. Split out so tests can drive
/// the router without binding a socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "postern ok" }))
        .route("/auth/session", post(session_create))
        .route("/session/state", get(session_state))
        .route("/session/route", get(route_check))
        .route("/profile", post(profile_create))
        .route("/properties/search", get(property_search))
        .route("/properties/{id}", get(property_get))
        .route("/properties/{id}/residents", get(residents_list))
        .route(
            "/properties/{id}/residents/{rid}",
            put(resident_update).delete(resident_remove),
        )
        .route("/properties/{id}/invitations", post(invitation_create))
        .route("/access-requests", post(request_create).get(request_list))
        .route("/access-requests/{id}", patch(request_review))
        .route("/invitations/verify", get(invitation_verify))
        .route("/invitations/accept", post(invitation_accept))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    email: String,
}

#[derive(Debug, Deserialize)]
struct RoutePathQuery {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfilePayload {
    first_name: String,
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResidentChangesPayload {
    relationship: Option<Relationship>,
    is_primary_contact: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RemoveResidentPayload {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitRequestPayload {
    property_id: PropertyId,
    requester_email: String,
    requester_name: String,
    claimed_relationship: Relationship,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListRequestsQuery {
    status: Option<RequestStatus>,
    property_id: Option<PropertyId>,
}

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    action: ReviewAction,
    reviewer: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvitePayload {
    invitee_email: String,
    invitee_name: String,
    relationship: Relationship,
    permissions: Option<Vec<Permission>>,
    access_level: Option<AccessLevel>,
    can_invite_others: Option<bool>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AcceptPayload {
    token: String,
    email: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("authorization").or_else(|| headers.get("Authorization"))?;
    let value = raw.to_str().ok()?;
    let rest = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = rest.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    RequestContext {
        bearer_token: bearer_token(headers),
        request_id: headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    }
}

fn current_identity(state: &AppState, headers: &HeaderMap) -> Option<Identity> {
    state.gateway.current(&context_from_headers(headers))
}

fn current_person(state: &AppState, identity: Option<&Identity>) -> Option<Person> {
    identity.and_then(|i| state.stores.people.find_by_identity(i.id))
}

fn error_response(err: AppError) -> (StatusCode, Json<serde_json::Value>) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"status":"error","code": err.code_str(),"message": err.message()})))
}

async fn session_create(
    State(state): State<AppState>,
    Json(payload): Json<SessionPayload>,
) -> impl IntoResponse {
    match state.gateway.issue_token(&payload.email) {
        Ok(token) => (StatusCode::OK, Json(json!({"status":"ok","token": token}))),
        Err(e) => error_response(e),
    }
}

async fn session_state(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let identity = current_identity(&state, &headers);
    let person = current_person(&state, identity.as_ref());
    let residencies = person
        .as_ref()
        .map(|p| state.stores.residencies.list_current_by_person(p.id))
        .unwrap_or_default();
    let lifecycle = classify(identity.as_ref(), person.as_ref(), &residencies);
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "state": lifecycle,
            "default_route": default_route(lifecycle),
            "person": person,
        })),
    )
}

async fn route_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RoutePathQuery>,
) -> impl IntoResponse {
    let Some(path) = query.path.filter(|p| p.starts_with('/')) else {
        return error_response(AppError::validation(
            "invalid_path",
            "path must be absolute, starting with '/'",
        ));
    };
    let identity = current_identity(&state, &headers);
    let person = current_person(&state, identity.as_ref());
    let residencies = person
        .as_ref()
        .map(|p| state.stores.residencies.list_current_by_person(p.id))
        .unwrap_or_default();
    let lifecycle = classify(identity.as_ref(), person.as_ref(), &residencies);
    match decide(lifecycle, &path) {
        RouteDecision::Allow => (StatusCode::OK, Json(json!({"status":"ok","allow": true}))),
        RouteDecision::Redirect { to } => (
            StatusCode::OK,
            Json(json!({"status":"ok","allow": false,"redirect_to": to})),
        ),
    }
}

async fn profile_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ProfilePayload>,
) -> impl IntoResponse {
    let identity = current_identity(&state, &headers);
    match access::setup_profile(
        &state.stores,
        identity.as_ref(),
        &payload.first_name,
        &payload.last_name,
    ) {
        Ok(person) => (StatusCode::OK, Json(json!({"status":"ok","person": person}))),
        Err(e) => error_response(e),
    }
}

async fn property_get(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
) -> impl IntoResponse {
    match state.stores.properties.get(id) {
        Some(property) => (StatusCode::OK, Json(json!({"status":"ok","property": property}))),
        None => error_response(AppError::not_found("property_not_found", "property not found")),
    }
}

async fn property_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let Some(q) = query.q else {
        return error_response(AppError::validation("missing_fields", "query parameter q is required"));
    };
    let q = q.trim().to_string();
    // Short queries return nothing rather than erroring; the search box
    // fires on every keystroke.
    if q.len() < SEARCH_MIN_CHARS {
        return (StatusCode::OK, Json(json!({"status":"ok","results": []})));
    }
    let results = state.stores.properties.search(&q, SEARCH_LIMIT);
    (StatusCode::OK, Json(json!({"status":"ok","results": results})))
}

async fn residents_list(
    State(state): State<AppState>,
    Path(id): Path<PropertyId>,
) -> impl IntoResponse {
    match access::list_current_residents(&state.stores, id) {
        Ok(residents) => (StatusCode::OK, Json(json!({"status":"ok","residents": residents}))),
        Err(e) => error_response(e),
    }
}

async fn resident_update(
    State(state): State<AppState>,
    Path((id, rid)): Path<(PropertyId, ResidencyId)>,
    Json(payload): Json<ResidentChangesPayload>,
) -> impl IntoResponse {
    let changes = UpdateResident {
        relationship: payload.relationship,
        is_primary_contact: payload.is_primary_contact,
    };
    match access::update_resident(&state.stores, id, rid, changes) {
        Ok(residency) => (StatusCode::OK, Json(json!({"status":"ok","residency": residency}))),
        Err(e) => error_response(e),
    }
}

async fn resident_remove(
    State(state): State<AppState>,
    Path((id, rid)): Path<(PropertyId, ResidencyId)>,
    payload: Option<Json<RemoveResidentPayload>>,
) -> impl IntoResponse {
    let reason = payload.and_then(|Json(p)| p.reason);
    match access::remove_resident(&state.stores, id, rid, reason) {
        Ok(_) => (StatusCode::OK, Json(json!({"status":"removed"}))),
        Err(e) => error_response(e),
    }
}

async fn request_create(
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequestPayload>,
) -> impl IntoResponse {
    let submit = SubmitAccessRequest {
        property_id: payload.property_id,
        requester_email: payload.requester_email,
        requester_name: payload.requester_name,
        claimed_relationship: payload.claimed_relationship,
        message: payload.message,
    };
    match access::submit_request(&state.stores, submit) {
        Ok(request) => (StatusCode::OK, Json(json!({"status":"ok","request_id": request.id}))),
        Err(e) => error_response(e),
    }
}

async fn request_list(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> impl IntoResponse {
    // Listing defaults to the review queue.
    let status = query.status.unwrap_or(RequestStatus::Pending);
    let requests = state.stores.requests.list(Some(status), query.property_id);
    let total = requests.len();
    (StatusCode::OK, Json(json!({"status":"ok","requests": requests,"total": total})))
}

async fn request_review(
    State(state): State<AppState>,
    Path(id): Path<RequestId>,
    Json(payload): Json<ReviewPayload>,
) -> impl IntoResponse {
    let decision = ReviewDecision {
        action: payload.action,
        reviewer: payload.reviewer.unwrap_or_else(|| "admin".to_string()),
        notes: payload.notes,
    };
    match access::review_request(&state.stores, state.gateway.as_ref(), id, decision) {
        Ok(request) => (StatusCode::OK, Json(json!({"status": request.status}))),
        Err(e) => error_response(e),
    }
}

async fn invitation_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PropertyId>,
    Json(payload): Json<InvitePayload>,
) -> impl IntoResponse {
    let identity = current_identity(&state, &headers);
    if identity.is_none() {
        return error_response(AppError::auth("no_session", "sign in to send invitations"));
    }
    let Some(inviter) = current_person(&state, identity.as_ref()) else {
        return error_response(AppError::forbidden(
            "not_allowed",
            "you do not have permission to invite residents to this property",
        ));
    };
    let create = CreateInvitation {
        property_id: id,
        invitee_email: payload.invitee_email,
        invitee_name: payload.invitee_name,
        relationship: payload.relationship,
        permissions: payload.permissions,
        access_level: payload.access_level,
        can_invite_others: payload.can_invite_others,
        message: payload.message,
    };
    match access::create_invitation(&state.stores, &inviter, create, state.invite_ttl_days) {
        Ok(invitation) => {
            (StatusCode::OK, Json(json!({"status":"ok","invitation_id": invitation.id})))
        }
        Err(e) => error_response(e),
    }
}

async fn invitation_verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> impl IntoResponse {
    match access::verify_invitation(&state.stores, query.token.as_deref().unwrap_or("")) {
        Ok(preview) => (StatusCode::OK, Json(json!({"status":"ok","invitation": preview}))),
        Err(e) => error_response(e),
    }
}

async fn invitation_accept(
    State(state): State<AppState>,
    Json(payload): Json<AcceptPayload>,
) -> impl IntoResponse {
    match access::accept_invitation(&state.stores, state.gateway.as_ref(), &payload.token, &payload.email) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({"status":"accepted","requires_login": outcome.requires_login})),
        ),
        Err(e) => error_response(e),
    }
}
