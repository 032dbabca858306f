//! Tier-based route gating. Four ordered tiers of path prefixes; each
//! lifecycle state reaches a fixed set of tiers, and anything unreachable
//! redirects to that state's home route.

use serde::{Deserialize, Serialize};

use super::lifecycle::LifecycleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTier {
    Public,
    Onboarding,
    User,
    Admin,
}

impl RouteTier {
    /// Path prefixes belonging to the tier. A path matches a prefix either
    /// exactly or with a `/`-separated remainder, so `/` stays exact-only.
    pub fn routes(&self) -> &'static [&'static str] {
        match self {
            RouteTier::Public => {
                &["/", "/auth/login", "/auth/signup", "/auth/callback", "/about", "/request-access"]
            }
            RouteTier::Onboarding => {
                &["/auth/setup-profile", "/property-search", "/getting-started", "/profile", "/help"]
            }
            RouteTier::User => {
                &["/dashboard", "/properties", "/surveys", "/community", "/invitations"]
            }
            RouteTier::Admin => &["/admin", "/people", "/zones", "/neighborhood", "/responses"],
        }
    }
}

/// Tiers reachable from a lifecycle state. Each later state strictly grows
/// the set; admins reach everything.
pub fn reachable_tiers(state: LifecycleState) -> &'static [RouteTier] {
    match state {
        LifecycleState::Unauthenticated => &[RouteTier::Public],
        LifecycleState::AuthenticatedNoProfile | LifecycleState::ProfileNoProperties => {
            &[RouteTier::Public, RouteTier::Onboarding]
        }
        LifecycleState::HasProperties => &[RouteTier::Public, RouteTier::Onboarding, RouteTier::User],
        LifecycleState::Admin => {
            &[RouteTier::Public, RouteTier::Onboarding, RouteTier::User, RouteTier::Admin]
        }
    }
}

fn path_matches(route: &str, path: &str) -> bool {
    path == route || path.strip_prefix(route).is_some_and(|rest| rest.starts_with('/'))
}

pub fn can_access(state: LifecycleState, path: &str) -> bool {
    reachable_tiers(state)
        .iter()
        .any(|tier| tier.routes().iter().any(|route| path_matches(route, path)))
}

/// Where each state lands when a path is off limits.
pub fn default_route(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::Unauthenticated => "/auth/login",
        LifecycleState::AuthenticatedNoProfile => "/auth/setup-profile",
        LifecycleState::ProfileNoProperties => "/getting-started",
        LifecycleState::HasProperties | LifecycleState::Admin => "/dashboard",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect { to: &'static str },
}

/// Full gate decision for one request. Signed-in callers bounce off the
/// login and signup pages back to their home route even though those pages
/// are public.
pub fn decide(state: LifecycleState, path: &str) -> RouteDecision {
    if state != LifecycleState::Unauthenticated && (path == "/auth/login" || path == "/auth/signup")
    {
        return RouteDecision::Redirect { to: default_route(state) };
    }
    if can_access(state, path) {
        RouteDecision::Allow
    } else {
        RouteDecision::Redirect { to: default_route(state) }
    }
}
