//! Identity resolution and lifecycle gating for the portal.
//! Keep the public surface thin and split implementation across sub-modules.

mod context;
mod gateway;
mod lifecycle;
mod route_policy;

pub use context::RequestContext;
pub(crate) use gateway::gen_token;
pub use gateway::{Identity, IdentityGateway, MemoryGateway};
pub use lifecycle::{classify, LifecycleState};
pub use route_policy::{can_access, decide, default_route, reachable_tiers, RouteDecision, RouteTier};
