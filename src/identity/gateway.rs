use std::collections::HashMap;

use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::model::IdentityId;
use crate::tprintln;

use super::context::RequestContext;

/// External auth account as seen by the portal core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub confirmed: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Boundary to the external auth provider. The provisioning flows create
/// identities through this trait and delete them only as compensation;
/// route handlers resolve the caller from the bearer token in the
/// `RequestContext`.
pub trait IdentityGateway: Send + Sync {
    fn create_identity(
        &self,
        email: &str,
        pre_confirmed: bool,
        metadata: serde_json::Value,
    ) -> AppResult<Identity>;

    fn delete_identity(&self, id: IdentityId) -> AppResult<()>;

    /// Resolve the calling identity, if the context carries a live token.
    fn current(&self, ctx: &RequestContext) -> Option<Identity>;

    /// Exchange a known email for a bearer token (the magic-link landing).
    fn issue_token(&self, email: &str) -> AppResult<String>;
}

pub(crate) fn gen_token() -> String {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

#[derive(Default)]
struct GatewayState {
    identities: HashMap<IdentityId, Identity>,
    by_email: HashMap<String, IdentityId>,
    tokens: HashMap<String, IdentityId>,
}

/// In-process stand-in for the hosted auth service. Email keys are
/// lowercased so lookups are case-insensitive like the hosted one.
#[derive(Default)]
pub struct MemoryGateway {
    state: RwLock<GatewayState>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityGateway for MemoryGateway {
    fn create_identity(
        &self,
        email: &str,
        pre_confirmed: bool,
        metadata: serde_json::Value,
    ) -> AppResult<Identity> {
        let key = email.trim().to_lowercase();
        let mut st = self.state.write();
        if st.by_email.contains_key(&key) {
            // The hosted provider rejects duplicate signups.
            return Err(AppError::dependency(
                "identity_create_failed",
                "an auth account already exists for this email",
            ));
        }
        let identity = Identity {
            id: IdentityId::new(),
            email: key.clone(),
            confirmed: pre_confirmed,
            metadata,
        };
        st.by_email.insert(key, identity.id);
        st.identities.insert(identity.id, identity.clone());
        tprintln!("gateway.create id={} email={}", identity.id, identity.email);
        Ok(identity)
    }

    fn delete_identity(&self, id: IdentityId) -> AppResult<()> {
        let mut st = self.state.write();
        let Some(identity) = st.identities.remove(&id) else {
            return Err(AppError::not_found("identity_not_found", "no such auth account"));
        };
        st.by_email.remove(&identity.email);
        st.tokens.retain(|_, v| *v != id);
        tprintln!("gateway.delete id={}", id);
        Ok(())
    }

    fn current(&self, ctx: &RequestContext) -> Option<Identity> {
        let token = ctx.bearer_token.as_deref()?;
        let st = self.state.read();
        let id = st.tokens.get(token)?;
        st.identities.get(id).cloned()
    }

    fn issue_token(&self, email: &str) -> AppResult<String> {
        let key = email.trim().to_lowercase();
        let mut st = self.state.write();
        let Some(id) = st.by_email.get(&key).copied() else {
            return Err(AppError::not_found("identity_not_found", "no auth account for this email"));
        };
        let token = gen_token();
        st.tokens.insert(token.clone(), id);
        Ok(token)
    }
}
