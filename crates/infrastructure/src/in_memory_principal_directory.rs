use std::collections::HashMap;

use async_trait::async_trait;
use reportflow_application::PrincipalDirectory;
use reportflow_core::{AppResult, PrincipalId};
use reportflow_domain::Principal;
use tokio::sync::RwLock;

/// In-memory principal directory keyed by opaque bearer tokens.
///
/// Stands in for the external identity provider: principals are registered
/// at startup and looked up per request. Tokens are never issued here.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalDirectory {
    principals: RwLock<HashMap<String, Principal>>,
}

impl InMemoryPrincipalDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            principals: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a principal behind a bearer token, replacing any previous
    /// registration for the same token.
    pub async fn register(&self, token: impl Into<String>, principal: Principal) {
        self.principals
            .write()
            .await
            .insert(token.into(), principal);
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryPrincipalDirectory {
    async fn resolve_token(&self, token: &str) -> AppResult<Option<Principal>> {
        Ok(self.principals.read().await.get(token).cloned())
    }

    async fn find_principal(&self, principal_id: PrincipalId) -> AppResult<Option<Principal>> {
        Ok(self
            .principals
            .read()
            .await
            .values()
            .find(|principal| principal.id() == principal_id)
            .cloned())
    }
}
