//! Identity-provider collaborator contract.
//!
//! Authentication itself lives outside the session client. The client only
//! needs the signed-in actor's ids: the org id doubles as the default
//! `projectId` of the handshake when no explicit project is configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// The signed-in actor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// User identifier.
    pub user_id: String,
    /// Organization / workspace identifier.
    pub org_id: String,
}

/// Resolves the current [`Identity`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the signed-in actor, or an error when nobody is signed in.
    async fn identity(&self) -> Result<Identity>;
}

/// Fixed identity, for the CLI and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentity(Identity);

impl StaticIdentity {
    /// Wrap the given ids.
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self(Identity {
            user_id: user_id.into(),
            org_id: org_id.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn identity(&self) -> Result<Identity> {
        Ok(self.0.clone())
    }
}

/// Pick the handshake project id: an explicit one wins, else the org id.
#[must_use]
pub fn resolve_project_id(explicit: &str, identity: Option<&Identity>) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    identity.map(|id| id.org_id.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_identity_resolves() {
        let provider = StaticIdentity::new("u1", "org_42");
        let id = provider.identity().await.unwrap();
        assert_eq!(id.user_id, "u1");
        assert_eq!(id.org_id, "org_42");
    }

    #[test]
    fn explicit_project_wins() {
        let id = Identity {
            user_id: "u".into(),
            org_id: "org".into(),
        };
        assert_eq!(resolve_project_id("proj", Some(&id)), "proj");
    }

    #[test]
    fn org_id_is_fallback_project() {
        let id = Identity {
            user_id: "u".into(),
            org_id: "org".into(),
        };
        assert_eq!(resolve_project_id("  ", Some(&id)), "org");
        assert_eq!(resolve_project_id("", None), "");
    }

    #[test]
    fn identity_serde_is_camel_case() {
        let v = serde_json::to_value(Identity {
            user_id: "u".into(),
            org_id: "o".into(),
        })
        .unwrap();
        assert_eq!(v["userId"], "u");
        assert_eq!(v["orgId"], "o");
    }
}
