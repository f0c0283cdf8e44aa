//! Caller identity as resolved from a bearer token.
//!
//! Authentication itself is delegated; this module only maps an opaque token to the
//! `{uid, email, display_name}` triple the rest of the service reasons about.

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use serde::Deserialize;

use crate::{error::ServiceError, state::room::RoomClaim};

/// Authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Identity {
    /// Name used to match roster entries: the display name, else the email local part.
    pub fn handle(&self) -> &str {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => self.email.split('@').next().unwrap_or_default(),
        }
    }

    /// Exact, case-insensitive match against the configured superuser email.
    pub fn is_superuser(&self, superuser_email: &str) -> bool {
        !superuser_email.is_empty() && self.email.eq_ignore_ascii_case(superuser_email)
    }
}

/// Maps bearer tokens to identities.
pub trait IdentityProvider: Send + Sync {
    /// `None` when the token is unknown or expired.
    fn resolve(&self, token: &str) -> BoxFuture<'static, Option<Identity>>;
}

/// Provider backed by a fixed token table loaded from configuration.
#[derive(Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: Arc<HashMap<String, Identity>>,
}

impl StaticIdentityProvider {
    pub fn new(tokens: impl IntoIterator<Item = (String, Identity)>) -> Self {
        Self {
            tokens: Arc::new(tokens.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn resolve(&self, token: &str) -> BoxFuture<'static, Option<Identity>> {
        let found = self.tokens.get(token).cloned();
        Box::pin(async move { found })
    }
}

/// Who is calling and which room proofs they carry.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub identity: Option<Identity>,
    pub room_claim: RoomClaim,
}

impl Caller {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            room_claim: RoomClaim::default(),
        }
    }

    pub fn with_claim(mut self, room_claim: RoomClaim) -> Self {
        self.room_claim = room_claim;
        self
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The signed-in identity, or `Unauthorized` for guests.
    pub fn require_identity(&self) -> Result<&Identity, ServiceError> {
        self.identity
            .as_ref()
            .ok_or_else(|| ServiceError::Unauthorized("sign-in required".into()))
    }

    pub fn is_superuser(&self, superuser_email: &str) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|identity| identity.is_superuser(superuser_email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str, display_name: Option<&str>) -> Identity {
        Identity {
            uid: "u1".into(),
            email: email.into(),
            display_name: display_name.map(Into::into),
        }
    }

    #[test]
    fn handle_prefers_display_name() {
        assert_eq!(identity("ana@example.com", Some("Ana M")).handle(), "Ana M");
        assert_eq!(identity("ana@example.com", Some("  ")).handle(), "ana");
        assert_eq!(identity("ana@example.com", None).handle(), "ana");
    }

    #[test]
    fn superuser_match_is_exact_but_case_insensitive() {
        let root = identity("Darwin47@ElPrivado.app", None);
        assert!(root.is_superuser("darwin47@elprivado.app"));
        assert!(!root.is_superuser("darwin47@elprivado.ap"));
        assert!(!root.is_superuser(""));
    }

    #[tokio::test]
    async fn static_provider_resolves_known_tokens_only() {
        let provider = StaticIdentityProvider::new([(
            "secret".to_string(),
            identity("ana@example.com", None),
        )]);
        assert_eq!(provider.len(), 1);
        assert!(provider.resolve("secret").await.is_some());
        assert!(provider.resolve("other").await.is_none());
    }
}
