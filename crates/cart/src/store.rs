use serde::{Deserialize, Serialize};

use crate::cart::Cart;

/// Opaque session/table token that keys a cart.
///
/// Issued by the identity collaborator (a staff session id or an anonymous
/// table-session token); this layer treats it as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-scoped cart storage, injected into consumers.
///
/// Explicit store + serialize/restore contract instead of any process-global
/// cart state. In-memory implementation in `comanda-infra`; a cache-backed
/// one can replace it without touching callers.
pub trait CartStore: Send + Sync {
    fn load(&self, token: &SessionToken) -> Option<Cart>;
    fn save(&self, token: SessionToken, cart: Cart);
    fn remove(&self, token: &SessionToken);
}
