//! Identity resolution at connection time.
//!
//! Resolution happens once per new connection and must not block connection
//! establishment. A token that does not resolve degrades the connection to
//! anonymous rather than rejecting it (fail-open): the connection is
//! accepted, parked in the anonymous room, and receives nothing targeted.

use std::collections::HashMap;
use std::sync::Mutex;

use caresync_core::ActorIdentity;

/// Resolves a connection-time token to an actor identity.
pub trait IdentityResolver: Send + Sync {
    fn from_token(&self, token: &str) -> Option<ActorIdentity>;
}

/// In-memory token table. Entries are loaded at startup from configuration;
/// credential issuance itself is outside this system.
#[derive(Default)]
pub struct TokenTable {
    tokens: Mutex<HashMap<String, ActorIdentity>>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, identity: ActorIdentity) {
        self.tokens().insert(token.into(), identity);
    }

    pub fn revoke(&self, token: &str) {
        self.tokens().remove(token);
    }

    fn tokens(&self) -> std::sync::MutexGuard<'_, HashMap<String, ActorIdentity>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IdentityResolver for TokenTable {
    fn from_token(&self, token: &str) -> Option<ActorIdentity> {
        self.tokens().get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caresync_core::ActorRole;
    use uuid::Uuid;

    #[test]
    fn test_known_token_resolves() {
        let table = TokenTable::new();
        let identity = ActorIdentity::new(Uuid::new_v4(), ActorRole::Patient, "Amina Yusuf");
        table.insert("tok-123", identity.clone());

        assert_eq!(table.from_token("tok-123"), Some(identity));
    }

    #[test]
    fn test_unknown_or_revoked_token_resolves_to_none() {
        let table = TokenTable::new();
        let identity = ActorIdentity::new(Uuid::new_v4(), ActorRole::Provider, "Dr Okafor");
        table.insert("tok-456", identity);

        assert!(table.from_token("missing").is_none());

        table.revoke("tok-456");
        assert!(table.from_token("tok-456").is_none());
    }
}
