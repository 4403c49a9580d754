//! Resolves the caller's public key from the payment backend.
//!
//! The key is asked for on every call. Nothing is cached: the node behind
//! the backend may change between invocations and the ledger must record
//! whoever actually acted.

use issuemarket_types::{BackendError, MarketError, PaymentBackend, PublicKey, Result};

/// Who is acting. Only used to label errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Auctioneer,
    Bidder,
}

impl ActorRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auctioneer => "auctioneer",
            Self::Bidder => "bidder",
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thin wrapper over [`PaymentBackend::get_identity`].
#[derive(Debug, Clone)]
pub struct IdentityResolver<B> {
    backend: B,
}

impl<B: PaymentBackend> IdentityResolver<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Ask the backend who we are.
    ///
    /// # Errors
    /// - `IdentityUnavailable` if the backend failed or timed out
    /// - `IdentityMalformed` if it answered without a compressed node key
    pub fn resolve(&self, role: ActorRole) -> Result<PublicKey> {
        let raw = self.backend.get_identity().map_err(|err| match err {
            BackendError::Malformed { reason, .. } => MarketError::IdentityMalformed {
                role: role.as_str(),
                reason,
            },
            other => MarketError::IdentityUnavailable {
                role: role.as_str(),
                reason: other.to_string(),
            },
        })?;

        let key = PublicKey::parse(raw.trim()).map_err(|e| MarketError::IdentityMalformed {
            role: role.as_str(),
            reason: e.to_string(),
        })?;
        tracing::debug!(%role, pubkey = key.short(), "identity resolved");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use issuemarket_types::{BackendStep, ScriptedBackend};

    use super::*;

    #[test]
    fn resolves_backend_key() {
        let key = PublicKey::dummy(0xaa);
        let backend = ScriptedBackend::new(&key);
        let resolver = IdentityResolver::new(&backend);
        assert_eq!(resolver.resolve(ActorRole::Auctioneer).unwrap(), key);
        assert_eq!(backend.steps(), vec![BackendStep::GetIdentity]);
    }

    #[test]
    fn asks_every_time() {
        let backend = ScriptedBackend::new(&PublicKey::dummy(0xaa));
        let resolver = IdentityResolver::new(&backend);
        resolver.resolve(ActorRole::Bidder).unwrap();
        resolver.resolve(ActorRole::Bidder).unwrap();
        assert_eq!(backend.steps().len(), 2);
    }

    #[test]
    fn unreachable_backend_is_unavailable() {
        let backend = ScriptedBackend::new(&PublicKey::dummy(0xaa));
        backend.fail_at(BackendStep::GetIdentity);
        let err = IdentityResolver::new(&backend)
            .resolve(ActorRole::Auctioneer)
            .unwrap_err();
        assert!(
            matches!(err, MarketError::IdentityUnavailable { role: "auctioneer", .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn timeout_is_unavailable() {
        let backend = ScriptedBackend::new(&PublicKey::dummy(0xaa));
        backend.time_out_at(BackendStep::GetIdentity);
        let err = IdentityResolver::new(&backend)
            .resolve(ActorRole::Bidder)
            .unwrap_err();
        assert!(matches!(err, MarketError::IdentityUnavailable { .. }));
    }

    #[test]
    fn malformed_output_is_malformed() {
        let backend = ScriptedBackend::new(&PublicKey::dummy(0xaa));
        backend.fail(
            BackendStep::GetIdentity,
            BackendError::Malformed {
                step: BackendStep::GetIdentity,
                reason: "missing identity_pubkey".to_string(),
            },
        );
        let err = IdentityResolver::new(&backend)
            .resolve(ActorRole::Bidder)
            .unwrap_err();
        assert!(matches!(err, MarketError::IdentityMalformed { .. }));
    }

    #[test]
    fn non_key_identity_is_malformed() {
        let backend = ScriptedBackend::new(&PublicKey::dummy(0xaa));
        for raw in ["", "not-a-key", &"04".repeat(33), &"02".repeat(32)] {
            backend.set_identity_raw(raw);
            let err = IdentityResolver::new(&backend)
                .resolve(ActorRole::Auctioneer)
                .unwrap_err();
            assert!(
                matches!(err, MarketError::IdentityMalformed { .. }),
                "{raw:?} gave {err:?}"
            );
        }
    }
}
