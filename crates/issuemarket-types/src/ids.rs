//! Identifiers used throughout the issue market.
//!
//! Correlation identifiers use UUIDv7 so the ledger groups sort by creation
//! time. Domain identifiers (`auction_id`, `issue_id`, ...) are chosen by
//! humans and are only wrapped, never validated for uniqueness.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MarketError, Result, constants};

// ---------------------------------------------------------------------------
// CorrelationId
// ---------------------------------------------------------------------------

/// Groups every ledger event that belongs to one entity instance.
///
/// Assigned once when the entity is created and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Domain identifiers
// ---------------------------------------------------------------------------

macro_rules! domain_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

domain_id!(
    /// Human-chosen auction identifier (e.g. `"A1"`).
    AuctionId
);
domain_id!(
    /// Human-chosen issue identifier (e.g. `"ISS1"`).
    IssueId
);
domain_id!(
    /// Human-chosen bidder identifier.
    BidderId
);
domain_id!(
    /// Invoice identifier, `invoice-<auction_id>-<uuid>`.
    InvoiceId
);

impl InvoiceId {
    /// Derive a fresh invoice identifier for an auction.
    #[must_use]
    pub fn for_auction(auction_id: &AuctionId) -> Self {
        Self(format!("invoice-{auction_id}-{}", Uuid::now_v7()))
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A Lightning node identity: a 33-byte compressed secp256k1 key, hex encoded.
///
/// Stored in lowercase hex exactly as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(String);

impl PublicKey {
    /// Parse and validate a hex-encoded compressed public key.
    ///
    /// # Errors
    /// Returns [`MarketError::InvalidPublicKey`] if the input is not 66 hex
    /// characters or does not start with a `02`/`03` parity prefix.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != constants::PUBKEY_HEX_LEN {
            return Err(MarketError::InvalidPublicKey {
                reason: format!(
                    "expected {} hex characters, got {}",
                    constants::PUBKEY_HEX_LEN,
                    trimmed.len()
                ),
            });
        }
        let bytes = hex::decode(trimmed).map_err(|e| MarketError::InvalidPublicKey {
            reason: e.to_string(),
        })?;
        if !matches!(bytes[0], 0x02 | 0x03) {
            return Err(MarketError::InvalidPublicKey {
                reason: format!("bad parity prefix 0x{:02x}", bytes[0]),
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl TryFrom<String> for PublicKey {
    type Error = MarketError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

impl std::str::FromStr for PublicKey {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl PublicKey {
    /// Deterministic key `02` followed by 32 copies of `fill`.
    pub fn dummy(fill: u8) -> Self {
        Self(format!("02{}", hex::encode([fill; 32])))
    }
}
