//! Error types for the issue market.
//!
//! All errors use the `IM_ERR_` prefix convention for easy grepping in logs
//! and in the diagnostic ledger. Error codes are grouped by subsystem:
//! - 1xx: Identity errors
//! - 2xx: Transition / validation errors
//! - 3xx: Settlement and payment-backend errors
//! - 4xx: Ledger errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AuctionId, AuctionState, BackendError, BidderId};

/// Central error enum for all issue market operations.
#[derive(Debug, Error)]
pub enum MarketError {
    // =================================================================
    // Identity Errors (1xx)
    // =================================================================
    /// The backend could not be asked for its identity.
    #[error("IM_ERR_100: Identity unavailable for {role}: {reason}")]
    IdentityUnavailable { role: &'static str, reason: String },

    /// The backend answered, but without a usable identity.
    #[error("IM_ERR_101: Malformed identity for {role}: {reason}")]
    IdentityMalformed { role: &'static str, reason: String },

    /// A public key supplied by the caller is not a compressed node key.
    #[error("IM_ERR_102: Invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    // =================================================================
    // Transition Errors (2xx)
    // =================================================================
    /// The entity is missing or not in a state that permits the transition.
    #[error("IM_ERR_200: Invalid transition for {entity} {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        /// Current state, or `"None"` if the entity does not exist.
        from: String,
        to: String,
    },

    /// A bid targeted an auction that is not accepting bids.
    #[error("IM_ERR_201: Auction {auction_id} is not open (state: {})", state_label(.state))]
    AuctionNotOpen {
        auction_id: AuctionId,
        state: Option<AuctionState>,
    },

    /// The announced winner never bid on the auction.
    #[error("IM_ERR_202: Invalid winner {bidder_id} for auction {auction_id}: {reason}")]
    InvalidWinner {
        auction_id: AuctionId,
        bidder_id: BidderId,
        reason: String,
    },

    /// `open_time` must be strictly before `close_time`.
    #[error("IM_ERR_203: Invalid auction window: open_time {open_time} >= close_time {close_time}")]
    InvalidAuctionWindow { open_time: i64, close_time: i64 },

    /// A monetary amount was negative.
    #[error("IM_ERR_204: Invalid {field}: {amount}")]
    InvalidAmount { field: &'static str, amount: Decimal },

    // =================================================================
    // Settlement Errors (3xx)
    // =================================================================
    /// One of the payment backend calls failed, timed out, or returned
    /// output that could not be parsed.
    #[error("IM_ERR_300: Backend call failed: {0}")]
    Backend(#[from] BackendError),

    /// The payment request has already been paid (idempotency guard).
    #[error("IM_ERR_301: Invoice already paid: {payment_request}")]
    InvoiceAlreadyPaid { payment_request: String },

    /// The auction already has a paid invoice.
    #[error("IM_ERR_302: Auction already settled: {0}")]
    AuctionAlreadySettled(AuctionId),

    // =================================================================
    // Ledger Errors (4xx)
    // =================================================================
    /// An event could not be durably written. Fatal for the process.
    #[error("IM_ERR_400: Ledger write failed for {path}: {reason}")]
    LedgerWrite { path: String, reason: String },

    /// A ledger line could not be parsed.
    #[error("IM_ERR_401: Corrupt ledger {path} at line {line}: {reason}")]
    CorruptLedger {
        path: String,
        line: usize,
        reason: String,
    },

    /// A ledger could not be read.
    #[error("IM_ERR_402: Ledger read failed for {path}: {reason}")]
    LedgerRead { path: String, reason: String },

    // =================================================================
    // General (9xx)
    // =================================================================
    /// Serialization / deserialization error.
    #[error("IM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("IM_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl MarketError {
    /// Whether the process must stop instead of reporting and continuing.
    ///
    /// Only ledger write failures are fatal: an unlogged transition is
    /// indistinguishable from one that never happened.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LedgerWrite { .. })
    }

    /// Shorthand for a missing-or-wrong-state transition error.
    #[must_use]
    pub fn invalid_transition(
        entity: &'static str,
        id: impl ToString,
        from: Option<impl ToString>,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            id: id.to_string(),
            from: from.map_or_else(|| "None".to_string(), |s| s.to_string()),
            to: to.to_string(),
        }
    }
}

fn state_label(state: &Option<AuctionState>) -> String {
    state.map_or_else(|| "None".to_string(), |s| s.to_string())
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MarketError>;

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
