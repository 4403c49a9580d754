//! Invoice records.
//!
//! An invoice moves `Created → Paid` exactly once. A paid invoice is never
//! touched again; a second payment attempt is rejected before any backend
//! call is made.

use serde::{Deserialize, Serialize};

use crate::{AuctionId, CorrelationId, InvoiceId, constants};

/// Lifecycle state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceState {
    Created,
    /// Irreversible.
    Paid,
}

impl InvoiceState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Created, Self::Paid))
    }
}

impl std::fmt::Display for InvoiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Paid => write!(f, "Paid"),
        }
    }
}

/// The record written when the winning bidder asks to be paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub uuid: CorrelationId,
    pub invoice_id: InvoiceId,
    pub auction_id: AuctionId,
    /// Amount in millisatoshis.
    pub amount_msat: u64,
    pub memo: String,
    /// BOLT-11 payment request owned by the backend.
    pub payment_request: String,
    /// Backend-side invoice identifier (payment hash).
    pub payment_hash: String,
    pub state: InvoiceState,
}

impl Invoice {
    /// Amount rounded up to whole satoshis.
    #[must_use]
    pub fn amount_sat_ceil(&self) -> u64 {
        self.amount_msat.div_ceil(constants::MSAT_PER_SAT)
    }
}
