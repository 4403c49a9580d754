//! Auction and bid records.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐ close  ┌────────┐ announce ┌─────────────────┐
//!   │ Open ├───────▶│ Closed ├─────────▶│ WinnerAnnounced │
//!   └──────┘        └────────┘          └─────────────────┘
//! ```
//!
//! Transitions are monotonic: no state may be skipped or revisited.
//! Bids are only accepted while the auction is `Open`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AuctionId, BidderId, CorrelationId, IssueId, MarketError, PublicKey, Result};

/// Lifecycle state of an auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuctionState {
    /// Accepting bids.
    Open,
    /// Bidding ended; waiting for the auctioneer to pick a winner.
    Closed,
    /// A winner was recorded. Terminal.
    WinnerAnnounced,
}

impl AuctionState {
    /// Can an auction in this state move to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::Closed) | (Self::Closed, Self::WinnerAnnounced)
        )
    }

    #[must_use]
    pub fn accepts_bids(&self) -> bool {
        *self == Self::Open
    }
}

impl std::fmt::Display for AuctionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
            Self::WinnerAnnounced => write!(f, "WinnerAnnounced"),
        }
    }
}

/// The record written when an auction opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    /// Correlation group for every event of this auction.
    pub uuid: CorrelationId,
    pub auction_id: AuctionId,
    /// The issue being auctioned.
    pub issue_id: IssueId,
    /// Free-text description of the issue.
    pub issue: String,
    pub starting_price: Decimal,
    /// Unix seconds at which bidding opens.
    pub open_time: i64,
    /// Unix seconds at which bidding closes.
    pub close_time: i64,
    /// Wall-clock time of the `open-auction` call.
    pub announcement_time: i64,
    /// Additional information, e.g. required skills.
    pub metadata: String,
    pub state: AuctionState,
    pub auctioneer_pubkey: PublicKey,
}

impl Auction {
    /// Check the bidding window and the starting price.
    ///
    /// # Errors
    /// - `InvalidAuctionWindow` unless `open_time < close_time`
    /// - `InvalidAmount` if the starting price is negative
    pub fn validate(&self) -> Result<()> {
        if self.open_time >= self.close_time {
            return Err(MarketError::InvalidAuctionWindow {
                open_time: self.open_time,
                close_time: self.close_time,
            });
        }
        if self.starting_price.is_sign_negative() {
            return Err(MarketError::InvalidAmount {
                field: "starting_price",
                amount: self.starting_price,
            });
        }
        Ok(())
    }
}

/// Lifecycle state of a bid. Bids are immutable once placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BidState {
    Placed,
}

impl std::fmt::Display for BidState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Placed")
    }
}

/// The record written when a bidder places a bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Correlation id of the bid itself.
    pub uuid: CorrelationId,
    /// Correlation group of the auction the bid was accepted into.
    pub auction_uuid: CorrelationId,
    pub auction_id: AuctionId,
    pub bidder_id: BidderId,
    /// Advisory amount; winner selection is an operator decision.
    pub amount: Decimal,
    pub metadata: String,
    pub state: BidState,
    pub bidder_pubkey: PublicKey,
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Auction {
    /// An `Open` auction with a 1000..2000 window and price 100.
    pub fn dummy(auction_id: &str) -> Self {
        Self {
            uuid: CorrelationId::new(),
            auction_id: AuctionId::new(auction_id),
            issue_id: IssueId::new("I1"),
            issue: "flaky integration test".to_string(),
            starting_price: Decimal::new(100, 0),
            open_time: 1000,
            close_time: 2000,
            announcement_time: 500,
            metadata: String::new(),
            state: AuctionState::Open,
            auctioneer_pubkey: PublicKey::dummy(0xaa),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions_valid() {
        assert!(AuctionState::Open.can_transition_to(AuctionState::Closed));
        assert!(AuctionState::Closed.can_transition_to(AuctionState::WinnerAnnounced));
    }

    #[test]
    fn state_transitions_invalid() {
        assert!(!AuctionState::Open.can_transition_to(AuctionState::WinnerAnnounced));
        assert!(!AuctionState::Open.can_transition_to(AuctionState::Open));
        assert!(!AuctionState::Closed.can_transition_to(AuctionState::Open));
        assert!(!AuctionState::Closed.can_transition_to(AuctionState::Closed));
        assert!(!AuctionState::WinnerAnnounced.can_transition_to(AuctionState::Open));
        assert!(!AuctionState::WinnerAnnounced.can_transition_to(AuctionState::Closed));
    }

    #[test]
    fn only_open_accepts_bids() {
        assert!(AuctionState::Open.accepts_bids());
        assert!(!AuctionState::Closed.accepts_bids());
        assert!(!AuctionState::WinnerAnnounced.accepts_bids());
    }

    #[test]
    fn state_serializes_as_plain_name() {
        let json = serde_json::to_string(&AuctionState::WinnerAnnounced).unwrap();
        assert_eq!(json, "\"WinnerAnnounced\"");
        assert_eq!(format!("{}", AuctionState::Open), "Open");
    }

    #[test]
    fn window_must_be_ordered() {
        let mut auction = Auction::dummy("A1");
        assert!(auction.validate().is_ok());

        auction.close_time = auction.open_time;
        let err = auction.validate().unwrap_err();
        assert!(matches!(err, MarketError::InvalidAuctionWindow { .. }));
    }

    #[test]
    fn negative_starting_price_rejected() {
        let mut auction = Auction::dummy("A1");
        auction.starting_price = Decimal::new(-1, 0);
        let err = auction.validate().unwrap_err();
        assert!(matches!(err, MarketError::InvalidAmount { field: "starting_price", .. }));
    }

    #[test]
    fn decimal_amounts_serialize_exactly() {
        let auction = Auction::dummy("A1");
        let json = serde_json::to_value(&auction).unwrap();
        assert_eq!(json["starting_price"], "100");
        assert_eq!(json["state"], "Open");
    }
}
