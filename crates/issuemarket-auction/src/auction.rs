//! Auction state machine.
//!
//! Every command follows the same sequence:
//! 1. Resolve the caller's identity (abort before touching the ledger)
//! 2. Take the public ledger lock
//! 3. Replay the ledger and check the transition against current state
//! 4. Append the event and release the lock
//!
//! Steps 2-4 are atomic with respect to other processes, so two operators
//! closing the same auction at once produce exactly one `auction-closed`.

use issuemarket_ledger::{AuctionView, LedgerWriter};
use issuemarket_types::{
    Auction, AuctionId, AuctionState, Bid, BidState, BidderId, CorrelationId, EventBody, IssueId,
    LedgerEvent, MarketError, PaymentBackend, Result,
};
use rust_decimal::Decimal;

use crate::identity::{ActorRole, IdentityResolver};

/// Everything the auctioneer supplies when opening an auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAuctionRequest {
    pub auction_id: AuctionId,
    pub issue_id: IssueId,
    pub issue: String,
    pub starting_price: Decimal,
    pub open_time: i64,
    pub close_time: i64,
    pub metadata: String,
}

/// Validates and records auction transitions on the public ledger.
#[derive(Debug, Clone)]
pub struct AuctionHouse<B> {
    ledger: LedgerWriter,
    identity: IdentityResolver<B>,
}

impl<B: PaymentBackend> AuctionHouse<B> {
    pub fn new(ledger: LedgerWriter, backend: B) -> Self {
        Self {
            ledger,
            identity: IdentityResolver::new(backend),
        }
    }

    /// Open a new auction with a fresh correlation id.
    ///
    /// Reusing an `auction_id` starts a new correlation group; replay then
    /// follows the newest one.
    ///
    /// # Errors
    /// - identity errors
    /// - `InvalidAuctionWindow` unless `open_time < close_time`
    /// - `InvalidAmount` for a negative starting price
    pub fn open_auction(&self, request: OpenAuctionRequest) -> Result<LedgerEvent> {
        let auctioneer_pubkey = self.identity.resolve(ActorRole::Auctioneer)?;

        let mut guard = self.ledger.lock()?;
        let auction = Auction {
            uuid: CorrelationId::new(),
            auction_id: request.auction_id,
            issue_id: request.issue_id,
            issue: request.issue,
            starting_price: request.starting_price,
            open_time: request.open_time,
            close_time: request.close_time,
            announcement_time: self.ledger.clock().now(),
            metadata: request.metadata,
            state: AuctionState::Open,
            auctioneer_pubkey,
        };
        auction.validate().map_err(rejected)?;

        if let Some(previous) = guard.state()?.auction(&auction.auction_id) {
            tracing::info!(
                auction_id = %auction.auction_id,
                previous = %previous.auction.uuid,
                previous_state = %previous.state,
                "auction id reused, superseding previous auction"
            );
        }

        let uuid = auction.uuid;
        let auction_id = auction.auction_id.clone();
        let event = guard.append(uuid, EventBody::AuctionOpened { data: auction })?;
        tracing::info!(%auction_id, %uuid, "auction opened");
        Ok(event)
    }

    /// # Errors
    /// - identity errors
    /// - `InvalidTransition` if the auction is missing or not `Open`
    pub fn close_auction(&self, auction_id: &AuctionId) -> Result<LedgerEvent> {
        let auctioneer_pubkey = self.identity.resolve(ActorRole::Auctioneer)?;

        let mut guard = self.ledger.lock()?;
        let state = guard.state()?;
        let view = require_transition(state.auction(auction_id), auction_id, AuctionState::Closed)?;

        let event = guard.append(
            view.auction.uuid,
            EventBody::AuctionClosed {
                auction_id: auction_id.clone(),
                auctioneer_pubkey,
            },
        )?;
        tracing::info!(%auction_id, bids = view.bids.len(), "auction closed");
        Ok(event)
    }

    /// # Errors
    /// - `InvalidAmount` for a negative amount
    /// - identity errors
    /// - `AuctionNotOpen` if the auction is missing or not `Open`
    pub fn place_bid(
        &self,
        auction_id: &AuctionId,
        bidder_id: &BidderId,
        amount: Decimal,
        metadata: &str,
    ) -> Result<LedgerEvent> {
        if amount.is_sign_negative() {
            return Err(rejected(MarketError::InvalidAmount {
                field: "amount",
                amount,
            }));
        }
        let bidder_pubkey = self.identity.resolve(ActorRole::Bidder)?;

        let mut guard = self.ledger.lock()?;
        let state = guard.state()?;
        let view = match state.auction(auction_id) {
            Some(view) if view.state.accepts_bids() => view,
            other => {
                return Err(rejected(MarketError::AuctionNotOpen {
                    auction_id: auction_id.clone(),
                    state: other.map(|v| v.state),
                }));
            }
        };

        let bid = Bid {
            uuid: CorrelationId::new(),
            auction_uuid: view.auction.uuid,
            auction_id: auction_id.clone(),
            bidder_id: bidder_id.clone(),
            amount,
            metadata: metadata.to_string(),
            state: BidState::Placed,
            bidder_pubkey,
        };
        let event = guard.append(bid.uuid, EventBody::BidPlaced { data: bid })?;
        tracing::info!(%auction_id, %bidder_id, %amount, "bid placed");
        Ok(event)
    }

    /// Record the auctioneer's choice of winner.
    ///
    /// # Errors
    /// - identity errors
    /// - `InvalidTransition` if the auction is missing or not `Closed`
    /// - `InvalidWinner` if `bidder_id` never bid on it
    pub fn announce_winner(
        &self,
        auction_id: &AuctionId,
        bidder_id: &BidderId,
    ) -> Result<LedgerEvent> {
        let auctioneer_pubkey = self.identity.resolve(ActorRole::Auctioneer)?;

        let mut guard = self.ledger.lock()?;
        let state = guard.state()?;
        let view = require_transition(
            state.auction(auction_id),
            auction_id,
            AuctionState::WinnerAnnounced,
        )?;
        if !view.has_bid_from(bidder_id) {
            return Err(rejected(MarketError::InvalidWinner {
                auction_id: auction_id.clone(),
                bidder_id: bidder_id.clone(),
                reason: "no bid from this bidder".to_string(),
            }));
        }

        let event = guard.append(
            view.auction.uuid,
            EventBody::WinnerAnnounced {
                auction_id: auction_id.clone(),
                bidder_id: bidder_id.clone(),
                auctioneer_pubkey,
            },
        )?;
        tracing::info!(%auction_id, %bidder_id, "winner announced");
        Ok(event)
    }

    /// Current replayed view of an auction.
    pub fn auction(&self, auction_id: &AuctionId) -> Result<Option<AuctionView>> {
        Ok(self.ledger.replay()?.auctions.remove(auction_id))
    }
}

fn require_transition<'a>(
    view: Option<&'a AuctionView>,
    auction_id: &AuctionId,
    target: AuctionState,
) -> Result<&'a AuctionView> {
    match view {
        Some(view) if view.state.can_transition_to(target) => Ok(view),
        other => Err(rejected(MarketError::invalid_transition(
            "auction",
            auction_id,
            other.map(|v| v.state),
            target,
        ))),
    }
}

pub(crate) fn rejected(err: MarketError) -> MarketError {
    tracing::warn!(error = %err, "transition rejected");
    err
}
