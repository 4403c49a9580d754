//! Deterministic replay of ledger events into current entity state.
//!
//! State is never stored: it is always the fold of the ledger in log order.
//! The fold is total. An event that does not fit the state it is applied to
//! (a second close, a bid on a closed auction, an event from a superseded
//! correlation group) is ignored with a warning, so the same log always
//! replays to the same state regardless of who wrote it.
//!
//! [`LedgerState::digest`] hashes the folded state so two replays can be
//! compared without comparing every entity.

use std::collections::{BTreeMap, BTreeSet};

use issuemarket_types::{
    Auction, AuctionId, AuctionState, Bid, BidderId, EventBody, Invoice, InvoiceId, InvoiceState,
    Issue, IssueId, IssueState, LedgerEvent, Result,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Current view of one auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuctionView {
    /// The record written at open time.
    pub auction: Auction,
    pub state: AuctionState,
    /// Bids accepted while open, in log order.
    pub bids: Vec<Bid>,
    pub winner: Option<BidderId>,
    pub opened_at: i64,
    pub closed_at: Option<i64>,
    pub announced_at: Option<i64>,
}

impl AuctionView {
    #[must_use]
    pub fn has_bid_from(&self, bidder_id: &BidderId) -> bool {
        self.bids.iter().any(|b| &b.bidder_id == bidder_id)
    }

    /// Highest bid by amount, earliest first on ties. Informational only:
    /// the winner is whoever the auctioneer announces.
    #[must_use]
    pub fn highest_bid(&self) -> Option<&Bid> {
        self.bids
            .iter()
            .fold(None, |best: Option<&Bid>, bid| match best {
                Some(b) if b.amount >= bid.amount => Some(b),
                _ => Some(bid),
            })
    }
}

/// Current view of one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueView {
    pub issue: Issue,
    pub state: IssueState,
    pub resolution: Option<String>,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

/// Current view of one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceView {
    pub invoice: Invoice,
    pub state: InvoiceState,
    pub created_at: i64,
    pub paid_at: Option<i64>,
}

/// Everything derivable from a sequence of ledger events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerState {
    pub auctions: BTreeMap<AuctionId, AuctionView>,
    pub issues: BTreeMap<IssueId, IssueView>,
    pub invoices: BTreeMap<InvoiceId, InvoiceView>,
    /// Payment requests with an `invoice-paid` event, known invoice or not.
    pub paid_requests: BTreeSet<String>,
    /// Number of events folded, including ignored ones.
    pub event_count: usize,
}

impl LedgerState {
    /// Fold `events` in order into a fresh state.
    pub fn fold<'a>(events: impl IntoIterator<Item = &'a LedgerEvent>) -> Self {
        let mut state = Self::default();
        for event in events {
            state.apply(event);
        }
        state
    }

    /// Apply one event.
    pub fn apply(&mut self, event: &LedgerEvent) {
        self.event_count += 1;
        let ts = event.timestamp;
        match &event.body {
            EventBody::AuctionOpened { data } => {
                if let Some(old) = self.auctions.get(&data.auction_id) {
                    tracing::warn!(
                        auction_id = %data.auction_id,
                        superseded = %old.auction.uuid,
                        "auction id reused; new correlation group supersedes the old one"
                    );
                }
                self.auctions.insert(
                    data.auction_id.clone(),
                    AuctionView {
                        auction: data.clone(),
                        state: AuctionState::Open,
                        bids: Vec::new(),
                        winner: None,
                        opened_at: ts,
                        closed_at: None,
                        announced_at: None,
                    },
                );
            }
            EventBody::AuctionClosed { auction_id, .. } => {
                match self.auction_in_group(auction_id, event) {
                    Some(view) if view.state.can_transition_to(AuctionState::Closed) => {
                        view.state = AuctionState::Closed;
                        view.closed_at = Some(ts);
                    }
                    _ => ignored(event),
                }
            }
            EventBody::WinnerAnnounced {
                auction_id,
                bidder_id,
                ..
            } => match self.auction_in_group(auction_id, event) {
                Some(view) if view.state.can_transition_to(AuctionState::WinnerAnnounced) => {
                    view.state = AuctionState::WinnerAnnounced;
                    view.winner = Some(bidder_id.clone());
                    view.announced_at = Some(ts);
                }
                _ => ignored(event),
            },
            EventBody::BidPlaced { data } => match self.auctions.get_mut(&data.auction_id) {
                Some(view)
                    if view.auction.uuid == data.auction_uuid && view.state.accepts_bids() =>
                {
                    view.bids.push(data.clone());
                }
                _ => ignored(event),
            },
            EventBody::IssueCreated { data } => {
                self.issues.insert(
                    data.issue_id.clone(),
                    IssueView {
                        issue: data.clone(),
                        state: IssueState::Open,
                        resolution: None,
                        created_at: ts,
                        resolved_at: None,
                    },
                );
            }
            EventBody::IssueResolved {
                issue_id,
                resolution_details,
            } => match self.issues.get_mut(issue_id) {
                Some(view)
                    if view.issue.uuid == event.uuid
                        && view.state.can_transition_to(IssueState::Resolved) =>
                {
                    view.state = IssueState::Resolved;
                    view.resolution = Some(resolution_details.clone());
                    view.resolved_at = Some(ts);
                }
                _ => ignored(event),
            },
            EventBody::InvoiceCreated { data, .. } => {
                self.invoices.insert(
                    data.invoice_id.clone(),
                    InvoiceView {
                        invoice: data.clone(),
                        state: InvoiceState::Created,
                        created_at: ts,
                        paid_at: None,
                    },
                );
            }
            EventBody::InvoicePaid {
                payment_request, ..
            } => {
                self.paid_requests.insert(payment_request.clone());
                let target = self
                    .invoices
                    .values_mut()
                    .find(|v| &v.invoice.payment_request == payment_request);
                if let Some(view) = target {
                    if view.state.can_transition_to(InvoiceState::Paid) {
                        view.state = InvoiceState::Paid;
                        view.paid_at = Some(ts);
                    }
                }
            }
            EventBody::WalletBalance { .. } | EventBody::Error { .. } => {}
        }
    }

    fn auction_in_group(
        &mut self,
        auction_id: &AuctionId,
        event: &LedgerEvent,
    ) -> Option<&mut AuctionView> {
        self.auctions
            .get_mut(auction_id)
            .filter(|view| view.auction.uuid == event.uuid)
    }

    #[must_use]
    pub fn auction(&self, auction_id: &AuctionId) -> Option<&AuctionView> {
        self.auctions.get(auction_id)
    }

    #[must_use]
    pub fn issue(&self, issue_id: &IssueId) -> Option<&IssueView> {
        self.issues.get(issue_id)
    }

    #[must_use]
    pub fn invoice(&self, invoice_id: &InvoiceId) -> Option<&InvoiceView> {
        self.invoices.get(invoice_id)
    }

    #[must_use]
    pub fn invoice_by_request(&self, payment_request: &str) -> Option<&InvoiceView> {
        self.invoices
            .values()
            .find(|v| v.invoice.payment_request == payment_request)
    }

    #[must_use]
    pub fn is_request_paid(&self, payment_request: &str) -> bool {
        self.paid_requests.contains(payment_request)
    }

    /// Whether any invoice for the auction has been paid.
    #[must_use]
    pub fn is_auction_settled(&self, auction_id: &AuctionId) -> bool {
        self.invoices
            .values()
            .any(|v| &v.invoice.auction_id == auction_id && v.state == InvoiceState::Paid)
    }

    /// SHA-256 over the canonical serialization of the folded state.
    ///
    /// Equal ledgers always produce equal digests.
    pub fn digest(&self) -> Result<[u8; 32]> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(b"issuemarket:ledger_state:v1:");
        hasher.update(&canonical);
        Ok(hasher.finalize().into())
    }
}

fn ignored(event: &LedgerEvent) {
    tracing::warn!(
        kind = %event.kind(),
        uuid = %event.uuid,
        timestamp = event.timestamp,
        "event does not apply to replayed state; ignored"
    );
}

#[cfg(test)]
mod tests {
    use issuemarket_types::{BidState, CorrelationId, PublicKey};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn at(ts: i64, uuid: CorrelationId, body: EventBody) -> LedgerEvent {
        LedgerEvent {
            timestamp: ts,
            uuid,
            body,
        }
    }

    fn opened(auction: &Auction, ts: i64) -> LedgerEvent {
        at(ts, auction.uuid, EventBody::AuctionOpened { data: auction.clone() })
    }

    fn bid(auction: &Auction, bidder: &str, amount: i64, ts: i64) -> LedgerEvent {
        let bid = Bid {
            uuid: CorrelationId::new(),
            auction_uuid: auction.uuid,
            auction_id: auction.auction_id.clone(),
            bidder_id: BidderId::new(bidder),
            amount: Decimal::new(amount, 0),
            metadata: String::new(),
            state: BidState::Placed,
            bidder_pubkey: PublicKey::dummy(0xbb),
        };
        at(ts, bid.uuid, EventBody::BidPlaced { data: bid })
    }

    fn closed(auction: &Auction, ts: i64) -> LedgerEvent {
        at(
            ts,
            auction.uuid,
            EventBody::AuctionClosed {
                auction_id: auction.auction_id.clone(),
                auctioneer_pubkey: auction.auctioneer_pubkey.clone(),
            },
        )
    }

    fn announced(auction: &Auction, bidder: &str, ts: i64) -> LedgerEvent {
        at(
            ts,
            auction.uuid,
            EventBody::WinnerAnnounced {
                auction_id: auction.auction_id.clone(),
                bidder_id: BidderId::new(bidder),
                auctioneer_pubkey: auction.auctioneer_pubkey.clone(),
            },
        )
    }

    fn full_auction() -> (Auction, Vec<LedgerEvent>) {
        let auction = Auction::dummy("A1");
        let events = vec![
            opened(&auction, 10),
            bid(&auction, "B1", 150, 11),
            bid(&auction, "B2", 120, 12),
            closed(&auction, 13),
            announced(&auction, "B1", 14),
        ];
        (auction, events)
    }

    #[test]
    fn auction_lifecycle_replays() {
        let (_, events) = full_auction();
        let state = LedgerState::fold(&events);
        let view = state.auction(&AuctionId::new("A1")).unwrap();
        assert_eq!(view.state, AuctionState::WinnerAnnounced);
        assert_eq!(view.winner, Some(BidderId::new("B1")));
        assert_eq!(view.bids.len(), 2);
        assert_eq!(view.closed_at, Some(13));
        assert_eq!(view.announced_at, Some(14));
        assert_eq!(state.event_count, 5);
    }

    #[test]
    fn replay_is_deterministic() {
        let (_, events) = full_auction();
        let a = LedgerState::fold(&events);
        let b = LedgerState::fold(&events);
        assert_eq!(a, b);
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn digest_changes_with_history() {
        let (_, events) = full_auction();
        let full = LedgerState::fold(&events);
        let partial = LedgerState::fold(&events[..4]);
        assert_ne!(full.digest().unwrap(), partial.digest().unwrap());
    }

    #[test]
    fn bid_after_close_is_ignored() {
        let auction = Auction::dummy("A1");
        let events = vec![
            opened(&auction, 1),
            closed(&auction, 2),
            bid(&auction, "B1", 150, 3),
        ];
        let state = LedgerState::fold(&events);
        assert!(state.auction(&auction.auction_id).unwrap().bids.is_empty());
    }

    #[test]
    fn transitions_cannot_skip_or_repeat() {
        let auction = Auction::dummy("A1");
        // Announce without close, then a double close.
        let events = vec![
            opened(&auction, 1),
            announced(&auction, "B1", 2),
            closed(&auction, 3),
            closed(&auction, 4),
        ];
        let view = LedgerState::fold(&events)
            .auction(&auction.auction_id)
            .cloned()
            .unwrap();
        assert_eq!(view.state, AuctionState::Closed);
        assert_eq!(view.closed_at, Some(3));
        assert!(view.winner.is_none());
    }

    #[test]
    fn reused_auction_id_starts_new_group() {
        let first = Auction::dummy("A1");
        let second = Auction::dummy("A1");
        let events = vec![
            opened(&first, 1),
            closed(&first, 2),
            opened(&second, 3),
            // Late event from the superseded group.
            closed(&first, 4),
        ];
        let view = LedgerState::fold(&events)
            .auction(&AuctionId::new("A1"))
            .cloned()
            .unwrap();
        assert_eq!(view.auction.uuid, second.uuid);
        assert_eq!(view.state, AuctionState::Open);
    }

    #[test]
    fn highest_bid_prefers_earliest_on_tie() {
        let auction = Auction::dummy("A1");
        let events = vec![
            opened(&auction, 1),
            bid(&auction, "B1", 150, 2),
            bid(&auction, "B2", 150, 3),
            bid(&auction, "B3", 90, 4),
        ];
        let state = LedgerState::fold(&events);
        let view = state.auction(&auction.auction_id).unwrap();
        assert_eq!(view.highest_bid().unwrap().bidder_id, BidderId::new("B1"));
        assert!(view.has_bid_from(&BidderId::new("B3")));
        assert!(!view.has_bid_from(&BidderId::new("B4")));
    }

    #[test]
    fn issue_resolves_once() {
        let issue = Issue {
            uuid: CorrelationId::new(),
            issue_id: IssueId::new("ISS1"),
            issue_description: "crash on start".to_string(),
            estimated_cost: Decimal::new(50, 0),
            metadata: String::new(),
            state: IssueState::Open,
        };
        let resolve = |details: &str, ts| {
            at(
                ts,
                issue.uuid,
                EventBody::IssueResolved {
                    issue_id: issue.issue_id.clone(),
                    resolution_details: details.to_string(),
                },
            )
        };
        let events = vec![
            at(1, issue.uuid, EventBody::IssueCreated { data: issue.clone() }),
            resolve("fixed", 2),
            resolve("fixed again", 3),
        ];
        let state = LedgerState::fold(&events);
        let view = state.issue(&issue.issue_id).unwrap();
        assert_eq!(view.state, IssueState::Resolved);
        assert_eq!(view.resolution.as_deref(), Some("fixed"));
        assert_eq!(view.resolved_at, Some(2));
    }

    #[test]
    fn invoice_paid_marks_invoice_and_auction_settled() {
        let invoice = Invoice {
            uuid: CorrelationId::new(),
            invoice_id: InvoiceId::new("invoice-A1-1"),
            auction_id: AuctionId::new("A1"),
            amount_msat: 150_000,
            memo: "fix".to_string(),
            payment_request: "lnbcrt1500n1".to_string(),
            payment_hash: "00".repeat(32),
            state: InvoiceState::Created,
        };
        let events = vec![
            at(
                1,
                invoice.uuid,
                EventBody::InvoiceCreated {
                    data: invoice.clone(),
                    metadata: json!({}),
                },
            ),
            at(
                2,
                invoice.uuid,
                EventBody::InvoicePaid {
                    payment_request: invoice.payment_request.clone(),
                    invoice_id: Some(invoice.invoice_id.clone()),
                    auction_id: Some(invoice.auction_id.clone()),
                    channel_capacity_sat: 20_000,
                    metadata: json!({}),
                },
            ),
            at(
                3,
                CorrelationId::new(),
                EventBody::InvoicePaid {
                    payment_request: "lnbcrt-foreign".to_string(),
                    invoice_id: None,
                    auction_id: None,
                    channel_capacity_sat: 20_000,
                    metadata: json!({}),
                },
            ),
        ];
        let state = LedgerState::fold(&events);
        let view = state.invoice_by_request("lnbcrt1500n1").unwrap();
        assert_eq!(view.state, InvoiceState::Paid);
        assert_eq!(view.paid_at, Some(2));
        assert!(state.is_auction_settled(&AuctionId::new("A1")));
        assert!(state.is_request_paid("lnbcrt-foreign"));
        assert!(!state.is_auction_settled(&AuctionId::new("A2")));
    }
}
