//! Integration test: concurrent writers and replay determinism
//!
//! Independent writers on one ledger file must never interleave bytes, and
//! any reader must replay the resulting file to the same state.

use std::sync::Arc;
use std::thread;

use issuemarket_ledger::{FixedClock, LedgerState, LedgerWriter, SystemClock, read_events};
use issuemarket_types::*;
use rust_decimal::Decimal;

const WRITERS: usize = 8;
const PER_WRITER: usize = 25;

fn dummy_bid(auction: &Auction, bidder: &str) -> Bid {
    Bid {
        uuid: CorrelationId::new(),
        auction_uuid: auction.uuid,
        auction_id: auction.auction_id.clone(),
        bidder_id: BidderId::new(bidder),
        amount: Decimal::new(150, 0),
        metadata: "x".repeat(512),
        state: BidState::Placed,
        bidder_pubkey: PublicKey::dummy(0xbb),
    }
}

#[test]
fn concurrent_writers_produce_whole_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ghissuemarket.log");
    let auction = Auction::dummy("A1");

    LedgerWriter::new(&path, Arc::new(SystemClock))
        .append(
            auction.uuid,
            EventBody::AuctionOpened {
                data: auction.clone(),
            },
        )
        .unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            // Each thread gets its own writer and file handle, as separate
            // processes would.
            let writer = LedgerWriter::new(&path, Arc::new(SystemClock));
            let auction = auction.clone();
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    let bid = dummy_bid(&auction, &format!("B{w}-{i}"));
                    writer
                        .append(bid.uuid, EventBody::BidPlaced { data: bid })
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 1 + WRITERS * PER_WRITER);
    for line in content.lines() {
        serde_json::from_str::<LedgerEvent>(line)
            .unwrap_or_else(|e| panic!("interleaved or partial line: {e}: {line}"));
    }

    let state = LedgerState::fold(&read_events(&path).unwrap());
    let view = state.auction(&auction.auction_id).unwrap();
    assert_eq!(view.bids.len(), WRITERS * PER_WRITER);
}

#[test]
fn independent_readers_replay_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ghissuemarket.log");
    let writer = LedgerWriter::new(&path, Arc::new(FixedClock::new(1_700_000_000)));

    let auction = Auction::dummy("A1");
    writer
        .append(
            auction.uuid,
            EventBody::AuctionOpened {
                data: auction.clone(),
            },
        )
        .unwrap();
    for bidder in ["B1", "B2", "B3"] {
        let bid = dummy_bid(&auction, bidder);
        writer
            .append(bid.uuid, EventBody::BidPlaced { data: bid })
            .unwrap();
    }
    writer
        .append(
            auction.uuid,
            EventBody::AuctionClosed {
                auction_id: auction.auction_id.clone(),
                auctioneer_pubkey: auction.auctioneer_pubkey.clone(),
            },
        )
        .unwrap();

    let reader_a = LedgerWriter::new(&path, Arc::new(SystemClock));
    let reader_b = LedgerWriter::new(&path, Arc::new(FixedClock::new(0)));
    let state_a = reader_a.replay().unwrap();
    let state_b = reader_b.replay().unwrap();

    assert_eq!(state_a, state_b);
    assert_eq!(
        state_a.digest().unwrap(),
        state_b.digest().unwrap(),
        "Replays of the same ledger MUST produce the same digest"
    );
    assert_eq!(
        state_a.auction(&auction.auction_id).unwrap().state,
        AuctionState::Closed
    );
}

#[test]
fn torn_tail_from_crashed_writer_is_invisible_and_repaired() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ghissuemarket.log");
    let writer = LedgerWriter::new(&path, Arc::new(FixedClock::new(5)));
    let auction = Auction::dummy("A1");
    writer
        .append(
            auction.uuid,
            EventBody::AuctionOpened {
                data: auction.clone(),
            },
        )
        .unwrap();

    let before = writer.replay().unwrap().digest().unwrap();
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(br#"{"timestamp":6,"uuid":"#).unwrap();
    }
    assert_eq!(writer.replay().unwrap().digest().unwrap(), before);

    writer
        .append(
            auction.uuid,
            EventBody::AuctionClosed {
                auction_id: auction.auction_id.clone(),
                auctioneer_pubkey: auction.auctioneer_pubkey.clone(),
            },
        )
        .unwrap();
    let events = writer.read().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].kind(), EventKind::AuctionClosed);
}

#[test]
fn complete_tail_without_newline_is_never_lost() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ghissuemarket.log");
    let writer = LedgerWriter::new(&path, Arc::new(FixedClock::new(5)));
    let auction = Auction::dummy("A1");
    writer
        .append(
            auction.uuid,
            EventBody::AuctionOpened {
                data: auction.clone(),
            },
        )
        .unwrap();

    let closed = LedgerEvent {
        timestamp: 6,
        uuid: auction.uuid,
        body: EventBody::AuctionClosed {
            auction_id: auction.auction_id.clone(),
            auctioneer_pubkey: auction.auctioneer_pubkey.clone(),
        },
    };
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(serde_json::to_string(&closed).unwrap().as_bytes())
            .unwrap();
    }

    let unlocked = writer.replay().unwrap();
    assert_eq!(
        unlocked.auction(&auction.auction_id).unwrap().state,
        AuctionState::Closed
    );

    drop(writer.lock().unwrap());
    let relocked = writer.replay().unwrap();
    assert_eq!(relocked, unlocked);
    assert_eq!(relocked.digest().unwrap(), unlocked.digest().unwrap());
}
