use std::fmt;

use issuemarket_auction::{AuctionHouse, IssueTracker, OpenAuctionRequest};
use issuemarket_ledger::Ledgers;
use issuemarket_settlement::SettlementOrchestrator;
use issuemarket_types::{
    AuctionId, BidderId, IssueId, MarketConfig, MarketError, PaymentBackend, Result,
};
use serde_json::Value;

use crate::cli::Command;
use crate::feedback;

/// What a successful command prints on stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// A written record, shown as pretty JSON.
    Record(Value),
    /// Free text from the feedback engine.
    Text(String),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(value) => {
                let pretty = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
            Self::Text(text) => f.write_str(text),
        }
    }
}

fn record(value: impl serde::Serialize) -> Result<Output> {
    Ok(Output::Record(serde_json::to_value(value)?))
}

/// Run one command against the ledgers and payment backend.
pub fn execute<B: PaymentBackend>(
    command: &Command,
    config: &MarketConfig,
    ledgers: &Ledgers,
    backend: B,
) -> Result<Output> {
    let house = || AuctionHouse::new(ledgers.public.clone(), &backend);
    let settlement =
        || SettlementOrchestrator::new(ledgers.clone(), &backend, config.settlement.clone());

    match command {
        Command::OpenAuction(args) => record(house().open_auction(OpenAuctionRequest {
            auction_id: AuctionId::new(&args.auction_id),
            issue_id: IssueId::new(&args.issue_id),
            issue: args.issue.clone(),
            starting_price: args.starting_price,
            open_time: args.open_time,
            close_time: args.close_time,
            metadata: args.metadata.clone(),
        })?),
        Command::CloseAuction { auction_id } => {
            record(house().close_auction(&AuctionId::new(auction_id))?)
        }
        Command::PlaceBid(args) => record(house().place_bid(
            &AuctionId::new(&args.auction_id),
            &BidderId::new(&args.bidder_id),
            args.amount,
            &args.metadata,
        )?),
        Command::AnnounceWinner {
            auction_id,
            bidder_id,
        } => record(
            house().announce_winner(&AuctionId::new(auction_id), &BidderId::new(bidder_id))?,
        ),
        Command::AddInvoice {
            auction_id,
            amount_msat,
            memo,
        } => record(settlement().create_invoice(&AuctionId::new(auction_id), *amount_msat, memo)?),
        Command::PayInvoice {
            payment_request,
            bidder_pubkey,
        } => record(settlement().settle(payment_request, bidder_pubkey)?),
        Command::WalletBalance => record(settlement().wallet_balance()?),
        Command::AddIssue(args) => record(IssueTracker::new(ledgers.public.clone()).create_issue(
            IssueId::new(&args.issue_id),
            &args.issue_description,
            args.estimated_cost,
            &args.metadata,
        )?),
        Command::ResolveIssue {
            issue_id,
            resolution_details,
        } => record(
            IssueTracker::new(ledgers.public.clone())
                .resolve_issue(&IssueId::new(issue_id), resolution_details)?,
        ),
        Command::Query { query } => {
            tracing::info!(query, "executing query");
            feedback::query(&config.feedback, config.lnd.timeout(), query).map(Output::Text)
        }
    }
}

/// Report a failed command and return the process exit status.
///
/// The error goes to stderr and to the diagnostic ledger. Exit 2 means a
/// ledger could not be written and the caller must not assume anything was
/// recorded.
pub fn report_failure(ledgers: &Ledgers, command: &Command, err: &MarketError) -> u8 {
    eprintln!("Error: {err}");
    tracing::error!(command = command.name(), error = %err, "command failed");

    let recorded = ledgers.record_error(&err.to_string(), Some(command.name()));
    if let Err(record_err) = &recorded {
        eprintln!("Error: {record_err}");
    }
    if err.is_fatal() || recorded.is_err() { 2 } else { 1 }
}
