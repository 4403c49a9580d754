use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, crate_authors, crate_description, crate_version};
use issuemarket_types::{PublicKey, constants};
use rust_decimal::Decimal;

// `Options` is the full command line: global config flags plus one command.
#[derive(Parser, Debug)]
#[command(name = "ghissuemarket")]
#[command(author = crate_authors!())]
#[command(about = crate_description!())]
#[command(version = crate_version!())]
pub struct Options {
    #[command(flatten)]
    pub config: ConfigOptions,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Clone, Debug)]
#[command(next_help_heading = "Config Options")]
pub struct ConfigOptions {
    /// Path to a YAML configuration file.
    #[arg(long = "config", global = true)]
    #[arg(env = constants::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Public ledger (auctions, bids, issues, invoices).
    #[arg(long = "ledger", global = true)]
    pub ledger: Option<PathBuf>,

    /// Private ledger (payments, wallet balances).
    #[arg(long = "private-ledger", global = true)]
    pub private_ledger: Option<PathBuf>,

    /// Diagnostic ledger (errors).
    #[arg(long = "diagnostic-ledger", global = true)]
    pub diagnostic_ledger: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Auctioneer opens a new auction with specific open and close times.
    OpenAuction(OpenAuctionArgs),

    /// Auctioneer closes the auction.
    CloseAuction {
        #[arg(long = "auction-id")]
        auction_id: String,
    },

    /// Bidder places a bid on an auction.
    PlaceBid(PlaceBidArgs),

    /// Auctioneer announces the winner of a closed auction.
    AnnounceWinner {
        #[arg(long = "auction-id")]
        auction_id: String,

        #[arg(long = "bidder-id")]
        bidder_id: String,
    },

    /// Winning bidder creates an invoice for the auctioneer to pay.
    AddInvoice {
        #[arg(long = "auction-id")]
        auction_id: String,

        /// Invoice amount in millisatoshis.
        #[arg(long = "amount")]
        amount_msat: u64,

        #[arg(long = "memo", default_value = "")]
        memo: String,
    },

    /// Auctioneer pays an invoice over a channel opened for the payment.
    PayInvoice {
        #[arg(long = "payment-request")]
        payment_request: String,

        /// Node key of the bidder being paid.
        #[arg(long = "bidder-pubkey")]
        bidder_pubkey: PublicKey,
    },

    /// Record the wallet balance in the private ledger.
    #[command(alias = "walletbalance")]
    WalletBalance,

    /// Create a new issue with an estimated cost.
    AddIssue(AddIssueArgs),

    /// Resolve an issue directly without auctioning it.
    ResolveIssue {
        #[arg(long = "issue-id")]
        issue_id: String,

        #[arg(long = "resolution-details")]
        resolution_details: String,
    },

    /// Ask the feedback engine a question.
    Query {
        query: String,
    },
}

impl Command {
    /// Command name as typed, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAuction(_) => "open-auction",
            Self::CloseAuction { .. } => "close-auction",
            Self::PlaceBid(_) => "place-bid",
            Self::AnnounceWinner { .. } => "announce-winner",
            Self::AddInvoice { .. } => "add-invoice",
            Self::PayInvoice { .. } => "pay-invoice",
            Self::WalletBalance => "wallet-balance",
            Self::AddIssue(_) => "add-issue",
            Self::ResolveIssue { .. } => "resolve-issue",
            Self::Query { .. } => "query",
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct OpenAuctionArgs {
    #[arg(long = "auction-id")]
    pub auction_id: String,

    /// The issue being auctioned.
    #[arg(long = "issue-id")]
    pub issue_id: String,

    /// Description of the issue.
    #[arg(long = "issue", default_value = "")]
    pub issue: String,

    #[arg(long = "starting-price")]
    pub starting_price: Decimal,

    /// Unix timestamp at which bidding opens.
    #[arg(long = "open-time")]
    pub open_time: i64,

    /// Unix timestamp at which bidding closes.
    #[arg(long = "close-time")]
    pub close_time: i64,

    /// Additional information, e.g. required skills.
    #[arg(long = "metadata", default_value = "")]
    pub metadata: String,
}

#[derive(Args, Clone, Debug)]
pub struct PlaceBidArgs {
    #[arg(long = "auction-id")]
    pub auction_id: String,

    #[arg(long = "bidder-id")]
    pub bidder_id: String,

    #[arg(long = "bid-amount")]
    pub amount: Decimal,

    #[arg(long = "metadata", default_value = "")]
    pub metadata: String,
}

#[derive(Args, Clone, Debug)]
pub struct AddIssueArgs {
    #[arg(long = "issue-id")]
    pub issue_id: String,

    #[arg(long = "issue-description")]
    pub issue_description: String,

    #[arg(long = "estimated-cost")]
    pub estimated_cost: Decimal,

    #[arg(long = "metadata", default_value = "")]
    pub metadata: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Options {
        Options::try_parse_from(std::iter::once("ghissuemarket").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn parses_open_auction() {
        let opts = parse(&[
            "open-auction",
            "--auction-id",
            "A1",
            "--issue-id",
            "I1",
            "--starting-price",
            "100.5",
            "--open-time",
            "1000",
            "--close-time",
            "2000",
        ]);
        let Command::OpenAuction(args) = opts.command else {
            panic!("wrong command");
        };
        assert_eq!(args.auction_id, "A1");
        assert_eq!(args.starting_price, Decimal::new(1005, 1));
        assert_eq!(args.metadata, "");
    }

    #[test]
    fn walletbalance_alias() {
        assert!(matches!(parse(&["walletbalance"]).command, Command::WalletBalance));
        assert!(matches!(parse(&["wallet-balance"]).command, Command::WalletBalance));
    }

    #[test]
    fn global_ledger_overrides_after_command() {
        let opts = parse(&["wallet-balance", "--ledger", "/tmp/pub.log", "--private-ledger", "/tmp/priv.log"]);
        assert_eq!(opts.config.ledger, Some(PathBuf::from("/tmp/pub.log")));
        assert_eq!(opts.config.private_ledger, Some(PathBuf::from("/tmp/priv.log")));
        assert!(opts.config.diagnostic_ledger.is_none());
    }

    #[test]
    fn pay_invoice_validates_pubkey() {
        let key = PublicKey::dummy(0x01).to_string();
        let opts = parse(&["pay-invoice", "--payment-request", "lnbc1", "--bidder-pubkey", &key]);
        assert_eq!(opts.command.name(), "pay-invoice");

        let bad = Options::try_parse_from([
            "ghissuemarket",
            "pay-invoice",
            "--payment-request",
            "lnbc1",
            "--bidder-pubkey",
            "nope",
        ]);
        assert!(bad.is_err());
    }

    #[test]
    fn query_takes_positional_string() {
        let Command::Query { query } = parse(&["query", "how many open auctions?"]).command else {
            panic!("wrong command");
        };
        assert_eq!(query, "how many open auctions?");
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Options::try_parse_from(["ghissuemarket", "refund"]).is_err());
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Options::command().debug_assert();
    }
}
