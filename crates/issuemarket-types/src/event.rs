//! Ledger event model.
//!
//! Every line of every ledger is one [`LedgerEvent`]: a write timestamp, the
//! correlation id of the entity it touches, and a tagged [`EventBody`].
//!
//! ```text
//! {"timestamp":1700000000,"uuid":"0190…","type":"bid-placed","data":{…}}
//! ```
//!
//! Building an [`EventBody`] is pure. The timestamp is stamped by the ledger
//! writer at the moment the line is written, never by the command.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Auction, AuctionId, Bid, BidderId, CorrelationId, Invoice, InvoiceId, Issue, IssueId,
    PublicKey,
};

/// Which of the three ledgers an event belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensitivity {
    /// Auction, bid, issue and invoice events. Safe to share.
    Public,
    /// Payment metadata and wallet balances.
    Private,
    /// Operational errors.
    Diagnostic,
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::Diagnostic => write!(f, "diagnostic"),
        }
    }
}

/// Entity-specific payload of a ledger event, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventBody {
    AuctionOpened {
        data: Auction,
    },
    AuctionClosed {
        auction_id: AuctionId,
        auctioneer_pubkey: PublicKey,
    },
    WinnerAnnounced {
        auction_id: AuctionId,
        bidder_id: BidderId,
        auctioneer_pubkey: PublicKey,
    },
    BidPlaced {
        data: Bid,
    },
    IssueCreated {
        data: Issue,
    },
    IssueResolved {
        issue_id: IssueId,
        resolution_details: String,
    },
    InvoiceCreated {
        data: Invoice,
        /// Raw backend output for audit.
        metadata: Value,
    },
    InvoicePaid {
        payment_request: String,
        /// Known only when the invoice was created against this ledger.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        invoice_id: Option<InvoiceId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auction_id: Option<AuctionId>,
        channel_capacity_sat: u64,
        /// Raw backend payment output for audit.
        metadata: Value,
    },
    WalletBalance {
        data: Value,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
    },
}

/// The closed set of `type` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AuctionOpened,
    AuctionClosed,
    WinnerAnnounced,
    BidPlaced,
    IssueCreated,
    IssueResolved,
    InvoiceCreated,
    InvoicePaid,
    WalletBalance,
    Error,
}

impl EventKind {
    /// The `type` tag as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuctionOpened => "auction-opened",
            Self::AuctionClosed => "auction-closed",
            Self::WinnerAnnounced => "winner-announced",
            Self::BidPlaced => "bid-placed",
            Self::IssueCreated => "issue-created",
            Self::IssueResolved => "issue-resolved",
            Self::InvoiceCreated => "invoice-created",
            Self::InvoicePaid => "invoice-paid",
            Self::WalletBalance => "wallet-balance",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EventBody {
    /// A diagnostic `error` event.
    #[must_use]
    pub fn error(message: impl Into<String>, command: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            command: command.map(str::to_string),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AuctionOpened { .. } => EventKind::AuctionOpened,
            Self::AuctionClosed { .. } => EventKind::AuctionClosed,
            Self::WinnerAnnounced { .. } => EventKind::WinnerAnnounced,
            Self::BidPlaced { .. } => EventKind::BidPlaced,
            Self::IssueCreated { .. } => EventKind::IssueCreated,
            Self::IssueResolved { .. } => EventKind::IssueResolved,
            Self::InvoiceCreated { .. } => EventKind::InvoiceCreated,
            Self::InvoicePaid { .. } => EventKind::InvoicePaid,
            Self::WalletBalance { .. } => EventKind::WalletBalance,
            Self::Error { .. } => EventKind::Error,
        }
    }

    /// The ledger this event is routed to.
    #[must_use]
    pub fn sensitivity(&self) -> Sensitivity {
        match self {
            Self::InvoicePaid { .. } | Self::WalletBalance { .. } => Sensitivity::Private,
            Self::Error { .. } => Sensitivity::Diagnostic,
            _ => Sensitivity::Public,
        }
    }
}

/// One durably written ledger line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Unix seconds at which the line was written.
    pub timestamp: i64,
    /// Correlation group of the entity this event touches.
    pub uuid: CorrelationId,
    #[serde(flatten)]
    pub body: EventBody,
}

impl LedgerEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }
}
