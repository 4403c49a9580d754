//! # issuemarket-ledger
//!
//! Append-only JSONL ledgers for the issue market. The ledgers are the system
//! of record: entity state is never stored anywhere else and is always
//! recovered by replaying them.
//!
//! - [`LedgerWriter`]: locked, fsynced, one-line-per-event appends
//! - [`read_events`]: log-order reader tolerant of a torn final line
//! - [`LedgerState`]: deterministic replay into auctions, issues and invoices
//! - [`Ledgers`]: the public, private and diagnostic ledgers routed by
//!   [`Sensitivity`]
//!
//! ## Routing
//!
//! ```text
//! auction-*, bid-*, issue-*, invoice-created  ──▶ public
//! invoice-paid, wallet-balance                ──▶ private
//! error                                       ──▶ diagnostic
//! ```

pub mod clock;
pub mod reader;
pub mod replay;
pub mod writer;

use std::sync::Arc;

use issuemarket_types::{
    CorrelationId, EventBody, LedgerConfig, LedgerEvent, Result, Sensitivity,
};

pub use clock::{Clock, FixedClock, SystemClock};
pub use reader::read_events;
pub use replay::{AuctionView, InvoiceView, IssueView, LedgerState};
pub use writer::{LedgerGuard, LedgerWriter};

/// The three ledgers, sharing one clock.
#[derive(Debug, Clone)]
pub struct Ledgers {
    pub public: LedgerWriter,
    pub private: LedgerWriter,
    pub diagnostic: LedgerWriter,
}

impl Ledgers {
    #[must_use]
    pub fn new(config: &LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            public: LedgerWriter::new(&config.public, Arc::clone(&clock)),
            private: LedgerWriter::new(&config.private, Arc::clone(&clock)),
            diagnostic: LedgerWriter::new(&config.diagnostic, clock),
        }
    }

    /// Ledgers stamped with wall-clock time.
    #[must_use]
    pub fn open(config: &LedgerConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn for_sensitivity(&self, sensitivity: Sensitivity) -> &LedgerWriter {
        match sensitivity {
            Sensitivity::Public => &self.public,
            Sensitivity::Private => &self.private,
            Sensitivity::Diagnostic => &self.diagnostic,
        }
    }

    /// The ledger `body` belongs in.
    #[must_use]
    pub fn for_event(&self, body: &EventBody) -> &LedgerWriter {
        self.for_sensitivity(body.sensitivity())
    }

    /// Append `body` to the ledger its kind belongs in.
    pub fn record(&self, uuid: CorrelationId, body: EventBody) -> Result<LedgerEvent> {
        self.for_event(&body).append(uuid, body)
    }

    /// Record an operational failure on the diagnostic ledger.
    pub fn record_error(&self, message: &str, command: Option<&str>) -> Result<LedgerEvent> {
        self.diagnostic
            .append(CorrelationId::new(), EventBody::error(message, command))
    }

    /// Replay of the public and private ledgers chained in that order.
    ///
    /// Invoice creation lives on the public ledger and payment on the
    /// private one, so settlement state needs both.
    pub fn combined_state(&self) -> Result<LedgerState> {
        let mut events = self.public.read()?;
        events.extend(self.private.read()?);
        Ok(LedgerState::fold(&events))
    }
}
