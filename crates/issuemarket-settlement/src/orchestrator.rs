//! Settlement orchestration.
//!
//! Paying the winner of an auction is a sequence of backend calls, each of
//! which may fail or time out on its own:
//!
//! ```text
//!  open channel ──▶ pay invoice ──▶ record invoice-paid ──▶ lookup ──▶ close channel
//!       │                │                                     │             ▲
//!       │ refused        │ failed                              │ failed      │
//!       ▼                └─────────────────────────────────────┴─────────────┘
//!     abort              (close is attempted once an open was issued)
//! ```
//!
//! The payment is recorded as soon as the backend confirms it, so a later
//! lookup or close failure can never hide money that already moved. A
//! second attempt at the same payment request is refused from the ledger.

use std::cmp;

use issuemarket_ledger::{LedgerState, Ledgers};
use issuemarket_types::{
    AuctionId, AuctionState, BackendError, CorrelationId, EventBody, Invoice, InvoiceId,
    InvoiceState, LedgerEvent, MarketError, PaymentBackend, PublicKey, Result, SettlementConfig,
};
use rust_decimal::Decimal;
use serde::Serialize;

/// Outcome of a payment that went through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementReport {
    /// The `invoice-paid` event as written.
    pub event: LedgerEvent,
    /// Whether the backend reported the invoice as settled afterwards.
    pub settled: bool,
    /// Whether the payment channel was closed.
    pub channel_closed: bool,
}

/// Creates invoices and pays them through the payment backend.
#[derive(Debug, Clone)]
pub struct SettlementOrchestrator<B> {
    ledgers: Ledgers,
    backend: B,
    config: SettlementConfig,
}

impl<B: PaymentBackend> SettlementOrchestrator<B> {
    pub fn new(ledgers: Ledgers, backend: B, config: SettlementConfig) -> Self {
        Self {
            ledgers,
            backend,
            config,
        }
    }

    /// Ask the backend for an invoice paying the winner of `auction_id`.
    ///
    /// # Errors
    /// - `InvalidAmount` for a zero amount
    /// - `InvalidTransition` unless a winner has been announced
    /// - `AuctionAlreadySettled` if an invoice for the auction was paid
    /// - `Backend` if the backend refuses
    pub fn create_invoice(
        &self,
        auction_id: &AuctionId,
        amount_msat: u64,
        memo: &str,
    ) -> Result<LedgerEvent> {
        if amount_msat == 0 {
            return Err(MarketError::InvalidAmount {
                field: "amount_msat",
                amount: Decimal::ZERO,
            });
        }

        let mut guard = self.ledgers.public.lock()?;
        let mut events = guard.events()?;
        events.extend(self.ledgers.private.read()?);
        let state = LedgerState::fold(&events);

        match state.auction(auction_id).map(|v| v.state) {
            Some(AuctionState::WinnerAnnounced) => {}
            other => {
                return Err(rejected(MarketError::invalid_transition(
                    "auction",
                    auction_id,
                    other,
                    "Invoiced",
                )));
            }
        }
        if state.is_auction_settled(auction_id) {
            return Err(rejected(MarketError::AuctionAlreadySettled(auction_id.clone())));
        }

        let created = self.backend.create_invoice(amount_msat, memo)?;
        let invoice = Invoice {
            uuid: CorrelationId::new(),
            invoice_id: InvoiceId::for_auction(auction_id),
            auction_id: auction_id.clone(),
            amount_msat,
            memo: memo.to_string(),
            payment_request: created.payment_request,
            payment_hash: created.payment_hash,
            state: InvoiceState::Created,
        };
        let uuid = invoice.uuid;
        let invoice_id = invoice.invoice_id.clone();
        let event = guard.append(
            uuid,
            EventBody::InvoiceCreated {
                data: invoice,
                metadata: created.raw,
            },
        )?;
        tracing::info!(%auction_id, %invoice_id, amount_msat, "invoice created");
        Ok(event)
    }

    /// Pay `payment_request` over a channel opened to `peer` for the
    /// purpose, then close it.
    ///
    /// The private ledger stays locked for the whole sequence, so two
    /// processes can not pay the same request.
    ///
    /// # Errors
    /// - `InvoiceAlreadyPaid` / `AuctionAlreadySettled` before any backend call
    /// - `Backend` for the first step that failed
    /// - `LedgerWrite` if the payment could not be recorded
    pub fn settle(&self, payment_request: &str, peer: &PublicKey) -> Result<SettlementReport> {
        let mut guard = self.ledgers.private.lock()?;
        let mut events = self.ledgers.public.read()?;
        events.extend(guard.events()?);
        let state = LedgerState::fold(&events);

        if state.is_request_paid(payment_request) {
            return Err(rejected(MarketError::InvoiceAlreadyPaid {
                payment_request: payment_request.to_string(),
            }));
        }
        let invoice = state
            .invoice_by_request(payment_request)
            .map(|v| v.invoice.clone());
        if let Some(invoice) = &invoice {
            if state.is_auction_settled(&invoice.auction_id) {
                return Err(rejected(MarketError::AuctionAlreadySettled(
                    invoice.auction_id.clone(),
                )));
            }
        } else {
            tracing::warn!(
                payment_request,
                "payment request not found in ledger; paying as foreign invoice"
            );
        }

        let capacity_sat = invoice.as_ref().map_or(self.config.min_channel_capacity_sat, |i| {
            cmp::max(self.config.min_channel_capacity_sat, i.amount_sat_ceil())
        });

        // (2) open
        let funding_txid = match self.backend.open_channel(peer, capacity_sat) {
            Ok(opened) => {
                tracing::info!(
                    peer = peer.short(),
                    capacity_sat,
                    funding_txid = opened.funding_txid.as_deref(),
                    "channel opened"
                );
                tracing::debug!(raw = %opened.raw, "openchannel response");
                opened.funding_txid
            }
            Err(err) if err.is_timeout() => {
                // The channel may exist; nothing is paid over it.
                tracing::warn!(error = %err, "channel open timed out; closing");
                let closed = self.close_channel(peer, None);
                drop(guard);
                self.note_close(peer, closed);
                return Err(err.into());
            }
            Err(err) => {
                tracing::warn!(error = %err, "channel open refused; aborting settlement");
                return Err(err.into());
            }
        };
        let funding_txid = funding_txid.as_deref();

        // (3) pay
        let pay_raw = match self.backend.pay_invoice(payment_request) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "payment failed; closing channel");
                let closed = self.close_channel(peer, funding_txid);
                drop(guard);
                self.note_close(peer, closed);
                return Err(err.into());
            }
        };

        let recorded = guard.append(
            invoice.as_ref().map_or_else(CorrelationId::new, |i| i.uuid),
            EventBody::InvoicePaid {
                payment_request: payment_request.to_string(),
                invoice_id: invoice.as_ref().map(|i| i.invoice_id.clone()),
                auction_id: invoice.as_ref().map(|i| i.auction_id.clone()),
                channel_capacity_sat: capacity_sat,
                metadata: pay_raw,
            },
        );
        if let Err(err) = &recorded {
            tracing::error!(error = %err, payment_request, "payment made but not recorded");
        }

        // (4) confirm
        let lookup = self.backend.lookup_invoice(payment_request);
        // (5) close
        let closed = self.close_channel(peer, funding_txid);
        drop(guard);
        // Diagnostics are written only once the private ledger is released.
        let channel_closed = self.note_close(peer, closed);

        let event = recorded?;
        tracing::info!(payment_request, channel_closed, "invoice paid");
        self.capture_wallet_balance();

        let lookup = lookup?;
        if !lookup.settled {
            tracing::warn!(payment_request, "backend does not report the invoice as settled yet");
        }
        Ok(SettlementReport {
            event,
            settled: lookup.settled,
            channel_closed,
        })
    }

    /// Record the backend's wallet balance on the private ledger.
    pub fn wallet_balance(&self) -> Result<LedgerEvent> {
        let data = self.backend.wallet_balance()?;
        self.ledgers
            .private
            .append(CorrelationId::new(), EventBody::WalletBalance { data })
    }

    fn capture_wallet_balance(&self) {
        if let Err(err) = self.wallet_balance() {
            tracing::warn!(error = %err, "wallet balance capture failed");
            self.note_failure(&format!("wallet balance capture failed: {err}"));
        }
    }

    /// Close the payment channel with `peer`. Without a funding txid every
    /// channel with `peer` is closed.
    fn close_channel(
        &self,
        peer: &PublicKey,
        funding_txid: Option<&str>,
    ) -> std::result::Result<(), BackendError> {
        let raw = self.backend.close_channel(peer, funding_txid)?;
        tracing::info!(peer = peer.short(), funding_txid, "channel closed");
        tracing::debug!(%raw, "closechannel response");
        Ok(())
    }

    /// Report a close failure on the diagnostic ledger; returns whether the
    /// channel was closed.
    fn note_close(&self, peer: &PublicKey, closed: std::result::Result<(), BackendError>) -> bool {
        match closed {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, peer = peer.short(), "channel close failed");
                self.note_failure(&format!("channel close failed for {peer}: {err}"));
                false
            }
        }
    }

    fn note_failure(&self, message: &str) {
        if let Err(err) = self.ledgers.record_error(message, Some("pay-invoice")) {
            tracing::error!(error = %err, "diagnostic ledger write failed");
        }
    }
}

fn rejected(err: MarketError) -> MarketError {
    tracing::warn!(error = %err, "settlement rejected");
    err
}
