//! The payment backend contract.
//!
//! Everything the market needs from a Lightning node is captured by the
//! [`PaymentBackend`] trait. The production adapter drives `lncli`; tests use
//! [`ScriptedBackend`], which records every call and can be told to fail at
//! any step.
//!
//! Every call is blocking. Implementations bound each call with their own
//! timeout and report it as [`BackendError::Timeout`], which callers treat
//! differently from an explicit refusal: after a timeout the backend may or
//! may not have committed the operation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::PublicKey;

/// The individual backend operations, used to label errors and calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendStep {
    GetIdentity,
    CreateInvoice,
    OpenChannel,
    PayInvoice,
    LookupInvoice,
    CloseChannel,
    WalletBalance,
    /// Not a payment call: the external feedback engine behind `query`.
    FeedbackQuery,
}

impl fmt::Display for BackendStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetIdentity => write!(f, "get-identity"),
            Self::CreateInvoice => write!(f, "create-invoice"),
            Self::OpenChannel => write!(f, "open-channel"),
            Self::PayInvoice => write!(f, "pay-invoice"),
            Self::LookupInvoice => write!(f, "lookup-invoice"),
            Self::CloseChannel => write!(f, "close-channel"),
            Self::WalletBalance => write!(f, "wallet-balance"),
            Self::FeedbackQuery => write!(f, "feedback-query"),
        }
    }
}

/// Failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend refused or the call exited unsuccessfully.
    #[error("{step} failed: {detail}")]
    Failed { step: BackendStep, detail: String },

    /// No answer within the configured bound. Outcome unknown.
    #[error("{step} timed out after {secs}s")]
    Timeout { step: BackendStep, secs: u64 },

    /// The backend answered with output that could not be parsed.
    #[error("{step} returned malformed output: {reason}")]
    Malformed { step: BackendStep, reason: String },
}

impl BackendError {
    #[must_use]
    pub fn step(&self) -> BackendStep {
        match self {
            Self::Failed { step, .. } | Self::Timeout { step, .. } | Self::Malformed { step, .. } => {
                *step
            }
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// An invoice freshly created by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedInvoice {
    pub payment_request: String,
    /// Backend invoice id (payment hash, hex).
    pub payment_hash: String,
    /// Full backend response, kept for the audit trail.
    pub raw: Value,
}

/// A channel open the backend accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedChannel {
    /// Funding transaction of the new channel, when the backend reports it.
    pub funding_txid: Option<String>,
    pub raw: Value,
}

/// Outcome of an invoice lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceLookup {
    pub settled: bool,
    pub raw: Value,
}

/// Narrow interface over the Lightning node.
pub trait PaymentBackend {
    /// The node's identity public key, as reported (unvalidated).
    fn get_identity(&self) -> Result<String, BackendError>;

    fn create_invoice(&self, amount_msat: u64, memo: &str) -> Result<CreatedInvoice, BackendError>;

    fn open_channel(
        &self,
        peer: &PublicKey,
        capacity_sat: u64,
    ) -> Result<OpenedChannel, BackendError>;

    fn pay_invoice(&self, payment_request: &str) -> Result<Value, BackendError>;

    /// Status of the payment for `payment_request` as seen by this (paying)
    /// node.
    fn lookup_invoice(&self, payment_request: &str) -> Result<InvoiceLookup, BackendError>;

    /// Close the channels with `peer`, whether open or still pending,
    /// restricted to `funding_txid` when given.
    ///
    /// Closing nothing is an error: the channel is still holding funds.
    fn close_channel(
        &self,
        peer: &PublicKey,
        funding_txid: Option<&str>,
    ) -> Result<Value, BackendError>;

    fn wallet_balance(&self) -> Result<Value, BackendError>;
}

impl<B: PaymentBackend + ?Sized> PaymentBackend for &B {
    fn get_identity(&self) -> Result<String, BackendError> {
        (**self).get_identity()
    }

    fn create_invoice(&self, amount_msat: u64, memo: &str) -> Result<CreatedInvoice, BackendError> {
        (**self).create_invoice(amount_msat, memo)
    }

    fn open_channel(
        &self,
        peer: &PublicKey,
        capacity_sat: u64,
    ) -> Result<OpenedChannel, BackendError> {
        (**self).open_channel(peer, capacity_sat)
    }

    fn pay_invoice(&self, payment_request: &str) -> Result<Value, BackendError> {
        (**self).pay_invoice(payment_request)
    }

    fn lookup_invoice(&self, payment_request: &str) -> Result<InvoiceLookup, BackendError> {
        (**self).lookup_invoice(payment_request)
    }

    fn close_channel(
        &self,
        peer: &PublicKey,
        funding_txid: Option<&str>,
    ) -> Result<Value, BackendError> {
        (**self).close_channel(peer, funding_txid)
    }

    fn wallet_balance(&self) -> Result<Value, BackendError> {
        (**self).wallet_balance()
    }
}

// ---------------------------------------------------------------------------
// ScriptedBackend: deterministic test double
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-helpers"))]
pub use scripted::{BackendCall, ScriptedBackend};

#[cfg(any(test, feature = "test-helpers"))]
mod scripted {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use super::{
        BackendError, BackendStep, CreatedInvoice, InvoiceLookup, OpenedChannel, PaymentBackend,
    };
    use crate::PublicKey;

    /// A call observed by [`ScriptedBackend`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BackendCall {
        GetIdentity,
        CreateInvoice { amount_msat: u64, memo: String },
        OpenChannel { peer: PublicKey, capacity_sat: u64 },
        PayInvoice { payment_request: String },
        LookupInvoice { payment_request: String },
        CloseChannel {
            peer: PublicKey,
            funding_txid: Option<String>,
        },
        WalletBalance,
    }

    impl BackendCall {
        pub fn step(&self) -> BackendStep {
            match self {
                Self::GetIdentity => BackendStep::GetIdentity,
                Self::CreateInvoice { .. } => BackendStep::CreateInvoice,
                Self::OpenChannel { .. } => BackendStep::OpenChannel,
                Self::PayInvoice { .. } => BackendStep::PayInvoice,
                Self::LookupInvoice { .. } => BackendStep::LookupInvoice,
                Self::CloseChannel { .. } => BackendStep::CloseChannel,
                Self::WalletBalance => BackendStep::WalletBalance,
            }
        }
    }

    /// In-memory backend that succeeds unless told otherwise.
    pub struct ScriptedBackend {
        identity: Mutex<String>,
        failures: Mutex<HashMap<BackendStep, BackendError>>,
        settled: Mutex<bool>,
        calls: Mutex<Vec<BackendCall>>,
    }

    impl ScriptedBackend {
        /// A backend reporting `identity` and settling every payment.
        pub fn new(identity: &PublicKey) -> Self {
            Self {
                identity: Mutex::new(identity.to_string()),
                failures: Mutex::new(HashMap::new()),
                settled: Mutex::new(true),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Make every call of `step` fail with `err`.
        pub fn fail(&self, step: BackendStep, err: BackendError) {
            self.failures.lock().expect("lock poisoned").insert(step, err);
        }

        /// Make every call of `step` fail with an explicit refusal.
        pub fn fail_at(&self, step: BackendStep) {
            self.fail(
                step,
                BackendError::Failed {
                    step,
                    detail: format!("scripted {step} failure"),
                },
            );
        }

        /// Make every call of `step` time out.
        pub fn time_out_at(&self, step: BackendStep) {
            self.fail(step, BackendError::Timeout { step, secs: 60 });
        }

        /// Stop failing `step`.
        pub fn heal(&self, step: BackendStep) {
            self.failures.lock().expect("lock poisoned").remove(&step);
        }

        /// Report `raw` verbatim as the identity (may be invalid).
        pub fn set_identity_raw(&self, raw: &str) {
            *self.identity.lock().expect("lock poisoned") = raw.to_string();
        }

        /// Whether lookups report the invoice as settled.
        pub fn set_settled(&self, settled: bool) {
            *self.settled.lock().expect("lock poisoned") = settled;
        }

        pub fn calls(&self) -> Vec<BackendCall> {
            self.calls.lock().expect("lock poisoned").clone()
        }

        /// The steps called so far, in order.
        pub fn steps(&self) -> Vec<BackendStep> {
            self.calls().iter().map(BackendCall::step).collect()
        }

        pub fn called(&self, step: BackendStep) -> bool {
            self.steps().contains(&step)
        }

        pub fn clear_calls(&self) {
            self.calls.lock().expect("lock poisoned").clear();
        }

        fn record(&self, call: BackendCall) -> Result<(), BackendError> {
            let step = call.step();
            self.calls.lock().expect("lock poisoned").push(call);
            match self.failures.lock().expect("lock poisoned").get(&step) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    impl PaymentBackend for ScriptedBackend {
        fn get_identity(&self) -> Result<String, BackendError> {
            self.record(BackendCall::GetIdentity)?;
            Ok(self.identity.lock().expect("lock poisoned").clone())
        }

        fn create_invoice(
            &self,
            amount_msat: u64,
            memo: &str,
        ) -> Result<CreatedInvoice, BackendError> {
            self.record(BackendCall::CreateInvoice {
                amount_msat,
                memo: memo.to_string(),
            })?;
            let n = self.calls.lock().expect("lock poisoned").len();
            let payment_request = format!("lnbcrt{amount_msat}n1scripted{n}");
            let payment_hash = format!("{n:064x}");
            Ok(CreatedInvoice {
                raw: json!({
                    "r_hash": payment_hash,
                    "payment_request": payment_request,
                    "add_index": n.to_string(),
                }),
                payment_request,
                payment_hash,
            })
        }

        fn open_channel(
            &self,
            peer: &PublicKey,
            capacity_sat: u64,
        ) -> Result<OpenedChannel, BackendError> {
            self.record(BackendCall::OpenChannel {
                peer: peer.clone(),
                capacity_sat,
            })?;
            let funding_txid = "ab".repeat(32);
            Ok(OpenedChannel {
                raw: json!({ "funding_txid": funding_txid }),
                funding_txid: Some(funding_txid),
            })
        }

        fn pay_invoice(&self, payment_request: &str) -> Result<Value, BackendError> {
            self.record(BackendCall::PayInvoice {
                payment_request: payment_request.to_string(),
            })?;
            Ok(json!({ "payment_error": "", "status": "SUCCEEDED" }))
        }

        fn lookup_invoice(&self, payment_request: &str) -> Result<InvoiceLookup, BackendError> {
            self.record(BackendCall::LookupInvoice {
                payment_request: payment_request.to_string(),
            })?;
            let settled = *self.settled.lock().expect("lock poisoned");
            Ok(InvoiceLookup {
                settled,
                raw: json!({ "state": if settled { "SETTLED" } else { "OPEN" } }),
            })
        }

        fn close_channel(
            &self,
            peer: &PublicKey,
            funding_txid: Option<&str>,
        ) -> Result<Value, BackendError> {
            self.record(BackendCall::CloseChannel {
                peer: peer.clone(),
                funding_txid: funding_txid.map(str::to_string),
            })?;
            Ok(json!({ "closing_txid": "cd".repeat(32) }))
        }

        fn wallet_balance(&self) -> Result<Value, BackendError> {
            self.record(BackendCall::WalletBalance)?;
            Ok(json!({
                "total_balance": "1000000",
                "confirmed_balance": "1000000",
                "unconfirmed_balance": "0",
            }))
        }
    }
}
