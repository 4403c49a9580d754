//! # issuemarket-settlement
//!
//! Moves money for auctions that have a winner.
//!
//! - [`SettlementOrchestrator`]: invoice creation, open/pay/lookup/close
//!   settlement, wallet balance capture
//! - [`LncliBackend`]: the production [`PaymentBackend`] over `lncli`
//! - [`process`]: bounded child-process execution used by the adapter
//!
//! [`PaymentBackend`]: issuemarket_types::PaymentBackend

pub mod lncli;
pub mod orchestrator;
pub mod process;

pub use lncli::LncliBackend;
pub use orchestrator::{SettlementOrchestrator, SettlementReport};
