//! # issuemarket-types
//!
//! Shared types, errors, and configuration for the **issue market** ledger.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`CorrelationId`], [`AuctionId`], [`IssueId`], [`BidderId`], [`InvoiceId`], [`PublicKey`]
//! - **Auction model**: [`Auction`], [`AuctionState`], [`Bid`], [`BidState`]
//! - **Invoice model**: [`Invoice`], [`InvoiceState`]
//! - **Issue model**: [`Issue`], [`IssueState`]
//! - **Event model**: [`LedgerEvent`], [`EventBody`], [`EventKind`], [`Sensitivity`]
//! - **Payment backend contract**: [`PaymentBackend`], [`BackendError`], [`BackendStep`]
//! - **Configuration**: [`MarketConfig`], [`LedgerConfig`], [`LndConfig`], [`SettlementConfig`], [`FeedbackConfig`]
//! - **Errors**: [`MarketError`] with `IM_ERR_` prefix codes
//! - **Constants**: defaults and protocol limits

pub mod auction;
pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod invoice;
pub mod issue;

// Re-export all primary types at crate root for ergonomic imports:
//   use issuemarket_types::{Auction, EventBody, LedgerEvent, ...};

pub use auction::*;
pub use backend::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use invoice::*;
pub use issue::*;

// Constants are accessed via `issuemarket_types::constants::FOO`
// (not re-exported to avoid name collisions).
