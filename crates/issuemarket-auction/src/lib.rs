//! # issuemarket-auction
//!
//! Business transitions for auctions and issues. Each one is validated
//! against a full replay of the public ledger taken under the ledger lock,
//! then recorded as a single event.
//!
//! - [`IdentityResolver`]: the caller's node key, asked for on every command
//! - [`AuctionHouse`]: `Open → Closed → WinnerAnnounced`, bids while `Open`
//! - [`IssueTracker`]: `Open → Resolved`

pub mod auction;
pub mod identity;
pub mod issue;

pub use auction::{AuctionHouse, OpenAuctionRequest};
pub use identity::{ActorRole, IdentityResolver};
pub use issue::IssueTracker;
