//! Configuration types for the issue market.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes. Nothing here is global: the binary loads one [`MarketConfig`]
//! and hands the relevant section to each component at construction.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub ledger: LedgerConfig,
    pub lnd: LndConfig,
    pub settlement: SettlementConfig,
    pub feedback: FeedbackConfig,
}

/// Locations of the three ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Auction, bid, issue and invoice events.
    pub public: PathBuf,
    /// Payment metadata and wallet balances.
    pub private: PathBuf,
    /// Operational errors.
    pub diagnostic: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            public: PathBuf::from(constants::DEFAULT_PUBLIC_LEDGER),
            private: PathBuf::from(constants::DEFAULT_PRIVATE_LEDGER),
            diagnostic: PathBuf::from(constants::DEFAULT_DIAGNOSTIC_LEDGER),
        }
    }
}

impl LedgerConfig {
    /// All three ledgers under one directory, with the conventional names.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            public: dir.join("ghissuemarket.log"),
            private: dir.join("private.log"),
            diagnostic: dir.join("sys.log"),
        }
    }
}

/// How to reach the LND node through `lncli`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LndConfig {
    pub lncli_path: PathBuf,
    pub tls_cert_path: PathBuf,
    pub macaroon_path: PathBuf,
    /// `host:port` of the node's RPC server, if not the lncli default.
    pub rpc_server: Option<String>,
    /// `mainnet`, `testnet`, `regtest`, ...
    pub network: Option<String>,
    /// Bound on each backend call.
    pub timeout_secs: u64,
}

impl Default for LndConfig {
    fn default() -> Self {
        Self {
            lncli_path: PathBuf::from(constants::DEFAULT_LNCLI_PATH),
            tls_cert_path: PathBuf::from(constants::DEFAULT_LND_TLS_CERT),
            macaroon_path: PathBuf::from(constants::DEFAULT_LND_MACAROON),
            rpc_server: None,
            network: None,
            timeout_secs: constants::DEFAULT_BACKEND_TIMEOUT_SECS,
        }
    }
}

impl LndConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settlement tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Floor for the capacity of the channel opened to pay an invoice.
    pub min_channel_capacity_sat: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            min_channel_capacity_sat: constants::DEFAULT_MIN_CHANNEL_CAPACITY_SAT,
        }
    }
}

/// The external feedback engine answering `query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub engine_path: PathBuf,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            engine_path: PathBuf::from(constants::DEFAULT_FEEDBACK_ENGINE),
        }
    }
}
