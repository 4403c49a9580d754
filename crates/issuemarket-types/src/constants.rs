//! System-wide constants for the issue market.

/// Default public event ledger (auctions, bids, issues, invoices).
pub const DEFAULT_PUBLIC_LEDGER: &str = "/var/log/ghissuemarket/ghissuemarket.log";

/// Default private ledger (payment metadata, wallet balances).
pub const DEFAULT_PRIVATE_LEDGER: &str = "/var/log/ghissuemarket/private.log";

/// Default diagnostic ledger (errors only).
pub const DEFAULT_DIAGNOSTIC_LEDGER: &str = "/var/log/ghissuemarket/sys.log";

/// Default `lncli` executable, resolved through `PATH`.
pub const DEFAULT_LNCLI_PATH: &str = "lncli";

/// Default LND TLS certificate.
pub const DEFAULT_LND_TLS_CERT: &str = "/home/lnd/.lnd/tls.cert";

/// Default LND admin macaroon.
pub const DEFAULT_LND_MACAROON: &str = "/home/lnd/.lnd/data/chain/bitcoin/regtest/admin.macaroon";

/// Default feedback engine executable.
pub const DEFAULT_FEEDBACK_ENGINE: &str = "/usr/local/bin/ghissuemarket-feedback_engine";

/// Default bound on a single backend call, in seconds. Sized for a
/// channel open, the slowest step.
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 60;

/// Smallest channel LND will open by default, in satoshis.
pub const DEFAULT_MIN_CHANNEL_CAPACITY_SAT: u64 = 20_000;

/// Millisatoshis per satoshi.
pub const MSAT_PER_SAT: u64 = 1000;

/// Hex length of a 33-byte compressed secp256k1 public key.
pub const PUBKEY_HEX_LEN: usize = 66;

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "ISSUEMARKET_CONFIG";
