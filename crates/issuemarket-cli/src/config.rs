use std::fs;
use std::path::Path;

use issuemarket_types::{LedgerConfig, MarketConfig, MarketError, Result};

use crate::cli::ConfigOptions;

/// Build the effective configuration: defaults, then the YAML file if one
/// was given, then command-line overrides.
pub fn load(options: &ConfigOptions) -> Result<MarketConfig> {
    let mut config = match &options.config {
        Some(path) => from_file(path)?,
        None => MarketConfig::default(),
    };

    if let Some(path) = &options.ledger {
        config.ledger.public.clone_from(path);
    }
    if let Some(path) = &options.private_ledger {
        config.ledger.private.clone_from(path);
    }
    if let Some(path) = &options.diagnostic_ledger {
        config.ledger.diagnostic.clone_from(path);
    }
    check_distinct(&config.ledger)?;
    Ok(config)
}

/// Each ledger takes its own file lock, and settlement writes diagnostics
/// while holding the private one.
fn check_distinct(ledger: &LedgerConfig) -> Result<()> {
    let paths = [
        ("public", &ledger.public),
        ("private", &ledger.private),
        ("diagnostic", &ledger.diagnostic),
    ];
    for (i, (name, path)) in paths.iter().enumerate() {
        if let Some((other, _)) = paths[i + 1..].iter().find(|(_, p)| p == path) {
            return Err(MarketError::Configuration(format!(
                "{name} and {other} ledgers share {}",
                path.display()
            )));
        }
    }
    Ok(())
}

fn from_file(path: &Path) -> Result<MarketConfig> {
    let yaml = fs::read_to_string(path).map_err(|e| {
        MarketError::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_yaml::from_str(&yaml)
        .map_err(|e| MarketError::Configuration(format!("invalid {}: {e}", path.display())))
}
