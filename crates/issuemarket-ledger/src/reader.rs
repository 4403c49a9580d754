//! Ledger reader.
//!
//! Returns events in log order. A ledger that does not exist yet is empty.
//! A final line without its newline is kept when it is a complete event
//! (the next writer to take the lock terminates it). When it does not parse
//! it is a torn write from a writer that crashed before acknowledging it, and
//! it is skipped. Any other unparseable line is corruption and fails the read.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use issuemarket_types::{LedgerEvent, MarketError, Result};

/// Read every event in the ledger at `path`.
///
/// # Errors
/// - `LedgerRead` if the file exists but cannot be read as UTF-8
/// - `CorruptLedger` if a complete line is not a valid event
pub fn read_events(path: &Path) -> Result<Vec<LedgerEvent>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(MarketError::LedgerRead {
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }
    };
    parse_lines(path, &content)
}

fn parse_lines(path: &Path, content: &str) -> Result<Vec<LedgerEvent>> {
    let complete = content.ends_with('\n');
    let lines: Vec<&str> = content.lines().collect();
    let last = lines.len().saturating_sub(1);

    let mut events = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LedgerEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) if idx == last && !complete => {
                tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    reason = %e,
                    "skipping torn tail record"
                );
            }
            Err(e) => {
                return Err(MarketError::CorruptLedger {
                    path: path.display().to_string(),
                    line: idx + 1,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(events)
}
