//! Append-only ledger writer.
//!
//! Every append happens under an exclusive advisory lock (`flock(LOCK_EX)`
//! via `fs2`) on the ledger file itself:
//!
//! 1. Open the file in append mode, creating it and its directory
//! 2. Acquire the exclusive lock (blocks behind other writers)
//! 3. Stamp the event with the clock
//! 4. Write the fully serialized line with a single `write_all`
//! 5. `fsync`, then release the lock
//!
//! Readers therefore never observe a partial line from a live writer, and
//! concurrent processes never interleave bytes.
//!
//! [`LedgerWriter::lock`] exposes the lock as a [`LedgerGuard`] so callers
//! can replay the ledger, validate a transition, and append the resulting
//! event without another process slipping a conflicting event in between.
//!
//! A failure to open, lock, or write is reported as `LedgerWrite`, which is
//! fatal for the calling command.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use issuemarket_types::{CorrelationId, EventBody, LedgerEvent, MarketError, Result};

use crate::clock::Clock;
use crate::reader::read_events;
use crate::replay::LedgerState;

/// Writes events to one ledger file.
#[derive(Clone)]
pub struct LedgerWriter {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LedgerWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerWriter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl LedgerWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Append one event and return it as written.
    pub fn append(&self, uuid: CorrelationId, body: EventBody) -> Result<LedgerEvent> {
        let mut guard = self.lock()?;
        guard.append(uuid, body)
    }

    /// Take the exclusive lock, repairing the tail left by a crashed writer
    /// first.
    pub fn lock(&self) -> Result<LedgerGuard<'_>> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|e| self.write_error(&e))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_error(&e))?;
        file.lock_exclusive().map_err(|e| self.write_error(&e))?;

        let mut guard = LedgerGuard { writer: self, file };
        guard.repair_tail()?;
        Ok(guard)
    }

    /// Read every event currently in the ledger (no lock).
    pub fn read(&self) -> Result<Vec<LedgerEvent>> {
        read_events(&self.path)
    }

    /// Replay the ledger (no lock).
    pub fn replay(&self) -> Result<LedgerState> {
        Ok(LedgerState::fold(&self.read()?))
    }

    fn write_error(&self, err: &dyn std::fmt::Display) -> MarketError {
        MarketError::LedgerWrite {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Exclusive hold on a ledger. Released on drop.
pub struct LedgerGuard<'a> {
    writer: &'a LedgerWriter,
    file: File,
}

impl LedgerGuard<'_> {
    /// Events written so far, including any appended through this guard.
    pub fn events(&self) -> Result<Vec<LedgerEvent>> {
        self.writer.read()
    }

    /// Replay of the ledger as seen under the lock.
    pub fn state(&self) -> Result<LedgerState> {
        self.writer.replay()
    }

    /// Append one event and return it as written.
    pub fn append(&mut self, uuid: CorrelationId, body: EventBody) -> Result<LedgerEvent> {
        let event = LedgerEvent {
            timestamp: self.writer.clock.now(),
            uuid,
            body,
        };
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .and_then(|()| self.file.sync_data())
            .map_err(|e| self.writer.write_error(&e))?;

        tracing::debug!(
            path = %self.writer.path.display(),
            kind = %event.kind(),
            uuid = %event.uuid,
            "ledger append"
        );
        Ok(event)
    }

    /// A crashed writer may leave a final line without its newline. If the
    /// line is a complete event the reader already returns it, so only the
    /// newline is added. Anything else was never readable and is cut off
    /// before anything is appended behind it.
    fn repair_tail(&mut self) -> Result<()> {
        let len = self
            .file
            .metadata()
            .map_err(|e| self.writer.write_error(&e))?
            .len();
        if len == 0 {
            return Ok(());
        }

        let mut content = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut content))
            .map_err(|e| self.writer.write_error(&e))?;
        if content.last() == Some(&b'\n') {
            return Ok(());
        }

        let keep = content
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |pos| pos + 1);
        if serde_json::from_slice::<LedgerEvent>(&content[keep..]).is_ok() {
            tracing::warn!(
                path = %self.writer.path.display(),
                "terminating tail record left without newline"
            );
            return self
                .file
                .write_all(b"\n")
                .and_then(|()| self.file.sync_data())
                .map_err(|e| self.writer.write_error(&e));
        }

        tracing::warn!(
            path = %self.writer.path.display(),
            dropped_bytes = content.len() - keep,
            "truncating torn tail record"
        );
        self.file
            .set_len(keep as u64)
            .and_then(|()| self.file.sync_all())
            .map_err(|e| self.writer.write_error(&e))
    }
}

impl Drop for LedgerGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.writer.path.display(), error = %e, "ledger unlock failed");
        }
    }
}
