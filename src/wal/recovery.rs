//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::{LayoutError, Result};

use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped (the damaged tail counts as one)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,

    /// Length of the valid prefix in bytes
    pub valid_bytes: u64,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first corrupted or partial entry
    /// 3. Truncate the file to the valid prefix
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result) = Self::scan(path)?;

        if result.entries_corrupted > 0 {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_bytes)?;
            file.sync_all()?;
            result.was_truncated = true;
        }

        Ok((entries, result))
    }

    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    if entry.lsn <= result.last_lsn {
                        tracing::warn!(
                            lsn = entry.lsn,
                            previous = result.last_lsn,
                            "WAL sequence went backwards"
                        );
                        result.entries_corrupted += 1;
                        break;
                    }
                    result.last_lsn = entry.lsn;
                    result.entries_recovered += 1;
                    result.valid_bytes = reader.position();
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(LayoutError::WalCorruption(reason)) => {
                    tracing::warn!(offset = reader.position(), %reason, "corrupt WAL tail");
                    result.entries_corrupted += 1;
                    break;
                }
                // A short read means the tail vanished under us: same as a torn write
                Err(LayoutError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((entries, result))
    }
}
