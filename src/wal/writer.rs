//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{LayoutError, Result};

use super::{Mutation, WalEntry};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// LSN handed to the next appended entry
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    /// Current file length in bytes
    size: u64,
}

impl WalWriter {
    /// Open or create a WAL file for appending
    ///
    /// `next_lsn` continues the sequence left by recovery (or the snapshot).
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn,
            sync_strategy,
            unsynced: 0,
            size,
        })
    }

    /// Append the mutations of one transaction, returning the assigned LSN
    ///
    /// An `Err` means the entry is not in the log: a failed write or fsync
    /// cuts the file back to its previous length and drops any bytes still
    /// buffered, so a later append never lands behind a torn entry.
    pub fn append(&mut self, mutations: Vec<Mutation>) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, mutations).encode()?;

        let synced = match self.write_frame(&frame) {
            Ok(synced) => synced,
            Err(e) => {
                self.discard_unwritten()?;
                return Err(LayoutError::Io(e));
            }
        };

        self.next_lsn += 1;
        self.size += frame.len() as u64;
        self.unsynced = if synced { 0 } else { self.unsynced + 1 };

        Ok(lsn)
    }

    /// Write and flush one frame, fsyncing when the strategy says so
    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<bool> {
        self.writer.write_all(frame)?;
        self.writer.flush()?;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count.max(1),
        };
        if due {
            self.writer.get_ref().sync_data()?;
        }
        Ok(due)
    }

    /// Drop buffered bytes and cut the file back to the last whole entry
    fn discard_unwritten(&mut self) -> Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // into_parts hands back the buffer without flushing it
        let (_, _unflushed) = stale.into_parts();

        self.writer.get_ref().set_len(self.size)?;
        tracing::warn!(size = self.size, "WAL append failed, discarded partial entry");
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every entry (after a checkpoint made them redundant)
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().set_len(0)?;
        self.writer.get_ref().sync_all()?;
        self.size = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN of the last appended entry (0 if none)
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn.saturating_sub(1)
    }

    /// Current WAL size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }
}
