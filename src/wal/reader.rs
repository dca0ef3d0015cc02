//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{LayoutError, Result};

use super::{WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset of the next unread entry
    position: u64,
    /// File length at open time
    len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            len,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file, `WalCorruption` for a
    /// partial or damaged entry.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let remaining = self.len - self.position;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return Err(LayoutError::WalCorruption(format!(
                "partial header at offset {} ({} bytes)",
                self.position, remaining
            )));
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;
        let lsn = u64::from_le_bytes(header[0..8].try_into().unwrap());
        let crc = u32::from_le_bytes(header[8..12].try_into().unwrap());
        let payload_len = u32::from_le_bytes(header[12..16].try_into().unwrap());

        if payload_len > MAX_ENTRY_SIZE {
            return Err(LayoutError::WalCorruption(format!(
                "entry at offset {} claims {} bytes (max {})",
                self.position, payload_len, MAX_ENTRY_SIZE
            )));
        }
        if remaining - (HEADER_SIZE as u64) < payload_len as u64 {
            return Err(LayoutError::WalCorruption(format!(
                "partial entry at offset {}: expected {} payload bytes, {} available",
                self.position,
                payload_len,
                remaining - HEADER_SIZE as u64
            )));
        }

        let mut payload = vec![0u8; payload_len as usize];
        self.reader.read_exact(&mut payload)?;
        let entry = WalEntry::decode(lsn, crc, &payload)?;

        self.position += HEADER_SIZE as u64 + payload_len as u64;
        Ok(Some(entry))
    }

    /// Offset just past the last entry successfully read
    pub fn position(&self) -> u64 {
        self.position
    }
}
