//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// Entry header: LSN (8) + CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 16;

/// Largest payload accepted when reading (256 MB)
pub const MAX_ENTRY_SIZE: u32 = 256 * 1024 * 1024;

/// A single entry in the WAL: every mutation of one committed write transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Mutations in the order the transaction applied them
    pub mutations: Vec<Mutation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Mutations that can be logged
///
/// `path` names the bucket the mutation applies to, outermost first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Create a nested bucket `key` inside the bucket at `path`
    CreateBucket { path: Vec<Vec<u8>>, key: Vec<u8> },

    /// Put a key-value pair into the bucket at `path`
    Put {
        path: Vec<Vec<u8>>,
        key: Vec<u8>,
        value: Vec<u8>,
    },
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, mutations: Vec<Mutation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            mutations,
            timestamp,
        }
    }

    /// Encode the framed entry: header followed by the bincode payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|e| LayoutError::Serialization(e.to_string()))?;
        if payload.len() > MAX_ENTRY_SIZE as usize {
            return Err(LayoutError::Serialization(format!(
                "WAL entry too large: {} bytes (max {})",
                payload.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&Self::compute_crc(&payload).to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a payload whose header has already been read
    ///
    /// Verifies the checksum and that the payload agrees with the header LSN.
    pub fn decode(lsn: u64, crc: u32, payload: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(payload);
        if actual != crc {
            return Err(LayoutError::WalCorruption(format!(
                "CRC mismatch at lsn {}: expected {:08x}, got {:08x}",
                lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload)
            .map_err(|e| LayoutError::WalCorruption(format!("lsn {}: {}", lsn, e)))?;
        if entry.lsn != lsn {
            return Err(LayoutError::WalCorruption(format!(
                "header lsn {} does not match payload lsn {}",
                lsn, entry.lsn
            )));
        }
        Ok(entry)
    }

    pub fn compute_crc(payload: &[u8]) -> u32 {
        crc32fast::hash(payload)
    }
}
