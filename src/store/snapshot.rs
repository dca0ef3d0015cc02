//! Snapshot file
//!
//! Immutable checkpoint of the whole bucket tree.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (22 bytes)                                           │
//! │   Magic: "LKVS" (4) | Version: u16 (2) | Count: u64 (8)     │
//! │   Last LSN: u64 (8)                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                       │
//! │   [PathLen: u32][ValLen: u32][Path][Value]                  │
//! │   ... one per value and per bucket, depth-first ...         │
//! │   (ValLen = u32::MAX marks a bucket, no value bytes)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Footer (8 bytes)                                            │
//! │   DataCRC: u32 (4) | Padding (4)                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Path` is the full key path from the root, each segment written as
//! `[len: u32][bytes]`. Buckets precede their contents, so loading can insert
//! entries in file order.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{LayoutError, Result};

use super::bucket::{BucketNode, Node};

/// Magic bytes identifying a snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"LKVS";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Magic (4) + Version (2) + EntryCount (8) + LastLsn (8)
pub(crate) const HEADER_SIZE: usize = 22;

/// DataCRC (4) + Padding (4)
pub(crate) const FOOTER_SIZE: usize = 8;

/// Sentinel value length marking a bucket entry
pub(crate) const BUCKET_MARKER: u32 = u32::MAX;

/// Write `root` to `path` atomically (temp file + rename)
///
/// Returns the size of the written file.
pub(crate) fn write(path: &Path, root: &BucketNode, last_lsn: u64) -> Result<u64> {
    let tmp_path = path.with_extension("tmp");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)?;

    let mut builder = SnapshotBuilder {
        writer: BufWriter::new(file),
        entry_count: 0,
        hasher: crc32fast::Hasher::new(),
        path_buf: Vec::new(),
    };

    // Header (entry count placeholder, patched below)
    builder.writer.write_all(MAGIC)?;
    builder.writer.write_all(&VERSION.to_le_bytes())?;
    builder.writer.write_all(&0u64.to_le_bytes())?;
    builder.writer.write_all(&last_lsn.to_le_bytes())?;

    builder.write_bucket(root)?;

    let crc = builder.hasher.finalize();
    builder.writer.write_all(&crc.to_le_bytes())?;
    builder.writer.write_all(&[0u8; 4])?;
    builder.writer.flush()?;

    let entry_count = builder.entry_count;
    let mut file = builder
        .writer
        .into_inner()
        .map_err(|e| LayoutError::Store(format!("Failed to flush snapshot: {}", e)))?;
    file.seek(SeekFrom::Start(6))?; // After magic + version
    file.write_all(&entry_count.to_le_bytes())?;
    file.sync_all()?;
    let size = file.metadata()?.len();
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(size)
}

struct SnapshotBuilder {
    writer: BufWriter<File>,
    entry_count: u64,
    hasher: crc32fast::Hasher,
    /// Encoded path of the bucket currently being written
    path_buf: Vec<u8>,
}

impl SnapshotBuilder {
    fn write_bucket(&mut self, node: &BucketNode) -> Result<()> {
        for (key, child) in &node.entries {
            let parent_len = self.path_buf.len();
            self.path_buf
                .extend_from_slice(&(key.len() as u32).to_le_bytes());
            self.path_buf.extend_from_slice(key);

            match child {
                Node::Value(value) => self.write_entry(Some(value.as_slice()))?,
                Node::Bucket(bucket) => {
                    self.write_entry(None)?;
                    self.write_bucket(bucket)?;
                }
            }

            self.path_buf.truncate(parent_len);
        }
        Ok(())
    }

    fn write_entry(&mut self, value: Option<&[u8]>) -> Result<()> {
        let path_len = (self.path_buf.len() as u32).to_le_bytes();
        let val_len = match value {
            Some(v) => v.len() as u32,
            None => BUCKET_MARKER,
        }
        .to_le_bytes();

        for chunk in [&path_len[..], &val_len[..], &self.path_buf[..]] {
            self.writer.write_all(chunk)?;
            self.hasher.update(chunk);
        }
        if let Some(v) = value {
            self.writer.write_all(v)?;
            self.hasher.update(v);
        }

        self.entry_count += 1;
        Ok(())
    }
}

/// Load a snapshot, returning the tree and the last LSN it covers
pub(crate) fn read(path: &Path) -> Result<(BucketNode, u64)> {
    let data = fs::read(path)?;
    if data.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(LayoutError::Store(format!(
            "Snapshot too short: {} bytes",
            data.len()
        )));
    }

    if &data[0..4] != MAGIC {
        return Err(LayoutError::Store(format!(
            "Invalid snapshot magic: expected LKVS, got {:?}",
            &data[0..4]
        )));
    }
    let version = u16::from_le_bytes(data[4..6].try_into().unwrap());
    if version != VERSION {
        return Err(LayoutError::Store(format!(
            "Unsupported snapshot version: {}",
            version
        )));
    }
    let entry_count = u64::from_le_bytes(data[6..14].try_into().unwrap());
    let last_lsn = u64::from_le_bytes(data[14..22].try_into().unwrap());

    let footer_start = data.len() - FOOTER_SIZE;
    let block = &data[HEADER_SIZE..footer_start];
    let expected_crc = u32::from_le_bytes(data[footer_start..footer_start + 4].try_into().unwrap());
    let actual_crc = crc32fast::hash(block);
    if expected_crc != actual_crc {
        return Err(LayoutError::Store(format!(
            "Snapshot CRC mismatch: expected {:08x}, got {:08x}",
            expected_crc, actual_crc
        )));
    }

    let mut root = BucketNode::default();
    let mut pos = 0;
    let mut loaded = 0u64;
    while pos < block.len() {
        let path_len = read_u32(block, pos)? as usize;
        let val_len = read_u32(block, pos + 4)?;
        pos += 8;

        let path_bytes = slice(block, pos, path_len)?;
        pos += path_len;
        let mut segments = decode_path(path_bytes)?;
        let key = segments
            .pop()
            .ok_or_else(|| LayoutError::Store("Snapshot entry with empty path".to_string()))?;

        let node = if val_len == BUCKET_MARKER {
            Node::Bucket(BucketNode::default())
        } else {
            let value = slice(block, pos, val_len as usize)?.to_vec();
            pos += val_len as usize;
            Node::Value(value)
        };

        let parent = root.descend_mut(&segments).ok_or_else(|| {
            LayoutError::Store("Snapshot entry precedes its bucket".to_string())
        })?;
        parent.entries.insert(key, node);
        loaded += 1;
    }

    if loaded != entry_count {
        return Err(LayoutError::Store(format!(
            "Snapshot entry count mismatch: header says {}, found {}",
            entry_count, loaded
        )));
    }

    Ok((root, last_lsn))
}

fn decode_path(mut bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut segments = Vec::new();
    while !bytes.is_empty() {
        let len = read_u32(bytes, 0)? as usize;
        segments.push(slice(bytes, 4, len)?.to_vec());
        bytes = &bytes[4 + len..];
    }
    Ok(segments)
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32> {
    let bytes = slice(data, pos, 4)?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

fn slice(data: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    pos.checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or_else(|| LayoutError::Store(format!("Snapshot truncated at offset {}", pos)))
}
