//! Codec Module
//!
//! Byte representations of a [`Record`].
//!
//! ## Whole-record codecs (one blob per record)
//! - [`BinaryCodec`]: positional, no names, no tags
//! - [`TaggedCodec`]: field count, then name + type tag + payload per field
//! - [`JsonCodec`]: JSON object keyed by field name
//! - [`GobCodec`]: generic serde binary serialization
//!
//! ## Per-field value codec
//! - [`field`]: one field's payload, used by the layouts that store each field
//!   under its own key
//!
//! ## Keys
//! Every layout keys records by [`id_key`]: the id as 8 big-endian bytes with
//! the sign bit flipped, so byte order equals numeric order.

mod binary;
mod gob;
mod json;
mod reader;
mod tagged;

pub mod field;

pub use binary::BinaryCodec;
pub use gob::GobCodec;
pub use json::JsonCodec;
pub use tagged::TaggedCodec;

use crate::error::{LayoutError, Result};
use crate::record::Record;

/// Width of an encoded id key
pub const ID_KEY_LEN: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

/// Whole-record encode/decode pair
///
/// Implementors are stateless; a layout is selected by type.
pub trait RecordCodec: Send + Sync + 'static {
    /// Display name of the layout
    const NAME: &'static str;

    /// Root bucket holding this layout's records
    const BUCKET: &'static [u8];

    fn encode(record: &Record) -> Result<Vec<u8>>;

    fn decode(bytes: &[u8]) -> Result<Record>;
}

/// Order-preserving 8-byte key for a record id
pub fn id_key(id: i64) -> [u8; ID_KEY_LEN] {
    ((id as u64) ^ SIGN_BIT).to_be_bytes()
}

/// Inverse of [`id_key`]; reads the first 8 bytes of `key`
pub fn id_from_key(key: &[u8]) -> Result<i64> {
    let prefix: [u8; ID_KEY_LEN] = key
        .get(..ID_KEY_LEN)
        .and_then(|p| p.try_into().ok())
        .ok_or_else(|| {
            LayoutError::Decode(format!(
                "key of {} bytes is shorter than an id",
                key.len()
            ))
        })?;
    Ok((u64::from_be_bytes(prefix) ^ SIGN_BIT) as i64)
}
