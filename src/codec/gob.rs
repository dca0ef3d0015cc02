//! Generic structured binary codec (GOB analog)
//!
//! Serializes through serde with `bincode`'s varint options, the same
//! serializer the WAL uses. Unlike gob there is no type descriptor in the
//! stream; field order comes from the `Record` definition.

use bincode::Options;

use crate::error::{LayoutError, Result};
use crate::record::Record;

use super::RecordCodec;

pub struct GobCodec;

impl GobCodec {
    fn options() -> impl Options {
        bincode::DefaultOptions::new().reject_trailing_bytes()
    }
}

impl RecordCodec for GobCodec {
    const NAME: &'static str = "GOB";
    const BUCKET: &'static [u8] = b"users_gob";

    fn encode(record: &Record) -> Result<Vec<u8>> {
        Self::options()
            .serialize(record)
            .map_err(|e| LayoutError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Record> {
        Self::options()
            .deserialize(bytes)
            .map_err(|e| LayoutError::Decode(e.to_string()))
    }
}
