//! JSON codec: the record as an object keyed by field name

use crate::error::{LayoutError, Result};
use crate::record::Record;

use super::RecordCodec;

pub struct JsonCodec;

impl RecordCodec for JsonCodec {
    const NAME: &'static str = "JSON";
    const BUCKET: &'static [u8] = b"users_json";

    fn encode(record: &Record) -> Result<Vec<u8>> {
        serde_json::to_vec(record).map_err(|e| LayoutError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Record> {
        serde_json::from_slice(bytes).map_err(|e| LayoutError::Decode(e.to_string()))
    }
}
