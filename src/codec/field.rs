//! Per-field value codec
//!
//! Payload rules for the layouts that store every field under its own key:
//!
//! | kind            | payload                                   |
//! |-----------------|-------------------------------------------|
//! | int64, int32    | decimal text (`"-42"`)                    |
//! | string          | raw UTF-8 bytes                           |
//! | bool            | `"true"` / `"false"`                      |
//! | float32         | 4-byte little-endian IEEE-754 bit pattern |
//! | float64         | 8-byte little-endian IEEE-754 bit pattern |

use crate::error::{LayoutError, Result};
use crate::record::{Field, FieldKind, FieldValue, Record, RecordBuilder};

/// Encode one value
pub fn encode_value(value: &FieldValue) -> Vec<u8> {
    match value {
        FieldValue::Int64(v) => v.to_string().into_bytes(),
        FieldValue::Int32(v) => v.to_string().into_bytes(),
        FieldValue::Float32(v) => v.to_le_bytes().to_vec(),
        FieldValue::Float64(v) => v.to_le_bytes().to_vec(),
        FieldValue::Bool(true) => b"true".to_vec(),
        FieldValue::Bool(false) => b"false".to_vec(),
        FieldValue::Text(v) => v.as_bytes().to_vec(),
    }
}

/// Decode one payload as the declared type of `field`
pub fn decode_value(field: Field, bytes: &[u8]) -> Result<FieldValue> {
    let bad = |detail: String| LayoutError::Decode(format!("field {}: {}", field, detail));

    match field.kind() {
        FieldKind::Int64 => parse_text(bytes)
            .and_then(|s| s.parse::<i64>().map_err(|e| e.to_string()))
            .map(FieldValue::Int64)
            .map_err(bad),
        FieldKind::Int32 => parse_text(bytes)
            .and_then(|s| s.parse::<i32>().map_err(|e| e.to_string()))
            .map(FieldValue::Int32)
            .map_err(bad),
        FieldKind::Float32 => <[u8; 4]>::try_from(bytes)
            .map(|b| FieldValue::Float32(f32::from_le_bytes(b)))
            .map_err(|_| bad(format!("expected 4 bytes, got {}", bytes.len()))),
        FieldKind::Float64 => <[u8; 8]>::try_from(bytes)
            .map(|b| FieldValue::Float64(f64::from_le_bytes(b)))
            .map_err(|_| bad(format!("expected 8 bytes, got {}", bytes.len()))),
        FieldKind::Bool => match bytes {
            b"true" => Ok(FieldValue::Bool(true)),
            b"false" => Ok(FieldValue::Bool(false)),
            _ => Err(bad(format!("invalid bool {:?}", String::from_utf8_lossy(bytes)))),
        },
        FieldKind::Text => String::from_utf8(bytes.to_vec())
            .map(FieldValue::Text)
            .map_err(|e| bad(e.to_string())),
    }
}

/// Decode a payload straight to `f64`, for aggregates over numeric fields
pub fn decode_numeric(field: Field, bytes: &[u8]) -> Result<f64> {
    decode_value(field, bytes)?.as_f64().ok_or_else(|| {
        LayoutError::Decode(format!("field {} is not numeric", field))
    })
}

fn parse_text(bytes: &[u8]) -> std::result::Result<&str, String> {
    std::str::from_utf8(bytes).map_err(|e| e.to_string())
}

/// Resolve a stored field-name key
pub fn field_from_key(name: &[u8]) -> Result<Field> {
    std::str::from_utf8(name)
        .ok()
        .and_then(Field::from_name)
        .ok_or_else(|| {
            LayoutError::Decode(format!(
                "unknown field key {:?}",
                String::from_utf8_lossy(name)
            ))
        })
}

/// Every `(field name, payload)` pair of a record, in declaration order
pub fn record_entries(record: &Record) -> impl Iterator<Item = (&'static str, Vec<u8>)> + '_ {
    Field::ALL
        .into_iter()
        .map(move |field| (field.name(), encode_value(&record.get(field))))
}

/// Decode one `(field-name key, payload)` entry into a builder
pub fn apply_entry(builder: &mut RecordBuilder, name: &[u8], payload: &[u8]) -> Result<()> {
    let field = field_from_key(name)?;
    builder.set(field, decode_value(field, payload)?)
}
