//! Self-describing tagged binary codec (Binary+Names)
//!
//! ## Format
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────────┐
//! │ field_count: i32 │ field × field_count                              │
//! └──────────────────┴──────────────────────────────────────────────────┘
//!
//! field: [name_len: i32][name][tag: u8][payload]
//! ```
//!
//! | tag | type    | payload                    |
//! |-----|---------|----------------------------|
//! | 1   | int64   | 8 bytes LE                 |
//! | 2   | string  | [len: i32][utf-8]          |
//! | 3   | int32   | 4 bytes LE                 |
//! | 4   | float32 | 4 bytes LE                 |
//! | 5   | float64 | 8 bytes LE                 |
//! | 6   | bool    | 1 byte (0 or 1)            |
//!
//! Decoding parses the payload by tag, then routes the value through the
//! `Field` name table. The value's tag must agree with the field's type.

use crate::error::{LayoutError, Result};
use crate::record::{Field, FieldKind, FieldValue, Record, RecordBuilder};

use super::reader::{put_string, ByteReader};
use super::RecordCodec;

const TAG_INT64: u8 = 1;
const TAG_STRING: u8 = 2;
const TAG_INT32: u8 = 3;
const TAG_FLOAT32: u8 = 4;
const TAG_FLOAT64: u8 = 5;
const TAG_BOOL: u8 = 6;

fn tag_of(kind: FieldKind) -> u8 {
    match kind {
        FieldKind::Int64 => TAG_INT64,
        FieldKind::Text => TAG_STRING,
        FieldKind::Int32 => TAG_INT32,
        FieldKind::Float32 => TAG_FLOAT32,
        FieldKind::Float64 => TAG_FLOAT64,
        FieldKind::Bool => TAG_BOOL,
    }
}

pub struct TaggedCodec;

impl TaggedCodec {
    fn put_value(buf: &mut Vec<u8>, value: &FieldValue) -> Result<()> {
        buf.push(tag_of(value.kind()));
        match value {
            FieldValue::Int64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Int32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Float32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Float64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Bool(v) => buf.push(*v as u8),
            FieldValue::Text(v) => put_string(buf, v)?,
        }
        Ok(())
    }

    fn read_value(r: &mut ByteReader<'_>, name: &str) -> Result<FieldValue> {
        let tag = r.u8(name)?;
        Ok(match tag {
            TAG_INT64 => FieldValue::Int64(r.i64(name)?),
            TAG_STRING => FieldValue::Text(r.string(name)?),
            TAG_INT32 => FieldValue::Int32(r.i32(name)?),
            TAG_FLOAT32 => FieldValue::Float32(r.f32(name)?),
            TAG_FLOAT64 => FieldValue::Float64(r.f64(name)?),
            TAG_BOOL => FieldValue::Bool(r.bool(name)?),
            other => {
                return Err(LayoutError::Decode(format!(
                    "unknown type tag {} for field {}",
                    other, name
                )))
            }
        })
    }
}

impl RecordCodec for TaggedCodec {
    const NAME: &'static str = "Binary+Names";
    const BUCKET: &'static [u8] = b"users_binary_names";

    fn encode(record: &Record) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(256 + record.description.len());
        buf.extend_from_slice(&(Field::ALL.len() as i32).to_le_bytes());

        for field in Field::ALL {
            put_string(&mut buf, field.name())?;
            Self::put_value(&mut buf, &record.get(field))?;
        }

        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> Result<Record> {
        let mut r = ByteReader::new(bytes);

        let count = r.i32("field count")?;
        if count < 0 {
            return Err(LayoutError::Decode(format!("negative field count {}", count)));
        }

        let mut builder = RecordBuilder::new();
        for _ in 0..count {
            let name = r.string("field name")?;
            let value = Self::read_value(&mut r, &name)?;
            let field = Field::from_name(&name)
                .ok_or_else(|| LayoutError::Decode(format!("unknown field name {:?}", name)))?;
            builder.set(field, value)?;
        }

        r.finish()?;
        builder.build()
    }
}
