//! Single-blob positional binary codec
//!
//! ## Format
//! ```text
//! id (i64)
//! username, email, first_name, last_name, description   [len: i32][utf-8]
//! age (i32) height (f32) weight (f32) balance (f64) is_active (u8)
//! created_at (i64) updated_at (i64) login_count (i32) score (f64)
//! ```
//! All integers and floats little-endian. Not self-describing: the decoder
//! replays the same order, so any schema change invalidates stored data.

use crate::error::Result;
use crate::record::Record;

use super::reader::{put_string, ByteReader};
use super::RecordCodec;

/// Fixed-width portion of an encoded record
const FIXED_SIZE: usize = 8 + 4 + 4 + 4 + 8 + 1 + 8 + 8 + 4 + 8 + 5 * 4;

pub struct BinaryCodec;

impl RecordCodec for BinaryCodec {
    const NAME: &'static str = "Binary";
    const BUCKET: &'static [u8] = b"users_binary";

    fn encode(record: &Record) -> Result<Vec<u8>> {
        let text_len = record.username.len()
            + record.email.len()
            + record.first_name.len()
            + record.last_name.len()
            + record.description.len();
        let mut buf = Vec::with_capacity(FIXED_SIZE + text_len);

        buf.extend_from_slice(&record.id.to_le_bytes());

        put_string(&mut buf, &record.username)?;
        put_string(&mut buf, &record.email)?;
        put_string(&mut buf, &record.first_name)?;
        put_string(&mut buf, &record.last_name)?;
        put_string(&mut buf, &record.description)?;

        buf.extend_from_slice(&record.age.to_le_bytes());
        buf.extend_from_slice(&record.height.to_le_bytes());
        buf.extend_from_slice(&record.weight.to_le_bytes());
        buf.extend_from_slice(&record.balance.to_le_bytes());
        buf.push(record.is_active as u8);
        buf.extend_from_slice(&record.created_at.to_le_bytes());
        buf.extend_from_slice(&record.updated_at.to_le_bytes());
        buf.extend_from_slice(&record.login_count.to_le_bytes());
        buf.extend_from_slice(&record.score.to_le_bytes());

        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> Result<Record> {
        let mut r = ByteReader::new(bytes);

        let record = Record {
            id: r.i64("id")?,
            username: r.string("username")?,
            email: r.string("email")?,
            first_name: r.string("first_name")?,
            last_name: r.string("last_name")?,
            description: r.string("description")?,
            age: r.i32("age")?,
            height: r.f32("height")?,
            weight: r.f32("weight")?,
            balance: r.f64("balance")?,
            is_active: r.bool("is_active")?,
            created_at: r.i64("created_at")?,
            updated_at: r.i64("updated_at")?,
            login_count: r.i32("login_count")?,
            score: r.f64("score")?,
        };

        r.finish()?;
        Ok(record)
    }
}
