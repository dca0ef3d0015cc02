//! Bounds-checked little-endian reader shared by the hand-written codecs

use crate::error::{LayoutError, Result};

pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                LayoutError::Decode(format!(
                    "truncated {}: need {} bytes at offset {}, have {}",
                    what,
                    len,
                    self.pos,
                    self.buf.len() - self.pos
                ))
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    pub(crate) fn i32(&mut self, what: &str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array(what)?))
    }

    pub(crate) fn i64(&mut self, what: &str) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array(what)?))
    }

    pub(crate) fn f32(&mut self, what: &str) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array(what)?))
    }

    pub(crate) fn f64(&mut self, what: &str) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array(what)?))
    }

    pub(crate) fn bool(&mut self, what: &str) -> Result<bool> {
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(LayoutError::Decode(format!(
                "invalid bool byte 0x{:02x} for {}",
                other, what
            ))),
        }
    }

    /// Length-prefixed (LE i32) UTF-8 string
    pub(crate) fn string(&mut self, what: &str) -> Result<String> {
        let len = self.i32(what)?;
        let len = usize::try_from(len)
            .map_err(|_| LayoutError::Decode(format!("negative length {} for {}", len, what)))?;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| LayoutError::Decode(format!("invalid UTF-8 in {}: {}", what, e)))
    }

    /// Fails if any bytes remain unread
    pub(crate) fn finish(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(LayoutError::Decode(format!(
                "{} trailing bytes after record",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

/// Append a length-prefixed (LE i32) string
pub(crate) fn put_string(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = i32::try_from(s.len())
        .map_err(|_| LayoutError::Serialization(format!("string of {} bytes too long", s.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}
