//! Bounds-checked binary reader with cursor tracking.
//!
//! Fixed-width integers and floats are little-endian. Every read either
//! consumes exactly its width or fails without moving the cursor.

use std::str;

use crate::markers;
use crate::{BufferError, Number};

/// A binary reader over a byte slice.
///
/// # Example
///
/// ```
/// use schema_sync_buffers::Reader;
///
/// let data = [0x01, 0x02, 0x03];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.u8(), Ok(0x01));
/// assert_eq!(reader.u16(), Ok(0x0302));
/// assert!(reader.u8().is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader positioned at the start of `uint8`.
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Creates a reader positioned at `offset`.
    pub fn at(uint8: &'a [u8], offset: usize) -> Self {
        Self { uint8, x: offset }
    }

    pub fn position(&self) -> usize {
        self.x
    }

    pub fn len(&self) -> usize {
        self.uint8.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uint8.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.x >= self.uint8.len()
    }

    /// Returns the number of remaining bytes.
    pub fn remaining(&self) -> usize {
        self.uint8.len().saturating_sub(self.x)
    }

    /// Peeks at the current byte without advancing the cursor.
    pub fn peek(&self) -> Option<u8> {
        self.uint8.get(self.x).copied()
    }

    /// Peeks at the byte `n` positions ahead of the cursor.
    pub fn peek_at(&self, n: usize) -> Option<u8> {
        self.uint8.get(self.x.checked_add(n)?).copied()
    }

    #[inline]
    fn take<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        let start = self.x;
        let end = start
            .checked_add(N)
            .ok_or(BufferError::EndOfBuffer { offset: start })?;
        let bytes = self
            .uint8
            .get(start..end)
            .ok_or(BufferError::EndOfBuffer { offset: start })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.x = end;
        Ok(out)
    }

    /// Advances the cursor by `length` bytes.
    pub fn skip(&mut self, length: usize) -> Result<(), BufferError> {
        self.buf(length).map(|_| ())
    }

    /// Returns a subarray of the given size and advances the cursor.
    pub fn buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        let start = self.x;
        let end = start
            .checked_add(size)
            .ok_or(BufferError::EndOfBuffer { offset: start })?;
        let bin = self
            .uint8
            .get(start..end)
            .ok_or(BufferError::EndOfBuffer { offset: start })?;
        self.x = end;
        Ok(bin)
    }

    // ── Fixed-width readers ───────────────────────────────────────────────

    #[inline]
    pub fn u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.take::<1>()?[0])
    }

    #[inline]
    pub fn i8(&mut self) -> Result<i8, BufferError> {
        Ok(self.take::<1>()?[0] as i8)
    }

    #[inline]
    pub fn u16(&mut self) -> Result<u16, BufferError> {
        self.take().map(u16::from_le_bytes)
    }

    #[inline]
    pub fn i16(&mut self) -> Result<i16, BufferError> {
        self.take().map(i16::from_le_bytes)
    }

    #[inline]
    pub fn u32(&mut self) -> Result<u32, BufferError> {
        self.take().map(u32::from_le_bytes)
    }

    #[inline]
    pub fn i32(&mut self) -> Result<i32, BufferError> {
        self.take().map(i32::from_le_bytes)
    }

    #[inline]
    pub fn u64(&mut self) -> Result<u64, BufferError> {
        self.take().map(u64::from_le_bytes)
    }

    #[inline]
    pub fn i64(&mut self) -> Result<i64, BufferError> {
        self.take().map(i64::from_le_bytes)
    }

    #[inline]
    pub fn f32(&mut self) -> Result<f32, BufferError> {
        self.take().map(f32::from_le_bytes)
    }

    #[inline]
    pub fn f64(&mut self) -> Result<f64, BufferError> {
        self.take().map(f64::from_le_bytes)
    }

    /// Reads a one-byte boolean; any non-zero byte is `true`.
    pub fn boolean(&mut self) -> Result<bool, BufferError> {
        Ok(self.u8()? > 0)
    }

    // ── Compact readers ───────────────────────────────────────────────────

    /// Reads a compact `number`.
    ///
    /// On failure the cursor is restored to where the value started, so the
    /// caller can report a stable offset.
    pub fn number(&mut self) -> Result<Number, BufferError> {
        let start = self.x;
        let res = self.number_inner(start);
        if res.is_err() {
            self.x = start;
        }
        res
    }

    fn number_inner(&mut self, start: usize) -> Result<Number, BufferError> {
        let prefix = self.u8()?;
        let n = match prefix {
            0x00..=markers::POSITIVE_FIXINT_MAX => Number::UInt(prefix as u64),
            markers::NEGATIVE_FIXINT_MIN..=0xff => Number::Int(prefix as i8 as i64),
            markers::FLOAT32 => Number::Float(self.f32()? as f64),
            markers::FLOAT64 => Number::Float(self.f64()?),
            markers::UINT8 => Number::UInt(self.u8()? as u64),
            markers::UINT16 => Number::UInt(self.u16()? as u64),
            markers::UINT32 => Number::UInt(self.u32()? as u64),
            markers::UINT64 => Number::UInt(self.u64()?),
            markers::INT8 => Number::Int(self.i8()? as i64),
            markers::INT16 => Number::Int(self.i16()? as i64),
            markers::INT32 => Number::Int(self.i32()? as i64),
            markers::INT64 => Number::Int(self.i64()?),
            byte => {
                return Err(BufferError::InvalidMarker {
                    offset: start,
                    byte,
                })
            }
        };
        Ok(n)
    }

    /// Reads the length header of a compact string without reading its body.
    pub fn string_len(&mut self) -> Result<usize, BufferError> {
        let start = self.x;
        let prefix = self.u8()?;
        let len = match prefix {
            markers::FIXSTR_MIN..=markers::FIXSTR_MAX => (prefix & 0x1f) as usize,
            markers::STR8 => self.u8()? as usize,
            markers::STR16 => self.u16()? as usize,
            markers::STR32 => self.u32()? as usize,
            byte => {
                self.x = start;
                return Err(BufferError::InvalidMarker {
                    offset: start,
                    byte,
                });
            }
        };
        Ok(len)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn string(&mut self) -> Result<&'a str, BufferError> {
        let start = self.x;
        let len = self.string_len()?;
        let body = self.x;
        let bytes = match self.buf(len) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.x = start;
                return Err(err);
            }
        };
        str::from_utf8(bytes).map_err(|_| {
            self.x = start;
            BufferError::InvalidUtf8 { offset: body }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.u8(), Ok(0x01));
        assert_eq!(reader.u8(), Ok(0x02));
        assert_eq!(reader.u8(), Ok(0x03));
        assert_eq!(reader.u8(), Err(BufferError::EndOfBuffer { offset: 3 }));
    }

    #[test]
    fn test_u16_is_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.u16(), Ok(0x0201));
        assert_eq!(reader.u16(), Ok(0x0403));
    }

    #[test]
    fn test_u32_short_read_does_not_advance() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.u32(), Err(BufferError::EndOfBuffer { offset: 0 }));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_skip() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = Reader::new(&data);
        reader.skip(2).unwrap();
        assert_eq!(reader.u8(), Ok(0x03));
        assert!(reader.skip(5).is_err());
    }

    #[test]
    fn test_number_fixints() {
        let data = [0x2a, 0xff, 0xe0];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.number(), Ok(Number::UInt(42)));
        assert_eq!(reader.number(), Ok(Number::Int(-1)));
        assert_eq!(reader.number(), Ok(Number::Int(-32)));
    }

    #[test]
    fn test_number_truncated_restores_cursor() {
        let data = [0xcd, 0x01];
        let mut reader = Reader::new(&data);
        assert_eq!(
            reader.number(),
            Err(BufferError::EndOfBuffer { offset: 1 })
        );
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_number_rejects_string_marker() {
        let data = [0xa3];
        let mut reader = Reader::new(&data);
        assert_eq!(
            reader.number(),
            Err(BufferError::InvalidMarker {
                offset: 0,
                byte: 0xa3
            })
        );
    }

    #[test]
    fn test_fixstr() {
        let data = [0xa5, b'h', b'e', b'l', b'l', b'o'];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.string(), Ok("hello"));
        assert!(reader.is_eof());
    }

    #[test]
    fn test_string_invalid_utf8() {
        let data = [0xa2, 0xc3, 0x28];
        let mut reader = Reader::new(&data);
        assert_eq!(
            reader.string(),
            Err(BufferError::InvalidUtf8 { offset: 1 })
        );
        assert_eq!(reader.position(), 0);
    }
}
