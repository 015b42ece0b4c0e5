//! Auto-growing writer producing the compact wire encoding.
//!
//! The decoder never needs this; it exists so fixtures, replays and tests can
//! be expressed as values instead of hand-counted byte arrays.

use crate::markers;

/// Writes binary data to an auto-growing buffer.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    uint8: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the written bytes and resets the writer.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.uint8)
    }

    pub fn len(&self) -> usize {
        self.uint8.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uint8.is_empty()
    }

    pub fn buf(&mut self, data: &[u8]) {
        self.uint8.extend_from_slice(data);
    }

    pub fn u8(&mut self, v: u8) {
        self.uint8.push(v);
    }

    pub fn i8(&mut self, v: i8) {
        self.uint8.push(v as u8);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf(&v.to_le_bytes());
    }

    pub fn i16(&mut self, v: i16) {
        self.buf(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf(&v.to_le_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.buf(&v.to_le_bytes());
    }

    pub fn f32(&mut self, v: f32) {
        self.buf(&v.to_le_bytes());
    }

    pub fn f64(&mut self, v: f64) {
        self.buf(&v.to_le_bytes());
    }

    pub fn boolean(&mut self, v: bool) {
        self.u8(v as u8);
    }

    /// Writes a non-negative integer using the narrowest compact form.
    pub fn number_u64(&mut self, v: u64) {
        if v <= markers::POSITIVE_FIXINT_MAX as u64 {
            self.u8(v as u8);
        } else if v <= u8::MAX as u64 {
            self.u8(markers::UINT8);
            self.u8(v as u8);
        } else if v <= u16::MAX as u64 {
            self.u8(markers::UINT16);
            self.u16(v as u16);
        } else if v <= u32::MAX as u64 {
            self.u8(markers::UINT32);
            self.u32(v as u32);
        } else {
            self.u8(markers::UINT64);
            self.u64(v);
        }
    }

    /// Writes a signed integer using the narrowest compact form.
    pub fn number_i64(&mut self, v: i64) {
        if v >= 0 {
            self.number_u64(v as u64);
        } else if v >= -32 {
            self.u8(v as i8 as u8);
        } else if v >= i8::MIN as i64 {
            self.u8(markers::INT8);
            self.i8(v as i8);
        } else if v >= i16::MIN as i64 {
            self.u8(markers::INT16);
            self.i16(v as i16);
        } else if v >= i32::MIN as i64 {
            self.u8(markers::INT32);
            self.i32(v as i32);
        } else {
            self.u8(markers::INT64);
            self.i64(v);
        }
    }

    pub fn number_f64(&mut self, v: f64) {
        self.u8(markers::FLOAT64);
        self.f64(v);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn string(&mut self, s: &str) {
        let len = s.len();
        if len <= markers::FIXSTR_MAX_LEN {
            self.u8(markers::FIXSTR_MIN | len as u8);
        } else if len <= u8::MAX as usize {
            self.u8(markers::STR8);
            self.u8(len as u8);
        } else if len <= u16::MAX as usize {
            self.u8(markers::STR16);
            self.u16(len as u16);
        } else {
            self.u8(markers::STR32);
            self.u32(len as u32);
        }
        self.buf(s.as_bytes());
    }
}
