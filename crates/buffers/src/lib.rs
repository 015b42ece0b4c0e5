//! Byte cursor primitives for the schema-sync wire format.
//!
//! Every patch and handshake buffer is a flat byte sequence of operation
//! bytes interleaved with compact, MessagePack-compatible values. This crate
//! owns the value layer only:
//!
//! - [`Reader`] - bounds-checked cursor that decodes primitives and advances
//! - [`Writer`] - the inverse encoder, used to build fixtures and replays
//! - [`markers`] - wire sentinels and value prefix markers
//!
//! # Example
//!
//! ```
//! use schema_sync_buffers::{Reader, Writer};
//!
//! let mut writer = Writer::new();
//! writer.number_u64(300);
//! writer.string("hello");
//! let data = writer.flush();
//!
//! let mut reader = Reader::new(&data);
//! assert_eq!(reader.number().unwrap().as_u64(), Some(300));
//! assert_eq!(reader.string().unwrap(), "hello");
//! assert!(reader.is_eof());
//! ```

pub mod markers;
mod number;
mod reader;
mod writer;

pub use number::Number;
pub use reader::Reader;
pub use writer::Writer;

/// Error type for buffer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Attempted to read past the end of the buffer.
    EndOfBuffer { offset: usize },
    /// Invalid UTF-8 sequence inside a string payload.
    InvalidUtf8 { offset: usize },
    /// A value prefix byte that the requested reader does not accept.
    InvalidMarker { offset: usize, byte: u8 },
}

impl BufferError {
    /// Offset at which the failing read started.
    pub fn offset(&self) -> usize {
        match self {
            BufferError::EndOfBuffer { offset }
            | BufferError::InvalidUtf8 { offset }
            | BufferError::InvalidMarker { offset, .. } => *offset,
        }
    }
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::EndOfBuffer { offset } => write!(f, "end of buffer at offset {offset}"),
            BufferError::InvalidUtf8 { offset } => {
                write!(f, "invalid UTF-8 sequence at offset {offset}")
            }
            BufferError::InvalidMarker { offset, byte } => {
                write!(f, "invalid value marker 0x{byte:02x} at offset {offset}")
            }
        }
    }
}

impl std::error::Error for BufferError {}
