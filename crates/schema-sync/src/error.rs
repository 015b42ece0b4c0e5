//! Error types for registry construction and patch decoding.

use schema_sync_buffers::BufferError;
use thiserror::Error;

use crate::types::TypeId;
use crate::value::RefId;

/// Failure while applying a handshake or a patch.
///
/// Every variant except a tolerated [`DecodeError::UnknownField`] aborts the
/// whole patch; the graph is rolled back and no listener fires.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer truncated at offset {offset}")]
    TruncatedBuffer { offset: usize },
    #[error("unknown field index {index} on type `{type_name}`")]
    UnknownField { type_name: String, index: u8 },
    #[error("dangling reference: refId {ref_id}{}", describe_slot(.index))]
    DanglingReference { ref_id: RefId, index: Option<u32> },
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),
    #[error("malformed value at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
    #[error("limit `{limit}` exceeded: {value}")]
    LimitExceeded { limit: &'static str, value: usize },
    #[error("no type registry: a handshake or static registry is required")]
    MissingSchema,
}

fn describe_slot(index: &Option<u32>) -> String {
    index
        .map(|i| format!(" has no slot at position {i}"))
        .unwrap_or_default()
}

impl From<BufferError> for DecodeError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer { offset } => DecodeError::TruncatedBuffer { offset },
            other => DecodeError::Malformed {
                offset: other.offset(),
                reason: other.to_string(),
            },
        }
    }
}

/// Failure while validating a [`crate::TypeRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry has no types")]
    Empty,
    #[error("duplicate type id {0}")]
    DuplicateType(TypeId),
    #[error("duplicate field index {index} on type `{type_name}`")]
    DuplicateFieldIndex { type_name: String, index: u8 },
    #[error("duplicate field name `{name}` on type `{type_name}`")]
    DuplicateFieldName { type_name: String, name: String },
    #[error("field index {index} on type `{type_name}` exceeds the wire limit")]
    FieldIndexOutOfRange { type_name: String, index: u8 },
    #[error("field `{field}` on type `{type_name}` references unknown type {child}")]
    UnknownChildType {
        type_name: String,
        field: String,
        child: TypeId,
    },
    #[error("unknown root type {0}")]
    UnknownRootType(TypeId),
}

impl From<RegistryError> for DecodeError {
    fn from(err: RegistryError) -> Self {
        DecodeError::UnsupportedKind(err.to_string())
    }
}
