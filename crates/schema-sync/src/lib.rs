//! Client-side decoder for schema-typed incremental state patches.
//!
//! A server serializes a typed object graph and then streams compact binary
//! patches describing what changed. This crate keeps a local mirror of that
//! graph:
//!
//! - [`TypeRegistry`] - per-type field tables, declared statically or learned
//!   from a handshake ([`decode_handshake`])
//! - [`Refs`] - arena of tracked objects with ref counts and a deferred
//!   mark-sweep collector
//! - [`Collection`] - array and map containers addressed positionally
//! - [`decode_patch`] - the operation state machine
//! - [`StateDecoder`] - root facade with atomic `apply_patch`, views and
//!   [`Listeners`]
//!
//! # Example
//!
//! ```
//! use schema_sync::{DecoderConfig, PrimitiveKind, SchemaType, StateDecoder, TypeRegistry, Value};
//!
//! let registry = TypeRegistry::builder()
//!     .register(SchemaType::new(0, "Player").field(0, "hp", PrimitiveKind::UInt8))
//!     .build()
//!     .unwrap();
//! let mut decoder = StateDecoder::new(registry, DecoderConfig::default());
//!
//! let changes = decoder.apply_patch(&[0xff, 0x00, 0x00, 0x2a], 0).unwrap();
//! assert_eq!(changes.len(), 1);
//! assert_eq!(decoder.field(0, "hp"), Some(&Value::UInt(42)));
//! ```

mod callbacks;
mod change;
mod collections;
mod config;
mod decoder;
mod error;
pub mod reflection;
mod refs;
mod schema;
mod state;
mod types;
mod value;
mod view;

pub use callbacks::{ChangeListener, ListenerId, Listeners};
pub use change::{ChangeField, DataChange, Operation};
pub use collections::{Collection, CollectionKind, Key};
pub use config::{DecoderConfig, UnknownFieldPolicy};
pub use decoder::decode_patch;
pub use error::{DecodeError, RegistryError};
pub use reflection::decode_handshake;
pub use refs::{Refs, Tracked};
pub use schema::SchemaInstance;
pub use state::StateDecoder;
pub use types::{
    ElementKind, FieldDescriptor, FieldKind, PrimitiveKind, ReferenceKind, SchemaType, TypeId,
    TypeRegistry, TypeRegistryBuilder, MAX_FIELDS,
};
pub use value::{RefId, Value, ROOT_REF_ID};
pub use view::{to_json, MAX_VIEW_DEPTH};

pub use schema_sync_buffers as buffers;
