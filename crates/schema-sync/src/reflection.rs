//! Handshake decoding.
//!
//! The server describes its type layout with the same patch encoding used for
//! state, against a small fixed set of reflection types. Decoding it is a
//! normal patch applied to a scratch graph, followed by a walk that turns the
//! scratch graph into a [`TypeRegistry`].

use schema_sync_buffers::Reader;
use tracing::debug;

use crate::collections::{Collection, Key};
use crate::config::DecoderConfig;
use crate::decoder::decode_patch;
use crate::error::{DecodeError, RegistryError};
use crate::refs::Refs;
use crate::schema::SchemaInstance;
use crate::types::{ElementKind, FieldKind, PrimitiveKind, SchemaType, TypeId, TypeRegistry};
use crate::value::{RefId, Value, ROOT_REF_ID};

pub const REFLECTION_TYPE: TypeId = 0;
pub const REFLECTION_TYPE_DESCRIPTION: TypeId = 1;
pub const REFLECTION_FIELD: TypeId = 2;

/// Registry the handshake itself is decoded against.
pub fn reflection_registry() -> Result<TypeRegistry, RegistryError> {
    TypeRegistry::builder()
        .register(
            SchemaType::new(REFLECTION_TYPE, "Reflection")
                .field(0, "types", FieldKind::Array(ElementKind::Schema(REFLECTION_TYPE_DESCRIPTION)))
                .field(1, "rootType", PrimitiveKind::Number),
        )
        .register(
            SchemaType::new(REFLECTION_TYPE_DESCRIPTION, "ReflectionType")
                .field(0, "id", PrimitiveKind::Number)
                .field(1, "fields", FieldKind::Array(ElementKind::Schema(REFLECTION_FIELD))),
        )
        .register(
            SchemaType::new(REFLECTION_FIELD, "ReflectionField")
                .field(0, "name", PrimitiveKind::String)
                .field(1, "type", PrimitiveKind::String)
                .field(2, "referencedType", PrimitiveKind::Number),
        )
        .root(REFLECTION_TYPE)
        .build()
}

/// Decodes a handshake buffer starting at `offset` into the type registry it
/// describes.
pub fn decode_handshake(
    bytes: &[u8],
    offset: usize,
    config: &DecoderConfig,
) -> Result<TypeRegistry, DecodeError> {
    let reflection = reflection_registry()?;
    let mut refs = Refs::with_root(SchemaInstance::new(reflection.root_type()));
    let mut reader = Reader::at(bytes, offset);
    decode_patch(&mut reader, &reflection, &mut refs, config)?;

    let root = refs.schema(ROOT_REF_ID).ok_or(DecodeError::MissingSchema)?;
    let root_type = number_field(root.get(1), "rootType")?;
    let types = match root.get(0) {
        Value::Ref(id) => collection(&refs, *id)?,
        _ => return Err(DecodeError::MissingSchema),
    };

    let mut builder = TypeRegistry::builder().root(root_type);
    for entry in types.values() {
        let ty = schema(&refs, entry)?;
        let id = number_field(ty.get(0), "id")?;
        let mut schema_type = SchemaType::new(id, format!("Type{id}"));
        if let Value::Ref(fields_id) = ty.get(1) {
            for (position, field_ref) in collection(&refs, *fields_id)?.iter() {
                let field = schema(&refs, field_ref)?;
                let index = match &position {
                    Key::Index(i) => u8::try_from(*i).ok(),
                    Key::Name(_) => None,
                }
                .ok_or_else(|| {
                    DecodeError::UnsupportedKind(format!("field position {position} on type {id}"))
                })?;
                let name = field.get(0).as_str().unwrap_or_default().to_owned();
                let kind = parse_field_kind(
                    field.get(1).as_str().unwrap_or_default(),
                    field.get(2).as_u64().and_then(|n| TypeId::try_from(n).ok()),
                )?;
                schema_type = schema_type.field(index, name, kind);
            }
        }
        builder = builder.register(schema_type);
    }
    let registry = builder.build()?;
    debug!(types = registry.len(), root = registry.root(), "handshake decoded");
    Ok(registry)
}

/// Maps a reflection type string onto a field kind.
pub fn parse_field_kind(kind: &str, referenced: Option<TypeId>) -> Result<FieldKind, DecodeError> {
    let child = || {
        referenced
            .map(ElementKind::Schema)
            .ok_or_else(|| DecodeError::UnsupportedKind(format!("`{kind}` without referenced type")))
    };
    let primitive = |name: &str| {
        PrimitiveKind::from_name(name)
            .map(ElementKind::Primitive)
            .ok_or_else(|| DecodeError::UnsupportedKind(name.to_owned()))
    };
    match kind {
        "ref" => Ok(FieldKind::Schema(referenced.ok_or_else(|| {
            DecodeError::UnsupportedKind("`ref` without referenced type".to_owned())
        })?)),
        "array" => Ok(FieldKind::Array(child()?)),
        "map" => Ok(FieldKind::Map(child()?)),
        _ => {
            if let Some(element) = kind.strip_prefix("array:") {
                Ok(FieldKind::Array(primitive(element)?))
            } else if let Some(element) = kind.strip_prefix("map:") {
                Ok(FieldKind::Map(primitive(element)?))
            } else {
                PrimitiveKind::from_name(kind)
                    .map(FieldKind::Primitive)
                    .ok_or_else(|| DecodeError::UnsupportedKind(kind.to_owned()))
            }
        }
    }
}

fn number_field(value: &Value, name: &str) -> Result<TypeId, DecodeError> {
    value
        .as_u64()
        .and_then(|n| TypeId::try_from(n).ok())
        .ok_or_else(|| DecodeError::UnsupportedKind(format!("`{name}` is not a type id: {value:?}")))
}

fn collection(refs: &Refs, id: RefId) -> Result<&Collection, DecodeError> {
    refs.collection(id).ok_or(DecodeError::DanglingReference { ref_id: id, index: None })
}

fn schema<'a>(refs: &'a Refs, value: &Value) -> Result<&'a SchemaInstance, DecodeError> {
    let id = value.as_ref_id().ok_or(DecodeError::MissingSchema)?;
    refs.schema(id).ok_or(DecodeError::DanglingReference { ref_id: id, index: None })
}
