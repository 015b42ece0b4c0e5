//! Patch Engine: interprets operation bytes against the tracked graph.
//!
//! The engine is a plain function over explicit state: a [`Reader`] cursor,
//! the current target refId (a local), a read-only registry and the mutable
//! [`Refs`]. It never garbage-collects and never notifies; the caller does
//! both once the whole buffer decoded successfully.

use schema_sync_buffers::{markers, Reader};
use tracing::{debug, trace, warn};

use crate::change::{ChangeField, DataChange, Operation};
use crate::collections::{Collection, CollectionKind, Key};
use crate::config::{DecoderConfig, UnknownFieldPolicy};
use crate::error::DecodeError;
use crate::refs::{Refs, Tracked};
use crate::schema::SchemaInstance;
use crate::types::{ElementKind, FieldKind, PrimitiveKind, TypeId, TypeRegistry};
use crate::value::{RefId, Value, ROOT_REF_ID};

/// Decodes operations from `reader` until the end of its buffer.
///
/// Returns the change list in wire order. On error the caller must roll
/// `refs` back; partial mutations are left in place.
pub fn decode_patch(
    reader: &mut Reader<'_>,
    registry: &TypeRegistry,
    refs: &mut Refs,
    config: &DecoderConfig,
) -> Result<Vec<DataChange>, DecodeError> {
    let mut engine = Engine {
        reader,
        registry,
        refs,
        config,
        changes: Vec::new(),
    };
    engine.run()?;
    Ok(engine.changes)
}

struct Engine<'r, 'a> {
    reader: &'r mut Reader<'a>,
    registry: &'r TypeRegistry,
    refs: &'r mut Refs,
    config: &'r DecoderConfig,
    changes: Vec<DataChange>,
}

/// The object an operation byte applies to.
enum Target {
    Schema(TypeId),
    Collection(CollectionKind, ElementKind),
}

impl<'r, 'a> Engine<'r, 'a> {
    fn run(&mut self) -> Result<(), DecodeError> {
        let mut ref_id = ROOT_REF_ID;
        while !self.reader.is_eof() {
            let byte = self.reader.u8()?;
            if byte == markers::SWITCH_TO_STRUCTURE {
                ref_id = self.read_ref_id()?;
                if !self.refs.contains(ref_id) {
                    return Err(DecodeError::DanglingReference {
                        ref_id,
                        index: None,
                    });
                }
                debug!(ref_id, "switch to structure");
                continue;
            }
            match self.target(ref_id)? {
                Target::Schema(type_id) => self.schema_op(ref_id, type_id, byte)?,
                Target::Collection(kind, element) => {
                    self.collection_op(ref_id, kind, element, byte)?
                }
            }
        }
        Ok(())
    }

    fn target(&self, ref_id: RefId) -> Result<Target, DecodeError> {
        match self.refs.get(ref_id) {
            Some(Tracked::Schema(s)) => Ok(Target::Schema(s.type_id())),
            Some(Tracked::Collection(c)) => Ok(Target::Collection(c.kind(), c.element_kind())),
            None => Err(DecodeError::DanglingReference {
                ref_id,
                index: None,
            }),
        }
    }

    // ── Schema targets ────────────────────────────────────────────────────

    fn schema_op(&mut self, ref_id: RefId, type_id: TypeId, byte: u8) -> Result<(), DecodeError> {
        let (op, index) = Operation::from_schema_byte(byte);
        let registry = self.registry;
        let ty = registry
            .describe(type_id)
            .ok_or_else(|| DecodeError::UnsupportedKind(format!("unregistered type {type_id}")))?;
        let Some(field) = ty.descriptor(index) else {
            warn!(ref_id, type_name = %ty.name, index, ?op, "unknown field");
            if self.config.unknown_fields == UnknownFieldPolicy::Reject {
                return Err(DecodeError::UnknownField {
                    type_name: ty.name.clone(),
                    index,
                });
            }
            self.resync();
            return Ok(());
        };
        let name = field.name.clone();
        let kind = field.kind;
        trace!(ref_id, field = %name, ?op, "schema op");

        let previous = self
            .refs
            .schema(ref_id)
            .map(|s| s.get(index).clone())
            .unwrap_or_default();

        let mut released = false;
        if op.has_delete() {
            if let Value::Ref(prev) = previous {
                self.refs.remove_ref(prev);
                released = true;
            }
        }

        let value = match (op, kind) {
            (Operation::Delete, _) => Value::Undefined,
            (_, FieldKind::Primitive(PrimitiveKind::Number)) => self.read_number(&previous)?,
            (_, FieldKind::Primitive(prim)) => self.read_primitive(prim)?,
            (_, FieldKind::Schema(declared)) => self.read_schema_child(op, declared)?,
            (_, FieldKind::Array(element)) => {
                self.read_collection_child(op, CollectionKind::Array, element, &previous)?
            }
            (_, FieldKind::Map(element)) => {
                self.read_collection_child(op, CollectionKind::Map, element, &previous)?
            }
        };

        self.refs.swap_refs(&previous, &value, released);
        if let Some(instance) = self.refs.schema_mut(ref_id) {
            instance.set(index, value.clone());
        }
        if previous != value {
            self.changes.push(DataChange {
                ref_id,
                op,
                field: Some(ChangeField::Field { index, name }),
                value,
                previous_value: previous,
            });
        }
        Ok(())
    }

    /// Skips to the next structure switch that names a tracked refId, or to
    /// the end of the buffer.
    fn resync(&mut self) {
        let start = self.reader.position();
        while let Some(byte) = self.reader.peek() {
            if byte == markers::SWITCH_TO_STRUCTURE {
                let mut lookahead = *self.reader;
                lookahead.x += 1;
                let known = lookahead
                    .number()
                    .ok()
                    .and_then(|n| n.as_u64())
                    .and_then(|n| RefId::try_from(n).ok())
                    .is_some_and(|id| self.refs.contains(id));
                if known {
                    break;
                }
            }
            self.reader.x += 1;
        }
        debug!(skipped = self.reader.position() - start, "resynced after unknown field");
    }

    // ── Collection targets ────────────────────────────────────────────────

    fn collection_op(
        &mut self,
        ref_id: RefId,
        kind: CollectionKind,
        element: ElementKind,
        byte: u8,
    ) -> Result<(), DecodeError> {
        let offset = self.reader.position() - 1;
        let op = Operation::from_collection_byte(byte).ok_or_else(|| DecodeError::Malformed {
            offset,
            reason: format!("unknown collection operation 0x{byte:02x}"),
        })?;
        if op == Operation::Clear {
            trace!(ref_id, "clear");
            self.refs.clear_collection(ref_id, &mut self.changes);
            return Ok(());
        }

        let position = self.read_u32("collection position")?;
        trace!(ref_id, position, ?op, "collection op");
        let (slot_key, previous) = match self.refs.collection(ref_id) {
            Some(c) => (
                c.key_at(position).cloned(),
                c.get_by_index(position).cloned().unwrap_or_default(),
            ),
            None => (None, Value::Undefined),
        };

        let mut released = false;
        if op.has_delete() {
            if let Value::Ref(prev) = previous {
                self.refs.remove_ref(prev);
                released = true;
            }
        }

        if op == Operation::Delete {
            let Some(key) = slot_key else {
                return Err(DecodeError::DanglingReference {
                    ref_id,
                    index: Some(position),
                });
            };
            if let Some(coll) = self.refs.collection_mut(ref_id) {
                coll.delete_by_index(position);
            }
            self.push_collection_change(ref_id, op, key, Value::Undefined, previous);
            return Ok(());
        }

        let key = if op.has_add() {
            match kind {
                CollectionKind::Map => Key::Name(self.read_string()?),
                CollectionKind::Array => Key::Index(position),
            }
        } else {
            slot_key.clone().ok_or(DecodeError::DanglingReference {
                ref_id,
                index: Some(position),
            })?
        };

        // An ADD that binds the position to a new key evicts the old key.
        if let Some(old_key) = slot_key.as_ref().filter(|k| **k != key) {
            if let Some(coll) = self.refs.collection_mut(ref_id) {
                coll.remove(old_key);
            }
            if !released {
                if let Value::Ref(prev) = previous {
                    self.refs.remove_ref(prev);
                }
            }
            self.push_collection_change(
                ref_id,
                Operation::Delete,
                old_key.clone(),
                Value::Undefined,
                previous.clone(),
            );
        }

        // The key may already hold a value under another position.
        let (displaced, displaced_released) = if slot_key.as_ref() == Some(&key) {
            (previous, released)
        } else {
            let held = self
                .refs
                .collection(ref_id)
                .and_then(|c| c.get(&key).cloned())
                .unwrap_or_default();
            (held, false)
        };

        let value = match element {
            ElementKind::Primitive(PrimitiveKind::Number) => self.read_number(&displaced)?,
            ElementKind::Primitive(prim) => self.read_primitive(prim)?,
            ElementKind::Schema(declared) => self.read_schema_child(op, declared)?,
        };

        self.refs.swap_refs(&displaced, &value, displaced_released);
        if let Some(coll) = self.refs.collection_mut(ref_id) {
            coll.set_by_index(position, key.clone(), value.clone());
        }
        if displaced != value {
            self.push_collection_change(ref_id, op, key, value, displaced);
        }
        Ok(())
    }

    fn push_collection_change(
        &mut self,
        ref_id: RefId,
        op: Operation,
        key: Key,
        value: Value,
        previous_value: Value,
    ) {
        self.changes.push(DataChange {
            ref_id,
            op,
            field: Some(ChangeField::Key(key)),
            value,
            previous_value,
        });
    }

    // ── Reference children ────────────────────────────────────────────────

    /// Reads a schema child's refId (plus optional type hint) and makes sure
    /// it is tracked. Reference counts are settled by the slot write.
    fn read_schema_child(&mut self, op: Operation, declared: TypeId) -> Result<Value, DecodeError> {
        let offset = self.reader.position();
        let child_id = self.read_ref_id()?;
        let concrete = if op != Operation::Replace {
            self.read_type_hint(declared)?
        } else {
            declared
        };
        match self.refs.get(child_id) {
            Some(Tracked::Schema(_)) => {}
            Some(Tracked::Collection(_)) => {
                return Err(DecodeError::Malformed {
                    offset,
                    reason: format!("refId {child_id} is a collection, expected a schema instance"),
                })
            }
            None if op == Operation::Replace => {
                return Err(DecodeError::DanglingReference {
                    ref_id: child_id,
                    index: None,
                })
            }
            None => {
                let registry = self.registry;
                let ty = registry.describe(concrete).ok_or_else(|| {
                    DecodeError::UnsupportedKind(format!("unregistered type {concrete}"))
                })?;
                self.track(child_id, Tracked::Schema(SchemaInstance::new(ty)))?;
                debug!(ref_id = child_id, type_name = %ty.name, "new schema instance");
            }
        }
        Ok(Value::Ref(child_id))
    }

    /// Reads a collection-typed field's refId, creating the collection on
    /// first sight. Re-pointing the field at a different collection records
    /// a DELETE for every item of the one being replaced.
    fn read_collection_child(
        &mut self,
        op: Operation,
        kind: CollectionKind,
        element: ElementKind,
        previous: &Value,
    ) -> Result<Value, DecodeError> {
        let offset = self.reader.position();
        let child_id = self.read_ref_id()?;
        match self.refs.get(child_id) {
            Some(Tracked::Collection(c)) if c.kind() == kind => {}
            Some(_) => {
                return Err(DecodeError::Malformed {
                    offset,
                    reason: format!("refId {child_id} is not a {kind:?} collection"),
                })
            }
            None if op == Operation::Replace => {
                return Err(DecodeError::DanglingReference {
                    ref_id: child_id,
                    index: None,
                })
            }
            None => {
                self.track(child_id, Tracked::Collection(Collection::new(kind, element)))?;
                debug!(ref_id = child_id, ?kind, "new collection");
            }
        }

        if let Value::Ref(prev_id) = *previous {
            if prev_id != child_id {
                if let Some(prev) = self.refs.collection(prev_id) {
                    let removed: Vec<DataChange> = prev
                        .iter()
                        .map(|(key, item)| DataChange {
                            ref_id: prev_id,
                            op: Operation::Delete,
                            field: Some(ChangeField::Key(key)),
                            value: Value::Undefined,
                            previous_value: item.clone(),
                        })
                        .collect();
                    self.changes.extend(removed);
                }
            }
        }
        Ok(Value::Ref(child_id))
    }

    fn track(&mut self, id: RefId, obj: Tracked) -> Result<(), DecodeError> {
        if self.refs.len() >= self.config.max_tracked_refs {
            return Err(DecodeError::LimitExceeded {
                limit: "max_tracked_refs",
                value: self.refs.len() + 1,
            });
        }
        self.refs.add(id, obj);
        Ok(())
    }

    fn read_type_hint(&mut self, declared: TypeId) -> Result<TypeId, DecodeError> {
        if self.reader.peek() != Some(markers::TYPE_ID) {
            return Ok(declared);
        }
        self.reader.u8()?;
        let id = self.read_u32("type id")?;
        if self.registry.describe(id).is_none() {
            return Err(DecodeError::UnsupportedKind(format!("unregistered type {id}")));
        }
        Ok(id)
    }

    // ── Primitives ────────────────────────────────────────────────────────

    fn read_primitive(&mut self, kind: PrimitiveKind) -> Result<Value, DecodeError> {
        let value = match kind {
            PrimitiveKind::String => Value::Str(self.read_string()?),
            PrimitiveKind::Number => Value::from(self.reader.number()?),
            PrimitiveKind::Boolean => Value::Bool(self.reader.boolean()?),
            PrimitiveKind::Int8 => Value::Int(self.reader.i8()? as i64),
            PrimitiveKind::UInt8 => Value::UInt(self.reader.u8()? as u64),
            PrimitiveKind::Int16 => Value::Int(self.reader.i16()? as i64),
            PrimitiveKind::UInt16 => Value::UInt(self.reader.u16()? as u64),
            PrimitiveKind::Int32 => Value::Int(self.reader.i32()? as i64),
            PrimitiveKind::UInt32 => Value::UInt(self.reader.u32()? as u64),
            PrimitiveKind::Int64 => Value::Int(self.reader.i64()?),
            PrimitiveKind::UInt64 => Value::UInt(self.reader.u64()?),
            PrimitiveKind::Float32 => Value::Float(self.reader.f32()? as f64),
            PrimitiveKind::Float64 => Value::Float(self.reader.f64()?),
        };
        Ok(value)
    }

    /// Reads a `number`, keeping `previous` when it holds the same number
    /// under another encoding.
    fn read_number(&mut self, previous: &Value) -> Result<Value, DecodeError> {
        let value = Value::from(self.reader.number()?);
        if previous.numerically_eq(&value) {
            return Ok(previous.clone());
        }
        Ok(value)
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let mut lookahead = *self.reader;
        let len = lookahead.string_len()?;
        if len > self.config.max_string_bytes {
            return Err(DecodeError::LimitExceeded {
                limit: "max_string_bytes",
                value: len,
            });
        }
        Ok(self.reader.string()?.to_owned())
    }

    fn read_u32(&mut self, what: &str) -> Result<u32, DecodeError> {
        let offset = self.reader.position();
        let n = self.reader.number()?;
        n.as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| DecodeError::Malformed {
                offset,
                reason: format!("invalid {what}: {n:?}"),
            })
    }

    fn read_ref_id(&mut self) -> Result<RefId, DecodeError> {
        self.read_u32("refId")
    }
}
