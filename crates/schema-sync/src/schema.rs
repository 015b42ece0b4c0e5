//! Schema instances: typed, index-addressed field slots.

use crate::types::{SchemaType, TypeId};
use crate::value::{RefId, Value};

/// A live instance of a registered [`SchemaType`].
///
/// Field values are stored by wire index. Reference-kind fields hold
/// [`Value::Ref`] back-references, never the child itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaInstance {
    type_id: TypeId,
    slots: Vec<Value>,
}

impl SchemaInstance {
    /// Creates an instance with every field at its kind's initial value.
    pub fn new(ty: &SchemaType) -> Self {
        Self {
            type_id: ty.id,
            slots: ty.default_slots(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Value at `index`; unknown indices read as [`Value::Undefined`].
    pub fn get(&self, index: u8) -> &Value {
        static UNDEFINED: Value = Value::Undefined;
        self.slots.get(index as usize).unwrap_or(&UNDEFINED)
    }

    /// Stores `value` at `index`, returning the previous value.
    pub fn set(&mut self, index: u8, value: Value) -> Value {
        let index = index as usize;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, Value::Undefined);
        }
        std::mem::replace(&mut self.slots[index], value)
    }

    /// Looks a field up by name through its type's descriptor table.
    pub fn get_by_name<'a>(&'a self, ty: &SchemaType, name: &str) -> Option<&'a Value> {
        if ty.id != self.type_id {
            return None;
        }
        Some(self.get(ty.descriptor_by_name(name)?.index))
    }

    pub fn values(&self) -> impl Iterator<Item = (u8, &Value)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, v)| (i as u8, v))
    }

    pub fn child_refs(&self) -> impl Iterator<Item = RefId> + '_ {
        self.slots.iter().filter_map(Value::as_ref_id)
    }
}
