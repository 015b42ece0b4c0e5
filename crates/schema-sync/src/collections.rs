//! Array-like and map-like containers behind one interface.
//!
//! Both variants are addressed positionally on the wire: every slot has a
//! dense numeric position that maps to its dynamic [`Key`] (the position
//! itself for arrays, a string for maps). The patch engine only talks to
//! [`Collection`]; the variant decides storage and iteration order.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use indexmap::IndexMap;

use crate::types::{ElementKind, ReferenceKind};
use crate::value::{RefId, Value};

/// Dynamic key of a collection slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Index(u32),
    Name(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(k) => f.write_str(k),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Array,
    Map,
}

impl From<CollectionKind> for ReferenceKind {
    fn from(kind: CollectionKind) -> Self {
        match kind {
            CollectionKind::Array => ReferenceKind::Array,
            CollectionKind::Map => ReferenceKind::Map,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Items {
    /// Sparse; iterated by ascending index.
    Array(BTreeMap<u32, Value>),
    /// Iterated in insertion order.
    Map(IndexMap<String, Value>),
}

/// A tracked container of child values.
///
/// `Clone` produces an independent snapshot; the tracker relies on it to
/// restore a collection when a patch aborts.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    element: ElementKind,
    items: Items,
    indexes: HashMap<u32, Key>,
}

impl Collection {
    pub fn new(kind: CollectionKind, element: ElementKind) -> Self {
        let items = match kind {
            CollectionKind::Array => Items::Array(BTreeMap::new()),
            CollectionKind::Map => Items::Map(IndexMap::new()),
        };
        Self {
            element,
            items,
            indexes: HashMap::new(),
        }
    }

    pub fn array(element: impl Into<ElementKind>) -> Self {
        Self::new(CollectionKind::Array, element.into())
    }

    pub fn map(element: impl Into<ElementKind>) -> Self {
        Self::new(CollectionKind::Map, element.into())
    }

    pub fn kind(&self) -> CollectionKind {
        match self.items {
            Items::Array(_) => CollectionKind::Array,
            Items::Map(_) => CollectionKind::Map,
        }
    }

    pub fn element_kind(&self) -> ElementKind {
        self.element
    }

    /// Whether children are nested schema instances (and therefore refs).
    pub fn has_schema_children(&self) -> bool {
        matches!(self.element, ElementKind::Schema(_))
    }

    pub fn count(&self) -> usize {
        match &self.items {
            Items::Array(a) => a.len(),
            Items::Map(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        match (&self.items, key) {
            (Items::Array(a), Key::Index(i)) => a.get(i),
            (Items::Map(m), Key::Name(k)) => m.get(k),
            _ => None,
        }
    }

    /// Stores `value` under `key`, returning what was there. A key of the
    /// wrong shape for this variant is ignored.
    pub fn set(&mut self, key: Key, value: Value) -> Option<Value> {
        match (&mut self.items, key) {
            (Items::Array(a), Key::Index(i)) => a.insert(i, value),
            (Items::Map(m), Key::Name(k)) => m.insert(k, value),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Removes the entry under `key` without touching positional mappings.
    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        match (&mut self.items, key) {
            (Items::Array(a), Key::Index(i)) => a.remove(i),
            (Items::Map(m), Key::Name(k)) => m.shift_remove(k),
            _ => None,
        }
    }

    // ── Positional addressing ─────────────────────────────────────────────

    /// The key currently bound to a wire position.
    pub fn key_at(&self, index: u32) -> Option<&Key> {
        self.indexes.get(&index)
    }

    pub fn set_index(&mut self, index: u32, key: Key) {
        self.indexes.insert(index, key);
    }

    pub fn get_by_index(&self, index: u32) -> Option<&Value> {
        self.get(self.key_at(index)?)
    }

    /// Binds `index` to `key` and stores `value` there. Any other position
    /// bound to `key` is unbound.
    pub fn set_by_index(&mut self, index: u32, key: Key, value: Value) -> Option<Value> {
        if self.contains_key(&key) {
            self.indexes.retain(|i, k| *i == index || *k != key);
        }
        self.set_index(index, key.clone());
        self.set(key, value)
    }

    /// Unbinds a position and removes its entry.
    pub fn delete_by_index(&mut self, index: u32) -> Option<(Key, Value)> {
        let key = self.indexes.remove(&index)?;
        let value = self.remove(&key)?;
        Some((key, value))
    }

    // ── Enumeration ───────────────────────────────────────────────────────

    pub fn iter(&self) -> impl Iterator<Item = (Key, &Value)> + '_ {
        let (array, map) = match &self.items {
            Items::Array(a) => (Some(a), None),
            Items::Map(m) => (None, Some(m)),
        };
        let array = array
            .into_iter()
            .flatten()
            .map(|(i, v)| (Key::Index(*i), v));
        let map = map
            .into_iter()
            .flatten()
            .map(|(k, v)| (Key::Name(k.clone()), v));
        array.chain(map)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// RefIds of every child currently held.
    pub fn child_refs(&self) -> impl Iterator<Item = RefId> + '_ {
        self.values().filter_map(Value::as_ref_id)
    }

    /// Empties the collection, returning evicted entries in iteration order.
    ///
    /// Reference bookkeeping for evicted children is the caller's job, see
    /// [`crate::Refs::clear_collection`].
    pub fn drain(&mut self) -> Vec<(Key, Value)> {
        self.indexes.clear();
        match &mut self.items {
            Items::Array(a) => std::mem::take(a)
                .into_iter()
                .map(|(i, v)| (Key::Index(i), v))
                .collect(),
            Items::Map(m) => m.drain(..).map(|(k, v)| (Key::Name(k), v)).collect(),
        }
    }
}
