//! Type Registry: statically declared field tables per schema type.
//!
//! A [`SchemaType`] maps stable wire field indices to a name and a declared
//! [`FieldKind`]. Registries are validated once by
//! [`TypeRegistryBuilder::build`] and are read-only afterwards, so one
//! `Arc<TypeRegistry>` can back any number of decoders.

use std::collections::HashMap;

use crate::error::RegistryError;
use crate::value::Value;

/// Numeric handle of a registered schema type.
pub type TypeId = u32;

/// Schema field indices share an operation byte with two op bits.
pub const MAX_FIELDS: usize = 64;

// ── Kinds ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 13] = [
        PrimitiveKind::String,
        PrimitiveKind::Number,
        PrimitiveKind::Boolean,
        PrimitiveKind::Int8,
        PrimitiveKind::UInt8,
        PrimitiveKind::Int16,
        PrimitiveKind::UInt16,
        PrimitiveKind::Int32,
        PrimitiveKind::UInt32,
        PrimitiveKind::Int64,
        PrimitiveKind::UInt64,
        PrimitiveKind::Float32,
        PrimitiveKind::Float64,
    ];

    /// Wire name, as used by handshake type strings.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Int8 => "int8",
            PrimitiveKind::UInt8 => "uint8",
            PrimitiveKind::Int16 => "int16",
            PrimitiveKind::UInt16 => "uint16",
            PrimitiveKind::Int32 => "int32",
            PrimitiveKind::UInt32 => "uint32",
            PrimitiveKind::Int64 => "int64",
            PrimitiveKind::UInt64 => "uint64",
            PrimitiveKind::Float32 => "float32",
            PrimitiveKind::Float64 => "float64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Initial value of a field of this kind on a fresh instance.
    pub fn default_value(self) -> Value {
        match self {
            PrimitiveKind::String => Value::Str(String::new()),
            PrimitiveKind::Boolean => Value::Bool(false),
            PrimitiveKind::Int8
            | PrimitiveKind::Int16
            | PrimitiveKind::Int32
            | PrimitiveKind::Int64 => Value::Int(0),
            PrimitiveKind::UInt8
            | PrimitiveKind::UInt16
            | PrimitiveKind::UInt32
            | PrimitiveKind::UInt64 => Value::UInt(0),
            PrimitiveKind::Number | PrimitiveKind::Float32 | PrimitiveKind::Float64 => {
                Value::Float(0.0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Nested schema instance.
    Single,
    Array,
    Map,
}

/// What a collection holds, or what a single reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Primitive(PrimitiveKind),
    Schema(TypeId),
}

impl From<PrimitiveKind> for ElementKind {
    fn from(kind: PrimitiveKind) -> Self {
        ElementKind::Primitive(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Primitive(PrimitiveKind),
    Schema(TypeId),
    Array(ElementKind),
    Map(ElementKind),
}

impl FieldKind {
    pub fn reference_kind(&self) -> Option<ReferenceKind> {
        match self {
            FieldKind::Primitive(_) => None,
            FieldKind::Schema(_) => Some(ReferenceKind::Single),
            FieldKind::Array(_) => Some(ReferenceKind::Array),
            FieldKind::Map(_) => Some(ReferenceKind::Map),
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference_kind().is_some()
    }

    /// The child handle: the nested type, or a collection's element kind.
    pub fn child(&self) -> Option<ElementKind> {
        match self {
            FieldKind::Primitive(_) => None,
            FieldKind::Schema(id) => Some(ElementKind::Schema(*id)),
            FieldKind::Array(el) | FieldKind::Map(el) => Some(*el),
        }
    }

    fn default_value(&self) -> Value {
        match self {
            FieldKind::Primitive(kind) => kind.default_value(),
            _ => Value::Undefined,
        }
    }
}

impl From<PrimitiveKind> for FieldKind {
    fn from(kind: PrimitiveKind) -> Self {
        FieldKind::Primitive(kind)
    }
}

// ── Descriptors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub index: u8,
    pub name: String,
    pub kind: FieldKind,
}

/// Field table of one schema type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaType {
    pub id: TypeId,
    pub name: String,
    fields: Vec<FieldDescriptor>,
    by_index: Vec<Option<usize>>,
    by_name: HashMap<String, usize>,
}

impl SchemaType {
    pub fn new(id: TypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            fields: Vec::new(),
            by_index: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Declares a field. Duplicates are reported by [`TypeRegistryBuilder::build`].
    pub fn field(mut self, index: u8, name: impl Into<String>, kind: impl Into<FieldKind>) -> Self {
        self.fields.push(FieldDescriptor {
            index,
            name: name.into(),
            kind: kind.into(),
        });
        self
    }

    fn seal(&mut self) -> Result<(), RegistryError> {
        self.fields.sort_by_key(|f| f.index);
        self.by_index = vec![None; self.fields.last().map_or(0, |f| f.index as usize + 1)];
        self.by_name.clear();
        for (pos, field) in self.fields.iter().enumerate() {
            if field.index as usize >= MAX_FIELDS {
                return Err(RegistryError::FieldIndexOutOfRange {
                    type_name: self.name.clone(),
                    index: field.index,
                });
            }
            let slot = &mut self.by_index[field.index as usize];
            if slot.is_some() {
                return Err(RegistryError::DuplicateFieldIndex {
                    type_name: self.name.clone(),
                    index: field.index,
                });
            }
            *slot = Some(pos);
            if self.by_name.insert(field.name.clone(), pos).is_some() {
                return Err(RegistryError::DuplicateFieldName {
                    type_name: self.name.clone(),
                    name: field.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Descriptor for a wire index; `None` is the `UnknownField` condition.
    pub fn descriptor(&self, index: u8) -> Option<&FieldDescriptor> {
        let pos = (*self.by_index.get(index as usize)?)?;
        self.fields.get(pos)
    }

    pub fn descriptor_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(*self.by_name.get(name)?)
    }

    /// Fields in ascending index order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Number of value slots an instance needs (highest index + 1).
    pub fn slot_count(&self) -> usize {
        self.by_index.len()
    }

    pub(crate) fn default_slots(&self) -> Vec<Value> {
        let mut slots = vec![Value::Undefined; self.slot_count()];
        for field in &self.fields {
            slots[field.index as usize] = field.kind.default_value();
        }
        slots
    }
}

// ── Registry ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRegistry {
    types: HashMap<TypeId, SchemaType>,
    root: TypeId,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Field table of a registered type.
    pub fn describe(&self, id: TypeId) -> Option<&SchemaType> {
        self.types.get(&id)
    }

    /// Type the root instance is created with.
    pub fn root(&self) -> TypeId {
        self.root
    }

    pub fn root_type(&self) -> &SchemaType {
        // `build` guarantees the root is registered.
        &self.types[&self.root]
    }

    /// Child handle of a reference-kind field. Schema children resolve only
    /// if their type is registered.
    pub fn resolve_child_type(&self, field: &FieldDescriptor) -> Option<ElementKind> {
        match field.kind.child()? {
            ElementKind::Schema(id) if !self.types.contains_key(&id) => None,
            child => Some(child),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = &SchemaType> {
        self.types.values()
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    types: Vec<SchemaType>,
    root: Option<TypeId>,
}

impl TypeRegistryBuilder {
    pub fn register(mut self, ty: SchemaType) -> Self {
        self.types.push(ty);
        self
    }

    /// Sets the root type. Defaults to the first registered type.
    pub fn root(mut self, id: TypeId) -> Self {
        self.root = Some(id);
        self
    }

    pub fn build(self) -> Result<TypeRegistry, RegistryError> {
        let root = self
            .root
            .or_else(|| self.types.first().map(|t| t.id))
            .ok_or(RegistryError::Empty)?;

        let mut types = HashMap::with_capacity(self.types.len());
        for mut ty in self.types {
            ty.seal()?;
            let id = ty.id;
            if types.insert(id, ty).is_some() {
                return Err(RegistryError::DuplicateType(id));
            }
        }

        for ty in types.values() {
            for field in ty.fields() {
                if let Some(ElementKind::Schema(child)) = field.kind.child() {
                    if !types.contains_key(&child) {
                        return Err(RegistryError::UnknownChildType {
                            type_name: ty.name.clone(),
                            field: field.name.clone(),
                            child,
                        });
                    }
                }
            }
        }

        if !types.contains_key(&root) {
            return Err(RegistryError::UnknownRootType(root));
        }
        Ok(TypeRegistry { types, root })
    }
}
