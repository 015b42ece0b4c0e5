//! JSON view of a tracked graph.

use serde_json::{Map, Number, Value as Json};

use crate::collections::{CollectionKind, Key};
use crate::refs::{Refs, Tracked};
use crate::types::TypeRegistry;
use crate::value::{RefId, Value};

/// Renders the object at `ref_id` and everything below it.
///
/// Schema instances become objects keyed by field name in index order,
/// arrays become arrays and maps become objects in insertion order.
/// Undefined slots are omitted. A reference back into the current path
/// renders as `null`, as does anything nested deeper than [`MAX_VIEW_DEPTH`].
pub fn to_json(refs: &Refs, registry: &TypeRegistry, ref_id: RefId) -> Json {
    let mut path = Vec::new();
    view_ref(refs, registry, ref_id, &mut path)
}

/// Nesting limit of [`to_json`]; keeps the recursive walk off the end of
/// the stack for pathologically deep graphs.
pub const MAX_VIEW_DEPTH: usize = 256;

fn view_ref(refs: &Refs, registry: &TypeRegistry, ref_id: RefId, path: &mut Vec<RefId>) -> Json {
    if path.len() >= MAX_VIEW_DEPTH || path.contains(&ref_id) {
        return Json::Null;
    }
    path.push(ref_id);
    let out = match refs.get(ref_id) {
        None => Json::Null,
        Some(Tracked::Schema(instance)) => {
            let mut map = Map::new();
            if let Some(ty) = registry.describe(instance.type_id()) {
                for field in ty.fields() {
                    let value = instance.get(field.index);
                    if value.is_undefined() {
                        continue;
                    }
                    map.insert(field.name.clone(), view_value(refs, registry, value, path));
                }
            }
            Json::Object(map)
        }
        Some(Tracked::Collection(collection)) => {
            let mut items = Vec::with_capacity(collection.count());
            let mut map = Map::new();
            for (key, value) in collection.iter() {
                let json = view_value(refs, registry, value, path);
                match key {
                    Key::Index(_) => items.push(json),
                    Key::Name(name) => {
                        map.insert(name, json);
                    }
                }
            }
            match collection.kind() {
                CollectionKind::Array => Json::Array(items),
                CollectionKind::Map => Json::Object(map),
            }
        }
    };
    path.pop();
    out
}

fn view_value(refs: &Refs, registry: &TypeRegistry, value: &Value, path: &mut Vec<RefId>) -> Json {
    match value {
        Value::Undefined => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::Number((*n).into()),
        Value::UInt(n) => Json::Number((*n).into()),
        Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Str(s) => Json::String(s.clone()),
        Value::Ref(id) => view_ref(refs, registry, *id, path),
    }
}
