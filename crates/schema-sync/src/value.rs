//! Tagged slot values.
//!
//! Slots never own child objects. A reference-kind slot stores the child's
//! [`RefId`]; the object itself lives in [`crate::Refs`].

use schema_sync_buffers::Number;

/// Reference id assigned by the server to every tracked object.
pub type RefId = u32;

/// The implicit root; pinned for the lifetime of the decoder.
pub const ROOT_REF_ID: RefId = 0;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Empty slot (never assigned, or deleted).
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Pointer to a tracked child object.
    Ref(RefId),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_ref_id(&self) -> Option<RefId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Integral values only; `2.0` converts, `2.5` and `-1` do not.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl Value {
    /// Equality that ignores the numeric encoding: `UInt(2)`, `Int(2)` and
    /// `Float(2.0)` are the same number. Non-numeric values compare as usual.
    pub fn numerically_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::UInt(b)) | (Value::UInt(b), Value::Int(a)) => {
                i128::from(*a) == i128::from(*b)
            }
            (Value::Float(f), n) | (n, Value::Float(f)) => n.as_f64() == Some(*f),
            _ => self == other,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(v) => Value::Int(v),
            Number::UInt(v) => Value::UInt(v),
            Number::Float(v) => Value::Float(v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_encodings() {
        assert!(Value::UInt(0).numerically_eq(&Value::Float(0.0)));
        assert!(Value::Int(7).numerically_eq(&Value::UInt(7)));
        assert!(Value::Float(-2.0).numerically_eq(&Value::Int(-2)));
        assert!(!Value::Int(-1).numerically_eq(&Value::UInt(u64::MAX)));
        assert!(!Value::Float(0.5).numerically_eq(&Value::UInt(0)));
        assert!(!Value::from("0").numerically_eq(&Value::UInt(0)));
    }
}
