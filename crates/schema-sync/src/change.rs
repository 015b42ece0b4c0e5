//! Operation byte-codes and per-mutation change records.

use crate::collections::Key;
use crate::value::{RefId, Value};

/// How a slot is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    Replace = 0,
    Delete = 64,
    Add = 128,
    DeleteAndAdd = 192,
    /// Collection-only; empties the collection.
    Clear = 10,
}

impl Operation {
    /// Splits a schema-target byte into its operation (high two bits) and
    /// field index (low six bits).
    pub fn from_schema_byte(byte: u8) -> (Operation, u8) {
        let op = match byte & 0b1100_0000 {
            0 => Operation::Replace,
            64 => Operation::Delete,
            128 => Operation::Add,
            _ => Operation::DeleteAndAdd,
        };
        (op, byte & 0b0011_1111)
    }

    /// Collection targets carry the operation as the whole byte.
    pub fn from_collection_byte(byte: u8) -> Option<Operation> {
        match byte {
            0 => Some(Operation::Replace),
            64 => Some(Operation::Delete),
            128 => Some(Operation::Add),
            192 => Some(Operation::DeleteAndAdd),
            10 => Some(Operation::Clear),
            _ => None,
        }
    }

    pub fn has_add(self) -> bool {
        matches!(self, Operation::Add | Operation::DeleteAndAdd)
    }

    pub fn has_delete(self) -> bool {
        matches!(self, Operation::Delete | Operation::DeleteAndAdd)
    }
}

/// Which slot a change record refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeField {
    /// A schema instance field.
    Field { index: u8, name: String },
    /// A collection slot, by its dynamic key.
    Key(Key),
}

impl ChangeField {
    /// True when this is the named schema field, or a map slot with that key.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            ChangeField::Field { name: n, .. } => n == name,
            ChangeField::Key(Key::Name(k)) => k == name,
            ChangeField::Key(Key::Index(i)) => name.parse::<u32>().is_ok_and(|n| n == *i),
        }
    }
}

/// One decoded mutation, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    pub ref_id: RefId,
    pub op: Operation,
    /// `None` only for [`Operation::Clear`].
    pub field: Option<ChangeField>,
    pub value: Value,
    pub previous_value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_byte_split() {
        assert_eq!(Operation::from_schema_byte(0x00), (Operation::Replace, 0));
        assert_eq!(Operation::from_schema_byte(0x45), (Operation::Delete, 5));
        assert_eq!(Operation::from_schema_byte(0x89), (Operation::Add, 9));
        assert_eq!(Operation::from_schema_byte(0xff), (Operation::DeleteAndAdd, 63));
    }

    #[test]
    fn collection_byte_is_whole_op() {
        assert_eq!(Operation::from_collection_byte(10), Some(Operation::Clear));
        assert_eq!(Operation::from_collection_byte(192), Some(Operation::DeleteAndAdd));
        assert_eq!(Operation::from_collection_byte(65), None);
    }

    #[test]
    fn field_matching() {
        let f = ChangeField::Field {
            index: 2,
            name: "hp".into(),
        };
        assert!(f.matches("hp"));
        assert!(!f.matches("mp"));
        assert!(ChangeField::Key(Key::Index(3)).matches("3"));
        assert!(ChangeField::Key(Key::Name("a".into())).matches("a"));
    }
}
