//! Neutral tagged value tree
//!
//! The exchange form between typed [`super::Value`]s and the outside world
//! (remote setup channel, node messages). It is deliberately schema-free:
//! deserializing it back into a typed value is what validates it.

use serde::{Deserialize, Serialize};

/// A schema-free tagged tree of plain data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeValue {
    /// Absent optional
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Sequence or fixed vector elements, in order
    Seq(Vec<TreeValue>),
    /// Record fields as (name, value) pairs in declared order
    Fields(Vec<(String, TreeValue)>),
    /// Variant: active branch index plus the branch value
    Branch(usize, Box<TreeValue>),
}

impl TreeValue {
    /// Look up a field by name (for `Fields` trees)
    pub fn field(&self, name: &str) -> Option<&TreeValue> {
        match self {
            TreeValue::Fields(fields) => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Interpret this tree as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret this tree as a signed integer, widening unsigned if it fits
    pub fn as_int(&self) -> Option<i64> {
        match self {
            TreeValue::Int(v) => Some(*v),
            TreeValue::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Interpret this tree as a float, widening integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            TreeValue::Float(v) => Some(*v),
            TreeValue::Int(v) => Some(*v as f64),
            TreeValue::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Short kind name for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            TreeValue::Null => "null",
            TreeValue::Bool(_) => "bool",
            TreeValue::Int(_) => "int",
            TreeValue::UInt(_) => "uint",
            TreeValue::Float(_) => "float",
            TreeValue::Str(_) => "string",
            TreeValue::Seq(_) => "seq",
            TreeValue::Fields(_) => "fields",
            TreeValue::Branch(..) => "branch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup() {
        let tree = TreeValue::Fields(vec![
            ("rate".into(), TreeValue::UInt(100)),
            ("name".into(), TreeValue::Str("imu".into())),
        ]);
        assert_eq!(tree.field("rate").and_then(TreeValue::as_int), Some(100));
        assert_eq!(tree.field("name").and_then(TreeValue::as_str), Some("imu"));
        assert!(tree.field("missing").is_none());
    }

    #[test]
    fn test_numeric_coercions() {
        assert_eq!(TreeValue::UInt(7).as_int(), Some(7));
        assert_eq!(TreeValue::Int(-7).as_float(), Some(-7.0));
        assert_eq!(TreeValue::Str("x".into()).as_int(), None);
    }
}
