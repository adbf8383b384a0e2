//! Dynamic values and the operations every kind supports
//!
//! Copy is `Clone`, equality is structural `PartialEq`. Everything that needs
//! declaration data (defaults, enum symbols, record field names) lives on
//! [`TypeRegistry`] and takes the value as an argument.

use crate::defs::registry::{TypeKind, TypeRef, TypeRegistry};
use crate::defs::tree::TreeValue;
use crate::error::{TalonError, TalonResult};

/// A dynamically typed value
///
/// Scalar payloads are self-describing; composite payloads carry the
/// [`TypeRef`] of their declaration so assignment compatibility and
/// deserialization can be checked.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Str(String),
    Enum {
        ty: TypeRef,
        symbol: usize,
    },
    Optional {
        ty: TypeRef,
        value: Option<Box<Value>>,
    },
    Sequence {
        ty: TypeRef,
        items: Vec<Value>,
    },
    Variant {
        ty: TypeRef,
        branch: usize,
        value: Box<Value>,
    },
    Record {
        ty: TypeRef,
        fields: Vec<Value>,
    },
}

impl Value {
    /// The kind of this value's payload
    pub fn kind(&self) -> TypeKind {
        match self {
            Value::Bool(_) => TypeKind::Bool,
            Value::I8(_) => TypeKind::I8,
            Value::U8(_) => TypeKind::U8,
            Value::I16(_) => TypeKind::I16,
            Value::U16(_) => TypeKind::U16,
            Value::I32(_) => TypeKind::I32,
            Value::U32(_) => TypeKind::U32,
            Value::I64(_) => TypeKind::I64,
            Value::U64(_) => TypeKind::U64,
            Value::F32(_) => TypeKind::F32,
            Value::F64(_) => TypeKind::F64,
            Value::Vec2(_) => TypeKind::Vec2,
            Value::Vec3(_) => TypeKind::Vec3,
            Value::Vec4(_) => TypeKind::Vec4,
            Value::Str(_) => TypeKind::String,
            Value::Enum { .. } => TypeKind::Enum,
            Value::Optional { .. } => TypeKind::Optional,
            Value::Sequence { .. } => TypeKind::Sequence,
            Value::Variant { .. } => TypeKind::Variant,
            Value::Record { .. } => TypeKind::Record,
        }
    }

    /// Declaration handle for composite values, `None` for self-describing
    /// scalars
    pub fn type_ref(&self) -> Option<TypeRef> {
        match self {
            Value::Enum { ty, .. }
            | Value::Optional { ty, .. }
            | Value::Sequence { ty, .. }
            | Value::Variant { ty, .. }
            | Value::Record { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    /// True if `other` may be copy-assigned into `self`
    pub fn is_compatible(&self, other: &Value) -> bool {
        self.kind() == other.kind() && self.type_ref() == other.type_ref()
    }

    /// Copy-assign from another value of compatible type
    pub fn copy_assign_from(&mut self, other: &Value) -> TalonResult<()> {
        if !self.is_compatible(other) {
            return Err(TalonError::kind_mismatch(
                self.kind().name(),
                other.kind().name(),
            ));
        }
        *self = other.clone();
        Ok(())
    }

    /// Active branch index of a variant value
    pub fn branch(&self) -> Option<usize> {
        match self {
            Value::Variant { branch, .. } => Some(*branch),
            _ => None,
        }
    }
}

// Selector path: dot-separated record field names, `[i]` sequence indices,
// and bare branch indices for variants ("motors[2].position", "1.value").
enum Seg<'a> {
    Name(&'a str),
    Index(usize),
}

fn parse_path(path: &str) -> TalonResult<Vec<Seg<'_>>> {
    let mut segs = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        if rest.is_empty() {
            return Err(TalonError::parse(format!("empty segment in '{}'", path)));
        }
        if let Some(bracket) = rest.find('[') {
            if bracket > 0 {
                segs.push(Seg::Name(&rest[..bracket]));
            }
            rest = &rest[bracket..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped
                    .find(']')
                    .ok_or_else(|| TalonError::parse(format!("unclosed index in '{}'", path)))?;
                let idx: usize = stripped[..close]
                    .parse()
                    .map_err(|_| TalonError::parse(format!("bad index in '{}'", path)))?;
                segs.push(Seg::Index(idx));
                rest = &stripped[close + 1..];
            }
            if !rest.is_empty() {
                return Err(TalonError::parse(format!("trailing junk in '{}'", path)));
            }
        } else if let Ok(idx) = rest.parse::<usize>() {
            segs.push(Seg::Index(idx));
        } else {
            segs.push(Seg::Name(rest));
        }
    }
    Ok(segs)
}

impl TypeRegistry {
    /// Address a sub-value by a path of field names, indices and variant
    /// branches
    pub fn select<'v>(&self, value: &'v Value, path: &str) -> TalonResult<&'v Value> {
        let mut current = value;
        for seg in parse_path(path)? {
            // optionals are transparent to selection
            while let Value::Optional { value, .. } = current {
                current = value
                    .as_deref()
                    .ok_or_else(|| TalonError::parse("optional is empty"))?;
            }
            current = match (current, seg) {
                (Value::Record { ty, fields }, Seg::Name(name)) => {
                    let idx = self
                        .decl(*ty)
                        .field_index(name)
                        .ok_or_else(|| TalonError::MissingField(name.to_string()))?;
                    &fields[idx]
                }
                (Value::Sequence { items, .. }, Seg::Index(idx)) => {
                    items.get(idx).ok_or(TalonError::ArityMismatch {
                        expected: items.len(),
                        got: idx,
                    })?
                }
                (Value::Variant { ty, branch, value }, Seg::Index(idx)) => {
                    if idx >= self.decl(*ty).branches.len() {
                        return Err(TalonError::VariantOutOfRange {
                            branch: idx,
                            arity: self.decl(*ty).branches.len(),
                        });
                    }
                    if idx != *branch {
                        return Err(TalonError::parse(format!(
                            "branch {} is not active (active is {})",
                            idx, branch
                        )));
                    }
                    &**value
                }
                (other, _) => {
                    return Err(TalonError::kind_mismatch(
                        "record/sequence/variant",
                        other.kind().name(),
                    ))
                }
            };
        }
        Ok(current)
    }

    /// Re-initialize a variant to the given branch's default value
    pub fn set_branch(&self, value: &mut Value, new_branch: usize) -> TalonResult<()> {
        match value {
            Value::Variant { ty, branch, value } => {
                let decl = self.decl(*ty);
                if new_branch >= decl.branches.len() {
                    return Err(TalonError::VariantOutOfRange {
                        branch: new_branch,
                        arity: decl.branches.len(),
                    });
                }
                *branch = new_branch;
                *value = Box::new(self.default_value(decl.branches[new_branch]));
                Ok(())
            }
            other => Err(TalonError::kind_mismatch("variant", other.kind().name())),
        }
    }

    /// Serialize a value to the neutral tagged tree
    pub fn serialize(&self, value: &Value) -> TreeValue {
        match value {
            Value::Bool(v) => TreeValue::Bool(*v),
            Value::I8(v) => TreeValue::Int(*v as i64),
            Value::I16(v) => TreeValue::Int(*v as i64),
            Value::I32(v) => TreeValue::Int(*v as i64),
            Value::I64(v) => TreeValue::Int(*v),
            Value::U8(v) => TreeValue::UInt(*v as u64),
            Value::U16(v) => TreeValue::UInt(*v as u64),
            Value::U32(v) => TreeValue::UInt(*v as u64),
            Value::U64(v) => TreeValue::UInt(*v),
            Value::F32(v) => TreeValue::Float(*v as f64),
            Value::F64(v) => TreeValue::Float(*v),
            Value::Vec2(v) => TreeValue::Seq(v.iter().map(|c| TreeValue::Float(*c as f64)).collect()),
            Value::Vec3(v) => TreeValue::Seq(v.iter().map(|c| TreeValue::Float(*c as f64)).collect()),
            Value::Vec4(v) => TreeValue::Seq(v.iter().map(|c| TreeValue::Float(*c as f64)).collect()),
            Value::Str(v) => TreeValue::Str(v.clone()),
            Value::Enum { ty, symbol } => {
                TreeValue::Str(self.decl(*ty).symbols[*symbol].clone())
            }
            Value::Optional { value, .. } => match value {
                None => TreeValue::Null,
                Some(inner) => self.serialize(inner),
            },
            Value::Sequence { items, .. } => {
                TreeValue::Seq(items.iter().map(|v| self.serialize(v)).collect())
            }
            Value::Variant { branch, value, .. } => {
                TreeValue::Branch(*branch, Box::new(self.serialize(value)))
            }
            Value::Record { ty, fields } => {
                let decl = self.decl(*ty);
                TreeValue::Fields(
                    decl.fields
                        .iter()
                        .zip(fields)
                        .map(|(f, v)| (f.name.clone(), self.serialize(v)))
                        .collect(),
                )
            }
        }
    }

    /// Deserialize a neutral tree into a value of the given type
    pub fn deserialize(&self, ty: TypeRef, tree: &TreeValue) -> TalonResult<Value> {
        let decl = self.decl(ty);
        let mismatch = || TalonError::kind_mismatch(decl.kind.name(), tree.kind_name());
        match decl.kind {
            TypeKind::Bool => match tree {
                TreeValue::Bool(v) => Ok(Value::Bool(*v)),
                _ => Err(mismatch()),
            },
            TypeKind::I8 => int_value(tree).and_then(|v| cast_signed(v).map(Value::I8)),
            TypeKind::I16 => int_value(tree).and_then(|v| cast_signed(v).map(Value::I16)),
            TypeKind::I32 => int_value(tree).and_then(|v| cast_signed(v).map(Value::I32)),
            TypeKind::I64 => int_value(tree).map(Value::I64),
            TypeKind::U8 => uint_value(tree).and_then(|v| cast_unsigned(v).map(Value::U8)),
            TypeKind::U16 => uint_value(tree).and_then(|v| cast_unsigned(v).map(Value::U16)),
            TypeKind::U32 => uint_value(tree).and_then(|v| cast_unsigned(v).map(Value::U32)),
            TypeKind::U64 => uint_value(tree).map(Value::U64),
            TypeKind::F32 => tree
                .as_float()
                .map(|v| Value::F32(v as f32))
                .ok_or_else(mismatch),
            TypeKind::F64 => tree.as_float().map(Value::F64).ok_or_else(mismatch),
            TypeKind::Vec2 => float_array::<2>(tree).map(Value::Vec2),
            TypeKind::Vec3 => float_array::<3>(tree).map(Value::Vec3),
            TypeKind::Vec4 => float_array::<4>(tree).map(Value::Vec4),
            TypeKind::String => match tree {
                TreeValue::Str(s) => Ok(Value::Str(s.clone())),
                _ => Err(mismatch()),
            },
            TypeKind::Enum => {
                let symbol = match tree {
                    TreeValue::Str(s) => decl
                        .symbols
                        .iter()
                        .position(|sym| sym == s)
                        .ok_or_else(|| {
                            TalonError::parse(format!("unknown symbol '{}' for {}", s, decl.name))
                        })?,
                    _ => {
                        let v = tree.as_int().ok_or_else(mismatch)?;
                        let idx = v - decl.enum_base;
                        if idx < 0 || idx as usize >= decl.symbols.len() {
                            return Err(TalonError::parse(format!(
                                "enum value {} out of range for {}",
                                v, decl.name
                            )));
                        }
                        idx as usize
                    }
                };
                Ok(Value::Enum { ty, symbol })
            }
            TypeKind::Optional => {
                let elem = decl.elem.expect("optional has element type");
                match tree {
                    TreeValue::Null => Ok(Value::Optional { ty, value: None }),
                    other => Ok(Value::Optional {
                        ty,
                        value: Some(Box::new(self.deserialize(elem, other)?)),
                    }),
                }
            }
            TypeKind::Sequence => {
                let elem = decl.elem.expect("sequence has element type");
                match tree {
                    TreeValue::Seq(items) => Ok(Value::Sequence {
                        ty,
                        items: items
                            .iter()
                            .map(|t| self.deserialize(elem, t))
                            .collect::<TalonResult<_>>()?,
                    }),
                    _ => Err(mismatch()),
                }
            }
            TypeKind::Variant => match tree {
                TreeValue::Branch(branch, inner) => {
                    if *branch >= decl.branches.len() {
                        return Err(TalonError::VariantOutOfRange {
                            branch: *branch,
                            arity: decl.branches.len(),
                        });
                    }
                    Ok(Value::Variant {
                        ty,
                        branch: *branch,
                        value: Box::new(self.deserialize(decl.branches[*branch], inner)?),
                    })
                }
                _ => Err(mismatch()),
            },
            TypeKind::Record => match tree {
                TreeValue::Fields(_) => {
                    let mut fields = Vec::with_capacity(decl.fields.len());
                    for field in &decl.fields {
                        let v = match tree.field(&field.name) {
                            Some(sub) => self.deserialize(field.ty, sub)?,
                            None => match field.attributes.get("default") {
                                Some(d) => self.deserialize(field.ty, d)?,
                                None => return Err(TalonError::MissingField(field.name.clone())),
                            },
                        };
                        fields.push(v);
                    }
                    Ok(Value::Record { ty, fields })
                }
                _ => Err(mismatch()),
            },
        }
    }

    /// Parse a value of the given type from a UTF-8 user string
    ///
    /// Composite kinds other than fixed vectors and enums have no user-string
    /// form and fail with a parse error, same as the UI layer expects.
    pub fn parse_value(&self, ty: TypeRef, s: &str) -> TalonResult<Value> {
        let decl = self.decl(ty);
        let s = s.trim();
        let bad = |what: &str| TalonError::parse(format!("'{}' is not a valid {}", s, what));
        match decl.kind {
            TypeKind::Bool => match s {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(bad("bool")),
            },
            TypeKind::I8 => s.parse().map(Value::I8).map_err(|_| bad("i8")),
            TypeKind::U8 => s.parse().map(Value::U8).map_err(|_| bad("u8")),
            TypeKind::I16 => s.parse().map(Value::I16).map_err(|_| bad("i16")),
            TypeKind::U16 => s.parse().map(Value::U16).map_err(|_| bad("u16")),
            TypeKind::I32 => s.parse().map(Value::I32).map_err(|_| bad("i32")),
            TypeKind::U32 => s.parse().map(Value::U32).map_err(|_| bad("u32")),
            TypeKind::I64 => s.parse().map(Value::I64).map_err(|_| bad("i64")),
            TypeKind::U64 => s.parse().map(Value::U64).map_err(|_| bad("u64")),
            TypeKind::F32 => s.parse().map(Value::F32).map_err(|_| bad("f32")),
            TypeKind::F64 => s.parse().map(Value::F64).map_err(|_| bad("f64")),
            TypeKind::Vec2 => parse_vec::<2>(s).map(Value::Vec2),
            TypeKind::Vec3 => parse_vec::<3>(s).map(Value::Vec3),
            TypeKind::Vec4 => parse_vec::<4>(s).map(Value::Vec4),
            TypeKind::String => Ok(Value::Str(s.to_string())),
            TypeKind::Enum => decl
                .symbols
                .iter()
                .position(|sym| sym == s)
                .map(|symbol| Value::Enum { ty, symbol })
                .ok_or_else(|| bad(&decl.name)),
            _ => Err(TalonError::parse(format!(
                "{} has no user-string form",
                decl.kind.name()
            ))),
        }
    }

    /// Emit the UI string form of a value
    pub fn ui_string(&self, value: &Value) -> String {
        match value {
            Value::Bool(v) => v.to_string(),
            Value::I8(v) => v.to_string(),
            Value::U8(v) => v.to_string(),
            Value::I16(v) => v.to_string(),
            Value::U16(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::U32(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F32(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::Vec2(v) => format!("({}, {})", v[0], v[1]),
            Value::Vec3(v) => format!("({}, {}, {})", v[0], v[1], v[2]),
            Value::Vec4(v) => format!("({}, {}, {}, {})", v[0], v[1], v[2], v[3]),
            Value::Str(v) => v.clone(),
            Value::Enum { ty, symbol } => self.decl(*ty).symbols[*symbol].clone(),
            Value::Optional { value, .. } => match value {
                None => "<none>".to_string(),
                Some(inner) => self.ui_string(inner),
            },
            Value::Sequence { items, .. } => {
                let parts: Vec<_> = items.iter().map(|v| self.ui_string(v)).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Variant { branch, value, .. } => {
                format!("<{}> {}", branch, self.ui_string(value))
            }
            Value::Record { ty, fields } => {
                let decl = self.decl(*ty);
                let parts: Vec<_> = decl
                    .fields
                    .iter()
                    .zip(fields)
                    .map(|(f, v)| format!("{}: {}", f.name, self.ui_string(v)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }
}

fn int_value(tree: &TreeValue) -> TalonResult<i64> {
    tree.as_int()
        .ok_or_else(|| TalonError::kind_mismatch("int", tree.kind_name()))
}

fn uint_value(tree: &TreeValue) -> TalonResult<u64> {
    match tree {
        TreeValue::UInt(v) => Ok(*v),
        TreeValue::Int(v) if *v >= 0 => Ok(*v as u64),
        _ => Err(TalonError::kind_mismatch("uint", tree.kind_name())),
    }
}

fn cast_signed<T: TryFrom<i64>>(v: i64) -> TalonResult<T> {
    T::try_from(v).map_err(|_| TalonError::parse(format!("{} out of range", v)))
}

fn cast_unsigned<T: TryFrom<u64>>(v: u64) -> TalonResult<T> {
    T::try_from(v).map_err(|_| TalonError::parse(format!("{} out of range", v)))
}

fn float_array<const N: usize>(tree: &TreeValue) -> TalonResult<[f32; N]> {
    match tree {
        TreeValue::Seq(items) => {
            if items.len() != N {
                return Err(TalonError::ArityMismatch {
                    expected: N,
                    got: items.len(),
                });
            }
            let mut out = [0.0f32; N];
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = item
                    .as_float()
                    .ok_or_else(|| TalonError::kind_mismatch("float", item.kind_name()))?
                    as f32;
            }
            Ok(out)
        }
        _ => Err(TalonError::kind_mismatch("seq", tree.kind_name())),
    }
}

fn parse_vec<const N: usize>(s: &str) -> TalonResult<[f32; N]> {
    let inner = s
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(TalonError::ArityMismatch {
            expected: N,
            got: parts.len(),
        });
    }
    let mut out = [0.0f32; N];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| TalonError::parse(format!("'{}' is not a float", part)))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::registry::{Attributes, FieldDecl};

    fn registry_with_motor() -> (TypeRegistry, TypeRef) {
        let mut reg = TypeRegistry::new();
        let vec3 = reg.builtin(TypeKind::Vec3);
        let boolean = reg.builtin(TypeKind::Bool);
        let motor = reg
            .declare_record(
                "motor",
                vec![
                    FieldDecl::new("position", vec3),
                    FieldDecl::new("clockwise", boolean),
                ],
                Attributes::new(),
            )
            .unwrap();
        (reg, motor)
    }

    // =========================================================================
    // Round-trip (serialize then deserialize compares equal)
    // =========================================================================

    #[test]
    fn test_scalar_round_trips() {
        let reg = TypeRegistry::new();
        let values = [
            Value::Bool(true),
            Value::I8(-5),
            Value::U8(200),
            Value::I16(-30000),
            Value::U16(60000),
            Value::I32(-7),
            Value::U32(7),
            Value::I64(i64::MIN),
            Value::U64(u64::MAX),
            Value::F32(1.5),
            Value::F64(-2.25),
            Value::Str("hello".into()),
            Value::Vec3([1.0, 2.0, 3.0]),
        ];
        for v in values {
            let kind = v.kind();
            let ty = reg.builtin(kind);
            let tree = reg.serialize(&v);
            let back = reg.deserialize(ty, &tree).unwrap();
            assert_eq!(v, back, "round trip failed for {:?}", kind);
        }
    }

    #[test]
    fn test_container_round_trips() {
        let mut reg = TypeRegistry::new();
        let i32_ty = reg.builtin(TypeKind::I32);
        let f32_ty = reg.builtin(TypeKind::F32);
        let opt = reg.optional_of(f32_ty);
        let seq = reg.sequence_of(i32_ty);
        let var = reg
            .declare_variant("num", &[i32_ty, f32_ty], Attributes::new())
            .unwrap();

        let values = [
            Value::Optional {
                ty: opt,
                value: Some(Box::new(Value::F32(9.81))),
            },
            Value::Optional {
                ty: opt,
                value: None,
            },
            Value::Sequence {
                ty: seq,
                items: vec![Value::I32(1), Value::I32(2), Value::I32(3)],
            },
            Value::Variant {
                ty: var,
                branch: 1,
                value: Box::new(Value::F32(0.5)),
            },
        ];
        for v in values {
            let ty = v.type_ref().unwrap();
            let back = reg.deserialize(ty, &reg.serialize(&v)).unwrap();
            assert_eq!(v, back);
        }
    }

    #[test]
    fn test_record_round_trip() {
        let (reg, motor) = registry_with_motor();
        let v = Value::Record {
            ty: motor,
            fields: vec![Value::Vec3([0.25, -0.25, 0.0]), Value::Bool(true)],
        };
        let back = reg.deserialize(motor, &reg.serialize(&v)).unwrap();
        assert_eq!(v, back);
    }

    // =========================================================================
    // Variant invariants
    // =========================================================================

    #[test]
    fn test_variant_branch_survives_copy() {
        let mut reg = TypeRegistry::new();
        let i32_ty = reg.builtin(TypeKind::I32);
        let f32_ty = reg.builtin(TypeKind::F32);
        let var = reg
            .declare_variant("num", &[i32_ty, f32_ty], Attributes::new())
            .unwrap();
        let v = Value::Variant {
            ty: var,
            branch: 1,
            value: Box::new(Value::F32(3.0)),
        };
        let copy = v.clone();
        assert_eq!(copy.branch(), Some(1));
        assert_eq!(v, copy);
    }

    #[test]
    fn test_set_branch_reinitializes() {
        let mut reg = TypeRegistry::new();
        let i32_ty = reg.builtin(TypeKind::I32);
        let f32_ty = reg.builtin(TypeKind::F32);
        let var = reg
            .declare_variant("num", &[i32_ty, f32_ty], Attributes::new())
            .unwrap();
        let mut v = reg.default_value(var);
        assert_eq!(v.branch(), Some(0));

        reg.set_branch(&mut v, 1).unwrap();
        match &v {
            Value::Variant { branch, value, .. } => {
                assert_eq!(*branch, 1);
                assert_eq!(**value, Value::F32(0.0));
            }
            other => panic!("expected variant, got {:?}", other),
        }

        let err = reg.set_branch(&mut v, 2).unwrap_err();
        assert!(matches!(err, TalonError::VariantOutOfRange { branch: 2, arity: 2 }));
    }

    #[test]
    fn test_deserialize_rejects_out_of_range_branch() {
        let mut reg = TypeRegistry::new();
        let i32_ty = reg.builtin(TypeKind::I32);
        let var = reg
            .declare_variant("only", &[i32_ty], Attributes::new())
            .unwrap();
        let tree = TreeValue::Branch(3, Box::new(TreeValue::Int(1)));
        assert!(matches!(
            reg.deserialize(var, &tree),
            Err(TalonError::VariantOutOfRange { branch: 3, arity: 1 })
        ));
    }

    // =========================================================================
    // Assignment, selection, parsing
    // =========================================================================

    #[test]
    fn test_copy_assign_kind_mismatch() {
        let mut a = Value::F32(1.0);
        assert!(a.copy_assign_from(&Value::F32(2.0)).is_ok());
        assert_eq!(a, Value::F32(2.0));
        assert!(matches!(
            a.copy_assign_from(&Value::Bool(true)),
            Err(TalonError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_deep_select() {
        let (mut reg, motor) = registry_with_motor();
        let motors_ty = reg.sequence_of(motor);
        let motors = Value::Sequence {
            ty: motors_ty,
            items: vec![
                Value::Record {
                    ty: motor,
                    fields: vec![Value::Vec3([0.25, 0.25, 0.0]), Value::Bool(false)],
                },
                Value::Record {
                    ty: motor,
                    fields: vec![Value::Vec3([-0.25, 0.25, 0.0]), Value::Bool(true)],
                },
            ],
        };
        let sel = reg.select(&motors, "[1].clockwise").unwrap();
        assert_eq!(*sel, Value::Bool(true));
        assert!(reg.select(&motors, "[1].missing").is_err());
        assert!(reg.select(&motors, "[5]").is_err());
    }

    #[test]
    fn test_parse_and_ui_string() {
        let mut reg = TypeRegistry::new();
        let f32_ty = reg.builtin(TypeKind::F32);
        let vec3_ty = reg.builtin(TypeKind::Vec3);
        let fix = reg
            .declare_enum("fix", &["none", "fix_2d", "fix_3d"], 0, Attributes::new())
            .unwrap();

        assert_eq!(reg.parse_value(f32_ty, "1.5").unwrap(), Value::F32(1.5));
        assert!(reg.parse_value(f32_ty, "soup").is_err());

        let v = reg.parse_value(vec3_ty, "(1, 2, 3)").unwrap();
        assert_eq!(v, Value::Vec3([1.0, 2.0, 3.0]));
        assert_eq!(reg.ui_string(&v), "(1, 2, 3)");

        let e = reg.parse_value(fix, "fix_3d").unwrap();
        assert_eq!(e, Value::Enum { ty: fix, symbol: 2 });
        assert_eq!(reg.ui_string(&e), "fix_3d");

        // enums also accept their numeric form on the tree side
        let from_num = reg.deserialize(fix, &TreeValue::Int(1)).unwrap();
        assert_eq!(from_num, Value::Enum { ty: fix, symbol: 1 });
    }

    #[test]
    fn test_record_missing_field() {
        let (reg, motor) = registry_with_motor();
        let tree = TreeValue::Fields(vec![(
            "position".into(),
            TreeValue::Seq(vec![
                TreeValue::Float(0.0),
                TreeValue::Float(0.0),
                TreeValue::Float(0.0),
            ]),
        )]);
        assert!(matches!(
            reg.deserialize(motor, &tree),
            Err(TalonError::MissingField(f)) if f == "clockwise"
        ));
    }
}
