//! Type declarations and the process-wide registry

use std::collections::HashMap;

use crate::defs::tree::TreeValue;
use crate::defs::value::Value;
use crate::error::{TalonError, TalonResult};

/// Stable handle into the [`TypeRegistry`]
///
/// Handles never dangle: the registry only grows, and it grows only during
/// startup. Two refs compare equal iff they name the same declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(pub(crate) u32);

/// The shape of a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Vec2,
    Vec3,
    Vec4,
    String,
    Enum,
    Optional,
    Sequence,
    Variant,
    Record,
}

impl TypeKind {
    /// Lowercase name used in error messages and UI strings
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Bool => "bool",
            TypeKind::I8 => "i8",
            TypeKind::U8 => "u8",
            TypeKind::I16 => "i16",
            TypeKind::U16 => "u16",
            TypeKind::I32 => "i32",
            TypeKind::U32 => "u32",
            TypeKind::I64 => "i64",
            TypeKind::U64 => "u64",
            TypeKind::F32 => "f32",
            TypeKind::F64 => "f64",
            TypeKind::Vec2 => "vec2",
            TypeKind::Vec3 => "vec3",
            TypeKind::Vec4 => "vec4",
            TypeKind::String => "string",
            TypeKind::Enum => "enum",
            TypeKind::Optional => "optional",
            TypeKind::Sequence => "sequence",
            TypeKind::Variant => "variant",
            TypeKind::Record => "record",
        }
    }

    /// True for the scalar kinds that parse from a plain user string
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeKind::I8
                | TypeKind::U8
                | TypeKind::I16
                | TypeKind::U16
                | TypeKind::I32
                | TypeKind::U32
                | TypeKind::I64
                | TypeKind::U64
                | TypeKind::F32
                | TypeKind::F64
        )
    }
}

/// Keyed attribute bag attached to declarations and record fields
///
/// Known keys: `ui_name` (string), `units` (string), `min`/`max` (numeric),
/// `default` (any tree). Unknown keys are rejected at registration so typos
/// surface early.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, TreeValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute
    pub fn set(mut self, key: &str, value: TreeValue) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&TreeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate(&self, kind: TypeKind) -> TalonResult<()> {
        for (key, value) in &self.entries {
            let ok = match key.as_str() {
                "ui_name" | "units" => matches!(value, TreeValue::Str(_)),
                "min" | "max" => value.as_float().is_some() && kind.is_numeric(),
                "default" => true,
                _ => {
                    return Err(TalonError::invalid_input(format!(
                        "unknown attribute '{}'",
                        key
                    )))
                }
            };
            if !ok {
                return Err(TalonError::invalid_input(format!(
                    "attribute '{}' is not valid for kind {}",
                    key,
                    kind.name()
                )));
            }
        }
        Ok(())
    }
}

/// A named record field
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub attributes: Attributes,
}

impl FieldDecl {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            ty,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// A registered type declaration
///
/// The kind-specific shape is immutable once registered; record fields keep
/// their declared order.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeKind,
    /// Element type for `Optional` and `Sequence`
    pub elem: Option<TypeRef>,
    /// Branch types for `Variant`, in declared order
    pub branches: Vec<TypeRef>,
    /// Fields for `Record`, in declared order
    pub fields: Vec<FieldDecl>,
    /// Symbols for `Enum`, in declared order
    pub symbols: Vec<String>,
    /// Numeric value of the first enum symbol
    pub enum_base: i64,
    pub attributes: Attributes,
}

impl TypeDecl {
    fn leaf(name: &str, kind: TypeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            elem: None,
            branches: Vec::new(),
            fields: Vec::new(),
            symbols: Vec::new(),
            enum_base: 0,
            attributes: Attributes::new(),
        }
    }

    /// Index of a record field by name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Process-wide catalog of declared types
///
/// Built-in kinds are pre-registered under their kind names; user types are
/// registered once at startup. Read-mostly thereafter.
pub struct TypeRegistry {
    decls: Vec<TypeDecl>,
    by_name: HashMap<String, TypeRef>,
}

const BUILTINS: &[TypeKind] = &[
    TypeKind::Bool,
    TypeKind::I8,
    TypeKind::U8,
    TypeKind::I16,
    TypeKind::U16,
    TypeKind::I32,
    TypeKind::U32,
    TypeKind::I64,
    TypeKind::U64,
    TypeKind::F32,
    TypeKind::F64,
    TypeKind::Vec2,
    TypeKind::Vec3,
    TypeKind::Vec4,
    TypeKind::String,
];

impl TypeRegistry {
    /// Create a registry with the built-in kinds pre-registered
    pub fn new() -> Self {
        let mut reg = Self {
            decls: Vec::new(),
            by_name: HashMap::new(),
        };
        for kind in BUILTINS {
            reg.insert(TypeDecl::leaf(kind.name(), *kind));
        }
        reg
    }

    fn insert(&mut self, decl: TypeDecl) -> TypeRef {
        let r = TypeRef(self.decls.len() as u32);
        self.by_name.insert(decl.name.clone(), r);
        self.decls.push(decl);
        r
    }

    fn check_free(&self, name: &str) -> TalonResult<()> {
        if self.by_name.contains_key(name) {
            return Err(TalonError::invalid_input(format!(
                "type '{}' is already registered",
                name
            )));
        }
        Ok(())
    }

    /// Handle of a built-in scalar/vector/string kind
    pub fn builtin(&self, kind: TypeKind) -> TypeRef {
        self.by_name[kind.name()]
    }

    /// Look up a type by name
    pub fn find(&self, name: &str) -> Option<TypeRef> {
        self.by_name.get(name).copied()
    }

    /// Declaration behind a handle
    pub fn decl(&self, ty: TypeRef) -> &TypeDecl {
        &self.decls[ty.0 as usize]
    }

    /// Declare an enum with its symbols and numeric base
    pub fn declare_enum(
        &mut self,
        name: &str,
        symbols: &[&str],
        base: i64,
        attributes: Attributes,
    ) -> TalonResult<TypeRef> {
        self.check_free(name)?;
        if symbols.is_empty() {
            return Err(TalonError::invalid_input("enum needs at least one symbol"));
        }
        attributes.validate(TypeKind::Enum)?;
        let mut decl = TypeDecl::leaf(name, TypeKind::Enum);
        decl.symbols = symbols.iter().map(|s| s.to_string()).collect();
        decl.enum_base = base;
        decl.attributes = attributes;
        Ok(self.insert(decl))
    }

    /// Declare a record with named, ordered fields
    pub fn declare_record(
        &mut self,
        name: &str,
        fields: Vec<FieldDecl>,
        attributes: Attributes,
    ) -> TalonResult<TypeRef> {
        self.check_free(name)?;
        attributes.validate(TypeKind::Record)?;
        for field in &fields {
            field.attributes.validate(self.decl(field.ty).kind)?;
        }
        let mut decl = TypeDecl::leaf(name, TypeKind::Record);
        decl.fields = fields;
        decl.attributes = attributes;
        Ok(self.insert(decl))
    }

    /// Declare a tagged variant over the given branch types
    pub fn declare_variant(
        &mut self,
        name: &str,
        branches: &[TypeRef],
        attributes: Attributes,
    ) -> TalonResult<TypeRef> {
        self.check_free(name)?;
        if branches.is_empty() {
            return Err(TalonError::invalid_input("variant needs at least one branch"));
        }
        attributes.validate(TypeKind::Variant)?;
        let mut decl = TypeDecl::leaf(name, TypeKind::Variant);
        decl.branches = branches.to_vec();
        decl.attributes = attributes;
        Ok(self.insert(decl))
    }

    /// Optional over an element type; structural, deduplicated by name
    pub fn optional_of(&mut self, elem: TypeRef) -> TypeRef {
        let name = format!("optional<{}>", self.decl(elem).name);
        if let Some(existing) = self.find(&name) {
            return existing;
        }
        let mut decl = TypeDecl::leaf(&name, TypeKind::Optional);
        decl.elem = Some(elem);
        self.insert(decl)
    }

    /// Sequence over an element type; structural, deduplicated by name
    pub fn sequence_of(&mut self, elem: TypeRef) -> TypeRef {
        let name = format!("sequence<{}>", self.decl(elem).name);
        if let Some(existing) = self.find(&name) {
            return existing;
        }
        let mut decl = TypeDecl::leaf(&name, TypeKind::Sequence);
        decl.elem = Some(elem);
        self.insert(decl)
    }

    /// Construct the default value of a type
    ///
    /// A field/declaration `default` attribute wins over the kind default
    /// when it deserializes cleanly.
    pub fn default_value(&self, ty: TypeRef) -> Value {
        let decl = self.decl(ty);
        if let Some(tree) = decl.attributes.get("default") {
            if let Ok(v) = self.deserialize(ty, tree) {
                return v;
            }
        }
        match decl.kind {
            TypeKind::Bool => Value::Bool(false),
            TypeKind::I8 => Value::I8(0),
            TypeKind::U8 => Value::U8(0),
            TypeKind::I16 => Value::I16(0),
            TypeKind::U16 => Value::U16(0),
            TypeKind::I32 => Value::I32(0),
            TypeKind::U32 => Value::U32(0),
            TypeKind::I64 => Value::I64(0),
            TypeKind::U64 => Value::U64(0),
            TypeKind::F32 => Value::F32(0.0),
            TypeKind::F64 => Value::F64(0.0),
            TypeKind::Vec2 => Value::Vec2([0.0; 2]),
            TypeKind::Vec3 => Value::Vec3([0.0; 3]),
            TypeKind::Vec4 => Value::Vec4([0.0; 4]),
            TypeKind::String => Value::Str(String::new()),
            TypeKind::Enum => Value::Enum { ty, symbol: 0 },
            TypeKind::Optional => Value::Optional { ty, value: None },
            TypeKind::Sequence => Value::Sequence {
                ty,
                items: Vec::new(),
            },
            TypeKind::Variant => Value::Variant {
                ty,
                branch: 0,
                value: Box::new(self.default_value(decl.branches[0])),
            },
            TypeKind::Record => {
                let mut fields = Vec::with_capacity(decl.fields.len());
                for field in &decl.fields {
                    let v = match field.attributes.get("default") {
                        Some(tree) => self
                            .deserialize(field.ty, tree)
                            .unwrap_or_else(|_| self.default_value(field.ty)),
                        None => self.default_value(field.ty),
                    };
                    fields.push(v);
                }
                Value::Record { ty, fields }
            }
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
