//! Declarative type system for descriptors, configs and node messages
//!
//! A process-wide [`TypeRegistry`] owns every declared type; values and node
//! code hold stable [`TypeRef`] indices into it, so no reference cycles are
//! possible. Dynamic [`Value`]s carry their type reference and round-trip
//! through the neutral [`TreeValue`] tree, which is what actually crosses the
//! remote setup channel.
//!
//! Supported kinds: booleans, fixed-width integers, `f32`/`f64`, fixed float
//! vectors (2..4), UTF-8 strings, enums with a numeric base, optionals,
//! dynamic sequences, tagged variants, and records with named fields.
//! Declarations carry a keyed attribute bag (UI name, numeric range, units,
//! default) validated against the kind at registration time.

mod registry;
mod tree;
mod value;

pub use registry::{Attributes, FieldDecl, TypeDecl, TypeKind, TypeRef, TypeRegistry};
pub use tree::TreeValue;
pub use value::Value;
