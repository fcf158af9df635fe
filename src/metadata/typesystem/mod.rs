//! The type system of the module object model.
//!
//! Two views of a type exist side by side:
//!
//! - [`TypeSig`] - the structural shape of a type as spelled in signatures
//!   and instruction operands (primitive, named, generic instance, generic
//!   parameter, array, pointer). Structurally comparable and hashable; this
//!   is what the patcher caches on.
//! - [`TypeDef`] - a type definition owned by a module, with its members,
//!   attributes and layout.
//!
//! Resolution from a `TypeSig` to the `TypeDef` it denotes (possibly in a
//! peer module) lives on [`crate::metadata::module::Module`].

mod sig;
mod types;

pub use sig::{PrimitiveKind, TypeSig, ELEMENT_TYPE};
pub use types::{GenericParam, TypeAttributes, TypeDef, TypeDefRc};
