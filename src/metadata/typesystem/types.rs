//! Type definitions and their attribute flags.

use std::sync::Arc;

use crate::metadata::{
    attributes::CustomAttribute,
    member::{FieldRc, MethodRc},
    token::Token,
    typesystem::TypeSig,
};

#[allow(non_snake_case, missing_docs)]
/// Type attribute flags (ECMA-335 II.23.1.15), stored as a raw 4-byte mask.
pub mod TypeAttributes {
    pub const VISIBILITY_MASK: u32 = 0x0000_0007;
    pub const NOT_PUBLIC: u32 = 0x0000_0000;
    pub const PUBLIC: u32 = 0x0000_0001;
    pub const NESTED_PUBLIC: u32 = 0x0000_0002;
    pub const NESTED_PRIVATE: u32 = 0x0000_0003;
    pub const NESTED_ASSEMBLY: u32 = 0x0000_0005;

    pub const LAYOUT_MASK: u32 = 0x0000_0018;
    pub const AUTO_LAYOUT: u32 = 0x0000_0000;
    pub const SEQUENTIAL_LAYOUT: u32 = 0x0000_0008;
    pub const EXPLICIT_LAYOUT: u32 = 0x0000_0010;

    pub const INTERFACE: u32 = 0x0000_0020;
    pub const ABSTRACT: u32 = 0x0000_0080;
    pub const SEALED: u32 = 0x0000_0100;

    pub const ANSI_CLASS: u32 = 0x0000_0000;
    pub const AUTO_CLASS: u32 = 0x0002_0000;
}

/// A generic parameter declared by a type or method.
#[derive(Debug, Clone)]
pub struct GenericParam {
    /// Zero-based declaration index.
    pub index: u32,
    /// Parameter name (`T`, `TKey`, ...).
    pub name: String,
}

/// Reference to a `TypeDef`
pub type TypeDefRc = Arc<TypeDef>;

/// A type defined in a module.
///
/// Member lists are append-only so that synthesized fields and methods can
/// be added through a shared `Arc` while the rest of the module is being
/// scanned; everything known at load time is a plain field.
pub struct TypeDef {
    /// Token of this definition in its module.
    pub token: Token,
    /// Namespace (can be empty, e.g. for synthesized container types).
    pub namespace: String,
    /// Type name.
    pub name: String,
    /// `TypeAttributes` bitmask.
    pub flags: u32,
    /// Base type, if any.
    pub extends: Option<TypeSig>,
    /// Field alignment for sequential-layout types.
    pub packing_size: Option<u16>,
    /// Explicit size in bytes for sequential-layout types.
    pub class_size: Option<u32>,
    /// Token of the enclosing type for nested definitions.
    pub enclosing: Option<Token>,
    /// Declared generic parameters, in declaration order.
    pub generic_params: Vec<GenericParam>,
    /// Custom attributes attached to this definition.
    pub custom_attributes: Vec<CustomAttribute>,
    /// All fields this type has.
    pub fields: boxcar::Vec<FieldRc>,
    /// All methods this type has.
    pub methods: boxcar::Vec<MethodRc>,
    /// All types nested inside this type.
    pub nested_types: boxcar::Vec<TypeDefRc>,
}

impl TypeDef {
    /// The `Namespace.Name` form used by the fullname index and by the
    /// companion-type ("ABI.") lookup.
    #[must_use]
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns true if the interface bit is set.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags & TypeAttributes::INTERFACE != 0
    }

    /// Find a method by name. When several share the name the first in
    /// declaration order wins.
    #[must_use]
    pub fn method_by_name(&self, name: &str) -> Option<MethodRc> {
        self.methods
            .iter()
            .map(|(_, m)| m)
            .find(|m| m.name == name)
            .cloned()
    }

    /// Find a field by name.
    #[must_use]
    pub fn field_by_name(&self, name: &str) -> Option<FieldRc> {
        self.fields
            .iter()
            .map(|(_, f)| f)
            .find(|f| f.name == name)
            .cloned()
    }
}
