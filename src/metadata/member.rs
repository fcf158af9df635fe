//! Fields, methods, method bodies, and cross-type member references.

use std::sync::{Arc, RwLock};

use crate::{
    assembly::Instruction,
    metadata::{token::Token, typesystem::GenericParam, typesystem::TypeSig},
};

#[allow(non_snake_case, missing_docs)]
/// Field attribute flags (ECMA-335 II.23.1.5), stored as a raw 2-byte mask.
pub mod FieldAttributes {
    pub const ACCESS_MASK: u16 = 0x0007;
    pub const PRIVATE: u16 = 0x0001;
    pub const ASSEMBLY: u16 = 0x0003;
    pub const PUBLIC: u16 = 0x0006;
    pub const STATIC: u16 = 0x0010;
    pub const INIT_ONLY: u16 = 0x0020;
    pub const HAS_FIELD_RVA: u16 = 0x0100;
}

#[allow(non_snake_case, missing_docs)]
/// Method attribute flags (ECMA-335 II.23.1.10), stored as a raw 2-byte mask.
pub mod MethodAttributes {
    pub const ACCESS_MASK: u16 = 0x0007;
    pub const PRIVATE: u16 = 0x0001;
    pub const ASSEMBLY: u16 = 0x0003;
    pub const PUBLIC: u16 = 0x0006;
    pub const STATIC: u16 = 0x0010;
    pub const VIRTUAL: u16 = 0x0040;
    pub const HIDE_BY_SIG: u16 = 0x0080;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SPECIAL_NAME: u16 = 0x0800;
}

/// Reference to a `Field`
pub type FieldRc = Arc<Field>;

/// A field defined in a module.
pub struct Field {
    /// Token of this field.
    pub token: Token,
    /// Field name.
    pub name: String,
    /// `FieldAttributes` bitmask.
    pub flags: u16,
    /// Declared type of the field.
    pub signature: TypeSig,
    /// Initial value bytes (the RVA-mapped data blob), if any.
    pub initial_value: Option<Vec<u8>>,
}

/// The signature of a method: return type plus parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// Return type.
    pub return_type: TypeSig,
    /// Parameter types, in declaration order.
    pub params: Vec<TypeSig>,
}

impl MethodSig {
    /// A signature with no parameters.
    #[must_use]
    pub fn returning(return_type: TypeSig) -> MethodSig {
        MethodSig {
            return_type,
            params: Vec::new(),
        }
    }
}

/// The executable body of a method: stack depth limit and instruction list.
///
/// The instruction list is the mutable surface the patcher rewrites; all
/// rewrites keep the instruction count unchanged so no offsets elsewhere in
/// the method ever need adjustment.
pub struct MethodBody {
    /// Maximum number of items on the operand stack.
    pub max_stack: u16,
    /// Decoded instruction stream.
    pub instructions: Vec<Instruction>,
}

/// Reference to a `Method`
pub type MethodRc = Arc<Method>;

/// A method defined in a module.
pub struct Method {
    /// Token of this method.
    pub token: Token,
    /// Method name.
    pub name: String,
    /// `MethodAttributes` bitmask.
    pub flags: u16,
    /// Return and parameter types.
    pub signature: MethodSig,
    /// Declared generic parameters, in declaration order.
    pub generic_params: Vec<GenericParam>,
    /// Body, absent for abstract or runtime-provided methods.
    pub body: RwLock<Option<MethodBody>>,
}

impl Method {
    /// Returns true if the static bit is set.
    #[must_use]
    pub fn is_static(&self) -> bool {
        u32::from(self.flags) & u32::from(MethodAttributes::STATIC) != 0
    }
}

/// What a [`MemberRef`] refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRefKind {
    /// A method, with the signature expected at the call site.
    Method(MethodSig),
    /// A field of the given type.
    Field(TypeSig),
}

/// Reference to a `MemberRef`
pub type MemberRefRc = Arc<MemberRef>;

/// A reference to a member of a type, used by call sites that target
/// methods of peer modules or of constructed types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Token of this reference.
    pub token: Token,
    /// TypeDef, TypeRef or TypeSpec token of the owning type.
    pub parent: Token,
    /// Member name (`.ctor` for constructors).
    pub name: String,
    /// Referenced member shape.
    pub kind: MemberRefKind,
}

/// Reference to a `MethodSpec`
pub type MethodSpecRc = Arc<MethodSpec>;

/// An instantiation of a generic method: the method plus its type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSpec {
    /// Token of this spec.
    pub token: Token,
    /// MethodDef or MemberRef token of the generic method.
    pub method: Token,
    /// Type arguments, in declaration order.
    pub args: Vec<TypeSig>,
}
