//! # iidpatch Prelude
//!
//! Convenient re-exports of the types most callers need.

/// The main error type for all iidpatch operations
pub use crate::Error;

/// The result type used throughout iidpatch
pub use crate::Result;

/// The patch orchestrator
pub use crate::patcher::GuidPatcher;

/// The per-module pattern matcher surface
pub use crate::patcher::matcher::{CallSiteMatch, MatcherTargets, PatternMatcher};

/// The synthesized-container name, useful for inspecting patched output
pub use crate::patcher::synthesizer::IMPLEMENTATION_DETAILS_NAME;

/// The module object model
pub use crate::metadata::module::{Module, ResolvedType};

/// Peer-module resolution
pub use crate::metadata::resolver::{AssemblyResolver, FolderResolver};

/// Metadata tokens
pub use crate::metadata::token::{TableId, Token};

/// Type system essentials
pub use crate::metadata::typesystem::{
    GenericParam, PrimitiveKind, TypeAttributes, TypeDef, TypeDefRc, TypeSig,
};

/// Members and method bodies
pub use crate::metadata::member::{
    Field, FieldAttributes, MemberRef, MemberRefKind, Method, MethodAttributes, MethodBody,
    MethodRc, MethodSig,
};

/// Custom attributes and the GUID reader
pub use crate::metadata::attributes::{read_guid_from_attribute, AttrArg, CustomAttribute};

/// The instruction model
pub use crate::assembly::{Immediate, Instruction, OpCode, Operand};

/// Signature trees and IID derivation
pub use crate::signature::{
    emitter, iid, BasicKind, SignatureGenerator, SignaturePart,
};

/// Low-level file parsing utilities
pub use crate::{File, Parser};
