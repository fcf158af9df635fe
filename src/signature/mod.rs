//! Signature model, generation, rendering and IID derivation.
//!
//! The runtime computes the IID of a parameterized type by building a
//! textual signature of its structure and hashing it into a fixed
//! namespace. This module reproduces that computation from static metadata:
//!
//! - [`model::SignaturePart`] - the tree describing a type's ABI identity
//! - [`generator::SignatureGenerator`] - builds the tree from type structure
//! - [`emitter`] - renders a closed tree to its string and blob, or lowers
//!   an open tree to runtime-executed assembly steps
//! - [`iid`] - the namespace-seeded SHA-1 hash and GUID byte layout
//!
//! The contract that matters: for a fully closed type, the blob produced
//! here is identical to what the unpatched runtime call would have
//! produced.

pub mod emitter;
pub mod generator;
pub mod iid;
pub mod model;

pub use emitter::{RuntimeEmissionTokens, RuntimeSignature, SignatureStep};
pub use generator::SignatureGenerator;
pub use model::{BasicKind, CustomSignatureTarget, SignaturePart};
