//! The signature model - a type's WinRT-ABI identity as a tree.

use uguid::Guid;

/// The primitive ABI kinds a signature can mention directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    /// Boolean, rendered `b1`
    Bool,
    /// 16-bit character, rendered `c2`
    Char,
    /// Signed 8-bit integer, rendered `i1`
    I1,
    /// Unsigned 8-bit integer, rendered `u1`
    U1,
    /// Signed 16-bit integer, rendered `i2`
    I2,
    /// Unsigned 16-bit integer, rendered `u2`
    U2,
    /// Signed 32-bit integer, rendered `i4`
    I4,
    /// Unsigned 32-bit integer, rendered `u4`
    U4,
    /// Signed 64-bit integer, rendered `i8`
    I8,
    /// Unsigned 64-bit integer, rendered `u8`
    U8,
    /// 32-bit float, rendered `f4`
    F4,
    /// 64-bit float, rendered `f8`
    F8,
    /// String, rendered by its lowercase name
    String,
    /// 16-byte GUID value, rendered `g16`
    Guid,
    /// The inspectable interface pointer, rendered in its parenthesized
    /// canonical form
    Object,
}

impl BasicKind {
    /// The canonical ABI-kind rendering.
    ///
    /// Two renderings are irregular by grammar: the interface-pointer kind
    /// and the string kind render as their canonical textual forms rather
    /// than a coded name.
    #[must_use]
    pub fn canonical_name(self) -> &'static str {
        match self {
            BasicKind::Bool => "b1",
            BasicKind::Char => "c2",
            BasicKind::I1 => "i1",
            BasicKind::U1 => "u1",
            BasicKind::I2 => "i2",
            BasicKind::U2 => "u2",
            BasicKind::I4 => "i4",
            BasicKind::U4 => "u4",
            BasicKind::I8 => "i8",
            BasicKind::U8 => "u8",
            BasicKind::F4 => "f4",
            BasicKind::F8 => "f8",
            BasicKind::String => "string",
            BasicKind::Guid => "g16",
            BasicKind::Object => "cinterface(IInspectable)",
        }
    }
}

/// Where a custom signature routine lives, as an import descriptor into
/// the patched module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSignatureTarget {
    /// Peer module name, or `None` when the routine is defined locally.
    pub assembly: Option<String>,
    /// Namespace of the declaring type.
    pub namespace: String,
    /// Name of the declaring type.
    pub name: String,
    /// Name of the signature-producing routine.
    pub method: String,
}

/// One node of a signature tree.
///
/// The variant set is closed on purpose: the renderings in the emitter are
/// exhaustive matches, so a new identity shape cannot be added without the
/// compiler pointing at every place that must learn about it.
#[derive(Debug, Clone, PartialEq)]
pub enum SignaturePart {
    /// A primitive ABI kind.
    Basic(BasicKind),
    /// A parameterized shape with ordered nested signatures.
    Composite {
        /// The grouping tag (`pinterface`, `enum`, `struct`, ...).
        grouping: &'static str,
        /// The owning entity's own rendering (a braced GUID for
        /// parameterized interfaces, a fullname for enums and structs).
        this_entity: String,
        /// Nested signatures, in declaration order. Order is significant.
        children: Vec<SignaturePart>,
    },
    /// A type whose IID is statically known.
    Literal(Guid),
    /// A delegate identified solely by its own IID.
    NonGenericDelegate(Guid),
    /// An as-yet-unbound generic parameter; resolution is deferred to the
    /// instantiation that substitutes it.
    OpenParameter {
        /// True when the parameter is owned by a method (`!!n`).
        method: bool,
        /// Declaration index of the parameter.
        index: u32,
    },
    /// A type that supplies its own signature-producing routine, called at
    /// runtime instead of the textual algorithm.
    CustomAlgorithm(CustomSignatureTarget),
}

impl SignaturePart {
    /// Returns true if the tree contains an [`SignaturePart::OpenParameter`]
    /// anywhere.
    #[must_use]
    pub fn has_open_parameters(&self) -> bool {
        match self {
            SignaturePart::OpenParameter { .. } => true,
            SignaturePart::Composite { children, .. } => {
                children.iter().any(SignaturePart::has_open_parameters)
            }
            _ => false,
        }
    }

    /// Returns true if the tree can be evaluated to a byte blob ahead of
    /// time.
    ///
    /// Open parameters defer resolution to instantiation; a custom routine
    /// only exists at runtime. Either one forces the runtime-assembly path.
    #[must_use]
    pub fn is_statically_evaluable(&self) -> bool {
        match self {
            SignaturePart::OpenParameter { .. } | SignaturePart::CustomAlgorithm(_) => false,
            SignaturePart::Composite { children, .. } => {
                children.iter().all(SignaturePart::is_statically_evaluable)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_tree_is_statically_evaluable() {
        let tree = SignaturePart::Composite {
            grouping: "pinterface",
            this_entity: "{FAA585EA-6214-4217-AFDA-7F46DE5869B3}".to_string(),
            children: vec![SignaturePart::Basic(BasicKind::String)],
        };
        assert!(tree.is_statically_evaluable());
        assert!(!tree.has_open_parameters());
    }

    #[test]
    fn open_parameter_forces_runtime_path() {
        let tree = SignaturePart::Composite {
            grouping: "pinterface",
            this_entity: "{FAA585EA-6214-4217-AFDA-7F46DE5869B3}".to_string(),
            children: vec![SignaturePart::OpenParameter {
                method: true,
                index: 0,
            }],
        };
        assert!(!tree.is_statically_evaluable());
        assert!(tree.has_open_parameters());
    }

    #[test]
    fn custom_algorithm_forces_runtime_path_without_open_params() {
        let tree = SignaturePart::Composite {
            grouping: "pinterface",
            this_entity: "{FAA585EA-6214-4217-AFDA-7F46DE5869B3}".to_string(),
            children: vec![SignaturePart::CustomAlgorithm(CustomSignatureTarget {
                assembly: None,
                namespace: "App".to_string(),
                name: "Custom".to_string(),
                method: "GetGuidSignature".to_string(),
            })],
        };
        assert!(!tree.is_statically_evaluable());
        assert!(!tree.has_open_parameters());
    }
}
