//! Builds signature trees from static type structure.

use std::sync::Arc;

use crate::{
    metadata::{
        attributes::{has_attribute_named, read_guid_from_attribute},
        member::FieldAttributes,
        module::{Module, ResolvedType},
        resolver::AssemblyResolver,
        token::Token,
        typesystem::{PrimitiveKind, TypeDefRc, TypeSig},
    },
    signature::{
        iid,
        model::{BasicKind, CustomSignatureTarget, SignaturePart},
    },
    Error, Result,
};

/// Name of the conventional signature-producing routine a type may declare
/// to override the textual algorithm.
const CUSTOM_SIGNATURE_METHOD: &str = "GetGuidSignature";

/// Walks a type's static structure (generic arguments, base types,
/// attributes, fields) and produces its [`SignaturePart`] tree.
///
/// The walk is fully deterministic: children always follow declared
/// generic-argument or field order, and nothing is read from an unordered
/// container. For a given closed type the tree, and therefore its rendering
/// and hash, is identical across runs.
pub struct SignatureGenerator<'a> {
    resolver: &'a dyn AssemblyResolver,
    guid_attribute: &'a TypeDefRc,
}

impl<'a> SignatureGenerator<'a> {
    /// Create a generator that recognizes `guid_attribute` as the literal
    /// GUID marker.
    #[must_use]
    pub fn new(
        resolver: &'a dyn AssemblyResolver,
        guid_attribute: &'a TypeDefRc,
    ) -> SignatureGenerator<'a> {
        SignatureGenerator {
            resolver,
            guid_attribute,
        }
    }

    /// Produce the signature tree for `sig` as seen from `module`.
    ///
    /// # Errors
    /// Returns [`Error::TypeError`] when the type has no derivable ABI
    /// identity (no GUID attribute, unsupported shape, unresolvable
    /// reference). Callers treat that as "leave this call site unchanged".
    pub fn generate(&self, module: &Arc<Module>, sig: &TypeSig) -> Result<SignaturePart> {
        match sig {
            TypeSig::Primitive(kind) => basic_for_primitive(*kind)
                .map(SignaturePart::Basic)
                .ok_or_else(|| {
                    Error::TypeError(format!("{} has no ABI signature", kind.fullname()))
                }),
            TypeSig::GenericParam { method, index } => Ok(SignaturePart::OpenParameter {
                method: *method,
                index: *index,
            }),
            TypeSig::Named(token) => self.named_signature(module, *token),
            TypeSig::GenericInst { definition, args } => {
                self.generic_instance_signature(module, *definition, args)
            }
            TypeSig::SzArray(_) | TypeSig::Pointer(_) => Err(Error::TypeError(format!(
                "no static ABI signature for {}",
                module.type_display_name(sig)
            ))),
        }
    }

    fn generic_instance_signature(
        &self,
        module: &Arc<Module>,
        definition: Token,
        args: &[TypeSig],
    ) -> Result<SignaturePart> {
        let resolved = self.resolve(module, definition)?;
        let guid = read_guid_from_attribute(&resolved, self.guid_attribute, self.resolver)
            .ok_or_else(|| {
                Error::TypeError(format!(
                    "generic definition {} carries no GUID attribute",
                    resolved.definition.fullname()
                ))
            })?;

        let mut children = Vec::with_capacity(args.len());
        for arg in args {
            children.push(self.generate(module, arg)?);
        }
        Ok(SignaturePart::Composite {
            grouping: "pinterface",
            this_entity: iid::braced(guid),
            children,
        })
    }

    fn named_signature(&self, module: &Arc<Module>, token: Token) -> Result<SignaturePart> {
        let resolved = self.resolve(module, token)?;
        let def = &resolved.definition;
        let def_module = &resolved.module;

        if let Some(target) = self.custom_signature_target(&resolved) {
            return Ok(SignaturePart::CustomAlgorithm(target));
        }

        if def_module.is_enum(def) {
            let underlying = if has_attribute_named(def, def_module, "System.FlagsAttribute") {
                BasicKind::U4
            } else {
                BasicKind::I4
            };
            return Ok(SignaturePart::Composite {
                grouping: "enum",
                this_entity: def.fullname(),
                children: vec![SignaturePart::Basic(underlying)],
            });
        }

        if def_module.is_value_type(def) {
            if def.fullname() == "System.Guid" {
                return Ok(SignaturePart::Basic(BasicKind::Guid));
            }
            let mut children = Vec::new();
            for (_, field) in def.fields.iter() {
                if field.flags & FieldAttributes::STATIC != 0 {
                    // static fields carry no instance identity
                    continue;
                }
                children.push(self.generate(def_module, &field.signature)?);
            }
            return Ok(SignaturePart::Composite {
                grouping: "struct",
                this_entity: def.fullname(),
                children,
            });
        }

        if def_module.is_delegate(def) && def.generic_params.is_empty() {
            let guid = read_guid_from_attribute(&resolved, self.guid_attribute, self.resolver)
                .ok_or_else(|| {
                    Error::TypeError(format!(
                        "delegate {} carries no GUID attribute",
                        def.fullname()
                    ))
                })?;
            return Ok(SignaturePart::NonGenericDelegate(guid));
        }

        read_guid_from_attribute(&resolved, self.guid_attribute, self.resolver)
            .map(SignaturePart::Literal)
            .ok_or_else(|| {
                Error::TypeError(format!("{} carries no GUID attribute", def.fullname()))
            })
    }

    fn custom_signature_target(&self, resolved: &ResolvedType) -> Option<CustomSignatureTarget> {
        let mut candidates = vec![resolved.definition.clone()];
        if let Some(companion) = resolved
            .module
            .type_by_fullname(&format!("ABI.{}", resolved.definition.fullname()))
        {
            candidates.push(companion);
        }
        for def in candidates {
            if let Some(method) = def.method_by_name(CUSTOM_SIGNATURE_METHOD) {
                if method.is_static() {
                    return Some(CustomSignatureTarget {
                        assembly: resolved.assembly.clone(),
                        namespace: def.namespace.clone(),
                        name: def.name.clone(),
                        method: CUSTOM_SIGNATURE_METHOD.to_string(),
                    });
                }
            }
        }
        None
    }

    fn resolve(&self, module: &Arc<Module>, token: Token) -> Result<ResolvedType> {
        module
            .resolve_named(token, self.resolver)
            .ok_or(Error::TypeNotFound(token))
    }
}

fn basic_for_primitive(kind: PrimitiveKind) -> Option<BasicKind> {
    Some(match kind {
        PrimitiveKind::Boolean => BasicKind::Bool,
        PrimitiveKind::Char => BasicKind::Char,
        PrimitiveKind::I1 => BasicKind::I1,
        PrimitiveKind::U1 => BasicKind::U1,
        PrimitiveKind::I2 => BasicKind::I2,
        PrimitiveKind::U2 => BasicKind::U2,
        PrimitiveKind::I4 => BasicKind::I4,
        PrimitiveKind::U4 => BasicKind::U4,
        PrimitiveKind::I8 => BasicKind::I8,
        PrimitiveKind::U8 => BasicKind::U8,
        PrimitiveKind::R4 => BasicKind::F4,
        PrimitiveKind::R8 => BasicKind::F8,
        PrimitiveKind::String => BasicKind::String,
        PrimitiveKind::Object => BasicKind::Object,
        PrimitiveKind::Void | PrimitiveKind::I | PrimitiveKind::U => return None,
    })
}
