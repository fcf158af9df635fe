//! Custom attributes and the attribute-based GUID reader.

use std::sync::Arc;

use uguid::Guid;

use crate::metadata::{
    module::{Module, ResolvedType},
    resolver::AssemblyResolver,
    token::Token,
    typesystem::{TypeDef, TypeDefRc},
};

/// A fixed constructor argument of a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrArg {
    /// A literal string argument.
    String(String),
    /// A 32-bit integer argument.
    I4(i32),
    /// A boolean argument.
    Bool(bool),
}

/// A custom attribute attached to a type definition.
///
/// The attribute is identified by its type (a TypeDef or TypeRef token in
/// the owning module) rather than its constructor; the patcher only ever
/// needs the type identity and the fixed arguments.
#[derive(Debug, Clone)]
pub struct CustomAttribute {
    /// TypeDef or TypeRef token of the attribute type.
    pub attr_type: Token,
    /// Fixed constructor arguments, in order.
    pub args: Vec<AttrArg>,
}

/// Extracts the literal GUID a type declares through the well-known GUID
/// attribute.
///
/// When the type itself lacks the attribute, its companion "ABI" type -
/// found by prefixing the fully qualified name, in the same module as the
/// resolved definition - is consulted once. Absence is not an error; the
/// caller treats `None` as "cannot patch this site".
#[must_use]
pub fn read_guid_from_attribute(
    resolved: &ResolvedType,
    guid_attribute: &TypeDefRc,
    resolver: &dyn AssemblyResolver,
) -> Option<Guid> {
    if let Some(guid) =
        attribute_guid(&resolved.definition, &resolved.module, guid_attribute, resolver)
    {
        return Some(guid);
    }

    let companion = resolved
        .module
        .type_by_fullname(&format!("ABI.{}", resolved.definition.fullname()))?;
    attribute_guid(&companion, &resolved.module, guid_attribute, resolver)
}

fn attribute_guid(
    def: &TypeDefRc,
    module: &Arc<Module>,
    guid_attribute: &TypeDefRc,
    resolver: &dyn AssemblyResolver,
) -> Option<Guid> {
    for attr in &def.custom_attributes {
        let Some(attr_type) = module.resolve_named(attr.attr_type, resolver) else {
            continue;
        };
        if !Arc::ptr_eq(&attr_type.definition, guid_attribute) {
            continue;
        }
        if let Some(AttrArg::String(text)) = attr.args.first() {
            return text.parse::<Guid>().ok();
        }
    }
    None
}

/// Returns true if `def` carries an attribute whose type has the given
/// fullname.
///
/// This is a name-level check (no cross-module resolution); it is used for
/// marker attributes such as `System.FlagsAttribute` where the name is the
/// contract.
#[must_use]
pub fn has_attribute_named(def: &TypeDef, module: &Module, fullname: &str) -> bool {
    def.custom_attributes
        .iter()
        .any(|attr| module.named_fullname(attr.attr_type).as_deref() == Some(fullname))
}
