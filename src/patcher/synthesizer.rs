//! Materializes precomputed IIDs into the module: a private implementation
//! details container, 16-byte static data blocks, and accessor methods.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use uguid::Guid;

use crate::{
    assembly::Instruction,
    metadata::{
        member::{FieldAttributes, MethodAttributes, MethodBody, MethodRc, MethodSig},
        module::Module,
        token::Token,
        typesystem::{GenericParam, TypeAttributes, TypeDefRc, TypeSig},
    },
    signature::{
        emitter::{self, RuntimeEmissionTokens, RuntimeSignature},
        iid,
    },
    Error, Result,
};

/// Name of the container type that owns every synthesized member.
pub const IMPLEMENTATION_DETAILS_NAME: &str = "<IIDPatcherImplementationDetails>";

/// Largest static data block the container format can express.
const MAX_DATA_BLOCK_SIZE: usize = u16::MAX as usize;

/// References the synthesizer needs imported into the patched module.
pub(crate) struct SynthesizerImports {
    /// Peer name of the core library, for base-type references.
    pub corlib: String,
    /// `ReadOnlySpan<byte>::.ctor(void*, int32)`.
    pub span_ctor: Token,
    /// `System.Guid::.ctor(ReadOnlySpan<byte>)`.
    pub guid_ctor: Token,
    /// The `ReadOnlySpan<byte>` shape accessors return.
    pub ros_byte: TypeSig,
    /// The `System.Guid` shape runtime accessors return.
    pub guid_type: TypeSig,
    /// Call targets for runtime-assembled accessor bodies; absent when the
    /// interop peer lacks the signature-assembly surface.
    pub runtime: Option<RuntimeEmissionTokens>,
}

/// Creates the per-module implementation-details container and one accessor
/// per distinct type, never duplicating a data blob.
///
/// The accessor cache is keyed on the structural [`TypeSig`] and uses an
/// atomic check-and-insert, so the one-accessor-per-type invariant holds
/// even if a future parallel scan races candidate insertions.
pub struct MetadataSynthesizer {
    module: Arc<Module>,
    details: TypeDefRc,
    imports: SynthesizerImports,
    data_blocks: DashMap<usize, TypeDefRc>,
    accessors: DashMap<TypeSig, MethodRc>,
}

impl MetadataSynthesizer {
    /// Create the synthesizer, adding the implementation-details container
    /// to the module (or reusing one left by an earlier patch run).
    pub(crate) fn new(module: Arc<Module>, imports: SynthesizerImports) -> MetadataSynthesizer {
        let details = module
            .type_by_fullname(IMPLEMENTATION_DETAILS_NAME)
            .unwrap_or_else(|| {
                let object = module.ensure_type_ref(&imports.corlib, "System", "Object");
                module.add_type(
                    "",
                    IMPLEMENTATION_DETAILS_NAME,
                    TypeAttributes::AUTO_CLASS | TypeAttributes::SEALED,
                    Some(TypeSig::Named(object)),
                )
            });
        MetadataSynthesizer {
            module,
            details,
            imports,
            data_blocks: DashMap::new(),
            accessors: DashMap::new(),
        }
    }

    /// The constructor call sites use to turn an accessor's byte view into
    /// a GUID value.
    #[must_use]
    pub(crate) fn guid_ctor(&self) -> Token {
        self.imports.guid_ctor
    }

    /// Get-or-create the accessor returning the precomputed 16-byte blob
    /// for `key`.
    ///
    /// # Errors
    /// Propagates [`Error::SizeConstraint`] from the data block guard; any
    /// other failure is per-site and non-fatal to the run.
    pub fn closed_accessor(&self, key: &TypeSig, display: &str, value: Guid) -> Result<MethodRc> {
        match self.accessors.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let method = self.build_closed_accessor(display, value)?;
                entry.insert(method.clone());
                Ok(method)
            }
        }
    }

    fn build_closed_accessor(&self, display: &str, value: Guid) -> Result<MethodRc> {
        let name = format!("<IIDData>{display}");
        if let Some(existing) = self.details.method_by_name(&name) {
            // Left over from a previous patch run over the same module.
            return Ok(existing);
        }

        let bytes = iid::iid_bytes(value);
        let block = self.data_block(bytes.len())?;
        let field = self.module.add_field(
            &self.details,
            &format!("<IIDDataField>{display}"),
            FieldAttributes::PRIVATE
                | FieldAttributes::STATIC
                | FieldAttributes::INIT_ONLY
                | FieldAttributes::HAS_FIELD_RVA,
            TypeSig::Named(block.token),
            Some(bytes.to_vec()),
        );

        let body = MethodBody {
            max_stack: 3,
            instructions: vec![
                Instruction::ldsflda(field.token),
                Instruction::ldc_i4(bytes.len() as i32),
                Instruction::newobj(self.imports.span_ctor),
                Instruction::ret(),
            ],
        };
        Ok(self.module.add_method(
            &self.details,
            &name,
            MethodAttributes::ASSEMBLY | MethodAttributes::STATIC,
            MethodSig::returning(self.imports.ros_byte.clone()),
            Vec::new(),
            Some(body),
        ))
    }

    /// Get-or-create the accessor that assembles the signature at
    /// instantiation time and delegates hashing to the runtime generator.
    ///
    /// Returns `Ok(None)` when the interop peer lacks the runtime assembly
    /// surface; the caller leaves such sites unpatched.
    ///
    /// # Errors
    /// Per-site failures only (unresolvable custom signature routine).
    pub fn runtime_accessor(
        &self,
        key: &TypeSig,
        display: &str,
        compiled: &RuntimeSignature,
    ) -> Result<Option<MethodRc>> {
        let Some(runtime) = &self.imports.runtime else {
            return Ok(None);
        };
        match self.accessors.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(Some(entry.get().clone())),
            Entry::Vacant(entry) => {
                let method = self.build_runtime_accessor(display, compiled, runtime)?;
                entry.insert(method.clone());
                Ok(Some(method))
            }
        }
    }

    fn build_runtime_accessor(
        &self,
        display: &str,
        compiled: &RuntimeSignature,
        runtime: &RuntimeEmissionTokens,
    ) -> Result<MethodRc> {
        let name = format!("<CreateIID>{display}");
        if let Some(existing) = self.details.method_by_name(&name) {
            return Ok(existing);
        }

        let body = emitter::emit_runtime_body(&self.module, runtime, compiled)?;
        let generic_params = (0..compiled.open_params.len())
            .map(|index| GenericParam {
                index: index as u32,
                name: format!("T{index}"),
            })
            .collect();
        Ok(self.module.add_method(
            &self.details,
            &name,
            MethodAttributes::ASSEMBLY | MethodAttributes::STATIC,
            MethodSig::returning(self.imports.guid_type.clone()),
            generic_params,
            Some(body),
        ))
    }

    /// Get-or-create the nested value type backing data blocks of `size`
    /// bytes.
    ///
    /// # Errors
    /// Returns the fatal [`Error::SizeConstraint`] for sizes the container
    /// cannot express; for genuine IID data this never fires.
    fn data_block(&self, size: usize) -> Result<TypeDefRc> {
        if size > MAX_DATA_BLOCK_SIZE {
            return Err(Error::SizeConstraint(size));
        }
        match self.data_blocks.entry(size) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let name = format!("<IIDDataBlock>Size={size}");
                let block = match self
                    .details
                    .nested_types
                    .iter()
                    .map(|(_, t)| t)
                    .find(|t| t.name == name)
                {
                    Some(existing) => existing.clone(),
                    None => {
                        let value_type =
                            self.module
                                .ensure_type_ref(&self.imports.corlib, "System", "ValueType");
                        self.module.add_nested_type(
                            &self.details,
                            &name,
                            TypeAttributes::AUTO_CLASS
                                | TypeAttributes::SEALED
                                | TypeAttributes::NESTED_ASSEMBLY
                                | TypeAttributes::SEQUENTIAL_LAYOUT
                                | TypeAttributes::ANSI_CLASS,
                            Some(TypeSig::Named(value_type)),
                            1,
                            size as u32,
                        )
                    }
                };
                entry.insert(block.clone());
                Ok(block)
            }
        }
    }

    /// The implementation-details container owning every synthesized member.
    #[must_use]
    pub fn details_type(&self) -> &TypeDefRc {
        &self.details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{member::MemberRefKind, typesystem::PrimitiveKind};

    fn imports(module: &Module) -> SynthesizerImports {
        let ros_def = module.ensure_type_ref("System.Runtime", "System", "ReadOnlySpan`1");
        let ros_byte = TypeSig::GenericInst {
            definition: ros_def,
            args: vec![TypeSig::Primitive(PrimitiveKind::U1)],
        };
        let ros_spec = module.ensure_type_spec(ros_byte.clone());
        let span_ctor = module.ensure_member_ref(
            ros_spec,
            ".ctor",
            MemberRefKind::Method(MethodSig {
                return_type: TypeSig::Primitive(PrimitiveKind::Void),
                params: vec![
                    TypeSig::Pointer(Box::new(TypeSig::Primitive(PrimitiveKind::Void))),
                    TypeSig::Primitive(PrimitiveKind::I4),
                ],
            }),
        );
        let guid_tr = module.ensure_type_ref("System.Runtime", "System", "Guid");
        let guid_ctor = module.ensure_member_ref(
            guid_tr,
            ".ctor",
            MemberRefKind::Method(MethodSig {
                return_type: TypeSig::Primitive(PrimitiveKind::Void),
                params: vec![ros_byte.clone()],
            }),
        );
        SynthesizerImports {
            corlib: "System.Runtime".to_string(),
            span_ctor,
            guid_ctor,
            ros_byte,
            guid_type: TypeSig::Named(guid_tr),
            runtime: None,
        }
    }

    #[test]
    fn accessor_is_created_once_per_type() {
        let module = Arc::new(Module::new("App"));
        let foo = module.add_type("App", "Foo", TypeAttributes::PUBLIC, None);
        let synth = MetadataSynthesizer::new(module.clone(), imports(&module));

        let guid = uguid::guid!("11111111-2222-3333-4444-555555555555");
        let key = TypeSig::Named(foo.token);
        let first = synth.closed_accessor(&key, "App.Foo", guid).unwrap();
        let second = synth.closed_accessor(&key, "App.Foo", guid).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let details = module.type_by_fullname(IMPLEMENTATION_DETAILS_NAME).unwrap();
        assert_eq!(details.fields.count(), 1);
        assert_eq!(details.methods.count(), 1);
        let (_, field) = details.fields.iter().next().unwrap();
        assert_eq!(
            field.initial_value.as_deref(),
            Some(&guid.to_bytes()[..])
        );
    }

    #[test]
    fn data_block_guard_is_fatal_shaped() {
        let module = Arc::new(Module::new("App"));
        let synth = MetadataSynthesizer::new(module.clone(), imports(&module));
        assert!(matches!(
            synth.data_block(usize::from(u16::MAX) + 1),
            Err(Error::SizeConstraint(_))
        ));
        assert!(synth.data_block(16).is_ok());
    }

    #[test]
    fn runtime_accessor_degrades_without_interop_surface() {
        let module = Arc::new(Module::new("App"));
        let synth = MetadataSynthesizer::new(module.clone(), imports(&module));
        let compiled = RuntimeSignature {
            steps: Vec::new(),
            open_params: Vec::new(),
        };
        let key = TypeSig::GenericParam {
            method: true,
            index: 0,
        };
        assert!(synth
            .runtime_accessor(&key, "!!0", &compiled)
            .unwrap()
            .is_none());
    }
}
