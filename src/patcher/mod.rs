//! The patch orchestrator and its collaborators.
//!
//! One [`GuidPatcher`] instance drives one pass over one module: the
//! [`matcher::PatternMatcher`] locates IID-computation call sites, the
//! signature subsystem derives each type's identity, and the
//! [`synthesizer::MetadataSynthesizer`] persists precomputed blobs and
//! accessors before the orchestrator overwrites the call-site span in
//! place.

pub mod matcher;
pub mod synthesizer;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use crate::{
    assembly::Instruction,
    metadata::{
        attributes::read_guid_from_attribute,
        member::{MemberRefKind, MethodRc, MethodSig},
        module::Module,
        resolver::AssemblyResolver,
        typesystem::{PrimitiveKind, TypeDefRc, TypeSig},
    },
    signature::{emitter, RuntimeEmissionTokens, SignatureGenerator},
    Error, Result,
};

use matcher::{CallSiteMatch, MatcherTargets, PatternMatcher};
use synthesizer::{MetadataSynthesizer, SynthesizerImports};

/// Peer names under which the core library may be referenced.
const CORLIB_NAMES: &[&str] = &[
    "System.Runtime",
    "System.Private.CoreLib",
    "mscorlib",
    "netstandard",
];

/// Peer name of the interop runtime.
const WINRT_RUNTIME_NAME: &str = "WinRT.Runtime";

/// Peer name declaring the GUID attribute.
const INTEROP_SERVICES_NAME: &str = "System.Runtime.InteropServices";

/// The well-known interop surface, resolved once per patch run.
struct WellKnown {
    corlib_name: String,
    get_type_from_handle: MethodRc,
    get_helper_type: MethodRc,
    get_iid: MethodRc,
    create_iid: MethodRc,
    guid_attribute: TypeDefRc,
    /// True when the peer also exposes the signature-assembly surface
    /// (`GetSignature` + `CreateIidFromSignature`) needed for open shapes.
    has_runtime_assembly: bool,
}

/// How a matched span is overwritten.
enum Rewrite {
    /// `call accessor; newobj Guid(ReadOnlySpan<byte>); nop...`
    Closed(crate::metadata::token::Token),
    /// `call accessor<...>; nop...` - the accessor returns the GUID value.
    Runtime(crate::metadata::token::Token),
}

/// Patches one module: finds every IID-computation call site and replaces
/// it with a load of the precomputed identity.
///
/// Owns the per-run caches, so patching several modules in one process
/// stays independent.
pub struct GuidPatcher<'a> {
    module: Arc<Module>,
    resolver: &'a dyn AssemblyResolver,
    wellknown: Option<WellKnown>,
    synthesizer: OnceLock<MetadataSynthesizer>,
}

impl<'a> GuidPatcher<'a> {
    /// Create a patcher for `module`.
    ///
    /// A module that does not reference the interop runtime (or whose
    /// peers cannot be resolved) still constructs successfully; its
    /// [`GuidPatcher::process`] run simply patches nothing.
    #[must_use]
    pub fn new(module: Arc<Module>, resolver: &'a dyn AssemblyResolver) -> GuidPatcher<'a> {
        let wellknown = resolve_wellknown(&module, resolver);
        if wellknown.is_none() {
            log::debug!(
                "interop surface unavailable; {} will be left unpatched",
                module.name
            );
        }
        GuidPatcher {
            module,
            resolver,
            wellknown,
            synthesizer: OnceLock::new(),
        }
    }

    /// The module being patched.
    #[must_use]
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Run one patch pass over every method body, returning the number of
    /// call sites patched.
    ///
    /// Per-site failures are logged and skipped; only internal invariant
    /// violations abort the run.
    ///
    /// # Errors
    /// Returns [`Error::SizeConstraint`] if the synthesizer's data block
    /// guard fires.
    pub fn process(&self) -> Result<usize> {
        let Some(wellknown) = &self.wellknown else {
            return Ok(0);
        };

        // Snapshot before patching: accessors synthesized during this run
        // must not be rescanned by it.
        let mut methods = Vec::new();
        for def in self.module.type_defs() {
            for (_, method) in def.methods.iter() {
                methods.push(method.clone());
            }
        }

        let matcher = PatternMatcher::new(
            self.module.clone(),
            self.resolver,
            MatcherTargets {
                get_type_from_handle: wellknown.get_type_from_handle.clone(),
                get_helper_type: wellknown.get_helper_type.clone(),
                get_iid: wellknown.get_iid.clone(),
                create_iid: wellknown.create_iid.clone(),
            },
        );

        let mut patched = 0usize;
        for method in methods {
            let sites = {
                let guard = read_lock!(method.body);
                match guard.as_ref() {
                    Some(body) => matcher.scan(&body.instructions),
                    None => continue,
                }
            };
            for site in sites {
                match self.patch_site(wellknown, &method, &site) {
                    Ok(true) => patched += 1,
                    Ok(false) => {}
                    Err(err @ Error::SizeConstraint(_)) => return Err(err),
                    Err(err) => {
                        log::warn!(
                            "failed to patch call site at {}+{} in {}: {}",
                            method.name,
                            site.start,
                            self.module.name,
                            err
                        );
                    }
                }
            }
        }
        Ok(patched)
    }

    /// Write the patched module as `<dir>/<name>.iidm`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the file cannot be written.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        self.module.save(dir)
    }

    fn patch_site(
        &self,
        wellknown: &WellKnown,
        method: &MethodRc,
        site: &CallSiteMatch,
    ) -> Result<bool> {
        let display = self.module.type_display_name(&site.type_sig);

        let rewrite = match &site.type_sig {
            TypeSig::Named(token) => {
                let Some(resolved) = self.module.resolve_named(*token, self.resolver) else {
                    return Ok(false);
                };
                let Some(value) =
                    read_guid_from_attribute(&resolved, &wellknown.guid_attribute, self.resolver)
                else {
                    // Not patchable; leave the site untouched.
                    return Ok(false);
                };
                let synthesizer = self.synthesizer(wellknown);
                Rewrite::Closed(synthesizer.closed_accessor(&site.type_sig, &display, value)?.token)
            }
            sig @ TypeSig::GenericInst { .. } => {
                let generator = SignatureGenerator::new(self.resolver, &wellknown.guid_attribute);
                let tree = generator.generate(&self.module, sig)?;
                let synthesizer = self.synthesizer(wellknown);
                if tree.is_statically_evaluable() {
                    let value = emitter::evaluate(&tree)?;
                    Rewrite::Closed(synthesizer.closed_accessor(sig, &display, value)?.token)
                } else {
                    let compiled = emitter::compile(&tree);
                    let Some(accessor) = synthesizer.runtime_accessor(sig, &display, &compiled)?
                    else {
                        return Ok(false);
                    };
                    let target = if compiled.open_params.is_empty() {
                        accessor.token
                    } else {
                        let args: Vec<TypeSig> = compiled
                            .open_params
                            .iter()
                            .map(|&(method_owned, index)| TypeSig::GenericParam {
                                method: method_owned,
                                index,
                            })
                            .collect();
                        self.module.ensure_method_spec(accessor.token, args)
                    };
                    Rewrite::Runtime(target)
                }
            }
            _ => return Ok(false),
        };

        let mut guard = write_lock!(method.body);
        let Some(body) = guard.as_mut() else {
            return Ok(false);
        };
        let instructions = &mut body.instructions;
        match rewrite {
            Rewrite::Closed(accessor) => {
                instructions[site.start] = Instruction::call(accessor);
                instructions[site.start + 1] =
                    Instruction::newobj(self.synthesizer(wellknown).guid_ctor());
                for slot in site.start + 2..site.start + site.len {
                    instructions[slot] = Instruction::nop();
                }
            }
            Rewrite::Runtime(target) => {
                instructions[site.start] = Instruction::call(target);
                for slot in site.start + 1..site.start + site.len {
                    instructions[slot] = Instruction::nop();
                }
            }
        }
        Ok(true)
    }

    fn synthesizer(&self, wellknown: &WellKnown) -> &MetadataSynthesizer {
        self.synthesizer.get_or_init(|| {
            MetadataSynthesizer::new(
                self.module.clone(),
                build_imports(&self.module, wellknown),
            )
        })
    }
}

fn resolve_wellknown(module: &Arc<Module>, resolver: &dyn AssemblyResolver) -> Option<WellKnown> {
    let corlib_ref = CORLIB_NAMES
        .iter()
        .find_map(|name| module.assembly_ref_by_name(name))?;
    let corlib = resolver.resolve(&corlib_ref.name)?;
    let system_type = corlib.type_by_fullname("System.Type")?;
    let get_type_from_handle = system_type.method_by_name("GetTypeFromHandle")?;

    let winrt_ref = module.assembly_ref_by_name(WINRT_RUNTIME_NAME)?;
    let winrt = resolver.resolve(&winrt_ref.name)?;
    let generator = winrt.type_by_fullname("WinRT.GuidGenerator")?;
    let get_iid = generator.method_by_name("GetIID")?;
    let create_iid = generator.method_by_name("CreateIID")?;
    let get_signature = generator.method_by_name("GetSignature");
    let create_iid_from_signature = generator.method_by_name("CreateIidFromSignature");
    let extensions = winrt.type_by_fullname("WinRT.TypeExtensions")?;
    let get_helper_type = extensions.method_by_name("GetHelperType")?;

    let interop_ref = module.assembly_ref_by_name(INTEROP_SERVICES_NAME)?;
    let interop = resolver.resolve(&interop_ref.name)?;
    let guid_attribute =
        interop.type_by_fullname("System.Runtime.InteropServices.GuidAttribute")?;

    Some(WellKnown {
        corlib_name: corlib_ref.name.clone(),
        get_type_from_handle,
        get_helper_type,
        get_iid,
        create_iid,
        guid_attribute,
        has_runtime_assembly: get_signature.is_some() && create_iid_from_signature.is_some(),
    })
}

fn build_imports(module: &Module, wellknown: &WellKnown) -> SynthesizerImports {
    let corlib = wellknown.corlib_name.as_str();

    let ros_def = module.ensure_type_ref(corlib, "System", "ReadOnlySpan`1");
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

    let guid_def = module.ensure_type_ref(corlib, "System", "Guid");
    let guid_ctor = module.ensure_member_ref(
        guid_def,
        ".ctor",
        MemberRefKind::Method(MethodSig {
            return_type: TypeSig::Primitive(PrimitiveKind::Void),
            params: vec![ros_byte.clone()],
        }),
    );

    let runtime = wellknown.has_runtime_assembly.then(|| {
        let type_def = module.ensure_type_ref(corlib, "System", "Type");
        let handle_def = module.ensure_type_ref(corlib, "System", "RuntimeTypeHandle");
        let get_type_from_handle = module.ensure_member_ref(
            type_def,
            "GetTypeFromHandle",
            MemberRefKind::Method(MethodSig {
                return_type: TypeSig::Named(type_def),
                params: vec![TypeSig::Named(handle_def)],
            }),
        );
        let string_def = module.ensure_type_ref(corlib, "System", "String");
        let string_concat = module.ensure_member_ref(
            string_def,
            "Concat",
            MemberRefKind::Method(MethodSig {
                return_type: TypeSig::Primitive(PrimitiveKind::String),
                params: vec![
                    TypeSig::Primitive(PrimitiveKind::String),
                    TypeSig::Primitive(PrimitiveKind::String),
                ],
            }),
        );
        let generator_def = module.ensure_type_ref(WINRT_RUNTIME_NAME, "WinRT", "GuidGenerator");
        let get_signature = module.ensure_member_ref(
            generator_def,
            "GetSignature",
            MemberRefKind::Method(MethodSig {
                return_type: TypeSig::Primitive(PrimitiveKind::String),
                params: vec![TypeSig::Named(type_def)],
            }),
        );
        let create_iid_from_signature = module.ensure_member_ref(
            generator_def,
            "CreateIidFromSignature",
            MemberRefKind::Method(MethodSig {
                return_type: TypeSig::Named(guid_def),
                params: vec![TypeSig::Primitive(PrimitiveKind::String)],
            }),
        );
        RuntimeEmissionTokens {
            get_type_from_handle,
            get_signature,
            string_concat,
            create_iid_from_signature,
        }
    });

    SynthesizerImports {
        corlib: corlib.to_string(),
        span_ctor,
        guid_ctor,
        ros_byte,
        guid_type: TypeSig::Named(guid_def),
        runtime,
    }
}
