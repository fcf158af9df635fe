//! Shared fixtures: in-memory peer modules standing in for the core
//! library, the interop runtime, and a Windows metadata module, plus a
//! builder for input modules with IID-computation call sites.
#![allow(dead_code)]

use std::sync::Arc;

use iidpatch::prelude::*;

/// The IID of `IIterable<T>`'s open definition, as Windows declares it.
pub const IITERABLE_GUID: &str = "faa585ea-6214-4217-afda-7f46de5869b3";

/// The IID of `IMap<K, V>`'s open definition.
pub const IMAP_GUID: &str = "3c2925fe-8519-45c1-aa79-197b6718c1c1";

/// The IID of the non-generic completion delegate.
pub const HANDLER_GUID: &str = "a4ed5c81-76c9-40bd-8be6-b1d90fb20ae7";

fn stub_method(module: &Module, owner: &TypeDefRc, name: &str, params: Vec<TypeSig>) {
    module.add_method(
        owner,
        name,
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        MethodSig {
            return_type: TypeSig::Primitive(PrimitiveKind::Void),
            params,
        },
        Vec::new(),
        None,
    );
}

/// The core library peer: base types plus `Type::GetTypeFromHandle`.
pub fn corlib() -> Arc<Module> {
    let m = Arc::new(Module::new("System.Runtime"));
    let object = m.add_type("System", "Object", TypeAttributes::PUBLIC, None);
    let value_type = m.add_type(
        "System",
        "ValueType",
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
        Some(TypeSig::Named(object.token)),
    );
    m.add_type(
        "System",
        "Enum",
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
        Some(TypeSig::Named(value_type.token)),
    );
    let delegate = m.add_type(
        "System",
        "Delegate",
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
        Some(TypeSig::Named(object.token)),
    );
    m.add_type(
        "System",
        "MulticastDelegate",
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
        Some(TypeSig::Named(delegate.token)),
    );
    m.add_type(
        "System",
        "Attribute",
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
        Some(TypeSig::Named(object.token)),
    );
    m.add_type(
        "System",
        "RuntimeTypeHandle",
        TypeAttributes::PUBLIC,
        Some(TypeSig::Named(value_type.token)),
    );
    m.add_type(
        "System",
        "Guid",
        TypeAttributes::PUBLIC,
        Some(TypeSig::Named(value_type.token)),
    );
    let system_type = m.add_type(
        "System",
        "Type",
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
        Some(TypeSig::Named(object.token)),
    );
    stub_method(&m, &system_type, "GetTypeFromHandle", vec![]);
    m
}

/// The interop runtime peer: `GuidGenerator` and `TypeExtensions`.
pub fn winrt_runtime() -> Arc<Module> {
    let m = Arc::new(Module::new("WinRT.Runtime"));
    let generator = m.add_type("WinRT", "GuidGenerator", TypeAttributes::PUBLIC, None);
    stub_method(&m, &generator, "GetIID", vec![]);
    stub_method(&m, &generator, "CreateIID", vec![]);
    stub_method(&m, &generator, "GetSignature", vec![]);
    stub_method(
        &m,
        &generator,
        "CreateIidFromSignature",
        vec![TypeSig::Primitive(PrimitiveKind::String)],
    );
    let extensions = m.add_type("WinRT", "TypeExtensions", TypeAttributes::PUBLIC, None);
    stub_method(&m, &extensions, "GetHelperType", vec![]);
    m
}

/// The peer declaring the well-known GUID attribute.
pub fn interop_services() -> Arc<Module> {
    let m = Arc::new(Module::new("System.Runtime.InteropServices"));
    let attribute = m.ensure_type_ref("System.Runtime", "System", "Attribute");
    m.add_type(
        "System.Runtime.InteropServices",
        "GuidAttribute",
        TypeAttributes::PUBLIC | TypeAttributes::SEALED,
        Some(TypeSig::Named(attribute)),
    );
    m
}

/// A Windows metadata peer holding attributed generic definitions.
pub fn windows_metadata() -> Arc<Module> {
    let m = Arc::new(Module::new("Windows"));
    let guid_attr = m.ensure_type_ref(
        "System.Runtime.InteropServices",
        "System.Runtime.InteropServices",
        "GuidAttribute",
    );

    m.add_attributed_type(
        "Windows.Foundation.Collections",
        "IIterable`1",
        TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
        None,
        vec![CustomAttribute {
            attr_type: guid_attr,
            args: vec![AttrArg::String(IITERABLE_GUID.to_string())],
        }],
    );

    m.add_attributed_type(
        "Windows.Foundation.Collections",
        "IMap`2",
        TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
        None,
        vec![CustomAttribute {
            attr_type: guid_attr,
            args: vec![AttrArg::String(IMAP_GUID.to_string())],
        }],
    );

    let enum_base = m.ensure_type_ref("System.Runtime", "System", "Enum");
    let value_type = m.ensure_type_ref("System.Runtime", "System", "ValueType");
    let delegate_base = m.ensure_type_ref("System.Runtime", "System", "MulticastDelegate");
    let flags_attr = m.ensure_type_ref("System.Runtime", "System", "FlagsAttribute");

    m.add_type(
        "Windows.Foundation",
        "AsyncStatus",
        TypeAttributes::PUBLIC | TypeAttributes::SEALED,
        Some(TypeSig::Named(enum_base)),
    );
    m.add_attributed_type(
        "Windows.Foundation",
        "FileAttributes",
        TypeAttributes::PUBLIC | TypeAttributes::SEALED,
        Some(TypeSig::Named(enum_base)),
        vec![CustomAttribute {
            attr_type: flags_attr,
            args: Vec::new(),
        }],
    );

    let point = m.add_type(
        "Windows.Foundation",
        "Point",
        TypeAttributes::PUBLIC | TypeAttributes::SEALED | TypeAttributes::SEQUENTIAL_LAYOUT,
        Some(TypeSig::Named(value_type)),
    );
    m.add_field(
        &point,
        "X",
        FieldAttributes::PUBLIC,
        TypeSig::Primitive(PrimitiveKind::R8),
        None,
    );
    m.add_field(
        &point,
        "Y",
        FieldAttributes::PUBLIC,
        TypeSig::Primitive(PrimitiveKind::R8),
        None,
    );

    m.add_attributed_type(
        "Windows.Foundation",
        "AsyncActionCompletedHandler",
        TypeAttributes::PUBLIC | TypeAttributes::SEALED,
        Some(TypeSig::Named(delegate_base)),
        vec![CustomAttribute {
            attr_type: guid_attr,
            args: vec![AttrArg::String(HANDLER_GUID.to_string())],
        }],
    );

    let custom = m.add_type(
        "Windows.Foundation",
        "CustomSignatureThing",
        TypeAttributes::PUBLIC,
        None,
    );
    m.add_method(
        &custom,
        "GetGuidSignature",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        MethodSig::returning(TypeSig::Primitive(PrimitiveKind::String)),
        Vec::new(),
        None,
    );
    m
}

/// An input module wired to the peers above, with helpers for adding
/// attributed types and call-site methods.
pub struct TestWorld {
    /// The module under patch.
    pub module: Arc<Module>,
    /// Resolver with every peer registered.
    pub resolver: FolderResolver,
    /// MemberRef for `Type::GetTypeFromHandle`.
    pub get_type_from_handle: Token,
    /// MemberRef for `TypeExtensions::GetHelperType`.
    pub get_helper_type: Token,
    /// MemberRef for `GuidGenerator::GetIID`.
    pub get_iid: Token,
    /// MemberRef for `GuidGenerator::CreateIID`.
    pub create_iid: Token,
    /// TypeRef to the GUID attribute, for attaching attributes locally.
    pub guid_attribute: Token,
}

impl TestWorld {
    /// A world with all peers available.
    pub fn new() -> TestWorld {
        let resolver = FolderResolver::empty();
        resolver.register(corlib());
        resolver.register(winrt_runtime());
        resolver.register(interop_services());
        resolver.register(windows_metadata());
        TestWorld::with_resolver(resolver)
    }

    fn with_resolver(resolver: FolderResolver) -> TestWorld {
        let module = Arc::new(Module::new("App"));
        let type_ref = module.ensure_type_ref("System.Runtime", "System", "Type");
        let generator = module.ensure_type_ref("WinRT.Runtime", "WinRT", "GuidGenerator");
        let extensions = module.ensure_type_ref("WinRT.Runtime", "WinRT", "TypeExtensions");
        let guid_attribute = module.ensure_type_ref(
            "System.Runtime.InteropServices",
            "System.Runtime.InteropServices",
            "GuidAttribute",
        );
        let kind = MemberRefKind::Method(MethodSig::returning(TypeSig::Primitive(
            PrimitiveKind::Void,
        )));
        let get_type_from_handle =
            module.ensure_member_ref(type_ref, "GetTypeFromHandle", kind.clone());
        let get_iid = module.ensure_member_ref(generator, "GetIID", kind.clone());
        let create_iid = module.ensure_member_ref(generator, "CreateIID", kind.clone());
        let get_helper_type = module.ensure_member_ref(extensions, "GetHelperType", kind);

        TestWorld {
            module,
            resolver,
            get_type_from_handle,
            get_helper_type,
            get_iid,
            create_iid,
            guid_attribute,
        }
    }

    /// Add a type tagged with the GUID attribute.
    pub fn add_guid_type(&self, namespace: &str, name: &str, guid: &str) -> TypeDefRc {
        self.module.add_attributed_type(
            namespace,
            name,
            TypeAttributes::PUBLIC,
            None,
            vec![CustomAttribute {
                attr_type: self.guid_attribute,
                args: vec![AttrArg::String(guid.to_string())],
            }],
        )
    }

    /// Add a static method whose body is exactly `instructions`.
    pub fn add_method_with_body(&self, name: &str, instructions: Vec<Instruction>) -> MethodRc {
        let owner = self
            .module
            .type_by_fullname("App.Program")
            .unwrap_or_else(|| {
                self.module
                    .add_type("App", "Program", TypeAttributes::PUBLIC, None)
            });
        self.module.add_method(
            &owner,
            name,
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            MethodSig::returning(TypeSig::Primitive(PrimitiveKind::Void)),
            Vec::new(),
            Some(MethodBody {
                max_stack: 8,
                instructions,
            }),
        )
    }

    /// The canonical short call-site sequence for `target`.
    pub fn short_site(&self, target: Token) -> Vec<Instruction> {
        vec![
            Instruction::ldtoken(target),
            Instruction::call(self.get_type_from_handle),
            Instruction::call(self.get_iid),
            Instruction::ret(),
        ]
    }

    /// Instruction count of a method body.
    pub fn body_len(method: &MethodRc) -> usize {
        method
            .body
            .read()
            .unwrap()
            .as_ref()
            .map(|b| b.instructions.len())
            .unwrap_or(0)
    }

    /// Clone of a method's instructions.
    pub fn body_instructions(method: &MethodRc) -> Vec<Instruction> {
        method
            .body
            .read()
            .unwrap()
            .as_ref()
            .map(|b| b.instructions.clone())
            .unwrap_or_default()
    }
}
