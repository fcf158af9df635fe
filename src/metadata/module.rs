//! The mutable module object model.
//!
//! A [`Module`] owns token-keyed tables for everything the patcher touches:
//! type definitions, references into peer modules, constructed types, member
//! references, method instantiations and user strings. All tables use
//! lock-free containers so the synthesizer can add definitions through a
//! shared [`Arc<Module>`] while the orchestrator's scan is in flight, and so
//! the import caches keep their create-once guarantee under a future
//! parallel scan.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use crossbeam_skiplist::SkipMap;
use dashmap::{mapref::entry::Entry, DashMap};
use uguid::Guid;

use crate::{
    metadata::{
        attributes::CustomAttribute,
        container,
        member::{
            Field, FieldRc, MemberRef, MemberRefKind, MemberRefRc, Method, MethodBody, MethodRc,
            MethodSig, MethodSpec, MethodSpecRc,
        },
        resolver::AssemblyResolver,
        token::{TableId, Token},
        typesystem::{GenericParam, TypeDef, TypeDefRc, TypeSig},
    },
    Result,
};

/// A reference to a peer module by name.
#[derive(Debug, Clone)]
pub struct AssemblyRefData {
    /// Token of this reference.
    pub token: Token,
    /// Peer module name, as the resolver knows it.
    pub name: String,
}

/// Reference to an `AssemblyRefData`
pub type AssemblyRefRc = Arc<AssemblyRefData>;

/// A reference to a type defined in a peer module.
#[derive(Debug, Clone)]
pub struct TypeRefData {
    /// Token of this reference.
    pub token: Token,
    /// AssemblyRef token of the peer module.
    pub assembly_ref: Token,
    /// Namespace of the referenced type.
    pub namespace: String,
    /// Name of the referenced type.
    pub name: String,
}

/// Reference to a `TypeRefData`
pub type TypeRefRc = Arc<TypeRefData>;

impl TypeRefData {
    /// The `Namespace.Name` form of the referenced type.
    #[must_use]
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// The result of resolving a TypeDef/TypeRef token to its definition.
pub struct ResolvedType {
    /// The definition.
    pub definition: TypeDefRc,
    /// The module owning the definition.
    pub module: Arc<Module>,
    /// Name of the peer module, or `None` when the definition is local.
    pub assembly: Option<String>,
}

/// Key for the create-once import caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ImportKey {
    AssemblyRef(String),
    TypeRef(Token, String, String),
    TypeSpec(TypeSig),
    MemberRef(Token, String, MemberRefKind),
    MethodSpec(Token, Vec<TypeSig>),
    UserString(String),
}

#[derive(Default)]
struct TokenCounters {
    type_def: AtomicU32,
    field: AtomicU32,
    method_def: AtomicU32,
    type_ref: AtomicU32,
    type_spec: AtomicU32,
    member_ref: AtomicU32,
    method_spec: AtomicU32,
    assembly_ref: AtomicU32,
    user_string: AtomicU32,
}

impl TokenCounters {
    fn counter(&self, table: TableId) -> &AtomicU32 {
        match table {
            TableId::TypeDef => &self.type_def,
            TableId::Field => &self.field,
            TableId::MethodDef => &self.method_def,
            TableId::TypeRef => &self.type_ref,
            TableId::TypeSpec => &self.type_spec,
            TableId::MemberRef => &self.member_ref,
            TableId::MethodSpec => &self.method_spec,
            TableId::AssemblyRef => &self.assembly_ref,
            TableId::UserString => &self.user_string,
        }
    }

    fn next(&self, table: TableId) -> Token {
        let row = self.counter(table).fetch_add(1, Ordering::Relaxed) + 1;
        Token::from_parts(table, row)
    }

    fn bump_to(&self, table: TableId, row: u32) {
        self.counter(table).fetch_max(row, Ordering::Relaxed);
    }
}

/// One module: the unit of patching.
pub struct Module {
    /// Module name; the output file is written as `<name>.iidm`.
    pub name: String,
    /// Module version identifier.
    pub mvid: Guid,

    types: SkipMap<Token, TypeDefRc>,
    methods: SkipMap<Token, MethodRc>,
    type_refs: SkipMap<Token, TypeRefRc>,
    type_specs: SkipMap<Token, Arc<TypeSig>>,
    member_refs: SkipMap<Token, MemberRefRc>,
    method_specs: SkipMap<Token, MethodSpecRc>,
    assembly_refs: SkipMap<Token, AssemblyRefRc>,
    user_strings: SkipMap<Token, Arc<String>>,

    fullname_index: DashMap<String, Token>,
    import_cache: DashMap<ImportKey, Token>,
    counters: TokenCounters,
}

impl Module {
    /// Create an empty module with the given name.
    #[must_use]
    pub fn new(name: &str) -> Module {
        Module::with_identity(name, Guid::ZERO)
    }

    pub(crate) fn with_identity(name: &str, mvid: Guid) -> Module {
        Module {
            name: name.to_string(),
            mvid,
            types: SkipMap::new(),
            methods: SkipMap::new(),
            type_refs: SkipMap::new(),
            type_specs: SkipMap::new(),
            member_refs: SkipMap::new(),
            method_specs: SkipMap::new(),
            assembly_refs: SkipMap::new(),
            user_strings: SkipMap::new(),
            fullname_index: DashMap::new(),
            import_cache: DashMap::new(),
            counters: TokenCounters::default(),
        }
    }

    /// Read a module from its on-disk container.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] / [`crate::Error::OutOfBounds`]
    /// for damaged containers and [`crate::Error::FileError`] for I/O
    /// failures.
    pub fn from_file(path: &Path) -> Result<Module> {
        let file = crate::file::File::open(path)?;
        container::read_module(file.data())
    }

    /// Read a module from container bytes already in memory.
    ///
    /// # Errors
    /// Same failure modes as [`Module::from_file`], minus the I/O.
    pub fn from_bytes(data: &[u8]) -> Result<Module> {
        container::read_module(data)
    }

    /// Serialize this module into container bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        container::write_module(self)
    }

    /// Write this module as `<dir>/<name>.iidm`, returning the path.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be written.
    pub fn save(&self, dir: &Path) -> Result<std::path::PathBuf> {
        let path = dir.join(format!("{}.iidm", self.name));
        std::fs::write(&path, self.to_bytes())?;
        Ok(path)
    }

    // ------------------------------------------------------------------
    // Table access
    // ------------------------------------------------------------------

    /// Look up a type definition by token.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<TypeDefRc> {
        self.types.get(&token).map(|e| e.value().clone())
    }

    /// Look up a method definition by token.
    #[must_use]
    pub fn method_def(&self, token: Token) -> Option<MethodRc> {
        self.methods.get(&token).map(|e| e.value().clone())
    }

    /// Look up a type reference by token.
    #[must_use]
    pub fn type_ref(&self, token: Token) -> Option<TypeRefRc> {
        self.type_refs.get(&token).map(|e| e.value().clone())
    }

    /// Look up a constructed type by token.
    #[must_use]
    pub fn type_spec(&self, token: Token) -> Option<Arc<TypeSig>> {
        self.type_specs.get(&token).map(|e| e.value().clone())
    }

    /// Look up a member reference by token.
    #[must_use]
    pub fn member_ref(&self, token: Token) -> Option<MemberRefRc> {
        self.member_refs.get(&token).map(|e| e.value().clone())
    }

    /// Look up a method instantiation by token.
    #[must_use]
    pub fn method_spec(&self, token: Token) -> Option<MethodSpecRc> {
        self.method_specs.get(&token).map(|e| e.value().clone())
    }

    /// Look up a peer-module reference by token.
    #[must_use]
    pub fn assembly_ref(&self, token: Token) -> Option<AssemblyRefRc> {
        self.assembly_refs.get(&token).map(|e| e.value().clone())
    }

    /// Look up a user string by token.
    #[must_use]
    pub fn user_string(&self, token: Token) -> Option<Arc<String>> {
        self.user_strings.get(&token).map(|e| e.value().clone())
    }

    /// Look up a top-level type definition by its `Namespace.Name`.
    #[must_use]
    pub fn type_by_fullname(&self, fullname: &str) -> Option<TypeDefRc> {
        let token = *self.fullname_index.get(fullname)?;
        self.type_def(token)
    }

    /// Find the peer-module reference with the given name.
    #[must_use]
    pub fn assembly_ref_by_name(&self, name: &str) -> Option<AssemblyRefRc> {
        self.assembly_refs
            .iter()
            .map(|e| e.value().clone())
            .find(|a| a.name == name)
    }

    /// All type definitions, in token order.
    #[must_use]
    pub fn type_defs(&self) -> Vec<TypeDefRc> {
        self.types.iter().map(|e| e.value().clone()).collect()
    }

    /// All type references, in token order.
    #[must_use]
    pub fn type_ref_list(&self) -> Vec<TypeRefRc> {
        self.type_refs.iter().map(|e| e.value().clone()).collect()
    }

    /// All constructed types, in token order.
    #[must_use]
    pub fn type_spec_list(&self) -> Vec<(Token, Arc<TypeSig>)> {
        self.type_specs
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    /// All member references, in token order.
    #[must_use]
    pub fn member_ref_list(&self) -> Vec<MemberRefRc> {
        self.member_refs.iter().map(|e| e.value().clone()).collect()
    }

    /// All method instantiations, in token order.
    #[must_use]
    pub fn method_spec_list(&self) -> Vec<MethodSpecRc> {
        self.method_specs.iter().map(|e| e.value().clone()).collect()
    }

    /// All peer-module references, in token order.
    #[must_use]
    pub fn assembly_ref_list(&self) -> Vec<AssemblyRefRc> {
        self.assembly_refs.iter().map(|e| e.value().clone()).collect()
    }

    /// All user strings with their tokens, in token order.
    #[must_use]
    pub fn user_string_list(&self) -> Vec<(Token, Arc<String>)> {
        self.user_strings
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Add a top-level type definition.
    pub fn add_type(
        &self,
        namespace: &str,
        name: &str,
        flags: u32,
        extends: Option<TypeSig>,
    ) -> TypeDefRc {
        let token = self.counters.next(TableId::TypeDef);
        self.insert_type_def(TypeDef {
            token,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags,
            extends,
            packing_size: None,
            class_size: None,
            enclosing: None,
            generic_params: Vec::new(),
            custom_attributes: Vec::new(),
            fields: boxcar::Vec::new(),
            methods: boxcar::Vec::new(),
            nested_types: boxcar::Vec::new(),
        })
    }

    /// Add a type definition nested inside `parent`, with explicit layout.
    pub fn add_nested_type(
        &self,
        parent: &TypeDefRc,
        name: &str,
        flags: u32,
        extends: Option<TypeSig>,
        packing_size: u16,
        class_size: u32,
    ) -> TypeDefRc {
        let token = self.counters.next(TableId::TypeDef);
        let def = self.insert_type_def(TypeDef {
            token,
            namespace: String::new(),
            name: name.to_string(),
            flags,
            extends,
            packing_size: Some(packing_size),
            class_size: Some(class_size),
            enclosing: Some(parent.token),
            generic_params: Vec::new(),
            custom_attributes: Vec::new(),
            fields: boxcar::Vec::new(),
            methods: boxcar::Vec::new(),
            nested_types: boxcar::Vec::new(),
        });
        parent.nested_types.push(def.clone());
        def
    }

    pub(crate) fn insert_type_def(&self, def: TypeDef) -> TypeDefRc {
        let def = Arc::new(def);
        self.counters.bump_to(TableId::TypeDef, def.token.row());
        if def.enclosing.is_none() {
            self.fullname_index.insert(def.fullname(), def.token);
        }
        self.types.insert(def.token, def.clone());
        def
    }

    /// Add a field to `owner`.
    pub fn add_field(
        &self,
        owner: &TypeDefRc,
        name: &str,
        flags: u16,
        signature: TypeSig,
        initial_value: Option<Vec<u8>>,
    ) -> FieldRc {
        let token = self.counters.next(TableId::Field);
        let field = Arc::new(Field {
            token,
            name: name.to_string(),
            flags,
            signature,
            initial_value,
        });
        owner.fields.push(field.clone());
        field
    }

    pub(crate) fn insert_field(&self, owner: &TypeDefRc, field: Field) -> FieldRc {
        self.counters.bump_to(TableId::Field, field.token.row());
        let field = Arc::new(field);
        owner.fields.push(field.clone());
        field
    }

    /// Add a method to `owner`.
    pub fn add_method(
        &self,
        owner: &TypeDefRc,
        name: &str,
        flags: u16,
        signature: MethodSig,
        generic_params: Vec<GenericParam>,
        body: Option<MethodBody>,
    ) -> MethodRc {
        let token = self.counters.next(TableId::MethodDef);
        self.insert_method(
            owner,
            Method {
                token,
                name: name.to_string(),
                flags,
                signature,
                generic_params,
                body: std::sync::RwLock::new(body),
            },
        )
    }

    pub(crate) fn insert_method(&self, owner: &TypeDefRc, method: Method) -> MethodRc {
        self.counters.bump_to(TableId::MethodDef, method.token.row());
        let method = Arc::new(method);
        owner.methods.push(method.clone());
        self.methods.insert(method.token, method.clone());
        method
    }

    /// Attach a custom attribute list to a freshly created definition.
    ///
    /// Only used by the container reader; synthesized types never carry
    /// attributes.
    pub fn add_attributed_type(
        &self,
        namespace: &str,
        name: &str,
        flags: u32,
        extends: Option<TypeSig>,
        custom_attributes: Vec<CustomAttribute>,
    ) -> TypeDefRc {
        let token = self.counters.next(TableId::TypeDef);
        self.insert_type_def(TypeDef {
            token,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags,
            extends,
            packing_size: None,
            class_size: None,
            enclosing: None,
            generic_params: Vec::new(),
            custom_attributes,
            fields: boxcar::Vec::new(),
            methods: boxcar::Vec::new(),
            nested_types: boxcar::Vec::new(),
        })
    }

    pub(crate) fn insert_type_ref(&self, data: TypeRefData) -> TypeRefRc {
        self.counters.bump_to(TableId::TypeRef, data.token.row());
        let data = Arc::new(data);
        self.type_refs.insert(data.token, data.clone());
        data
    }

    pub(crate) fn insert_assembly_ref(&self, data: AssemblyRefData) -> AssemblyRefRc {
        self.counters.bump_to(TableId::AssemblyRef, data.token.row());
        let data = Arc::new(data);
        self.assembly_refs.insert(data.token, data.clone());
        data
    }

    pub(crate) fn insert_type_spec(&self, token: Token, sig: TypeSig) {
        self.counters.bump_to(TableId::TypeSpec, token.row());
        self.type_specs.insert(token, Arc::new(sig));
    }

    pub(crate) fn insert_member_ref(&self, data: MemberRef) {
        self.counters.bump_to(TableId::MemberRef, data.token.row());
        self.member_refs.insert(data.token, Arc::new(data));
    }

    pub(crate) fn insert_method_spec(&self, data: MethodSpec) {
        self.counters.bump_to(TableId::MethodSpec, data.token.row());
        self.method_specs.insert(data.token, Arc::new(data));
    }

    pub(crate) fn insert_user_string(&self, token: Token, value: String) {
        self.counters.bump_to(TableId::UserString, token.row());
        self.user_strings.insert(token, Arc::new(value));
    }

    // ------------------------------------------------------------------
    // Imports (create-or-reuse)
    // ------------------------------------------------------------------

    fn cached_import<F>(&self, key: ImportKey, create: F) -> Token
    where
        F: FnOnce() -> Token,
    {
        match self.import_cache.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let token = create();
                entry.insert(token);
                token
            }
        }
    }

    /// Create-or-reuse a reference to the peer module `name`.
    pub fn ensure_assembly_ref(&self, name: &str) -> Token {
        if let Some(existing) = self.assembly_ref_by_name(name) {
            return existing.token;
        }
        self.cached_import(ImportKey::AssemblyRef(name.to_string()), || {
            let token = self.counters.next(TableId::AssemblyRef);
            self.insert_assembly_ref(AssemblyRefData {
                token,
                name: name.to_string(),
            });
            token
        })
    }

    /// Create-or-reuse a reference to `namespace.name` in the peer module
    /// `assembly`.
    pub fn ensure_type_ref(&self, assembly: &str, namespace: &str, name: &str) -> Token {
        let assembly_ref = self.ensure_assembly_ref(assembly);
        self.cached_import(
            ImportKey::TypeRef(assembly_ref, namespace.to_string(), name.to_string()),
            || {
                let token = self.counters.next(TableId::TypeRef);
                self.insert_type_ref(TypeRefData {
                    token,
                    assembly_ref,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                });
                token
            },
        )
    }

    /// Create-or-reuse a constructed type entry for `sig`.
    pub fn ensure_type_spec(&self, sig: TypeSig) -> Token {
        self.cached_import(ImportKey::TypeSpec(sig.clone()), || {
            let token = self.counters.next(TableId::TypeSpec);
            self.insert_type_spec(token, sig);
            token
        })
    }

    /// Create-or-reuse a member reference.
    pub fn ensure_member_ref(&self, parent: Token, name: &str, kind: MemberRefKind) -> Token {
        self.cached_import(
            ImportKey::MemberRef(parent, name.to_string(), kind.clone()),
            || {
                let token = self.counters.next(TableId::MemberRef);
                self.insert_member_ref(MemberRef {
                    token,
                    parent,
                    name: name.to_string(),
                    kind,
                });
                token
            },
        )
    }

    /// Create-or-reuse a generic method instantiation.
    pub fn ensure_method_spec(&self, method: Token, args: Vec<TypeSig>) -> Token {
        self.cached_import(ImportKey::MethodSpec(method, args.clone()), || {
            let token = self.counters.next(TableId::MethodSpec);
            self.insert_method_spec(MethodSpec {
                token,
                method,
                args,
            });
            token
        })
    }

    /// Create-or-reuse a user string entry.
    pub fn ensure_user_string(&self, value: &str) -> Token {
        self.cached_import(ImportKey::UserString(value.to_string()), || {
            let token = self.counters.next(TableId::UserString);
            self.insert_user_string(token, value.to_string());
            token
        })
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// The `TypeSig` denoted by an `ldtoken` operand.
    #[must_use]
    pub fn type_sig_for_token(&self, token: Token) -> Option<TypeSig> {
        match token.table()? {
            TableId::TypeDef | TableId::TypeRef => Some(TypeSig::Named(token)),
            TableId::TypeSpec => self.type_spec(token).map(|sig| (*sig).clone()),
            _ => None,
        }
    }

    /// The fullname behind a TypeDef/TypeRef token, without resolving.
    #[must_use]
    pub fn named_fullname(&self, token: Token) -> Option<String> {
        match token.table()? {
            TableId::TypeDef => self.type_def(token).map(|d| d.fullname()),
            TableId::TypeRef => self.type_ref(token).map(|r| r.fullname()),
            _ => None,
        }
    }

    /// Resolve a TypeDef/TypeRef token to its definition, following the
    /// peer-module reference through `resolver` when needed.
    #[must_use]
    pub fn resolve_named(
        self: &Arc<Self>,
        token: Token,
        resolver: &dyn AssemblyResolver,
    ) -> Option<ResolvedType> {
        match token.table()? {
            TableId::TypeDef => Some(ResolvedType {
                definition: self.type_def(token)?,
                module: self.clone(),
                assembly: None,
            }),
            TableId::TypeRef => {
                let type_ref = self.type_ref(token)?;
                let assembly = self.assembly_ref(type_ref.assembly_ref)?;
                let peer = resolver.resolve(&assembly.name)?;
                let definition = peer.type_by_fullname(&type_ref.fullname())?;
                Some(ResolvedType {
                    definition,
                    module: peer,
                    assembly: Some(assembly.name.clone()),
                })
            }
            _ => None,
        }
    }

    /// Resolve a call operand (MethodDef, MemberRef or MethodSpec token) to
    /// the method definition it ultimately targets.
    ///
    /// Returns `None` when any link in the chain cannot be resolved; the
    /// pattern matcher treats that as a non-matching call.
    #[must_use]
    pub fn resolve_method_token(
        self: &Arc<Self>,
        token: Token,
        resolver: &dyn AssemblyResolver,
    ) -> Option<MethodRc> {
        match token.table()? {
            TableId::MethodDef => self.method_def(token),
            TableId::MemberRef => {
                let member = self.member_ref(token)?;
                let MemberRefKind::Method(sig) = &member.kind else {
                    return None;
                };
                let parent = self.resolve_member_parent(member.parent, resolver)?;
                parent
                    .methods
                    .iter()
                    .map(|(_, m)| m)
                    .find(|m| m.name == member.name && m.signature.params.len() == sig.params.len())
                    .or_else(|| {
                        parent
                            .methods
                            .iter()
                            .map(|(_, m)| m)
                            .find(|m| m.name == member.name)
                    })
                    .cloned()
            }
            TableId::MethodSpec => {
                let spec = self.method_spec(token)?;
                self.resolve_method_token(spec.method, resolver)
            }
            _ => None,
        }
    }

    fn resolve_member_parent(
        self: &Arc<Self>,
        parent: Token,
        resolver: &dyn AssemblyResolver,
    ) -> Option<TypeDefRc> {
        match parent.table()? {
            TableId::TypeDef | TableId::TypeRef => {
                self.resolve_named(parent, resolver).map(|r| r.definition)
            }
            TableId::TypeSpec => {
                let sig = self.type_spec(parent)?;
                match &*sig {
                    TypeSig::Named(inner) => {
                        self.resolve_named(*inner, resolver).map(|r| r.definition)
                    }
                    TypeSig::GenericInst { definition, .. } => self
                        .resolve_named(*definition, resolver)
                        .map(|r| r.definition),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Classification helpers (defs owned by this module)
    // ------------------------------------------------------------------

    /// Fullname of the base type of `def`, if it extends a named type.
    #[must_use]
    pub fn extends_fullname(&self, def: &TypeDef) -> Option<String> {
        match def.extends.as_ref()? {
            TypeSig::Named(token) => self.named_fullname(*token),
            _ => None,
        }
    }

    /// Returns true if `def` is an enum definition.
    #[must_use]
    pub fn is_enum(&self, def: &TypeDef) -> bool {
        self.extends_fullname(def).as_deref() == Some("System.Enum")
    }

    /// Returns true if `def` is a value type (including enums).
    #[must_use]
    pub fn is_value_type(&self, def: &TypeDef) -> bool {
        matches!(
            self.extends_fullname(def).as_deref(),
            Some("System.ValueType") | Some("System.Enum")
        )
    }

    /// Returns true if `def` is a delegate definition.
    #[must_use]
    pub fn is_delegate(&self, def: &TypeDef) -> bool {
        matches!(
            self.extends_fullname(def).as_deref(),
            Some("System.MulticastDelegate") | Some("System.Delegate")
        )
    }

    // ------------------------------------------------------------------
    // Display
    // ------------------------------------------------------------------

    /// A human-readable rendering of `sig`, used for synthesized member
    /// names and diagnostics. Never used as a cache key.
    #[must_use]
    pub fn type_display_name(&self, sig: &TypeSig) -> String {
        match sig {
            TypeSig::Primitive(kind) => kind.fullname().to_string(),
            TypeSig::Named(token) => self
                .named_fullname(*token)
                .unwrap_or_else(|| token.to_string()),
            TypeSig::GenericInst { definition, args } => {
                let base = self
                    .named_fullname(*definition)
                    .unwrap_or_else(|| definition.to_string());
                let args = args
                    .iter()
                    .map(|a| self.type_display_name(a))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{base}<{args}>")
            }
            TypeSig::GenericParam { method: true, index } => format!("!!{index}"),
            TypeSig::GenericParam {
                method: false,
                index,
            } => format!("!{index}"),
            TypeSig::SzArray(inner) => format!("{}[]", self.type_display_name(inner)),
            TypeSig::Pointer(inner) => format!("{}*", self.type_display_name(inner)),
        }
    }
}
