//! The native on-disk container format (`.iidm`).
//!
//! A small tagged binary format holding one module's tables: little-endian
//! integers, `u32`-length-prefixed UTF-8 strings, ECMA `ELEMENT_TYPE` tags
//! for type signatures and standard CIL opcode values for instructions.
//! Reference tables (assembly refs, type refs, type specs, member refs,
//! method specs, user strings) are written densely in token order; rows of
//! the definition tables carry their tokens explicitly so that tokens
//! embedded in signatures and instruction streams survive a round trip
//! even after members were appended out of declaration order.

use crate::{
    assembly::{Immediate, Instruction, OpCode, Operand, OperandKind},
    file::{parser::Parser, writer::Writer},
    metadata::{
        attributes::{AttrArg, CustomAttribute},
        member::{
            Field, MemberRef, MemberRefKind, Method, MethodBody, MethodSig, MethodSpec,
        },
        module::{AssemblyRefData, Module, TypeRefData},
        token::{TableId, Token},
        typesystem::{GenericParam, TypeDef, TypeSig},
    },
    Result,
};

/// Container magic: `IIDM` in little-endian byte order.
pub const CONTAINER_MAGIC: u32 = 0x4D44_4949;

/// Current container format version.
pub const CONTAINER_VERSION: u16 = 1;

// ----------------------------------------------------------------------
// Writing
// ----------------------------------------------------------------------

/// Serialize `module` into container bytes.
#[must_use]
pub fn write_module(module: &Module) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(CONTAINER_MAGIC);
    w.write_u16(CONTAINER_VERSION);
    w.write_prefixed_string(&module.name);
    w.write_bytes(&module.mvid.to_bytes());

    let assembly_refs = module.assembly_ref_list();
    w.write_u32(assembly_refs.len() as u32);
    for aref in &assembly_refs {
        w.write_prefixed_string(&aref.name);
    }

    let type_refs = module.type_ref_list();
    w.write_u32(type_refs.len() as u32);
    for tref in &type_refs {
        w.write_u32(tref.assembly_ref.value());
        w.write_prefixed_string(&tref.namespace);
        w.write_prefixed_string(&tref.name);
    }

    let user_strings = module.user_string_list();
    w.write_u32(user_strings.len() as u32);
    for (_, value) in &user_strings {
        w.write_prefixed_string(value);
    }

    let type_specs = module.type_spec_list();
    w.write_u32(type_specs.len() as u32);
    for (_, sig) in &type_specs {
        sig.write_to(&mut w);
    }

    let member_refs = module.member_ref_list();
    w.write_u32(member_refs.len() as u32);
    for mref in &member_refs {
        w.write_u32(mref.parent.value());
        w.write_prefixed_string(&mref.name);
        match &mref.kind {
            MemberRefKind::Method(sig) => {
                w.write_u8(0);
                write_method_sig(&mut w, sig);
            }
            MemberRefKind::Field(sig) => {
                w.write_u8(1);
                sig.write_to(&mut w);
            }
        }
    }

    let method_specs = module.method_spec_list();
    w.write_u32(method_specs.len() as u32);
    for spec in &method_specs {
        w.write_u32(spec.method.value());
        w.write_u16(spec.args.len() as u16);
        for arg in &spec.args {
            arg.write_to(&mut w);
        }
    }

    let type_defs = module.type_defs();
    w.write_u32(type_defs.len() as u32);
    for def in &type_defs {
        write_type_def(&mut w, def);
    }

    w.into_bytes()
}

fn write_type_def(w: &mut Writer, def: &TypeDef) {
    w.write_u32(def.token.value());
    w.write_u32(def.enclosing.map_or(0, |token| token.value()));
    w.write_prefixed_string(&def.namespace);
    w.write_prefixed_string(&def.name);
    w.write_u32(def.flags);

    match &def.extends {
        Some(sig) => {
            w.write_u8(1);
            sig.write_to(w);
        }
        None => w.write_u8(0),
    }
    match def.packing_size {
        Some(packing) => {
            w.write_u8(1);
            w.write_u16(packing);
        }
        None => w.write_u8(0),
    }
    match def.class_size {
        Some(size) => {
            w.write_u8(1);
            w.write_u32(size);
        }
        None => w.write_u8(0),
    }

    w.write_u16(def.generic_params.len() as u16);
    for param in &def.generic_params {
        w.write_prefixed_string(&param.name);
    }

    w.write_u16(def.custom_attributes.len() as u16);
    for attr in &def.custom_attributes {
        w.write_u32(attr.attr_type.value());
        w.write_u16(attr.args.len() as u16);
        for arg in &attr.args {
            match arg {
                AttrArg::String(s) => {
                    w.write_u8(0);
                    w.write_prefixed_string(s);
                }
                AttrArg::I4(v) => {
                    w.write_u8(1);
                    w.write_i32(*v);
                }
                AttrArg::Bool(v) => {
                    w.write_u8(2);
                    w.write_u8(u8::from(*v));
                }
            }
        }
    }

    w.write_u32(def.fields.count() as u32);
    for (_, field) in def.fields.iter() {
        w.write_u32(field.token.value());
        w.write_prefixed_string(&field.name);
        w.write_u16(field.flags);
        field.signature.write_to(w);
        match &field.initial_value {
            Some(bytes) => {
                w.write_u8(1);
                w.write_u32(bytes.len() as u32);
                w.write_bytes(bytes);
            }
            None => w.write_u8(0),
        }
    }

    w.write_u32(def.methods.count() as u32);
    for (_, method) in def.methods.iter() {
        w.write_u32(method.token.value());
        w.write_prefixed_string(&method.name);
        w.write_u16(method.flags);
        write_method_sig(w, &method.signature);
        w.write_u16(method.generic_params.len() as u16);
        for param in &method.generic_params {
            w.write_prefixed_string(&param.name);
        }
        match &*read_lock!(method.body) {
            Some(body) => {
                w.write_u8(1);
                w.write_u16(body.max_stack);
                w.write_u32(body.instructions.len() as u32);
                for instruction in &body.instructions {
                    write_instruction(w, instruction);
                }
            }
            None => w.write_u8(0),
        }
    }
}

fn write_method_sig(w: &mut Writer, sig: &MethodSig) {
    sig.return_type.write_to(w);
    w.write_u16(sig.params.len() as u16);
    for param in &sig.params {
        param.write_to(w);
    }
}

fn write_instruction(w: &mut Writer, instruction: &Instruction) {
    w.write_u16(instruction.opcode as u16);
    match (&instruction.operand, instruction.opcode.operand_kind()) {
        (Operand::None, OperandKind::None) => {}
        (Operand::Immediate(Immediate::Int8(v)), OperandKind::Int8) => w.write_i8(*v),
        (Operand::Immediate(Immediate::Int32(v)), OperandKind::Int32) => w.write_i32(*v),
        (Operand::Immediate(Immediate::Int64(v)), OperandKind::Int64) => w.write_i64(*v),
        (Operand::Token(token), OperandKind::Token) => w.write_u32(token.value()),
        // A mismatched operand cannot be produced through the typed
        // constructors; encode a null so the stream stays aligned.
        (_, OperandKind::None) => {}
        (_, OperandKind::Int8) => w.write_i8(0),
        (_, OperandKind::Int32) => w.write_i32(0),
        (_, OperandKind::Int64) => w.write_i64(0),
        (_, OperandKind::Token) => w.write_u32(0),
    }
}

// ----------------------------------------------------------------------
// Reading
// ----------------------------------------------------------------------

/// Parse container bytes into a [`Module`].
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] for a foreign magic value and
/// [`crate::Error::Malformed`] / [`crate::Error::OutOfBounds`] for damaged
/// content.
pub fn read_module(data: &[u8]) -> Result<Module> {
    if data.is_empty() {
        return Err(crate::Error::Empty);
    }

    let mut p = Parser::new(data);
    if p.read_le::<u32>()? != CONTAINER_MAGIC {
        return Err(crate::Error::NotSupported);
    }
    let version = p.read_le::<u16>()?;
    if version != CONTAINER_VERSION {
        return Err(malformed_error!("Unsupported container version {}", version));
    }

    let name = p.read_prefixed_string()?;
    let mut mvid_bytes = [0u8; 16];
    mvid_bytes.copy_from_slice(p.read_bytes(16)?);
    let module = Module::with_identity(&name, uguid::Guid::from_bytes(mvid_bytes));

    let assembly_ref_count = p.read_le::<u32>()?;
    for row in 1..=assembly_ref_count {
        let name = p.read_prefixed_string()?;
        module.insert_assembly_ref(AssemblyRefData {
            token: Token::from_parts(TableId::AssemblyRef, row),
            name,
        });
    }

    let type_ref_count = p.read_le::<u32>()?;
    for row in 1..=type_ref_count {
        let assembly_ref = Token::new(p.read_le::<u32>()?);
        let namespace = p.read_prefixed_string()?;
        let name = p.read_prefixed_string()?;
        module.insert_type_ref(TypeRefData {
            token: Token::from_parts(TableId::TypeRef, row),
            assembly_ref,
            namespace,
            name,
        });
    }

    let user_string_count = p.read_le::<u32>()?;
    for row in 1..=user_string_count {
        let value = p.read_prefixed_string()?;
        module.insert_user_string(Token::from_parts(TableId::UserString, row), value);
    }

    let type_spec_count = p.read_le::<u32>()?;
    for row in 1..=type_spec_count {
        let sig = TypeSig::read_from(&mut p)?;
        module.insert_type_spec(Token::from_parts(TableId::TypeSpec, row), sig);
    }

    let member_ref_count = p.read_le::<u32>()?;
    for row in 1..=member_ref_count {
        let parent = Token::new(p.read_le::<u32>()?);
        let name = p.read_prefixed_string()?;
        let kind = match p.read_le::<u8>()? {
            0 => MemberRefKind::Method(read_method_sig(&mut p)?),
            1 => MemberRefKind::Field(TypeSig::read_from(&mut p)?),
            other => return Err(malformed_error!("Unknown member ref kind {}", other)),
        };
        module.insert_member_ref(MemberRef {
            token: Token::from_parts(TableId::MemberRef, row),
            parent,
            name,
            kind,
        });
    }

    let method_spec_count = p.read_le::<u32>()?;
    for row in 1..=method_spec_count {
        let method = Token::new(p.read_le::<u32>()?);
        let arg_count = p.read_le::<u16>()? as usize;
        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            args.push(TypeSig::read_from(&mut p)?);
        }
        module.insert_method_spec(MethodSpec {
            token: Token::from_parts(TableId::MethodSpec, row),
            method,
            args,
        });
    }

    let type_def_count = p.read_le::<u32>()?;
    for _ in 0..type_def_count {
        read_type_def(&mut p, &module)?;
    }

    Ok(module)
}

fn read_type_def(p: &mut Parser, module: &Module) -> Result<()> {
    let token = Token::new(p.read_le::<u32>()?);
    let enclosing_raw = p.read_le::<u32>()?;
    let namespace = p.read_prefixed_string()?;
    let name = p.read_prefixed_string()?;
    let flags = p.read_le::<u32>()?;

    let extends = if p.read_le::<u8>()? != 0 {
        Some(TypeSig::read_from(p)?)
    } else {
        None
    };
    let packing_size = if p.read_le::<u8>()? != 0 {
        Some(p.read_le::<u16>()?)
    } else {
        None
    };
    let class_size = if p.read_le::<u8>()? != 0 {
        Some(p.read_le::<u32>()?)
    } else {
        None
    };

    let generic_param_count = p.read_le::<u16>()?;
    let mut generic_params = Vec::with_capacity(generic_param_count as usize);
    for index in 0..generic_param_count {
        generic_params.push(GenericParam {
            index: u32::from(index),
            name: p.read_prefixed_string()?,
        });
    }

    let attr_count = p.read_le::<u16>()?;
    let mut custom_attributes = Vec::with_capacity(attr_count as usize);
    for _ in 0..attr_count {
        let attr_type = Token::new(p.read_le::<u32>()?);
        let arg_count = p.read_le::<u16>()? as usize;
        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            args.push(match p.read_le::<u8>()? {
                0 => AttrArg::String(p.read_prefixed_string()?),
                1 => AttrArg::I4(p.read_le::<i32>()?),
                2 => AttrArg::Bool(p.read_le::<u8>()? != 0),
                other => return Err(malformed_error!("Unknown attribute arg tag {}", other)),
            });
        }
        custom_attributes.push(CustomAttribute { attr_type, args });
    }

    let enclosing = if enclosing_raw == 0 {
        None
    } else {
        Some(Token::new(enclosing_raw))
    };

    let def = module.insert_type_def(TypeDef {
        token,
        namespace,
        name,
        flags,
        extends,
        packing_size,
        class_size,
        enclosing,
        generic_params,
        custom_attributes,
        fields: boxcar::Vec::new(),
        methods: boxcar::Vec::new(),
        nested_types: boxcar::Vec::new(),
    });

    if let Some(parent_token) = enclosing {
        let parent = module
            .type_def(parent_token)
            .ok_or_else(|| malformed_error!("Nested type {} precedes its parent", token))?;
        parent.nested_types.push(def.clone());
    }

    let field_count = p.read_le::<u32>()?;
    for _ in 0..field_count {
        let field_token = Token::new(p.read_le::<u32>()?);
        let field_name = p.read_prefixed_string()?;
        let field_flags = p.read_le::<u16>()?;
        let signature = TypeSig::read_from(p)?;
        let initial_value = if p.read_le::<u8>()? != 0 {
            let len = p.read_le::<u32>()? as usize;
            Some(p.read_bytes(len)?.to_vec())
        } else {
            None
        };
        module.insert_field(
            &def,
            Field {
                token: field_token,
                name: field_name,
                flags: field_flags,
                signature,
                initial_value,
            },
        );
    }

    let method_count = p.read_le::<u32>()?;
    for _ in 0..method_count {
        let method_token = Token::new(p.read_le::<u32>()?);
        let method_name = p.read_prefixed_string()?;
        let method_flags = p.read_le::<u16>()?;
        let signature = read_method_sig(p)?;
        let generic_count = p.read_le::<u16>()?;
        let mut method_generics = Vec::with_capacity(generic_count as usize);
        for index in 0..generic_count {
            method_generics.push(GenericParam {
                index: u32::from(index),
                name: p.read_prefixed_string()?,
            });
        }
        let body = if p.read_le::<u8>()? != 0 {
            let max_stack = p.read_le::<u16>()?;
            let instruction_count = p.read_le::<u32>()? as usize;
            let mut instructions = Vec::with_capacity(instruction_count);
            for _ in 0..instruction_count {
                instructions.push(read_instruction(p)?);
            }
            Some(MethodBody {
                max_stack,
                instructions,
            })
        } else {
            None
        };
        module.insert_method(
            &def,
            Method {
                token: method_token,
                name: method_name,
                flags: method_flags,
                signature,
                generic_params: method_generics,
                body: std::sync::RwLock::new(body),
            },
        );
    }

    Ok(())
}

fn read_method_sig(p: &mut Parser) -> Result<MethodSig> {
    let return_type = TypeSig::read_from(p)?;
    let param_count = p.read_le::<u16>()? as usize;
    let mut params = Vec::with_capacity(param_count);
    for _ in 0..param_count {
        params.push(TypeSig::read_from(p)?);
    }
    Ok(MethodSig {
        return_type,
        params,
    })
}

fn read_instruction(p: &mut Parser) -> Result<Instruction> {
    let raw = p.read_le::<u16>()?;
    let opcode =
        OpCode::from_repr(raw).ok_or_else(|| malformed_error!("Unknown opcode 0x{:04x}", raw))?;
    let operand = match opcode.operand_kind() {
        OperandKind::None => Operand::None,
        OperandKind::Int8 => Operand::Immediate(Immediate::Int8(p.read_le::<i8>()?)),
        OperandKind::Int32 => Operand::Immediate(Immediate::Int32(p.read_le::<i32>()?)),
        OperandKind::Int64 => Operand::Immediate(Immediate::Int64(p.read_le::<i64>()?)),
        OperandKind::Token => Operand::Token(Token::new(p.read_le::<u32>()?)),
    };
    Ok(Instruction { opcode, operand })
}
