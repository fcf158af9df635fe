//! End-to-end patching tests over in-memory modules.

mod common;

use std::sync::Arc;

use common::{TestWorld, IITERABLE_GUID};
use iidpatch::prelude::*;

#[test]
fn patches_non_generic_site() {
    let world = TestWorld::new();
    let foo = world.add_guid_type("App", "Foo", "11111111-2222-3333-4444-555555555555");
    let method = world.add_method_with_body("M", world.short_site(foo.token));
    let before = TestWorld::body_len(&method);

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 1);

    let instructions = TestWorld::body_instructions(&method);
    assert_eq!(instructions.len(), before, "instruction count must not change");

    // call accessor; newobj Guid(ReadOnlySpan<byte>); nop; untouched ret
    assert_eq!(instructions[0].opcode, OpCode::Call);
    assert_eq!(instructions[1].opcode, OpCode::Newobj);
    assert_eq!(instructions[2], Instruction::nop());
    assert_eq!(instructions[3], Instruction::ret());

    let accessor_token = instructions[0].token_operand().unwrap();
    let accessor = world.module.method_def(accessor_token).unwrap();
    assert_eq!(accessor.name, "<IIDData>App.Foo");

    let details = world
        .module
        .type_by_fullname(IMPLEMENTATION_DETAILS_NAME)
        .unwrap();
    let (_, field) = details.fields.iter().next().unwrap();
    assert_eq!(
        field.initial_value.as_deref(),
        Some(
            &[
                0x11, 0x11, 0x11, 0x11, 0x22, 0x22, 0x33, 0x33, 0x44, 0x44, 0x55, 0x55, 0x55,
                0x55, 0x55, 0x55
            ][..]
        )
    );
}

#[test]
fn patches_long_pattern_through_helper_type() {
    let world = TestWorld::new();
    let foo = world.add_guid_type("App", "Foo", "11111111-2222-3333-4444-555555555555");
    let method = world.add_method_with_body(
        "M",
        vec![
            Instruction::ldtoken(foo.token),
            Instruction::call(world.get_type_from_handle),
            Instruction::call(world.get_helper_type),
            Instruction::call(world.create_iid),
            Instruction::ret(),
        ],
    );

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 1);

    let instructions = TestWorld::body_instructions(&method);
    assert_eq!(instructions.len(), 5);
    assert_eq!(instructions[0].opcode, OpCode::Call);
    assert_eq!(instructions[1].opcode, OpCode::Newobj);
    assert_eq!(instructions[2], Instruction::nop());
    assert_eq!(instructions[3], Instruction::nop());
    assert_eq!(instructions[4], Instruction::ret());
}

#[test]
fn distinct_call_sites_share_one_accessor() {
    let world = TestWorld::new();
    let foo = world.add_guid_type("App", "Foo", "11111111-2222-3333-4444-555555555555");
    let first = world.add_method_with_body("M1", world.short_site(foo.token));
    let second = world.add_method_with_body("M2", world.short_site(foo.token));

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 2);

    let details = world
        .module
        .type_by_fullname(IMPLEMENTATION_DETAILS_NAME)
        .unwrap();
    assert_eq!(details.fields.count(), 1, "one data blob per distinct type");
    assert_eq!(details.methods.count(), 1, "one accessor per distinct type");

    let a = TestWorld::body_instructions(&first)[0].token_operand().unwrap();
    let b = TestWorld::body_instructions(&second)[0].token_operand().unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_guid_leaves_site_untouched() {
    let world = TestWorld::new();
    let plain = world.module.add_type("App", "Plain", TypeAttributes::PUBLIC, None);
    let method = world.add_method_with_body("M", world.short_site(plain.token));
    let before = TestWorld::body_instructions(&method);

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 0);
    assert_eq!(TestWorld::body_instructions(&method), before);
    // A run that patched nothing must not have grown the module either.
    assert!(world
        .module
        .type_by_fullname(IMPLEMENTATION_DETAILS_NAME)
        .is_none());
}

#[test]
fn companion_abi_type_supplies_the_guid() {
    let world = TestWorld::new();
    let thing = world.module.add_type("App", "Thing", TypeAttributes::PUBLIC, None);
    world.add_guid_type("ABI.App", "Thing", "99999999-8888-7777-6666-555555555555");
    let method = world.add_method_with_body("M", world.short_site(thing.token));

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 1);

    let accessor_token = TestWorld::body_instructions(&method)[0]
        .token_operand()
        .unwrap();
    assert!(world.module.method_def(accessor_token).is_some());
}

#[test]
fn module_without_interop_reference_is_a_noop() {
    let world = TestWorld::new();
    let bare = Arc::new(Module::new("Bare"));
    let owner = bare.add_type("Bare", "Program", TypeAttributes::PUBLIC, None);
    bare.add_method(
        &owner,
        "M",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        MethodSig::returning(TypeSig::Primitive(PrimitiveKind::Void)),
        Vec::new(),
        Some(MethodBody {
            max_stack: 1,
            instructions: vec![Instruction::ret()],
        }),
    );

    let patcher = GuidPatcher::new(bare.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 0);
    assert!(bare.type_by_fullname(IMPLEMENTATION_DETAILS_NAME).is_none());
}

#[test]
fn second_run_patches_nothing() {
    let world = TestWorld::new();
    let foo = world.add_guid_type("App", "Foo", "11111111-2222-3333-4444-555555555555");
    world.add_method_with_body("M", world.short_site(foo.token));

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 1);

    let again = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(again.process().unwrap(), 0);
}

#[test]
fn closed_generic_blob_matches_hash_of_expected_signature() {
    let world = TestWorld::new();
    let iterable = world.module.ensure_type_ref(
        "Windows",
        "Windows.Foundation.Collections",
        "IIterable`1",
    );
    let target = world.module.ensure_type_spec(TypeSig::GenericInst {
        definition: iterable,
        args: vec![TypeSig::Primitive(PrimitiveKind::String)],
    });
    let method = world.add_method_with_body("M", world.short_site(target));

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 1);

    let expected = iid::create_iid("pinterface({FAA585EA-6214-4217-AFDA-7F46DE5869B3};string)");
    let details = world
        .module
        .type_by_fullname(IMPLEMENTATION_DETAILS_NAME)
        .unwrap();
    let (_, field) = details.fields.iter().next().unwrap();
    assert_eq!(field.initial_value.as_deref(), Some(&expected.to_bytes()[..]));

    // The rewritten site constructs the GUID from the accessor's bytes.
    let instructions = TestWorld::body_instructions(&method);
    assert_eq!(instructions[0].opcode, OpCode::Call);
    assert_eq!(instructions[1].opcode, OpCode::Newobj);
}

#[test]
fn open_generic_site_gets_runtime_assembled_accessor() {
    let world = TestWorld::new();
    let iterable = world.module.ensure_type_ref(
        "Windows",
        "Windows.Foundation.Collections",
        "IIterable`1",
    );
    let target = world.module.ensure_type_spec(TypeSig::GenericInst {
        definition: iterable,
        args: vec![TypeSig::GenericParam {
            method: true,
            index: 0,
        }],
    });
    let owner = world.module.add_type("App", "Generic", TypeAttributes::PUBLIC, None);
    let method = world.module.add_method(
        &owner,
        "M",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        MethodSig::returning(TypeSig::Primitive(PrimitiveKind::Void)),
        vec![GenericParam {
            index: 0,
            name: "T".to_string(),
        }],
        Some(MethodBody {
            max_stack: 8,
            instructions: vec![
                Instruction::ldtoken(target),
                Instruction::call(world.get_type_from_handle),
                Instruction::call(world.get_iid),
                Instruction::ret(),
            ],
        }),
    );

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 1);

    let instructions = TestWorld::body_instructions(&method);
    assert_eq!(instructions.len(), 4);
    assert_eq!(instructions[0].opcode, OpCode::Call);
    assert_eq!(instructions[1], Instruction::nop());
    assert_eq!(instructions[2], Instruction::nop());
    assert_eq!(instructions[3], Instruction::ret());

    // The call targets the accessor instantiated with the site's own
    // generic parameter.
    let spec_token = instructions[0].token_operand().unwrap();
    assert_eq!(spec_token.table(), Some(TableId::MethodSpec));
    let spec = world.module.method_spec(spec_token).unwrap();
    assert_eq!(
        spec.args,
        vec![TypeSig::GenericParam {
            method: true,
            index: 0
        }]
    );

    let accessor = world.module.method_def(spec.method).unwrap();
    assert!(accessor.name.starts_with("<CreateIID>"));
    assert_eq!(accessor.generic_params.len(), 1);

    // Body shape: constant fragment, parameter signature lookup, closing
    // fragment, one concat per junction, runtime hash, return.
    let body = TestWorld::body_instructions(&accessor);
    assert_eq!(body.len(), 9);
    assert_eq!(body[0].opcode, OpCode::Ldstr);
    let fragment = world
        .module
        .user_string(body[0].token_operand().unwrap())
        .unwrap();
    assert_eq!(
        fragment.as_str(),
        "pinterface({FAA585EA-6214-4217-AFDA-7F46DE5869B3};"
    );
    assert_eq!(body[1].opcode, OpCode::Ldtoken);
    assert_eq!(body[2].opcode, OpCode::Call);
    assert_eq!(body[3].opcode, OpCode::Call);
    assert_eq!(body[4].opcode, OpCode::Call);
    assert_eq!(body[5].opcode, OpCode::Ldstr);
    assert_eq!(body[6].opcode, OpCode::Call);
    assert_eq!(body[7].opcode, OpCode::Call);
    assert_eq!(body[8], Instruction::ret());
}

#[test]
fn per_site_failure_does_not_abort_the_run() {
    let world = TestWorld::new();
    // A generic definition with no GUID attribute: signature generation
    // for its instantiation fails, and the failure must stay local.
    let noguid = world.module.add_type("App", "NoGuid`1", TypeAttributes::PUBLIC, None);
    let bad_target = world.module.ensure_type_spec(TypeSig::GenericInst {
        definition: noguid.token,
        args: vec![TypeSig::Primitive(PrimitiveKind::String)],
    });
    let foo = world.add_guid_type("App", "Foo", "11111111-2222-3333-4444-555555555555");

    let mut instructions = world.short_site(bad_target);
    instructions.pop();
    instructions.extend(world.short_site(foo.token));
    let method = world.add_method_with_body("M", instructions);

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 1);

    let after = TestWorld::body_instructions(&method);
    // The failing site is untouched, the good one is rewritten.
    assert_eq!(after[0], Instruction::ldtoken(bad_target));
    assert_eq!(after[3].opcode, OpCode::Call);
    assert_eq!(after[4].opcode, OpCode::Newobj);
}

#[test]
fn patched_module_survives_container_roundtrip() {
    let world = TestWorld::new();
    let foo = world.add_guid_type("App", "Foo", "11111111-2222-3333-4444-555555555555");
    world.add_method_with_body("M", world.short_site(foo.token));

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 1);

    let bytes = world.module.to_bytes();
    let reloaded = Arc::new(Module::from_bytes(&bytes).unwrap());

    let details = reloaded.type_by_fullname(IMPLEMENTATION_DETAILS_NAME).unwrap();
    assert_eq!(details.fields.count(), 1);
    let (_, field) = details.fields.iter().next().unwrap();
    assert_eq!(field.initial_value.as_ref().map(Vec::len), Some(16));

    // Idempotence survives serialization: a fresh run over the reloaded
    // module finds nothing left to patch.
    let again = GuidPatcher::new(reloaded, &world.resolver);
    assert_eq!(again.process().unwrap(), 0);
}

#[test]
fn save_and_reload_through_disk() {
    let world = TestWorld::new();
    let foo = world.add_guid_type("App", "Foo", "11111111-2222-3333-4444-555555555555");
    world.add_method_with_body("M", world.short_site(foo.token));

    let patcher = GuidPatcher::new(world.module.clone(), &world.resolver);
    assert_eq!(patcher.process().unwrap(), 1);

    let dir = std::env::temp_dir().join(format!("iidpatch-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = patcher.save(&dir).unwrap();
    assert_eq!(path.file_name().unwrap(), "App.iidm");

    let reloaded = Module::from_file(&path).unwrap();
    assert!(reloaded.type_by_fullname(IMPLEMENTATION_DETAILS_NAME).is_some());
    std::fs::remove_dir_all(&dir).ok();
}
