//! Micro-benchmarks for signature generation and IID derivation.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use iidpatch::prelude::*;

fn fixture() -> (Arc<Module>, FolderResolver, TypeDefRc, TypeSig) {
    let interop = Arc::new(Module::new("System.Runtime.InteropServices"));
    let guid_attribute = interop.add_type(
        "System.Runtime.InteropServices",
        "GuidAttribute",
        TypeAttributes::PUBLIC | TypeAttributes::SEALED,
        None,
    );

    let windows = Arc::new(Module::new("Windows"));
    let attr_ref = windows.ensure_type_ref(
        "System.Runtime.InteropServices",
        "System.Runtime.InteropServices",
        "GuidAttribute",
    );
    windows.add_attributed_type(
        "Windows.Foundation.Collections",
        "IIterable`1",
        TypeAttributes::PUBLIC | TypeAttributes::INTERFACE,
        None,
        vec![CustomAttribute {
            attr_type: attr_ref,
            args: vec![AttrArg::String(
                "faa585ea-6214-4217-afda-7f46de5869b3".to_string(),
            )],
        }],
    );
    windows.add_attributed_type(
        "Windows.Foundation.Collections",
        "IMap`2",
        TypeAttributes::PUBLIC | TypeAttributes::INTERFACE,
        None,
        vec![CustomAttribute {
            attr_type: attr_ref,
            args: vec![AttrArg::String(
                "3c2925fe-8519-45c1-aa79-197b6718c1c1".to_string(),
            )],
        }],
    );

    let resolver = FolderResolver::empty();
    resolver.register(interop);
    resolver.register(windows);

    let module = Arc::new(Module::new("App"));
    let iterable = module.ensure_type_ref("Windows", "Windows.Foundation.Collections", "IIterable`1");
    let map = module.ensure_type_ref("Windows", "Windows.Foundation.Collections", "IMap`2");
    // IMap<string, IIterable<IMap<string, i4>>> - a deeply nested shape
    let inner_map = TypeSig::GenericInst {
        definition: map,
        args: vec![
            TypeSig::Primitive(PrimitiveKind::String),
            TypeSig::Primitive(PrimitiveKind::I4),
        ],
    };
    let sig = TypeSig::GenericInst {
        definition: map,
        args: vec![
            TypeSig::Primitive(PrimitiveKind::String),
            TypeSig::GenericInst {
                definition: iterable,
                args: vec![inner_map],
            },
        ],
    };
    (module, resolver, guid_attribute, sig)
}

fn bench_generate(c: &mut Criterion) {
    let (module, resolver, guid_attribute, sig) = fixture();
    let generator = SignatureGenerator::new(&resolver, &guid_attribute);
    c.bench_function("generate_nested_tree", |b| {
        b.iter(|| generator.generate(black_box(&module), black_box(&sig)).unwrap());
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let (module, resolver, guid_attribute, sig) = fixture();
    let generator = SignatureGenerator::new(&resolver, &guid_attribute);
    let tree = generator.generate(&module, &sig).unwrap();
    c.bench_function("render_and_hash_nested_tree", |b| {
        b.iter(|| emitter::evaluate(black_box(&tree)).unwrap());
    });
}

fn bench_create_iid(c: &mut Criterion) {
    let signature = "pinterface({3C2925FE-8519-45C1-AA79-197B6718C1C1};string;\
                     pinterface({FAA585EA-6214-4217-AFDA-7F46DE5869B3};\
                     pinterface({3C2925FE-8519-45C1-AA79-197B6718C1C1};string;i4)))";
    c.bench_function("create_iid", |b| {
        b.iter(|| iid::create_iid(black_box(signature)));
    });
}

criterion_group!(benches, bench_generate, bench_evaluate, bench_create_iid);
criterion_main!(benches);
