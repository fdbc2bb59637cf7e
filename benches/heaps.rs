//! Benchmarks for heap interning, the compressed integer codec and whole builds.

extern crate dotemit;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use dotemit::{
    emit::{BlobHeapBuilder, EmitOptions, StringHeapBuilder, UserStringHeapBuilder},
    metadata::signatures::{SignatureMethod, TypeSignature},
    model::{FieldDefinition, MethodDefinition, ModuleDefinition, TypeDefinition},
    utils::{compress_uint, decompress_uint},
};
use std::hint::black_box;

fn names(count: usize) -> Vec<String> {
    (0..count)
        .map(|index| format!("Namespace{}.Member{index}", index % 16))
        .collect()
}

/// Interning 1000 distinct strings, then the same 1000 again
fn bench_strings(c: &mut Criterion) {
    let names = names(1000);

    c.bench_function("strings_intern_1000", |b| {
        b.iter_batched(
            StringHeapBuilder::new,
            |mut heap| {
                for name in &names {
                    black_box(heap.add(name).unwrap());
                }
                heap
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("strings_dedup_1000", |b| {
        let mut heap = StringHeapBuilder::new();
        for name in &names {
            heap.add(name).unwrap();
        }
        b.iter(|| {
            for name in &names {
                black_box(heap.add(black_box(name)).unwrap());
            }
        });
    });
}

fn bench_blobs(c: &mut Criterion) {
    let payloads: Vec<Vec<u8>> = (0u32..1000)
        .map(|index| {
            let mut payload = vec![0x06];
            payload.extend_from_slice(&index.to_le_bytes());
            payload
        })
        .collect();

    c.bench_function("blobs_intern_1000", |b| {
        b.iter_batched(
            BlobHeapBuilder::new,
            |mut heap| {
                for payload in &payloads {
                    black_box(heap.add(payload).unwrap());
                }
                heap
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_user_strings(c: &mut Criterion) {
    let names = names(1000);

    c.bench_function("user_strings_append_1000", |b| {
        b.iter_batched(
            UserStringHeapBuilder::new,
            |mut heap| {
                for name in &names {
                    black_box(heap.add(name).unwrap());
                }
                heap
            },
            BatchSize::SmallInput,
        );
    });
}

/// Values at every width boundary
fn bench_compressed_uint(c: &mut Criterion) {
    let values = [0u32, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1FFF_FFFF];
    let encoded: Vec<Vec<u8>> = values
        .iter()
        .map(|value| compress_uint(*value).unwrap())
        .collect();

    c.bench_function("compress_uint_boundaries", |b| {
        b.iter(|| {
            for value in &values {
                black_box(compress_uint(black_box(*value)).unwrap());
            }
        });
    });
    c.bench_function("decompress_uint_boundaries", |b| {
        b.iter(|| {
            for bytes in &encoded {
                black_box(decompress_uint(black_box(bytes)).unwrap());
            }
        });
    });
}

/// 100 types with 10 fields and 5 methods each, registered and built
fn bench_build_module(c: &mut Criterion) {
    let mut module = ModuleDefinition::new(
        "Bench.dll",
        uguid::guid!("5e0c8a41-7f2b-4c3d-9e1a-0b2c3d4e5f60"),
    );
    for type_index in 0..100 {
        let mut ty = TypeDefinition::new("Bench", format!("Type{type_index}"), 0x0010_0001);
        for field_index in 0..10 {
            ty.fields.push(FieldDefinition::new(
                format!("field{field_index}"),
                if field_index % 2 == 0 {
                    TypeSignature::I4
                } else {
                    TypeSignature::String
                },
                0x0001,
            ));
        }
        for method_index in 0..5 {
            ty.methods.push(MethodDefinition::new(
                format!("Method{method_index}"),
                SignatureMethod::new(TypeSignature::Void, vec![TypeSignature::I4]).instance(),
                0x0086,
            ));
        }
        module.types.push(ty);
    }

    c.bench_function("build_module_100_types", |b| {
        b.iter(|| black_box(module.emit(EmitOptions::default()).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_strings,
    bench_blobs,
    bench_user_strings,
    bench_compressed_uint,
    bench_build_module,
);
criterion_main!(benches);
