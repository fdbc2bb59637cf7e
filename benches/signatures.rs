//! Benchmarks for signature encoding and parsing.
//!
//! Each signature kind is encoded from its typed form and parsed back from the blob it
//! produces:
//! - Method signatures (static, instance, generic)
//! - Field signatures (primitive, class, generic instance)
//! - Local variable signatures
//! - Method specification signatures

extern crate dotemit;

use criterion::{criterion_group, criterion_main, Criterion};
use dotemit::metadata::{
    signatures::{
        encode_field_signature, encode_local_var_signature, encode_method_signature,
        encode_method_spec_signature, parse_field_signature, parse_local_var_signature,
        parse_method_signature, parse_method_spec_signature, resolve_token, SignatureField,
        SignatureLocalVariable, SignatureLocalVariables, SignatureMethod, SignatureMethodSpec,
        TypeSignature,
    },
    token::Token,
};
use std::hint::black_box;

fn list_of(argument: TypeSignature<Token>) -> TypeSignature<Token> {
    TypeSignature::GenericInst(
        Box::new(TypeSignature::Class(Token::new(0x0100_0012))),
        vec![argument],
    )
}

/// Signature: int Method(int a, string b, bool c)
fn bench_method_signature_static(c: &mut Criterion) {
    let signature = SignatureMethod::new(
        TypeSignature::I4,
        vec![TypeSignature::I4, TypeSignature::String, TypeSignature::Boolean],
    );
    let blob = encode_method_signature(&signature, &resolve_token).unwrap();

    c.bench_function("encode_method_static", |b| {
        b.iter(|| encode_method_signature(black_box(&signature), &resolve_token).unwrap());
    });
    c.bench_function("parse_method_static", |b| {
        b.iter(|| parse_method_signature(black_box(&blob)).unwrap());
    });
}

/// Signature: instance List<T> Method<T>(T a, class Foo b)
fn bench_method_signature_generic(c: &mut Criterion) {
    let signature = SignatureMethod::new(
        list_of(TypeSignature::GenericParamMethod(0)),
        vec![
            TypeSignature::GenericParamMethod(0),
            TypeSignature::Class(Token::new(0x0200_0004)),
        ],
    )
    .instance()
    .generic(1);
    let blob = encode_method_signature(&signature, &resolve_token).unwrap();

    c.bench_function("encode_method_generic", |b| {
        b.iter(|| encode_method_signature(black_box(&signature), &resolve_token).unwrap());
    });
    c.bench_function("parse_method_generic", |b| {
        b.iter(|| parse_method_signature(black_box(&blob)).unwrap());
    });
}

fn bench_field_signatures(c: &mut Criterion) {
    let fields = [
        ("primitive", SignatureField::new(TypeSignature::I8)),
        (
            "class",
            SignatureField::new(TypeSignature::Class(Token::new(0x0100_0001))),
        ),
        ("generic", SignatureField::new(list_of(TypeSignature::String))),
    ];

    for (name, field) in &fields {
        let blob = encode_field_signature(field, &resolve_token).unwrap();
        c.bench_function(&format!("encode_field_{name}"), |b| {
            b.iter(|| encode_field_signature(black_box(field), &resolve_token).unwrap());
        });
        c.bench_function(&format!("parse_field_{name}"), |b| {
            b.iter(|| parse_field_signature(black_box(&blob)).unwrap());
        });
    }
}

/// A body with twenty locals of mixed kinds
fn bench_local_var_signature_many(c: &mut Criterion) {
    let kinds = [
        TypeSignature::I4,
        TypeSignature::String,
        TypeSignature::Object,
        TypeSignature::Class(Token::new(0x0200_0002)),
        list_of(TypeSignature::I4),
    ];
    let signature = SignatureLocalVariables {
        locals: kinds
            .iter()
            .cycle()
            .take(20)
            .cloned()
            .map(SignatureLocalVariable::new)
            .collect(),
    };
    let blob = encode_local_var_signature(&signature, &resolve_token).unwrap();

    c.bench_function("encode_locals_many", |b| {
        b.iter(|| encode_local_var_signature(black_box(&signature), &resolve_token).unwrap());
    });
    c.bench_function("parse_locals_many", |b| {
        b.iter(|| parse_local_var_signature(black_box(&blob)).unwrap());
    });
}

/// Signature: <int, List<string>>
fn bench_method_spec(c: &mut Criterion) {
    let signature = SignatureMethodSpec {
        generic_args: vec![TypeSignature::I4, list_of(TypeSignature::String)],
    };
    let blob = encode_method_spec_signature(&signature, &resolve_token).unwrap();

    c.bench_function("encode_method_spec", |b| {
        b.iter(|| encode_method_spec_signature(black_box(&signature), &resolve_token).unwrap());
    });
    c.bench_function("parse_method_spec", |b| {
        b.iter(|| parse_method_spec_signature(black_box(&blob)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_method_signature_static,
    bench_method_signature_generic,
    bench_field_signatures,
    bench_local_var_signature_many,
    bench_method_spec,
);
criterion_main!(benches);
