//! Validation overhead benchmarks
//!
//! Measures tag parsing, single-rule dispatch and whole-record walks.

#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tagvalid::prelude::*;
use tagvalid::tag;

#[derive(Record)]
struct Address {
    #[valid("Required;MaxSize(64)")]
    street: String,
    #[valid("Required;Numeric;Length(5)")]
    zip: String,
}

#[derive(Record)]
struct Customer {
    #[valid(r"Required;Match(/^\w+@\w+\.com$/)")]
    email: String,
    #[valid("Required;Range(1,140)")]
    age: i32,
    #[valid("Required;Name")]
    name: String,
    address: Address,
}

fn customer() -> Customer {
    Customer {
        email: "ann@example.com".into(),
        age: 40,
        name: "Ann Smith".into(),
        address: Address {
            street: "Main Street 1".into(),
            zip: "12345".into(),
        },
    }
}

/// Benchmark rule-string parsing
fn bench_tag_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("tag_parsing");
    let registry = Registry::new();

    group.bench_function("plain_rules", |b| {
        b.iter(|| tag::parse(&registry, black_box("Required;Range(1,140);MaxSize(10)"), "age"))
    });

    group.bench_function("match_clause", |b| {
        b.iter(|| {
            tag::parse(
                &registry,
                black_box(r"Required;Match(/^(test)?\w*@(/test/);com$/)"),
                "email",
            )
        })
    });

    group.finish();
}

/// Benchmark single checks through the context
fn bench_single_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_rules");

    group.bench_function("range", |b| {
        let mut valid = Validation::default();
        b.iter(|| {
            valid.clear();
            valid.range(black_box(&180i32), 1, 140, "age").ok()
        })
    });

    group.bench_function("email", |b| {
        let mut valid = Validation::default();
        b.iter(|| {
            valid.clear();
            valid.email(black_box("ann@example.com"), "email").ok()
        })
    });

    group.finish();
}

/// Benchmark whole-record validation
fn bench_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");
    let registry = Arc::new(Registry::new());
    let record = customer();

    group.bench_function("valid", |b| {
        let mut valid = Validation::new(Arc::clone(&registry));
        b.iter(|| {
            valid.clear();
            valid.valid(black_box(&record))
        })
    });

    group.bench_function("recursive_valid", |b| {
        let mut valid = Validation::new(Arc::clone(&registry));
        b.iter(|| {
            valid.clear();
            valid.recursive_valid(black_box(&record))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_tag_parsing, bench_single_rules, bench_records);
criterion_main!(benches);
