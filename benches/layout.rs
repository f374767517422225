//! Layout Engine Performance Benchmarks
//!
//! Benchmarks for layout computation, shape building, and the property
//! access layer.
//!
//! # Benchmark Categories
//!
//! 1. **Layout Computation**: widest-first packing and hole filling cost
//! 2. **Shape Building**: root and derived builds including descriptor
//!    binding and generator lookup
//! 3. **Property Access**: plain, volatile, and CAS paths, including the
//!    word-emulated sub-word CAS

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use staticshape::{
    EngineConfig, Kind, Layout, ShapeRegistry, StaticObject, StaticProperty,
};
use std::sync::Arc;

// =============================================================================
// Benchmark Helpers
// =============================================================================

/// A mixed-width kind sequence that forces alignment slack and hole reuse.
fn mixed_kinds(n: usize) -> Vec<Kind> {
    const CYCLE: [Kind; 5] = [
        Kind::Bool,
        Kind::Int64,
        Kind::Int16,
        Kind::Int32,
        Kind::Int8,
    ];
    (0..n).map(|i| CYCLE[i % CYCLE.len()]).collect()
}

/// Build a root shape with `n` mixed-kind properties and return one object.
fn build_object(
    registry: &ShapeRegistry,
    n: usize,
) -> (Vec<Arc<StaticProperty>>, StaticObject) {
    let props: Vec<_> = mixed_kinds(n)
        .into_iter()
        .enumerate()
        .map(|(i, kind)| StaticProperty::new(format!("prop{}", i), kind, false))
        .collect();
    let mut builder = registry.builder();
    for prop in &props {
        builder.property(prop);
    }
    let shape = builder.build().unwrap();
    let obj = shape.factory().create();
    (props, obj)
}

// =============================================================================
// Layout Computation Benchmarks
// =============================================================================

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");

    for n in [4, 16, 64] {
        group.bench_with_input(BenchmarkId::new("root", n), &n, |b, &n| {
            let kinds = mixed_kinds(n);
            b.iter(|| black_box(Layout::root(0, &kinds)))
        });
    }

    // Derived layout that has parent holes to fill.
    group.bench_function("extend_with_holes", |b| {
        let (parent, _) = Layout::root(0, &[Kind::Int64, Kind::Bool, Kind::Int64]);
        let kinds = [Kind::Int16, Kind::Int8, Kind::Int32];
        b.iter(|| black_box(parent.extend(&kinds)))
    });

    group.finish();
}

// =============================================================================
// Shape Building Benchmarks
// =============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    group.bench_function("root_8_props", |b| {
        let registry = ShapeRegistry::new(EngineConfig::default());
        b.iter(|| {
            let props: Vec<_> = mixed_kinds(8)
                .into_iter()
                .enumerate()
                .map(|(i, kind)| StaticProperty::new(format!("prop{}", i), kind, false))
                .collect();
            let mut builder = registry.builder();
            for prop in &props {
                builder.property(prop);
            }
            black_box(builder.build().unwrap())
        })
    });

    group.bench_function("derive_1_prop", |b| {
        let registry = ShapeRegistry::new(EngineConfig::default());
        let parent = registry.builder().build().unwrap();
        b.iter(|| {
            let prop = StaticProperty::new("extra", Kind::Int32, false);
            let mut builder = registry.builder_derived(&parent);
            builder.property(&prop);
            black_box(builder.build().unwrap())
        })
    });

    group.bench_function("create_object", |b| {
        let registry = ShapeRegistry::new(EngineConfig::default());
        let (_, obj) = build_object(&registry, 8);
        let factory = obj.shape().factory();
        b.iter(|| black_box(factory.create()))
    });

    group.finish();
}

// =============================================================================
// Property Access Benchmarks
// =============================================================================

fn bench_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("access");

    let registry = ShapeRegistry::new(EngineConfig::default());
    let (props, obj) = build_object(&registry, 5);
    // mixed_kinds order: bool, i64, i16, i32, i8
    let flag = &props[0];
    let word = &props[1];
    let int = &props[3];

    group.bench_function("get_i64_plain", |b| {
        word.set_i64(&obj, 7).unwrap();
        b.iter(|| black_box(word.get_i64(&obj).unwrap()))
    });

    group.bench_function("get_i64_volatile", |b| {
        b.iter(|| black_box(word.get_i64_volatile(&obj).unwrap()))
    });

    group.bench_function("cas_i32_native", |b| {
        int.set_i32(&obj, 0).unwrap();
        b.iter(|| black_box(int.compare_and_exchange_i32(&obj, 0, 0).unwrap()))
    });

    group.bench_function("cas_bool_word_emulated", |b| {
        flag.set_bool(&obj, false).unwrap();
        b.iter(|| black_box(flag.compare_and_swap_bool(&obj, false, false).unwrap()))
    });

    // Same access with the lineage guard disabled.
    let unchecked = ShapeRegistry::new(EngineConfig {
        verify_shape_access: false,
    });
    let (props, obj) = build_object(&unchecked, 5);
    let word = &props[1];
    group.bench_function("get_i64_unverified", |b| {
        b.iter(|| black_box(word.get_i64(&obj).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_layout, bench_build, bench_access);
criterion_main!(benches);
