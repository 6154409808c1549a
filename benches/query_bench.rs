//! Point lookup and range-scan latency over a populated table.

use corebase::{
    Arena, Combinator, CompiledQuery, Condition, Config, EntityDecl, FieldDef, IndexKind, Operator,
    QueryArg, TypeCode, Value,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const ROW_COUNT: i64 = 50_000;

fn populated_arena() -> Arena {
    let decl = EntityDecl::new(
        "Person",
        vec![
            FieldDef::identifier("id", TypeCode::I64),
            FieldDef::new("name", TypeCode::String, false),
            FieldDef::new("age", TypeCode::I32, false),
        ],
    )
    .with_index("name", IndexKind::Hash)
    .with_index("age", IndexKind::Range);

    let arena = Arena::new(Config::default());
    arena.register_entity(decl).unwrap();
    arena
        .with_table("Person", |table, _| {
            for i in 0..ROW_COUNT {
                table.insert(vec![Value::I64(i), Value::String(format!("n{i}")), Value::I32((i % 1000) as i32)])?;
            }
            Ok(())
        })
        .unwrap();
    arena
}

fn bench_point_lookup(c: &mut Criterion) {
    let arena = populated_arena();
    let query = CompiledQuery {
        conditions: vec![Condition { column: 1, operator: Operator::Eq, arg_index: 0, ignore_case: false, next_combinator: Combinator::And }],
        order_by: vec![],
        limit: 0,
    };

    let mut group = c.benchmark_group("point_lookup");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hash_index_eq", |b| {
        b.iter(|| {
            let args = vec![QueryArg::Scalar(Value::String("n12345".into()))];
            let hits = arena.with_table("Person", |table, _| query.evaluate(table, &args)).unwrap();
            black_box(hits)
        })
    });
    group.finish();
}

fn bench_range_scan(c: &mut Criterion) {
    let arena = populated_arena();
    let query = CompiledQuery {
        conditions: vec![Condition { column: 2, operator: Operator::Between, arg_index: 0, ignore_case: false, next_combinator: Combinator::And }],
        order_by: vec![],
        limit: 0,
    };

    let mut group = c.benchmark_group("range_scan");
    group.throughput(Throughput::Elements(ROW_COUNT as u64 / 1000 * 100));
    group.bench_function("range_index_between", |b| {
        b.iter(|| {
            let args = vec![QueryArg::Scalar(Value::I32(100)), QueryArg::Scalar(Value::I32(199))];
            let hits = arena.with_table("Person", |table, _| query.evaluate(table, &args)).unwrap();
            black_box(hits)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_point_lookup, bench_range_scan);
criterion_main!(benches);
