use criterion::{criterion_group, criterion_main, Criterion};
use geoquery_core::prelude::*;
use geoquery_io::MemorySource;
use geoquery_operators::FeatureSource;
use geoquery_planner::PipelineAssembler;
use geoquery_sql::{PostgisDialect, SqlCompiler};
use std::sync::Arc;

fn make_source(rows: usize, caps: Capabilities) -> MemorySource {
    let schema = Schema::builder("sites")
        .attribute("kind", ValueType::String)
        .attribute("score", ValueType::Integer)
        .geometry("pos", Some(Crs::epsg(4326)))
        .build()
        .unwrap();
    let features = (0..rows)
        .map(|i| {
            Feature::new(
                format!("sites.{i:06}"),
                vec![
                    Value::from(format!("kind-{}", i % 7)),
                    Value::Int((i % 100) as i64),
                    Value::Geometry(Geometry::point((i % 360) as f64 - 180.0, (i % 170) as f64 - 85.0)),
                ],
            )
        })
        .collect();
    MemorySource::new(schema, features).unwrap().with_capabilities(caps)
}

fn predicate() -> Predicate {
    Predicate::and(vec![
        Predicate::compare(
            ComparisonOp::Gte,
            Expression::property("score"),
            Expression::literal(50),
        ),
        Predicate::like(Expression::property("kind"), "kind-?"),
        Predicate::bbox("pos", Envelope::new(-90.0, -45.0, 90.0, 45.0)),
    ])
}

fn bench_pipelines(c: &mut Criterion) {
    let query = Query::new("sites")
        .with_predicate(predicate())
        .with_start_index(100)
        .with_max_features(1000)
        .with_properties(["kind", "pos"]);
    let assembler = PipelineAssembler::without_transforms();

    let decorated = make_source(10_000, Capabilities::none().with_sort(true));
    c.bench_function("pipeline_decorated_10k", |b| {
        b.iter(|| {
            let _ = assembler.open(&decorated, &query).unwrap().collect_all().unwrap();
        })
    });

    let native = make_source(10_000, Capabilities::all());
    c.bench_function("pipeline_native_10k", |b| {
        b.iter(|| {
            let _ = assembler.open(&native, &query).unwrap().collect_all().unwrap();
        })
    });
}

fn bench_sql(c: &mut Criterion) {
    let schema = make_source(0, Capabilities::none()).schema().clone();
    let inline = SqlCompiler::new(schema).with_dialect(Arc::new(PostgisDialect));
    let prepared = inline.clone().prepared();
    let p = predicate();
    c.bench_function("sql_inline", |b| b.iter(|| inline.compile(&p).unwrap()));
    c.bench_function("sql_prepared", |b| b.iter(|| prepared.compile(&p).unwrap()));
}

criterion_group!(benches, bench_pipelines, bench_sql);
criterion_main!(benches);
