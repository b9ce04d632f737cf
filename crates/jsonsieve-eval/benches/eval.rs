//! Engine benchmarks for jsonsieve-eval.
//!
//! Measures record routing at various rule counts, in-place rewriting, and
//! key flattening. Dispatch and file I/O are not included.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use jsonsieve_eval::{ReplaceEngine, SelectEngine, flatten};
use jsonsieve_rules::{RuleFormat, parse_replace_rules, parse_select_rules};
use serde_json::{Map, Value, json};

fn gen_select_rules(n: usize) -> String {
    let rules: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "position": i,
                "output": format!("out-{i}"),
                "conditions": [
                    {"type": "match", "key": "event.kind", "values": [format!("kind-{i}")], "exclude": false},
                    {"type": "prefix", "key": "host.name", "values": ["web-"], "exclude": false},
                    {"type": "regex", "key": "tags", "values": [format!("^t{}$", i % 7)], "exclude": false}
                ]
            })
        })
        .collect();
    Value::Array(rules).to_string()
}

fn gen_records(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "event": {"kind": format!("kind-{}", i % 50), "seq": i},
                "host": {"name": format!("web-{:02}", i % 20), "ip": "10.0.0.1"},
                "tags": [format!("t{}", i % 7), "x", "y"],
                "user": {"name": "alice", "roles": ["admin", "dev"]}
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmark: route one record against N rules
// ---------------------------------------------------------------------------

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("route");
    let records = gen_records(1_000);

    for n in [10, 100, 1000] {
        let rules = parse_select_rules(&gen_select_rules(n), RuleFormat::Json).unwrap();
        let engine = SelectEngine::new(&rules);

        group.throughput(criterion::Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::new("rules", n), &records, |b, records| {
            b.iter(|| {
                for record in records {
                    black_box(engine.route(black_box(record)));
                }
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: rewrite records in place
// ---------------------------------------------------------------------------

fn bench_replace(c: &mut Criterion) {
    let rules = parse_replace_rules(
        r#"[
            {"order": 1, "type": "per-field", "field-name": "user.name", "original": "alice", "replacement": "REDACTED"},
            {"order": 2, "type": "global", "original": "10.0.0.1", "replacement": "0.0.0.0"},
            {"order": 3, "type": "timestamp", "field-name": "event.ts", "duration": 60000, "max-records": 1000000, "start-ms": 1661806626000}
        ]"#,
        RuleFormat::Json,
    )
    .unwrap();
    let engine = ReplaceEngine::new(&rules);
    let records = gen_records(1_000);

    c.bench_function("replace_1000_records", |b| {
        b.iter_with_setup(
            || records.clone(),
            |mut records| {
                for record in records.iter_mut() {
                    engine.apply(record);
                }
                black_box(records);
            },
        );
    });
}

// ---------------------------------------------------------------------------
// Benchmark: flatten dotted keys
// ---------------------------------------------------------------------------

fn bench_flatten(c: &mut Criterion) {
    let mut input = Map::new();
    for i in 0..50 {
        input.insert(format!("a{}.b{}.c{i}", i % 5, i % 3), Value::from(i));
    }

    c.bench_function("flatten_50_keys", |b| {
        b.iter_with_setup(|| input.clone(), |map| black_box(flatten(map)));
    });
}

criterion_group!(benches, bench_route, bench_replace, bench_flatten);
criterion_main!(benches);
