use criterion::{Criterion, criterion_group, criterion_main};
use graphex::{
    graph::Graph,
    task::{P0, P1, P2, P3},
};
use std::hint::black_box;

fn scramble(mut value: i64, rounds: i64) -> i64 {
    for i in 0..rounds {
        value ^= (value << 1).wrapping_add(i);
    }
    value
}

/// Engine overhead on a trivial diamond, against the equivalent straight-line
/// calls.
fn graph_overhead(c: &mut Criterion) {
    c.bench_function("diamond_rebuild", |bencher| {
        bencher.iter(|| {
            let mut graph = Graph::new(1);
            let a = graph.node(|| 1);
            let b = graph.node(|x: i32| x + 2);
            let half = graph.node(|x: i32| x * 2);
            let d = graph.node(|x: i32, y: i32| x % y);
            b.bind(P0, &a).unwrap();
            half.bind(P0, &a).unwrap();
            d.bind(P0, &b).unwrap();
            d.bind(P1, &half).unwrap();
            d.mark_output().unwrap();
            graph.execute();
            black_box(d.collect().unwrap())
        });
    });
    c.bench_function("diamond_direct_calls", |bencher| {
        bencher.iter(|| {
            let a = black_box(1);
            let b = a + 2;
            let c = a * 2;
            black_box(b % c)
        });
    });
}

/// A prebuilt wide fan-out of costly stages under four workers, driven
/// through repeated execute/reset cycles.
fn parallel_fan_out(c: &mut Criterion) {
    let mut graph = Graph::new(4);
    let source = graph.node(|| scramble(black_box(3), 1_000));
    let stages: Vec<_> = (0..4_i64)
        .map(|i| {
            let stage = graph.node(move |x: i64| scramble(x + i, 400_000));
            stage.bind(P0, &source).unwrap();
            stage
        })
        .collect();
    let sink = graph.node(|a: i64, b: i64, c: i64, d: i64| a ^ b ^ c ^ d);
    sink.bind(P0, &stages[0]).unwrap();
    sink.bind(P1, &stages[1]).unwrap();
    sink.bind(P2, &stages[2]).unwrap();
    sink.bind(P3, &stages[3]).unwrap();
    sink.mark_output().unwrap();

    c.bench_function("wide_fan_out_execute_reset", |bencher| {
        bencher.iter(|| {
            graph.execute();
            let value = sink.collect().unwrap();
            graph.reset();
            black_box(value)
        });
    });
}

criterion_group!(benches, graph_overhead, parallel_fan_out);
criterion_main!(benches);
