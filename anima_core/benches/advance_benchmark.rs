//! Tick benchmark: `ActuatorPool::advance` for origins of 1 to 64 channels.
//!
//! Every channel is kept in flight so each iteration evaluates the easing
//! curve and its derivative per row, like a busy face during speech.

use std::hint::black_box;
use std::sync::Arc;

use anima_core::{ActuatorPool, ChannelStore, Dynamics, TargetBatch};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

const DT: f64 = 0.01; // 100 Hz

fn busy_pool(n: usize) -> (ActuatorPool, Vec<String>) {
    let pool = ActuatorPool::new(
        Arc::new(ChannelStore::new()),
        "face",
        Arc::new(Dynamics::new()),
    )
    .unwrap();
    let names: Vec<String> = (0..n).map(|i| format!("au_{i:02}")).collect();
    pool.register(&names, None).unwrap();
    (pool, names)
}

fn retarget_all(pool: &ActuatorPool, names: &[String], cycle: u64) {
    let sign = if cycle % 2 == 0 { 1.0 } else { -1.0 };
    let batch: TargetBatch = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), sign * (0.2 + 0.01 * i as f64), 1.0e9))
        .collect();
    pool.commit(batch).unwrap();
}

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");
    group.significance_level(0.01);
    group.sample_size(500);

    for &n_channels in &[1usize, 8, 16, 32, 64] {
        let (pool, names) = busy_pool(n_channels);
        retarget_all(&pool, &names, 0);

        group.bench_with_input(
            BenchmarkId::new("channels", n_channels),
            &n_channels,
            |b, &_n| {
                b.iter(|| black_box(pool.advance(black_box(DT), true)));
            },
        );
    }

    group.finish();
}

fn bench_retarget(c: &mut Criterion) {
    let (pool, names) = busy_pool(64);
    let mut cycle = 0u64;

    c.bench_function("set_targets_64", |b| {
        b.iter(|| {
            cycle += 1;
            retarget_all(&pool, &names, cycle);
        });
    });
}

criterion_group!(benches, bench_advance, bench_retarget);
criterion_main!(benches);
