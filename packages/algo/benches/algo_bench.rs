//! Benchmark suite for pecs-algo
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pecs_algo::{
    create_adaptive_state, get_performance_summary, simulate_cohort, update_adaptive_state,
    AdaptiveSettings, SimulatedLearner, TrialInput,
};

fn bench_update_adaptive_state(c: &mut Criterion) {
    let settings = AdaptiveSettings::default();
    let mut state = create_adaptive_state(3);
    for i in 0..settings.window_size {
        state = update_adaptive_state(&state, TrialInput::new(i % 3 != 0, 1500), &settings).state;
    }

    c.bench_function("update_adaptive_state (full window)", |b| {
        b.iter(|| update_adaptive_state(black_box(&state), TrialInput::new(true, 1200), &settings))
    });
}

fn bench_performance_summary(c: &mut Criterion) {
    let settings = AdaptiveSettings::default();
    let mut state = create_adaptive_state(3);
    for i in 0..settings.window_size {
        state = update_adaptive_state(&state, TrialInput::new(i % 2 == 0, 1500), &settings).state;
    }

    c.bench_function("get_performance_summary", |b| {
        b.iter(|| get_performance_summary(black_box(&state), settings.window_size))
    });
}

fn bench_simulate_cohort(c: &mut Criterion) {
    let settings = AdaptiveSettings::default();
    let learners: Vec<SimulatedLearner> = (0..64)
        .map(|i| SimulatedLearner::new(0.7 + (i % 6) as f64 * 0.05, 0.08, 2500))
        .collect();

    c.bench_function("simulate_cohort (64 x 200)", |b| {
        b.iter(|| simulate_cohort(&settings, black_box(&learners), 200, 42))
    });
}

criterion_group!(
    benches,
    bench_update_adaptive_state,
    bench_performance_summary,
    bench_simulate_cohort
);
criterion_main!(benches);
