//! Tick throughput benchmarks for ctf_core.
//!
//! Run with: `cargo bench -p ctf_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use ctf_core::arena::Arena;
use ctf_core::simulation::CaptureTheFlag;
use ctf_test_utils::fixtures::{random_action_stream, standard_scenario};

/// Runs tick benchmarks on the standard 2v2 field.
pub fn tick_benchmark(c: &mut Criterion) {
    let config = standard_scenario();
    let stream = random_action_stream(&[1, 2, 3, 4], 500, 17);

    c.bench_function("tick_2v2_random_500", |b| {
        b.iter_batched(
            || {
                let mut arena = Arena::from_scenario(&config);
                let game = CaptureTheFlag::new(&config, &mut arena).expect("valid scenario");
                (arena, game)
            },
            |(mut arena, mut game)| {
                for actions in &stream {
                    black_box(game.tick(&mut arena, actions).expect("tick"));
                }
                game.state_hash()
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("observations_2v2", |b| {
        let mut arena = Arena::from_scenario(&config);
        let game = CaptureTheFlag::new(&config, &mut arena).expect("valid scenario");
        b.iter(|| black_box(game.observations(&arena).expect("observe")));
    });
}

criterion_group!(benches, tick_benchmark);
criterion_main!(benches);
