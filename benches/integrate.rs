//! Benchmarks for the CPU backend's spawn and integrate hot loops.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cinder::executor::Backend;
use cinder::prelude::*;

fn pool_with(config: &ParticleConfig) -> ParticlePool {
    ParticlePool::with_backend(config, Backend::Cpu).expect("CPU backend is infallible")
}

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_spawn");

    for shape in [EmitterShape::Point, EmitterShape::Sphere, EmitterShape::Cone] {
        let config = ParticleConfig {
            max_particles: 10_000,
            emitter_shape: shape,
            ..Default::default()
        };
        let mut pool = pool_with(&config);
        group.bench_function(format!("{shape:?}_10k"), |b| {
            b.iter(|| pool.spawn(black_box(0.0), 0.0, 0.0, 10_000, None))
        });
    }

    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_update");

    let plain = ParticleConfig { max_particles: 10_000, ..Default::default() };
    let mut pool = pool_with(&plain);
    pool.spawn(0.0, 0.0, 0.0, 10_000, None);
    group.bench_function("plain_10k", |b| b.iter(|| pool.update(black_box(1e-5))));

    let heavy = ParticleConfig {
        max_particles: 10_000,
        turbulence: Some(TurbulenceConfig { intensity: 1.0, frequency: 2.0, speed: 0.5 }),
        attractors: Some(vec![AttractorConfig::default()]),
        collision: Some(CollisionConfig::default()),
        rotation_speed: AxisInput::Range(-1.0, 1.0),
        ..Default::default()
    };
    let mut pool = pool_with(&heavy);
    pool.spawn(0.0, 1.0, 0.0, 10_000, None);
    group.bench_function("turbulence_attractors_10k", |b| {
        b.iter(|| pool.update(black_box(1e-5)))
    });

    group.finish();
}

criterion_group!(benches, bench_spawn, bench_update);
criterion_main!(benches);
