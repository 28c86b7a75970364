//! Physics engine benchmarks (criterion - wall-clock time).
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench physics
//! Filter:     cargo bench --manifest-path benchmarks/Cargo.toml --bench physics -- broadphase

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use rein_bench::*;
use rein_physics2d::physics::broadphase::SweepAndPrune;
use rein_physics2d::physics::narrowphase::collide;
use rein_physics2d::Shape;

// ---------------------------------------------------------------------------
// Broadphase
// ---------------------------------------------------------------------------

fn bench_broadphase(c: &mut Criterion) {
    let scenes: [(&str, fn(usize) -> anyhow::Result<rein_physics2d::Space>); 3] = [
        ("broadphase/uniform_balls", setup_ball_space),
        ("broadphase/mixed_shapes", setup_mixed_space),
        ("broadphase/sparse", setup_sparse_space),
    ];

    for (name, setup) in scenes {
        let mut group = c.benchmark_group(name);
        for &n in &[100, 500, 1000, 2000] {
            let space = setup(n).expect("scene setup");
            let mut broadphase = SweepAndPrune::new();
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter(|| broadphase.find_pairs(space.world()));
            });
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Narrowphase
// ---------------------------------------------------------------------------

fn placed(mut shape: Shape, position: Vec2, angle: f32) -> Shape {
    shape.cache_bb(position, Vec2::from_angle(angle));
    shape
}

fn bench_narrowphase(c: &mut Criterion) {
    let mut world = hecs::World::new();
    let body = world.spawn(());
    let circle = |p: Vec2| {
        placed(
            Shape::circle(body, 1.0, Vec2::ZERO).expect("valid shape"),
            p,
            0.0,
        )
    };
    let square = |p: Vec2, angle: f32| placed(Shape::new_box(body, 2.0, 2.0), p, angle);
    let segment = placed(
        Shape::segment(body, Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0), 0.1).expect("valid shape"),
        Vec2::ZERO,
        0.0,
    );

    {
        let mut group = c.benchmark_group("narrowphase/circle_circle");
        let a = circle(Vec2::ZERO);
        let hit = circle(Vec2::new(1.5, 0.0));
        group.bench_function("intersecting", |b| b.iter(|| collide(&a, &hit, 0.1)));
        let miss = circle(Vec2::new(5.0, 0.0));
        group.bench_function("separated", |b| b.iter(|| collide(&a, &miss, 0.1)));
        group.finish();
    }

    {
        let mut group = c.benchmark_group("narrowphase/poly_poly");
        let a = square(Vec2::ZERO, 0.0);
        let hit = square(Vec2::new(1.5, 0.5), 0.0);
        group.bench_function("intersecting", |b| b.iter(|| collide(&a, &hit, 0.1)));
        let miss = square(Vec2::new(5.0, 0.0), 0.0);
        group.bench_function("separated", |b| b.iter(|| collide(&a, &miss, 0.1)));
        let rotated = square(Vec2::new(1.5, 0.0), 0.785);
        group.bench_function("rotated", |b| b.iter(|| collide(&a, &rotated, 0.1)));
        group.finish();
    }

    {
        let mut group = c.benchmark_group("narrowphase/dispatch");
        let ball = circle(Vec2::new(0.0, 0.9));
        let block = square(Vec2::new(0.0, 0.9), 0.0);
        group.bench_function("circle_segment", |b| b.iter(|| collide(&ball, &segment, 0.1)));
        group.bench_function("segment_poly", |b| b.iter(|| collide(&segment, &block, 0.1)));
        group.bench_function("circle_poly", |b| {
            let near = square(Vec2::new(1.5, 0.9), 0.3);
            b.iter(|| collide(&ball, &near, 0.1))
        });
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

fn bench_solver(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver/iterations");
    group.sample_size(30);
    for &iters in &[1, 4, 10, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(iters), &iters, |b, &iters| {
            b.iter_batched(
                || {
                    let mut space = setup_pyramid(10).expect("pyramid setup");
                    space.config_mut().iterations = iters;
                    space
                },
                |mut space| space.fixed_step(DT),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

fn bench_pipeline(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("pipeline/step");
        group.sample_size(30);
        for &n in &[50, 100, 500, 1000] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_scene(n).expect("scene setup"),
                    |mut space| space.step(1.0 / 60.0),
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("pipeline/sustained_10steps");
        group.sample_size(20);
        for &n in &[100, 500] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_scene(n).expect("scene setup"),
                    |mut space| {
                        for _ in 0..10 {
                            space.step(1.0 / 60.0);
                        }
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("pipeline/stages");
        let mut space = setup_scene(500).expect("scene setup");
        group.bench_function("update_bounding_boxes_500", |b| {
            b.iter(|| space.update_bounding_boxes());
        });

        let mut broadphase = SweepAndPrune::new();
        group.bench_function("broadphase_500", |b| {
            b.iter(|| broadphase.find_pairs(space.world()));
        });
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Mass physics (continuous spawn + step)
// ---------------------------------------------------------------------------

fn bench_mass_physics(c: &mut Criterion) {
    let mut group = c.benchmark_group("mass_physics/spawn_rate");
    group.sample_size(10);
    for &spawn_per_frame in &[1, 3, 10] {
        group.bench_with_input(
            BenchmarkId::from_parameter(spawn_per_frame),
            &spawn_per_frame,
            |b, &spf| {
                b.iter_batched(
                    || setup_arena().expect("arena setup"),
                    |mut space| run_mass_physics(&mut space, 60, spf).expect("spawn"),
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_broadphase,
    bench_narrowphase,
    bench_solver,
    bench_pipeline,
    bench_mass_physics,
);
criterion_main!(benches);
