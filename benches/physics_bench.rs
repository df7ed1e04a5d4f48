use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use glam::Vec2;
use impulse2d::prelude::*;

const DT: f32 = 1.0 / 60.0;

fn spawn_box_grid(world: &mut World, count: usize, spacing: f32, half_extent: f32) {
    let side = (count as f32).sqrt().ceil() as usize;
    let mut spawned = 0usize;

    for y in 0..side {
        for x in 0..side {
            if spawned >= count {
                return;
            }

            let position = Vec2::new(x as f32 * spacing, 1.0 + y as f32 * spacing);
            let body = world.create_body(BodyDef::dynamic_at(position));
            world
                .create_fixture(
                    body,
                    FixtureDef::new(PolygonShape::rect(half_extent, half_extent))
                        .with_density(1.0),
                )
                .expect("fixture");

            spawned += 1;
        }
    }
}

fn setup_world(count: usize, spacing: f32, half_extent: f32) -> World {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    world.set_allow_sleeping(false);

    let ground = world.create_body(BodyDef::static_at(Vec2::new(0.0, -10.0)));
    world
        .create_fixture(ground, FixtureDef::new(PolygonShape::rect(100.0, 10.0)))
        .expect("fixture");

    spawn_box_grid(&mut world, count, spacing, half_extent);
    world
}

fn bench_step_falling_grid(c: &mut Criterion) {
    let mut world = setup_world(256, 1.5, 0.5);

    c.bench_function("world/step_falling_256", |b| {
        b.iter(|| {
            world.step(DT, 8, 3);
            black_box(world.contact_count());
        })
    });
}

fn bench_step_resting_grid(c: &mut Criterion) {
    let mut world = setup_world(256, 1.02, 0.5);
    // Let the pile land so the bench measures resting contact solves.
    for _ in 0..180 {
        world.step(DT, 8, 3);
    }

    c.bench_function("world/step_resting_256", |b| {
        b.iter(|| {
            world.step(DT, 8, 3);
            black_box(world.contact_count());
        })
    });
}

fn bench_query_aabb(c: &mut Criterion) {
    let world = setup_world(1024, 1.5, 0.5);

    let mut flip = false;
    c.bench_function("world/query_aabb_1024", |b| {
        b.iter(|| {
            let offset = if flip { 0.25 } else { -0.25 };
            flip = !flip;
            let aabb = Aabb {
                min: Vec2::new(10.0 + offset, 10.0),
                max: Vec2::new(20.0 + offset, 20.0),
            };
            let mut hits = 0usize;
            world.query_aabb(&aabb, |_, _| {
                hits += 1;
                true
            });
            black_box(hits);
        })
    });
}

fn bench_ray_cast(c: &mut Criterion) {
    let world = setup_world(1024, 1.5, 0.5);

    let mut flip = false;
    c.bench_function("world/ray_cast_1024", |b| {
        b.iter(|| {
            let y = if flip { 10.25 } else { 9.75 };
            flip = !flip;
            let mut closest = 1.0f32;
            world.ray_cast(Vec2::new(-10.0, y), Vec2::new(60.0, y), |_, _, _, fraction| {
                closest = fraction;
                fraction
            });
            black_box(closest);
        })
    });
}

criterion_group!(
    benches,
    bench_step_falling_grid,
    bench_step_resting_grid,
    bench_query_aabb,
    bench_ray_cast
);
criterion_main!(benches);
