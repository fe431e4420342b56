// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Full fixed-step benchmarks for the built-in pipeline

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kinetic_engine::ecs::components::{Collider, RigidBody, Transform};
use kinetic_engine::ecs::World;
use kinetic_engine::math::Vec3;
use kinetic_engine::physics::{BuiltinBackend, PhysicsWorld};
use kinetic_engine::PhysicsConfig;

/// Columns of boxes standing on a ground slab
fn stacks(columns: usize, height: usize) -> World {
    let world = World::new();
    let ground = world.spawn();
    world.add_component(ground, Transform::from_position(Vec3::new(0.0, -0.5, 0.0))).unwrap();
    world.add_component(ground, Collider::cuboid(Vec3::new(100.0, 0.5, 100.0))).unwrap();
    for c in 0..columns {
        let x = (c % 10) as f32 * 2.0;
        let z = (c / 10) as f32 * 2.0;
        for level in 0..height {
            let id = world.spawn();
            world
                .add_component(id, Transform::from_position(Vec3::new(x, 0.5 + level as f32, z)))
                .unwrap();
            world.add_component(id, RigidBody::dynamic(1.0)).unwrap();
            world.add_component(id, Collider::cuboid(Vec3::splat(0.5))).unwrap();
        }
    }
    world
}

fn bench_fixed_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_step");
    group.sample_size(20);

    for (multithreading, label) in [(false, "sequential"), (true, "parallel")] {
        for columns in [10, 50].iter() {
            let bodies = columns * 5;
            group.throughput(Throughput::Elements(bodies as u64));
            group.bench_with_input(BenchmarkId::new(label, bodies), columns, |b, &columns| {
                let world = stacks(columns, 5);
                let config = PhysicsConfig {
                    enable_multithreading: multithreading,
                    enable_sleeping: false,
                    ..PhysicsConfig::default()
                };
                let backend = BuiltinBackend::new(&config);
                let mut physics = PhysicsWorld::with_backend(config, backend);
                b.iter(|| physics.fixed_update(&world));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_fixed_step);
criterion_main!(benches);
