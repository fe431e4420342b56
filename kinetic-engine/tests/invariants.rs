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
//! Properties that must hold on every frame

use kinetic_engine::ecs::components::{BodyType, Collider, PhysicsMaterial, RigidBody, Transform};
use kinetic_engine::ecs::{EntityDesc, World};
use kinetic_engine::math::{Quat, Vec3};
use kinetic_engine::physics::{BuiltinBackend, PhysicsWorld};
use kinetic_engine::PhysicsConfig;
use std::sync::Arc;

const DT: f32 = 1.0 / 60.0;

fn physics(config: PhysicsConfig) -> PhysicsWorld<BuiltinBackend> {
    let backend = BuiltinBackend::new(&config);
    PhysicsWorld::with_backend(config, backend)
}

fn zero_gravity() -> PhysicsConfig {
    PhysicsConfig {
        gravity: Vec3::ZERO,
        ..PhysicsConfig::default()
    }
}

#[test]
fn destroyed_handles_stay_invalid() {
    let world = World::new();
    let a = world.create_entity(EntityDesc::named("a"));
    world.add_component(a, Transform::default()).unwrap();
    assert!(world.is_valid(a));

    assert!(world.destroy_entity(a));
    assert!(!world.is_valid(a));
    assert!(world.get_component::<Transform>(a).is_err());
    assert!(world.add_component(a, Transform::default()).is_err());
    assert!(!world.destroy_entity(a));

    let b = world.spawn();
    assert_ne!(a, b);
    assert!(!world.is_valid(a));
    assert!(!world.has_component::<Transform>(b));
}

#[test]
fn inverse_mass_is_zero_exactly_for_non_dynamic_bodies() {
    let mut body = RigidBody::dynamic(2.0);
    assert!((body.inverse_mass() - 0.5).abs() < 1e-6);
    for kind in [BodyType::Static, BodyType::Kinematic] {
        body.set_body_type(kind);
        assert_eq!(body.inverse_mass(), 0.0, "{kind:?}");
    }
    body.set_body_type(BodyType::Dynamic);
    assert!(body.inverse_mass() > 0.0);
    assert_eq!(RigidBody::kinematic().inverse_mass(), 0.0);
    assert_eq!(RigidBody::new_static().inverse_mass(), 0.0);
}

#[test]
fn spinning_body_keeps_unit_quaternion() {
    let world = World::new();
    let spinner = world.spawn();
    world.add_component(spinner, Transform::default()).unwrap();
    let mut body = RigidBody::dynamic(1.0).with_damping(0.0, 0.0);
    body.angular_velocity = Vec3::new(3.0, 7.0, -2.0);
    world.add_component(spinner, body).unwrap();
    world.add_component(spinner, Collider::cuboid(Vec3::new(0.5, 0.2, 0.8))).unwrap();

    let mut physics = physics(zero_gravity());
    for _ in 0..240 {
        physics.step(&world, DT);
        let q = world.get_component::<Transform>(spinner).unwrap().rotation();
        assert!((q.length() - 1.0).abs() < 1e-4, "|q| = {}", q.length());
    }
}

#[test]
fn manifolds_are_well_formed_in_a_stack() {
    let world = World::new();
    let ground = world.spawn();
    world.add_component(ground, Transform::from_position(Vec3::new(0.0, -0.5, 0.0))).unwrap();
    world.add_component(ground, Collider::cuboid(Vec3::new(10.0, 0.5, 10.0))).unwrap();
    for level in 0..4 {
        let id = world.spawn();
        let offset = if level % 2 == 0 { 0.0 } else { 0.1 };
        world
            .add_component(id, Transform::from_position(Vec3::new(offset, 0.5 + level as f32 * 1.01, 0.0)))
            .unwrap();
        world.add_component(id, RigidBody::dynamic(1.0)).unwrap();
        world.add_component(id, Collider::cuboid(Vec3::splat(0.5))).unwrap();
    }

    let mut physics = physics(PhysicsConfig::default());
    let mut checked = 0;
    for _ in 0..120 {
        physics.step(&world, DT);
        for m in physics.contacts() {
            assert!((m.normal.length() - 1.0).abs() < 1e-3, "normal {:?}", m.normal);
            assert!(m.contact_count() <= 4);
            for p in m.points() {
                assert!(p.penetration <= m.penetration + 1e-6);
            }
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn sleeping_bodies_report_zero_velocity() {
    let world = World::new();
    let ground = world.spawn();
    world.add_component(ground, Transform::from_position(Vec3::new(0.0, -0.5, 0.0))).unwrap();
    world.add_component(ground, Collider::cuboid(Vec3::new(5.0, 0.5, 5.0))).unwrap();
    let cube = world.spawn();
    world.add_component(cube, Transform::from_position(Vec3::new(0.0, 0.5, 0.0))).unwrap();
    world.add_component(cube, RigidBody::dynamic(1.0)).unwrap();
    world.add_component(cube, Collider::cuboid(Vec3::splat(0.5))).unwrap();

    let mut physics = physics(PhysicsConfig::default());
    let mut slept = false;
    for _ in 0..180 {
        physics.step(&world, DT);
        let body = world.get_component::<RigidBody>(cube).unwrap();
        if body.is_sleeping() {
            slept = true;
            assert_eq!(body.linear_velocity, Vec3::ZERO);
            assert_eq!(body.angular_velocity, Vec3::ZERO);
        }
    }
    assert!(slept);
}

#[test]
fn elastic_collision_conserves_energy() {
    let world = World::new();
    let elastic = Arc::new(PhysicsMaterial::new(0.0, 1.0));
    let mut ids = Vec::new();
    for (x, vx) in [(-2.0, 3.0), (2.0, -3.0)] {
        let id = world.spawn();
        world.add_component(id, Transform::from_position(Vec3::new(x, 0.0, 0.0))).unwrap();
        world
            .add_component(
                id,
                RigidBody::dynamic(1.0)
                    .with_damping(0.0, 0.0)
                    .with_linear_velocity(Vec3::new(vx, 0.0, 0.0)),
            )
            .unwrap();
        world
            .add_component(id, Collider::sphere(0.5).with_material(Arc::clone(&elastic)))
            .unwrap();
        ids.push(id);
    }
    let energy = |world: &World| -> f32 {
        ids.iter()
            .map(|&id| {
                let v = world.get_component::<RigidBody>(id).unwrap().linear_velocity;
                0.5 * v.length_squared()
            })
            .sum()
    };

    let mut config = zero_gravity();
    config.enable_sleeping = false;
    let mut physics = physics(config);
    let initial = energy(&world);
    for _ in 0..60 {
        physics.step(&world, DT);
    }
    let drift = (energy(&world) - initial).abs() / initial;
    assert!(drift < 0.05, "energy drift {drift}");
    let left = world.get_component::<RigidBody>(ids[0]).unwrap().linear_velocity.x;
    assert!(left < 0.0, "spheres did not rebound");
}

#[test]
fn free_fall_follows_closed_form() {
    let world = World::new();
    let id = world.spawn();
    let y0 = 100.0;
    let v0 = 2.0;
    world.add_component(id, Transform::from_position(Vec3::new(0.0, y0, 0.0))).unwrap();
    world
        .add_component(
            id,
            RigidBody::dynamic(1.0).with_linear_velocity(Vec3::new(0.0, v0, 0.0)),
        )
        .unwrap();

    let mut physics = physics(PhysicsConfig::default());
    let g = -9.81;
    for step in 1..=60 {
        physics.step(&world, DT);
        let t = step as f32 * DT;
        let y = world.get_component::<Transform>(id).unwrap().position().y;
        let v = world.get_component::<RigidBody>(id).unwrap().linear_velocity.y;
        assert!((v - (v0 + g * t)).abs() < 0.15, "v({t}) = {v}");
        assert!((y - (y0 + v0 * t + 0.5 * g * t * t)).abs() < 0.15, "y({t}) = {y}");
    }
}

#[test]
fn static_pose_survives_simulation_bit_identical() {
    let world = World::new();
    let rotation = Quat::from_rotation_y(0.3) * Quat::from_rotation_x(0.1);
    let position = Vec3::new(1.25, -0.5, 3.0);
    let wall = world.spawn();
    world
        .add_component(wall, Transform::from_position_rotation(position, rotation))
        .unwrap();
    world.add_component(wall, RigidBody::new_static()).unwrap();
    world.add_component(wall, Collider::cuboid(Vec3::new(2.0, 0.5, 2.0))).unwrap();
    let ball = world.spawn();
    world.add_component(ball, Transform::from_position(Vec3::new(1.25, 2.0, 3.0))).unwrap();
    world.add_component(ball, RigidBody::dynamic(1.0)).unwrap();
    world.add_component(ball, Collider::sphere(0.5)).unwrap();

    let mut physics = physics(PhysicsConfig::default());
    for _ in 0..120 {
        physics.step(&world, DT * 0.7);
    }
    let t = world.get_component::<Transform>(wall).unwrap();
    assert_eq!(t.position(), position);
    assert_eq!(t.rotation(), rotation);
}
