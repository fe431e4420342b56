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
//! Bouncing ball example
//!
//! Drops a ball onto a static ground slab and prints its height every few
//! frames while the physics system runs inside the world's scheduler.

use kinetic_engine::ecs::components::{Collider, PhysicsMaterial, RigidBody, Transform};
use kinetic_engine::ecs::World;
use kinetic_engine::math::Vec3;
use kinetic_engine::physics::{CollisionEvent, ContactPhase, PhysicsSystem};
use kinetic_engine::{PhysicsConfig, Result};
use std::sync::Arc;

fn main() -> Result<()> {
    println!("Kinetic Engine - Bouncing Ball");
    println!("==============================\n");

    let mut world = World::new();
    let bouncy = Arc::new(PhysicsMaterial::new(0.3, 0.8));

    let ground = world.spawn();
    world.add_component(ground, Transform::from_position(Vec3::new(0.0, -0.5, 0.0)))?;
    world.add_component(ground, RigidBody::new_static())?;
    world.add_component(
        ground,
        Collider::cuboid(Vec3::new(10.0, 0.5, 10.0)).with_material(Arc::clone(&bouncy)),
    )?;

    let ball = world.spawn();
    world.add_component(ball, Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))?;
    world.add_component(ball, RigidBody::dynamic(1.0))?;
    world.add_component(ball, Collider::sphere(0.5).with_material(bouncy))?;

    world.events().subscribe(|e: &CollisionEvent| {
        if e.phase == ContactPhase::Enter {
            println!("  bounce at {:.2} m/s", e.relative_speed);
        }
    });

    world.add_system(PhysicsSystem::new(PhysicsConfig::default())?);
    world.initialize();

    let dt = 1.0 / 60.0;
    for frame in 0..240 {
        world.update(dt);
        if frame % 15 == 0 {
            let y = world.get_component::<Transform>(ball)?.position().y;
            let vy = world.get_component::<RigidBody>(ball)?.linear_velocity.y;
            println!("frame {frame:3}: y = {y:6.3} m, vy = {vy:7.3} m/s");
        }
    }

    world.shutdown();
    Ok(())
}
