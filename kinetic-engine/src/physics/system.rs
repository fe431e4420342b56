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
//! Physics as a scheduled ECS system

use crate::config::PhysicsConfig;
use crate::ecs::{priorities, System, World};
use crate::error::Result;
use crate::physics::backend::{DefaultBackend, PhysicsBackend};
use crate::physics::world::PhysicsWorld;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Runs a [`PhysicsWorld`] once per frame at [`priorities::PHYSICS_UPDATE`]
///
/// The world is shared: [`PhysicsSystem::handle`] gives gameplay code access
/// to contacts, plugins and debug lines between frames.
pub struct PhysicsSystem<B: PhysicsBackend + 'static = DefaultBackend> {
    physics: Arc<Mutex<PhysicsWorld<B>>>,
}

impl PhysicsSystem<DefaultBackend> {
    /// System over a new default-backend world
    pub fn new(config: PhysicsConfig) -> Result<Self> {
        Ok(Self::from_world(PhysicsWorld::new(config)?))
    }
}

impl<B: PhysicsBackend + 'static> PhysicsSystem<B> {
    /// System over an existing world
    pub fn from_world(physics: PhysicsWorld<B>) -> Self {
        PhysicsSystem {
            physics: Arc::new(Mutex::new(physics)),
        }
    }

    /// Shared handle to the simulated world
    pub fn handle(&self) -> Arc<Mutex<PhysicsWorld<B>>> {
        Arc::clone(&self.physics)
    }
}

impl<B: PhysicsBackend + 'static> System for PhysicsSystem<B> {
    fn name(&self) -> &str {
        "PhysicsSystem"
    }

    fn priority(&self) -> i32 {
        priorities::PHYSICS_UPDATE
    }

    fn on_create(&mut self, world: &World) -> Result<()> {
        self.physics.lock().attach(world)
    }

    fn update(&mut self, world: &World, dt: f32) -> Result<()> {
        self.physics.lock().step(world, dt);
        Ok(())
    }

    fn on_destroy(&mut self, _world: &World) {
        if let Err(err) = self.physics.lock().shutdown() {
            warn!(error = %err, "physics plugins failed to shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{RigidBody, Transform};
    use crate::ecs::transform::TransformSystem;
    use crate::math::Vec3;

    #[test]
    fn test_runs_after_transform_system() {
        let mut world = World::new();
        world.add_system(PhysicsSystem::new(PhysicsConfig::default()).unwrap());
        world.add_system(TransformSystem::new());
        assert_eq!(world.system_names(), ["TransformSystem", "PhysicsSystem"]);
    }

    #[test]
    fn test_world_update_steps_physics() {
        let mut world = World::new();
        let id = world.spawn();
        world
            .add_component(id, Transform::from_position(Vec3::new(0.0, 10.0, 0.0)))
            .unwrap();
        world.add_component(id, RigidBody::dynamic(1.0)).unwrap();
        let system = PhysicsSystem::new(PhysicsConfig::default()).unwrap();
        let handle = system.handle();
        world.add_system(system);

        for _ in 0..60 {
            let report = world.update(1.0 / 60.0);
            assert_eq!(report.failed, 0);
        }
        assert_eq!(handle.lock().stats().fixed_steps, 60);
        let t: Transform = world.get_component(id).unwrap();
        assert!(t.position().y < 6.0);
    }
}
