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
//! System execution framework
//!
//! Systems contain the logic that operates on entities and components. They
//! receive a shared `&World`; all storage behind it uses interior locking, so
//! a system reads and writes components through the registry API.

use crate::ecs::World;
use crate::error::Result;

/// Canonical system priorities (lower runs earlier)
pub mod priorities {
    /// Camera matrices
    pub const CAMERA: i32 = 5;
    /// Transform hierarchy resolution
    pub const TRANSFORM: i32 = 10;
    /// Asset upload polling
    pub const RESOURCE_LOADING: i32 = 20;
    /// Light gathering
    pub const LIGHT: i32 = 50;
    /// Collision detection
    pub const COLLISION_DETECTION: i32 = 100;
    /// Physics update
    pub const PHYSICS_UPDATE: i32 = 110;
    /// Mesh submission
    pub const MESH_RENDER: i32 = 200;
    /// Sprite submission
    pub const SPRITE_RENDER: i32 = 300;
}

/// Trait for systems driven by the world's scheduler
///
/// Only `update` is required. Lifecycle hooks run in this order:
/// `on_create` when added, `post_initialize` once every system exists,
/// `update` every frame, `on_destroy` at shutdown.
pub trait System: Send {
    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Scheduling priority, lower runs first
    fn priority(&self) -> i32 {
        0
    }

    /// Called once when the system is added to a world
    fn on_create(&mut self, _world: &World) -> Result<()> {
        Ok(())
    }

    /// Called once after all systems were created; resolve peer references here
    fn post_initialize(&mut self, _world: &World) -> Result<()> {
        Ok(())
    }

    /// Per-frame work
    fn update(&mut self, world: &World, dt: f32) -> Result<()>;

    /// Called when the world shuts down
    fn on_destroy(&mut self, _world: &World) {}

    /// Disabled systems are skipped by the scheduler
    fn is_enabled(&self) -> bool {
        true
    }
}
