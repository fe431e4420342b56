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
//! Plugin API traits and context
//!
//! Plugins extend the physics step without touching component storage.
//! During the force stage every force field sees each awake dynamic body
//! through a read-only [`BodyView`] together with a [`PluginContext`]
//! describing the step, and returns the force and torque it contributes.

use crate::ecs::EntityId;
use crate::error::Result;
use crate::math::{Quat, Vec3};
use crate::physics::body::SimBody;
use crate::physics::shapes::ColliderShape;
use std::any::Any;

/// Version of the plugin API
///
/// Checked against each plugin's `api_version` on registration using
/// semantic versioning rules.
pub const PLUGIN_API_VERSION: &str = "0.3.0";

/// Step information handed to plugins
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PluginContext {
    timestep: f32,
    body_count: usize,
    gravity: Vec3,
    parallel: bool,
}

impl PluginContext {
    /// Create a context; only the engine builds these
    pub(crate) fn new(timestep: f32, body_count: usize, gravity: Vec3, parallel: bool) -> Self {
        PluginContext {
            timestep,
            body_count,
            gravity,
            parallel,
        }
    }

    /// Fixed timestep of the current step (s)
    pub fn timestep(&self) -> f32 {
        self.timestep
    }

    /// Bodies in the simulated scene
    pub fn body_count(&self) -> usize {
        self.body_count
    }

    /// World gravity
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// True when force fields are evaluated on the rayon pool
    pub fn is_parallel_enabled(&self) -> bool {
        self.parallel
    }

    /// Worker threads available to the force stage
    pub fn thread_count(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            if self.parallel {
                return rayon::current_num_threads();
            }
        }
        1
    }
}

/// Read-only view of one simulated body
#[derive(Clone, Copy)]
pub struct BodyView<'a> {
    sim: &'a SimBody,
}

impl<'a> BodyView<'a> {
    pub(crate) fn new(sim: &'a SimBody) -> Self {
        BodyView { sim }
    }

    /// Owning entity
    pub fn entity(&self) -> EntityId {
        self.sim.entity
    }

    /// Body origin
    pub fn position(&self) -> Vec3 {
        self.sim.position
    }

    /// Body orientation
    pub fn rotation(&self) -> Quat {
        self.sim.rotation
    }

    /// Center of mass in world space
    pub fn center_of_mass(&self) -> Vec3 {
        self.sim.world_com()
    }

    /// Linear velocity (m/s)
    pub fn linear_velocity(&self) -> Vec3 {
        self.sim.body.linear_velocity
    }

    /// Angular velocity (rad/s)
    pub fn angular_velocity(&self) -> Vec3 {
        self.sim.body.angular_velocity
    }

    /// Mass (kg), zero for non-dynamic bodies
    pub fn mass(&self) -> f32 {
        if self.sim.body.is_dynamic() {
            self.sim.body.mass()
        } else {
            0.0
        }
    }

    /// True for dynamic bodies
    pub fn is_dynamic(&self) -> bool {
        self.sim.body.is_dynamic()
    }

    /// Collider shape, if any
    pub fn shape(&self) -> Option<&'a ColliderShape> {
        self.sim.collider.as_ref().map(|c| c.shape())
    }

    /// Area the body presents to a flow along `direction`
    ///
    /// Uses the projection of the world AABB, which is exact for spheres and
    /// axis-aligned boxes. Bodies without a collider report zero.
    pub fn cross_section(&self, direction: Vec3) -> f32 {
        if self.sim.collider.is_none() {
            return 0.0;
        }
        let d = direction.normalize_or_zero().abs();
        let size = self.sim.aabb.max - self.sim.aabb.min;
        d.x * size.y * size.z + d.y * size.x * size.z + d.z * size.x * size.y
    }
}

impl std::fmt::Debug for BodyView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyView")
            .field("entity", &self.sim.entity)
            .field("position", &self.sim.position)
            .finish()
    }
}

/// Force and torque contributed to one body
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForceContribution {
    /// Force through the center of mass (N)
    pub force: Vec3,
    /// Torque (N·m)
    pub torque: Vec3,
}

impl ForceContribution {
    /// Pure force through the center of mass
    pub fn force(force: Vec3) -> Self {
        ForceContribution {
            force,
            torque: Vec3::ZERO,
        }
    }

    /// True when nothing is contributed
    pub fn is_zero(&self) -> bool {
        self.force == Vec3::ZERO && self.torque == Vec3::ZERO
    }
}

impl std::ops::Add for ForceContribution {
    type Output = ForceContribution;

    fn add(self, rhs: ForceContribution) -> ForceContribution {
        ForceContribution {
            force: self.force + rhs.force,
            torque: self.torque + rhs.torque,
        }
    }
}

/// Lifecycle hooks for plugins
///
/// Plugins are initialized in dependency order, updated once per fixed
/// step before forces are gathered and shut down in reverse order.
pub trait Plugin: Send + Sync {
    /// Unique name
    fn name(&self) -> &str;

    /// Plugin version (MAJOR.MINOR.PATCH)
    fn version(&self) -> &str;

    /// Plugin API version this plugin was built against
    fn api_version(&self) -> &str {
        PLUGIN_API_VERSION
    }

    /// Names of plugins that must be initialized first
    fn dependencies(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Called once before the first update
    fn initialize(&mut self, _context: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Called every fixed step
    fn update(&mut self, _context: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Called when the owning world shuts down
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    /// Force-field behavior, if this plugin has one
    fn as_force_field(&self) -> Option<&dyn ForceField> {
        None
    }

    /// Allow downcasting to concrete plugin types
    fn as_any(&self) -> &dyn Any;

    /// Allow mutable downcasting to concrete plugin types
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Plugin that pushes on bodies during the force stage
///
/// `contribute` may run concurrently for different bodies and must not
/// depend on evaluation order.
pub trait ForceField: Send + Sync {
    /// Force and torque on one awake dynamic body
    fn contribute(&self, body: &BodyView<'_>, context: &PluginContext) -> ForceContribution;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Collider, RigidBody};
    use crate::math::Aabb;

    struct TestPlugin {
        name: String,
        initialized: bool,
    }

    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn initialize(&mut self, _context: &PluginContext) -> Result<()> {
            self.initialized = true;
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn sphere_body() -> SimBody {
        let mut sim = SimBody {
            entity: EntityId::new(1, 0),
            body: RigidBody::dynamic(2.0),
            implicit_static: false,
            position: Vec3::new(0.0, 3.0, 0.0),
            rotation: Quat::IDENTITY,
            collider: Some(Collider::sphere(0.5)),
            aabb: Aabb::default(),
            woken: false,
            ccd_advanced: false,
        };
        sim.refresh_aabb();
        sim
    }

    #[test]
    fn test_plugin_defaults() {
        let mut plugin = TestPlugin {
            name: "test".into(),
            initialized: false,
        };
        assert_eq!(plugin.api_version(), PLUGIN_API_VERSION);
        assert!(plugin.dependencies().is_empty());
        assert!(plugin.as_force_field().is_none());
        plugin
            .initialize(&PluginContext::new(1.0 / 60.0, 0, Vec3::ZERO, false))
            .unwrap();
        assert!(plugin.initialized);
        assert!(plugin.as_any().downcast_ref::<TestPlugin>().is_some());
    }

    #[test]
    fn test_context_accessors() {
        let ctx = PluginContext::new(0.5, 3, Vec3::NEG_Y, false);
        assert_eq!(ctx.timestep(), 0.5);
        assert_eq!(ctx.body_count(), 3);
        assert_eq!(ctx.gravity(), Vec3::NEG_Y);
        assert_eq!(ctx.thread_count(), 1);
    }

    #[test]
    fn test_body_view_cross_section() {
        let sim = sphere_body();
        let view = BodyView::new(&sim);
        assert_eq!(view.mass(), 2.0);
        assert_eq!(view.position(), Vec3::new(0.0, 3.0, 0.0));
        assert!((view.cross_section(Vec3::X) - 1.0).abs() < 1e-5);
        assert!((view.cross_section(Vec3::new(0.0, 0.0, -4.0)) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_contributions_add() {
        let a = ForceContribution::force(Vec3::X);
        let b = ForceContribution {
            force: Vec3::Y,
            torque: Vec3::Z,
        };
        let sum = a + b;
        assert_eq!(sum.force, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(sum.torque, Vec3::Z);
        assert!(ForceContribution::default().is_zero());
    }
}
