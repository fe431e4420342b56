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
//! Simulation scene
//!
//! Each `step` copies the participating components out of the registry into
//! a flat, index-sorted `PhysicsScene`, runs the fixed steps on it and writes
//! the results back. Only root entities (no parent) that are active take
//! part. A collider without a rigid body behaves as a static body.

use crate::ecs::components::{Collider, PhysicsJoint, RigidBody, Transform};
use crate::ecs::{Component, ComponentRegistry, EntityId, World};
use crate::math::{world_inertia, Aabb, Mat3, Quat, Vec3};
use std::collections::HashMap;
use tracing::warn;

/// Gathered state of one body
#[derive(Debug, Clone)]
pub struct SimBody {
    /// Owning entity
    pub entity: EntityId,
    /// Working copy of the rigid body
    pub body: RigidBody,
    /// True when the entity had no `RigidBody` component
    pub implicit_static: bool,
    /// Body origin (transform position)
    pub position: Vec3,
    /// Body orientation
    pub rotation: Quat,
    /// Collision geometry
    pub collider: Option<Collider>,
    /// Current world bounds of the collider
    pub aabb: Aabb,
    /// Set when the solver or a contact woke the body this step
    pub woken: bool,
    /// Position already advanced by continuous collision this step
    pub ccd_advanced: bool,
}

impl SimBody {
    /// World-space center of mass
    pub fn world_com(&self) -> Vec3 {
        self.position + self.rotation * self.body.center_of_mass()
    }

    /// Inverse mass (zero unless dynamic)
    pub fn inv_mass(&self) -> f32 {
        self.body.inverse_mass()
    }

    /// World-space inverse inertia tensor
    pub fn inv_inertia_world(&self) -> Mat3 {
        world_inertia(self.rotation, self.body.inverse_inertia_tensor())
    }

    /// World-space inertia tensor
    pub fn inertia_world(&self) -> Mat3 {
        world_inertia(self.rotation, self.body.inertia_tensor())
    }

    /// Velocity of a world point rigidly attached to the body
    pub fn velocity_at(&self, point: Vec3) -> Vec3 {
        self.body.linear_velocity + self.body.angular_velocity.cross(point - self.world_com())
    }

    /// Dynamic and awake
    pub fn is_simulated(&self) -> bool {
        self.body.is_dynamic() && !self.body.is_sleeping()
    }

    /// World pose of the collider shape
    pub fn shape_pose(&self) -> Option<(Vec3, Quat)> {
        self.collider
            .as_ref()
            .map(|c| c.shape_pose(self.position, self.rotation))
    }

    /// Recompute the cached bounds from the current pose
    pub fn refresh_aabb(&mut self) {
        if let Some(collider) = self.collider.as_mut() {
            self.aabb = collider.update_world_aabb(self.position, self.rotation);
        } else {
            self.aabb = Aabb::from_center_half_extents(self.position, Vec3::ZERO);
        }
    }

    /// Apply an impulse at a world point
    pub fn apply_impulse_at(&mut self, impulse: Vec3, point: Vec3) {
        if !self.body.is_dynamic() {
            return;
        }
        let r = point - self.world_com();
        self.body.linear_velocity += impulse * self.inv_mass();
        self.body.angular_velocity += self.inv_inertia_world() * r.cross(impulse);
    }

    /// Kinetic energy using the world inertia
    pub fn kinetic_energy(&self) -> f32 {
        self.body.kinetic_energy(self.inertia_world())
    }
}

/// Joint gathered with its owning entity
#[derive(Debug, Clone)]
pub struct SimJoint {
    /// Entity the joint component lives on (body A)
    pub owner: EntityId,
    /// Working copy
    pub joint: PhysicsJoint,
}

/// Flat simulation scene sorted by entity index
#[derive(Debug, Default)]
pub struct PhysicsScene {
    /// Bodies sorted by entity
    pub bodies: Vec<SimBody>,
    /// Joints sorted by owner
    pub joints: Vec<SimJoint>,
    index: HashMap<EntityId, usize>,
}

impl PhysicsScene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body; the caller keeps entity order sorted
    pub fn push_body(&mut self, body: SimBody) {
        self.index.insert(body.entity, self.bodies.len());
        self.bodies.push(body);
    }

    /// Sort bodies and joints and rebuild the lookup table
    pub fn finalize(&mut self) {
        self.bodies.sort_by_key(|b| b.entity);
        self.joints.sort_by_key(|j| j.owner);
        self.index = self
            .bodies
            .iter()
            .enumerate()
            .map(|(i, b)| (b.entity, i))
            .collect();
    }

    /// Index of an entity's body
    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Body of an entity
    pub fn body(&self, id: EntityId) -> Option<&SimBody> {
        self.index_of(id).map(|i| &self.bodies[i])
    }

    /// Mutable body of an entity
    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut SimBody> {
        self.index_of(id).map(move |i| &mut self.bodies[i])
    }

    /// Two distinct bodies mutably
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut SimBody, &mut SimBody) {
        debug_assert_ne!(a, b);
        if a < b {
            let (lo, hi) = self.bodies.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.bodies.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }

    /// Copy participating components out of the world
    pub fn gather(world: &World) -> PhysicsScene {
        let registry = world.components();
        let entities = world.entities();
        let mut scene = PhysicsScene::new();

        let mut roots: Vec<(EntityId, Vec3, Quat)> = Vec::new();
        registry.for_each(|id, t: &Transform| {
            if t.is_root() && entities.is_active(id) {
                roots.push((id, t.position(), t.rotation()));
            }
        });
        roots.sort_by_key(|r| r.0);

        for (id, position, rotation) in roots {
            let collider = registry.get::<Collider>(id).ok();
            let (mut body, implicit_static) = match registry.get::<RigidBody>(id) {
                Ok(body) => (body, false),
                Err(_) if collider.is_some() => (RigidBody::new_static(), true),
                Err(_) => continue,
            };
            if let Some(c) = &collider {
                body.update_inertia_from_shape(c.shape());
            }
            let mut sim = SimBody {
                entity: id,
                body,
                implicit_static,
                position,
                rotation,
                collider,
                aabb: Aabb::default(),
                woken: false,
                ccd_advanced: false,
            };
            sim.refresh_aabb();
            scene.push_body(sim);
        }

        registry.for_each(|owner, joint: &PhysicsJoint| {
            scene.joints.push(SimJoint {
                owner,
                joint: joint.clone(),
            });
        });
        scene.finalize();
        scene
    }

    /// Write simulated state back into the world
    ///
    /// Static bodies never have their transform touched.
    pub fn scatter(&self, world: &World) {
        let registry = world.components();
        for sim in &self.bodies {
            if sim.implicit_static {
                if let Some(c) = &sim.collider {
                    let aabb = c.world_aabb();
                    write_back(registry, sim.entity, |col: &mut Collider| col.store_world_aabb(aabb));
                }
                continue;
            }
            write_back(registry, sim.entity, |rb: &mut RigidBody| *rb = sim.body.clone());
            if sim.body.is_dynamic() {
                write_back(registry, sim.entity, |t: &mut Transform| {
                    t.set_pose(sim.position, sim.rotation)
                });
            }
            if let Some(c) = &sim.collider {
                let aabb = c.world_aabb();
                write_back(registry, sim.entity, |col: &mut Collider| col.store_world_aabb(aabb));
            }
        }
        for sj in &self.joints {
            write_back(registry, sj.owner, |j: &mut PhysicsJoint| *j = sj.joint.clone());
        }
    }
}

/// Mutate `T` on `id`, logging when the entity lost it during the step
pub(crate) fn write_back<T: Component>(registry: &ComponentRegistry, id: EntityId, f: impl FnOnce(&mut T)) -> bool {
    match registry.with_component_mut(id, f) {
        Ok(()) => true,
        Err(err) => {
            warn!(entity = %id, error = %err, "physics write-back skipped");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scatter_skips_bodies_despawned_mid_step() {
        let world = World::new();
        let gone = world.spawn();
        let kept = world.spawn();
        for id in [gone, kept] {
            world.add_component(id, Transform::default()).unwrap();
            world
                .add_component(id, RigidBody::dynamic(1.0).with_linear_velocity(Vec3::X))
                .unwrap();
        }
        let mut scene = PhysicsScene::gather(&world);
        for sim in scene.bodies.iter_mut() {
            sim.position = Vec3::new(0.0, 2.0, 0.0);
        }
        assert!(world.destroy_entity(gone));

        scene.scatter(&world);
        let t = world.get_component::<Transform>(kept).unwrap();
        assert_eq!(t.position(), Vec3::new(0.0, 2.0, 0.0));
        assert!(!write_back(world.components(), gone, |t: &mut Transform| {
            t.set_pose(Vec3::ZERO, Quat::IDENTITY)
        }));
    }

    #[test]
    fn test_gather_skips_children_and_sorts() {
        let world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        let child = world.spawn();
        world.add_component(b, Transform::from_position(Vec3::Y)).unwrap();
        world.add_component(b, RigidBody::dynamic(1.0)).unwrap();
        world.add_component(a, Transform::default()).unwrap();
        world.add_component(a, Collider::sphere(1.0)).unwrap();
        world
            .add_component(child, Transform::default().with_parent(a))
            .unwrap();
        world.add_component(child, RigidBody::dynamic(1.0)).unwrap();

        let scene = PhysicsScene::gather(&world);
        assert_eq!(scene.bodies.len(), 2);
        assert_eq!(scene.bodies[0].entity, a);
        assert!(scene.bodies[0].implicit_static);
        assert_eq!(scene.bodies[0].inv_mass(), 0.0);
        assert_eq!(scene.index_of(b), Some(1));
    }

    #[test]
    fn test_velocity_at_point() {
        let mut body = RigidBody::dynamic(1.0);
        body.angular_velocity = Vec3::new(0.0, 0.0, 1.0);
        let sim = SimBody {
            entity: EntityId::new(0, 0),
            body,
            implicit_static: false,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            collider: None,
            aabb: Aabb::default(),
            woken: false,
            ccd_advanced: false,
        };
        assert!((sim.velocity_at(Vec3::X) - Vec3::Y).length() < 1e-6);
    }
}
