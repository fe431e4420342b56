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
//! Collider component

use crate::ecs::components::PhysicsMaterial;
use crate::ecs::Component;
use crate::math::{Aabb, Quat, Vec3};
use crate::physics::shapes::ColliderShape;
use std::sync::Arc;

/// Collision geometry attached to an entity
///
/// `center` and `rotation` offset the shape from the entity's transform.
/// The cached world AABB is refreshed by the physics pipeline whenever
/// `aabb_dirty` is set or the body moved.
#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    shape: ColliderShape,
    /// Local offset of the shape
    pub center: Vec3,
    /// Local rotation of the shape
    pub rotation: Quat,
    world_aabb: Aabb,
    aabb_dirty: bool,
    /// Triggers report overlaps but produce no contact response
    pub is_trigger: bool,
    layer: u8,
    /// Bitmask of layers this collider interacts with
    pub collision_mask: u32,
    /// Shared surface material
    pub material: Arc<PhysicsMaterial>,
}

impl Collider {
    /// Create a collider for an arbitrary shape
    pub fn new(shape: ColliderShape) -> Self {
        Collider {
            shape,
            center: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            world_aabb: Aabb::default(),
            aabb_dirty: true,
            is_trigger: false,
            layer: 0,
            collision_mask: u32::MAX,
            material: Arc::new(PhysicsMaterial::default()),
        }
    }

    /// Sphere collider
    pub fn sphere(radius: f32) -> Self {
        Self::new(ColliderShape::Sphere { radius })
    }

    /// Box collider from half extents
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ColliderShape::Box { half_extents })
    }

    /// Capsule collider; `height` is the inner segment length along local Y
    pub fn capsule(radius: f32, height: f32) -> Self {
        Self::new(ColliderShape::Capsule { radius, height })
    }

    /// Convex hull collider
    pub fn convex_hull(points: Vec<Vec3>) -> Self {
        Self::new(ColliderShape::ConvexHull { points: points.into() })
    }

    /// Mesh collider; collides as the hull of its vertices
    pub fn mesh(vertices: Vec<Vec3>) -> Self {
        Self::new(ColliderShape::Mesh { vertices: vertices.into() })
    }

    /// Builder: material
    pub fn with_material(mut self, material: Arc<PhysicsMaterial>) -> Self {
        self.material = material;
        self
    }

    /// Builder: local offset
    pub fn with_center(mut self, center: Vec3) -> Self {
        self.center = center;
        self.aabb_dirty = true;
        self
    }

    /// Builder: local rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation.normalize();
        self.aabb_dirty = true;
        self
    }

    /// Builder: mark as trigger
    pub fn as_trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// Builder: layer and mask
    pub fn with_layer(mut self, layer: u8, mask: u32) -> Self {
        self.set_layer(layer);
        self.collision_mask = mask;
        self
    }

    /// Shape
    pub fn shape(&self) -> &ColliderShape {
        &self.shape
    }

    /// Replace the shape
    pub fn set_shape(&mut self, shape: ColliderShape) {
        self.shape = shape;
        self.aabb_dirty = true;
    }

    /// Collision layer (0..31)
    pub fn layer(&self) -> u8 {
        self.layer
    }

    /// Set the collision layer; values above 31 are clamped
    pub fn set_layer(&mut self, layer: u8) {
        self.layer = layer.min(31);
    }

    /// Layer filtering in both directions
    pub fn can_collide_with(&self, other: &Collider) -> bool {
        (self.collision_mask & (1 << other.layer)) != 0 && (other.collision_mask & (1 << self.layer)) != 0
    }

    /// Cached world bounds
    pub fn world_aabb(&self) -> Aabb {
        self.world_aabb
    }

    /// True when the cached bounds need recomputation
    pub fn is_aabb_dirty(&self) -> bool {
        self.aabb_dirty
    }

    /// Flag the cached bounds as stale
    pub fn mark_dirty(&mut self) {
        self.aabb_dirty = true;
    }

    /// World pose of the shape for a body pose
    pub fn shape_pose(&self, body_position: Vec3, body_rotation: Quat) -> (Vec3, Quat) {
        (body_position + body_rotation * self.center, body_rotation * self.rotation)
    }

    /// Recompute the cached world bounds for a body pose
    pub fn update_world_aabb(&mut self, body_position: Vec3, body_rotation: Quat) -> Aabb {
        let (position, rotation) = self.shape_pose(body_position, body_rotation);
        self.world_aabb = self.shape.world_aabb(position, rotation);
        self.aabb_dirty = false;
        self.world_aabb
    }

    pub(crate) fn store_world_aabb(&mut self, aabb: Aabb) {
        self.world_aabb = aabb;
        self.aabb_dirty = false;
    }
}

impl Default for Collider {
    fn default() -> Self {
        Self::sphere(0.5)
    }
}

impl Component for Collider {}
