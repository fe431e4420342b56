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
//! Transform component

use crate::ecs::{Component, EntityId};
use crate::math::{quat_from_euler, quat_to_euler, Mat4, Quat, Vec3};

/// Position, rotation and scale relative to an optional parent
///
/// Setters keep the rotation normalized and mark the cached world matrix
/// dirty; the transform system recomputes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    parent: Option<EntityId>,
    world_matrix: Mat4,
    dirty: bool,
}

impl Transform {
    /// Create a new transform
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let rotation = rotation.normalize();
        Transform {
            position,
            rotation,
            scale,
            parent: None,
            world_matrix: Mat4::from_scale_rotation_translation(scale, rotation, position),
            dirty: true,
        }
    }

    /// Transform at `position` with identity rotation and unit scale
    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY, Vec3::ONE)
    }

    /// Transform at `position` with `rotation` and unit scale
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self::new(position, rotation, Vec3::ONE)
    }

    /// Builder: attach to a parent
    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Set the local position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    /// Move by `delta`
    pub fn translate(&mut self, delta: Vec3) {
        self.set_position(self.position + delta);
    }

    /// Local rotation (unit quaternion)
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Set the local rotation; the value is normalized
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.dirty = true;
    }

    /// Apply `delta` on top of the current rotation (world-frame)
    pub fn rotate(&mut self, delta: Quat) {
        self.set_rotation(delta * self.rotation);
    }

    /// Rotation as XYZ Euler angles (radians)
    pub fn euler_angles(&self) -> Vec3 {
        quat_to_euler(self.rotation)
    }

    /// Set the rotation from XYZ Euler angles (radians)
    pub fn set_euler_angles(&mut self, euler: Vec3) {
        self.set_rotation(quat_from_euler(euler));
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Set the local scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty = true;
    }

    /// Set position and rotation together
    pub fn set_pose(&mut self, position: Vec3, rotation: Quat) {
        self.position = position;
        self.rotation = rotation.normalize();
        self.dirty = true;
    }

    /// Parent entity, if any
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Attach to or detach from a parent
    pub fn set_parent(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
        self.dirty = true;
    }

    /// True for entities without a parent
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Local TRS matrix
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Cached world matrix; current once the transform system has run
    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    /// True when a setter ran since the last world-matrix refresh
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn store_world_matrix(&mut self, matrix: Mat4) {
        self.world_matrix = matrix;
        self.dirty = false;
    }

    /// Local forward direction (-Z)
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Local right direction (+X)
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Local up direction (+Y)
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// True when position and rotation are bit-identical
    pub fn same_pose(&self, position: Vec3, rotation: Quat) -> bool {
        self.position == position && self.rotation == rotation
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

impl Component for Transform {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_is_normalized() {
        let mut t = Transform::default();
        t.set_rotation(Quat::from_xyzw(0.0, 2.0, 0.0, 2.0));
        assert!((t.rotation().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_setters_mark_dirty() {
        let mut t = Transform::default();
        t.store_world_matrix(t.local_matrix());
        assert!(!t.is_dirty());
        t.translate(Vec3::X);
        assert!(t.is_dirty());
        assert_eq!(t.position(), Vec3::X);
    }

    #[test]
    fn test_local_matrix() {
        let t = Transform::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, Vec3::splat(2.0));
        let p = t.local_matrix().transform_point3(Vec3::ONE);
        assert_eq!(p, Vec3::new(3.0, 4.0, 5.0));
    }
}
