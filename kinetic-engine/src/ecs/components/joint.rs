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
//! Joint component
//!
//! A joint lives on the entity of its first body (A) and names the second
//! body by `EntityId`. `connected_body == EntityId::INVALID` pins body A to
//! a fixed point in the world given by `anchor_b` (world space).

use crate::ecs::{Component, EntityId};
use crate::math::{Mat3, Quat, Vec3};

/// Rotational motor of a hinge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointMotor {
    /// Target relative angular speed about the hinge axis (rad/s)
    pub target_speed: f32,
    /// Torque budget (N·m)
    pub max_torque: f32,
}

/// Rigid weld data; the reference pose is captured on the first solve
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixedJointData {
    /// qB·qA⁻¹ at capture time
    pub relative_rotation: Option<Quat>,
    /// World anchor B minus world anchor A at capture time
    pub relative_position: Option<Vec3>,
}

/// Hinge about a body-local axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeJointData {
    /// Hinge axis in body A's local frame
    pub axis_a: Vec3,
    /// Hinge axis in body B's local frame
    pub axis_b: Vec3,
    /// Optional (lower, upper) angle limits (rad)
    pub limits: Option<(f32, f32)>,
    /// Optional motor
    pub motor: Option<JointMotor>,
    /// qB·qA⁻¹ at capture time, the zero angle
    pub reference_rotation: Option<Quat>,
}

impl HingeJointData {
    /// Hinge with the same local axis on both bodies
    pub fn new(axis: Vec3) -> Self {
        let axis = axis.normalize_or_zero();
        HingeJointData {
            axis_a: axis,
            axis_b: axis,
            limits: None,
            motor: None,
            reference_rotation: None,
        }
    }
}

/// Rod between the anchors
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistanceJointData {
    /// Rest length; captured from the initial configuration when `None`
    pub rest_length: Option<f32>,
    /// Optional lower bound of the allowed band
    pub min_distance: Option<f32>,
    /// Optional upper bound of the allowed band
    pub max_distance: Option<f32>,
}

/// Damped spring between the anchors, applied as a force
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringJointData {
    /// Rest length (m)
    pub rest_length: f32,
    /// Stiffness (N/m)
    pub stiffness: f32,
    /// Damping (N·s/m)
    pub damping: f32,
}

/// Prismatic joint along a body-local axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderJointData {
    /// Slide axis in body A's local frame
    pub axis: Vec3,
    /// Optional (lower, upper) translation limits (m)
    pub limits: Option<(f32, f32)>,
    /// qB·qA⁻¹ at capture time
    pub relative_rotation: Option<Quat>,
}

/// Joint variants
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointKind {
    /// Weld
    Fixed(FixedJointData),
    /// Revolute
    Hinge(HingeJointData),
    /// Rod
    Distance(DistanceJointData),
    /// Spring
    Spring(SpringJointData),
    /// Prismatic
    Slider(SliderJointData),
}

/// Per-step solver state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointCache {
    /// Anchor A offset from A's center of mass (world)
    pub r_a: Vec3,
    /// Anchor B offset from B's center of mass (world)
    pub r_b: Vec3,
    /// World inverse inertia of A
    pub inv_inertia_a: Mat3,
    /// World inverse inertia of B
    pub inv_inertia_b: Mat3,
    /// Linear impulse accumulated during the current step
    pub accumulated_linear_impulse: Vec3,
    /// Angular impulse accumulated during the current step
    pub accumulated_angular_impulse: Vec3,
}

impl Default for JointCache {
    fn default() -> Self {
        JointCache {
            r_a: Vec3::ZERO,
            r_b: Vec3::ZERO,
            inv_inertia_a: Mat3::ZERO,
            inv_inertia_b: Mat3::ZERO,
            accumulated_linear_impulse: Vec3::ZERO,
            accumulated_angular_impulse: Vec3::ZERO,
        }
    }
}

/// Constraint between two bodies
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsJoint {
    /// Variant and per-variant data
    pub kind: JointKind,
    /// Second body, or `EntityId::INVALID` for the world
    pub connected_body: EntityId,
    /// Anchor in A's local frame
    pub anchor_a: Vec3,
    /// Anchor in B's local frame (world space when attached to the world)
    pub anchor_b: Vec3,
    /// Impulse per second above which the joint breaks
    pub break_force: f32,
    /// Angular impulse per second above which the joint breaks
    pub break_torque: f32,
    is_broken: bool,
    /// Disabled joints are skipped
    pub is_enabled: bool,
    /// Let the two bodies collide with each other
    pub enable_collision: bool,
    /// Solver scratch
    pub cache: JointCache,
}

impl PhysicsJoint {
    /// Create a joint of any kind
    pub fn new(kind: JointKind, connected_body: EntityId, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        PhysicsJoint {
            kind,
            connected_body,
            anchor_a,
            anchor_b,
            break_force: f32::INFINITY,
            break_torque: f32::INFINITY,
            is_broken: false,
            is_enabled: true,
            enable_collision: false,
            cache: JointCache::default(),
        }
    }

    /// Weld two bodies together at the given anchors
    pub fn fixed(connected_body: EntityId, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        Self::new(JointKind::Fixed(FixedJointData::default()), connected_body, anchor_a, anchor_b)
    }

    /// Hinge about `axis` (same local axis on both bodies)
    pub fn hinge(connected_body: EntityId, anchor_a: Vec3, anchor_b: Vec3, axis: Vec3) -> Self {
        Self::new(JointKind::Hinge(HingeJointData::new(axis)), connected_body, anchor_a, anchor_b)
    }

    /// Rod whose rest length is captured on the first solve
    pub fn distance(connected_body: EntityId, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        Self::new(
            JointKind::Distance(DistanceJointData::default()),
            connected_body,
            anchor_a,
            anchor_b,
        )
    }

    /// Damped spring
    pub fn spring(
        connected_body: EntityId,
        anchor_a: Vec3,
        anchor_b: Vec3,
        rest_length: f32,
        stiffness: f32,
        damping: f32,
    ) -> Self {
        Self::new(
            JointKind::Spring(SpringJointData {
                rest_length,
                stiffness,
                damping,
            }),
            connected_body,
            anchor_a,
            anchor_b,
        )
    }

    /// Slider along `axis` in A's local frame
    pub fn slider(connected_body: EntityId, anchor_a: Vec3, anchor_b: Vec3, axis: Vec3) -> Self {
        Self::new(
            JointKind::Slider(SliderJointData {
                axis: axis.normalize_or_zero(),
                limits: None,
                relative_rotation: None,
            }),
            connected_body,
            anchor_a,
            anchor_b,
        )
    }

    /// Builder: break thresholds
    pub fn with_break_limits(mut self, force: f32, torque: f32) -> Self {
        self.break_force = force;
        self.break_torque = torque;
        self
    }

    /// Builder: allow the joined bodies to collide
    pub fn with_collision(mut self, enabled: bool) -> Self {
        self.enable_collision = enabled;
        self
    }

    /// Latched breakage flag
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    /// Break the joint permanently
    pub fn mark_broken(&mut self) {
        self.is_broken = true;
    }

    /// True when the solver should process this joint
    pub fn is_active(&self) -> bool {
        self.is_enabled && !self.is_broken
    }

    /// True when the second body is the world
    pub fn is_world_anchored(&self) -> bool {
        !self.connected_body.is_some()
    }
}

impl Component for PhysicsJoint {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakage_is_latched() {
        let mut joint = PhysicsJoint::fixed(EntityId::new(1, 0), Vec3::ZERO, Vec3::ZERO);
        assert!(joint.is_active());
        joint.mark_broken();
        joint.is_enabled = true;
        assert!(!joint.is_active());
        assert!(joint.is_broken());
    }

    #[test]
    fn test_world_anchor() {
        let joint = PhysicsJoint::distance(EntityId::INVALID, Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0));
        assert!(joint.is_world_anchored());
    }
}
