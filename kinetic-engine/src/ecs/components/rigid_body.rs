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
//! Rigid body component

use crate::ecs::Component;
use crate::math::{Mat3, Quat, Vec3};
use crate::physics::shapes::ColliderShape;
use serde::{Deserialize, Serialize};

/// Simulation role of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves; infinite mass
    Static,
    /// Moved by the application; velocity inferred from its transform
    Kinematic,
    /// Fully simulated
    #[default]
    Dynamic,
}

/// Mass properties, velocity state and simulation flags of a body
///
/// Fields tied to invariants (mass, inertia, sleeping, accumulated forces)
/// are private; `inverse_mass()` is zero exactly when the body is not
/// dynamic, and a sleeping body always reports zero velocity and force.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    body_type: BodyType,
    mass: f32,
    inverse_mass: f32,
    inertia_tensor: Mat3,
    inverse_inertia_tensor: Mat3,
    explicit_inertia: bool,
    center_of_mass: Vec3,

    /// Linear velocity (m/s, world)
    pub linear_velocity: Vec3,
    /// Angular velocity (rad/s, world)
    pub angular_velocity: Vec3,
    force: Vec3,
    torque: Vec3,

    previous_position: Vec3,
    previous_rotation: Quat,
    has_previous_pose: bool,

    /// Fraction of linear velocity removed per second, in [0, 1]
    pub linear_damping: f32,
    /// Fraction of angular velocity removed per second, in [0, 1]
    pub angular_damping: f32,
    /// Freeze translation along world X/Y/Z
    pub lock_position: [bool; 3],
    /// Freeze rotation about world X/Y/Z
    pub lock_rotation: [bool; 3],
    /// Soft linear speed cap (m/s)
    pub max_linear_speed: f32,
    /// Soft angular speed cap (rad/s)
    pub max_angular_speed: f32,

    /// Apply world gravity
    pub use_gravity: bool,
    /// Multiplier on world gravity
    pub gravity_scale: f32,

    is_sleeping: bool,
    sleep_timer: f32,
    /// Kinetic energy under which the body may fall asleep
    pub sleep_threshold: f32,

    /// Always run continuous collision detection for this body
    pub use_ccd: bool,
}

impl RigidBody {
    fn with_type(body_type: BodyType, mass: f32) -> Self {
        let mut body = RigidBody {
            body_type,
            mass: 1.0,
            inverse_mass: 0.0,
            inertia_tensor: Mat3::IDENTITY,
            inverse_inertia_tensor: Mat3::ZERO,
            explicit_inertia: false,
            center_of_mass: Vec3::ZERO,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            previous_position: Vec3::ZERO,
            previous_rotation: Quat::IDENTITY,
            has_previous_pose: false,
            linear_damping: 0.0,
            angular_damping: 0.05,
            lock_position: [false; 3],
            lock_rotation: [false; 3],
            max_linear_speed: f32::INFINITY,
            max_angular_speed: f32::INFINITY,
            use_gravity: true,
            gravity_scale: 1.0,
            is_sleeping: false,
            sleep_timer: 0.0,
            sleep_threshold: 0.01,
            use_ccd: false,
        };
        body.set_mass(mass);
        body
    }

    /// Create a dynamic body with the given mass (kg)
    pub fn dynamic(mass: f32) -> Self {
        Self::with_type(BodyType::Dynamic, mass)
    }

    /// Create a kinematic body
    pub fn kinematic() -> Self {
        Self::with_type(BodyType::Kinematic, 1.0)
    }

    /// Create a static body
    pub fn new_static() -> Self {
        Self::with_type(BodyType::Static, 1.0)
    }

    /// Create a dynamic body whose mass follows the shape volume and density
    pub fn dynamic_from_density(shape: &ColliderShape, density: f32) -> Self {
        Self::dynamic((shape.volume() * density).max(f32::EPSILON))
    }

    /// Builder: initial linear velocity
    pub fn with_linear_velocity(mut self, v: Vec3) -> Self {
        self.linear_velocity = v;
        self
    }

    /// Builder: continuous collision detection
    pub fn with_ccd(mut self, enabled: bool) -> Self {
        self.use_ccd = enabled;
        self
    }

    /// Builder: damping
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear.clamp(0.0, 1.0);
        self.angular_damping = angular.clamp(0.0, 1.0);
        self
    }

    /// Simulation role
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Change the simulation role, keeping mass invariants
    pub fn set_body_type(&mut self, body_type: BodyType) {
        self.body_type = body_type;
        if body_type == BodyType::Static {
            self.linear_velocity = Vec3::ZERO;
            self.angular_velocity = Vec3::ZERO;
        }
        self.clear_forces();
        self.refresh_inverse();
    }

    /// True for dynamic bodies
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// True for kinematic bodies
    pub fn is_kinematic(&self) -> bool {
        self.body_type == BodyType::Kinematic
    }

    /// True for static bodies
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    /// Mass (kg)
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Set the mass; non-positive or non-finite values are ignored
    pub fn set_mass(&mut self, mass: f32) {
        if mass.is_finite() && mass > 0.0 {
            if !self.explicit_inertia && self.mass > 0.0 {
                self.inertia_tensor = self.inertia_tensor * (mass / self.mass);
            }
            self.mass = mass;
        }
        self.refresh_inverse();
    }

    /// Inverse mass; zero unless dynamic
    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Body-local inertia tensor
    pub fn inertia_tensor(&self) -> Mat3 {
        self.inertia_tensor
    }

    /// Body-local inverse inertia tensor; zero unless dynamic
    pub fn inverse_inertia_tensor(&self) -> Mat3 {
        self.inverse_inertia_tensor
    }

    /// Set the inertia tensor explicitly; shape-derived inertia is no longer applied
    pub fn set_inertia_tensor(&mut self, inertia: Mat3) {
        self.inertia_tensor = inertia;
        self.explicit_inertia = true;
        self.refresh_inverse();
    }

    /// True when the inertia was set explicitly
    pub fn has_explicit_inertia(&self) -> bool {
        self.explicit_inertia
    }

    /// Derive inertia from a shape unless it was set explicitly
    pub fn update_inertia_from_shape(&mut self, shape: &ColliderShape) {
        if self.explicit_inertia {
            return;
        }
        self.inertia_tensor = shape.inertia_tensor(self.mass);
        self.refresh_inverse();
    }

    /// Center of mass, body-local
    pub fn center_of_mass(&self) -> Vec3 {
        self.center_of_mass
    }

    /// Set the center of mass, body-local
    pub fn set_center_of_mass(&mut self, com: Vec3) {
        self.center_of_mass = com;
    }

    fn refresh_inverse(&mut self) {
        if self.body_type == BodyType::Dynamic {
            self.inverse_mass = 1.0 / self.mass;
            let det = self.inertia_tensor.determinant();
            self.inverse_inertia_tensor = if det.abs() > f32::EPSILON {
                self.inertia_tensor.inverse()
            } else {
                Mat3::ZERO
            };
        } else {
            self.inverse_mass = 0.0;
            self.inverse_inertia_tensor = Mat3::ZERO;
        }
    }

    /// Accumulated force (N) for the next step
    pub fn force(&self) -> Vec3 {
        self.force
    }

    /// Accumulated torque (N·m) for the next step
    pub fn torque(&self) -> Vec3 {
        self.torque
    }

    /// Accumulate a force through the center of mass; wakes the body
    pub fn add_force(&mut self, force: Vec3) {
        if !self.is_dynamic() || force == Vec3::ZERO {
            return;
        }
        self.force += force;
        self.wake_up();
    }

    /// Accumulate a torque; wakes the body
    pub fn add_torque(&mut self, torque: Vec3) {
        if !self.is_dynamic() || torque == Vec3::ZERO {
            return;
        }
        self.torque += torque;
        self.wake_up();
    }

    /// Accumulate a force applied at `point` given the world center of mass
    pub fn add_force_at_point(&mut self, force: Vec3, point: Vec3, world_com: Vec3) {
        self.add_force(force);
        self.add_torque((point - world_com).cross(force));
    }

    /// Apply an instantaneous linear impulse through the center of mass
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.linear_velocity += impulse * self.inverse_mass;
        self.wake_up();
    }

    /// Reset accumulated force and torque
    pub fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    pub(crate) fn set_accumulators(&mut self, force: Vec3, torque: Vec3) {
        self.force = force;
        self.torque = torque;
    }

    /// True while asleep
    pub fn is_sleeping(&self) -> bool {
        self.is_sleeping
    }

    /// Seconds spent below the sleep threshold
    pub fn sleep_timer(&self) -> f32 {
        self.sleep_timer
    }

    /// Put the body to sleep, zeroing motion and accumulated forces
    pub fn sleep(&mut self) {
        self.is_sleeping = true;
        self.linear_velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.clear_forces();
    }

    /// Wake the body and reset its sleep timer
    pub fn wake_up(&mut self) {
        self.is_sleeping = false;
        self.sleep_timer = 0.0;
    }

    pub(crate) fn set_sleep_state(&mut self, sleeping: bool, timer: f32) {
        self.is_sleeping = sleeping;
        self.sleep_timer = timer;
        if sleeping {
            self.sleep();
        }
    }

    /// Pose before the most recent fixed step
    pub fn previous_position(&self) -> Vec3 {
        self.previous_position
    }

    /// Orientation before the most recent fixed step
    pub fn previous_rotation(&self) -> Quat {
        self.previous_rotation
    }

    /// True once a previous pose has been captured
    pub fn has_previous_pose(&self) -> bool {
        self.has_previous_pose
    }

    /// Record the pose used for interpolation and kinematic velocity inference
    pub fn set_previous_pose(&mut self, position: Vec3, rotation: Quat) {
        self.previous_position = position;
        self.previous_rotation = rotation;
        self.has_previous_pose = true;
    }

    /// Kinetic energy ½m|v|² + ½ωᵀIω using the world-space inertia
    pub fn kinetic_energy(&self, world_inertia: Mat3) -> f32 {
        0.5 * self.mass * self.linear_velocity.length_squared()
            + 0.5 * self.angular_velocity.dot(world_inertia * self.angular_velocity)
    }
}

impl Default for RigidBody {
    fn default() -> Self {
        Self::dynamic(1.0)
    }
}

impl Component for RigidBody {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_mass_invariant() {
        assert_eq!(RigidBody::dynamic(2.0).inverse_mass(), 0.5);
        assert_eq!(RigidBody::kinematic().inverse_mass(), 0.0);
        assert_eq!(RigidBody::new_static().inverse_mass(), 0.0);

        let mut body = RigidBody::dynamic(4.0);
        body.set_body_type(BodyType::Kinematic);
        assert_eq!(body.inverse_mass(), 0.0);
        body.set_body_type(BodyType::Dynamic);
        assert_eq!(body.inverse_mass(), 0.25);
    }

    #[test]
    fn test_invalid_mass_ignored() {
        let mut body = RigidBody::dynamic(2.0);
        body.set_mass(-1.0);
        body.set_mass(f32::NAN);
        assert_eq!(body.mass(), 2.0);
    }

    #[test]
    fn test_inertia_from_shape() {
        let mut body = RigidBody::dynamic(5.0);
        body.update_inertia_from_shape(&ColliderShape::Sphere { radius: 1.0 });
        assert!((body.inertia_tensor().x_axis.x - 2.0).abs() < 1e-6);
        assert!((body.inverse_inertia_tensor().x_axis.x - 0.5).abs() < 1e-6);

        body.set_inertia_tensor(Mat3::IDENTITY);
        body.update_inertia_from_shape(&ColliderShape::Sphere { radius: 3.0 });
        assert_eq!(body.inertia_tensor(), Mat3::IDENTITY);
    }

    #[test]
    fn test_sleep_zeroes_state() {
        let mut body = RigidBody::dynamic(1.0).with_linear_velocity(Vec3::X);
        body.add_force(Vec3::Y);
        body.sleep();
        assert!(body.is_sleeping());
        assert_eq!(body.linear_velocity, Vec3::ZERO);
        assert_eq!(body.force(), Vec3::ZERO);

        body.add_force(Vec3::Y);
        assert!(!body.is_sleeping());
        assert_eq!(body.sleep_timer(), 0.0);
    }

    #[test]
    fn test_forces_ignored_on_static() {
        let mut body = RigidBody::new_static();
        body.add_force(Vec3::X);
        body.apply_impulse(Vec3::X);
        assert_eq!(body.force(), Vec3::ZERO);
        assert_eq!(body.linear_velocity, Vec3::ZERO);
    }
}
