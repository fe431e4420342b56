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
//! Semi-implicit Euler integration
//!
//! Velocities are advanced first from the accumulated forces, then damped,
//! axis-locked and speed-capped. Positions are advanced with the new
//! velocities about the center of mass.

use crate::ecs::components::RigidBody;
use crate::math::{integrate_rotation, sanitize, Vec3};
use crate::physics::body::PhysicsScene;
use tracing::warn;

/// Zero the locked components of both velocities
pub fn apply_locks(body: &mut RigidBody) {
    for axis in 0..3 {
        if body.lock_position[axis] {
            body.linear_velocity[axis] = 0.0;
        }
        if body.lock_rotation[axis] {
            body.angular_velocity[axis] = 0.0;
        }
    }
}

/// Rescale `v` to `limit` when longer; true if it was clamped
pub(crate) fn cap_length(v: &mut Vec3, limit: f32) -> bool {
    if !limit.is_finite() {
        return false;
    }
    let speed_sq = v.length_squared();
    if speed_sq > limit * limit {
        *v *= limit / speed_sq.sqrt();
        return true;
    }
    false
}

/// Renormalize velocities above the body's own speed limits
pub fn apply_speed_caps(body: &mut RigidBody) {
    let (linear, angular) = (body.max_linear_speed, body.max_angular_speed);
    cap_length(&mut body.linear_velocity, linear);
    cap_length(&mut body.angular_velocity, angular);
}

/// Remember the start-of-step pose of every dynamic body
pub fn snapshot_previous_pose(scene: &mut PhysicsScene) {
    for sim in scene.bodies.iter_mut().filter(|s| s.body.is_dynamic()) {
        sim.body.set_previous_pose(sim.position, sim.rotation);
    }
}

/// Velocity half of the step: forces, gravity, damping, locks, caps
pub fn integrate_velocities(scene: &mut PhysicsScene, gravity: Vec3, dt: f32) {
    for sim in scene.bodies.iter_mut() {
        if !sim.is_simulated() {
            continue;
        }
        let inv_inertia = sim.inv_inertia_world();
        let body = &mut sim.body;

        let mut accel = body.force() * body.inverse_mass();
        if body.use_gravity {
            accel += gravity * body.gravity_scale;
        }
        body.linear_velocity += accel * dt;
        body.angular_velocity += inv_inertia * body.torque() * dt;

        let linear_keep = (1.0 - body.linear_damping.clamp(0.0, 1.0)).powf(dt);
        let angular_keep = (1.0 - body.angular_damping.clamp(0.0, 1.0)).powf(dt);
        body.linear_velocity *= linear_keep;
        body.angular_velocity *= angular_keep;

        apply_locks(body);
        apply_speed_caps(body);

        let bad_linear = sanitize(&mut body.linear_velocity);
        let bad_angular = sanitize(&mut body.angular_velocity);
        if bad_linear || bad_angular {
            warn!(entity = %sim.entity, "non-finite velocity cleared");
        }
    }
}

/// Position half of the step
///
/// Bodies already moved by continuous collision this step are skipped.
pub fn integrate_positions(scene: &mut PhysicsScene, dt: f32) {
    for sim in scene.bodies.iter_mut() {
        if !sim.is_simulated() || sim.ccd_advanced {
            continue;
        }
        let com_local = sim.body.center_of_mass();
        let com = sim.position + sim.rotation * com_local + sim.body.linear_velocity * dt;
        let rotation = integrate_rotation(sim.rotation, sim.body.angular_velocity, dt);
        let position = com - rotation * com_local;

        if position.is_finite() && rotation.is_finite() {
            sim.position = position;
            sim.rotation = rotation;
        } else {
            warn!(entity = %sim.entity, "non-finite pose rejected; body stopped");
            sim.body.linear_velocity = Vec3::ZERO;
            sim.body.angular_velocity = Vec3::ZERO;
        }
        sim.refresh_aabb();
    }
}

/// Clear force and torque accumulators after a fixed step
pub fn clear_forces(scene: &mut PhysicsScene) {
    for sim in scene.bodies.iter_mut() {
        sim.body.clear_forces();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Collider, RigidBody};
    use crate::ecs::EntityId;
    use crate::math::{Aabb, Quat};
    use crate::physics::body::SimBody;

    fn scene_with(body: RigidBody) -> PhysicsScene {
        let mut scene = PhysicsScene::new();
        let mut sim = SimBody {
            entity: EntityId::new(0, 0),
            body,
            implicit_static: false,
            position: Vec3::new(0.0, 10.0, 0.0),
            rotation: Quat::IDENTITY,
            collider: Some(Collider::sphere(0.5)),
            aabb: Aabb::default(),
            woken: false,
            ccd_advanced: false,
        };
        sim.refresh_aabb();
        scene.push_body(sim);
        scene
    }

    fn step(scene: &mut PhysicsScene, dt: f32) {
        snapshot_previous_pose(scene);
        integrate_velocities(scene, Vec3::new(0.0, -9.81, 0.0), dt);
        integrate_positions(scene, dt);
        clear_forces(scene);
    }

    #[test]
    fn test_free_fall_matches_kinematics() {
        let mut scene = scene_with(RigidBody::dynamic(1.0).with_damping(0.0, 0.0));
        let dt = 1.0 / 60.0;
        for _ in 0..60 {
            step(&mut scene, dt);
        }
        let sim = &scene.bodies[0];
        assert!((sim.body.linear_velocity.y + 9.81).abs() < 0.15);
        assert!((sim.position.y - (10.0 - 0.5 * 9.81)).abs() < 0.15);
        assert!(sim.body.previous_position().y > sim.position.y);
    }

    #[test]
    fn test_locks_and_caps() {
        let mut body = RigidBody::dynamic(1.0).with_linear_velocity(Vec3::new(50.0, 0.0, 50.0));
        body.lock_position = [false, false, true];
        body.max_linear_speed = 10.0;
        body.use_gravity = false;
        let mut scene = scene_with(body);
        step(&mut scene, 1.0 / 60.0);
        let v = scene.bodies[0].body.linear_velocity;
        assert_eq!(v.z, 0.0);
        assert!((v.length() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotation_stays_normalized() {
        let mut body = RigidBody::dynamic(1.0);
        body.angular_velocity = Vec3::new(3.0, 7.0, -2.0);
        body.use_gravity = false;
        let mut scene = scene_with(body);
        for _ in 0..600 {
            step(&mut scene, 1.0 / 60.0);
        }
        assert!((scene.bodies[0].rotation.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_damping_is_frame_rate_independent() {
        let run = |dt: f32, steps: usize| {
            let mut body = RigidBody::dynamic(1.0).with_linear_velocity(Vec3::X * 10.0);
            body.linear_damping = 0.5;
            body.use_gravity = false;
            let mut scene = scene_with(body);
            for _ in 0..steps {
                step(&mut scene, dt);
            }
            scene.bodies[0].body.linear_velocity.x
        };
        assert!((run(1.0 / 60.0, 60) - run(1.0 / 120.0, 120)).abs() < 1e-3);
        assert!((run(1.0 / 60.0, 60) - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_force_is_consumed_once() {
        let mut body = RigidBody::dynamic(2.0);
        body.use_gravity = false;
        body.add_force(Vec3::new(120.0, 0.0, 0.0));
        let mut scene = scene_with(body);
        step(&mut scene, 1.0 / 60.0);
        step(&mut scene, 1.0 / 60.0);
        assert!((scene.bodies[0].body.linear_velocity.x - 1.0).abs() < 1e-5);
    }
}
