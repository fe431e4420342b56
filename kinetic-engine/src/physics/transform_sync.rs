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
//! Transform ↔ physics synchronization
//!
//! Kinematic bodies take their velocity from how far their transform moved
//! since the last frame. Dynamic bodies write their simulated pose into the
//! transform; between fixed steps the transform shows a blend of the last two
//! simulated poses and the exact pose is restored before the next step.
//! Only root transforms take part.

use crate::ecs::components::{RigidBody, Transform};
use crate::ecs::{EntityId, World};
use crate::math::{rotation_vector, Quat, Vec3};
use crate::physics::body::{write_back, PhysicsScene};
use std::collections::HashMap;

type Pose = (Vec3, Quat);

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    previous: Pose,
    current: Pose,
    written: Option<Pose>,
}

/// Pose snapshots of dynamic bodies for render interpolation
#[derive(Debug, Default)]
pub struct TransformSync {
    snapshots: HashMap<EntityId, Snapshot>,
}

impl TransformSync {
    /// Empty helper
    pub fn new() -> Self {
        Self::default()
    }

    /// Bodies with a captured snapshot
    pub fn tracked(&self) -> usize {
        self.snapshots.len()
    }

    /// Forget all snapshots
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Transform → physics for kinematic bodies
    ///
    /// Sets each root kinematic body's velocities from the displacement of
    /// its transform since the previous call. The first call only records
    /// the pose. Non-positive `dt` is ignored.
    pub fn sync_kinematic(&self, world: &World, dt: f32) -> usize {
        if dt <= 0.0 || !dt.is_finite() {
            return 0;
        }
        let registry = world.components();
        let mut poses = Vec::new();
        registry.for_each(|id, t: &Transform| {
            if t.is_root() {
                poses.push((id, t.position(), t.rotation()));
            }
        });
        poses.retain(|(id, _, _)| registry.has::<RigidBody>(*id));

        let mut driven = 0;
        for (id, position, rotation) in poses {
            write_back(registry, id, |rb: &mut RigidBody| {
                if rb.is_dynamic() {
                    return;
                }
                if rb.is_static() {
                    rb.linear_velocity = Vec3::ZERO;
                    rb.angular_velocity = Vec3::ZERO;
                    return;
                }
                if rb.has_previous_pose() {
                    let delta = rotation * rb.previous_rotation().inverse();
                    rb.linear_velocity = (position - rb.previous_position()) / dt;
                    rb.angular_velocity = rotation_vector(delta) / dt;
                } else {
                    rb.linear_velocity = Vec3::ZERO;
                    rb.angular_velocity = Vec3::ZERO;
                }
                rb.set_previous_pose(position, rotation);
                driven += 1;
            });
        }
        driven
    }

    /// Record start-of-step and end-of-step poses of dynamic bodies
    pub fn capture(&mut self, scene: &PhysicsScene) {
        self.snapshots
            .retain(|id, _| scene.body(*id).is_some_and(|s| s.body.is_dynamic()));
        for sim in scene.bodies.iter().filter(|s| s.body.is_dynamic()) {
            let current = (sim.position, sim.rotation);
            let previous = if sim.body.has_previous_pose() {
                (sim.body.previous_position(), sim.body.previous_rotation())
            } else {
                current
            };
            let written = self.snapshots.get(&sim.entity).and_then(|s| s.written);
            self.snapshots.insert(
                sim.entity,
                Snapshot {
                    previous,
                    current,
                    written,
                },
            );
        }
    }

    /// Write `lerp/slerp(previous, current, alpha)` into each transform
    pub fn interpolate(&mut self, world: &World, alpha: f32) {
        let alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 1.0 };
        let registry = world.components();
        for (id, snap) in self.snapshots.iter_mut() {
            let position = snap.previous.0.lerp(snap.current.0, alpha);
            let rotation = snap.previous.1.slerp(snap.current.1, alpha).normalize();
            let written = registry.with_component_mut(*id, |t: &mut Transform| {
                if t.is_root() {
                    t.set_pose(position, rotation);
                    true
                } else {
                    false
                }
            });
            snap.written = matches!(written, Ok(true)).then_some((position, rotation));
        }
    }

    /// Put back the exact simulated pose before the next step
    ///
    /// Transforms edited since the last interpolation keep the edit.
    pub fn restore(&mut self, world: &World) {
        let registry = world.components();
        for (id, snap) in self.snapshots.iter_mut() {
            let Some((wp, wr)) = snap.written.take() else {
                continue;
            };
            let (position, rotation) = snap.current;
            write_back(registry, *id, |t: &mut Transform| {
                if t.same_pose(wp, wr) {
                    t.set_pose(position, rotation);
                }
            });
        }
    }
}

/// Interpolation factor from the accumulator remainder
///
/// Saturates to 1 when the remainder is negligible, so a frame that ran an
/// exact number of steps shows the latest pose.
pub fn interpolation_alpha(accumulator: f32, fixed_dt: f32) -> f32 {
    if fixed_dt <= 0.0 || accumulator <= fixed_dt * 1e-4 {
        1.0
    } else {
        (accumulator / fixed_dt).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::Collider;

    #[test]
    fn test_kinematic_velocity_from_displacement() {
        let world = World::new();
        let id = world.spawn();
        world.add_component(id, Transform::default()).unwrap();
        world.add_component(id, RigidBody::kinematic()).unwrap();
        let sync = TransformSync::new();

        assert_eq!(sync.sync_kinematic(&world, 1.0 / 60.0), 1);
        let rb: RigidBody = world.get_component(id).unwrap();
        assert_eq!(rb.linear_velocity, Vec3::ZERO);

        world
            .with_component_mut(id, |t: &mut Transform| {
                t.set_pose(Vec3::new(0.1, 0.0, 0.0), Quat::from_rotation_y(0.05))
            })
            .unwrap();
        sync.sync_kinematic(&world, 1.0 / 60.0);
        let rb: RigidBody = world.get_component(id).unwrap();
        assert!((rb.linear_velocity - Vec3::new(6.0, 0.0, 0.0)).length() < 1e-3);
        assert!((rb.angular_velocity - Vec3::new(0.0, 3.0, 0.0)).length() < 1e-2);
    }

    #[test]
    fn test_zero_dt_leaves_velocity() {
        let world = World::new();
        let id = world.spawn();
        world.add_component(id, Transform::default()).unwrap();
        world
            .add_component(id, RigidBody::kinematic().with_linear_velocity(Vec3::X))
            .unwrap();
        assert_eq!(TransformSync::new().sync_kinematic(&world, 0.0), 0);
        let rb: RigidBody = world.get_component(id).unwrap();
        assert_eq!(rb.linear_velocity, Vec3::X);
    }

    #[test]
    fn test_static_pose_untouched() {
        let world = World::new();
        let id = world.spawn();
        let pose = (Vec3::new(1.25, -3.5, 0.75), Quat::from_rotation_z(0.3));
        world
            .add_component(id, Transform::from_position_rotation(pose.0, pose.1))
            .unwrap();
        world.add_component(id, Collider::sphere(1.0)).unwrap();
        let mut sync = TransformSync::new();
        sync.sync_kinematic(&world, 1.0 / 60.0);
        let scene = PhysicsScene::gather(&world);
        scene.scatter(&world);
        sync.capture(&scene);
        sync.interpolate(&world, 0.5);
        let t: Transform = world.get_component(id).unwrap();
        assert_eq!((t.position(), t.rotation()), pose);
        assert_eq!(sync.tracked(), 0);
    }

    #[test]
    fn test_interpolate_then_restore() {
        let world = World::new();
        let id = world.spawn();
        world.add_component(id, Transform::default()).unwrap();
        world.add_component(id, RigidBody::dynamic(1.0)).unwrap();
        let mut scene = PhysicsScene::gather(&world);
        {
            let sim = scene.body_mut(id).unwrap();
            sim.body.set_previous_pose(Vec3::ZERO, Quat::IDENTITY);
            sim.position = Vec3::new(2.0, 0.0, 0.0);
        }
        scene.scatter(&world);

        let mut sync = TransformSync::new();
        sync.capture(&scene);
        sync.interpolate(&world, 0.25);
        let t: Transform = world.get_component(id).unwrap();
        assert!((t.position().x - 0.5).abs() < 1e-6);

        sync.restore(&world);
        let t: Transform = world.get_component(id).unwrap();
        assert_eq!(t.position(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_restore_keeps_user_edit() {
        let world = World::new();
        let id = world.spawn();
        world.add_component(id, Transform::default()).unwrap();
        world.add_component(id, RigidBody::dynamic(1.0)).unwrap();
        let mut scene = PhysicsScene::gather(&world);
        scene.body_mut(id).unwrap().position = Vec3::Y;
        let mut sync = TransformSync::new();
        sync.capture(&scene);
        sync.interpolate(&world, 0.5);

        let teleport = Vec3::new(9.0, 9.0, 9.0);
        world
            .with_component_mut(id, |t: &mut Transform| t.set_position(teleport))
            .unwrap();
        sync.restore(&world);
        let t: Transform = world.get_component(id).unwrap();
        assert_eq!(t.position(), teleport);
    }

    #[test]
    fn test_alpha_saturates() {
        assert_eq!(interpolation_alpha(0.0, 1.0 / 60.0), 1.0);
        assert!((interpolation_alpha(1.0 / 120.0, 1.0 / 60.0) - 0.5).abs() < 1e-5);
        assert_eq!(interpolation_alpha(1.0, 0.0), 1.0);
    }
}
