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
//! Debug line generation
//!
//! Produces world-space line segments for whatever the debug toggles ask
//! for. Nothing here draws; the renderer consumes the segments.

use crate::config::DebugDrawSettings;
use crate::math::{Aabb, Quat, Vec3, Vec4};
use crate::physics::body::{PhysicsScene, SimBody};
use crate::physics::contact::ContactManifold;
use crate::physics::shapes::ColliderShape;
use std::f32::consts::TAU;

/// Collider outlines
pub const COLLIDER_COLOR: Vec4 = Vec4::new(0.2, 0.9, 0.2, 1.0);
/// Sleeping collider outlines
pub const SLEEPING_COLOR: Vec4 = Vec4::new(0.4, 0.4, 0.8, 1.0);
/// Bounding boxes
pub const AABB_COLOR: Vec4 = Vec4::new(0.9, 0.9, 0.2, 1.0);
/// Contact points and normals
pub const CONTACT_COLOR: Vec4 = Vec4::new(0.9, 0.2, 0.2, 1.0);
/// Velocity vectors
pub const VELOCITY_COLOR: Vec4 = Vec4::new(0.2, 0.6, 0.9, 1.0);

const CIRCLE_SEGMENTS: usize = 16;
const CONTACT_MARK: f32 = 0.05;
const NORMAL_LENGTH: f32 = 0.25;
const VELOCITY_SCALE: f32 = 0.1;

/// A colored world-space segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    /// Start point
    pub start: Vec3,
    /// End point
    pub end: Vec3,
    /// RGBA color
    pub color: Vec4,
}

impl DebugLine {
    fn new(start: Vec3, end: Vec3, color: Vec4) -> Self {
        DebugLine { start, end, color }
    }
}

/// Lines for a scene and its latest contacts
pub fn debug_lines(scene: &PhysicsScene, manifolds: &[ContactManifold], settings: &DebugDrawSettings) -> Vec<DebugLine> {
    let mut out = Vec::new();
    if !settings.any() {
        return out;
    }
    for sim in &scene.bodies {
        if settings.draw_colliders {
            collider_lines(sim, &mut out);
        }
        if settings.draw_aabbs && sim.collider.is_some() {
            box_lines(sim.aabb.center(), Quat::IDENTITY, sim.aabb.half_extents(), AABB_COLOR, &mut out);
        }
        if settings.draw_velocity && sim.body.is_dynamic() {
            let com = sim.world_com();
            let v = sim.body.linear_velocity;
            if v.length_squared() > f32::EPSILON {
                out.push(DebugLine::new(com, com + v * VELOCITY_SCALE, VELOCITY_COLOR));
            }
        }
    }
    if settings.draw_contacts {
        for m in manifolds.iter().filter(|m| !m.is_trigger) {
            for p in m.points() {
                for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
                    out.push(DebugLine::new(
                        p.position - axis * CONTACT_MARK,
                        p.position + axis * CONTACT_MARK,
                        CONTACT_COLOR,
                    ));
                }
                out.push(DebugLine::new(
                    p.position,
                    p.position + m.normal * NORMAL_LENGTH,
                    CONTACT_COLOR,
                ));
            }
        }
    }
    out
}

fn collider_lines(sim: &SimBody, out: &mut Vec<DebugLine>) {
    let (Some(collider), Some((center, rotation))) = (&sim.collider, sim.shape_pose()) else {
        return;
    };
    let color = if sim.body.is_sleeping() { SLEEPING_COLOR } else { COLLIDER_COLOR };
    match collider.shape() {
        ColliderShape::Sphere { radius } => {
            for (u, v) in [(Vec3::X, Vec3::Y), (Vec3::Y, Vec3::Z), (Vec3::Z, Vec3::X)] {
                circle(center, rotation * u, rotation * v, *radius, color, out);
            }
        }
        ColliderShape::Box { half_extents } => box_lines(center, rotation, *half_extents, color, out),
        ColliderShape::Capsule { radius, height } => {
            let axis = rotation * Vec3::Y * (height * 0.5);
            let (u, w) = (rotation * Vec3::X, rotation * Vec3::Z);
            for end in [center + axis, center - axis] {
                circle(end, u, w, *radius, color, out);
            }
            for side in [u, -u, w, -w] {
                let offset = side * *radius;
                out.push(DebugLine::new(center - axis + offset, center + axis + offset, color));
            }
        }
        ColliderShape::Mesh { vertices: points } | ColliderShape::ConvexHull { points } => {
            let local = Aabb::from_points(points.iter());
            box_lines(center + rotation * local.center(), rotation, local.half_extents(), color, out);
        }
    }
}

fn circle(center: Vec3, u: Vec3, v: Vec3, radius: f32, color: Vec4, out: &mut Vec<DebugLine>) {
    let point = |i: usize| {
        let t = i as f32 / CIRCLE_SEGMENTS as f32 * TAU;
        center + (u * t.cos() + v * t.sin()) * radius
    };
    for i in 0..CIRCLE_SEGMENTS {
        out.push(DebugLine::new(point(i), point(i + 1), color));
    }
}

fn box_lines(center: Vec3, rotation: Quat, half: Vec3, color: Vec4, out: &mut Vec<DebugLine>) {
    let corner = |i: usize| {
        let sign = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        center + rotation * (half * sign)
    };
    // corners differing in exactly one bit share an edge
    for i in 0..8usize {
        for bit in [1usize, 2, 4] {
            if i & bit == 0 {
                out.push(DebugLine::new(corner(i), corner(i | bit), color));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Collider, RigidBody, Transform};
    use crate::ecs::World;

    fn scene() -> PhysicsScene {
        let world = World::new();
        let id = world.spawn();
        world.add_component(id, Transform::default()).unwrap();
        world
            .add_component(id, RigidBody::dynamic(1.0).with_linear_velocity(Vec3::X))
            .unwrap();
        world.add_component(id, Collider::cuboid(Vec3::splat(0.5))).unwrap();
        PhysicsScene::gather(&world)
    }

    #[test]
    fn test_disabled_settings_produce_nothing() {
        assert!(debug_lines(&scene(), &[], &DebugDrawSettings::default()).is_empty());
    }

    #[test]
    fn test_box_has_twelve_edges() {
        let settings = DebugDrawSettings {
            draw_colliders: true,
            ..DebugDrawSettings::default()
        };
        let lines = debug_lines(&scene(), &[], &settings);
        assert_eq!(lines.len(), 12);
        assert!(lines.iter().all(|l| ((l.start - l.end).length() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_velocity_and_contacts() {
        let mut m = ContactManifold::new(crate::ecs::EntityId::new(0, 0), crate::ecs::EntityId::new(1, 0));
        m.normal = Vec3::Y;
        m.add_point(Vec3::ZERO, 0.01);
        let settings = DebugDrawSettings {
            draw_contacts: true,
            draw_velocity: true,
            ..DebugDrawSettings::default()
        };
        let lines = debug_lines(&scene(), &[m], &settings);
        assert_eq!(lines.len(), 1 + 4);
        assert!(lines.iter().any(|l| l.color == VELOCITY_COLOR));
    }
}
