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
//! Narrow phase
//!
//! Exact contact generation for broad-phase candidates. Primitive pairs use
//! closed-form builders; anything involving a mesh or convex hull goes
//! through GJK/EPA. Every builder fills a manifold whose normal points from
//! the first shape to the second.

mod box_box;
pub mod gjk;
mod primitives;

use crate::ecs::components::PhysicsMaterial;
use crate::math::{Quat, Vec3};
use crate::physics::body::SimBody;
use crate::physics::contact::ContactManifold;
use crate::physics::shapes::{ColliderShape, ShapeKind};

pub use box_box::box_box;
pub use primitives::{capsule_box, capsule_capsule, sphere_box, sphere_capsule, sphere_sphere};

/// A shape placed in the world
#[derive(Debug, Clone, Copy)]
pub struct ShapeRef<'a> {
    /// Geometry
    pub shape: &'a ColliderShape,
    /// World position of the shape center
    pub position: Vec3,
    /// World orientation
    pub rotation: Quat,
}

impl<'a> ShapeRef<'a> {
    /// Place `shape` at a pose
    pub fn new(shape: &'a ColliderShape, position: Vec3, rotation: Quat) -> Self {
        ShapeRef {
            shape,
            position,
            rotation,
        }
    }

    /// World-space support point
    pub fn support(&self, dir: Vec3) -> Vec3 {
        let local = self.shape.support(self.rotation.inverse() * dir);
        self.position + self.rotation * local
    }
}

/// Generate contacts between two placed shapes
///
/// Only the normal and the world-space points of `manifold` are written.
/// Returns false when the shapes do not touch.
pub fn collide(a: &ShapeRef, b: &ShapeRef, manifold: &mut ContactManifold) -> bool {
    use ShapeKind::*;
    manifold.clear();

    let swapped = |f: fn(&ShapeRef, &ShapeRef, &mut ContactManifold) -> bool,
                   m: &mut ContactManifold| {
        let hit = f(b, a, m);
        m.normal = -m.normal;
        hit
    };

    match (a.shape.kind(), b.shape.kind()) {
        (Sphere, Sphere) => sphere_sphere(a, b, manifold),
        (Sphere, Box) => sphere_box(a, b, manifold),
        (Box, Sphere) => swapped(sphere_box, manifold),
        (Sphere, Capsule) => sphere_capsule(a, b, manifold),
        (Capsule, Sphere) => swapped(sphere_capsule, manifold),
        (Box, Box) => box_box(a, b, manifold),
        (Capsule, Capsule) => capsule_capsule(a, b, manifold),
        (Capsule, Box) => capsule_box(a, b, manifold),
        (Box, Capsule) => swapped(capsule_box, manifold),
        _ => convex_convex(a, b, manifold),
    }
}

/// GJK/EPA fallback producing a single contact
pub fn convex_convex(a: &ShapeRef, b: &ShapeRef, manifold: &mut ContactManifold) -> bool {
    let Some(pen) = gjk::penetration(a, b) else {
        return false;
    };
    if pen.depth <= 0.0 || !pen.normal.is_finite() {
        return false;
    }
    manifold.normal = pen.normal;
    manifold.add_point((pen.point_a + pen.point_b) * 0.5, pen.depth);
    true
}

/// Build the full manifold for two gathered bodies
///
/// `a` must be the body with the lower entity index. Material values are
/// combined with A's combine modes; local points are relative to each body
/// origin.
pub fn generate_manifold(a: &SimBody, b: &SimBody) -> Option<ContactManifold> {
    let (ca, cb) = (a.collider.as_ref()?, b.collider.as_ref()?);
    let (pos_a, rot_a) = ca.shape_pose(a.position, a.rotation);
    let (pos_b, rot_b) = cb.shape_pose(b.position, b.rotation);
    let sa = ShapeRef::new(ca.shape(), pos_a, rot_a);
    let sb = ShapeRef::new(cb.shape(), pos_b, rot_b);

    let mut manifold = ContactManifold::new(a.entity, b.entity);
    if !collide(&sa, &sb, &mut manifold) || manifold.is_empty() {
        return None;
    }
    manifold.normal = manifold.normal.normalize_or_zero();
    if manifold.normal == Vec3::ZERO {
        manifold.normal = Vec3::Y;
    }
    manifold.is_trigger = ca.is_trigger || cb.is_trigger;
    manifold.friction = PhysicsMaterial::combined_friction(&ca.material, &cb.material);
    manifold.restitution = PhysicsMaterial::combined_restitution(&ca.material, &cb.material);
    manifold.compute_local_points(a.position, a.rotation, b.position, b.rotation);
    Some(manifold)
}
