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
//! Closed-form contact builders for spheres, boxes and capsules

use super::ShapeRef;
use crate::math::{closest_point_on_segment, closest_points_segments, tangent_basis, Vec3};
use crate::physics::contact::ContactManifold;
use crate::physics::shapes::{capsule_segment, ColliderShape};

const EPSILON: f32 = 1e-6;
const PARALLEL_EPSILON: f32 = 1e-6;

fn radius(shape: &ColliderShape) -> f32 {
    match shape {
        ColliderShape::Sphere { radius } | ColliderShape::Capsule { radius, .. } => *radius,
        _ => 0.0,
    }
}

fn half_extents(shape: &ColliderShape) -> Vec3 {
    match shape {
        ColliderShape::Box { half_extents } => *half_extents,
        _ => Vec3::ZERO,
    }
}

fn segment(capsule: &ShapeRef) -> (Vec3, Vec3) {
    match capsule.shape {
        ColliderShape::Capsule { height, .. } => capsule_segment(capsule.position, capsule.rotation, *height),
        _ => (capsule.position, capsule.position),
    }
}

/// Contact between two balls centered at `ca` and `cb`
fn balls(ca: Vec3, ra: f32, cb: Vec3, rb: f32, fallback: Vec3, m: &mut ContactManifold) -> bool {
    let d = cb - ca;
    let dist_sq = d.length_squared();
    let sum = ra + rb;
    if dist_sq >= sum * sum {
        return false;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > EPSILON { d / dist } else { fallback };
    let penetration = sum - dist;
    m.normal = normal;
    m.add_point(ca + normal * (ra - penetration * 0.5), penetration);
    true
}

/// Sphere vs sphere
pub fn sphere_sphere(a: &ShapeRef, b: &ShapeRef, m: &mut ContactManifold) -> bool {
    balls(a.position, radius(a.shape), b.position, radius(b.shape), Vec3::Y, m)
}

/// Sphere (A) vs oriented box (B)
pub fn sphere_box(sphere: &ShapeRef, bx: &ShapeRef, m: &mut ContactManifold) -> bool {
    let r = radius(sphere.shape);
    let h = half_extents(bx.shape);
    let local = bx.rotation.inverse() * (sphere.position - bx.position);
    let clamped = local.clamp(-h, h);

    if clamped != local {
        let delta = local - clamped;
        let dist_sq = delta.length_squared();
        if dist_sq >= r * r {
            return false;
        }
        let dist = dist_sq.sqrt();
        // delta points from the box surface out to the sphere
        let outward = bx.rotation * (delta / dist);
        let surface = bx.position + bx.rotation * clamped;
        let penetration = r - dist;
        m.normal = -outward;
        m.add_point(surface + outward * (penetration * 0.5), penetration);
        return true;
    }

    // center inside the box: push out through the nearest face
    let gaps = h - local.abs();
    let axis = if gaps.x <= gaps.y && gaps.x <= gaps.z {
        0
    } else if gaps.y <= gaps.z {
        1
    } else {
        2
    };
    let sign = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
    let mut face_normal = Vec3::ZERO;
    face_normal[axis] = sign;
    let mut on_face = local;
    on_face[axis] = sign * h[axis];

    let outward = bx.rotation * face_normal;
    let penetration = r + gaps[axis];
    m.normal = -outward;
    m.add_point(bx.position + bx.rotation * on_face, penetration);
    true
}

/// Sphere (A) vs capsule (B)
pub fn sphere_capsule(sphere: &ShapeRef, capsule: &ShapeRef, m: &mut ContactManifold) -> bool {
    let (p, q) = segment(capsule);
    let closest = closest_point_on_segment(sphere.position, p, q);
    let fallback = tangent_basis((q - p).normalize_or_zero()).0;
    balls(
        sphere.position,
        radius(sphere.shape),
        closest,
        radius(capsule.shape),
        fallback,
        m,
    )
}

/// Capsule vs capsule
///
/// Near-parallel overlapping segments produce two contacts spanning the
/// shared range.
pub fn capsule_capsule(a: &ShapeRef, b: &ShapeRef, m: &mut ContactManifold) -> bool {
    let (ra, rb) = (radius(a.shape), radius(b.shape));
    let (p1, q1) = segment(a);
    let (p2, q2) = segment(b);
    let (_, _, c1, c2) = closest_points_segments(p1, q1, p2, q2);
    let d = c2 - c1;
    let dist = d.length();
    let sum = ra + rb;
    if dist >= sum {
        return false;
    }

    let dir_a = (q1 - p1).normalize_or_zero();
    let dir_b = (q2 - p2).normalize_or_zero();
    let cross = dir_a.cross(dir_b);
    let normal = if dist > EPSILON {
        d / dist
    } else if cross.length_squared() > PARALLEL_EPSILON {
        let n = cross.normalize();
        if n.dot(b.position - a.position) < 0.0 {
            -n
        } else {
            n
        }
    } else {
        tangent_basis(dir_a).0
    };
    m.normal = normal;

    let len_a = (q1 - p1).length();
    if cross.length_squared() <= PARALLEL_EPSILON && len_a > EPSILON {
        let t0 = (p2 - p1).dot(dir_a);
        let t1 = (q2 - p1).dot(dir_a);
        let lo = t0.min(t1).max(0.0);
        let hi = t0.max(t1).min(len_a);
        if hi - lo > 1e-4 {
            let mut added = false;
            for t in [lo, hi] {
                let on_a = p1 + dir_a * t;
                let on_b = closest_point_on_segment(on_a, p2, q2);
                let gap = (on_b - on_a).dot(normal);
                let penetration = sum - gap;
                if penetration > 0.0 {
                    m.add_point(on_a + normal * (ra - penetration * 0.5), penetration);
                    added = true;
                }
            }
            if added {
                return true;
            }
        }
    }

    let penetration = sum - dist;
    m.add_point(c1 + normal * (ra - penetration * 0.5), penetration);
    true
}

fn closest_on_box(bx: &ShapeRef, h: Vec3, point: Vec3) -> Vec3 {
    let local = bx.rotation.inverse() * (point - bx.position);
    bx.position + bx.rotation * local.clamp(-h, h)
}

/// Capsule (A) vs oriented box (B)
///
/// Closest points come from alternating projection between the segment and
/// the box. When the segment itself enters the box the pair is handed to
/// EPA.
pub fn capsule_box(capsule: &ShapeRef, bx: &ShapeRef, m: &mut ContactManifold) -> bool {
    let r = radius(capsule.shape);
    let h = half_extents(bx.shape);
    let (p, q) = segment(capsule);

    let mut on_segment = (p + q) * 0.5;
    let mut on_box = closest_on_box(bx, h, on_segment);
    for _ in 0..8 {
        let next = closest_point_on_segment(on_box, p, q);
        let moved = (next - on_segment).length_squared();
        on_segment = next;
        on_box = closest_on_box(bx, h, on_segment);
        if moved < 1e-10 {
            break;
        }
    }

    let d = on_box - on_segment;
    let dist = d.length();
    if dist <= EPSILON {
        return super::convex_convex(capsule, bx, m);
    }
    if dist >= r {
        return false;
    }
    let normal = d / dist;
    m.normal = normal;

    // a capsule lying on a face touches along its length; use both ends
    let plane = on_box.dot(normal);
    for end in [p, q] {
        let gap = plane - end.dot(normal);
        let projected = end + normal * gap;
        let on_face = (closest_on_box(bx, h, projected) - projected).length_squared() < 1e-6;
        let penetration = r - gap;
        if on_face && penetration > 0.0 && (end - on_segment).length_squared() > 1e-8 {
            m.add_point(end + normal * (r - penetration * 0.5), penetration);
        }
    }
    let penetration = r - dist;
    m.add_point(on_segment + normal * (r - penetration * 0.5), penetration);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EntityId;
    use crate::math::Quat;
    use std::f32::consts::FRAC_PI_2;

    fn manifold() -> ContactManifold {
        ContactManifold::new(EntityId::new(0, 0), EntityId::new(1, 0))
    }

    #[test]
    fn test_sphere_sphere() {
        let s = ColliderShape::Sphere { radius: 1.0 };
        let a = ShapeRef::new(&s, Vec3::ZERO, Quat::IDENTITY);
        let b = ShapeRef::new(&s, Vec3::new(0.0, 1.5, 0.0), Quat::IDENTITY);
        let mut m = manifold();
        assert!(sphere_sphere(&a, &b, &mut m));
        assert_eq!(m.normal, Vec3::Y);
        assert!((m.penetration - 0.5).abs() < 1e-6);
        assert!((m.points()[0].position.y - 0.75).abs() < 1e-6);

        let far = ShapeRef::new(&s, Vec3::new(0.0, 2.5, 0.0), Quat::IDENTITY);
        assert!(!sphere_sphere(&a, &far, &mut manifold()));
    }

    #[test]
    fn test_sphere_resting_on_box() {
        let s = ColliderShape::Sphere { radius: 0.5 };
        let b = ColliderShape::Box { half_extents: Vec3::new(5.0, 0.5, 5.0) };
        let sphere = ShapeRef::new(&s, Vec3::new(1.0, 0.95, 0.0), Quat::IDENTITY);
        let bx = ShapeRef::new(&b, Vec3::ZERO, Quat::IDENTITY);
        let mut m = manifold();
        assert!(sphere_box(&sphere, &bx, &mut m));
        // normal from sphere into box
        assert!((m.normal - Vec3::NEG_Y).length() < 1e-6);
        assert!((m.penetration - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_sphere_center_inside_box() {
        let s = ColliderShape::Sphere { radius: 0.2 };
        let b = ColliderShape::Box { half_extents: Vec3::splat(1.0) };
        let sphere = ShapeRef::new(&s, Vec3::new(0.9, 0.0, 0.0), Quat::IDENTITY);
        let bx = ShapeRef::new(&b, Vec3::ZERO, Quat::IDENTITY);
        let mut m = manifold();
        assert!(sphere_box(&sphere, &bx, &mut m));
        assert!((m.normal - Vec3::NEG_X).length() < 1e-6);
        assert!((m.penetration - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_parallel_capsules_get_two_points() {
        let c = ColliderShape::Capsule { radius: 0.5, height: 2.0 };
        let lying = Quat::from_rotation_z(FRAC_PI_2);
        let a = ShapeRef::new(&c, Vec3::ZERO, lying);
        let b = ShapeRef::new(&c, Vec3::new(0.5, 0.9, 0.0), lying);
        let mut m = manifold();
        assert!(capsule_capsule(&a, &b, &mut m));
        assert_eq!(m.contact_count(), 2);
        assert!(m.normal.y > 0.99);
        assert!((m.penetration - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_crossed_capsules() {
        let c = ColliderShape::Capsule { radius: 0.5, height: 2.0 };
        let a = ShapeRef::new(&c, Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_2));
        let b = ShapeRef::new(&c, Vec3::new(0.0, 0.8, 0.0), Quat::from_rotation_x(FRAC_PI_2));
        let mut m = manifold();
        assert!(capsule_capsule(&a, &b, &mut m));
        assert_eq!(m.contact_count(), 1);
        assert!((m.penetration - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_capsule_lying_on_box() {
        let c = ColliderShape::Capsule { radius: 0.25, height: 1.0 };
        let b = ColliderShape::Box { half_extents: Vec3::new(3.0, 0.5, 3.0) };
        let capsule = ShapeRef::new(&c, Vec3::new(0.0, 0.7, 0.0), Quat::from_rotation_z(FRAC_PI_2));
        let bx = ShapeRef::new(&b, Vec3::ZERO, Quat::IDENTITY);
        let mut m = manifold();
        assert!(capsule_box(&capsule, &bx, &mut m));
        assert!(m.contact_count() >= 2);
        assert!((m.normal - Vec3::NEG_Y).length() < 1e-4);
        assert!((m.penetration - 0.05).abs() < 1e-4);
    }

    #[test]
    fn test_standing_capsule_on_box() {
        let c = ColliderShape::Capsule { radius: 0.25, height: 1.0 };
        let b = ColliderShape::Box { half_extents: Vec3::new(3.0, 0.5, 3.0) };
        let capsule = ShapeRef::new(&c, Vec3::new(0.0, 1.2, 0.0), Quat::IDENTITY);
        let bx = ShapeRef::new(&b, Vec3::ZERO, Quat::IDENTITY);
        let mut m = manifold();
        assert!(capsule_box(&capsule, &bx, &mut m));
        assert_eq!(m.contact_count(), 1);
        assert!((m.penetration - 0.05).abs() < 1e-4);
    }
}
