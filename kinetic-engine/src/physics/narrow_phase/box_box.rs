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
//! Oriented box vs oriented box
//!
//! Separating-axis test over the 15 candidate axes (3 + 3 face normals,
//! 9 edge cross products). Face axes are preferred over edge axes unless
//! the edge overlap is clearly smaller, which keeps resting stacks on
//! stable face contacts. Face contacts clip the incident face against the
//! side planes of the reference face; edge contacts use the closest points
//! of the two edges.

use super::ShapeRef;
use crate::math::{closest_points_segments, Vec3};
use crate::physics::contact::ContactManifold;
use crate::physics::shapes::ColliderShape;

const EDGE_RELATIVE_TOLERANCE: f32 = 0.95;
const EDGE_ABSOLUTE_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy)]
struct Obb {
    center: Vec3,
    axes: [Vec3; 3],
    half: [f32; 3],
}

impl Obb {
    fn from_ref(shape: &ShapeRef) -> Self {
        let h = match shape.shape {
            ColliderShape::Box { half_extents } => *half_extents,
            _ => Vec3::ZERO,
        };
        Obb {
            center: shape.position,
            axes: [shape.rotation * Vec3::X, shape.rotation * Vec3::Y, shape.rotation * Vec3::Z],
            half: [h.x, h.y, h.z],
        }
    }

    fn projected_radius(&self, axis: Vec3) -> f32 {
        (0..3).map(|i| self.half[i] * self.axes[i].dot(axis).abs()).sum()
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    FaceA(usize),
    FaceB(usize),
    Edge(usize, usize),
}

/// Box vs box
pub fn box_box(a: &ShapeRef, b: &ShapeRef, m: &mut ContactManifold) -> bool {
    let (oa, ob) = (Obb::from_ref(a), Obb::from_ref(b));
    let t = ob.center - oa.center;

    let overlap = |axis: Vec3| oa.projected_radius(axis) + ob.projected_radius(axis) - t.dot(axis).abs();

    let mut best_face: Option<(f32, Axis, Vec3)> = None;
    for i in 0..3 {
        for (axis, kind) in [(oa.axes[i], Axis::FaceA(i)), (ob.axes[i], Axis::FaceB(i))] {
            let o = overlap(axis);
            if o < 0.0 {
                return false;
            }
            if best_face.map_or(true, |(best, _, _)| o < best) {
                best_face = Some((o, kind, axis));
            }
        }
    }

    let mut best_edge: Option<(f32, Axis, Vec3)> = None;
    for i in 0..3 {
        for j in 0..3 {
            let cross = oa.axes[i].cross(ob.axes[j]);
            let len = cross.length();
            if len < 1e-5 {
                continue;
            }
            let axis = cross / len;
            let o = overlap(axis);
            if o < 0.0 {
                return false;
            }
            if best_edge.map_or(true, |(best, _, _)| o < best) {
                best_edge = Some((o, Axis::Edge(i, j), axis));
            }
        }
    }

    let Some(face) = best_face else {
        return false;
    };
    let (depth, kind, mut normal) = match best_edge {
        Some(edge) if edge.0 < EDGE_RELATIVE_TOLERANCE * face.0 - EDGE_ABSOLUTE_TOLERANCE => edge,
        _ => face,
    };
    if normal.dot(t) < 0.0 {
        normal = -normal;
    }
    m.normal = normal;

    match kind {
        Axis::FaceA(i) => face_contacts(&oa, i, normal, &ob, m),
        Axis::FaceB(i) => face_contacts(&ob, i, -normal, &oa, m),
        Axis::Edge(i, j) => edge_contact(&oa, i, &ob, j, normal, depth, m),
    }
    !m.is_empty()
}

/// Clip the incident box's face against the reference face
///
/// `ref_normal` is the outward normal of the reference face, pointing at
/// the incident box.
fn face_contacts(reference: &Obb, axis: usize, ref_normal: Vec3, incident: &Obb, m: &mut ContactManifold) {
    // incident face: the one most opposed to the reference normal
    let inc_axis = (0..3)
        .max_by(|&x, &y| {
            incident.axes[x]
                .dot(ref_normal)
                .abs()
                .total_cmp(&incident.axes[y].dot(ref_normal).abs())
        })
        .unwrap_or(0);
    let inc_sign = if incident.axes[inc_axis].dot(ref_normal) > 0.0 { -1.0 } else { 1.0 };
    let inc_center = incident.center + incident.axes[inc_axis] * (inc_sign * incident.half[inc_axis]);
    let (u, v) = ((inc_axis + 1) % 3, (inc_axis + 2) % 3);
    let du = incident.axes[u] * incident.half[u];
    let dv = incident.axes[v] * incident.half[v];
    let mut polygon = vec![
        inc_center + du + dv,
        inc_center - du + dv,
        inc_center - du - dv,
        inc_center + du - dv,
    ];

    let (s, r) = ((axis + 1) % 3, (axis + 2) % 3);
    for side in [s, r] {
        let n = reference.axes[side];
        let offset = n.dot(reference.center);
        let h = reference.half[side];
        polygon = clip(&polygon, n, offset + h);
        polygon = clip(&polygon, -n, -offset + h);
        if polygon.is_empty() {
            return;
        }
    }

    let face_center = reference.center + ref_normal * reference.half[axis];
    let plane = ref_normal.dot(face_center);
    for p in polygon {
        let penetration = plane - ref_normal.dot(p);
        if penetration >= 0.0 {
            m.add_point(p + ref_normal * (penetration * 0.5), penetration);
        }
    }
}

/// Sutherland–Hodgman against the half space `n·x <= d`
fn clip(polygon: &[Vec3], n: Vec3, d: f32) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(polygon.len() + 2);
    for (k, &current) in polygon.iter().enumerate() {
        let next = polygon[(k + 1) % polygon.len()];
        let dc = n.dot(current) - d;
        let dn = n.dot(next) - d;
        if dc <= 0.0 {
            out.push(current);
        }
        if (dc < 0.0 && dn > 0.0) || (dc > 0.0 && dn < 0.0) {
            let t = dc / (dc - dn);
            out.push(current + (next - current) * t);
        }
    }
    out
}

fn support_edge(obb: &Obb, axis: usize, toward: Vec3) -> (Vec3, Vec3) {
    let mut mid = obb.center;
    for k in 0..3 {
        if k != axis {
            let sign = if obb.axes[k].dot(toward) >= 0.0 { 1.0 } else { -1.0 };
            mid += obb.axes[k] * (sign * obb.half[k]);
        }
    }
    let along = obb.axes[axis] * obb.half[axis];
    (mid - along, mid + along)
}

fn edge_contact(a: &Obb, i: usize, b: &Obb, j: usize, normal: Vec3, depth: f32, m: &mut ContactManifold) {
    let (p1, q1) = support_edge(a, i, normal);
    let (p2, q2) = support_edge(b, j, -normal);
    let (_, _, c1, c2) = closest_points_segments(p1, q1, p2, q2);
    m.add_point((c1 + c2) * 0.5, depth);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EntityId;
    use crate::math::Quat;
    use std::f32::consts::FRAC_PI_4;

    fn manifold() -> ContactManifold {
        ContactManifold::new(EntityId::new(0, 0), EntityId::new(1, 0))
    }

    #[test]
    fn test_box_resting_on_plate() {
        let plate = ColliderShape::Box { half_extents: Vec3::new(1.5, 0.25, 1.5) };
        let cube = ColliderShape::Box { half_extents: Vec3::splat(0.25) };
        let a = ShapeRef::new(&plate, Vec3::ZERO, Quat::IDENTITY);
        let b = ShapeRef::new(&cube, Vec3::new(0.3, 0.49, 0.0), Quat::IDENTITY);
        let mut m = manifold();
        assert!(box_box(&a, &b, &mut m));
        assert!((m.normal - Vec3::Y).length() < 1e-5);
        assert_eq!(m.contact_count(), 4);
        assert!((m.penetration - 0.01).abs() < 1e-4);
        for p in m.points() {
            assert!((p.position.y - 0.245).abs() < 1e-4, "{p:?}");
        }
    }

    #[test]
    fn test_small_box_below_plate() {
        let plate = ColliderShape::Box { half_extents: Vec3::new(1.5, 0.25, 1.5) };
        let cube = ColliderShape::Box { half_extents: Vec3::splat(0.25) };
        // cube is A and sits below the plate
        let a = ShapeRef::new(&cube, Vec3::new(0.0, -0.49, 0.0), Quat::IDENTITY);
        let b = ShapeRef::new(&plate, Vec3::ZERO, Quat::IDENTITY);
        let mut m = manifold();
        assert!(box_box(&a, &b, &mut m));
        assert!((m.normal - Vec3::Y).length() < 1e-5);
        assert_eq!(m.contact_count(), 4);
    }

    #[test]
    fn test_separated_boxes() {
        let cube = ColliderShape::Box { half_extents: Vec3::splat(0.5) };
        let a = ShapeRef::new(&cube, Vec3::ZERO, Quat::IDENTITY);
        let b = ShapeRef::new(&cube, Vec3::new(1.2, 0.0, 0.0), Quat::from_rotation_y(0.3));
        assert!(!box_box(&a, &b, &mut manifold()));
    }

    #[test]
    fn test_edge_on_edge() {
        let cube = ColliderShape::Box { half_extents: Vec3::splat(0.5) };
        // A rotated about Z presents an edge upward; B rotated about X presents an edge downward
        let a = ShapeRef::new(&cube, Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_4));
        let b = ShapeRef::new(&cube, Vec3::new(0.0, 1.4, 0.0), Quat::from_rotation_x(FRAC_PI_4));
        let mut m = manifold();
        assert!(box_box(&a, &b, &mut m));
        assert_eq!(m.contact_count(), 1);
        assert!(m.normal.y > 0.99, "{:?}", m.normal);
        let expected = 2.0 * 0.5 * std::f32::consts::SQRT_2 - 1.4;
        assert!((m.penetration - expected).abs() < 1e-3);
        assert!((m.points()[0].position - Vec3::new(0.0, 0.7, 0.0)).length() < 1e-3);
    }
}
