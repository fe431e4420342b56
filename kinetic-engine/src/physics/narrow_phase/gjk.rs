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
//! GJK intersection and EPA penetration for arbitrary convex shapes
//!
//! Works on the Minkowski difference A − B. EPA's closest face gives the
//! normal (A→B) and depth; the contact point is interpolated from the
//! support points of A and B stored with each simplex vertex.

use super::ShapeRef;
use crate::math::Vec3;

/// Iteration cap for both GJK and EPA
pub const MAX_ITERATIONS: usize = 64;

const EPA_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Clone, Copy)]
struct SupportPoint {
    v: Vec3,
    a: Vec3,
    b: Vec3,
}

fn support(a: &ShapeRef, b: &ShapeRef, dir: Vec3) -> SupportPoint {
    let pa = a.support(dir);
    let pb = b.support(-dir);
    SupportPoint { v: pa - pb, a: pa, b: pb }
}

/// Result of a successful EPA query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// Unit normal from A to B
    pub normal: Vec3,
    /// Depth along the normal
    pub depth: f32,
    /// Deepest point on A
    pub point_a: Vec3,
    /// Deepest point on B
    pub point_b: Vec3,
}

/// Boolean GJK intersection test
pub fn intersects(a: &ShapeRef, b: &ShapeRef) -> bool {
    gjk(a, b).is_some()
}

fn gjk(a: &ShapeRef, b: &ShapeRef) -> Option<Vec<SupportPoint>> {
    let mut dir = b.position - a.position;
    if dir.length_squared() < 1e-12 {
        dir = Vec3::X;
    }
    let first = support(a, b, dir);
    let mut simplex = vec![first];
    dir = -first.v;

    for _ in 0..MAX_ITERATIONS {
        if dir.length_squared() < 1e-12 {
            // origin lies on the simplex
            return Some(simplex);
        }
        let p = support(a, b, dir);
        if p.v.dot(dir) < 0.0 {
            return None;
        }
        simplex.push(p);
        if next_simplex(&mut simplex, &mut dir) {
            return Some(simplex);
        }
    }
    None
}

fn same_direction(a: Vec3, b: Vec3) -> bool {
    a.dot(b) > 0.0
}

fn next_simplex(s: &mut Vec<SupportPoint>, dir: &mut Vec3) -> bool {
    match s.len() {
        2 => {
            let (b, a) = (s[0].v, s[1].v);
            let ab = b - a;
            let ao = -a;
            if same_direction(ab, ao) {
                *dir = ab.cross(ao).cross(ab);
                if dir.length_squared() < 1e-12 {
                    // origin on the segment
                    return true;
                }
            } else {
                *s = vec![s[1]];
                *dir = ao;
            }
            false
        }
        3 => {
            let (c, b, a) = (s[0].v, s[1].v, s[2].v);
            let ab = b - a;
            let ac = c - a;
            let ao = -a;
            let abc = ab.cross(ac);

            if same_direction(abc.cross(ac), ao) {
                if same_direction(ac, ao) {
                    *s = vec![s[0], s[2]];
                    *dir = ac.cross(ao).cross(ac);
                } else {
                    *s = vec![s[1], s[2]];
                    return next_simplex(s, dir);
                }
            } else if same_direction(ab.cross(abc), ao) {
                *s = vec![s[1], s[2]];
                return next_simplex(s, dir);
            } else if same_direction(abc, ao) {
                *dir = abc;
            } else {
                if abc.length_squared() < 1e-12 {
                    return true;
                }
                s.swap(0, 1);
                *dir = -abc;
            }
            false
        }
        4 => {
            let (d, c, b, a) = (s[0].v, s[1].v, s[2].v, s[3].v);
            let ab = b - a;
            let ac = c - a;
            let ad = d - a;
            let ao = -a;
            let abc = ab.cross(ac);
            let acd = ac.cross(ad);
            let adb = ad.cross(ab);

            if same_direction(abc, ao) {
                *s = vec![s[1], s[2], s[3]];
                return next_simplex(s, dir);
            }
            if same_direction(acd, ao) {
                *s = vec![s[0], s[1], s[3]];
                return next_simplex(s, dir);
            }
            if same_direction(adb, ao) {
                *s = vec![s[2], s[0], s[3]];
                return next_simplex(s, dir);
            }
            true
        }
        _ => false,
    }
}

/// Grow a degenerate terminating simplex into a tetrahedron around the origin
fn complete_tetrahedron(a: &ShapeRef, b: &ShapeRef, simplex: &mut Vec<SupportPoint>) {
    const DIRS: [Vec3; 6] = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
    let mut i = 0;
    while simplex.len() < 4 && i < DIRS.len() {
        let p = support(a, b, DIRS[i]);
        let distinct = simplex.iter().all(|q| (q.v - p.v).length_squared() > 1e-10);
        let independent = match simplex.len() {
            1 => true,
            2 => (simplex[1].v - simplex[0].v).cross(p.v - simplex[0].v).length_squared() > 1e-10,
            _ => {
                let n = (simplex[1].v - simplex[0].v).cross(simplex[2].v - simplex[0].v);
                n.dot(p.v - simplex[0].v).abs() > 1e-6
            }
        };
        if distinct && independent {
            simplex.push(p);
        }
        i += 1;
    }
}

#[derive(Debug, Clone, Copy)]
struct Face {
    idx: [usize; 3],
    normal: Vec3,
    distance: f32,
}

/// Face with its normal pointing away from `interior`
///
/// The origin lies inside or on the polytope, so the distance is never
/// negative beyond rounding; a face through the origin has distance zero.
fn make_face(points: &[SupportPoint], interior: Vec3, i: usize, j: usize, k: usize) -> Option<Face> {
    let (a, b, c) = (points[i].v, points[j].v, points[k].v);
    let mut normal = (b - a).cross(c - a);
    let len = normal.length();
    if len < 1e-10 {
        return None;
    }
    normal /= len;
    let mut idx = [i, j, k];
    if normal.dot(a - interior) < 0.0 {
        normal = -normal;
        idx.swap(1, 2);
    }
    let distance = normal.dot(a).max(0.0);
    Some(Face { idx, normal, distance })
}

/// Penetration normal and depth of two intersecting convex shapes
pub fn penetration(a: &ShapeRef, b: &ShapeRef) -> Option<Penetration> {
    let mut points = gjk(a, b)?;
    complete_tetrahedron(a, b, &mut points);
    if points.len() < 4 {
        return None;
    }

    // the polytope only grows, so the first tetrahedron's centroid stays inside
    let interior = (points[0].v + points[1].v + points[2].v + points[3].v) * 0.25;
    let mut faces: Vec<Face> = [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]]
        .iter()
        .filter_map(|f| make_face(&points, interior, f[0], f[1], f[2]))
        .collect();
    if faces.is_empty() {
        return None;
    }

    let mut best = faces[0];
    for _ in 0..MAX_ITERATIONS {
        best = *faces
            .iter()
            .min_by(|x, y| x.distance.total_cmp(&y.distance))?;
        let p = support(a, b, best.normal);
        let gain = p.v.dot(best.normal) - best.distance;
        if gain < EPA_TOLERANCE {
            break;
        }

        let new_index = points.len();
        points.push(p);

        // remove faces visible from the new point, keeping their horizon edges
        let mut edges: Vec<(usize, usize)> = Vec::new();
        faces.retain(|f| {
            if f.normal.dot(p.v - points[f.idx[0]].v) > 0.0 {
                for (u, v) in [(f.idx[0], f.idx[1]), (f.idx[1], f.idx[2]), (f.idx[2], f.idx[0])] {
                    if let Some(pos) = edges.iter().position(|&(x, y)| x == v && y == u) {
                        edges.swap_remove(pos);
                    } else {
                        edges.push((u, v));
                    }
                }
                false
            } else {
                true
            }
        });
        for (u, v) in edges {
            if let Some(face) = make_face(&points, interior, u, v, new_index) {
                faces.push(face);
            }
        }
        if faces.is_empty() {
            break;
        }
    }

    // barycentric coordinates of the origin's projection on the closest face
    let [i, j, k] = best.idx;
    let projected = best.normal * best.distance;
    let (u, v, w) = barycentric(projected, points[i].v, points[j].v, points[k].v);
    let point_a = points[i].a * u + points[j].a * v + points[k].a * w;
    let point_b = points[i].b * u + points[j].b * v + points[k].b * w;

    Some(Penetration {
        normal: best.normal,
        depth: best.distance,
        point_a,
        point_b,
    })
}

fn barycentric(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> (f32, f32, f32) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-12 {
        return (1.0, 0.0, 0.0);
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    (1.0 - v - w, v, w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quat;
    use crate::physics::shapes::ColliderShape;

    #[test]
    fn test_separated_spheres() {
        let s = ColliderShape::Sphere { radius: 1.0 };
        let a = ShapeRef::new(&s, Vec3::ZERO, Quat::IDENTITY);
        let b = ShapeRef::new(&s, Vec3::new(3.0, 0.0, 0.0), Quat::IDENTITY);
        assert!(!intersects(&a, &b));
    }

    #[test]
    fn test_hull_penetration() {
        let cube: Vec<Vec3> = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -0.5 } else { 0.5 },
                    if i & 2 == 0 { -0.5 } else { 0.5 },
                    if i & 4 == 0 { -0.5 } else { 0.5 },
                )
            })
            .collect();
        let hull = ColliderShape::ConvexHull { points: cube.into() };
        let a = ShapeRef::new(&hull, Vec3::ZERO, Quat::IDENTITY);
        let b = ShapeRef::new(&hull, Vec3::new(0.0, 0.9, 0.0), Quat::IDENTITY);
        let pen = penetration(&a, &b).expect("overlapping hulls");
        assert!((pen.depth - 0.1).abs() < 1e-3, "{pen:?}");
        assert!(pen.normal.dot(Vec3::Y) > 0.99, "{pen:?}");
    }

    #[test]
    fn test_offset_hulls_report_shallowest_face() {
        let cube: Vec<Vec3> = (0..8)
            .map(|i| Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32) - 0.5)
            .collect();
        let hull = ColliderShape::ConvexHull { points: cube.into() };
        let a = ShapeRef::new(&hull, Vec3::ZERO, Quat::IDENTITY);
        let b = ShapeRef::new(&hull, Vec3::new(0.2, -0.85, -0.1), Quat::IDENTITY);
        let pen = penetration(&a, &b).expect("overlapping hulls");
        assert!((pen.depth - 0.15).abs() < 1e-3, "{pen:?}");
        assert!(pen.normal.dot(Vec3::NEG_Y) > 0.99, "{pen:?}");
        assert!(pen.point_a.y < -0.49 && pen.point_b.y > -0.36, "{pen:?}");
    }

    #[test]
    fn test_sphere_penetration_depth() {
        let s = ColliderShape::Sphere { radius: 1.0 };
        let a = ShapeRef::new(&s, Vec3::ZERO, Quat::IDENTITY);
        let b = ShapeRef::new(&s, Vec3::new(1.5, 0.0, 0.0), Quat::IDENTITY);
        let pen = penetration(&a, &b).expect("overlapping spheres");
        // polytope approximation of a sphere converges from below
        assert!((pen.depth - 0.5).abs() < 0.05, "{pen:?}");
        assert!(pen.normal.x > 0.95);
    }
}
