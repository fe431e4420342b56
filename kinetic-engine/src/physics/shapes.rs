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
//! Collision shapes
//!
//! Shape geometry in collider-local space: bounds, volume, inertia and the
//! support mapping used by GJK/EPA. Capsules are a segment of length `height`
//! along local Y swept by `radius`.

use crate::math::{Aabb, Mat3, Quat, Vec3};
use std::sync::Arc;

/// Shape variants
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    /// Ball
    Sphere {
        /// Radius (m)
        radius: f32,
    },
    /// Oriented box
    Box {
        /// Half extents along local axes (m)
        half_extents: Vec3,
    },
    /// Swept segment along local Y
    Capsule {
        /// Radius (m)
        radius: f32,
        /// Length of the inner segment (m)
        height: f32,
    },
    /// Triangle soup, treated as the convex hull of its vertices
    Mesh {
        /// Vertex positions
        vertices: Arc<[Vec3]>,
    },
    /// Convex point cloud
    ConvexHull {
        /// Hull points
        points: Arc<[Vec3]>,
    },
}

/// Discriminant of a shape, used for dispatch tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    /// `ColliderShape::Sphere`
    Sphere,
    /// `ColliderShape::Box`
    Box,
    /// `ColliderShape::Capsule`
    Capsule,
    /// `ColliderShape::Mesh`
    Mesh,
    /// `ColliderShape::ConvexHull`
    ConvexHull,
}

impl ColliderShape {
    /// Shape discriminant
    pub fn kind(&self) -> ShapeKind {
        match self {
            ColliderShape::Sphere { .. } => ShapeKind::Sphere,
            ColliderShape::Box { .. } => ShapeKind::Box,
            ColliderShape::Capsule { .. } => ShapeKind::Capsule,
            ColliderShape::Mesh { .. } => ShapeKind::Mesh,
            ColliderShape::ConvexHull { .. } => ShapeKind::ConvexHull,
        }
    }

    fn cloud(&self) -> Option<&[Vec3]> {
        match self {
            ColliderShape::Mesh { vertices } => Some(vertices),
            ColliderShape::ConvexHull { points } => Some(points),
            _ => None,
        }
    }

    /// Bounds in shape-local space
    pub fn local_aabb(&self) -> Aabb {
        match self {
            ColliderShape::Sphere { radius } => Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(*radius)),
            ColliderShape::Box { half_extents } => Aabb::from_center_half_extents(Vec3::ZERO, *half_extents),
            ColliderShape::Capsule { radius, height } => Aabb::from_center_half_extents(
                Vec3::ZERO,
                Vec3::new(*radius, radius + height * 0.5, *radius),
            ),
            ColliderShape::Mesh { .. } | ColliderShape::ConvexHull { .. } => {
                let points = self.cloud().unwrap_or(&[]);
                if points.is_empty() {
                    Aabb::default()
                } else {
                    Aabb::from_points(points)
                }
            }
        }
    }

    /// Tight world-space bounds for a shape placed at `position`/`rotation`
    pub fn world_aabb(&self, position: Vec3, rotation: Quat) -> Aabb {
        match self {
            ColliderShape::Sphere { radius } => Aabb::from_center_half_extents(position, Vec3::splat(*radius)),
            ColliderShape::Box { half_extents } => Aabb::from_oriented_box(position, rotation, *half_extents),
            ColliderShape::Capsule { radius, height } => {
                let (a, b) = capsule_segment(position, rotation, *height);
                Aabb::new(a.min(b), a.max(b)).expanded(*radius)
            }
            ColliderShape::Mesh { .. } | ColliderShape::ConvexHull { .. } => {
                let points = self.cloud().unwrap_or(&[]);
                if points.is_empty() {
                    return Aabb::from_center_half_extents(position, Vec3::ZERO);
                }
                points.iter().fold(Aabb::EMPTY, |acc, p| {
                    let w = position + rotation * *p;
                    Aabb::new(acc.min.min(w), acc.max.max(w))
                })
            }
        }
    }

    /// Volume (m³); point clouds use their bounding box
    pub fn volume(&self) -> f32 {
        use std::f32::consts::PI;
        match self {
            ColliderShape::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
            ColliderShape::Box { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
            ColliderShape::Capsule { radius, height } => {
                PI * radius * radius * height + 4.0 / 3.0 * PI * radius.powi(3)
            }
            _ => {
                let s = self.local_aabb().size();
                s.x * s.y * s.z
            }
        }
    }

    /// Inertia tensor about the shape center for the given mass
    pub fn inertia_tensor(&self, mass: f32) -> Mat3 {
        match self {
            ColliderShape::Sphere { radius } => Mat3::from_diagonal(Vec3::splat(0.4 * mass * radius * radius)),
            ColliderShape::Box { half_extents } => box_inertia(mass, *half_extents),
            ColliderShape::Capsule { radius, height } => capsule_inertia(mass, *radius, *height),
            _ => box_inertia(mass, self.local_aabb().half_extents()),
        }
    }

    /// Farthest point along `dir` in shape-local space
    pub fn support(&self, dir: Vec3) -> Vec3 {
        match self {
            ColliderShape::Sphere { radius } => dir.normalize_or_zero() * *radius,
            ColliderShape::Box { half_extents } => Vec3::new(
                half_extents.x.copysign(dir.x),
                half_extents.y.copysign(dir.y),
                half_extents.z.copysign(dir.z),
            ),
            ColliderShape::Capsule { radius, height } => {
                let tip = Vec3::new(0.0, (height * 0.5).copysign(dir.y), 0.0);
                tip + dir.normalize_or_zero() * *radius
            }
            ColliderShape::Mesh { .. } | ColliderShape::ConvexHull { .. } => {
                let points = self.cloud().unwrap_or(&[]);
                points
                    .iter()
                    .copied()
                    .max_by(|a, b| a.dot(dir).total_cmp(&b.dot(dir)))
                    .unwrap_or(Vec3::ZERO)
            }
        }
    }

    /// Smallest full extent; the distance a body may cross before tunneling
    pub fn characteristic_size(&self) -> f32 {
        match self {
            ColliderShape::Sphere { radius } => 2.0 * radius,
            ColliderShape::Capsule { radius, .. } => 2.0 * radius,
            _ => self.local_aabb().size().min_element(),
        }
    }

    /// True when the smallest dimension is under 10% of the largest
    pub fn is_thin(&self) -> bool {
        let size = self.local_aabb().size();
        let largest = size.max_element();
        largest > 0.0 && size.min_element() < 0.1 * largest
    }

    /// Radius of the sphere centered at the origin that encloses the shape
    pub fn bounding_radius(&self) -> f32 {
        match self {
            ColliderShape::Sphere { radius } => *radius,
            ColliderShape::Box { half_extents } => half_extents.length(),
            ColliderShape::Capsule { radius, height } => radius + height * 0.5,
            _ => self
                .cloud()
                .unwrap_or(&[])
                .iter()
                .map(|p| p.length())
                .fold(0.0, f32::max),
        }
    }
}

/// World-space endpoints of a capsule's inner segment
pub fn capsule_segment(center: Vec3, rotation: Quat, height: f32) -> (Vec3, Vec3) {
    let axis = rotation * Vec3::Y * (height * 0.5);
    (center - axis, center + axis)
}

fn box_inertia(mass: f32, h: Vec3) -> Mat3 {
    let (x2, y2, z2) = (h.x * h.x, h.y * h.y, h.z * h.z);
    Mat3::from_diagonal(Vec3::new(
        mass / 3.0 * (y2 + z2),
        mass / 3.0 * (x2 + z2),
        mass / 3.0 * (x2 + y2),
    ))
}

fn capsule_inertia(mass: f32, radius: f32, height: f32) -> Mat3 {
    use std::f32::consts::PI;
    let r2 = radius * radius;
    let cyl_volume = PI * r2 * height;
    let sphere_volume = 4.0 / 3.0 * PI * r2 * radius;
    let total = cyl_volume + sphere_volume;
    if total <= 0.0 {
        return Mat3::ZERO;
    }
    let m_cyl = mass * cyl_volume / total;
    let m_caps = mass * sphere_volume / total;

    let axial = m_cyl * r2 * 0.5 + m_caps * 0.4 * r2;
    // hemispheres sit at ±height/2 with their centroids 3r/8 further out
    let hh = height * 0.5;
    let transverse = m_cyl * (r2 / 4.0 + height * height / 12.0)
        + m_caps * (0.4 * r2 + hh * hh + 0.75 * hh * radius);
    Mat3::from_diagonal(Vec3::new(transverse, axial, transverse))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_inertia() {
        let shape = ColliderShape::Sphere { radius: 1.0 };
        let i = shape.inertia_tensor(5.0);
        assert!((i.x_axis.x - 2.0).abs() < 1e-6);
        assert!((shape.volume() - 4.18879).abs() < 1e-4);
    }

    #[test]
    fn test_box_inertia_cube() {
        // unit cube, mass 6 -> I = m s² / 6 = 1
        let shape = ColliderShape::Box { half_extents: Vec3::splat(0.5) };
        let i = shape.inertia_tensor(6.0);
        assert!((i.x_axis.x - 1.0).abs() < 1e-6);
        assert!((i.z_axis.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_capsule_bounds_and_support() {
        let shape = ColliderShape::Capsule { radius: 0.5, height: 2.0 };
        let aabb = shape.local_aabb();
        assert_eq!(aabb.max, Vec3::new(0.5, 1.5, 0.5));
        assert_eq!(shape.support(Vec3::Y), Vec3::new(0.0, 1.5, 0.0));

        let rotated = shape.world_aabb(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        assert!((rotated.max.x - 1.5).abs() < 1e-5);
        assert!((rotated.max.y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_hull_support() {
        let points: Arc<[Vec3]> = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z].into();
        let shape = ColliderShape::ConvexHull { points };
        assert_eq!(shape.support(Vec3::new(1.0, 0.1, 0.0)), Vec3::X);
        assert_eq!(shape.kind(), ShapeKind::ConvexHull);
    }

    #[test]
    fn test_thin_detection() {
        assert!(ColliderShape::Box { half_extents: Vec3::new(5.0, 0.05, 5.0) }.is_thin());
        assert!(!ColliderShape::Box { half_extents: Vec3::splat(0.5) }.is_thin());
        assert!(!ColliderShape::Sphere { radius: 0.1 }.is_thin());
    }
}
