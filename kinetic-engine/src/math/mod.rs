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
//! Math kernel
//!
//! Vectors, quaternions and matrices come from `glam` (single precision).
//! This module adds the axis-aligned bounding box and the handful of
//! helpers the physics pipeline needs on top of glam.

mod aabb;

pub use aabb::Aabb;
pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec3, Vec4};

/// Tolerance used for unit-length checks on quaternions and normals
pub const NORMALIZE_EPSILON: f32 = 1e-5;

/// Build a quaternion from XYZ Euler angles (radians, applied X then Y then Z)
pub fn quat_from_euler(euler: Vec3) -> Quat {
    Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z)
}

/// Decompose a quaternion into XYZ Euler angles (radians)
pub fn quat_to_euler(q: Quat) -> Vec3 {
    let (x, y, z) = q.to_euler(EulerRot::XYZ);
    Vec3::new(x, y, z)
}

/// Integrate an orientation by angular velocity over `dt`
///
/// Applies the exact exponential map `exp(½ω·dt)` and renormalizes.
pub fn integrate_rotation(q: Quat, omega: Vec3, dt: f32) -> Quat {
    let angle = omega.length() * dt;
    if angle <= f32::EPSILON {
        return q.normalize();
    }
    let axis = omega / omega.length();
    (Quat::from_axis_angle(axis, angle) * q).normalize()
}

/// Rotation vector (axis × angle) of the shortest arc represented by `q`
pub fn rotation_vector(q: Quat) -> Vec3 {
    // q and -q encode the same rotation; pick the short way round
    let q = if q.w < 0.0 { -q } else { q };
    let (axis, angle) = q.to_axis_angle();
    if angle.abs() <= f32::EPSILON || !axis.is_finite() {
        Vec3::ZERO
    } else {
        axis * angle
    }
}

/// Rotate a body-local inertia tensor into world space: R·I·Rᵀ
pub fn world_inertia(rotation: Quat, local: Mat3) -> Mat3 {
    let r = Mat3::from_quat(rotation);
    r * local * r.transpose()
}

/// Two unit vectors completing `n` to an orthonormal basis
///
/// Crosses with X first and falls back to Y when `n` is nearly parallel to X.
pub fn tangent_basis(n: Vec3) -> (Vec3, Vec3) {
    let mut t1 = n.cross(Vec3::X);
    if t1.length_squared() < 1e-6 {
        t1 = n.cross(Vec3::Y);
    }
    let t1 = t1.normalize();
    let t2 = n.cross(t1);
    (t1, t2)
}

/// Closest point to `p` on segment `[a, b]`
pub fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest points between segments `[p1, q1]` and `[p2, q2]`
///
/// Returns `(s, t, c1, c2)` with the segment parameters and points.
pub fn closest_points_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (f32, f32, Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    let (s, t);
    if a <= f32::EPSILON && e <= f32::EPSILON {
        return (0.0, 0.0, p1, p2);
    }
    if a <= f32::EPSILON {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(r);
        if e <= f32::EPSILON {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s0 = if denom > f32::EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t0 = (b * s0 + f) / e;
            if t0 < 0.0 {
                t0 = 0.0;
                s0 = (-c / a).clamp(0.0, 1.0);
            } else if t0 > 1.0 {
                t0 = 1.0;
                s0 = ((b - c) / a).clamp(0.0, 1.0);
            }
            s = s0;
            t = t0;
        }
    }
    (s, t, p1 + d1 * s, p2 + d2 * t)
}

/// Replace non-finite components with zero, reporting whether any were found
pub fn sanitize(v: &mut Vec3) -> bool {
    if v.is_finite() {
        return false;
    }
    *v = Vec3::new(finite_or_zero(v.x), finite_or_zero(v.y), finite_or_zero(v.z));
    true
}

fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}
