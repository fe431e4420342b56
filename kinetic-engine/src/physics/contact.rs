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
//! Contact manifolds

use crate::ecs::EntityId;
use crate::math::{Quat, Vec3};

/// Maximum contact points per manifold
pub const MAX_CONTACTS: usize = 4;

/// One contact point
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactPoint {
    /// World position (midway between the two surfaces)
    pub position: Vec3,
    /// Position in body A's local frame
    pub local_point_a: Vec3,
    /// Position in body B's local frame
    pub local_point_b: Vec3,
    /// Penetration depth (m), non-negative
    pub penetration: f32,
    /// Accumulated normal impulse from the last solve
    pub normal_impulse: f32,
    /// Accumulated friction impulses from the last solve
    pub tangent_impulse: [f32; 2],
}

/// Contact set between two colliders sharing one normal
///
/// The normal points from A to B and is unit length. `penetration` is the
/// maximum over the points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactManifold {
    /// First body (lower entity index)
    pub entity_a: EntityId,
    /// Second body
    pub entity_b: EntityId,
    /// Unit normal from A to B
    pub normal: Vec3,
    /// Maximum penetration
    pub penetration: f32,
    points: [ContactPoint; MAX_CONTACTS],
    count: usize,
    /// Either side is a trigger; no response is computed
    pub is_trigger: bool,
    /// Combined friction coefficient
    pub friction: f32,
    /// Combined restitution
    pub restitution: f32,
}

impl ContactManifold {
    /// Empty manifold between two entities
    pub fn new(entity_a: EntityId, entity_b: EntityId) -> Self {
        ContactManifold {
            entity_a,
            entity_b,
            normal: Vec3::Y,
            penetration: 0.0,
            points: [ContactPoint::default(); MAX_CONTACTS],
            count: 0,
            is_trigger: false,
            friction: 0.0,
            restitution: 0.0,
        }
    }

    /// Active contact points
    pub fn points(&self) -> &[ContactPoint] {
        &self.points[..self.count]
    }

    /// Active contact points, mutable
    pub fn points_mut(&mut self) -> &mut [ContactPoint] {
        &mut self.points[..self.count]
    }

    /// Number of contact points
    pub fn contact_count(&self) -> usize {
        self.count
    }

    /// True when there are no points
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add a world-space point; beyond four points the set is reduced by area
    pub fn add_point(&mut self, position: Vec3, penetration: f32) {
        let penetration = penetration.max(0.0);
        let point = ContactPoint {
            position,
            penetration,
            ..Default::default()
        };
        if self.count < MAX_CONTACTS {
            self.points[self.count] = point;
            self.count += 1;
        } else {
            let mut candidates = [point; MAX_CONTACTS + 1];
            candidates[..MAX_CONTACTS].copy_from_slice(&self.points);
            let kept = reduce_contacts(&candidates, self.normal);
            for (slot, idx) in kept.iter().enumerate() {
                self.points[slot] = candidates[*idx];
            }
        }
        self.penetration = self.points().iter().map(|p| p.penetration).fold(0.0, f32::max);
    }

    /// Drop all points
    pub fn clear(&mut self) {
        self.count = 0;
        self.penetration = 0.0;
    }

    /// Swap the roles of A and B
    pub fn flip(&mut self) {
        std::mem::swap(&mut self.entity_a, &mut self.entity_b);
        self.normal = -self.normal;
        for p in self.points_mut() {
            std::mem::swap(&mut p.local_point_a, &mut p.local_point_b);
        }
    }

    /// Fill local points from the body poses
    pub fn compute_local_points(&mut self, pos_a: Vec3, rot_a: Quat, pos_b: Vec3, rot_b: Quat) {
        let (inv_a, inv_b) = (rot_a.inverse(), rot_b.inverse());
        for p in self.points_mut() {
            p.local_point_a = inv_a * (p.position - pos_a);
            p.local_point_b = inv_b * (p.position - pos_b);
        }
    }

    /// Check the documented invariants (unit normal, point count, depth bound)
    pub fn is_well_formed(&self) -> bool {
        (self.normal.length() - 1.0).abs() < 1e-3
            && self.count <= MAX_CONTACTS
            && self.points().iter().all(|p| p.penetration <= self.penetration + 1e-6)
    }
}

/// Pick four of `points` maximizing the covered area
///
/// Keeps the deepest point, the point farthest from it, the point forming
/// the largest triangle with those two, and the point adding the most area
/// on the far side of that triangle.
pub fn reduce_contacts(points: &[ContactPoint], normal: Vec3) -> [usize; MAX_CONTACTS] {
    debug_assert!(points.len() >= MAX_CONTACTS);
    let deepest = (0..points.len())
        .max_by(|&i, &j| points[i].penetration.total_cmp(&points[j].penetration))
        .unwrap_or(0);

    let p0 = points[deepest].position;
    let second = (0..points.len())
        .filter(|&i| i != deepest)
        .max_by(|&i, &j| {
            (points[i].position - p0)
                .length_squared()
                .total_cmp(&(points[j].position - p0).length_squared())
        })
        .unwrap_or(1);

    let p1 = points[second].position;
    let area = |a: Vec3, b: Vec3, c: Vec3| (b - a).cross(c - a).dot(normal);
    let third = (0..points.len())
        .filter(|&i| i != deepest && i != second)
        .max_by(|&i, &j| {
            area(p0, p1, points[i].position)
                .abs()
                .total_cmp(&area(p0, p1, points[j].position).abs())
        })
        .unwrap_or(2);

    let p2 = points[third].position;
    // the fourth point goes opposite the winding of the first triangle
    let winding = area(p0, p1, p2).signum();
    let fourth = (0..points.len())
        .filter(|&i| i != deepest && i != second && i != third)
        .max_by(|&i, &j| {
            let score = |k: usize| {
                let q = points[k].position;
                (-winding * area(p0, p1, q))
                    .max(-winding * area(p1, p2, q))
                    .max(-winding * area(p2, p0, q))
            };
            score(i).total_cmp(&score(j))
        })
        .unwrap_or(3);

    [deepest, second, third, fourth]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifold() -> ContactManifold {
        ContactManifold::new(EntityId::new(0, 0), EntityId::new(1, 0))
    }

    #[test]
    fn test_penetration_tracks_max() {
        let mut m = manifold();
        m.add_point(Vec3::ZERO, 0.1);
        m.add_point(Vec3::X, 0.3);
        assert_eq!(m.contact_count(), 2);
        assert_eq!(m.penetration, 0.3);
        assert!(m.is_well_formed());
    }

    #[test]
    fn test_reduction_keeps_corners() {
        let mut m = manifold();
        // square corners plus interior points
        m.add_point(Vec3::new(0.1, 0.0, 0.1), 0.05);
        m.add_point(Vec3::new(-1.0, 0.0, -1.0), 0.2);
        m.add_point(Vec3::new(1.0, 0.0, -1.0), 0.1);
        m.add_point(Vec3::new(-0.1, 0.0, 0.0), 0.05);
        m.add_point(Vec3::new(1.0, 0.0, 1.0), 0.1);
        m.add_point(Vec3::new(-1.0, 0.0, 1.0), 0.1);

        assert_eq!(m.contact_count(), MAX_CONTACTS);
        for p in m.points() {
            assert!(p.position.x.abs() > 0.9 && p.position.z.abs() > 0.9, "{p:?}");
        }
        assert_eq!(m.penetration, 0.2);
    }

    #[test]
    fn test_flip() {
        let mut m = manifold();
        m.normal = Vec3::Y;
        m.add_point(Vec3::ZERO, 0.1);
        m.points_mut()[0].local_point_a = Vec3::X;
        m.flip();
        assert_eq!(m.entity_a, EntityId::new(1, 0));
        assert_eq!(m.normal, Vec3::NEG_Y);
        assert_eq!(m.points()[0].local_point_b, Vec3::X);
    }
}
