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
//! Warm-start cache of contact impulses keyed by body pair

use crate::ecs::EntityId;
use crate::physics::contact::{ContactManifold, MAX_CONTACTS};
use std::collections::HashMap;

/// Stable key of an unordered pair: lower index in the high word
pub fn pair_key(a: EntityId, b: EntityId) -> u64 {
    let (lo, hi) = if a.index() <= b.index() {
        (a.index(), b.index())
    } else {
        (b.index(), a.index())
    };
    (u64::from(lo) << 32) | u64::from(hi)
}

/// Impulses of one contact point from the previous step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CachedContact {
    /// Anchor in body A's frame
    pub local_a: crate::math::Vec3,
    /// Anchor in body B's frame
    pub local_b: crate::math::Vec3,
    /// Accumulated normal impulse
    pub normal_impulse: f32,
    /// Accumulated friction impulses
    pub tangent_impulse: [f32; 2],
}

impl CachedContact {
    fn magnitude(&self) -> f32 {
        let [t1, t2] = self.tangent_impulse;
        (self.normal_impulse * self.normal_impulse + t1 * t1 + t2 * t2).sqrt()
    }
}

/// Per-pair impulse memory
#[derive(Debug, Default)]
pub struct ContactCache {
    entries: HashMap<u64, Vec<CachedContact>>,
}

impl ContactCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every pair
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop every pair involving `entity`
    ///
    /// Keys only carry entity indices, so this runs when an entity loses its
    /// body or collider before the index can be recycled.
    pub fn forget(&mut self, entity: EntityId) -> usize {
        let index = u64::from(entity.index());
        let before = self.entries.len();
        self.entries.retain(|key, _| key >> 32 != index && key & 0xFFFF_FFFF != index);
        before - self.entries.len()
    }

    /// Cached points of a pair
    pub fn get(&self, a: EntityId, b: EntityId) -> Option<&[CachedContact]> {
        self.entries.get(&pair_key(a, b)).map(Vec::as_slice)
    }

    /// Seed the manifold's impulses from the previous step
    ///
    /// Each point takes the unused cached point with the smallest summed
    /// squared anchor distance below `threshold`, scaled by `decay`. Entries
    /// whose magnitude exceeds `bound` are ignored. Returns the number of
    /// matched points.
    pub fn warm_start(&self, manifold: &mut ContactManifold, threshold: f32, decay: f32, bound: f32) -> usize {
        let Some(cached) = self.entries.get(&pair_key(manifold.entity_a, manifold.entity_b)) else {
            return 0;
        };
        let mut used = [false; MAX_CONTACTS];
        let mut matched = 0;
        for point in manifold.points_mut() {
            let best = cached
                .iter()
                .enumerate()
                .filter(|(k, c)| !used[*k] && c.magnitude() <= bound)
                .map(|(k, c)| {
                    let d = (c.local_a - point.local_point_a).length_squared()
                        + (c.local_b - point.local_point_b).length_squared();
                    (k, d)
                })
                .filter(|(_, d)| *d < threshold)
                .min_by(|x, y| x.1.total_cmp(&y.1));
            if let Some((k, _)) = best {
                used[k] = true;
                point.normal_impulse = cached[k].normal_impulse * decay;
                point.tangent_impulse = cached[k].tangent_impulse.map(|t| t * decay);
                matched += 1;
            } else {
                point.normal_impulse = 0.0;
                point.tangent_impulse = [0.0; 2];
            }
        }
        matched
    }

    /// Replace the cache with the impulses of this step's manifolds
    ///
    /// Pairs not present in `manifolds` are dropped, as are points whose
    /// impulse magnitude exceeds `bound`.
    pub fn store<'a>(&mut self, manifolds: impl IntoIterator<Item = &'a ContactManifold>, bound: f32) {
        self.entries.clear();
        for manifold in manifolds {
            if manifold.is_trigger || manifold.is_empty() {
                continue;
            }
            let points: Vec<CachedContact> = manifold
                .points()
                .iter()
                .map(|p| CachedContact {
                    local_a: p.local_point_a,
                    local_b: p.local_point_b,
                    normal_impulse: p.normal_impulse,
                    tangent_impulse: p.tangent_impulse,
                })
                .filter(|c| c.magnitude() <= bound && c.normal_impulse.is_finite())
                .collect();
            if !points.is_empty() {
                self.entries
                    .insert(pair_key(manifold.entity_a, manifold.entity_b), points);
            }
        }
    }

    /// Largest cached impulse magnitude
    pub fn max_magnitude(&self) -> f32 {
        self.entries
            .values()
            .flatten()
            .map(CachedContact::magnitude)
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    fn manifold_with(local: Vec3, impulse: f32) -> ContactManifold {
        let mut m = ContactManifold::new(EntityId::new(2, 0), EntityId::new(7, 1));
        m.add_point(Vec3::ZERO, 0.01);
        let p = &mut m.points_mut()[0];
        p.local_point_a = local;
        p.local_point_b = local;
        p.normal_impulse = impulse;
        m
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        let a = EntityId::new(3, 0);
        let b = EntityId::new(9, 4);
        assert_eq!(pair_key(a, b), pair_key(b, a));
        assert_eq!(pair_key(a, b), (3u64 << 32) | 9);
    }

    #[test]
    fn test_warm_start_matches_nearby_points() {
        let mut cache = ContactCache::new();
        cache.store([&manifold_with(Vec3::X, 2.0)], 1e4);

        let mut next = manifold_with(Vec3::new(1.01, 0.0, 0.0), 0.0);
        assert_eq!(cache.warm_start(&mut next, 1e-2, 0.95, 1e4), 1);
        assert!((next.points()[0].normal_impulse - 1.9).abs() < 1e-6);

        let mut far = manifold_with(Vec3::new(2.0, 0.0, 0.0), 0.0);
        assert_eq!(cache.warm_start(&mut far, 1e-2, 0.95, 1e4), 0);
        assert_eq!(far.points()[0].normal_impulse, 0.0);
    }

    #[test]
    fn test_store_discards_out_of_bound_entries() {
        let mut cache = ContactCache::new();
        cache.store([&manifold_with(Vec3::X, 5e4)], 1e4);
        assert!(cache.is_empty());
        cache.store([&manifold_with(Vec3::X, 50.0)], 1e4);
        assert!(cache.max_magnitude() <= 1e4);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_forget_evicts_pairs_of_entity() {
        let mut cache = ContactCache::new();
        let mut other = manifold_with(Vec3::X, 1.0);
        other.entity_a = EntityId::new(4, 0);
        other.entity_b = EntityId::new(5, 0);
        cache.store([&manifold_with(Vec3::X, 1.0), &other], 1e4);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.forget(EntityId::new(7, 3)), 1);
        assert!(cache.get(EntityId::new(2, 0), EntityId::new(7, 1)).is_none());
        assert!(cache.get(EntityId::new(4, 0), EntityId::new(5, 0)).is_some());
    }
}
