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
//! Broad phase
//!
//! Cheap AABB culling that turns N bodies into candidate pairs. Two
//! structures are provided: a uniform spatial hash and a median-split BVH
//! rebuilt every step. Both emit each unordered pair at most once, sorted.

use crate::config::{BroadPhaseType, PhysicsConfig};
use crate::math::{Aabb, Vec3};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Entries spanning more cells than this skip the grid
pub const MAX_CELLS_PER_ENTRY: i64 = 4096;

type CellKey = (i32, i32, i32);

/// Candidate pair of entry ids, `a < b`
pub type Pair = (usize, usize);

/// Uniform grid keyed by integer cell coordinates
#[derive(Debug)]
pub struct SpatialHash {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<usize>>,
    oversized: Vec<usize>,
    entries: Vec<(usize, Aabb)>,
    slots: HashMap<usize, usize>,
}

impl SpatialHash {
    /// Create a new hash with the given cell edge length
    pub fn new(cell_size: f32) -> Self {
        SpatialHash {
            cell_size: if cell_size > 0.0 { cell_size } else { 1.0 },
            cells: HashMap::new(),
            oversized: Vec::new(),
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Cell edge length
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_of(&self, p: Vec3) -> CellKey {
        let c = (p / self.cell_size).floor();
        (c.x as i32, c.y as i32, c.z as i32)
    }

    /// Clear the grid and insert every entry into each cell its box overlaps
    pub fn update(&mut self, entries: &[(usize, Aabb)]) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.oversized.clear();
        self.entries.clear();
        self.slots.clear();

        for &(id, aabb) in entries {
            if !aabb.is_valid() {
                warn!(entry = id, "skipping non-finite bounds in broad phase");
                continue;
            }
            self.slots.insert(id, self.entries.len());
            self.entries.push((id, aabb));

            let lo = self.cell_of(aabb.min);
            let hi = self.cell_of(aabb.max);
            let span = (hi.0 as i64 - lo.0 as i64 + 1)
                * (hi.1 as i64 - lo.1 as i64 + 1)
                * (hi.2 as i64 - lo.2 as i64 + 1);
            if span > MAX_CELLS_PER_ENTRY {
                self.oversized.push(id);
                continue;
            }
            for x in lo.0..=hi.0 {
                for y in lo.1..=hi.1 {
                    for z in lo.2..=hi.2 {
                        self.cells.entry((x, y, z)).or_default().push(id);
                    }
                }
            }
        }
        self.cells.retain(|_, bucket| !bucket.is_empty());
    }

    fn aabb(&self, id: usize) -> Option<&Aabb> {
        self.slots.get(&id).map(|&slot| &self.entries[slot].1)
    }

    /// Enumerate overlapping pairs, each at most once, sorted
    pub fn detect_pairs(&self, out: &mut Vec<Pair>) {
        out.clear();
        let mut seen: HashSet<Pair> = HashSet::new();
        let mut push = |a: usize, b: usize, out: &mut Vec<Pair>| {
            let key = if a < b { (a, b) } else { (b, a) };
            if a != b && seen.insert(key) {
                if let (Some(x), Some(y)) = (self.aabb(a), self.aabb(b)) {
                    if x.intersects(y) {
                        out.push(key);
                    }
                }
            }
        };

        for bucket in self.cells.values() {
            for i in 0..bucket.len() {
                for j in (i + 1)..bucket.len() {
                    push(bucket[i], bucket[j], out);
                }
            }
        }
        for &big in &self.oversized {
            for &(other, _) in &self.entries {
                push(big, other, out);
            }
        }
        out.sort_unstable();
    }

    /// Number of occupied cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Number of entries that bypass the grid
    pub fn oversized_count(&self) -> usize {
        self.oversized.len()
    }
}

#[derive(Debug, Clone, Copy)]
enum BvhNode {
    Leaf { aabb: Aabb, entry: usize },
    Branch { aabb: Aabb, left: usize, right: usize },
}

impl BvhNode {
    fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { aabb, .. } | BvhNode::Branch { aabb, .. } => aabb,
        }
    }
}

/// Median-split bounding volume hierarchy
#[derive(Debug, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    entries: Vec<(usize, Aabb)>,
    root: Option<usize>,
}

impl Bvh {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the tree from scratch
    pub fn update(&mut self, entries: &[(usize, Aabb)]) {
        self.nodes.clear();
        self.entries.clear();
        self.entries
            .extend(entries.iter().copied().filter(|(_, aabb)| aabb.is_valid()));
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        self.root = if order.is_empty() {
            None
        } else {
            Some(self.build(&mut order))
        };
    }

    fn build(&mut self, order: &mut [usize]) -> usize {
        if order.len() == 1 {
            let (_, aabb) = self.entries[order[0]];
            self.nodes.push(BvhNode::Leaf { aabb, entry: order[0] });
            return self.nodes.len() - 1;
        }

        let bounds = order
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| acc.merge(&self.entries[i].1));
        let size = bounds.size();
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        };
        let entries = &self.entries;
        order.sort_unstable_by(|&a, &b| entries[a].1.center()[axis].total_cmp(&entries[b].1.center()[axis]));

        let mid = order.len() / 2;
        let (lo, hi) = order.split_at_mut(mid);
        let left = self.build(lo);
        let right = self.build(hi);
        self.nodes.push(BvhNode::Branch {
            aabb: bounds,
            left,
            right,
        });
        self.nodes.len() - 1
    }

    fn query(&self, node: usize, aabb: &Aabb, mut visit: impl FnMut(usize)) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let current = &self.nodes[n];
            if !current.aabb().intersects(aabb) {
                continue;
            }
            match *current {
                BvhNode::Leaf { entry, .. } => visit(entry),
                BvhNode::Branch { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    /// Enumerate overlapping pairs, each at most once, sorted
    pub fn detect_pairs(&self, out: &mut Vec<Pair>) {
        out.clear();
        let Some(root) = self.root else {
            return;
        };
        for (slot, (id, aabb)) in self.entries.iter().enumerate() {
            self.query(root, aabb, |other| {
                if other > slot {
                    let other_id = self.entries[other].0;
                    out.push(if *id < other_id { (*id, other_id) } else { (other_id, *id) });
                }
            });
        }
        out.sort_unstable();
        out.dedup();
    }

    /// Overlaps of an arbitrary box
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<usize> {
        let mut hits = Vec::new();
        if let Some(root) = self.root {
            self.query(root, aabb, |slot| hits.push(self.entries[slot].0));
        }
        hits.sort_unstable();
        hits
    }
}

/// Broad-phase selected from configuration
#[derive(Debug)]
pub enum BroadPhase {
    /// Uniform grid
    SpatialHash(SpatialHash),
    /// Bounding volume hierarchy
    Bvh(Bvh),
}

impl BroadPhase {
    /// Build the structure named by the configuration
    pub fn from_config(config: &PhysicsConfig) -> Self {
        match config.broad_phase_type {
            BroadPhaseType::SpatialHash => BroadPhase::SpatialHash(SpatialHash::new(config.spatial_hash_cell_size)),
            BroadPhaseType::Bvh => BroadPhase::Bvh(Bvh::new()),
            BroadPhaseType::Octree => {
                warn!("octree broad phase is served by the BVH");
                BroadPhase::Bvh(Bvh::new())
            }
        }
    }

    /// Replace the entry set
    pub fn update(&mut self, entries: &[(usize, Aabb)]) {
        match self {
            BroadPhase::SpatialHash(h) => h.update(entries),
            BroadPhase::Bvh(b) => b.update(entries),
        }
    }

    /// Enumerate overlapping pairs
    pub fn detect_pairs(&self, out: &mut Vec<Pair>) {
        match self {
            BroadPhase::SpatialHash(h) => h.detect_pairs(out),
            BroadPhase::Bvh(b) => b.detect_pairs(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(center: Vec3, half: f32) -> Aabb {
        Aabb::from_center_half_extents(center, Vec3::splat(half))
    }

    fn entries() -> Vec<(usize, Aabb)> {
        vec![
            (0, cube(Vec3::ZERO, 1.0)),
            (1, cube(Vec3::new(1.5, 0.0, 0.0), 1.0)),
            (2, cube(Vec3::new(20.0, 0.0, 0.0), 1.0)),
            (3, cube(Vec3::new(0.0, 1.5, 0.0), 1.0)),
        ]
    }

    #[test]
    fn test_spatial_hash_pairs_are_unique() {
        // small cells so both boxes share many cells
        let mut hash = SpatialHash::new(0.5);
        hash.update(&entries());
        let mut pairs = Vec::new();
        hash.detect_pairs(&mut pairs);
        assert_eq!(pairs, vec![(0, 1), (0, 3), (1, 3)]);
    }

    #[test]
    fn test_oversized_entry_bypasses_grid() {
        let mut hash = SpatialHash::new(0.5);
        let mut list = entries();
        list.push((4, Aabb::new(Vec3::splat(-50.0), Vec3::splat(50.0))));
        hash.update(&list);
        assert_eq!(hash.oversized_count(), 1);

        let mut pairs = Vec::new();
        hash.detect_pairs(&mut pairs);
        for id in 0..4 {
            assert!(pairs.contains(&(id, 4)));
        }
    }

    #[test]
    fn test_bvh_matches_hash() {
        let mut bvh = Bvh::new();
        bvh.update(&entries());
        let mut pairs = Vec::new();
        bvh.detect_pairs(&mut pairs);
        assert_eq!(pairs, vec![(0, 1), (0, 3), (1, 3)]);
        assert_eq!(bvh.query_aabb(&cube(Vec3::new(20.0, 0.0, 0.0), 0.1)), vec![2]);
    }

    #[test]
    fn test_octree_falls_back_to_bvh() {
        let config = PhysicsConfig {
            broad_phase_type: BroadPhaseType::Octree,
            ..Default::default()
        };
        assert!(matches!(BroadPhase::from_config(&config), BroadPhase::Bvh(_)));
    }
}
