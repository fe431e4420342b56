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
//! Render queue: layers, sorting and batching
//!
//! Renderables are bucketed by layer. Layers draw in ascending id order and
//! each sorts its bucket by its own policy:
//!
//! - `MaterialFirst` groups by material then mesh, which minimizes state
//!   changes for opaque geometry
//! - `BackToFront` sorts by descending camera distance for blending
//! - `FrontToBack` sorts by ascending camera distance for early depth reject
//!
//! After sorting, runs of renderables that share mesh and material collapse
//! into one instanced draw.

use crate::math::{Mat4, Vec3};
use crate::render::backend::DrawCall;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Mesh resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// Material resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub u32);

/// Layer id; lower draws first
pub type LayerId = u32;

/// Layer for opaque world geometry
pub const OPAQUE_LAYER: LayerId = 0;
/// Layer for blended geometry
pub const TRANSPARENT_LAYER: LayerId = 100;
/// Layer for overlays
pub const OVERLAY_LAYER: LayerId = 1000;

/// Ordering inside a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortPolicy {
    /// Group by material, then mesh
    MaterialFirst,
    /// Far to near
    BackToFront,
    /// Near to far
    FrontToBack,
}

/// A layer and its state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLayer {
    /// Id
    pub id: LayerId,
    /// Sort policy
    pub sort: SortPolicy,
    /// Disabled layers drop their renderables
    pub enabled: bool,
}

/// One object submitted for drawing
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    /// Mesh
    pub mesh: MeshHandle,
    /// Material
    pub material: MaterialHandle,
    /// World matrix
    pub transform: Mat4,
    /// Target layer
    pub layer: LayerId,
    /// Triangle count of the mesh
    pub triangles: u32,
}

impl Renderable {
    /// Renderable on the opaque layer
    pub fn new(mesh: MeshHandle, material: MaterialHandle, transform: Mat4, triangles: u32) -> Self {
        Renderable {
            mesh,
            material,
            transform,
            layer: OPAQUE_LAYER,
            triangles,
        }
    }

    /// Builder: target layer
    pub fn on_layer(mut self, layer: LayerId) -> Self {
        self.layer = layer;
        self
    }

    fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

/// Layered queue of renderables for one frame
#[derive(Debug)]
pub struct RenderQueue {
    layers: BTreeMap<LayerId, RenderLayer>,
    buckets: BTreeMap<LayerId, Vec<Renderable>>,
}

impl Default for RenderQueue {
    fn default() -> Self {
        let mut queue = RenderQueue {
            layers: BTreeMap::new(),
            buckets: BTreeMap::new(),
        };
        queue.add_layer(OPAQUE_LAYER, SortPolicy::MaterialFirst);
        queue.add_layer(TRANSPARENT_LAYER, SortPolicy::BackToFront);
        queue.add_layer(OVERLAY_LAYER, SortPolicy::FrontToBack);
        queue
    }
}

impl RenderQueue {
    /// Queue with the opaque, transparent and overlay layers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or redefine a layer
    pub fn add_layer(&mut self, id: LayerId, sort: SortPolicy) {
        self.layers.insert(
            id,
            RenderLayer {
                id,
                sort,
                enabled: true,
            },
        );
    }

    /// Enable or disable a layer; false if it does not exist
    pub fn set_layer_enabled(&mut self, id: LayerId, enabled: bool) -> bool {
        match self.layers.get_mut(&id) {
            Some(layer) => {
                layer.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Layer definition
    pub fn layer(&self, id: LayerId) -> Option<&RenderLayer> {
        self.layers.get(&id)
    }

    /// Queue a renderable; false if its layer is unknown
    pub fn push(&mut self, renderable: Renderable) -> bool {
        if !self.layers.contains_key(&renderable.layer) {
            return false;
        }
        self.buckets.entry(renderable.layer).or_default().push(renderable);
        true
    }

    /// Renderables waiting for the next flush
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// Sort every layer, batch it and empty the queue
    ///
    /// Disabled layers are discarded. With `batching` off every renderable
    /// becomes its own draw.
    pub fn drain_sorted(&mut self, camera: Vec3, batching: bool) -> Vec<DrawCall> {
        let mut draws: Vec<DrawCall> = Vec::new();
        for (id, mut bucket) in std::mem::take(&mut self.buckets) {
            let Some(layer) = self.layers.get(&id) else {
                continue;
            };
            if !layer.enabled {
                continue;
            }
            sort_bucket(&mut bucket, layer.sort, camera);
            // batches never span layers
            let start = draws.len();
            for r in bucket {
                let merge = batching
                    && draws[start..]
                        .last()
                        .is_some_and(|d| d.mesh == r.mesh && d.material == r.material);
                if let (true, Some(draw)) = (merge, draws.last_mut()) {
                    draw.instances.push(r.transform);
                    draw.triangles += u64::from(r.triangles);
                    continue;
                }
                draws.push(DrawCall {
                    mesh: r.mesh,
                    material: r.material,
                    instances: vec![r.transform],
                    triangles: u64::from(r.triangles),
                });
            }
        }
        draws
    }
}

fn sort_bucket(bucket: &mut [Renderable], policy: SortPolicy, camera: Vec3) {
    let distance = |r: &Renderable| r.position().distance_squared(camera);
    match policy {
        SortPolicy::MaterialFirst => bucket.sort_by_key(|r| (r.material, r.mesh)),
        SortPolicy::BackToFront => {
            bucket.sort_by(|a, b| distance(b).partial_cmp(&distance(a)).unwrap_or(Ordering::Equal))
        }
        SortPolicy::FrontToBack => {
            bucket.sort_by(|a, b| distance(a).partial_cmp(&distance(b)).unwrap_or(Ordering::Equal))
        }
    }
}
