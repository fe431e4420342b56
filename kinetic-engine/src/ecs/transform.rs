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
//! Transform hierarchy
//!
//! World matrices are the product of the parent chain's local matrices.
//! `TransformSystem` refreshes the cached matrix of every transform once per
//! frame; `world_matrix` resolves a single entity on demand.

use crate::ecs::components::Transform;
use crate::ecs::{priorities, ComponentRegistry, EntityId, System, World};
use crate::error::Result;
use crate::math::Mat4;
use std::collections::HashMap;
use tracing::warn;

/// Resolve the world matrix of one entity by walking its parent chain
///
/// A parent that no longer has a transform ends the chain. Cycles are broken
/// at the first repeated entity.
pub fn world_matrix(registry: &ComponentRegistry, id: EntityId) -> Option<Mat4> {
    let mut matrix = registry.with_component(id, |t: &Transform| t.local_matrix()).ok()?;
    let mut visited = vec![id];
    let mut parent = registry.with_component(id, |t: &Transform| t.parent()).ok()?;

    while let Some(p) = parent {
        if visited.contains(&p) {
            warn!(entity = %id, parent = %p, "transform hierarchy cycle");
            break;
        }
        visited.push(p);
        let Ok((local, next)) = registry.with_component(p, |t: &Transform| (t.local_matrix(), t.parent())) else {
            break;
        };
        matrix = local * matrix;
        parent = next;
    }
    Some(matrix)
}

struct Node {
    local: Mat4,
    parent: Option<EntityId>,
}

fn resolve(
    id: EntityId,
    nodes: &HashMap<EntityId, Node>,
    resolved: &mut HashMap<EntityId, Mat4>,
    stack: &mut Vec<EntityId>,
) -> Mat4 {
    if let Some(m) = resolved.get(&id) {
        return *m;
    }
    let Some(node) = nodes.get(&id) else {
        return Mat4::IDENTITY;
    };
    let world = match node.parent {
        Some(p) if stack.contains(&p) => {
            warn!(entity = %id, parent = %p, "transform hierarchy cycle, treating entity as root");
            node.local
        }
        Some(p) if nodes.contains_key(&p) => {
            stack.push(id);
            let parent_world = resolve(p, nodes, resolved, stack);
            stack.pop();
            parent_world * node.local
        }
        _ => node.local,
    };
    resolved.insert(id, world);
    world
}

/// Refreshes cached world matrices (priority 10)
#[derive(Debug, Default)]
pub struct TransformSystem {
    updated_last_frame: usize,
}

impl TransformSystem {
    /// Create a new transform system
    pub fn new() -> Self {
        Self::default()
    }

    /// Transforms whose cached matrix changed in the last update
    pub fn updated_last_frame(&self) -> usize {
        self.updated_last_frame
    }

    /// Recompute every world matrix in the registry
    pub fn refresh(&mut self, registry: &ComponentRegistry) {
        let mut nodes = HashMap::new();
        registry.for_each(|id, t: &Transform| {
            nodes.insert(
                id,
                Node {
                    local: t.local_matrix(),
                    parent: t.parent(),
                },
            );
        });

        let mut resolved = HashMap::with_capacity(nodes.len());
        let mut stack = Vec::new();
        let mut ids: Vec<EntityId> = nodes.keys().copied().collect();
        ids.sort();
        for id in ids {
            resolve(id, &nodes, &mut resolved, &mut stack);
        }

        let mut updated = 0;
        registry.for_each_changed(|id, t: &mut Transform| {
            let Some(world) = resolved.get(&id) else {
                return false;
            };
            if t.is_dirty() || t.world_matrix() != *world {
                t.store_world_matrix(*world);
                updated += 1;
                true
            } else {
                false
            }
        });
        self.updated_last_frame = updated;
    }
}

impl System for TransformSystem {
    fn name(&self) -> &str {
        "TransformSystem"
    }

    fn priority(&self) -> i32 {
        priorities::TRANSFORM
    }

    fn update(&mut self, world: &World, _dt: f32) -> Result<()> {
        self.refresh(world.components());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Quat, Vec3};

    #[test]
    fn test_child_follows_parent() {
        let mut world = World::new();
        let parent = world.spawn();
        let child = world.spawn();
        world
            .add_component(parent, Transform::from_position(Vec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        world
            .add_component(child, Transform::from_position(Vec3::new(0.0, 1.0, 0.0)).with_parent(parent))
            .unwrap();

        world.add_system(TransformSystem::new());
        world.update(0.016);

        let m = world.get_component::<Transform>(child).unwrap().world_matrix();
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(10.0, 1.0, 0.0));

        let lazy = world_matrix(world.components(), child).unwrap();
        assert_eq!(lazy, m);
    }

    #[test]
    fn test_parent_rotation_applies_to_child() {
        let world = World::new();
        let parent = world.spawn();
        let child = world.spawn();
        world
            .add_component(
                parent,
                Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
            )
            .unwrap();
        world
            .add_component(child, Transform::from_position(Vec3::X).with_parent(parent))
            .unwrap();

        let p = world_matrix(world.components(), child).unwrap().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_cycle_is_broken() {
        let world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.add_component(a, Transform::from_position(Vec3::X).with_parent(b)).unwrap();
        world.add_component(b, Transform::from_position(Vec3::Y).with_parent(a)).unwrap();

        let mut system = TransformSystem::new();
        system.refresh(world.components());
        assert_eq!(system.updated_last_frame(), 2);
        assert!(world_matrix(world.components(), a).is_some());
    }
}
