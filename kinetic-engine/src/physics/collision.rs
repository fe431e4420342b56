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
//! Collision detection stage
//!
//! Runs the broad phase over every collider in the scene, filters candidate
//! pairs (layers, joints, at least one dynamic side), builds manifolds in
//! the narrow phase and tracks which pairs touched last step so that
//! enter, stay and exit events can be produced.

use crate::config::PhysicsConfig;
use crate::ecs::EntityId;
use crate::math::{Aabb, Vec3};
use crate::physics::body::PhysicsScene;
use crate::physics::broad_phase::{BroadPhase, Pair};
use crate::physics::contact::ContactManifold;
use crate::physics::events::{CollisionEvent, ContactPhase, StepEvents, TriggerEvent};
use crate::physics::narrow_phase::generate_manifold;
use crate::physics::solver::pair_key;
use crate::pool::VecPool;
use std::collections::{HashMap, HashSet};

/// Canonical scheduling priority of collision detection
pub const COLLISION_DETECTION_PRIORITY: i32 = 100;

/// Counters of the last detection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionStats {
    /// Colliders handed to the broad phase
    pub colliders: usize,
    /// Candidate pairs after filtering
    pub candidate_pairs: usize,
    /// Touching pairs, triggers included
    pub manifolds: usize,
    /// Touching pairs involving a trigger
    pub trigger_pairs: usize,
    /// Manifolds contributed by continuous collision
    pub ccd_manifolds: usize,
}

#[derive(Debug, Clone, Copy)]
struct ActivePair {
    entity_a: EntityId,
    entity_b: EntityId,
    is_trigger: bool,
}

/// Broad phase, narrow phase and contact lifecycle tracking
#[derive(Debug)]
pub struct CollisionDetectionSystem {
    broad_phase: BroadPhase,
    multithreaded: bool,
    tracker: ContactTracker,
    entries: VecPool<(usize, Aabb)>,
    pairs: VecPool<Pair>,
    stats: CollisionStats,
}

impl CollisionDetectionSystem {
    /// Create the stage described by the configuration
    pub fn new(config: &PhysicsConfig) -> Self {
        CollisionDetectionSystem {
            broad_phase: BroadPhase::from_config(config),
            multithreaded: config.enable_multithreading,
            tracker: ContactTracker::new(),
            entries: VecPool::new(),
            pairs: VecPool::new(),
            stats: CollisionStats::default(),
        }
    }

    /// Counters of the last pass
    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    /// Pairs that touched in the last pass
    pub fn active_pair_count(&self) -> usize {
        self.tracker.len()
    }

    /// Forget contact history; the next pass reports every pair as new
    pub fn reset(&mut self) {
        self.tracker.clear();
    }

    /// Scratch pools, exposed for diagnostics
    pub fn pool_stats(&self) -> (crate::pool::PoolStats, crate::pool::PoolStats) {
        (self.entries.stats(), self.pairs.stats())
    }

    /// Pairs joined by a joint that disables collision between its bodies
    pub fn jointed_pairs(scene: &PhysicsScene) -> HashSet<u64> {
        scene
            .joints
            .iter()
            .filter(|sj| sj.joint.is_active() && !sj.joint.enable_collision && sj.joint.connected_body.is_some())
            .map(|sj| pair_key(sj.owner, sj.joint.connected_body))
            .collect()
    }

    /// True when bodies `i` and `j` may generate contacts
    pub fn can_pair(scene: &PhysicsScene, excluded: &HashSet<u64>, i: usize, j: usize) -> bool {
        let (a, b) = (&scene.bodies[i], &scene.bodies[j]);
        let (Some(ca), Some(cb)) = (a.collider.as_ref(), b.collider.as_ref()) else {
            return false;
        };
        (a.body.is_dynamic() || b.body.is_dynamic())
            && ca.can_collide_with(cb)
            && !excluded.contains(&pair_key(a.entity, b.entity))
    }

    /// Detect contacts and queue lifecycle events
    ///
    /// `ccd` holds manifolds found by the continuous pass; it is drained and
    /// its manifolds are kept for pairs the discrete pass no longer sees.
    /// The result is sorted by entity pair.
    pub fn detect(
        &mut self,
        scene: &PhysicsScene,
        ccd: &mut Vec<ContactManifold>,
        events: &mut StepEvents,
    ) -> Vec<ContactManifold> {
        let excluded = Self::jointed_pairs(scene);

        let mut entries = self.entries.acquire();
        entries.extend(
            scene
                .bodies
                .iter()
                .enumerate()
                .filter(|(_, s)| s.collider.is_some())
                .map(|(i, s)| (i, s.aabb)),
        );
        self.broad_phase.update(&entries);

        let mut pairs = self.pairs.acquire();
        self.broad_phase.detect_pairs(&mut pairs);
        pairs.retain(|&(i, j)| Self::can_pair(scene, &excluded, i, j));

        let mut manifolds = narrow_phase(scene, &pairs, self.multithreaded);

        let mut ccd_added = 0;
        let seen: HashSet<u64> = manifolds.iter().map(|m| pair_key(m.entity_a, m.entity_b)).collect();
        for m in ccd.drain(..) {
            if !seen.contains(&pair_key(m.entity_a, m.entity_b)) {
                manifolds.push(m);
                ccd_added += 1;
            }
        }
        manifolds.sort_by_key(|m| (m.entity_a, m.entity_b));

        self.stats = CollisionStats {
            colliders: entries.len(),
            candidate_pairs: pairs.len(),
            manifolds: manifolds.len(),
            trigger_pairs: manifolds.iter().filter(|m| m.is_trigger).count(),
            ccd_manifolds: ccd_added,
        };
        self.tracker.update(scene, &manifolds, events);
        manifolds
    }
}

/// Contact lifecycle memory: which pairs touched last step
#[derive(Debug, Default)]
pub struct ContactTracker {
    active: HashMap<u64, ActivePair>,
}

impl ContactTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs that touched in the last update
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True when nothing touched
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Forget history; the next update reports every pair as new
    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Compare this step's manifolds with the previous step's and queue
    /// Enter and Stay events in manifold order, then Exit events sorted by
    /// pair key
    pub fn update(&mut self, scene: &PhysicsScene, manifolds: &[ContactManifold], events: &mut StepEvents) {
        let mut current = HashMap::with_capacity(manifolds.len());
        for m in manifolds {
            let key = pair_key(m.entity_a, m.entity_b);
            let phase = if self.active.contains_key(&key) {
                ContactPhase::Stay
            } else {
                ContactPhase::Enter
            };
            current.insert(
                key,
                ActivePair {
                    entity_a: m.entity_a,
                    entity_b: m.entity_b,
                    is_trigger: m.is_trigger,
                },
            );
            if m.is_trigger {
                events.triggers.push(TriggerEvent {
                    phase,
                    entity_a: m.entity_a,
                    entity_b: m.entity_b,
                });
                continue;
            }
            let deepest = m
                .points()
                .iter()
                .max_by(|x, y| x.penetration.total_cmp(&y.penetration))
                .map_or(Vec3::ZERO, |p| p.position);
            let relative_speed = match (scene.body(m.entity_a), scene.body(m.entity_b)) {
                (Some(a), Some(b)) => (a.velocity_at(deepest) - b.velocity_at(deepest)).dot(m.normal),
                _ => 0.0,
            };
            events.collisions.push(CollisionEvent {
                phase,
                entity_a: m.entity_a,
                entity_b: m.entity_b,
                normal: m.normal,
                point: deepest,
                penetration: m.penetration,
                relative_speed,
            });
        }

        let mut ended: Vec<(u64, ActivePair)> = self
            .active
            .iter()
            .filter(|(key, _)| !current.contains_key(*key))
            .map(|(key, pair)| (*key, *pair))
            .collect();
        ended.sort_by_key(|(key, _)| *key);
        for (_, pair) in ended {
            if pair.is_trigger {
                events.triggers.push(TriggerEvent {
                    phase: ContactPhase::Exit,
                    entity_a: pair.entity_a,
                    entity_b: pair.entity_b,
                });
            } else {
                events.collisions.push(CollisionEvent {
                    phase: ContactPhase::Exit,
                    entity_a: pair.entity_a,
                    entity_b: pair.entity_b,
                    normal: Vec3::ZERO,
                    point: Vec3::ZERO,
                    penetration: 0.0,
                    relative_speed: 0.0,
                });
            }
        }
        self.active = current;
    }
}

#[cfg(feature = "parallel")]
fn narrow_phase(scene: &PhysicsScene, pairs: &[Pair], multithreaded: bool) -> Vec<ContactManifold> {
    use rayon::prelude::*;
    if multithreaded {
        return pairs
            .par_iter()
            .filter_map(|&(i, j)| generate_manifold(&scene.bodies[i], &scene.bodies[j]))
            .collect();
    }
    sequential_narrow_phase(scene, pairs)
}

#[cfg(not(feature = "parallel"))]
fn narrow_phase(scene: &PhysicsScene, pairs: &[Pair], _multithreaded: bool) -> Vec<ContactManifold> {
    sequential_narrow_phase(scene, pairs)
}

fn sequential_narrow_phase(scene: &PhysicsScene, pairs: &[Pair]) -> Vec<ContactManifold> {
    pairs
        .iter()
        .filter_map(|&(i, j)| generate_manifold(&scene.bodies[i], &scene.bodies[j]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Collider, PhysicsJoint, RigidBody};
    use crate::math::Quat;
    use crate::physics::body::{SimBody, SimJoint};

    fn body(index: u32, rb: RigidBody, position: Vec3, collider: Collider) -> SimBody {
        let mut sim = SimBody {
            entity: EntityId::new(index, 0),
            body: rb,
            implicit_static: false,
            position,
            rotation: Quat::IDENTITY,
            collider: Some(collider),
            aabb: Aabb::default(),
            woken: false,
            ccd_advanced: false,
        };
        sim.refresh_aabb();
        sim
    }

    fn two_spheres(gap: f32) -> PhysicsScene {
        let mut scene = PhysicsScene::new();
        scene.push_body(body(0, RigidBody::dynamic(1.0), Vec3::ZERO, Collider::sphere(0.5)));
        scene.push_body(body(1, RigidBody::dynamic(1.0), Vec3::new(1.0 + gap, 0.0, 0.0), Collider::sphere(0.5)));
        scene
    }

    #[test]
    fn test_enter_stay_exit_sequence() {
        let mut system = CollisionDetectionSystem::new(&PhysicsConfig::default());
        let mut events = StepEvents::default();

        let touching = two_spheres(-0.1);
        assert_eq!(system.detect(&touching, &mut Vec::new(), &mut events).len(), 1);
        assert_eq!(events.collisions[0].phase, ContactPhase::Enter);

        events.clear();
        system.detect(&touching, &mut Vec::new(), &mut events);
        assert_eq!(events.collisions[0].phase, ContactPhase::Stay);

        events.clear();
        assert!(system.detect(&two_spheres(0.5), &mut Vec::new(), &mut events).is_empty());
        assert_eq!(events.collisions.len(), 1);
        assert_eq!(events.collisions[0].phase, ContactPhase::Exit);
        assert_eq!(system.active_pair_count(), 0);
    }

    #[test]
    fn test_static_pairs_are_skipped() {
        let mut scene = PhysicsScene::new();
        scene.push_body(body(0, RigidBody::new_static(), Vec3::ZERO, Collider::sphere(0.5)));
        scene.push_body(body(1, RigidBody::kinematic(), Vec3::new(0.5, 0.0, 0.0), Collider::sphere(0.5)));
        let mut system = CollisionDetectionSystem::new(&PhysicsConfig::default());
        assert!(system.detect(&scene, &mut Vec::new(), &mut StepEvents::default()).is_empty());
    }

    #[test]
    fn test_layer_masks_filter_pairs() {
        let mut scene = PhysicsScene::new();
        scene.push_body(body(0, RigidBody::dynamic(1.0), Vec3::ZERO, Collider::sphere(0.5).with_layer(1, 0b001)));
        scene.push_body(body(
            1,
            RigidBody::dynamic(1.0),
            Vec3::new(0.8, 0.0, 0.0),
            Collider::sphere(0.5).with_layer(2, 0b001),
        ));
        let mut system = CollisionDetectionSystem::new(&PhysicsConfig::default());
        assert!(system.detect(&scene, &mut Vec::new(), &mut StepEvents::default()).is_empty());
    }

    #[test]
    fn test_joint_disables_collision() {
        let mut scene = two_spheres(-0.1);
        scene.joints.push(SimJoint {
            owner: EntityId::new(0, 0),
            joint: PhysicsJoint::distance(EntityId::new(1, 0), Vec3::ZERO, Vec3::ZERO),
        });
        let mut system = CollisionDetectionSystem::new(&PhysicsConfig::default());
        assert!(system.detect(&scene, &mut Vec::new(), &mut StepEvents::default()).is_empty());

        scene.joints[0].joint.enable_collision = true;
        assert_eq!(system.detect(&scene, &mut Vec::new(), &mut StepEvents::default()).len(), 1);
    }

    #[test]
    fn test_trigger_pairs_emit_trigger_events() {
        let mut scene = PhysicsScene::new();
        scene.push_body(body(0, RigidBody::new_static(), Vec3::ZERO, Collider::cuboid(Vec3::ONE).as_trigger()));
        scene.push_body(body(1, RigidBody::dynamic(1.0), Vec3::new(0.5, 0.0, 0.0), Collider::sphere(0.5)));
        let mut system = CollisionDetectionSystem::new(&PhysicsConfig::default());
        let mut events = StepEvents::default();
        let manifolds = system.detect(&scene, &mut Vec::new(), &mut events);
        assert!(manifolds[0].is_trigger);
        assert!(events.collisions.is_empty());
        assert_eq!(events.triggers[0].phase, ContactPhase::Enter);
    }

    #[test]
    fn test_ccd_manifold_kept_when_discrete_pass_misses() {
        let scene = two_spheres(0.5);
        let mut ccd = ContactManifold::new(EntityId::new(0, 0), EntityId::new(1, 0));
        ccd.normal = Vec3::X;
        ccd.add_point(Vec3::new(0.5, 0.0, 0.0), 0.0);
        let mut system = CollisionDetectionSystem::new(&PhysicsConfig::default());
        let mut events = StepEvents::default();
        let manifolds = system.detect(&scene, &mut vec![ccd], &mut events);
        assert_eq!(manifolds.len(), 1);
        assert_eq!(system.stats().ccd_manifolds, 1);
        assert_eq!(events.collisions[0].phase, ContactPhase::Enter);
    }

    #[test]
    fn test_pools_are_reused_between_passes() {
        let scene = two_spheres(-0.1);
        let mut system = CollisionDetectionSystem::new(&PhysicsConfig::default());
        for _ in 0..3 {
            system.detect(&scene, &mut Vec::new(), &mut StepEvents::default());
        }
        let (entries, pairs) = system.pool_stats();
        assert_eq!(entries.hits, 2);
        assert_eq!(pairs.misses, 1);
    }
}
