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
//! Physics backends
//!
//! A backend advances a gathered [`PhysicsScene`] by one fixed step and
//! reports the step's manifolds and events. The in-tree pipeline is
//! [`BuiltinBackend`]; with the `rapier` feature an adapter over `rapier3d`
//! is available as well. [`DefaultBackend`] picks one at compile time.

use crate::config::PhysicsConfig;
use crate::ecs::components::{Collider, RigidBody};
use crate::ecs::{ComponentEvent, EntityId, World};
use crate::error::Result;
use crate::physics::body::PhysicsScene;
use crate::physics::ccd;
use crate::physics::collision::{CollisionDetectionSystem, CollisionStats};
use crate::physics::contact::ContactManifold;
use crate::physics::events::StepEvents;
use crate::physics::integrator;
use crate::physics::sleeping::{update_sleeping, wake_pushed, SleepReport};
use crate::physics::solver::{pair_key, ConstraintSolver, SolverStats};
use crate::pool::VecPool;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// Counters of one fixed step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Bodies in the scene
    pub bodies: usize,
    /// Dynamic bodies that were awake at the start of the step
    pub awake: usize,
    /// Candidate pairs after broad-phase filtering
    pub candidate_pairs: usize,
    /// Touching pairs, triggers included
    pub manifolds: usize,
    /// Impacts resolved by continuous collision
    pub ccd_hits: usize,
    /// Sleeping pass outcome
    pub sleep: SleepReport,
    /// Velocity solver counters
    pub solver: SolverStats,
}

/// Everything a fixed step produces besides the mutated scene
#[derive(Debug, Default)]
pub struct StepOutput {
    /// Lifecycle events in emission order
    pub events: StepEvents,
    /// Contacts of the step, sorted by entity pair
    pub manifolds: Vec<ContactManifold>,
    /// Counters
    pub stats: StepStats,
}

impl StepOutput {
    /// Reset for reuse, keeping allocations
    pub fn clear(&mut self) {
        self.events.clear();
        self.manifolds.clear();
        self.stats = StepStats::default();
    }
}

/// A rigid-body simulation engine driven by `PhysicsWorld`
pub trait PhysicsBackend: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Hook into the world, e.g. to observe component removal
    fn attach(&mut self, world: &World) -> Result<()>;

    /// Advance the scene by `dt`
    ///
    /// Forces accumulated on the bodies are consumed; `output` is cleared
    /// and refilled.
    fn fixed_update(&mut self, scene: &mut PhysicsScene, dt: f32, output: &mut StepOutput);

    /// Forget all cached state (contact history, warm-start impulses)
    fn reset(&mut self) {}
}

/// The in-tree pipeline: integrator, CCD, collision detection, sequential
/// impulse solver and sleeping
#[derive(Debug)]
pub struct BuiltinBackend {
    config: PhysicsConfig,
    collision: CollisionDetectionSystem,
    solver: ConstraintSolver,
    ccd_contacts: VecPool<ContactManifold>,
    removed: Arc<Mutex<Vec<EntityId>>>,
}

impl BuiltinBackend {
    /// Build the pipeline for a configuration
    pub fn new(config: &PhysicsConfig) -> Self {
        BuiltinBackend {
            config: config.clone(),
            collision: CollisionDetectionSystem::new(config),
            solver: ConstraintSolver::new(config),
            ccd_contacts: VecPool::new(),
            removed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Collision stage
    pub fn collision(&self) -> &CollisionDetectionSystem {
        &self.collision
    }

    /// Constraint solver
    pub fn solver(&self) -> &ConstraintSolver {
        &self.solver
    }

    /// Counters of the last detection pass
    pub fn collision_stats(&self) -> CollisionStats {
        self.collision.stats()
    }

    fn evict_removed(&mut self) {
        let removed: Vec<EntityId> = std::mem::take(&mut *self.removed.lock());
        for id in removed {
            self.solver.forget(id);
        }
    }
}

impl PhysicsBackend for BuiltinBackend {
    fn name(&self) -> &str {
        "builtin"
    }

    fn attach(&mut self, world: &World) -> Result<()> {
        let removed = Arc::clone(&self.removed);
        world.components().on_change::<RigidBody>(Arc::new(move |id, event, _: &RigidBody| {
            if event == ComponentEvent::Removed {
                removed.lock().push(id);
            }
        }))?;
        let removed = Arc::clone(&self.removed);
        world.components().on_change::<Collider>(Arc::new(move |id, event, _: &Collider| {
            if event == ComponentEvent::Removed {
                removed.lock().push(id);
            }
        }))?;
        debug!(backend = self.name(), "physics backend attached");
        Ok(())
    }

    fn fixed_update(&mut self, scene: &mut PhysicsScene, dt: f32, output: &mut StepOutput) {
        output.clear();
        self.evict_removed();
        for sim in scene.bodies.iter_mut() {
            sim.woken = false;
            sim.ccd_advanced = false;
        }
        output.stats.bodies = scene.bodies.len();

        let pushed = wake_pushed(scene);
        output.stats.awake = scene.bodies.iter().filter(|s| s.is_simulated()).count();
        integrator::snapshot_previous_pose(scene);
        integrator::integrate_velocities(scene, self.config.gravity, dt);

        let mut ccd_contacts = self.ccd_contacts.acquire();
        let excluded = CollisionDetectionSystem::jointed_pairs(scene);
        let entities: Vec<EntityId> = scene.bodies.iter().map(|s| s.entity).collect();
        output.stats.ccd_hits = ccd::resolve(
            scene,
            &self.config,
            dt,
            |i, j| !excluded.contains(&pair_key(entities[i], entities[j])),
            &mut ccd_contacts,
        );

        integrator::integrate_positions(scene, dt);

        output.manifolds = self.collision.detect(scene, &mut ccd_contacts, &mut output.events);
        drop(ccd_contacts);

        self.solver
            .solve_velocities(scene, &mut output.manifolds, dt, &mut output.events.joints_broken);
        self.solver.solve_positions(scene, &output.manifolds);

        output.stats.sleep = update_sleeping(scene, &output.manifolds, &self.config, dt);
        output.stats.sleep.woken += pushed;
        integrator::clear_forces(scene);

        let collision = self.collision.stats();
        output.stats.candidate_pairs = collision.candidate_pairs;
        output.stats.manifolds = collision.manifolds;
        output.stats.solver = self.solver.stats();
        trace!(
            bodies = output.stats.bodies,
            pairs = output.stats.candidate_pairs,
            contacts = output.stats.manifolds,
            ccd = output.stats.ccd_hits,
            sleeping = output.stats.sleep.sleeping,
            "fixed step"
        );
    }

    fn reset(&mut self) {
        self.collision.reset();
        self.solver.clear_cache();
    }
}

/// Backend used by `PhysicsWorld::new`
#[cfg(not(feature = "rapier"))]
pub type DefaultBackend = BuiltinBackend;

/// Backend used by `PhysicsWorld::new`
#[cfg(feature = "rapier")]
pub type DefaultBackend = crate::physics::rapier::RapierBackend;
