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
//! Physics world
//!
//! Drives a [`PhysicsBackend`] from a variable frame time with a fixed-step
//! accumulator:
//!
//! 1. restore the exact simulated poses that interpolation overwrote
//! 2. infer kinematic velocities from transform motion
//! 3. run up to `max_sub_steps` fixed steps, applying plugin forces before
//!    each and publishing that step's events right after it
//! 4. write the simulated state back and interpolate transforms by the
//!    leftover fraction of a step
//!
//! Time the loop could not catch up with is discarded with a warning.

use crate::config::PhysicsConfig;
use crate::ecs::World;
use crate::error::Result;
use crate::physics::backend::{DefaultBackend, PhysicsBackend, StepOutput, StepStats};
use crate::physics::body::PhysicsScene;
use crate::physics::contact::ContactManifold;
use crate::physics::debug::{debug_lines, DebugLine};
use crate::physics::transform_sync::{interpolation_alpha, TransformSync};
use crate::plugins::{Plugin, PluginContext, PluginRegistry};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PluginState {
    Pending,
    Ready,
    Failed,
}

/// Counters accumulated over the lifetime of a world
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldStats {
    /// Frames passed to `step`
    pub frames: u64,
    /// Fixed steps executed
    pub fixed_steps: u64,
    /// Frames that hit the sub-step cap
    pub capped_frames: u64,
    /// Simulation time thrown away by the sub-step cap (s)
    pub discarded_time: f32,
    /// Counters of the most recent fixed step
    pub last_step: StepStats,
}

/// Fixed-step physics driver over the ECS world
pub struct PhysicsWorld<B: PhysicsBackend = DefaultBackend> {
    config: PhysicsConfig,
    backend: B,
    plugins: PluginRegistry,
    plugin_state: PluginState,
    sync: TransformSync,
    output: StepOutput,
    accumulator: f32,
    alpha: f32,
    attached: bool,
    stats: WorldStats,
}

impl PhysicsWorld<DefaultBackend> {
    /// World on the default backend
    pub fn new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;
        let backend = DefaultBackend::new(&config);
        Ok(Self::with_backend(config, backend))
    }
}

impl<B: PhysicsBackend> PhysicsWorld<B> {
    /// World on an explicit backend; the configuration is used as given
    pub fn with_backend(config: PhysicsConfig, backend: B) -> Self {
        debug!(backend = backend.name(), fixed_dt = config.fixed_delta_time, "physics world created");
        PhysicsWorld {
            config,
            backend,
            plugins: PluginRegistry::new(),
            plugin_state: PluginState::Pending,
            sync: TransformSync::new(),
            output: StepOutput::default(),
            accumulator: 0.0,
            alpha: 1.0,
            attached: false,
            stats: WorldStats::default(),
        }
    }

    /// Configuration
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Backend, mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Plugin registry
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Plugin registry, mutably (e.g. to retune a plugin)
    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    /// Register a plugin; plugins initialize before the first fixed step
    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        self.plugins.register(plugin)
    }

    /// Unsimulated time carried to the next frame (s)
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Interpolation factor applied by the last `step`
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Lifetime counters
    pub fn stats(&self) -> WorldStats {
        self.stats
    }

    /// Contacts of the most recent fixed step
    pub fn contacts(&self) -> &[ContactManifold] {
        &self.output.manifolds
    }

    /// Register the backend's component listeners; `step` does this lazily
    pub fn attach(&mut self, world: &World) -> Result<()> {
        if !self.attached {
            self.backend.attach(world)?;
            self.attached = true;
        }
        Ok(())
    }

    /// Advance the simulation by a frame of `dt` seconds
    ///
    /// Returns the number of fixed steps executed.
    pub fn step(&mut self, world: &World, dt: f32) -> u32 {
        if !dt.is_finite() || dt < 0.0 {
            warn!(dt, "ignoring invalid frame time");
            return 0;
        }
        if let Err(err) = self.attach(world) {
            error!(error = %err, "physics backend failed to attach");
        }
        self.stats.frames += 1;

        self.sync.restore(world);
        self.sync.sync_kinematic(world, dt);

        let fixed_dt = self.config.fixed_delta_time;
        self.accumulator += dt;
        let mut steps = 0;
        if self.accumulator >= fixed_dt {
            let mut scene = PhysicsScene::gather(world);
            while self.accumulator >= fixed_dt && steps < self.config.max_sub_steps {
                self.run_fixed_step(world, &mut scene, fixed_dt);
                self.accumulator -= fixed_dt;
                steps += 1;
            }
            if self.accumulator >= fixed_dt {
                warn!(
                    discarded = self.accumulator,
                    max_sub_steps = self.config.max_sub_steps,
                    "spiral-of-death: physics fell behind, discarding time"
                );
                self.stats.capped_frames += 1;
                self.stats.discarded_time += self.accumulator;
                self.accumulator = 0.0;
            }
            scene.scatter(world);
            self.sync.capture(&scene);
        }

        self.alpha = interpolation_alpha(self.accumulator, fixed_dt);
        self.sync.interpolate(world, self.alpha);
        steps
    }

    /// Run exactly one fixed step, bypassing the accumulator and
    /// interpolation
    pub fn fixed_update(&mut self, world: &World) {
        if let Err(err) = self.attach(world) {
            error!(error = %err, "physics backend failed to attach");
        }
        let mut scene = PhysicsScene::gather(world);
        self.run_fixed_step(world, &mut scene, self.config.fixed_delta_time);
        scene.scatter(world);
    }

    fn run_fixed_step(&mut self, world: &World, scene: &mut PhysicsScene, dt: f32) {
        let context = PluginContext::new(
            dt,
            scene.bodies.len(),
            self.config.gravity,
            self.config.enable_multithreading,
        );
        self.prepare_plugins(&context);
        if self.plugin_state == PluginState::Ready {
            if let Err(err) = self.plugins.update_all(&context) {
                warn!(error = %err, "plugin update failed");
            }
            self.plugins.apply_forces(scene, &context);
        }

        self.backend.fixed_update(scene, dt, &mut self.output);
        self.stats.fixed_steps += 1;
        self.stats.last_step = self.output.stats;

        let events = world.events();
        for event in &self.output.events.collisions {
            events.publish(event);
        }
        for event in &self.output.events.triggers {
            events.publish(event);
        }
        for event in &self.output.events.joints_broken {
            events.publish(event);
        }
    }

    fn prepare_plugins(&mut self, context: &PluginContext) {
        if self.plugin_state != PluginState::Pending || self.plugins.plugin_count() == 0 {
            return;
        }
        self.plugin_state = match self.plugins.initialize_all(context) {
            Ok(()) => PluginState::Ready,
            Err(err) => {
                warn!(error = %err, "plugins disabled after initialization failure");
                PluginState::Failed
            }
        };
    }

    /// Debug geometry for the current world state and the latest contacts
    ///
    /// Empty unless a debug toggle is set in the configuration.
    pub fn debug_lines(&self, world: &World) -> Vec<DebugLine> {
        if !self.config.debug.any() {
            return Vec::new();
        }
        let scene = PhysicsScene::gather(world);
        debug_lines(&scene, &self.output.manifolds, &self.config.debug)
    }

    /// Drop cached solver and contact state and the accumulator
    pub fn reset(&mut self) {
        self.backend.reset();
        self.sync.clear();
        self.output.clear();
        self.accumulator = 0.0;
        self.alpha = 1.0;
    }

    /// Shut plugins down in reverse load order
    pub fn shutdown(&mut self) -> Result<()> {
        if self.plugin_state == PluginState::Ready {
            self.plugin_state = PluginState::Pending;
            return self.plugins.shutdown_all();
        }
        Ok(())
    }
}

impl<B: PhysicsBackend> std::fmt::Debug for PhysicsWorld<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("backend", &self.backend.name())
            .field("plugins", &self.plugins.plugin_count())
            .field("accumulator", &self.accumulator)
            .field("stats", &self.stats)
            .finish()
    }
}
