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
//! Configuration surfaces
//!
//! Every configuration struct deserializes from TOML with `#[serde(default)]`,
//! so a document only needs to name the values it overrides.
//!
//! ```
//! use kinetic_engine::config::{BroadPhaseType, PhysicsConfig};
//!
//! let config = PhysicsConfig::from_toml_str(r#"
//!     gravity = [0.0, -3.7, 0.0]
//!     solver_iterations = 12
//!     broad_phase_type = "bvh"
//!
//!     [sleep]
//!     linear_epsilon = 0.02
//! "#).unwrap();
//!
//! assert_eq!(config.solver_iterations, 12);
//! assert_eq!(config.broad_phase_type, BroadPhaseType::Bvh);
//! assert_eq!(config.max_sub_steps, 5);
//! ```

use crate::error::{EngineError, Result};
use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// Broad-phase acceleration structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadPhaseType {
    /// Uniform grid keyed by integer cell coordinates
    #[default]
    SpatialHash,
    /// Accepted for compatibility; served by the BVH
    Octree,
    /// Median-split bounding volume hierarchy rebuilt every step
    Bvh,
}

/// Tuning knobs of the sequential-impulse solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Base Baumgarte factor for positional correction
    pub baumgarte: f32,
    /// Penetration allowed before positional correction kicks in (m)
    pub slop: f32,
    /// Closing speed below which restitution is ignored (m/s)
    pub restitution_threshold: f32,
    /// Multiplier applied to cached impulses before re-use
    pub warm_start_decay: f32,
    /// Constraint force mixing added to effective mass denominators
    pub cfm: f32,
    /// Cached impulses above this magnitude are discarded
    pub impulse_sanity_bound: f32,
    /// Hard linear speed cap applied after the solve (m/s)
    pub max_linear_velocity: f32,
    /// Hard angular speed cap applied after the solve (rad/s)
    pub max_angular_velocity: f32,
    /// Steps longer than this are recursively halved
    pub sub_step_threshold: f32,
    /// Squared distance under which a cached contact matches a new one (m²)
    pub contact_match_threshold: f32,
    /// Largest positional correction applied in a single position iteration (m)
    pub max_correction: f32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            baumgarte: 0.2,
            slop: 0.01,
            restitution_threshold: 1.0,
            warm_start_decay: 0.95,
            cfm: 1e-6,
            impulse_sanity_bound: 1.0e4,
            max_linear_velocity: 100.0,
            max_angular_velocity: std::f32::consts::TAU * 10.0,
            sub_step_threshold: 1.0 / 30.0,
            contact_match_threshold: 1e-2,
            max_correction: 0.2,
        }
    }
}

/// Motion thresholds used by the sleeping pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepSettings {
    /// Linear speed under which a body counts as still (m/s)
    pub linear_epsilon: f32,
    /// Angular speed under which a body counts as still (rad/s)
    pub angular_epsilon: f32,
}

impl Default for SleepSettings {
    fn default() -> Self {
        SleepSettings {
            linear_epsilon: 0.05,
            angular_epsilon: 0.05,
        }
    }
}

/// Debug visualization toggles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugDrawSettings {
    /// Outline collider shapes
    pub draw_colliders: bool,
    /// Outline world AABBs
    pub draw_aabbs: bool,
    /// Draw contact points and normals
    pub draw_contacts: bool,
    /// Draw linear velocity vectors
    pub draw_velocity: bool,
}

impl DebugDrawSettings {
    /// True when any toggle is set
    pub fn any(&self) -> bool {
        self.draw_colliders || self.draw_aabbs || self.draw_contacts || self.draw_velocity
    }
}

/// Physics world configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// World gravity (m/s²)
    pub gravity: Vec3,
    /// Fixed simulation step (s)
    pub fixed_delta_time: f32,
    /// Maximum fixed steps per `step` call
    pub max_sub_steps: u32,
    /// Velocity iterations per fixed step
    pub solver_iterations: u32,
    /// Position iterations per fixed step
    pub position_iterations: u32,
    /// Broad-phase structure
    pub broad_phase_type: BroadPhaseType,
    /// Spatial hash cell edge length (m)
    pub spatial_hash_cell_size: f32,
    /// Enable continuous collision detection
    pub enable_ccd: bool,
    /// Speed above which a dynamic body becomes a CCD candidate (m/s)
    pub ccd_velocity_threshold: f32,
    /// Fraction of characteristic size a body may travel per step before CCD
    pub ccd_displacement_threshold: f32,
    /// Cap on CCD candidates per fixed step
    pub max_ccd_objects: usize,
    /// Enable sleeping
    pub enable_sleeping: bool,
    /// Kinetic energy under which a body may fall asleep
    pub sleep_threshold: f32,
    /// Time a body must stay still before sleeping (s)
    pub sleep_time: f32,
    /// Parallelize narrow phase and force fields
    pub enable_multithreading: bool,
    /// Solver tuning
    pub solver: SolverSettings,
    /// Sleeping tuning
    pub sleep: SleepSettings,
    /// Debug draw toggles
    pub debug: DebugDrawSettings,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_delta_time: 1.0 / 60.0,
            max_sub_steps: 5,
            solver_iterations: 10,
            position_iterations: 4,
            broad_phase_type: BroadPhaseType::SpatialHash,
            spatial_hash_cell_size: 5.0,
            enable_ccd: true,
            ccd_velocity_threshold: 10.0,
            ccd_displacement_threshold: 0.5,
            max_ccd_objects: 50,
            enable_sleeping: true,
            sleep_threshold: 0.01,
            sleep_time: 0.5,
            enable_multithreading: false,
            solver: SolverSettings::default(),
            sleep: SleepSettings::default(),
            debug: DebugDrawSettings::default(),
        }
    }
}

impl PhysicsConfig {
    /// Parse a TOML document and validate the result
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: PhysicsConfig = parse(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_finite() {
            return Err(EngineError::InvalidConfig("gravity must be finite".into()));
        }
        positive("fixed_delta_time", self.fixed_delta_time)?;
        positive("spatial_hash_cell_size", self.spatial_hash_cell_size)?;
        positive("sleep_time", self.sleep_time)?;
        positive("solver.sub_step_threshold", self.solver.sub_step_threshold)?;
        if self.max_sub_steps == 0 {
            return Err(EngineError::InvalidConfig("max_sub_steps must be at least 1".into()));
        }
        if self.solver_iterations == 0 {
            return Err(EngineError::InvalidConfig(
                "solver_iterations must be at least 1".into(),
            ));
        }
        if !(self.sleep_threshold >= 0.0) {
            return Err(EngineError::InvalidConfig(
                "sleep_threshold must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.solver.warm_start_decay) {
            return Err(EngineError::InvalidConfig(
                "solver.warm_start_decay must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

fn parse<T: serde::de::DeserializeOwned>(source: &str) -> Result<T> {
    toml::from_str(source).map_err(|e| EngineError::InvalidConfig(e.to_string()))
}

fn positive(field: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!(
            "{field} must be positive and finite, got {value}"
        )))
    }
}

/// Renderer façade configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Window title
    pub title: String,
    /// Framebuffer width in pixels
    pub width: u32,
    /// Framebuffer height in pixels
    pub height: u32,
    /// Wait for vertical blank on present
    pub vsync: bool,
    /// Merge consecutive draws sharing mesh and material
    pub batching: bool,
    /// Capacity of the render-thread callback queue
    pub callback_queue_capacity: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            title: String::from("kinetic"),
            width: 1280,
            height: 720,
            vsync: true,
            batching: true,
            callback_queue_capacity: 1024,
        }
    }
}

impl RendererConfig {
    /// Parse a TOML document and validate the result
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: RendererConfig = parse(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "framebuffer must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.callback_queue_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "callback_queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Asynchronous asset loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetLoaderConfig {
    /// Number of background worker threads
    pub worker_count: usize,
    /// Bounded job queue capacity; 0 means unbounded
    pub queue_capacity: usize,
}

impl Default for AssetLoaderConfig {
    fn default() -> Self {
        AssetLoaderConfig {
            worker_count: 2,
            queue_capacity: 0,
        }
    }
}

impl AssetLoaderConfig {
    /// Parse a TOML document and validate the result
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: AssetLoaderConfig = parse(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(EngineError::InvalidConfig(
                "asset loader needs at least one worker".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let c = PhysicsConfig::default();
        assert!((c.fixed_delta_time - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(c.max_sub_steps, 5);
        assert_eq!(c.solver_iterations, 10);
        assert_eq!(c.position_iterations, 4);
        assert_eq!(c.spatial_hash_cell_size, 5.0);
        assert_eq!(c.ccd_velocity_threshold, 10.0);
        assert_eq!(c.max_ccd_objects, 50);
        assert_eq!(c.sleep_time, 0.5);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let c = PhysicsConfig::from_toml_str("").unwrap();
        assert_eq!(c, PhysicsConfig::default());
    }

    #[test]
    fn test_rejects_bad_time_step() {
        let err = PhysicsConfig::from_toml_str("fixed_delta_time = 0.0").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));

        let mut c = PhysicsConfig::default();
        c.fixed_delta_time = f32::NAN;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_iterations() {
        assert!(PhysicsConfig::from_toml_str("solver_iterations = 0").is_err());
        assert!(PhysicsConfig::from_toml_str("max_sub_steps = 0").is_err());
    }

    #[test]
    fn test_nested_sections() {
        let c = PhysicsConfig::from_toml_str(
            "[solver]\nslop = 0.005\n[debug]\ndraw_contacts = true\n",
        )
        .unwrap();
        assert_eq!(c.solver.slop, 0.005);
        assert_eq!(c.solver.warm_start_decay, 0.95);
        assert!(c.debug.any());
    }

    #[test]
    fn test_renderer_and_loader_validation() {
        assert!(RendererConfig::default().validate().is_ok());
        let bad = RendererConfig { width: 0, ..Default::default() };
        assert!(bad.validate().is_err());
        assert!(AssetLoaderConfig { worker_count: 0, ..Default::default() }
            .validate()
            .is_err());
    }

    #[test]
    fn test_renderer_and_loader_parse_overrides() {
        let r = RendererConfig::from_toml_str("title = \"demo\"\nwidth = 640").unwrap();
        assert_eq!(r.title, "demo");
        assert_eq!(r.height, 720);
        assert!(RendererConfig::from_toml_str("callback_queue_capacity = 0").is_err());
        let a = AssetLoaderConfig::from_toml_str("worker_count = 4").unwrap();
        assert_eq!(a.worker_count, 4);
    }
}
