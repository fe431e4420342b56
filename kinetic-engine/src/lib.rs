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
//! # Kinetic Engine
//!
//! The simulation core of a real-time rendering framework: an ECS runtime
//! and a rigid-body physics pipeline driven from it.
//!
//! ## Features
//!
//! - **ECS Runtime**: Versioned entity handles, typed component storage with
//!   change listeners, priority-ordered systems and an event bus
//! - **Rigid Bodies**: Fixed-timestep integration, broad and narrow phase,
//!   sequential-impulse contacts, joints, CCD and sleeping
//! - **Force Fields**: Plugins (attractors, drag, wind) with semver API checks,
//!   initialized in dependency order
//! - **Backends**: A built-in solver, or rapier3d behind the `rapier` feature
//! - **Parallelization**: Optional Rayon integration for narrow phase and integration
//! - **Renderer Façade**: Headless-capable frame protocol with a thread-safe callback queue
//! - **Assets**: Background loading with a shared resource cache
//!
//! ## Example
//!
//! ```rust
//! use kinetic_engine::ecs::components::{Collider, RigidBody, Transform};
//! use kinetic_engine::ecs::World;
//! use kinetic_engine::math::Vec3;
//! use kinetic_engine::physics::PhysicsSystem;
//! use kinetic_engine::PhysicsConfig;
//!
//! let mut world = World::new();
//! let ball = world.spawn();
//! world.add_component(ball, Transform::from_position(Vec3::new(0.0, 5.0, 0.0))).unwrap();
//! world.add_component(ball, RigidBody::dynamic(1.0)).unwrap();
//! world.add_component(ball, Collider::sphere(0.5)).unwrap();
//!
//! world.add_system(PhysicsSystem::new(PhysicsConfig::default()).unwrap());
//! world.initialize();
//! world.update(1.0 / 60.0);
//! ```

#![warn(missing_docs)]

/// Asynchronous asset loading and resource caching
pub mod assets;

/// Engine, physics, renderer and loader configuration
pub mod config;

/// Engine-wide error type
pub mod error;

/// Entity Component System implementation
pub mod ecs;

/// Math types and helpers
pub mod math;

/// Rigid-body physics pipeline
pub mod physics;

/// Force-field plugins and their registry
pub mod plugins;

/// Memory pooling for reducing allocation churn
pub mod pool;

/// Renderer façade
pub mod render;

pub use config::{AssetLoaderConfig, PhysicsConfig, RendererConfig};
pub use ecs::{EntityId, World};
pub use error::{EngineError, Result};
