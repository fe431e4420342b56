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
//! Plugin system
//!
//! Plugins extend the physics step with custom forces without touching
//! component storage.
//!
//! # Features
//!
//! - **Lifecycle**: `initialize`, per-step `update` and `shutdown` hooks
//! - **Dependency management**: plugins initialize in dependency order;
//!   missing dependencies and cycles are rejected
//! - **Version checking**: each plugin's API version is checked against
//!   [`PLUGIN_API_VERSION`] with semantic versioning rules
//! - **Force fields**: plugins that implement [`ForceField`] contribute a
//!   force and torque to every awake dynamic body before velocities are
//!   integrated; evaluation runs on rayon when multithreading is enabled
//!
//! # Writing a force field
//!
//! ```rust
//! use kinetic_engine::math::Vec3;
//! use kinetic_engine::plugins::{BodyView, ForceContribution, ForceField, Plugin, PluginContext};
//! use std::any::Any;
//!
//! struct Updraft(f32);
//!
//! impl Plugin for Updraft {
//!     fn name(&self) -> &str { "updraft" }
//!     fn version(&self) -> &str { "1.0.0" }
//!     fn as_force_field(&self) -> Option<&dyn ForceField> { Some(self) }
//!     fn as_any(&self) -> &dyn Any { self }
//!     fn as_any_mut(&mut self) -> &mut dyn Any { self }
//! }
//!
//! impl ForceField for Updraft {
//!     fn contribute(&self, body: &BodyView<'_>, _ctx: &PluginContext) -> ForceContribution {
//!         ForceContribution::force(Vec3::Y * self.0 * body.mass())
//!     }
//! }
//! ```

pub mod api;
pub mod fields;
pub mod registry;

pub use api::{BodyView, ForceContribution, ForceField, Plugin, PluginContext, PLUGIN_API_VERSION};
pub use fields::{AttractorPlugin, DragPlugin, WindPlugin};
pub use registry::PluginRegistry;
