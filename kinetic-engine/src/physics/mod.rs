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
//! Rigid-body physics pipeline
//!
//! A fixed step gathers the simulated components into a [`PhysicsScene`],
//! advances it through the backend and scatters the result back:
//!
//! - apply plugin forces, integrate velocities
//! - continuous collision for fast bodies
//! - integrate positions
//! - broad phase, narrow phase, contact events
//! - velocity and position constraint passes
//! - sleeping
//!
//! [`PhysicsWorld`] owns the accumulator and transform interpolation;
//! [`PhysicsSystem`] schedules it inside the ECS.

pub mod backend;
pub mod body;
pub mod broad_phase;
pub mod ccd;
pub mod collision;
pub mod contact;
pub mod debug;
pub mod events;
pub mod integrator;
pub mod narrow_phase;
#[cfg(feature = "rapier")]
pub mod rapier;
pub mod shapes;
pub mod sleeping;
pub mod solver;
pub mod system;
pub mod transform_sync;
pub mod world;

pub use backend::{BuiltinBackend, DefaultBackend, PhysicsBackend, StepOutput, StepStats};
pub use body::{PhysicsScene, SimBody, SimJoint};
pub use collision::{CollisionDetectionSystem, ContactTracker, COLLISION_DETECTION_PRIORITY};
pub use contact::{ContactManifold, ContactPoint};
pub use debug::DebugLine;
pub use events::{CollisionEvent, ContactPhase, JointBrokenEvent, TriggerEvent};
pub use shapes::ColliderShape;
pub use system::PhysicsSystem;
pub use world::{PhysicsWorld, WorldStats};
