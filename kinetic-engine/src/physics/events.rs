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
//! Physics events published on the world's event bus

use crate::ecs::{EntityId, Event};
use crate::math::Vec3;

/// Lifecycle stage of an overlapping pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactPhase {
    /// First step the pair touches
    Enter,
    /// Pair kept touching
    Stay,
    /// Pair stopped touching
    Exit,
}

/// Solid contact between two colliders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// Stage
    pub phase: ContactPhase,
    /// First entity (lower index)
    pub entity_a: EntityId,
    /// Second entity
    pub entity_b: EntityId,
    /// Unit normal from A to B; zero on exit
    pub normal: Vec3,
    /// Deepest contact point; zero on exit
    pub point: Vec3,
    /// Maximum penetration
    pub penetration: f32,
    /// Closing speed along the normal when the event was generated
    pub relative_speed: f32,
}

impl Event for CollisionEvent {}

/// Overlap involving at least one trigger collider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Stage
    pub phase: ContactPhase,
    /// First entity (lower index)
    pub entity_a: EntityId,
    /// Second entity
    pub entity_b: EntityId,
}

impl Event for TriggerEvent {}

/// A joint exceeded its break threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointBrokenEvent {
    /// Entity holding the joint component
    pub joint_entity: EntityId,
    /// Connected body
    pub connected_body: EntityId,
    /// Linear impulse of the breaking step
    pub linear_impulse: f32,
    /// Angular impulse of the breaking step
    pub angular_impulse: f32,
}

impl Event for JointBrokenEvent {}

/// Events produced during one fixed step, in publication order
#[derive(Debug, Default, Clone)]
pub struct StepEvents {
    /// Collision events
    pub collisions: Vec<CollisionEvent>,
    /// Trigger events
    pub triggers: Vec<TriggerEvent>,
    /// Joint breakages
    pub joints_broken: Vec<JointBrokenEvent>,
}

impl StepEvents {
    /// Drop all queued events
    pub fn clear(&mut self) {
        self.collisions.clear();
        self.triggers.clear();
        self.joints_broken.clear();
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.collisions.is_empty() && self.triggers.is_empty() && self.joints_broken.is_empty()
    }
}
