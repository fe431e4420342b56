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
//! Entity Component System (ECS) core implementation
//!
//! This module provides the foundational ECS architecture including:
//! - Version-tagged entity handles with tag indexing
//! - Type-erased component storage with reader/writer locking and change listeners
//! - Priority-ordered system scheduling
//! - A typed event bus
//! - The transform hierarchy

mod component;
mod entity;
mod events;
mod registry;
mod system;
mod world;

pub mod components;
pub mod scheduler;
pub mod transform;

pub use component::{Component, ComponentArray, ComponentEvent, ComponentListener};
pub use entity::{EntityDesc, EntityId, EntityManager};
pub use events::{Event, EventBus, SubscriptionId};
pub use registry::ComponentRegistry;
pub use system::{priorities, System};
pub use world::World;
