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
//! World management
//!
//! The World is the central container for all ECS data: the entity store,
//! the component registry, the event bus and the system scheduler.

use crate::ecs::components::{Collider, PhysicsJoint, RigidBody, Transform};
use crate::ecs::scheduler::{FrameReport, Scheduler};
use crate::ecs::{Component, ComponentRegistry, EntityDesc, EntityId, EntityManager, EventBus, System};
use crate::error::{EngineError, Result};
use tracing::{error, warn};

/// The main ECS world container
///
/// World manages entity lifecycles and serves as the central access point
/// for all ECS operations. Core component types are registered on creation.
pub struct World {
    entities: EntityManager,
    components: ComponentRegistry,
    events: EventBus,
    scheduler: Scheduler,
    initialized: bool,
}

impl World {
    /// Create a new world with the built-in component types registered
    pub fn new() -> Self {
        let components = ComponentRegistry::new();
        components.register::<Transform>();
        components.register::<RigidBody>();
        components.register::<Collider>();
        components.register::<PhysicsJoint>();
        World {
            entities: EntityManager::new(),
            components,
            events: EventBus::new(),
            scheduler: Scheduler::new(),
            initialized: false,
        }
    }

    /// Entity store
    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Component registry
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Event bus
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register an additional component type
    pub fn register_component<T: Component>(&self) -> bool {
        self.components.register::<T>()
    }

    /// Create an entity from a descriptor
    pub fn create_entity(&self, desc: EntityDesc) -> EntityId {
        self.entities.create(desc)
    }

    /// Create an anonymous, active entity
    pub fn spawn(&self) -> EntityId {
        self.entities.create(EntityDesc::default())
    }

    /// Destroy an entity and cascade removal of its components
    pub fn destroy_entity(&self, id: EntityId) -> bool {
        if !self.entities.is_valid(id) {
            warn!(entity = %id, "destroy called on invalid entity");
            return false;
        }
        self.components.remove_all(id);
        self.entities.destroy(id)
    }

    /// True when the handle refers to a live entity
    pub fn is_valid(&self, id: EntityId) -> bool {
        self.entities.is_valid(id)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn check(&self, id: EntityId) -> Result<()> {
        if self.entities.is_valid(id) {
            Ok(())
        } else {
            warn!(entity = %id, "component operation on invalid entity");
            Err(EngineError::InvalidEntity(id))
        }
    }

    /// Attach or replace a component
    pub fn add_component<T: Component>(&self, id: EntityId, value: T) -> Result<()> {
        self.check(id)?;
        self.components.add(id, value)
    }

    /// Detach a component
    pub fn remove_component<T: Component>(&self, id: EntityId) -> Result<Option<T>> {
        self.check(id)?;
        self.components.remove::<T>(id)
    }

    /// Copy of a component
    pub fn get_component<T: Component + Clone>(&self, id: EntityId) -> Result<T> {
        self.check(id)?;
        self.components.get::<T>(id)
    }

    /// Presence check; false for invalid handles and unregistered types
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.entities.is_valid(id) && self.components.has::<T>(id)
    }

    /// Run `f` on a shared reference to a component
    pub fn with_component<T: Component, R>(&self, id: EntityId, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.check(id)?;
        self.components.with_component(id, f)
    }

    /// Run `f` on an exclusive reference to a component
    pub fn with_component_mut<T: Component, R>(&self, id: EntityId, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        self.check(id)?;
        self.components.with_component_mut(id, f)
    }

    /// Add a system; its `on_create` hook runs immediately
    ///
    /// Systems added after `initialize` also receive `post_initialize`.
    pub fn add_system<S: System + 'static>(&mut self, mut system: S) {
        if let Err(err) = system.on_create(self) {
            error!(system = system.name(), error = %err, "on_create failed");
        }
        if self.initialized {
            if let Err(err) = system.post_initialize(self) {
                error!(system = system.name(), error = %err, "post_initialize failed");
            }
        }
        self.scheduler.add_system(Box::new(system));
    }

    /// Number of registered systems
    pub fn system_count(&self) -> usize {
        self.scheduler.system_count()
    }

    /// System names in execution order
    pub fn system_names(&self) -> Vec<String> {
        self.scheduler.system_names()
    }

    /// Second-phase initialization for all systems
    pub fn initialize(&mut self) -> FrameReport {
        let mut scheduler = std::mem::take(&mut self.scheduler);
        let report = scheduler.post_initialize(self);
        self.scheduler = scheduler;
        self.initialized = true;
        report
    }

    /// Run one frame of every enabled system
    pub fn update(&mut self, dt: f32) -> FrameReport {
        if !self.initialized {
            self.initialize();
        }
        let mut scheduler = std::mem::take(&mut self.scheduler);
        let report = scheduler.run(self, dt);
        self.scheduler = scheduler;
        report
    }

    /// Destroy all systems
    pub fn shutdown(&mut self) {
        let mut scheduler = std::mem::take(&mut self.scheduler);
        scheduler.shutdown(self);
        self.initialized = false;
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
