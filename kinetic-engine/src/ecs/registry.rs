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
//! Component registry
//!
//! Maps each registered component type to its `ComponentArray`. Types must be
//! registered before use; `has` answers false for unknown types while
//! `add`/`get`/`remove` report an `UnregisteredComponent` error.

use crate::ecs::component::{Component, ComponentArray, ComponentListener, ErasedArray};
use crate::ecs::EntityId;
use crate::error::{EngineError, Result};
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

struct Entry {
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn ErasedArray>,
}

/// Type-erased registry of component arrays
///
/// The registry lock only guards the type map; each array carries its own
/// reader/writer lock, so iterating one type never blocks another.
#[derive(Default)]
pub struct ComponentRegistry {
    arrays: RwLock<HashMap<TypeId, Entry>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type; returns false if it was already registered
    pub fn register<T: Component>(&self) -> bool {
        let mut arrays = self.arrays.write();
        if arrays.contains_key(&TypeId::of::<T>()) {
            return false;
        }
        let array = Arc::new(ComponentArray::<T>::new());
        arrays.insert(
            TypeId::of::<T>(),
            Entry {
                typed: array.clone(),
                erased: array,
            },
        );
        true
    }

    /// True when `T` has been registered
    pub fn is_registered<T: Component>(&self) -> bool {
        self.arrays.read().contains_key(&TypeId::of::<T>())
    }

    /// Shared handle to the array for `T`
    pub fn array<T: Component>(&self) -> Option<Arc<ComponentArray<T>>> {
        let typed = self.arrays.read().get(&TypeId::of::<T>())?.typed.clone();
        typed.downcast::<ComponentArray<T>>().ok()
    }

    fn require<T: Component>(&self) -> Result<Arc<ComponentArray<T>>> {
        self.array::<T>().ok_or_else(|| {
            warn!(component = type_name::<T>(), "component type is not registered");
            EngineError::UnregisteredComponent(type_name::<T>())
        })
    }

    /// Attach or replace a component
    pub fn add<T: Component>(&self, id: EntityId, value: T) -> Result<()> {
        self.require::<T>()?.insert(id, value);
        Ok(())
    }

    /// Detach a component, returning it if it was present
    pub fn remove<T: Component>(&self, id: EntityId) -> Result<Option<T>> {
        Ok(self.require::<T>()?.remove(id))
    }

    /// Copy of a component
    pub fn get<T: Component + Clone>(&self, id: EntityId) -> Result<T> {
        self.require::<T>()?
            .get(id)
            .ok_or(EngineError::MissingComponent {
                entity: id,
                component: type_name::<T>(),
            })
    }

    /// Run `f` on a shared reference to a component
    pub fn with_component<T: Component, R>(&self, id: EntityId, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.require::<T>()?
            .with(id, f)
            .ok_or(EngineError::MissingComponent {
                entity: id,
                component: type_name::<T>(),
            })
    }

    /// Run `f` on an exclusive reference to a component
    pub fn with_component_mut<T: Component, R>(
        &self,
        id: EntityId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R> {
        self.require::<T>()?
            .with_mut(id, f)
            .ok_or(EngineError::MissingComponent {
                entity: id,
                component: type_name::<T>(),
            })
    }

    /// Presence check; false when `T` is unregistered
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        self.array::<T>().map_or(false, |a| a.contains(id))
    }

    /// Visit every `T` under its shared lock
    ///
    /// The callback must not add or remove components of type `T`.
    pub fn for_each<T: Component>(&self, f: impl FnMut(EntityId, &T)) {
        if let Some(array) = self.array::<T>() {
            array.for_each(f);
        }
    }

    /// Visit every `T` under its exclusive lock
    pub fn for_each_mut<T: Component>(&self, f: impl FnMut(EntityId, &mut T)) {
        if let Some(array) = self.array::<T>() {
            array.for_each_mut(f);
        }
    }

    /// Visit every `T` under its exclusive lock, reporting only changed values
    pub fn for_each_changed<T: Component>(&self, f: impl FnMut(EntityId, &mut T) -> bool) {
        if let Some(array) = self.array::<T>() {
            array.for_each_changed(f);
        }
    }

    /// Entities holding a `T`, sorted by index
    pub fn entities_with<T: Component>(&self) -> Vec<EntityId> {
        self.array::<T>().map(|a| a.entities()).unwrap_or_default()
    }

    /// Number of `T` components
    pub fn count<T: Component>(&self) -> usize {
        self.array::<T>().map_or(0, |a| a.len())
    }

    /// Register a change listener for `T`
    pub fn on_change<T: Component>(&self, listener: ComponentListener<T>) -> Result<()> {
        self.require::<T>()?.subscribe(listener);
        Ok(())
    }

    /// Remove every component of an entity; returns how many were removed
    pub fn remove_all(&self, id: EntityId) -> usize {
        let arrays: Vec<Arc<dyn ErasedArray>> =
            self.arrays.read().values().map(|e| e.erased.clone()).collect();
        arrays.iter().filter(|a| a.remove_entity(id)).count()
    }

    /// True when any array holds a component for `id`
    pub fn has_any(&self, id: EntityId) -> bool {
        self.arrays.read().values().any(|e| e.erased.contains_entity(id))
    }

    /// Total components across all types
    pub fn total_components(&self) -> usize {
        self.arrays.read().values().map(|e| e.erased.component_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position(f32);
    impl Component for Position {}

    #[derive(Debug, Clone, PartialEq)]
    struct Name(&'static str);
    impl Component for Name {}

    #[test]
    fn test_register_once() {
        let registry = ComponentRegistry::new();
        assert!(registry.register::<Position>());
        assert!(!registry.register::<Position>());
        assert!(registry.is_registered::<Position>());
    }

    #[test]
    fn test_unregistered_type() {
        let registry = ComponentRegistry::new();
        let e = EntityId::new(0, 0);
        assert!(!registry.has::<Position>(e));
        assert_eq!(
            registry.add(e, Position(1.0)),
            Err(EngineError::UnregisteredComponent(type_name::<Position>()))
        );
        assert!(registry.get::<Position>(e).is_err());
    }

    #[test]
    fn test_missing_component_error() {
        let registry = ComponentRegistry::new();
        registry.register::<Position>();
        let err = registry.get::<Position>(EntityId::new(4, 0)).unwrap_err();
        assert!(matches!(err, EngineError::MissingComponent { .. }));
    }

    #[test]
    fn test_remove_all_cascades() {
        let registry = ComponentRegistry::new();
        registry.register::<Position>();
        registry.register::<Name>();
        let e = EntityId::new(2, 0);
        registry.add(e, Position(3.0)).unwrap();
        registry.add(e, Name("crate")).unwrap();
        assert_eq!(registry.total_components(), 2);

        assert_eq!(registry.remove_all(e), 2);
        assert!(!registry.has_any(e));
    }

    #[test]
    fn test_with_component_mut() {
        let registry = ComponentRegistry::new();
        registry.register::<Position>();
        let e = EntityId::new(0, 0);
        registry.add(e, Position(1.0)).unwrap();
        registry.with_component_mut::<Position, _>(e, |p| p.0 = 2.0).unwrap();
        assert_eq!(registry.get::<Position>(e).unwrap(), Position(2.0));
    }
}
