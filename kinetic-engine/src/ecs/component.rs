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
//! Component storage
//!
//! Components are plain data attached to entities. Each component type lives
//! in its own `ComponentArray`, a keyed map behind a reader/writer lock with
//! optional change listeners.

use crate::ecs::EntityId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait that all components must implement
///
/// Components should be plain data structures without behavior.
pub trait Component: 'static + Send + Sync {}

/// Kind of change reported to component listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentEvent {
    /// Component attached to an entity (also on replacement)
    Added,
    /// Component detached; the listener sees the removed value
    Removed,
    /// Component mutated through the registry
    Modified,
}

/// Change listener for components of type `T`
///
/// Listeners run synchronously while the array's write lock is held, so they
/// must not touch the same component type through the registry.
pub type ComponentListener<T> = Arc<dyn Fn(EntityId, ComponentEvent, &T) + Send + Sync>;

/// Keyed storage for one component type
pub struct ComponentArray<T: Component> {
    data: RwLock<HashMap<EntityId, T>>,
    listeners: RwLock<Vec<ComponentListener<T>>>,
}

impl<T: Component> ComponentArray<T> {
    /// Create a new empty array
    pub fn new() -> Self {
        ComponentArray {
            data: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    fn notify(&self, id: EntityId, event: ComponentEvent, value: &T) {
        for listener in self.listeners.read().iter() {
            listener(id, event, value);
        }
    }

    /// Register a change listener
    pub fn subscribe(&self, listener: ComponentListener<T>) {
        self.listeners.write().push(listener);
    }

    /// Insert or replace, returning the previous value
    pub fn insert(&self, id: EntityId, value: T) -> Option<T> {
        let mut data = self.data.write();
        let previous = data.insert(id, value);
        if let Some(stored) = data.get(&id) {
            self.notify(id, ComponentEvent::Added, stored);
        }
        previous
    }

    /// Remove the component of an entity
    pub fn remove(&self, id: EntityId) -> Option<T> {
        let mut data = self.data.write();
        let removed = data.remove(&id);
        if let Some(value) = &removed {
            self.notify(id, ComponentEvent::Removed, value);
        }
        removed
    }

    /// Presence check
    pub fn contains(&self, id: EntityId) -> bool {
        self.data.read().contains_key(&id)
    }

    /// Run `f` on a shared reference
    pub fn with<R>(&self, id: EntityId, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.data.read().get(&id).map(f)
    }

    /// Run `f` on an exclusive reference, then notify `Modified`
    pub fn with_mut<R>(&self, id: EntityId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut data = self.data.write();
        let value = data.get_mut(&id)?;
        let result = f(&mut *value);
        self.notify(id, ComponentEvent::Modified, value);
        Some(result)
    }

    /// Visit every component under the shared lock
    pub fn for_each(&self, mut f: impl FnMut(EntityId, &T)) {
        for (id, value) in self.data.read().iter() {
            f(*id, value);
        }
    }

    /// Visit every component under the exclusive lock, notifying `Modified`
    pub fn for_each_mut(&self, mut f: impl FnMut(EntityId, &mut T)) {
        let mut data = self.data.write();
        for (id, value) in data.iter_mut() {
            f(*id, &mut *value);
            self.notify(*id, ComponentEvent::Modified, value);
        }
    }

    /// Visit every component under the exclusive lock; `f` returns whether it
    /// changed the value, and only changed values are reported as `Modified`
    pub fn for_each_changed(&self, mut f: impl FnMut(EntityId, &mut T) -> bool) {
        let mut data = self.data.write();
        for (id, value) in data.iter_mut() {
            if f(*id, &mut *value) {
                self.notify(*id, ComponentEvent::Modified, value);
            }
        }
    }

    /// Entities holding this component, sorted by index
    pub fn entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.data.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of stored components
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Component + Clone> ComponentArray<T> {
    /// Copy of the component of an entity
    pub fn get(&self, id: EntityId) -> Option<T> {
        self.data.read().get(&id).cloned()
    }
}

impl<T: Component> Default for ComponentArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a component array used for destruction cascades
pub(crate) trait ErasedArray: Send + Sync {
    fn remove_entity(&self, id: EntityId) -> bool;
    fn contains_entity(&self, id: EntityId) -> bool;
    fn component_count(&self) -> usize;
}

impl<T: Component> ErasedArray for ComponentArray<T> {
    fn remove_entity(&self, id: EntityId) -> bool {
        self.remove(id).is_some()
    }

    fn contains_entity(&self, id: EntityId) -> bool {
        self.contains(id)
    }

    fn component_count(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    #[test]
    fn test_insert_get_remove() {
        let array = ComponentArray::<Health>::new();
        let e = EntityId::new(0, 0);
        assert!(array.insert(e, Health(10)).is_none());
        assert_eq!(array.get(e), Some(Health(10)));
        assert_eq!(array.insert(e, Health(5)), Some(Health(10)));
        assert_eq!(array.remove(e), Some(Health(5)));
        assert!(!array.contains(e));
    }

    #[test]
    fn test_listeners_see_every_change() {
        let array = ComponentArray::<Health>::new();
        let added = Arc::new(AtomicUsize::new(0));
        let removed = Arc::new(AtomicUsize::new(0));
        let modified = Arc::new(AtomicUsize::new(0));
        {
            let (a, r, m) = (added.clone(), removed.clone(), modified.clone());
            array.subscribe(Arc::new(move |_: EntityId, event: ComponentEvent, _: &Health| {
                let counter = match event {
                    ComponentEvent::Added => &a,
                    ComponentEvent::Removed => &r,
                    ComponentEvent::Modified => &m,
                };
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let e = EntityId::new(1, 0);
        array.insert(e, Health(1));
        array.with_mut(e, |h| h.0 += 1);
        array.remove(e);
        array.remove(e);

        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert_eq!(modified.load(Ordering::SeqCst), 1);
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entities_sorted() {
        let array = ComponentArray::<Health>::new();
        for i in [5u32, 1, 3] {
            array.insert(EntityId::new(i, 0), Health(i as i32));
        }
        let ids: Vec<u32> = array.entities().iter().map(|e| e.index()).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }
}
