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
//! Entity management
//!
//! Entities are version-tagged handles into a slot table. Destroying an
//! entity bumps its slot version and pushes the index onto a free list, so
//! stale handles fail validation even after the index is reused.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

/// Unique identifier for an entity: slot index plus version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    index: u32,
    version: u32,
}

impl EntityId {
    /// Sentinel handle that never validates
    pub const INVALID: EntityId = EntityId {
        index: u32::MAX,
        version: 0,
    };

    /// Create a handle from raw parts
    pub const fn new(index: u32, version: u32) -> Self {
        EntityId { index, version }
    }

    /// Slot index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot version at creation time
    pub fn version(&self) -> u32 {
        self.version
    }

    /// True unless this is the `INVALID` sentinel
    pub fn is_some(&self) -> bool {
        self.index != u32::MAX
    }

    /// Pack into 64 bits (version high, index low)
    pub fn to_bits(&self) -> u64 {
        ((self.version as u64) << 32) | self.index as u64
    }

    /// Unpack from `to_bits`
    pub fn from_bits(bits: u64) -> Self {
        EntityId {
            index: bits as u32,
            version: (bits >> 32) as u32,
        }
    }
}

impl Default for EntityId {
    fn default() -> Self {
        EntityId::INVALID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_some() {
            write!(f, "Entity({}, v{})", self.index, self.version)
        } else {
            write!(f, "Entity(invalid)")
        }
    }
}

/// Creation parameters for an entity
#[derive(Debug, Clone)]
pub struct EntityDesc {
    /// Optional human-readable name
    pub name: Option<String>,
    /// Initial tags
    pub tags: Vec<String>,
    /// Initial active flag
    pub active: bool,
}

impl EntityDesc {
    /// Descriptor with a name
    pub fn named(name: impl Into<String>) -> Self {
        EntityDesc {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

impl Default for EntityDesc {
    fn default() -> Self {
        EntityDesc {
            name: None,
            tags: Vec::new(),
            active: true,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    version: u32,
    alive: bool,
    active: bool,
    name: Option<String>,
    tags: HashSet<String>,
}

#[derive(Debug, Default)]
struct EntityStore {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    tag_index: HashMap<String, HashSet<EntityId>>,
    alive_count: usize,
}

impl EntityStore {
    fn slot(&self, id: EntityId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.alive && s.version == id.version)
    }

    fn slot_mut(&mut self, id: EntityId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.alive && s.version == id.version)
    }
}

/// Thread-safe entity store
///
/// Mutations take the exclusive lock, queries the shared one. Operations on
/// invalid handles log a warning and do nothing.
#[derive(Debug, Default)]
pub struct EntityManager {
    store: RwLock<EntityStore>,
}

impl EntityManager {
    /// Create a new empty entity manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity, reusing a freed slot when one is available
    pub fn create(&self, desc: EntityDesc) -> EntityId {
        let mut store = self.store.write();
        let index = match store.free_list.pop() {
            Some(index) => index,
            None => {
                store.slots.push(Slot::default());
                (store.slots.len() - 1) as u32
            }
        };

        let slot = &mut store.slots[index as usize];
        slot.alive = true;
        slot.active = desc.active;
        slot.name = desc.name;
        slot.tags = desc.tags.iter().cloned().collect();
        let id = EntityId::new(index, slot.version);

        for tag in desc.tags {
            store.tag_index.entry(tag).or_default().insert(id);
        }
        store.alive_count += 1;
        id
    }

    /// Destroy an entity; returns false for invalid handles
    pub fn destroy(&self, id: EntityId) -> bool {
        let mut guard = self.store.write();
        let store = &mut *guard;
        let Some(slot) = store.slot_mut(id) else {
            warn!(entity = %id, "destroy called on invalid entity");
            return false;
        };

        slot.alive = false;
        slot.active = false;
        slot.name = None;
        slot.version = slot.version.wrapping_add(1);
        let tags = std::mem::take(&mut slot.tags);

        for tag in tags {
            if let Some(set) = store.tag_index.get_mut(&tag) {
                set.remove(&id);
                if set.is_empty() {
                    store.tag_index.remove(&tag);
                }
            }
        }
        store.free_list.push(id.index);
        store.alive_count -= 1;
        true
    }

    /// True when the handle refers to a live entity with a matching version
    pub fn is_valid(&self, id: EntityId) -> bool {
        self.store.read().slot(id).is_some()
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.store.read().alive_count
    }

    /// True when no entity is alive
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entity name, if any
    pub fn name(&self, id: EntityId) -> Option<String> {
        self.store.read().slot(id).and_then(|s| s.name.clone())
    }

    /// Attach a tag
    pub fn add_tag(&self, id: EntityId, tag: &str) -> bool {
        let mut guard = self.store.write();
        let store = &mut *guard;
        let Some(slot) = store.slot_mut(id) else {
            warn!(entity = %id, tag, "add_tag called on invalid entity");
            return false;
        };
        if slot.tags.insert(tag.to_owned()) {
            store.tag_index.entry(tag.to_owned()).or_default().insert(id);
        }
        true
    }

    /// Detach a tag; returns whether it was present
    pub fn remove_tag(&self, id: EntityId, tag: &str) -> bool {
        let mut guard = self.store.write();
        let store = &mut *guard;
        let Some(slot) = store.slot_mut(id) else {
            warn!(entity = %id, tag, "remove_tag called on invalid entity");
            return false;
        };
        if !slot.tags.remove(tag) {
            return false;
        }
        if let Some(set) = store.tag_index.get_mut(tag) {
            set.remove(&id);
            if set.is_empty() {
                store.tag_index.remove(tag);
            }
        }
        true
    }

    /// Tag membership
    pub fn has_tag(&self, id: EntityId, tag: &str) -> bool {
        self.store
            .read()
            .slot(id)
            .map(|s| s.tags.contains(tag))
            .unwrap_or(false)
    }

    /// Tags of an entity, sorted
    pub fn tags(&self, id: EntityId) -> Vec<String> {
        let store = self.store.read();
        let mut tags: Vec<String> = store
            .slot(id)
            .map(|s| s.tags.iter().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    /// Set the active flag
    pub fn set_active(&self, id: EntityId, active: bool) {
        match self.store.write().slot_mut(id) {
            Some(slot) => slot.active = active,
            None => warn!(entity = %id, "set_active called on invalid entity"),
        }
    }

    /// Active flag; false for invalid handles
    pub fn is_active(&self, id: EntityId) -> bool {
        self.store.read().slot(id).map(|s| s.active).unwrap_or(false)
    }

    /// Live entities carrying `tag`, sorted by index
    pub fn entities_with_tag(&self, tag: &str) -> Vec<EntityId> {
        let store = self.store.read();
        let mut ids: Vec<EntityId> = store
            .tag_index
            .get(tag)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// All live entities, sorted by index
    pub fn all_entities(&self) -> Vec<EntityId> {
        let store = self.store.read();
        store
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.alive)
            .map(|(i, s)| EntityId::new(i as u32, s.version))
            .collect()
    }

    /// Check that the tag index agrees with per-entity tag sets
    pub fn tag_index_consistent(&self) -> bool {
        let store = self.store.read();
        let forward = store.slots.iter().enumerate().all(|(i, s)| {
            let id = EntityId::new(i as u32, s.version);
            s.tags
                .iter()
                .all(|t| store.tag_index.get(t).map_or(false, |set| set.contains(&id)))
        });
        let reverse = store.tag_index.iter().all(|(tag, set)| {
            set.iter()
                .all(|id| store.slot(*id).map_or(false, |s| s.tags.contains(tag)))
        });
        forward && reverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_creation() {
        let manager = EntityManager::new();
        let e = manager.create(EntityDesc::named("player"));
        assert!(manager.is_valid(e));
        assert!(manager.is_active(e));
        assert_eq!(manager.name(e).as_deref(), Some("player"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_free_list_reuse_bumps_version() {
        let manager = EntityManager::new();
        let e1 = manager.create(EntityDesc::default());
        assert!(manager.destroy(e1));
        assert!(!manager.is_valid(e1));

        let e2 = manager.create(EntityDesc::default());
        assert_eq!(e2.index(), e1.index());
        assert_eq!(e2.version(), e1.version() + 1);
        assert!(!manager.is_valid(e1));
        assert!(manager.is_valid(e2));
    }

    #[test]
    fn test_invalid_handle_is_noop() {
        let manager = EntityManager::new();
        assert!(!manager.destroy(EntityId::INVALID));
        assert!(!manager.add_tag(EntityId::new(7, 0), "x"));
        manager.set_active(EntityId::INVALID, false);
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_tags_follow_lifecycle() {
        let manager = EntityManager::new();
        let a = manager.create(EntityDesc::default().with_tag("enemy"));
        let b = manager.create(EntityDesc::default());
        manager.add_tag(b, "enemy");
        manager.add_tag(b, "boss");

        assert_eq!(manager.entities_with_tag("enemy"), vec![a, b]);
        assert!(manager.remove_tag(b, "enemy"));
        assert!(!manager.remove_tag(b, "enemy"));
        assert_eq!(manager.entities_with_tag("enemy"), vec![a]);

        manager.destroy(b);
        assert!(manager.entities_with_tag("boss").is_empty());
        assert!(manager.tag_index_consistent());
    }

    #[test]
    fn test_bits_round_trip() {
        let id = EntityId::new(12, 99);
        assert_eq!(EntityId::from_bits(id.to_bits()), id);
        assert!(!EntityId::INVALID.is_some());
    }
}
