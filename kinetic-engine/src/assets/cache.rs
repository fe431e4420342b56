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
//! Shared resource cache

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Name-keyed store of reference-counted resources
///
/// Entities hold `Arc<T>` clones; the cache keeps one more so a resource
/// survives until [`ResourceCache::purge_unused`] finds nobody else using it.
#[derive(Debug)]
pub struct ResourceCache<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        ResourceCache {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> ResourceCache<T> {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, replacing any previous entry
    pub fn insert(&self, name: impl Into<String>, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.entries.write().insert(name.into(), Arc::clone(&value));
        value
    }

    /// Shared handle to a cached resource
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.read().get(name).cloned()
    }

    /// Cached handle, creating the resource on a miss
    pub fn get_or_insert_with(&self, name: &str, create: impl FnOnce() -> T) -> Arc<T> {
        if let Some(hit) = self.get(name) {
            return hit;
        }
        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(create())),
        )
    }

    /// True when `name` is cached
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Drop the cache's handle
    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        self.entries.write().remove(name)
    }

    /// Drop entries only the cache still references; returns how many
    pub fn purge_unused(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, v| Arc::strong_count(v) > 1);
        before - entries.len()
    }

    /// Cached entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_shared() {
        let cache = ResourceCache::new();
        let a = cache.insert("rock", 7u32);
        let b = cache.get("rock").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_get_or_insert_creates_once() {
        let cache = ResourceCache::new();
        let mut calls = 0;
        let first = cache.get_or_insert_with("mat", || {
            calls += 1;
            String::from("steel")
        });
        let second = cache.get_or_insert_with("mat", || unreachable!());
        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_purge_keeps_resources_in_use() {
        let cache = ResourceCache::new();
        let held = cache.insert("held", 1);
        cache.insert("dropped", 2);
        assert_eq!(cache.purge_unused(), 1);
        assert!(cache.contains("held"));
        assert!(!cache.contains("dropped"));
        drop(held);
        assert_eq!(cache.purge_unused(), 1);
        assert!(cache.is_empty());
    }
}
