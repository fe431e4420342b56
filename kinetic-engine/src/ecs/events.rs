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
//! Typed publish/subscribe event bus
//!
//! Delivery is synchronous, on the publishing thread, in subscription order.
//! The bus releases its own lock before invoking listeners, so a listener may
//! publish other event types or subscribe new listeners. Publishing an event
//! type from inside a listener for that same type is refused and logged.

use parking_lot::{Mutex, RwLock};
use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::warn;

/// Marker for types that travel over the bus
pub trait Event: 'static + Send + Sync {}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ErasedListener = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Event bus keyed by event type
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<TypeId, Vec<(SubscriptionId, ErasedListener)>>>,
    in_flight: Mutex<HashSet<(ThreadId, TypeId)>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a new empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for events of type `E`
    pub fn subscribe<E: Event>(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let erased: ErasedListener = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                listener(event);
            }
        });
        self.listeners
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, erased));
        id
    }

    /// Remove a listener; returns false if the handle was unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        for list in listeners.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver `event` to every listener of its type
    ///
    /// Returns the number of listeners invoked.
    pub fn publish<E: Event>(&self, event: &E) -> usize {
        let type_id = TypeId::of::<E>();
        let key = (thread::current().id(), type_id);
        if !self.in_flight.lock().insert(key) {
            warn!(event = type_name::<E>(), "recursive publish dropped");
            return 0;
        }

        let snapshot: Vec<ErasedListener> = self
            .listeners
            .read()
            .get(&type_id)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in &snapshot {
            listener(event as &dyn Any);
        }

        self.in_flight.lock().remove(&key);
        snapshot.len()
    }

    /// Number of listeners for `E`
    pub fn listener_count<E: Event>(&self) -> usize {
        self.listeners
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, |l| l.len())
    }
}
