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
//! Scratch buffer pooling
//!
//! The collision pipeline needs a handful of short-lived vectors every fixed
//! step (broad-phase entries, candidate pairs, manifolds). `VecPool` keeps
//! cleared buffers around between steps so their capacity is reused instead
//! of reallocated.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Pool sizing
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Capacity reserved for freshly allocated buffers
    pub initial_capacity: usize,
    /// Buffers retained once returned; extras are dropped
    pub max_pool_size: usize,
    /// Log every allocation miss at debug level
    pub log_misses: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            initial_capacity: 64,
            max_pool_size: 8,
            log_misses: false,
        }
    }
}

impl PoolConfig {
    /// Custom capacity and retention
    pub fn new(initial_capacity: usize, max_pool_size: usize) -> Self {
        PoolConfig {
            initial_capacity,
            max_pool_size,
            log_misses: false,
        }
    }

    /// Builder: log allocation misses
    pub fn with_logging(mut self) -> Self {
        self.log_misses = true;
        self
    }
}

/// Pool usage counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions served by a retained buffer
    pub hits: usize,
    /// Acquisitions that had to allocate
    pub misses: usize,
    /// Buffers currently retained
    pub pool_size: usize,
    /// Largest number of buffers ever retained
    pub peak_size: usize,
}

impl PoolStats {
    /// Share of acquisitions served from the pool, in percent
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug)]
struct Shared<T> {
    buffers: Mutex<Vec<Vec<T>>>,
    stats: Mutex<PoolStats>,
}

/// Thread-safe pool of reusable `Vec<T>` buffers
///
/// Clones share the same underlying buffers.
#[derive(Debug)]
pub struct VecPool<T> {
    shared: Arc<Shared<T>>,
    config: PoolConfig,
}

impl<T> VecPool<T> {
    /// Pool with default sizing
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Pool with custom sizing
    pub fn with_config(config: PoolConfig) -> Self {
        VecPool {
            shared: Arc::new(Shared {
                buffers: Mutex::new(Vec::new()),
                stats: Mutex::new(PoolStats::default()),
            }),
            config,
        }
    }

    /// Borrow an empty buffer; it returns to the pool when the guard drops
    pub fn acquire(&self) -> VecGuard<T> {
        // buffers lock is released before stats is taken
        let (buffer, hit, retained) = {
            let mut buffers = self.shared.buffers.lock();
            match buffers.pop() {
                Some(mut b) => {
                    b.clear();
                    (b, true, buffers.len())
                }
                None => (Vec::with_capacity(self.config.initial_capacity), false, buffers.len()),
            }
        };
        {
            let mut stats = self.shared.stats.lock();
            if hit {
                stats.hits += 1;
            } else {
                stats.misses += 1;
                if self.config.log_misses {
                    debug!(hit_rate = stats.hit_rate(), "scratch pool allocated a new buffer");
                }
            }
            stats.pool_size = retained;
        }
        VecGuard {
            buffer: Some(buffer),
            shared: Arc::clone(&self.shared),
            max_pool_size: self.config.max_pool_size,
        }
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> PoolStats {
        self.shared.stats.lock().clone()
    }

    /// Drop every retained buffer
    pub fn clear(&self) {
        self.shared.buffers.lock().clear();
        self.shared.stats.lock().pool_size = 0;
    }

    /// Buffers currently retained
    pub fn len(&self) -> usize {
        self.shared.buffers.lock().len()
    }

    /// True when no buffer is retained
    pub fn is_empty(&self) -> bool {
        self.shared.buffers.lock().is_empty()
    }
}

impl<T> Default for VecPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for VecPool<T> {
    fn clone(&self) -> Self {
        VecPool {
            shared: Arc::clone(&self.shared),
            config: self.config.clone(),
        }
    }
}

/// RAII handle to a pooled buffer
pub struct VecGuard<T> {
    buffer: Option<Vec<T>>,
    shared: Arc<Shared<T>>,
    max_pool_size: usize,
}

impl<T> VecGuard<T> {
    /// Take the buffer out of the pool for good
    pub fn into_inner(mut self) -> Vec<T> {
        self.buffer.take().unwrap_or_default()
    }
}

impl<T> std::ops::Deref for VecGuard<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        // only `into_inner` and `drop` take the buffer, and both consume the guard
        self.buffer.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T> std::ops::DerefMut for VecGuard<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        self.buffer.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for VecGuard<T> {
    fn drop(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        let mut buffers = self.shared.buffers.lock();
        if buffers.len() < self.max_pool_size {
            buffers.push(buffer);
            let retained = buffers.len();
            drop(buffers);
            let mut stats = self.shared.stats.lock();
            stats.pool_size = retained;
            stats.peak_size = stats.peak_size.max(retained);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_return() {
        let pool: VecPool<u32> = VecPool::new();
        {
            let mut guard = pool.acquire();
            guard.push(7);
            assert_eq!(guard.len(), 1);
        }
        assert_eq!(pool.len(), 1);
        let stats = pool.stats();
        assert_eq!((stats.hits, stats.misses), (0, 1));
    }

    #[test]
    fn test_reused_buffer_is_cleared() {
        let pool: VecPool<u32> = VecPool::new();
        {
            let mut guard = pool.acquire();
            guard.extend(0..100);
        }
        let guard = pool.acquire();
        assert!(guard.is_empty());
        assert!(guard.capacity() >= 100);
        drop(guard);
        assert_eq!(pool.stats().hit_rate(), 50.0);
    }

    #[test]
    fn test_retention_is_bounded() {
        let pool: VecPool<u8> = VecPool::with_config(PoolConfig::new(4, 2));
        {
            let _a = pool.acquire();
            let _b = pool.acquire();
            let _c = pool.acquire();
        }
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.stats().peak_size, 2);
        pool.clear();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_into_inner_keeps_buffer_out_of_pool() {
        let pool: VecPool<u8> = VecPool::new();
        let mut guard = pool.acquire();
        guard.push(1);
        let owned = guard.into_inner();
        assert_eq!(owned, vec![1]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let pool: VecPool<usize> = VecPool::new();
        let other = pool.clone();
        let handle = std::thread::spawn(move || {
            let mut guard = other.acquire();
            guard.push(1);
        });
        {
            let mut guard = pool.acquire();
            guard.push(2);
        }
        handle.join().unwrap();
        assert!(pool.len() >= 1);
        assert_eq!(pool.stats().misses + pool.stats().hits, 2);
    }
}
