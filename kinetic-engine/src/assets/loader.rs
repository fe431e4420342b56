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
//! Background asset loader
//!
//! Requests go onto a crossbeam job queue drained by a fixed pool of worker
//! threads. Finished loads wait in a result channel until the render thread
//! calls [`AssetLoader::poll_completed`], which is where GPU upload would
//! happen.

use crate::assets::source::{AssetData, AssetKind, AssetSource};
use crate::config::AssetLoaderConfig;
use crate::error::{EngineError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct Job {
    name: String,
    kind: AssetKind,
}

/// Snapshot of loader progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    /// Queued, not yet picked up by a worker
    pub pending: usize,
    /// Being loaded by a worker
    pub loading: usize,
    /// Loaded, waiting for `poll_completed`
    pub waiting_upload: usize,
}

/// A finished request
#[derive(Debug)]
pub struct LoadedAsset {
    /// Requested name
    pub name: String,
    /// Requested kind
    pub kind: AssetKind,
    /// Data or the source's error
    pub result: Result<AssetData>,
}

#[derive(Default)]
struct Progress {
    counts: Mutex<LoadCounts>,
    changed: Condvar,
}

impl Progress {
    fn update(&self, f: impl FnOnce(&mut LoadCounts)) {
        f(&mut self.counts.lock());
        self.changed.notify_all();
    }
}

/// Worker-pool asset loader
pub struct AssetLoader {
    jobs: Option<Sender<Job>>,
    completed: Receiver<LoadedAsset>,
    workers: Vec<JoinHandle<()>>,
    progress: Arc<Progress>,
}

impl AssetLoader {
    /// Spawn `config.worker_count` workers reading from `source`
    pub fn new(config: &AssetLoaderConfig, source: Arc<dyn AssetSource>) -> Result<Self> {
        config.validate()?;
        let (job_tx, job_rx) = if config.queue_capacity > 0 {
            bounded(config.queue_capacity)
        } else {
            unbounded()
        };
        let (done_tx, done_rx) = unbounded();
        let progress = Arc::new(Progress::default());

        let mut workers = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            let jobs: Receiver<Job> = job_rx.clone();
            let done = done_tx.clone();
            let source = Arc::clone(&source);
            let progress = Arc::clone(&progress);
            let handle = std::thread::Builder::new()
                .name(format!("asset-loader-{index}"))
                .spawn(move || worker_loop(&jobs, &done, source.as_ref(), &progress))
                .map_err(|e| EngineError::AssetLoad {
                    name: String::new(),
                    reason: format!("failed to spawn worker: {e}"),
                })?;
            workers.push(handle);
        }
        debug!(workers = workers.len(), "asset loader started");

        Ok(AssetLoader {
            jobs: Some(job_tx),
            completed: done_rx,
            workers,
            progress,
        })
    }

    /// Queue a load; fails when the queue is full or the loader is shut down
    pub fn request(&self, name: impl Into<String>, kind: AssetKind) -> Result<()> {
        let name = name.into();
        let Some(jobs) = &self.jobs else {
            return Err(EngineError::AssetLoad {
                name,
                reason: "loader is shut down".into(),
            });
        };
        self.progress.update(|c| c.pending += 1);
        match jobs.try_send(Job { name, kind }) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.progress.update(|c| c.pending = c.pending.saturating_sub(1));
                let reason = match err {
                    TrySendError::Full(_) => "job queue is full",
                    TrySendError::Disconnected(_) => "workers have exited",
                };
                Err(EngineError::AssetLoad {
                    name: err.into_inner().name,
                    reason: reason.into(),
                })
            }
        }
    }

    /// Drain finished loads; call from the render thread
    pub fn poll_completed(&self) -> Vec<LoadedAsset> {
        let mut finished = Vec::new();
        while let Ok(loaded) = self.completed.try_recv() {
            if let Err(err) = &loaded.result {
                warn!(asset = %loaded.name, error = %err, "asset load failed");
            }
            finished.push(loaded);
        }
        if !finished.is_empty() {
            let n = finished.len();
            self.progress
                .update(|c| c.waiting_upload = c.waiting_upload.saturating_sub(n));
        }
        finished
    }

    /// Current progress counters
    pub fn counts(&self) -> LoadCounts {
        *self.progress.counts.lock()
    }

    /// True when nothing is queued, loading or waiting for upload
    pub fn is_idle(&self) -> bool {
        self.counts() == LoadCounts::default()
    }

    /// Block until every request has finished loading or `timeout` elapses
    ///
    /// Finished loads still need `poll_completed`. Returns false on timeout.
    pub fn wait_all(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut counts = self.progress.counts.lock();
        while counts.pending + counts.loading > 0 {
            if self
                .progress
                .changed
                .wait_until(&mut counts, deadline)
                .timed_out()
            {
                return counts.pending + counts.loading == 0;
            }
        }
        true
    }

    /// Stop accepting work, let workers finish queued jobs and join them
    pub fn shutdown(&mut self) {
        if self.jobs.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("asset loader worker panicked");
            }
        }
        debug!("asset loader stopped");
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("workers", &self.workers.len())
            .field("counts", &self.counts())
            .finish()
    }
}

fn worker_loop(
    jobs: &Receiver<Job>,
    done: &Sender<LoadedAsset>,
    source: &dyn AssetSource,
    progress: &Progress,
) {
    while let Ok(job) = jobs.recv() {
        progress.update(|c| {
            c.pending = c.pending.saturating_sub(1);
            c.loading += 1;
        });
        let result = source.load(&job.name, job.kind);
        // counted before the send so poll_completed never sees it uncounted
        progress.update(|c| {
            c.loading = c.loading.saturating_sub(1);
            c.waiting_upload += 1;
        });
        let loaded = LoadedAsset {
            name: job.name,
            kind: job.kind,
            result,
        };
        if done.send(loaded).is_err() {
            progress.update(|c| c.waiting_upload = c.waiting_upload.saturating_sub(1));
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::source::{MaterialData, MemorySource, MeshData};
    use crate::math::Vec3;

    fn source() -> Arc<dyn AssetSource> {
        Arc::new(
            MemorySource::new()
                .with(
                    "tri",
                    AssetData::Mesh(MeshData {
                        positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                        normals: Vec::new(),
                        indices: vec![0, 1, 2],
                    }),
                )
                .with("steel", AssetData::Material(MaterialData::default())),
        )
    }

    #[test]
    fn test_loads_complete_and_drain() {
        let loader = AssetLoader::new(&AssetLoaderConfig::default(), source()).unwrap();
        loader.request("tri", AssetKind::Mesh).unwrap();
        loader.request("steel", AssetKind::Material).unwrap();
        assert!(loader.wait_all(Duration::from_secs(5)));
        assert_eq!(loader.counts().waiting_upload, 2);

        let mut done = loader.poll_completed();
        done.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].name, "steel");
        match &done[1].result {
            Ok(AssetData::Mesh(mesh)) => assert_eq!(mesh.triangle_count(), 1),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(loader.is_idle());
    }

    #[test]
    fn test_failures_are_reported_not_dropped() {
        let loader = AssetLoader::new(&AssetLoaderConfig::default(), source()).unwrap();
        loader.request("missing", AssetKind::Texture).unwrap();
        loader.request("tri", AssetKind::Texture).unwrap();
        assert!(loader.wait_all(Duration::from_secs(5)));
        let done = loader.poll_completed();
        assert_eq!(done.len(), 2);
        assert!(done.iter().all(|d| d.result.is_err()));
    }

    #[test]
    fn test_shutdown_rejects_new_requests() {
        let mut loader = AssetLoader::new(&AssetLoaderConfig::default(), source()).unwrap();
        loader.shutdown();
        assert!(loader.request("tri", AssetKind::Mesh).is_err());
        assert_eq!(loader.counts().pending, 0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = AssetLoaderConfig {
            worker_count: 0,
            queue_capacity: 0,
        };
        assert!(AssetLoader::new(&config, source()).is_err());
    }

    #[test]
    fn test_wait_all_on_empty_loader_returns_immediately() {
        let loader = AssetLoader::new(&AssetLoaderConfig::default(), source()).unwrap();
        assert!(loader.wait_all(Duration::ZERO));
    }
}
