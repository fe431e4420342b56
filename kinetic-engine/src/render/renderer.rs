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
//! Renderer façade
//!
//! Frame protocol on the render thread:
//!
//! ```text
//! begin_frame -> clear -> submit_renderable* -> end_frame -> present
//! ```
//!
//! `begin_frame` first runs every callback queued from other threads (debug
//! lines from physics, GPU uploads from the asset loader). `end_frame`
//! flushes whatever is still queued.

use crate::config::RendererConfig;
use crate::error::{EngineError, Result};
use crate::math::{Vec3, Vec4};
use crate::physics::debug::DebugLine;
use crate::render::backend::{GraphicsBackend, HeadlessBackend};
use crate::render::queue::{LayerId, RenderQueue, Renderable, SortPolicy};
use crate::render::thread::RenderThreadChecker;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

/// Work run on the render thread with access to the backend
pub type RenderCallback = Box<dyn FnOnce(&mut dyn GraphicsBackend) + Send>;

/// Counters of the current (or last finished) frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Renderables submitted
    pub submitted: u32,
    /// Backend draw calls issued
    pub draw_calls: u32,
    /// Draw calls that merged more than one renderable
    pub batches: u32,
    /// Triangles drawn
    pub triangles: u64,
    /// Callbacks run at `begin_frame`
    pub callbacks: u32,
    /// Callbacks still waiting in the queue
    pub queue_depth: u32,
    /// Frames presented since creation
    pub frames: u64,
}

/// Cloneable handle for queueing work onto the render thread
#[derive(Clone)]
pub struct RenderCallbackSender {
    sender: Sender<RenderCallback>,
}

impl RenderCallbackSender {
    /// Queue a callback for the next `begin_frame`
    ///
    /// # Errors
    ///
    /// [`EngineError::Renderer`] when the queue is full or the renderer is
    /// gone.
    pub fn send(&self, callback: RenderCallback) -> Result<()> {
        self.sender.try_send(callback).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::Renderer("render callback queue full".into()),
            TrySendError::Disconnected(_) => EngineError::Renderer("renderer dropped".into()),
        })
    }

    /// Queue debug lines to be drawn next frame
    pub fn send_debug_lines(&self, lines: Vec<DebugLine>) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        self.send(Box::new(move |backend| backend.draw_lines(&lines)))
    }

    /// Callbacks waiting
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

impl std::fmt::Debug for RenderCallbackSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCallbackSender")
            .field("pending", &self.sender.len())
            .finish()
    }
}

/// Headless-capable frame driver over a [`GraphicsBackend`]
pub struct Renderer<G: GraphicsBackend = HeadlessBackend> {
    config: RendererConfig,
    backend: G,
    checker: RenderThreadChecker,
    queue: RenderQueue,
    callbacks_tx: Sender<RenderCallback>,
    callbacks_rx: Receiver<RenderCallback>,
    camera: Vec3,
    stats: RenderStats,
    initialized: bool,
    in_frame: bool,
}

impl Renderer<HeadlessBackend> {
    /// Renderer without a GPU
    pub fn headless(config: RendererConfig) -> Result<Self> {
        Self::new(config, HeadlessBackend::new())
    }
}

impl<G: GraphicsBackend> Renderer<G> {
    /// Renderer bound to the calling thread
    pub fn new(config: RendererConfig, backend: G) -> Result<Self> {
        config.validate()?;
        let (callbacks_tx, callbacks_rx) = bounded(config.callback_queue_capacity);
        Ok(Renderer {
            config,
            backend,
            checker: RenderThreadChecker::new(),
            queue: RenderQueue::new(),
            callbacks_tx,
            callbacks_rx,
            camera: Vec3::ZERO,
            stats: RenderStats::default(),
            initialized: false,
            in_frame: false,
        })
    }

    /// Create the backend context with the given title and size
    pub fn initialize(&mut self, title: &str, width: u32, height: u32) -> Result<()> {
        self.checker.check("initialize")?;
        self.backend.initialize(title, width, height)?;
        self.config.title = title.to_owned();
        self.config.width = width;
        self.config.height = height;
        self.initialized = true;
        info!(backend = self.backend.name(), title, width, height, "renderer initialized");
        Ok(())
    }

    /// Initialize from the configured title and size
    pub fn initialize_from_config(&mut self) -> Result<()> {
        let RendererConfig { title, width, height, .. } = self.config.clone();
        self.initialize(&title, width, height)
    }

    /// Handle for queueing work from other threads
    pub fn callback_sender(&self) -> RenderCallbackSender {
        RenderCallbackSender {
            sender: self.callbacks_tx.clone(),
        }
    }

    /// Thread checker (e.g. to rebind after moving the renderer)
    pub fn thread_checker_mut(&mut self) -> &mut RenderThreadChecker {
        &mut self.checker
    }

    /// Backend
    pub fn backend(&self) -> &G {
        &self.backend
    }

    /// Backend, mutably
    pub fn backend_mut(&mut self) -> &mut G {
        &mut self.backend
    }

    /// Configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Camera position used by distance-sorted layers
    pub fn set_camera_position(&mut self, position: Vec3) {
        self.camera = position;
    }

    /// Add or redefine a layer
    pub fn add_layer(&mut self, id: LayerId, sort: SortPolicy) {
        self.queue.add_layer(id, sort);
    }

    /// Enable or disable a layer
    pub fn set_layer_enabled(&mut self, id: LayerId, enabled: bool) -> bool {
        self.queue.set_layer_enabled(id, enabled)
    }

    /// True between `begin_frame` and `end_frame`
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Start a frame: reset counters and run queued callbacks
    pub fn begin_frame(&mut self) -> Result<()> {
        self.checker.check("begin_frame")?;
        if !self.initialized {
            return Err(EngineError::Renderer("begin_frame before initialize".into()));
        }
        if self.in_frame {
            return Err(EngineError::Renderer("begin_frame inside a frame".into()));
        }
        self.in_frame = true;
        self.stats = RenderStats {
            frames: self.stats.frames,
            ..RenderStats::default()
        };
        for callback in self.callbacks_rx.try_iter() {
            callback(&mut self.backend);
            self.stats.callbacks += 1;
        }
        Ok(())
    }

    /// Clear the frame targets
    pub fn clear(&mut self, color: Vec4, depth: f32, stencil: u32) -> Result<()> {
        self.checker.check("clear")?;
        self.require_frame("clear")?;
        self.backend.clear(color, depth, stencil);
        Ok(())
    }

    /// Queue a renderable for this frame
    pub fn submit_renderable(&mut self, renderable: Renderable) -> Result<()> {
        self.require_frame("submit_renderable")?;
        let layer = renderable.layer;
        if !self.queue.push(renderable) {
            warn!(layer, "renderable submitted to unknown layer");
            return Err(EngineError::Renderer(format!("unknown layer {layer}")));
        }
        self.stats.submitted += 1;
        Ok(())
    }

    /// Sort, batch and draw everything queued so far
    pub fn flush_render_queue(&mut self) -> Result<()> {
        self.checker.check("flush_render_queue")?;
        self.require_frame("flush_render_queue")?;
        let draws = self.queue.drain_sorted(self.camera, self.config.batching);
        for draw in &draws {
            self.backend.draw(draw)?;
            self.stats.draw_calls += 1;
            self.stats.triangles += draw.triangles;
            if draw.instances.len() > 1 {
                self.stats.batches += 1;
            }
        }
        Ok(())
    }

    /// Finish the frame, flushing anything still queued
    pub fn end_frame(&mut self) -> Result<()> {
        self.checker.check("end_frame")?;
        self.require_frame("end_frame")?;
        if !self.queue.is_empty() {
            self.flush_render_queue()?;
        }
        self.in_frame = false;
        self.stats.queue_depth = self.callbacks_rx.len() as u32;
        debug!(
            draws = self.stats.draw_calls,
            batches = self.stats.batches,
            triangles = self.stats.triangles,
            "frame finished"
        );
        Ok(())
    }

    /// Show the finished frame
    pub fn present(&mut self) -> Result<()> {
        self.checker.check("present")?;
        if self.in_frame {
            return Err(EngineError::Renderer("present inside a frame".into()));
        }
        self.backend.present()?;
        self.stats.frames += 1;
        Ok(())
    }

    /// Counters of the current or last frame
    pub fn stats(&self) -> RenderStats {
        RenderStats {
            queue_depth: self.callbacks_rx.len() as u32,
            ..self.stats
        }
    }

    fn require_frame(&self, operation: &str) -> Result<()> {
        if self.in_frame {
            Ok(())
        } else {
            Err(EngineError::Renderer(format!("{operation} outside begin_frame/end_frame")))
        }
    }
}

impl<G: GraphicsBackend> std::fmt::Debug for Renderer<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("backend", &self.backend.name())
            .field("initialized", &self.initialized)
            .field("in_frame", &self.in_frame)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Mat4;
    use crate::render::backend::RecordedCall;
    use crate::render::queue::{MaterialHandle, MeshHandle};

    fn renderer() -> Renderer {
        let mut r = Renderer::headless(RendererConfig::default()).unwrap();
        r.initialize("test", 64, 64).unwrap();
        r
    }

    fn cube(material: u32, x: f32) -> Renderable {
        Renderable::new(
            MeshHandle(1),
            MaterialHandle(material),
            Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
            12,
        )
    }

    #[test]
    fn test_frame_batches_and_counts() {
        let mut r = renderer();
        r.begin_frame().unwrap();
        r.clear(Vec4::ZERO, 1.0, 0).unwrap();
        for (m, x) in [(1, 0.0), (1, 1.0), (2, 2.0)] {
            r.submit_renderable(cube(m, x)).unwrap();
        }
        r.end_frame().unwrap();
        r.present().unwrap();

        let stats = r.stats();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.triangles, 36);
        assert_eq!(stats.frames, 1);
        assert_eq!(r.backend().frames_presented(), 1);
    }

    #[test]
    fn test_batching_disabled_draws_each() {
        let config = RendererConfig {
            batching: false,
            ..RendererConfig::default()
        };
        let mut r = Renderer::headless(config).unwrap();
        r.initialize("test", 64, 64).unwrap();
        r.begin_frame().unwrap();
        r.submit_renderable(cube(1, 0.0)).unwrap();
        r.submit_renderable(cube(1, 1.0)).unwrap();
        r.flush_render_queue().unwrap();
        assert_eq!(r.stats().draw_calls, 2);
        assert_eq!(r.stats().batches, 0);
    }

    #[test]
    fn test_protocol_violations_are_errors() {
        let mut r = Renderer::headless(RendererConfig::default()).unwrap();
        assert!(r.begin_frame().is_err());
        r.initialize("test", 64, 64).unwrap();
        assert!(r.submit_renderable(cube(1, 0.0)).is_err());
        r.begin_frame().unwrap();
        assert!(r.begin_frame().is_err());
        assert!(r.present().is_err());
        assert!(r.submit_renderable(cube(1, 0.0).on_layer(42)).is_err());
    }

    #[test]
    fn test_callbacks_run_at_begin_frame() {
        let mut r = renderer();
        let sender = r.callback_sender();
        std::thread::spawn(move || {
            sender
                .send_debug_lines(vec![DebugLine {
                    start: Vec3::ZERO,
                    end: Vec3::X,
                    color: Vec4::ONE,
                }])
                .unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(r.stats().queue_depth, 1);

        r.backend_mut().take_calls();
        r.begin_frame().unwrap();
        assert_eq!(r.stats().callbacks, 1);
        assert_eq!(r.backend().calls(), [RecordedCall::Lines(1)]);
    }

    #[test]
    fn test_full_callback_queue_rejects() {
        let config = RendererConfig {
            callback_queue_capacity: 1,
            ..RendererConfig::default()
        };
        let r = Renderer::headless(config).unwrap();
        let sender = r.callback_sender();
        sender.send(Box::new(|_| {})).unwrap();
        assert!(sender.send(Box::new(|_| {})).is_err());
        assert_eq!(sender.pending(), 1);
    }
}
