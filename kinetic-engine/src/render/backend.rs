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
//! Graphics backend seam
//!
//! The renderer never talks to a GPU API directly; it drives a
//! [`GraphicsBackend`]. [`HeadlessBackend`] records every call instead of
//! drawing, which is what tests and servers use.

use crate::error::{EngineError, Result};
use crate::math::{Mat4, Vec4};
use crate::physics::debug::DebugLine;
use crate::render::queue::{MaterialHandle, MeshHandle};

/// One backend draw: a mesh and material drawn once per instance transform
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Mesh to draw
    pub mesh: MeshHandle,
    /// Material to bind
    pub material: MaterialHandle,
    /// World matrix of each instance
    pub instances: Vec<Mat4>,
    /// Triangles across all instances
    pub triangles: u64,
}

/// GPU API abstraction, driven from the render thread only
pub trait GraphicsBackend: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Create the context and surface
    fn initialize(&mut self, title: &str, width: u32, height: u32) -> Result<()>;

    /// Clear the color, depth and stencil targets
    fn clear(&mut self, color: Vec4, depth: f32, stencil: u32);

    /// Issue a draw
    fn draw(&mut self, call: &DrawCall) -> Result<()>;

    /// Draw colored line segments
    fn draw_lines(&mut self, lines: &[DebugLine]);

    /// Show the finished frame
    fn present(&mut self) -> Result<()>;
}

/// Call recorded by [`HeadlessBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// `initialize`
    Initialize {
        /// Title
        title: String,
        /// Width
        width: u32,
        /// Height
        height: u32,
    },
    /// `clear`
    Clear {
        /// Clear color
        color: Vec4,
        /// Depth value
        depth: f32,
        /// Stencil value
        stencil: u32,
    },
    /// `draw`
    Draw(DrawCall),
    /// `draw_lines` with this many segments
    Lines(usize),
    /// `present`
    Present,
}

/// Backend without a GPU that records calls
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    calls: Vec<RecordedCall>,
    initialized: bool,
    frames: u64,
}

impl HeadlessBackend {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls since creation or the last `take_calls`
    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// Drain the recorded calls
    pub fn take_calls(&mut self) -> Vec<RecordedCall> {
        std::mem::take(&mut self.calls)
    }

    /// Frames presented
    pub fn frames_presented(&self) -> u64 {
        self.frames
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn initialize(&mut self, title: &str, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(EngineError::Renderer(format!("invalid surface size {width}x{height}")));
        }
        self.initialized = true;
        self.calls.push(RecordedCall::Initialize {
            title: title.to_owned(),
            width,
            height,
        });
        Ok(())
    }

    fn clear(&mut self, color: Vec4, depth: f32, stencil: u32) {
        self.calls.push(RecordedCall::Clear { color, depth, stencil });
    }

    fn draw(&mut self, call: &DrawCall) -> Result<()> {
        if !self.initialized {
            return Err(EngineError::Renderer("draw before initialize".into()));
        }
        self.calls.push(RecordedCall::Draw(call.clone()));
        Ok(())
    }

    fn draw_lines(&mut self, lines: &[DebugLine]) {
        self.calls.push(RecordedCall::Lines(lines.len()));
    }

    fn present(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(EngineError::Renderer("present before initialize".into()));
        }
        self.frames += 1;
        self.calls.push(RecordedCall::Present);
        Ok(())
    }
}
