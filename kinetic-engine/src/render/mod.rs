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
//! A thin, headless-capable layer between gameplay systems and a graphics
//! API. The physics core only uses it through [`RenderCallbackSender`] to
//! hand debug lines to the render thread; it never draws.

pub mod backend;
pub mod queue;
pub mod renderer;
pub mod thread;

pub use backend::{DrawCall, GraphicsBackend, HeadlessBackend, RecordedCall};
pub use queue::{
    LayerId, MaterialHandle, MeshHandle, RenderLayer, RenderQueue, Renderable, SortPolicy, OPAQUE_LAYER,
    OVERLAY_LAYER, TRANSPARENT_LAYER,
};
pub use renderer::{RenderCallback, RenderCallbackSender, RenderStats, Renderer};
pub use thread::RenderThreadChecker;
