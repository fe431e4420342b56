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
//! Asset data and sources

use crate::error::{EngineError, Result};
use crate::math::{Vec3, Vec4};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Kind of resource requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Triangle mesh
    Mesh,
    /// RGBA8 texture
    Texture,
    /// Surface material
    Material,
}

/// Indexed triangle mesh
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Vertex positions
    pub positions: Vec<Vec3>,
    /// Vertex normals; empty when not provided
    pub normals: Vec<Vec3>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Triangles in the index list
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row-major RGBA bytes
    pub pixels: Vec<u8>,
}

/// Surface parameters referencing textures by name
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    /// Base color
    pub albedo: Vec4,
    /// Albedo texture
    pub albedo_texture: Option<String>,
    /// Roughness in [0, 1]
    pub roughness: f32,
    /// Metalness in [0, 1]
    pub metallic: f32,
}

impl Default for MaterialData {
    fn default() -> Self {
        MaterialData {
            albedo: Vec4::ONE,
            albedo_texture: None,
            roughness: 0.5,
            metallic: 0.0,
        }
    }
}

/// Loaded resource
#[derive(Debug, Clone, PartialEq)]
pub enum AssetData {
    /// Mesh
    Mesh(MeshData),
    /// Texture
    Texture(TextureData),
    /// Material
    Material(MaterialData),
}

impl AssetData {
    /// Kind of the payload
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetData::Mesh(_) => AssetKind::Mesh,
            AssetData::Texture(_) => AssetKind::Texture,
            AssetData::Material(_) => AssetKind::Material,
        }
    }
}

/// Produces resources by name; called on loader worker threads
pub trait AssetSource: Send + Sync {
    /// Load `name` as a resource of `kind`
    fn load(&self, name: &str, kind: AssetKind) -> Result<AssetData>;
}

/// In-memory source, handy for tests and procedural content
#[derive(Debug, Default)]
pub struct MemorySource {
    assets: RwLock<HashMap<String, AssetData>>,
}

impl MemorySource {
    /// Empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource
    pub fn insert(&self, name: impl Into<String>, data: AssetData) {
        self.assets.write().insert(name.into(), data);
    }

    /// Builder form of `insert`
    pub fn with(self, name: impl Into<String>, data: AssetData) -> Self {
        self.insert(name, data);
        self
    }
}

impl AssetSource for MemorySource {
    fn load(&self, name: &str, kind: AssetKind) -> Result<AssetData> {
        let assets = self.assets.read();
        let data = assets.get(name).ok_or_else(|| EngineError::AssetLoad {
            name: name.to_owned(),
            reason: "not found".into(),
        })?;
        if data.kind() != kind {
            return Err(EngineError::AssetLoad {
                name: name.to_owned(),
                reason: format!("expected {kind:?}, found {:?}", data.kind()),
            });
        }
        Ok(data.clone())
    }
}
