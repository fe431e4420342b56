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
//! Engine-wide error type
//!
//! Errors are reported as recoverable results. Nothing in the engine
//! propagates a panic into `World::update`; subsystems log and continue.

use crate::ecs::EntityId;
use thiserror::Error;

/// Errors surfaced by the ECS, configuration, plugin, asset and renderer layers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Operation on a destroyed or never-created entity handle
    #[error("invalid entity handle {0}")]
    InvalidEntity(EntityId),

    /// Component type was never registered with the registry
    #[error("component type `{0}` is not registered")]
    UnregisteredComponent(&'static str),

    /// Entity is valid but has no component of the requested type
    #[error("{entity} has no `{component}` component")]
    MissingComponent {
        /// Entity that was queried
        entity: EntityId,
        /// Type name of the missing component
        component: &'static str,
    },

    /// Configuration value out of range or unparsable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Plugin registration, dependency or lifecycle failure
    #[error("plugin error: {0}")]
    Plugin(String),

    /// Asset source failed to produce a resource
    #[error("failed to load asset `{name}`: {reason}")]
    AssetLoad {
        /// Resource key
        name: String,
        /// Source-provided reason
        reason: String,
    },

    /// Graphics backend failure
    #[error("renderer error: {0}")]
    Renderer(String),

    /// Render-thread-only API called from another thread
    #[error("`{0}` called off the render thread")]
    ThreadViolation(&'static str),

    /// A system reported a failure from its update
    #[error("system `{system}` failed: {reason}")]
    SystemFailure {
        /// System name
        system: String,
        /// Failure description
        reason: String,
    },
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = EngineError::UnregisteredComponent("Transform");
        assert_eq!(e.to_string(), "component type `Transform` is not registered");

        let e = EngineError::MissingComponent {
            entity: EntityId::new(3, 1),
            component: "Collider",
        };
        assert!(e.to_string().contains("Collider"));
        assert!(e.to_string().contains("Entity(3, v1)"));
    }
}
