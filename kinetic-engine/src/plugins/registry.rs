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
//! Plugin registry
//!
//! Owns the registered plugins, validates API versions and dependencies,
//! and determines a deterministic initialization order. During the force
//! stage it sums every force field's contribution per body and feeds the
//! totals into the rigid bodies' accumulators.

use crate::error::{EngineError, Result};
use crate::plugins::api::{BodyView, ForceContribution, Plugin, PluginContext, PLUGIN_API_VERSION};
use crate::physics::body::PhysicsScene;
use semver::Version;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Registered plugins and their load order
pub struct PluginRegistry {
    plugins: BTreeMap<String, Box<dyn Plugin>>,
    load_order: Vec<String>,
    initialized: bool,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        PluginRegistry {
            plugins: BTreeMap::new(),
            load_order: Vec::new(),
            initialized: false,
        }
    }

    /// Register a plugin
    ///
    /// Fails when the registry is already initialized, the name is taken or
    /// the plugin's API version is incompatible with [`PLUGIN_API_VERSION`].
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        if self.initialized {
            return Err(EngineError::Plugin(
                "cannot register plugins after initialization".to_string(),
            ));
        }

        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(EngineError::Plugin(format!("plugin '{}' is already registered", name)));
        }

        let api = plugin.api_version();
        if !is_version_compatible(api, PLUGIN_API_VERSION) {
            return Err(EngineError::Plugin(format!(
                "plugin '{}' API version {} is incompatible with engine API version {}",
                name, api, PLUGIN_API_VERSION
            )));
        }

        debug!(plugin = %name, version = plugin.version(), "plugin registered");
        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Resolve dependencies and initialize every plugin in order
    ///
    /// # Errors
    ///
    /// Missing dependencies, dependency cycles and the first failing
    /// `initialize` call.
    pub fn initialize_all(&mut self, context: &PluginContext) -> Result<()> {
        if self.initialized {
            return Err(EngineError::Plugin("registry already initialized".to_string()));
        }

        let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, plugin) in &self.plugins {
            let deps: Vec<String> = plugin.dependencies().iter().map(|s| s.to_string()).collect();
            if let Some(missing) = deps.iter().find(|d| !self.plugins.contains_key(*d)) {
                return Err(EngineError::Plugin(format!(
                    "plugin '{}' depends on '{}' which is not registered",
                    name, missing
                )));
            }
            dependencies.insert(name.clone(), deps);
        }

        self.load_order = topological_sort(&dependencies)?;

        for name in &self.load_order {
            if let Some(plugin) = self.plugins.get_mut(name) {
                plugin
                    .initialize(context)
                    .map_err(|e| EngineError::Plugin(format!("failed to initialize '{}': {}", name, e)))?;
            }
        }

        self.initialized = true;
        Ok(())
    }

    /// Run every plugin's per-step update in load order
    pub fn update_all(&mut self, context: &PluginContext) -> Result<()> {
        if !self.initialized {
            return Err(EngineError::Plugin("registry not initialized".to_string()));
        }
        for name in &self.load_order {
            if let Some(plugin) = self.plugins.get_mut(name) {
                plugin
                    .update(context)
                    .map_err(|e| EngineError::Plugin(format!("failed to update '{}': {}", name, e)))?;
            }
        }
        Ok(())
    }

    /// Shut plugins down in reverse load order
    ///
    /// Every plugin gets its shutdown call; the first failure is returned.
    pub fn shutdown_all(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let mut first_error = None;
        for name in self.load_order.iter().rev() {
            if let Some(plugin) = self.plugins.get_mut(name) {
                if let Err(e) = plugin.shutdown() {
                    warn!(plugin = %name, error = %e, "plugin shutdown failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        self.initialized = false;
        first_error.map_or(Ok(()), Err)
    }

    /// Accumulate force-field contributions into the scene's dynamic bodies
    ///
    /// Sleeping bodies are skipped. Returns the number of bodies that
    /// received a non-zero contribution.
    pub fn apply_forces(&self, scene: &mut PhysicsScene, context: &PluginContext) -> usize {
        let fields: Vec<_> = self
            .load_order
            .iter()
            .filter_map(|name| self.plugins.get(name))
            .filter_map(|p| p.as_force_field())
            .collect();
        if fields.is_empty() {
            return 0;
        }

        let evaluate = |i: usize| {
            let sim = &scene.bodies[i];
            let view = BodyView::new(sim);
            let total = fields
                .iter()
                .map(|f| f.contribute(&view, context))
                .fold(ForceContribution::default(), |acc, c| acc + c);
            (i, total)
        };
        let targets: Vec<usize> = (0..scene.bodies.len())
            .filter(|&i| scene.bodies[i].is_simulated())
            .collect();

        #[cfg(feature = "parallel")]
        let totals: Vec<(usize, ForceContribution)> = if context.is_parallel_enabled() {
            targets.par_iter().map(|&i| evaluate(i)).collect()
        } else {
            targets.iter().map(|&i| evaluate(i)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let totals: Vec<(usize, ForceContribution)> = targets.iter().map(|&i| evaluate(i)).collect();

        let mut touched = 0;
        for (i, total) in totals {
            if total.is_zero() || !total.force.is_finite() || !total.torque.is_finite() {
                continue;
            }
            let body = &mut scene.bodies[i].body;
            body.add_force(total.force);
            body.add_torque(total.torque);
            touched += 1;
        }
        touched
    }

    /// Plugin by name
    pub fn get(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins.get(name).map(|p| p.as_ref())
    }

    /// Mutable plugin by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Plugin + '_)> {
        self.plugins.get_mut(name).map(|p| &mut **p as &mut (dyn Plugin + '_))
    }

    /// Number of registered plugins
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// True once `initialize_all` succeeded
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Names in initialization order
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("initialized", &self.initialized)
            .finish()
    }
}

/// Semver compatibility of a plugin's API version with the engine's
///
/// Majors must match. Below 1.0 the minor version is breaking and must
/// match too; from 1.0 the plugin's minor may not exceed the engine's.
fn is_version_compatible(plugin_version: &str, engine_version: &str) -> bool {
    let (Ok(plugin), Ok(engine)) = (Version::parse(plugin_version), Version::parse(engine_version)) else {
        return false;
    };
    if plugin.major != engine.major {
        return false;
    }
    if plugin.major == 0 {
        plugin.minor == engine.minor
    } else {
        plugin.minor <= engine.minor
    }
}

/// Kahn's algorithm over name-sorted nodes so ties resolve alphabetically
fn topological_sort(dependencies: &BTreeMap<String, Vec<String>>) -> Result<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> = dependencies.keys().map(|k| (k.as_str(), 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (dependent, deps) in dependencies {
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(dependent.as_str());
            *in_degree.entry(dependent.as_str()).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut sorted = Vec::with_capacity(dependencies.len());

    while let Some(node) = queue.pop_front() {
        sorted.push(node.to_string());
        for next in dependents.get(node).into_iter().flatten() {
            if let Some(d) = in_degree.get_mut(next) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(*next);
                }
            }
        }
    }

    if sorted.len() != dependencies.len() {
        return Err(EngineError::Plugin(
            "circular dependency detected in plugin dependencies".to_string(),
        ));
    }
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::RigidBody;
    use crate::ecs::EntityId;
    use crate::math::{Aabb, Quat, Vec3};
    use crate::physics::body::SimBody;
    use crate::plugins::api::ForceField;
    use std::any::Any;

    struct Named {
        name: &'static str,
        api: &'static str,
        deps: Vec<&'static str>,
        fail_init: bool,
    }

    impl Named {
        fn new(name: &'static str) -> Self {
            Named {
                name,
                api: PLUGIN_API_VERSION,
                deps: Vec::new(),
                fail_init: false,
            }
        }

        fn depends_on(mut self, deps: &[&'static str]) -> Self {
            self.deps = deps.to_vec();
            self
        }
    }

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn api_version(&self) -> &str {
            self.api
        }

        fn dependencies(&self) -> Vec<&str> {
            self.deps.clone()
        }

        fn initialize(&mut self, _context: &PluginContext) -> Result<()> {
            if self.fail_init {
                return Err(EngineError::Plugin("boom".into()));
            }
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Push(Vec3);

    impl Plugin for Push {
        fn name(&self) -> &str {
            "push"
        }

        fn version(&self) -> &str {
            "0.1.0"
        }

        fn as_force_field(&self) -> Option<&dyn ForceField> {
            Some(self)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl ForceField for Push {
        fn contribute(&self, _body: &BodyView<'_>, _context: &PluginContext) -> ForceContribution {
            ForceContribution::force(self.0)
        }
    }

    fn ctx() -> PluginContext {
        PluginContext::new(1.0 / 60.0, 0, Vec3::ZERO, false)
    }

    fn sim(index: u32, body: RigidBody) -> SimBody {
        SimBody {
            entity: EntityId::new(index, 0),
            body,
            implicit_static: false,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            collider: None,
            aabb: Aabb::default(),
            woken: false,
            ccd_advanced: false,
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(Named::new("a"))).unwrap();
        assert!(matches!(
            registry.register(Box::new(Named::new("a"))),
            Err(EngineError::Plugin(_))
        ));
        assert_eq!(registry.plugin_count(), 1);
    }

    #[test]
    fn test_incompatible_api_rejected() {
        let mut registry = PluginRegistry::new();
        let mut old = Named::new("old");
        old.api = "0.1.0";
        assert!(registry.register(Box::new(old)).is_err());
        let mut garbage = Named::new("garbage");
        garbage.api = "not-a-version";
        assert!(registry.register(Box::new(garbage)).is_err());
    }

    #[test]
    fn test_version_rules() {
        assert!(is_version_compatible("0.3.0", "0.3.7"));
        assert!(!is_version_compatible("0.2.0", "0.3.0"));
        assert!(is_version_compatible("1.1.0", "1.4.0"));
        assert!(!is_version_compatible("1.5.0", "1.4.0"));
        assert!(!is_version_compatible("2.0.0", "1.4.0"));
    }

    #[test]
    fn test_dependency_order() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(Named::new("c").depends_on(&["b"]))).unwrap();
        registry.register(Box::new(Named::new("b").depends_on(&["a"]))).unwrap();
        registry.register(Box::new(Named::new("a"))).unwrap();
        registry.initialize_all(&ctx()).unwrap();
        assert_eq!(registry.load_order(), ["a", "b", "c"]);
        assert!(registry.register(Box::new(Named::new("late"))).is_err());
    }

    #[test]
    fn test_missing_dependency() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(Named::new("a").depends_on(&["ghost"]))).unwrap();
        let err = registry.initialize_all(&ctx()).unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert!(!registry.is_initialized());
    }

    #[test]
    fn test_cycle_detected() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(Named::new("a").depends_on(&["b"]))).unwrap();
        registry.register(Box::new(Named::new("b").depends_on(&["a"]))).unwrap();
        let err = registry.initialize_all(&ctx()).unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn test_init_failure_reported() {
        let mut registry = PluginRegistry::new();
        let mut bad = Named::new("bad");
        bad.fail_init = true;
        registry.register(Box::new(bad)).unwrap();
        let err = registry.initialize_all(&ctx()).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_update_requires_initialization() {
        let mut registry = PluginRegistry::new();
        assert!(registry.update_all(&ctx()).is_err());
        registry.initialize_all(&ctx()).unwrap();
        assert!(registry.update_all(&ctx()).is_ok());
        assert!(registry.shutdown_all().is_ok());
        assert!(!registry.is_initialized());
    }

    #[test]
    fn test_apply_forces_skips_static_and_sleeping() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(Push(Vec3::X))).unwrap();
        registry.initialize_all(&ctx()).unwrap();

        let mut scene = PhysicsScene::new();
        scene.push_body(sim(0, RigidBody::dynamic(1.0)));
        scene.push_body(sim(1, RigidBody::new_static()));
        let mut sleeper = RigidBody::dynamic(1.0);
        sleeper.sleep();
        scene.push_body(sim(2, sleeper));

        assert_eq!(registry.apply_forces(&mut scene, &ctx()), 1);
        assert_eq!(scene.bodies[0].body.force(), Vec3::X);
        assert_eq!(scene.bodies[1].body.force(), Vec3::ZERO);
        assert!(scene.bodies[2].body.is_sleeping());
    }

    #[test]
    fn test_downcast_through_registry() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(Push(Vec3::Y))).unwrap();
        let push = registry.get("push").and_then(|p| p.as_any().downcast_ref::<Push>());
        assert_eq!(push.map(|p| p.0), Some(Vec3::Y));
        if let Some(p) = registry.get_mut("push").and_then(|p| p.as_any_mut().downcast_mut::<Push>()) {
            p.0 = Vec3::Z;
        }
        assert!(registry.get("push").unwrap().as_force_field().is_some());
    }
}
