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
//! Priority-ordered system scheduler
//!
//! Systems run in ascending priority; ties keep registration order. Each
//! update runs inside a panic guard so one faulty system never aborts the
//! frame: errors and panics are logged and the remaining systems still run.

use crate::ecs::{System, World};
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Outcome of one scheduler pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Systems whose update ran to completion
    pub succeeded: usize,
    /// Systems that returned an error or panicked
    pub failed: usize,
    /// Disabled systems that were skipped
    pub skipped: usize,
}

/// Ordered collection of systems
#[derive(Default)]
pub struct Scheduler {
    systems: Vec<Box<dyn System>>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a system, keeping the list sorted by priority
    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
        // stable sort keeps registration order for equal priorities
        self.systems.sort_by_key(|s| s.priority());
    }

    /// Number of registered systems
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// System names in execution order
    pub fn system_names(&self) -> Vec<String> {
        self.systems.iter().map(|s| s.name().to_owned()).collect()
    }

    /// Run the `post_initialize` hook of every system
    pub fn post_initialize(&mut self, world: &World) -> FrameReport {
        let mut report = FrameReport::default();
        for system in &mut self.systems {
            let result = panic::catch_unwind(AssertUnwindSafe(|| system.post_initialize(world)));
            record(&mut report, system.name(), "post_initialize", result);
        }
        report
    }

    /// Update every enabled system in priority order
    pub fn run(&mut self, world: &World, dt: f32) -> FrameReport {
        let mut report = FrameReport::default();
        for system in &mut self.systems {
            if !system.is_enabled() {
                report.skipped += 1;
                continue;
            }
            let result = panic::catch_unwind(AssertUnwindSafe(|| system.update(world, dt)));
            record(&mut report, system.name(), "update", result);
        }
        report
    }

    /// Run `on_destroy` for every system and drop them
    pub fn shutdown(&mut self, world: &World) {
        for system in &mut self.systems {
            let name = system.name().to_owned();
            if panic::catch_unwind(AssertUnwindSafe(|| system.on_destroy(world))).is_err() {
                error!(system = %name, "system panicked in on_destroy");
            }
        }
        self.systems.clear();
    }
}

fn record(
    report: &mut FrameReport,
    name: &str,
    phase: &str,
    result: std::thread::Result<crate::error::Result<()>>,
) {
    match result {
        Ok(Ok(())) => report.succeeded += 1,
        Ok(Err(err)) => {
            error!(system = name, phase, error = %err, "system failed");
            report.failed += 1;
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            error!(system = name, phase, panic = %message, "system panicked");
            report.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, Result};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Recorder {
        label: &'static str,
        priority: i32,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl System for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn update(&mut self, _world: &World, _dt: f32) -> Result<()> {
            self.log.lock().push(self.label);
            Ok(())
        }
    }

    struct Faulty {
        panic: bool,
    }

    impl System for Faulty {
        fn priority(&self) -> i32 {
            50
        }

        fn update(&mut self, _world: &World, _dt: f32) -> Result<()> {
            if self.panic {
                panic!("faulty system");
            }
            Err(EngineError::SystemFailure {
                system: "Faulty".into(),
                reason: "always fails".into(),
            })
        }
    }

    #[test]
    fn test_priority_order_is_stable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        for (label, priority) in [("render", 200), ("physics", 110), ("transform", 10), ("physics2", 110)] {
            scheduler.add_system(Box::new(Recorder {
                label,
                priority,
                log: log.clone(),
            }));
        }

        let world = World::new();
        scheduler.run(&world, 0.016);
        assert_eq!(*log.lock(), vec!["transform", "physics", "physics2", "render"]);
    }

    #[test]
    fn test_faulty_system_does_not_abort_frame() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        scheduler.add_system(Box::new(Faulty { panic: true }));
        scheduler.add_system(Box::new(Faulty { panic: false }));
        scheduler.add_system(Box::new(Recorder {
            label: "late",
            priority: 300,
            log: log.clone(),
        }));

        let world = World::new();
        let report = scheduler.run(&world, 0.016);
        assert_eq!(report.failed, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(*log.lock(), vec!["late"]);
    }
}
