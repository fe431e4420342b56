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
//! ECS runtime behavior seen from outside the crate

use kinetic_engine::ecs::components::{RigidBody, Transform};
use kinetic_engine::ecs::transform::{world_matrix, TransformSystem};
use kinetic_engine::ecs::{priorities, Component, ComponentEvent, EntityDesc, Event, System, World};
use kinetic_engine::error::{EngineError, Result};
use kinetic_engine::math::Vec3;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
struct Health(u32);
impl Component for Health {}

struct Tick(u32);
impl Event for Tick {}

struct Recorder {
    name: &'static str,
    priority: i32,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl System for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn update(&mut self, _world: &World, _dt: f32) -> Result<()> {
        self.log.lock().push(self.name);
        Ok(())
    }
}

struct Faulty {
    panic: bool,
}

impl System for Faulty {
    fn priority(&self) -> i32 {
        priorities::CAMERA
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
fn systems_run_in_priority_order() {
    let mut world = World::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for (name, priority) in [("render", priorities::MESH_RENDER), ("physics", priorities::PHYSICS_UPDATE), ("camera", priorities::CAMERA)] {
        world.add_system(Recorder {
            name,
            priority,
            log: Arc::clone(&log),
        });
    }
    world.update(1.0 / 60.0);
    assert_eq!(*log.lock(), ["camera", "physics", "render"]);
}

#[test]
fn failing_systems_do_not_abort_the_frame() {
    let mut world = World::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    world.add_system(Faulty { panic: true });
    world.add_system(Faulty { panic: false });
    world.add_system(Recorder {
        name: "late",
        priority: priorities::SPRITE_RENDER,
        log: Arc::clone(&log),
    });
    let report = world.update(0.016);
    assert_eq!(report.failed, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(*log.lock(), ["late"]);
}

#[test]
fn custom_components_need_registration() {
    let world = World::new();
    let id = world.spawn();
    assert!(matches!(
        world.add_component(id, Health(10)),
        Err(EngineError::UnregisteredComponent(_))
    ));
    assert!(world.register_component::<Health>());
    world.add_component(id, Health(10)).unwrap();
    world.with_component_mut(id, |h: &mut Health| h.0 -= 3).unwrap();
    assert_eq!(world.get_component::<Health>(id).unwrap(), Health(7));
}

#[test]
fn component_listeners_see_add_and_cascade_removal() {
    let world = World::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    world
        .components()
        .on_change::<RigidBody>(Arc::new(move |id, event, _body: &RigidBody| {
            sink.lock().push((id, event));
        }))
        .unwrap();

    let id = world.spawn();
    world.add_component(id, RigidBody::dynamic(1.0)).unwrap();
    world.add_component(id, Transform::default()).unwrap();
    assert!(world.destroy_entity(id));

    assert_eq!(
        *seen.lock(),
        [(id, ComponentEvent::Added), (id, ComponentEvent::Removed)]
    );
    assert!(!world.has_component::<Transform>(id));
}

#[test]
fn tags_index_entities() {
    let world = World::new();
    let a = world.create_entity(EntityDesc::named("crate").with_tag("pickup"));
    let b = world.create_entity(EntityDesc::named("barrel"));
    world.entities().add_tag(b, "pickup");
    let mut tagged = world.entities().entities_with_tag("pickup");
    tagged.sort();
    assert_eq!(tagged, [a, b]);

    world.destroy_entity(a);
    assert_eq!(world.entities().entities_with_tag("pickup"), [b]);
    assert!(world.entities().tag_index_consistent());
}

#[test]
fn event_bus_delivers_to_typed_subscribers() {
    let world = World::new();
    let total = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&total);
    let sub = world.events().subscribe(move |t: &Tick| *sink.lock() += t.0);
    assert_eq!(world.events().publish(&Tick(2)), 1);
    assert_eq!(world.events().publish(&Tick(3)), 1);
    assert!(world.events().unsubscribe(sub));
    assert_eq!(world.events().publish(&Tick(100)), 0);
    assert_eq!(*total.lock(), 5);
}

#[test]
fn transform_hierarchy_composes_world_matrices() {
    let mut world = World::new();
    let parent = world.spawn();
    world
        .add_component(parent, Transform::from_position(Vec3::new(1.0, 0.0, 0.0)))
        .unwrap();
    let child = world.spawn();
    world
        .add_component(
            child,
            Transform::from_position(Vec3::new(0.0, 2.0, 0.0)).with_parent(parent),
        )
        .unwrap();

    let lazy = world_matrix(world.components(), child).unwrap();
    assert!((lazy.w_axis.truncate() - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);

    world.add_system(TransformSystem::new());
    world.update(0.016);
    let cached = world.get_component::<Transform>(child).unwrap().world_matrix();
    assert!((cached.w_axis.truncate() - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
}
