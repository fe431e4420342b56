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
//! Box stack example
//!
//! Stacks boxes on a slab and renders each frame through the headless
//! renderer: box meshes come from the asset loader, debug lines arrive
//! through the render-thread callback queue.

use kinetic_engine::assets::{AssetData, AssetKind, AssetLoader, MemorySource, MeshData, ResourceCache};
use kinetic_engine::ecs::components::{Collider, RigidBody, Transform};
use kinetic_engine::ecs::World;
use kinetic_engine::math::{Vec3, Vec4};
use kinetic_engine::physics::PhysicsSystem;
use kinetic_engine::render::{MaterialHandle, MeshHandle, Renderable, Renderer};
use kinetic_engine::{AssetLoaderConfig, PhysicsConfig, RendererConfig, Result};
use std::sync::Arc;
use std::time::Duration;

fn cube_mesh() -> MeshData {
    let positions = (0..8)
        .map(|i| {
            let bit = |b: u32| if i & (1 << b) == 0 { -0.5 } else { 0.5 };
            Vec3::new(bit(0), bit(1), bit(2))
        })
        .collect();
    let indices = vec![
        0, 2, 1, 1, 2, 3, 4, 5, 6, 5, 7, 6, 0, 1, 4, 1, 5, 4, 2, 6, 3, 3, 6, 7, 0, 4, 2, 2, 4, 6, 1,
        3, 5, 3, 7, 5,
    ];
    MeshData {
        positions,
        normals: Vec::new(),
        indices,
    }
}

fn main() -> Result<()> {
    println!("Kinetic Engine - Box Stack");
    println!("==========================\n");

    let source = MemorySource::new().with("cube", AssetData::Mesh(cube_mesh()));
    let loader = AssetLoader::new(&AssetLoaderConfig::default(), Arc::new(source))?;
    loader.request("cube", AssetKind::Mesh)?;
    loader.wait_all(Duration::from_secs(1));
    let meshes: ResourceCache<MeshData> = ResourceCache::new();
    for loaded in loader.poll_completed() {
        if let Ok(AssetData::Mesh(mesh)) = loaded.result {
            meshes.insert(loaded.name, mesh);
        }
    }
    let triangles = meshes.get("cube").map_or(0, |m| m.triangle_count() as u32);

    let mut world = World::new();
    let ground = world.spawn();
    world.add_component(ground, Transform::from_position(Vec3::new(0.0, -0.5, 0.0)))?;
    world.add_component(ground, Collider::cuboid(Vec3::new(10.0, 0.5, 10.0)))?;

    let mut boxes = Vec::new();
    for level in 0..6 {
        let id = world.spawn();
        let wobble = if level % 2 == 0 { 0.0 } else { 0.05 };
        world.add_component(id, Transform::from_position(Vec3::new(wobble, 0.5 + level as f32, 0.0)))?;
        world.add_component(id, RigidBody::dynamic(1.0))?;
        world.add_component(id, Collider::cuboid(Vec3::splat(0.5)))?;
        boxes.push(id);
    }

    let mut config = PhysicsConfig::default();
    config.debug.draw_contacts = true;
    let system = PhysicsSystem::new(config)?;
    let physics = system.handle();
    world.add_system(system);
    world.initialize();

    let mut renderer = Renderer::headless(RendererConfig::default())?;
    renderer.initialize_from_config()?;
    renderer.set_camera_position(Vec3::new(0.0, 3.0, 10.0));
    let debug_lines = renderer.callback_sender();

    let dt = 1.0 / 60.0;
    for frame in 0..180 {
        world.update(dt);
        debug_lines.send_debug_lines(physics.lock().debug_lines(&world))?;

        renderer.begin_frame()?;
        renderer.clear(Vec4::new(0.1, 0.1, 0.12, 1.0), 1.0, 0)?;
        for &id in &boxes {
            let transform = world.get_component::<Transform>(id)?;
            renderer.submit_renderable(Renderable::new(
                MeshHandle(0),
                MaterialHandle(0),
                transform.world_matrix(),
                triangles,
            ))?;
        }
        renderer.end_frame()?;
        renderer.present()?;

        if frame % 30 == 0 {
            let top = world.get_component::<Transform>(boxes[boxes.len() - 1])?.position();
            let stats = renderer.stats();
            println!(
                "frame {frame:3}: top box at ({:.3}, {:.3}, {:.3}), {} draw call(s), {} triangles",
                top.x, top.y, top.z, stats.draw_calls, stats.triangles
            );
        }
    }

    world.shutdown();
    Ok(())
}
