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
//! Sleeping
//!
//! A dynamic body accumulates still time while its kinetic energy and both
//! speeds stay under their thresholds. Bodies touching each other form
//! islands; an island only falls asleep when every member has been still
//! long enough, and any active member wakes the whole island.

use crate::config::PhysicsConfig;
use crate::math::Vec3;
use crate::physics::body::{PhysicsScene, SimBody};
use crate::physics::contact::ContactManifold;
use std::collections::VecDeque;
use tracing::trace;

/// Outcome of one sleeping pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SleepReport {
    /// Bodies put to sleep by this pass
    pub fell_asleep: usize,
    /// Sleeping bodies woken by this pass
    pub woken: usize,
    /// Bodies asleep after the pass
    pub sleeping: usize,
}

fn energy_threshold(sim: &SimBody, config: &PhysicsConfig) -> f32 {
    sim.body.sleep_threshold.min(config.sleep_threshold).max(0.0)
}

fn is_active(sim: &SimBody, config: &PhysicsConfig) -> bool {
    sim.is_simulated() && (sim.woken || sim.kinetic_energy() > energy_threshold(sim, config))
}

/// Adjacency of dynamic bodies through solid contacts and active joints
fn build_islands(scene: &PhysicsScene, manifolds: &[ContactManifold]) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); scene.bodies.len()];
    let mut link = |a: usize, b: usize| {
        if scene.bodies[a].body.is_dynamic() && scene.bodies[b].body.is_dynamic() {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
    };
    for m in manifolds.iter().filter(|m| !m.is_trigger && !m.is_empty()) {
        if let (Some(a), Some(b)) = (scene.index_of(m.entity_a), scene.index_of(m.entity_b)) {
            link(a, b);
        }
    }
    for sj in scene.joints.iter().filter(|j| j.joint.is_active()) {
        if let (Some(a), Some(b)) = (scene.index_of(sj.owner), scene.index_of(sj.joint.connected_body)) {
            link(a, b);
        }
    }
    adjacency
}

/// Wake sleeping bodies that carry a pending force or torque
///
/// Runs before velocity integration so the push is not cleared unused.
pub fn wake_pushed(scene: &mut PhysicsScene) -> usize {
    let mut woken = 0;
    for sim in scene.bodies.iter_mut().filter(|s| s.body.is_sleeping()) {
        if sim.body.force() != Vec3::ZERO || sim.body.torque() != Vec3::ZERO {
            sim.body.wake_up();
            sim.woken = true;
            woken += 1;
        }
    }
    woken
}

/// Advance sleep timers, wake islands touched by active bodies and put
/// fully still islands to sleep
pub fn update_sleeping(
    scene: &mut PhysicsScene,
    manifolds: &[ContactManifold],
    config: &PhysicsConfig,
    dt: f32,
) -> SleepReport {
    let mut report = SleepReport::default();

    if !config.enable_sleeping {
        for sim in scene.bodies.iter_mut().filter(|s| s.body.is_sleeping()) {
            sim.body.wake_up();
            report.woken += 1;
        }
        return report;
    }

    let (lin_eps, ang_eps) = (config.sleep.linear_epsilon, config.sleep.angular_epsilon);
    for sim in scene.bodies.iter_mut().filter(|s| s.body.is_dynamic()) {
        let pushed = sim.body.force() != Vec3::ZERO || sim.body.torque() != Vec3::ZERO;
        if sim.body.is_sleeping() {
            if pushed {
                sim.body.wake_up();
                sim.woken = true;
                report.woken += 1;
            }
            continue;
        }
        let still = !pushed
            && sim.kinetic_energy() < energy_threshold(sim, config)
            && sim.body.linear_velocity.length() < lin_eps
            && sim.body.angular_velocity.length() < ang_eps;
        let timer = if still { sim.body.sleep_timer() + dt } else { 0.0 };
        sim.body.set_sleep_state(false, timer);
    }

    let adjacency = build_islands(scene, manifolds);

    // wake everything reachable from an active body
    let mut queue: VecDeque<usize> = (0..scene.bodies.len())
        .filter(|&i| is_active(&scene.bodies[i], config))
        .collect();
    let mut reached = vec![false; scene.bodies.len()];
    for &i in &queue {
        reached[i] = true;
    }
    while let Some(i) = queue.pop_front() {
        for &j in &adjacency[i] {
            if reached[j] {
                continue;
            }
            reached[j] = true;
            let sim = &mut scene.bodies[j];
            if sim.body.is_sleeping() {
                sim.body.wake_up();
                sim.woken = true;
                report.woken += 1;
            }
            queue.push_back(j);
        }
    }

    // islands with no active member and every member still long enough sleep
    let mut visited = vec![false; scene.bodies.len()];
    let mut island = Vec::new();
    for start in 0..scene.bodies.len() {
        if visited[start] || !scene.bodies[start].is_simulated() {
            continue;
        }
        island.clear();
        visited[start] = true;
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            island.push(i);
            for &j in &adjacency[i] {
                if !visited[j] {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }
        let ready = island.iter().all(|&i| {
            let sim = &scene.bodies[i];
            sim.body.is_sleeping() || (!reached[i] && sim.body.sleep_timer() >= config.sleep_time)
        });
        if ready {
            for &i in &island {
                let sim = &mut scene.bodies[i];
                if !sim.body.is_sleeping() {
                    let timer = sim.body.sleep_timer();
                    sim.body.set_sleep_state(true, timer);
                    report.fell_asleep += 1;
                }
            }
        }
    }

    report.sleeping = scene.bodies.iter().filter(|s| s.body.is_sleeping()).count();
    if report.fell_asleep > 0 || report.woken > 0 {
        trace!(
            fell_asleep = report.fell_asleep,
            woken = report.woken,
            sleeping = report.sleeping,
            "sleep pass"
        );
    }
    report
}
