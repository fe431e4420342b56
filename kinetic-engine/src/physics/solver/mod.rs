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
//! Sequential-impulse constraint solver
//!
//! The velocity pass warm-starts every contact from the previous step's
//! impulses, then iterates contacts and joints in a fixed order, clamping
//! the accumulated normal impulse at zero and friction inside the Coulomb
//! cone. A separate position pass, run after positions are integrated,
//! pushes overlapping bodies apart with pseudo-impulses that never touch
//! velocities.
//!
//! Steps longer than `sub_step_threshold` are split in halves recursively.

mod contact_cache;
mod joints;

pub use contact_cache::{pair_key, CachedContact, ContactCache};

use crate::config::{PhysicsConfig, SolverSettings};
use crate::ecs::EntityId;
use crate::math::{integrate_rotation, sanitize, tangent_basis, world_inertia, Mat3, Quat, Vec3};
use crate::physics::body::{PhysicsScene, SimBody};
use crate::physics::contact::{ContactManifold, MAX_CONTACTS};
use crate::physics::events::JointBrokenEvent;
use crate::physics::integrator::{apply_locks, apply_speed_caps, cap_length};
use joints::JointRow;
use tracing::{debug, warn};

const MAX_SPLIT_DEPTH: u32 = 8;

/// Counters of the most recent velocity solve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// Solver passes run (more than one when the step was split)
    pub passes: u32,
    /// Contact constraints in the last pass
    pub contact_constraints: usize,
    /// Joint constraints in the last pass
    pub joint_constraints: usize,
    /// Contact points seeded from the cache
    pub warm_started_points: usize,
    /// Bodies whose velocity had to be clamped or cleared
    pub clamped_bodies: usize,
    /// Times the whole cache was dropped after a divergent solve
    pub cache_flushes: usize,
}

/// Velocity state of one body while solving
#[derive(Debug, Clone, Copy)]
pub(crate) struct SolverBody {
    pub v: Vec3,
    pub w: Vec3,
    /// Per-axis inverse mass; locked axes are zero
    pub inv_mass: Vec3,
    /// World inverse inertia with locked axes removed
    pub inv_inertia: Mat3,
}

impl SolverBody {
    const GROUND: SolverBody = SolverBody {
        v: Vec3::ZERO,
        w: Vec3::ZERO,
        inv_mass: Vec3::ZERO,
        inv_inertia: Mat3::ZERO,
    };

    fn from_sim(sim: &SimBody) -> Self {
        if sim.is_simulated() {
            let (inv_mass, mask) = lock_masks(sim);
            SolverBody {
                v: sim.body.linear_velocity,
                w: sim.body.angular_velocity,
                inv_mass,
                inv_inertia: mask * sim.inv_inertia_world() * mask,
            }
        } else if sim.body.is_kinematic() {
            SolverBody {
                v: sim.body.linear_velocity,
                w: sim.body.angular_velocity,
                ..Self::GROUND
            }
        } else {
            Self::GROUND
        }
    }

    pub fn is_static(&self) -> bool {
        self.inv_mass == Vec3::ZERO && self.inv_inertia == Mat3::ZERO
    }

    pub fn velocity_at(&self, r: Vec3) -> Vec3 {
        self.v + self.w.cross(r)
    }

    pub fn apply_impulse(&mut self, impulse: Vec3, r: Vec3) {
        self.v += impulse * self.inv_mass;
        self.w += self.inv_inertia * r.cross(impulse);
    }

    pub fn apply_angular_impulse(&mut self, impulse: Vec3) {
        self.w += self.inv_inertia * impulse;
    }
}

fn lock_masks(sim: &SimBody) -> (Vec3, Mat3) {
    let mut inv_mass = Vec3::splat(sim.inv_mass());
    let mut mask = Vec3::ONE;
    for axis in 0..3 {
        if sim.body.lock_position[axis] {
            inv_mass[axis] = 0.0;
        }
        if sim.body.lock_rotation[axis] {
            mask[axis] = 0.0;
        }
    }
    (inv_mass, Mat3::from_diagonal(mask))
}

/// Pose state of one body during the position pass
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    com_local: Vec3,
    inv_mass: Vec3,
    inv_inertia_local: Mat3,
    mask: Mat3,
    movable: bool,
}

impl Pose {
    const GROUND: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        com_local: Vec3::ZERO,
        inv_mass: Vec3::ZERO,
        inv_inertia_local: Mat3::ZERO,
        mask: Mat3::ZERO,
        movable: false,
    };

    fn from_sim(sim: &SimBody) -> Self {
        let movable = sim.is_simulated();
        let (inv_mass, mask) = if movable {
            lock_masks(sim)
        } else {
            (Vec3::ZERO, Mat3::ZERO)
        };
        Pose {
            position: sim.position,
            rotation: sim.rotation,
            com_local: sim.body.center_of_mass(),
            inv_mass,
            inv_inertia_local: sim.body.inverse_inertia_tensor(),
            mask,
            movable,
        }
    }

    pub fn com(&self) -> Vec3 {
        self.position + self.rotation * self.com_local
    }

    pub fn anchor(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    pub fn inv_mass(&self) -> Vec3 {
        self.inv_mass
    }

    pub fn inv_inertia(&self) -> Mat3 {
        if !self.movable {
            return Mat3::ZERO;
        }
        self.mask * world_inertia(self.rotation, self.inv_inertia_local) * self.mask
    }

    /// Move by a pseudo-impulse applied at arm `r` from the center of mass
    pub fn apply_correction(&mut self, impulse: Vec3, r: Vec3) {
        if !self.movable {
            return;
        }
        let com = self.com() + impulse * self.inv_mass;
        let turn = self.inv_inertia() * r.cross(impulse);
        self.rotation = integrate_rotation(self.rotation, turn, 1.0);
        self.position = com - self.rotation * self.com_local;
    }

    /// Turn about the center of mass by an angular pseudo-impulse
    pub fn apply_rotation(&mut self, impulse: Vec3) {
        if !self.movable {
            return;
        }
        let com = self.com();
        let turn = self.inv_inertia() * impulse;
        self.rotation = integrate_rotation(self.rotation, turn, 1.0);
        self.position = com - self.rotation * self.com_local;
    }
}

/// Two distinct elements of a slice mutably
pub(crate) fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = items.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = items.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

/// Effective mass along `n` for arms `r_a` and `r_b`
pub(crate) fn axis_mass(a: &SolverBody, b: &SolverBody, n: Vec3, r_a: Vec3, r_b: Vec3, cfm: f32) -> f32 {
    let (ra_n, rb_n) = (r_a.cross(n), r_b.cross(n));
    let k = n.dot(a.inv_mass * n)
        + n.dot(b.inv_mass * n)
        + ra_n.dot(a.inv_inertia * ra_n)
        + rb_n.dot(b.inv_inertia * rb_n)
        + cfm;
    if k > f32::EPSILON {
        1.0 / k
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PointConstraint {
    r_a: Vec3,
    r_b: Vec3,
    normal_mass: f32,
    tangent_mass: [f32; 2],
    bias: f32,
    normal_impulse: f32,
    tangent_impulse: [f32; 2],
}

#[derive(Debug, Clone)]
struct ContactConstraint {
    manifold: usize,
    a: usize,
    b: usize,
    normal: Vec3,
    tangents: [Vec3; 2],
    friction: f32,
    points: [PointConstraint; MAX_CONTACTS],
    count: usize,
}

impl ContactConstraint {
    fn impulse(&self, p: &PointConstraint) -> Vec3 {
        self.normal * p.normal_impulse
            + self.tangents[0] * p.tangent_impulse[0]
            + self.tangents[1] * p.tangent_impulse[1]
    }

    fn warm_start(&self, bodies: &mut [SolverBody]) {
        let (ba, bb) = pair_mut(bodies, self.a, self.b);
        for p in &self.points[..self.count] {
            let impulse = self.impulse(p);
            ba.apply_impulse(-impulse, p.r_a);
            bb.apply_impulse(impulse, p.r_b);
        }
    }

    fn solve(&mut self, bodies: &mut [SolverBody]) {
        let (ba, bb) = pair_mut(bodies, self.a, self.b);
        let normal = self.normal;
        for p in &mut self.points[..self.count] {
            let vn = (bb.velocity_at(p.r_b) - ba.velocity_at(p.r_a)).dot(normal);
            let lambda = p.normal_mass * (p.bias - vn);
            let total = (p.normal_impulse + lambda).max(0.0);
            let impulse = normal * (total - p.normal_impulse);
            p.normal_impulse = total;
            ba.apply_impulse(-impulse, p.r_a);
            bb.apply_impulse(impulse, p.r_b);

            let limit = self.friction * p.normal_impulse;
            for (k, tangent) in self.tangents.iter().enumerate() {
                let vt = (bb.velocity_at(p.r_b) - ba.velocity_at(p.r_a)).dot(*tangent);
                let lambda = -p.tangent_mass[k] * vt;
                let total = (p.tangent_impulse[k] + lambda).clamp(-limit, limit);
                let impulse = *tangent * (total - p.tangent_impulse[k]);
                p.tangent_impulse[k] = total;
                ba.apply_impulse(-impulse, p.r_a);
                bb.apply_impulse(impulse, p.r_b);
            }
        }
    }
}

/// Contact and joint solver with a persistent warm-start cache
#[derive(Debug)]
pub struct ConstraintSolver {
    settings: SolverSettings,
    velocity_iterations: u32,
    position_iterations: u32,
    wake_speed: f32,
    cache: ContactCache,
    bodies: Vec<SolverBody>,
    contacts: Vec<ContactConstraint>,
    joints: Vec<JointRow>,
    stats: SolverStats,
}

impl ConstraintSolver {
    /// Create a solver from the world configuration
    pub fn new(config: &PhysicsConfig) -> Self {
        ConstraintSolver {
            settings: config.solver.clone(),
            velocity_iterations: config.solver_iterations.max(1),
            position_iterations: config.position_iterations,
            wake_speed: config.sleep.linear_epsilon,
            cache: ContactCache::new(),
            bodies: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
            stats: SolverStats::default(),
        }
    }

    /// Tuning in use
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Warm-start cache
    pub fn cache(&self) -> &ContactCache {
        &self.cache
    }

    /// Forget all cached impulses
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Evict cached impulses of a removed body
    pub fn forget(&mut self, entity: EntityId) {
        self.cache.forget(entity);
    }

    /// Counters of the last velocity solve
    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Velocity pass over contacts and joints
    ///
    /// Impulses are written back into `manifolds`; joints that break push a
    /// `JointBrokenEvent` into `broken`.
    pub fn solve_velocities(
        &mut self,
        scene: &mut PhysicsScene,
        manifolds: &mut [ContactManifold],
        dt: f32,
        broken: &mut Vec<JointBrokenEvent>,
    ) {
        self.stats = SolverStats::default();
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }
        self.solve_split(scene, manifolds, dt, broken, 0);
    }

    fn solve_split(
        &mut self,
        scene: &mut PhysicsScene,
        manifolds: &mut [ContactManifold],
        dt: f32,
        broken: &mut Vec<JointBrokenEvent>,
        depth: u32,
    ) {
        if dt > self.settings.sub_step_threshold && depth < MAX_SPLIT_DEPTH {
            let half = dt * 0.5;
            self.solve_split(scene, manifolds, half, broken, depth + 1);
            self.solve_split(scene, manifolds, half, broken, depth + 1);
            return;
        }
        self.solve_pass(scene, manifolds, dt, broken);
    }

    fn solve_pass(
        &mut self,
        scene: &mut PhysicsScene,
        manifolds: &mut [ContactManifold],
        dt: f32,
        broken: &mut Vec<JointBrokenEvent>,
    ) {
        self.stats.passes += 1;
        self.wake_touched(scene, manifolds);

        self.bodies.clear();
        self.bodies.extend(scene.bodies.iter().map(SolverBody::from_sim));
        self.bodies.push(SolverBody::GROUND);

        self.prepare_contacts(scene, manifolds, dt);
        self.joints = joints::prepare(scene, &mut self.bodies, &self.settings, dt);
        self.stats.contact_constraints = self.contacts.len();
        self.stats.joint_constraints = self.joints.len();

        for contact in &self.contacts {
            contact.warm_start(&mut self.bodies);
        }
        for _ in 0..self.velocity_iterations {
            for contact in &mut self.contacts {
                contact.solve(&mut self.bodies);
            }
            for joint in &mut self.joints {
                joint.solve_velocity(&mut self.bodies);
            }
        }

        for contact in &self.contacts {
            let manifold = &mut manifolds[contact.manifold];
            for (slot, p) in manifold.points_mut().iter_mut().zip(&contact.points[..contact.count]) {
                slot.normal_impulse = p.normal_impulse;
                slot.tangent_impulse = p.tangent_impulse;
            }
        }
        joints::finish(&self.joints, scene, dt, broken);

        let clamped = self.store_velocities(scene);
        self.update_cache(manifolds, &clamped);
    }

    /// Wake sleeping bodies that an awake body is driving into
    fn wake_touched(&self, scene: &mut PhysicsScene, manifolds: &[ContactManifold]) {
        let dozing = |s: &SimBody| s.body.is_dynamic() && s.body.is_sleeping();
        let driving = |s: &SimBody| s.is_simulated() || s.body.is_kinematic();

        let mut wake = Vec::new();
        for m in manifolds.iter().filter(|m| !m.is_trigger && !m.is_empty()) {
            let (Some(ia), Some(ib)) = (scene.index_of(m.entity_a), scene.index_of(m.entity_b)) else {
                continue;
            };
            let (a, b) = (&scene.bodies[ia], &scene.bodies[ib]);
            let point = m.points()[0].position;
            let closing = (a.velocity_at(point) - b.velocity_at(point)).dot(m.normal);
            if closing.abs() <= self.wake_speed {
                continue;
            }
            if dozing(a) && driving(b) {
                wake.push(ia);
            } else if dozing(b) && driving(a) {
                wake.push(ib);
            }
        }
        for sj in scene.joints.iter().filter(|j| j.joint.is_active()) {
            let Some(ia) = scene.index_of(sj.owner) else { continue };
            let Some(ib) = scene.index_of(sj.joint.connected_body) else { continue };
            let (a, b) = (&scene.bodies[ia], &scene.bodies[ib]);
            if dozing(a) && b.is_simulated() {
                wake.push(ia);
            } else if dozing(b) && a.is_simulated() {
                wake.push(ib);
            }
        }
        for i in wake {
            let sim = &mut scene.bodies[i];
            if sim.body.is_sleeping() {
                debug!(entity = %sim.entity, "woken by contact");
                sim.body.wake_up();
                sim.woken = true;
            }
        }
    }

    fn prepare_contacts(&mut self, scene: &PhysicsScene, manifolds: &mut [ContactManifold], dt: f32) {
        let s = &self.settings;
        self.contacts.clear();
        for (index, m) in manifolds.iter_mut().enumerate() {
            if m.is_trigger || m.is_empty() {
                continue;
            }
            let (Some(a), Some(b)) = (scene.index_of(m.entity_a), scene.index_of(m.entity_b)) else {
                continue;
            };
            let (ba, bb) = (self.bodies[a], self.bodies[b]);
            if ba.is_static() && bb.is_static() {
                continue;
            }
            self.stats.warm_started_points +=
                self.cache
                    .warm_start(m, s.contact_match_threshold, s.warm_start_decay, s.impulse_sanity_bound);

            let (com_a, com_b) = (scene.bodies[a].world_com(), scene.bodies[b].world_com());
            let normal = m.normal;
            let (t1, t2) = tangent_basis(normal);
            let bias_dt = dt.min(0.1);
            let mut constraint = ContactConstraint {
                manifold: index,
                a,
                b,
                normal,
                tangents: [t1, t2],
                friction: m.friction,
                points: [PointConstraint::default(); MAX_CONTACTS],
                count: m.contact_count(),
            };
            for (slot, p) in constraint.points.iter_mut().zip(m.points()) {
                let (r_a, r_b) = (p.position - com_a, p.position - com_b);
                let vn = (bb.velocity_at(r_b) - ba.velocity_at(r_a)).dot(normal);
                let bounce = if -vn > s.restitution_threshold {
                    -m.restitution * vn
                } else {
                    0.0
                };
                // deeper overlaps get a stiffer correction
                let excess = (p.penetration - s.slop).max(0.0);
                let beta = s.baumgarte * (excess / (p.penetration + s.slop).max(f32::EPSILON)).clamp(0.0, 1.0);
                let push = (beta * excess / bias_dt).min(s.max_correction / dt);

                *slot = PointConstraint {
                    r_a,
                    r_b,
                    normal_mass: axis_mass(&ba, &bb, normal, r_a, r_b, s.cfm),
                    tangent_mass: [
                        axis_mass(&ba, &bb, t1, r_a, r_b, s.cfm),
                        axis_mass(&ba, &bb, t2, r_a, r_b, s.cfm),
                    ],
                    bias: bounce.max(push),
                    normal_impulse: p.normal_impulse,
                    tangent_impulse: p.tangent_impulse,
                };
            }
            self.contacts.push(constraint);
        }
    }

    /// Copy solved velocities back, enforcing caps; returns clamped bodies
    fn store_velocities(&mut self, scene: &mut PhysicsScene) -> Vec<bool> {
        let s = &self.settings;
        let mut clamped = vec![false; scene.bodies.len()];
        for (i, sim) in scene.bodies.iter_mut().enumerate() {
            if !sim.is_simulated() {
                continue;
            }
            let mut v = self.bodies[i].v;
            let mut w = self.bodies[i].w;
            let invalid = sanitize(&mut v) | sanitize(&mut w);
            let capped = cap_length(&mut v, s.max_linear_velocity) | cap_length(&mut w, s.max_angular_velocity);
            if invalid {
                warn!(entity = %sim.entity, "non-finite velocity after solve; cleared");
            } else if capped {
                debug!(entity = %sim.entity, "solver velocity clamped");
            }
            clamped[i] = invalid || capped;
            sim.body.linear_velocity = v;
            sim.body.angular_velocity = w;
            apply_locks(&mut sim.body);
            apply_speed_caps(&mut sim.body);
        }
        self.stats.clamped_bodies += clamped.iter().filter(|c| **c).count();
        clamped
    }

    fn update_cache(&mut self, manifolds: &mut [ContactManifold], clamped: &[bool]) {
        let bound = self.settings.impulse_sanity_bound;
        let mut largest = 0.0f32;
        for contact in &self.contacts {
            let manifold = &mut manifolds[contact.manifold];
            if clamped[contact.a] || clamped[contact.b] {
                zero_impulses(manifold);
                continue;
            }
            for p in manifold.points() {
                largest = largest.max(p.normal_impulse.abs());
            }
        }
        if largest > bound || !largest.is_finite() {
            warn!(impulse = largest, bound, "solver diverged; contact cache flushed");
            self.cache.clear();
            for contact in &self.contacts {
                zero_impulses(&mut manifolds[contact.manifold]);
            }
            self.stats.cache_flushes += 1;
            return;
        }
        self.cache.store(manifolds.iter(), bound);
    }

    /// Position pass
    ///
    /// Runs after positions are integrated. Contact anchors are the local
    /// points recorded at detection time, so the remaining overlap accounts
    /// for this step's motion.
    pub fn solve_positions(&mut self, scene: &mut PhysicsScene, manifolds: &[ContactManifold]) {
        let s = &self.settings;
        let mut poses: Vec<Pose> = scene.bodies.iter().map(Pose::from_sim).collect();
        poses.push(Pose::GROUND);

        let pairs: Vec<(usize, usize, &ContactManifold)> = manifolds
            .iter()
            .filter(|m| !m.is_trigger && !m.is_empty())
            .filter_map(|m| Some((scene.index_of(m.entity_a)?, scene.index_of(m.entity_b)?, m)))
            .filter(|(a, b, _)| poses[*a].movable || poses[*b].movable)
            .collect();

        for _ in 0..self.position_iterations {
            for (a, b, m) in &pairs {
                let (pa, pb) = pair_mut(&mut poses, *a, *b);
                for p in m.points() {
                    let (wa, wb) = (pa.anchor(p.local_point_a), pb.anchor(p.local_point_b));
                    let overlap = p.penetration - (wb - wa).dot(m.normal);
                    let correction = (s.baumgarte * (overlap - s.slop)).clamp(0.0, s.max_correction);
                    if correction <= 0.0 {
                        continue;
                    }
                    let (r_a, r_b) = (wa - pa.com(), wb - pb.com());
                    let (ra_n, rb_n) = (r_a.cross(m.normal), r_b.cross(m.normal));
                    let k = m.normal.dot(pa.inv_mass() * m.normal)
                        + m.normal.dot(pb.inv_mass() * m.normal)
                        + ra_n.dot(pa.inv_inertia() * ra_n)
                        + rb_n.dot(pb.inv_inertia() * rb_n);
                    if k <= f32::EPSILON {
                        continue;
                    }
                    let impulse = m.normal * (correction / k);
                    pa.apply_correction(-impulse, r_a);
                    pb.apply_correction(impulse, r_b);
                }
            }
            joints::solve_positions(&self.joints, &scene.joints, &mut poses, s);
        }

        for (sim, pose) in scene.bodies.iter_mut().zip(&poses) {
            if pose.movable && pose.position.is_finite() && pose.rotation.is_finite() {
                sim.position = pose.position;
                sim.rotation = pose.rotation;
                sim.refresh_aabb();
            }
        }
    }
}

fn zero_impulses(manifold: &mut ContactManifold) {
    for p in manifold.points_mut() {
        p.normal_impulse = 0.0;
        p.tangent_impulse = [0.0; 2];
    }
}
