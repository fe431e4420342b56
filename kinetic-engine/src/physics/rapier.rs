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
//! `rapier3d` adapter
//!
//! Mirrors the gathered scene into rapier's body, collider and joint sets,
//! steps rapier's pipeline and reads the results back into the scene. Two
//! maps tie the worlds together: entity to handles and collider handle to
//! entity (also stored in each collider's `user_data`). Material combine
//! modes are enforced per contact in a contact-modification hook, and
//! rapier's contact and intersection pairs are converted into the engine's
//! manifolds so the same enter, stay and exit events are produced.
//!
//! Joint breakage is checked against the impulses rapier applied during the
//! step. Distance joints map to rope joints, so only their upper bound is
//! enforced.

use crate::config::PhysicsConfig;
use crate::ecs::components::{BodyType, Collider, JointKind, PhysicsJoint, PhysicsMaterial, RigidBody};
use crate::ecs::{ComponentEvent, EntityId, World};
use crate::error::Result;
use crate::math::{Quat, Vec3};
use crate::physics::backend::{PhysicsBackend, StepOutput};
use crate::physics::body::{PhysicsScene, SimBody};
use crate::physics::collision::ContactTracker;
use crate::physics::contact::ContactManifold;
use crate::physics::events::JointBrokenEvent;
use crate::physics::shapes::ColliderShape;
use parking_lot::Mutex;
use rapier3d::na::{Quaternion, Translation3, Unit, UnitQuaternion};
use rapier3d::prelude::{
    ActiveHooks, CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet, ContactModificationContext,
    DefaultBroadPhase, FixedJointBuilder, GenericJoint, Group, ImpulseJointHandle, ImpulseJointSet,
    IntegrationParameters, InteractionGroups, IslandManager, Isometry, MassProperties, MultibodyJointSet,
    NarrowPhase, PhysicsHooks, PhysicsPipeline, Point, PrismaticJointBuilder, Real, RevoluteJointBuilder,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RopeJointBuilder, SpringJointBuilder, Vector,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

fn to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    let q = Quaternion::new(rotation.w, rotation.x, rotation.y, rotation.z);
    Isometry::from_parts(
        Translation3::new(position.x, position.y, position.z),
        UnitQuaternion::new_normalize(q),
    )
}

fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn from_isometry(iso: &Isometry<Real>) -> (Vec3, Quat) {
    let t = iso.translation.vector;
    let q = iso.rotation;
    (Vec3::new(t.x, t.y, t.z), Quat::from_xyzw(q.i, q.j, q.k, q.w).normalize())
}

fn unit(v: Vec3) -> Unit<Vector<Real>> {
    Unit::new_normalize(to_vector(v.try_normalize().unwrap_or(Vec3::Y)))
}

#[derive(Debug, Clone, Copy)]
struct BodyRecord {
    body: RigidBodyHandle,
    collider: Option<ColliderHandle>,
    body_type: BodyType,
}

#[derive(Debug, Clone, Copy)]
struct JointRecord {
    handle: ImpulseJointHandle,
    connected: EntityId,
}

/// Per-contact material combination, first (lower) entity's mode wins
struct MaterialHook {
    materials: HashMap<ColliderHandle, (EntityId, Arc<PhysicsMaterial>)>,
}

impl PhysicsHooks for MaterialHook {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let (Some(a), Some(b)) = (
            self.materials.get(&context.collider1),
            self.materials.get(&context.collider2),
        ) else {
            return;
        };
        let (first, second) = if a.0 <= b.0 { (&a.1, &b.1) } else { (&b.1, &a.1) };
        let friction = PhysicsMaterial::combined_friction(first, second);
        let restitution = PhysicsMaterial::combined_restitution(first, second);
        for contact in context.solver_contacts.iter_mut() {
            contact.friction = friction;
            contact.restitution = restitution;
        }
    }
}

/// Physics backend running on `rapier3d`
pub struct RapierBackend {
    config: PhysicsConfig,
    pipeline: PhysicsPipeline,
    params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    ground: RigidBodyHandle,
    entity_bodies: HashMap<EntityId, BodyRecord>,
    collider_entities: HashMap<ColliderHandle, EntityId>,
    joints: HashMap<EntityId, JointRecord>,
    tracker: ContactTracker,
    dirty: Arc<Mutex<HashSet<EntityId>>>,
}

impl RapierBackend {
    /// Create an empty rapier world for a configuration
    pub fn new(config: &PhysicsConfig) -> Self {
        let mut bodies = RigidBodySet::new();
        let ground = bodies.insert(RigidBodyBuilder::fixed().build());
        RapierBackend {
            config: config.clone(),
            pipeline: PhysicsPipeline::new(),
            params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            ground,
            entity_bodies: HashMap::new(),
            collider_entities: HashMap::new(),
            joints: HashMap::new(),
            tracker: ContactTracker::new(),
            dirty: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Rapier bodies mirrored from the scene
    pub fn body_count(&self) -> usize {
        self.entity_bodies.len()
    }

    /// Rapier joints mirrored from the scene
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn remove_body(&mut self, entity: EntityId) {
        let Some(record) = self.entity_bodies.remove(&entity) else {
            return;
        };
        if let Some(collider) = record.collider {
            self.collider_entities.remove(&collider);
        }
        self.bodies.remove(
            record.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn create_body(&mut self, sim: &SimBody) {
        let rb = &sim.body;
        let builder = match rb.body_type() {
            BodyType::Static => RigidBodyBuilder::fixed(),
            BodyType::Kinematic => RigidBodyBuilder::kinematic_position_based(),
            BodyType::Dynamic => {
                let inertia = rb.inertia_tensor();
                RigidBodyBuilder::dynamic()
                    .linvel(to_vector(rb.linear_velocity))
                    .angvel(to_vector(rb.angular_velocity))
                    .linear_damping(rb.linear_damping)
                    .angular_damping(rb.angular_damping)
                    .gravity_scale(if rb.use_gravity { rb.gravity_scale } else { 0.0 })
                    .ccd_enabled(rb.use_ccd)
                    .enabled_translations(!rb.lock_position[0], !rb.lock_position[1], !rb.lock_position[2])
                    .enabled_rotations(!rb.lock_rotation[0], !rb.lock_rotation[1], !rb.lock_rotation[2])
                    .additional_mass_properties(MassProperties::new(
                        to_point(rb.center_of_mass()),
                        rb.mass(),
                        Vector::new(inertia.x_axis.x, inertia.y_axis.y, inertia.z_axis.z),
                    ))
            }
        };
        let handle = self.bodies.insert(
            builder
                .position(to_isometry(sim.position, sim.rotation))
                .user_data(u128::from(sim.entity.to_bits()))
                .build(),
        );

        let collider = sim.collider.as_ref().and_then(|c| {
            let built = collider_builder(c, sim.entity)?;
            Some(self.colliders.insert_with_parent(built, handle, &mut self.bodies))
        });
        if let Some(c) = collider {
            self.collider_entities.insert(c, sim.entity);
        }
        self.entity_bodies.insert(
            sim.entity,
            BodyRecord {
                body: handle,
                collider,
                body_type: rb.body_type(),
            },
        );
    }

    /// Bring rapier's sets in line with the scene
    fn push_scene(&mut self, scene: &PhysicsScene) {
        let dirty: Vec<EntityId> = self.dirty.lock().drain().collect();
        for entity in dirty {
            self.remove_body(entity);
        }

        let present: HashSet<EntityId> = scene.bodies.iter().map(|s| s.entity).collect();
        let gone: Vec<EntityId> = self
            .entity_bodies
            .keys()
            .filter(|e| !present.contains(e))
            .copied()
            .collect();
        for entity in gone {
            self.remove_body(entity);
        }

        for sim in &scene.bodies {
            match self.entity_bodies.get(&sim.entity) {
                Some(record) if record.body_type == sim.body.body_type() => {}
                Some(_) => {
                    self.remove_body(sim.entity);
                    self.create_body(sim);
                    continue;
                }
                None => {
                    self.create_body(sim);
                    continue;
                }
            }
            let Some(record) = self.entity_bodies.get(&sim.entity) else {
                continue;
            };
            let Some(body) = self.bodies.get_mut(record.body) else {
                continue;
            };
            let pose = to_isometry(sim.position, sim.rotation);
            match record.body_type {
                BodyType::Static => body.set_position(pose, false),
                BodyType::Kinematic => body.set_next_kinematic_position(pose),
                BodyType::Dynamic => {
                    body.set_position(pose, false);
                    body.set_linvel(to_vector(sim.body.linear_velocity), false);
                    body.set_angvel(to_vector(sim.body.angular_velocity), false);
                    body.reset_forces(false);
                    body.reset_torques(false);
                    if sim.body.force() != Vec3::ZERO || sim.body.torque() != Vec3::ZERO {
                        body.add_force(to_vector(sim.body.force()), true);
                        body.add_torque(to_vector(sim.body.torque()), true);
                    }
                    if sim.body.is_sleeping() && !body.is_sleeping() {
                        body.sleep();
                    } else if !sim.body.is_sleeping() && body.is_sleeping() {
                        body.wake_up(true);
                    }
                }
            }
        }

        self.push_joints(scene);
    }

    fn push_joints(&mut self, scene: &PhysicsScene) {
        let wanted: HashMap<EntityId, &PhysicsJoint> = scene
            .joints
            .iter()
            .filter(|sj| sj.joint.is_active())
            .map(|sj| (sj.owner, &sj.joint))
            .collect();

        let stale: Vec<EntityId> = self
            .joints
            .iter()
            .filter(|(owner, record)| {
                wanted.get(*owner).map_or(true, |j| j.connected_body != record.connected)
                    || self.impulse_joints.get(record.handle).is_none()
            })
            .map(|(owner, _)| *owner)
            .collect();
        for owner in stale {
            if let Some(record) = self.joints.remove(&owner) {
                self.impulse_joints.remove(record.handle, true);
            }
        }

        for (owner, joint) in wanted {
            if self.joints.contains_key(&owner) {
                continue;
            }
            let (Some(a), Some(sim_a)) = (self.entity_bodies.get(&owner), scene.body(owner)) else {
                continue;
            };
            let (handle_b, pose_b) = if joint.connected_body.is_some() {
                match (self.entity_bodies.get(&joint.connected_body), scene.body(joint.connected_body)) {
                    (Some(b), Some(sim_b)) => (b.body, (sim_b.position, sim_b.rotation)),
                    _ => continue,
                }
            } else {
                (self.ground, (Vec3::ZERO, Quat::IDENTITY))
            };
            let data = build_joint(joint, (sim_a.position, sim_a.rotation), pose_b);
            let handle = self.impulse_joints.insert(a.body, handle_b, data, true);
            self.joints.insert(
                owner,
                JointRecord {
                    handle,
                    connected: joint.connected_body,
                },
            );
        }
    }

    /// Latch joints whose step impulse exceeded their limits
    fn check_breakage(&mut self, scene: &mut PhysicsScene, dt: f32, broken: &mut Vec<JointBrokenEvent>) {
        for sj in scene.joints.iter_mut() {
            let Some(record) = self.joints.get(&sj.owner).copied() else {
                continue;
            };
            let Some(joint) = self.impulse_joints.get(record.handle) else {
                continue;
            };
            let linear = joint.impulses.fixed_rows::<3>(0).norm();
            let angular = joint.impulses.fixed_rows::<3>(3).norm();
            if linear > sj.joint.break_force * dt || angular > sj.joint.break_torque * dt {
                warn!(joint = %sj.owner, linear, angular, "joint broke");
                sj.joint.mark_broken();
                self.impulse_joints.remove(record.handle, true);
                self.joints.remove(&sj.owner);
                broken.push(JointBrokenEvent {
                    joint_entity: sj.owner,
                    connected_body: sj.joint.connected_body,
                    linear_impulse: linear,
                    angular_impulse: angular,
                });
            }
        }
    }

    fn pull_scene(&self, scene: &mut PhysicsScene) {
        for sim in scene.bodies.iter_mut() {
            let Some(record) = self.entity_bodies.get(&sim.entity) else {
                continue;
            };
            let Some(body) = self.bodies.get(record.body) else {
                continue;
            };
            if record.body_type == BodyType::Dynamic {
                let (position, rotation) = from_isometry(body.position());
                sim.body.set_previous_pose(sim.position, sim.rotation);
                sim.position = position;
                sim.rotation = rotation;
                sim.body.linear_velocity = from_vector(body.linvel());
                sim.body.angular_velocity = from_vector(body.angvel());
                if body.is_sleeping() && !sim.body.is_sleeping() {
                    sim.body.set_sleep_state(true, sim.body.sleep_timer());
                } else if !body.is_sleeping() && sim.body.is_sleeping() {
                    sim.body.wake_up();
                }
            }
            sim.body.clear_forces();
            sim.refresh_aabb();
        }
    }

    fn collect_manifolds(&self, scene: &PhysicsScene) -> Vec<ContactManifold> {
        let mut out = Vec::new();
        for pair in self.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            let (Some(&e1), Some(&e2)) = (
                self.collider_entities.get(&pair.collider1),
                self.collider_entities.get(&pair.collider2),
            ) else {
                continue;
            };
            let (Some(a), Some(b)) = (scene.body(e1.min(e2)), scene.body(e1.max(e2))) else {
                continue;
            };
            let flip = e1 > e2;
            for rm in &pair.manifolds {
                if rm.data.solver_contacts.is_empty() {
                    continue;
                }
                let mut m = ContactManifold::new(a.entity, b.entity);
                let n = from_vector(&rm.data.normal);
                m.normal = if flip { -n } else { n };
                for contact in &rm.data.solver_contacts {
                    let p = contact.point;
                    m.add_point(Vec3::new(p.x, p.y, p.z), (-contact.dist).max(0.0));
                }
                m.compute_local_points(a.position, a.rotation, b.position, b.rotation);
                if let (Some(ca), Some(cb)) = (&a.collider, &b.collider) {
                    m.friction = PhysicsMaterial::combined_friction(&ca.material, &cb.material);
                    m.restitution = PhysicsMaterial::combined_restitution(&ca.material, &cb.material);
                }
                out.push(m);
                break;
            }
        }
        for (c1, c2, intersecting) in self.narrow_phase.intersection_pairs() {
            if !intersecting {
                continue;
            }
            let (Some(&e1), Some(&e2)) = (self.collider_entities.get(&c1), self.collider_entities.get(&c2)) else {
                continue;
            };
            let mut m = ContactManifold::new(e1.min(e2), e1.max(e2));
            m.is_trigger = true;
            out.push(m);
        }
        out.sort_by_key(|m| (m.entity_a, m.entity_b));
        out
    }

    fn material_hook(&self, scene: &PhysicsScene) -> MaterialHook {
        let materials = self
            .collider_entities
            .iter()
            .filter_map(|(handle, entity)| {
                let collider = scene.body(*entity)?.collider.as_ref()?;
                Some((*handle, (*entity, Arc::clone(&collider.material))))
            })
            .collect();
        MaterialHook { materials }
    }
}

impl std::fmt::Debug for RapierBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RapierBackend")
            .field("bodies", &self.entity_bodies.len())
            .field("joints", &self.joints.len())
            .finish()
    }
}

fn collider_builder(collider: &Collider, entity: EntityId) -> Option<rapier3d::prelude::Collider> {
    let builder = match collider.shape() {
        ColliderShape::Sphere { radius } => ColliderBuilder::ball(*radius),
        ColliderShape::Box { half_extents } => ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z),
        ColliderShape::Capsule { radius, height } => ColliderBuilder::capsule_y(height * 0.5, *radius),
        ColliderShape::Mesh { vertices: points } | ColliderShape::ConvexHull { points } => {
            let pts: Vec<Point<Real>> = points.iter().map(|p| to_point(*p)).collect();
            match ColliderBuilder::convex_hull(&pts) {
                Some(b) => b,
                None => {
                    warn!(%entity, "degenerate hull; using bounding sphere");
                    ColliderBuilder::ball(collider.shape().bounding_radius())
                }
            }
        }
    };
    let groups = InteractionGroups::new(
        Group::from_bits_truncate(1u32 << collider.layer()),
        Group::from_bits_truncate(collider.collision_mask),
    );
    Some(
        builder
            .position(to_isometry(collider.center, collider.rotation))
            .sensor(collider.is_trigger)
            .density(0.0)
            .friction(collider.material.friction)
            .restitution(collider.material.restitution)
            .collision_groups(groups)
            .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
            .user_data(u128::from(entity.to_bits()))
            .build(),
    )
}

fn build_joint(joint: &PhysicsJoint, pose_a: (Vec3, Quat), pose_b: (Vec3, Quat)) -> GenericJoint {
    let anchor_a = to_point(joint.anchor_a);
    let anchor_b = to_point(joint.anchor_b);
    let mut data: GenericJoint = match &joint.kind {
        JointKind::Fixed(_) => {
            // frame B starts aligned with frame A so the current pose is kept
            let rel = pose_b.1.inverse() * pose_a.1;
            FixedJointBuilder::new()
                .local_frame1(to_isometry(joint.anchor_a, Quat::IDENTITY))
                .local_frame2(to_isometry(joint.anchor_b, rel))
                .build()
                .into()
        }
        JointKind::Hinge(h) => {
            let mut builder = RevoluteJointBuilder::new(unit(h.axis_a))
                .local_anchor1(anchor_a)
                .local_anchor2(anchor_b);
            if let Some((lo, hi)) = h.limits {
                builder = builder.limits([lo, hi]);
            }
            if let Some(motor) = h.motor {
                builder = builder
                    .motor_velocity(motor.target_speed, 1.0)
                    .motor_max_force(motor.max_torque);
            }
            let mut data: GenericJoint = builder.build().into();
            data.set_local_axis2(unit(h.axis_b));
            data
        }
        JointKind::Distance(d) => {
            let world_a = pose_a.0 + pose_a.1 * joint.anchor_a;
            let world_b = pose_b.0 + pose_b.1 * joint.anchor_b;
            let length = d
                .max_distance
                .or(d.rest_length)
                .unwrap_or_else(|| world_a.distance(world_b));
            RopeJointBuilder::new(length)
                .local_anchor1(anchor_a)
                .local_anchor2(anchor_b)
                .build()
                .into()
        }
        JointKind::Spring(s) => SpringJointBuilder::new(s.rest_length, s.stiffness, s.damping)
            .local_anchor1(anchor_a)
            .local_anchor2(anchor_b)
            .build()
            .into(),
        JointKind::Slider(s) => {
            let mut builder = PrismaticJointBuilder::new(unit(s.axis))
                .local_anchor1(anchor_a)
                .local_anchor2(anchor_b);
            if let Some((lo, hi)) = s.limits {
                builder = builder.limits([lo, hi]);
            }
            builder.build().into()
        }
    };
    data.set_contacts_enabled(joint.enable_collision);
    data
}

impl PhysicsBackend for RapierBackend {
    fn name(&self) -> &str {
        "rapier3d"
    }

    fn attach(&mut self, world: &World) -> Result<()> {
        let dirty = Arc::clone(&self.dirty);
        world.components().on_change::<RigidBody>(Arc::new(move |id, event, _: &RigidBody| {
            if event != ComponentEvent::Modified {
                dirty.lock().insert(id);
            }
        }))?;
        let dirty = Arc::clone(&self.dirty);
        world.components().on_change::<Collider>(Arc::new(move |id, event, _: &Collider| {
            if event != ComponentEvent::Modified {
                dirty.lock().insert(id);
            }
        }))?;
        debug!(backend = self.name(), "physics backend attached");
        Ok(())
    }

    fn fixed_update(&mut self, scene: &mut PhysicsScene, dt: f32, output: &mut StepOutput) {
        output.clear();
        output.stats.bodies = scene.bodies.len();
        output.stats.awake = scene.bodies.iter().filter(|s| s.is_simulated()).count();

        self.push_scene(scene);
        self.params.dt = dt;
        let hooks = self.material_hook(scene);
        self.pipeline.step(
            &to_vector(self.config.gravity),
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &hooks,
            &(),
        );

        self.pull_scene(scene);
        self.check_breakage(scene, dt, &mut output.events.joints_broken);
        output.manifolds = self.collect_manifolds(scene);
        self.tracker.update(scene, &output.manifolds, &mut output.events);
        output.stats.manifolds = output.manifolds.len();
        output.stats.sleep.sleeping = scene.bodies.iter().filter(|s| s.body.is_sleeping()).count();
    }

    fn reset(&mut self) {
        self.tracker.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::Transform;
    use crate::physics::events::ContactPhase;

    #[test]
    fn test_sphere_lands_on_ground() {
        let world = World::new();
        let ground = world.spawn();
        world
            .add_component(ground, Transform::from_position(Vec3::new(0.0, -0.5, 0.0)))
            .unwrap();
        world.add_component(ground, Collider::cuboid(Vec3::new(5.0, 0.5, 5.0))).unwrap();
        let ball = world.spawn();
        world
            .add_component(ball, Transform::from_position(Vec3::new(0.0, 2.0, 0.0)))
            .unwrap();
        world.add_component(ball, RigidBody::dynamic(1.0)).unwrap();
        world.add_component(ball, Collider::sphere(0.5)).unwrap();

        let mut backend = RapierBackend::new(&PhysicsConfig::default());
        backend.attach(&world).unwrap();
        let mut output = StepOutput::default();
        let mut entered = false;
        let mut scene = PhysicsScene::gather(&world);
        for _ in 0..120 {
            backend.fixed_update(&mut scene, 1.0 / 60.0, &mut output);
            entered |= output.events.collisions.iter().any(|e| e.phase == ContactPhase::Enter);
        }
        assert_eq!(backend.body_count(), 2);
        assert!(entered);
        let y = scene.body(ball).unwrap().position.y;
        assert!(y > 0.3 && y < 0.7, "ball at {y}");
    }
}
