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
//! Joint constraints
//!
//! Each active joint is lowered to a short list of rows: a 3-row point
//! lock, a 3-row angular lock, 1-D linear or angular rows with optional
//! one-sided clamps, and a torque-limited motor. Springs never become rows;
//! their damped force is applied once per pass.

use super::{axis_mass, pair_mut, Pose, SolverBody};
use crate::config::SolverSettings;
use crate::ecs::components::JointKind;
use crate::math::{rotation_vector, tangent_basis, Mat3, Quat, Vec3};
use crate::physics::body::{PhysicsScene, SimJoint};
use crate::physics::events::JointBrokenEvent;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Clamp {
    Free,
    AtLeastZero,
    AtMostZero,
}

impl Clamp {
    fn apply(self, total: f32) -> f32 {
        match self {
            Clamp::Free => total,
            Clamp::AtLeastZero => total.max(0.0),
            Clamp::AtMostZero => total.min(0.0),
        }
    }
}

#[derive(Debug, Clone)]
enum Row {
    Point {
        r_a: Vec3,
        r_b: Vec3,
        mass: Mat3,
        bias: Vec3,
    },
    Lock {
        mass: Mat3,
        bias: Vec3,
    },
    Linear {
        dir: Vec3,
        r_a: Vec3,
        r_b: Vec3,
        mass: f32,
        bias: f32,
        clamp: Clamp,
        impulse: f32,
    },
    Angular {
        dir: Vec3,
        mass: f32,
        bias: f32,
        clamp: Clamp,
        impulse: f32,
    },
    Motor {
        dir: Vec3,
        mass: f32,
        target: f32,
        max_impulse: f32,
        impulse: f32,
    },
}

/// A joint lowered to solver rows for one pass
#[derive(Debug, Clone)]
pub(crate) struct JointRow {
    joint: usize,
    a: usize,
    b: usize,
    rows: Vec<Row>,
    linear: Vec3,
    angular: Vec3,
}

fn skew(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

fn safe_inverse(m: Mat3) -> Mat3 {
    if m.determinant().abs() > 1e-12 {
        m.inverse()
    } else {
        Mat3::ZERO
    }
}

fn point_mass(a: &SolverBody, b: &SolverBody, r_a: Vec3, r_b: Vec3) -> Mat3 {
    let (sa, sb) = (skew(r_a), skew(r_b));
    let k = Mat3::from_diagonal(a.inv_mass + b.inv_mass) - sa * a.inv_inertia * sa - sb * b.inv_inertia * sb;
    safe_inverse(k)
}

fn angular_mass(a: &SolverBody, b: &SolverBody, dir: Vec3) -> f32 {
    let k = dir.dot(a.inv_inertia * dir) + dir.dot(b.inv_inertia * dir);
    if k > f32::EPSILON {
        1.0 / k
    } else {
        0.0
    }
}

/// Signed rotation of `q` about `axis`
fn twist_angle(q: Quat, axis: Vec3) -> f32 {
    let q = if q.w < 0.0 { -q } else { q };
    2.0 * Vec3::new(q.x, q.y, q.z).dot(axis).atan2(q.w)
}

/// One-sided row for a violated (lower, upper) range, if any
fn limit_clamp(value: f32, limits: Option<(f32, f32)>) -> Option<(f32, Clamp)> {
    let (lower, upper) = limits?;
    if value < lower {
        Some((value - lower, Clamp::AtLeastZero))
    } else if value > upper {
        Some((value - upper, Clamp::AtMostZero))
    } else {
        None
    }
}

struct Frame {
    position: Vec3,
    rotation: Quat,
    com: Vec3,
}

impl Frame {
    const WORLD: Frame = Frame {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        com: Vec3::ZERO,
    };
}

/// Lower every active joint into rows and apply spring forces
///
/// `bodies` carries one extra static body at the end standing in for the
/// world. Reference poses not yet captured are recorded on the joint.
pub(crate) fn prepare(
    scene: &mut PhysicsScene,
    bodies: &mut [SolverBody],
    settings: &SolverSettings,
    dt: f32,
) -> Vec<JointRow> {
    let ground = bodies.len() - 1;
    let beta = settings.baumgarte / dt;
    let mut out = Vec::new();

    for index in 0..scene.joints.len() {
        let (owner, connected, active, world_anchored) = {
            let sj = &scene.joints[index];
            (sj.owner, sj.joint.connected_body, sj.joint.is_active(), sj.joint.is_world_anchored())
        };
        if !active {
            continue;
        }
        let Some(a) = scene.index_of(owner) else { continue };
        let b = if world_anchored {
            ground
        } else {
            match scene.index_of(connected) {
                Some(b) => b,
                None => continue,
            }
        };
        if a == b {
            continue;
        }
        let (ba, bb) = (bodies[a], bodies[b]);
        if ba.is_static() && bb.is_static() {
            continue;
        }

        let frame = |i: usize| {
            if i == ground {
                Frame::WORLD
            } else {
                let s = &scene.bodies[i];
                Frame {
                    position: s.position,
                    rotation: s.rotation,
                    com: s.world_com(),
                }
            }
        };
        let (fa, fb) = (frame(a), frame(b));

        let joint = &mut scene.joints[index].joint;
        let world_a = fa.position + fa.rotation * joint.anchor_a;
        let world_b = fb.position + fb.rotation * joint.anchor_b;
        let (r_a, r_b) = (world_a - fa.com, world_b - fb.com);
        let relative = fb.rotation * fa.rotation.inverse();
        joint.cache.r_a = r_a;
        joint.cache.r_b = r_b;
        joint.cache.inv_inertia_a = ba.inv_inertia;
        joint.cache.inv_inertia_b = bb.inv_inertia;

        let mut row = JointRow {
            joint: index,
            a,
            b,
            rows: Vec::new(),
            linear: Vec3::ZERO,
            angular: Vec3::ZERO,
        };

        match &mut joint.kind {
            JointKind::Fixed(data) => {
                let rel_rot = *data.relative_rotation.get_or_insert(relative);
                let rel_pos = *data
                    .relative_position
                    .get_or_insert(fa.rotation.inverse() * (world_b - world_a));
                let linear_error = world_b - world_a - fa.rotation * rel_pos;
                let angular_error = rotation_vector(relative * rel_rot.inverse());
                row.rows.push(Row::Point {
                    r_a,
                    r_b,
                    mass: point_mass(&ba, &bb, r_a, r_b),
                    bias: linear_error * beta,
                });
                row.rows.push(Row::Lock {
                    mass: safe_inverse(ba.inv_inertia + bb.inv_inertia),
                    bias: angular_error * beta,
                });
            }
            JointKind::Hinge(data) => {
                let reference = *data.reference_rotation.get_or_insert(relative);
                let mut axis = (fa.rotation * data.axis_a).normalize_or_zero();
                if axis == Vec3::ZERO {
                    axis = Vec3::Y;
                }
                let axis_b = (fb.rotation * data.axis_b).normalize_or_zero();
                let misalign = axis.cross(axis_b);
                row.rows.push(Row::Point {
                    r_a,
                    r_b,
                    mass: point_mass(&ba, &bb, r_a, r_b),
                    bias: (world_b - world_a) * beta,
                });
                let (t1, t2) = tangent_basis(axis);
                for t in [t1, t2] {
                    row.rows.push(Row::Angular {
                        dir: t,
                        mass: angular_mass(&ba, &bb, t),
                        bias: misalign.dot(t) * beta,
                        clamp: Clamp::Free,
                        impulse: 0.0,
                    });
                }
                let angle = twist_angle(relative * reference.inverse(), axis);
                if let Some((error, clamp)) = limit_clamp(angle, data.limits) {
                    row.rows.push(Row::Angular {
                        dir: axis,
                        mass: angular_mass(&ba, &bb, axis),
                        bias: error * beta,
                        clamp,
                        impulse: 0.0,
                    });
                }
                if let Some(motor) = data.motor {
                    row.rows.push(Row::Motor {
                        dir: axis,
                        mass: angular_mass(&ba, &bb, axis),
                        target: motor.target_speed,
                        max_impulse: motor.max_torque.max(0.0) * dt,
                        impulse: 0.0,
                    });
                }
            }
            JointKind::Distance(data) => {
                let d = world_b - world_a;
                let len = d.length();
                let dir = if len > 1e-6 { d / len } else { Vec3::Y };
                let banded = data.min_distance.is_some() || data.max_distance.is_some();
                let violation = if banded {
                    let lower = data.min_distance.unwrap_or(0.0);
                    let upper = data.max_distance.unwrap_or(f32::INFINITY);
                    limit_clamp(len, Some((lower, upper)))
                } else {
                    let rest = *data.rest_length.get_or_insert(len);
                    Some((len - rest, Clamp::Free))
                };
                if let Some((error, clamp)) = violation {
                    row.rows.push(Row::Linear {
                        dir,
                        r_a,
                        r_b,
                        mass: axis_mass(&ba, &bb, dir, r_a, r_b, settings.cfm),
                        bias: error * beta,
                        clamp,
                        impulse: 0.0,
                    });
                }
            }
            JointKind::Spring(data) => {
                let d = world_b - world_a;
                let len = d.length();
                if len > 1e-6 {
                    let dir = d / len;
                    let (sa, sb) = pair_mut(bodies, a, b);
                    let closing = (sb.velocity_at(r_b) - sa.velocity_at(r_a)).dot(dir);
                    let force = -(data.stiffness * (len - data.rest_length) + data.damping * closing);
                    let impulse = dir * (force * dt);
                    sa.apply_impulse(-impulse, r_a);
                    sb.apply_impulse(impulse, r_b);
                    row.linear = impulse;
                }
            }
            JointKind::Slider(data) => {
                let rel_rot = *data.relative_rotation.get_or_insert(relative);
                let mut axis = (fa.rotation * data.axis).normalize_or_zero();
                if axis == Vec3::ZERO {
                    axis = Vec3::X;
                }
                let d = world_b - world_a;
                // A is constrained at the point coincident with B's anchor
                let r_line = world_b - fa.com;
                let (t1, t2) = tangent_basis(axis);
                for t in [t1, t2] {
                    row.rows.push(Row::Linear {
                        dir: t,
                        r_a: r_line,
                        r_b,
                        mass: axis_mass(&ba, &bb, t, r_line, r_b, settings.cfm),
                        bias: d.dot(t) * beta,
                        clamp: Clamp::Free,
                        impulse: 0.0,
                    });
                }
                row.rows.push(Row::Lock {
                    mass: safe_inverse(ba.inv_inertia + bb.inv_inertia),
                    bias: rotation_vector(relative * rel_rot.inverse()) * beta,
                });
                if let Some((error, clamp)) = limit_clamp(d.dot(axis), data.limits) {
                    row.rows.push(Row::Linear {
                        dir: axis,
                        r_a: r_line,
                        r_b,
                        mass: axis_mass(&ba, &bb, axis, r_line, r_b, settings.cfm),
                        bias: error * beta,
                        clamp,
                        impulse: 0.0,
                    });
                }
            }
        }
        out.push(row);
    }
    out
}

impl JointRow {
    /// One velocity iteration over this joint's rows
    pub fn solve_velocity(&mut self, bodies: &mut [SolverBody]) {
        let (ba, bb) = pair_mut(bodies, self.a, self.b);
        for row in &mut self.rows {
            match row {
                Row::Point { r_a, r_b, mass, bias } => {
                    let cdot = bb.velocity_at(*r_b) - ba.velocity_at(*r_a);
                    let impulse = *mass * (-cdot - *bias);
                    ba.apply_impulse(-impulse, *r_a);
                    bb.apply_impulse(impulse, *r_b);
                    self.linear += impulse;
                }
                Row::Lock { mass, bias } => {
                    let cdot = bb.w - ba.w;
                    let impulse = *mass * (-cdot - *bias);
                    ba.apply_angular_impulse(-impulse);
                    bb.apply_angular_impulse(impulse);
                    self.angular += impulse;
                }
                Row::Linear {
                    dir,
                    r_a,
                    r_b,
                    mass,
                    bias,
                    clamp,
                    impulse,
                } => {
                    let cdot = (bb.velocity_at(*r_b) - ba.velocity_at(*r_a)).dot(*dir);
                    let total = clamp.apply(*impulse - *mass * (cdot + *bias));
                    let applied = *dir * (total - *impulse);
                    *impulse = total;
                    ba.apply_impulse(-applied, *r_a);
                    bb.apply_impulse(applied, *r_b);
                    self.linear += applied;
                }
                Row::Angular {
                    dir,
                    mass,
                    bias,
                    clamp,
                    impulse,
                } => {
                    let cdot = (bb.w - ba.w).dot(*dir);
                    let total = clamp.apply(*impulse - *mass * (cdot + *bias));
                    let applied = *dir * (total - *impulse);
                    *impulse = total;
                    ba.apply_angular_impulse(-applied);
                    bb.apply_angular_impulse(applied);
                    self.angular += applied;
                }
                Row::Motor {
                    dir,
                    mass,
                    target,
                    max_impulse,
                    impulse,
                } => {
                    let cdot = (bb.w - ba.w).dot(*dir);
                    let total = (*impulse - *mass * (cdot - *target)).clamp(-*max_impulse, *max_impulse);
                    let applied = *dir * (total - *impulse);
                    *impulse = total;
                    ba.apply_angular_impulse(-applied);
                    bb.apply_angular_impulse(applied);
                    self.angular += applied;
                }
            }
        }
    }
}

/// Record the step impulses and break joints over their thresholds
pub(crate) fn finish(rows: &[JointRow], scene: &mut PhysicsScene, dt: f32, broken: &mut Vec<JointBrokenEvent>) {
    for row in rows {
        let sj = &mut scene.joints[row.joint];
        let joint = &mut sj.joint;
        joint.cache.accumulated_linear_impulse = row.linear;
        joint.cache.accumulated_angular_impulse = row.angular;
        let (linear, angular) = (row.linear.length(), row.angular.length());
        if linear > joint.break_force * dt || angular > joint.break_torque * dt {
            joint.mark_broken();
            warn!(
                joint = %sj.owner,
                linear_impulse = linear,
                angular_impulse = angular,
                "joint broke"
            );
            broken.push(JointBrokenEvent {
                joint_entity: sj.owner,
                connected_body: joint.connected_body,
                linear_impulse: linear,
                angular_impulse: angular,
            });
        }
    }
}

fn correct_point(pa: &mut Pose, pb: &mut Pose, world_a: Vec3, world_b: Vec3, error: Vec3, settings: &SolverSettings) {
    let error = error.clamp_length_max(settings.max_correction);
    let (r_a, r_b) = (world_a - pa.com(), world_b - pb.com());
    let a = SolverBody {
        v: Vec3::ZERO,
        w: Vec3::ZERO,
        inv_mass: pa.inv_mass(),
        inv_inertia: pa.inv_inertia(),
    };
    let b = SolverBody {
        inv_mass: pb.inv_mass(),
        inv_inertia: pb.inv_inertia(),
        ..a
    };
    let impulse = point_mass(&a, &b, r_a, r_b) * (-error * settings.baumgarte);
    pa.apply_correction(-impulse, r_a);
    pb.apply_correction(impulse, r_b);
}

fn correct_rotation(pa: &mut Pose, pb: &mut Pose, error: Vec3, settings: &SolverSettings) {
    let error = error.clamp_length_max(settings.max_correction);
    let mass = safe_inverse(pa.inv_inertia() + pb.inv_inertia());
    let impulse = mass * (-error * settings.baumgarte);
    pa.apply_rotation(-impulse);
    pb.apply_rotation(impulse);
}

/// One position iteration over the joints prepared in the velocity pass
pub(crate) fn solve_positions(rows: &[JointRow], joints: &[SimJoint], poses: &mut [Pose], settings: &SolverSettings) {
    for row in rows {
        let joint = &joints[row.joint].joint;
        if !joint.is_active() {
            continue;
        }
        let (pa, pb) = pair_mut(poses, row.a, row.b);
        let world_a = pa.anchor(joint.anchor_a);
        let world_b = pb.anchor(joint.anchor_b);
        let relative = pb.rotation * pa.rotation.inverse();

        match &joint.kind {
            JointKind::Fixed(data) => {
                if let (Some(rel_pos), Some(rel_rot)) = (data.relative_position, data.relative_rotation) {
                    let error = world_b - world_a - pa.rotation * rel_pos;
                    correct_point(pa, pb, world_a, world_b, error, settings);
                    let relative = pb.rotation * pa.rotation.inverse();
                    correct_rotation(pa, pb, rotation_vector(relative * rel_rot.inverse()), settings);
                }
            }
            JointKind::Hinge(data) => {
                correct_point(pa, pb, world_a, world_b, world_b - world_a, settings);
                let axis_a = pa.rotation * data.axis_a;
                let axis_b = pb.rotation * data.axis_b;
                correct_rotation(pa, pb, axis_a.cross(axis_b), settings);
            }
            JointKind::Distance(data) => {
                let d = world_b - world_a;
                let len = d.length();
                if len <= 1e-6 {
                    continue;
                }
                let target = match (data.min_distance, data.max_distance, data.rest_length) {
                    (None, None, Some(rest)) => rest,
                    (None, None, None) => continue,
                    (lower, upper, _) => len.clamp(lower.unwrap_or(0.0), upper.unwrap_or(f32::INFINITY).max(lower.unwrap_or(0.0))),
                };
                let error = d / len * (len - target);
                if error.length_squared() > 0.0 {
                    correct_point(pa, pb, world_a, world_b, error, settings);
                }
            }
            JointKind::Spring(_) => {}
            JointKind::Slider(data) => {
                let axis = (pa.rotation * data.axis).normalize_or_zero();
                let d = world_b - world_a;
                let off_axis = d - axis * d.dot(axis);
                correct_point(pa, pb, world_b, world_b, off_axis, settings);
                if let Some(rel_rot) = data.relative_rotation {
                    correct_rotation(pa, pb, rotation_vector(relative * rel_rot.inverse()), settings);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{JointMotor, PhysicsJoint, RigidBody};
    use crate::ecs::EntityId;
    use crate::math::Aabb;
    use crate::physics::body::SimBody;

    const DT: f32 = 1.0 / 60.0;

    fn body_at(index: u32, position: Vec3, velocity: Vec3) -> SimBody {
        SimBody {
            entity: EntityId::new(index, 0),
            body: RigidBody::dynamic(1.0).with_linear_velocity(velocity),
            implicit_static: false,
            position,
            rotation: Quat::IDENTITY,
            collider: None,
            aabb: Aabb::default(),
            woken: false,
            ccd_advanced: false,
        }
    }

    fn run(scene: &mut PhysicsScene, iterations: usize) -> (Vec<SolverBody>, Vec<JointBrokenEvent>) {
        let settings = SolverSettings::default();
        let mut bodies: Vec<SolverBody> = scene.bodies.iter().map(SolverBody::from_sim).collect();
        bodies.push(SolverBody::GROUND);
        let mut rows = prepare(scene, &mut bodies, &settings, DT);
        for _ in 0..iterations {
            for row in &mut rows {
                row.solve_velocity(&mut bodies);
            }
        }
        let mut broken = Vec::new();
        finish(&rows, scene, DT, &mut broken);
        (bodies, broken)
    }

    fn scene_with(bodies: Vec<SimBody>, joint: PhysicsJoint) -> PhysicsScene {
        let mut scene = PhysicsScene::new();
        let owner = bodies[0].entity;
        for b in bodies {
            scene.push_body(b);
        }
        scene.joints.push(SimJoint { owner, joint });
        scene
    }

    #[test]
    fn test_fixed_joint_carries_partner() {
        let a = body_at(0, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        let b = body_at(1, Vec3::X, Vec3::ZERO);
        let joint = PhysicsJoint::fixed(EntityId::new(1, 0), Vec3::new(0.5, 0.0, 0.0), Vec3::new(-0.5, 0.0, 0.0));
        let mut scene = scene_with(vec![a, b], joint);
        let (bodies, broken) = run(&mut scene, 20);
        assert!(broken.is_empty());
        assert!((bodies[0].v - bodies[1].v).length() < 1e-3, "{:?} {:?}", bodies[0].v, bodies[1].v);
        assert!((bodies[0].v.x - 1.0).abs() < 1e-2);
        match scene.joints[0].joint.kind {
            JointKind::Fixed(data) => assert!(data.relative_rotation.is_some() && data.relative_position.is_some()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_breakage_emits_event_and_latches() {
        let a = body_at(0, Vec3::ZERO, Vec3::new(0.0, -10.0, 0.0));
        let joint = PhysicsJoint::fixed(EntityId::INVALID, Vec3::ZERO, Vec3::ZERO).with_break_limits(1.0, f32::INFINITY);
        let mut scene = scene_with(vec![a], joint);
        let (_, broken) = run(&mut scene, 10);
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].joint_entity, EntityId::new(0, 0));
        assert!(scene.joints[0].joint.is_broken());

        let (bodies, broken) = run(&mut scene, 10);
        assert!(broken.is_empty());
        assert!((bodies[0].v.y + 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_hinge_allows_rotation_about_axis_only() {
        let mut a = body_at(0, Vec3::ZERO, Vec3::ZERO);
        a.body.angular_velocity = Vec3::new(1.0, 3.0, 1.0);
        let joint = PhysicsJoint::hinge(EntityId::INVALID, Vec3::ZERO, Vec3::ZERO, Vec3::Y);
        let mut scene = scene_with(vec![a], joint);
        let (bodies, _) = run(&mut scene, 20);
        let w = bodies[0].w;
        assert!(w.x.abs() < 1e-3 && w.z.abs() < 1e-3, "{w:?}");
        assert!((w.y - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_hinge_motor_reaches_target_speed() {
        let a = body_at(0, Vec3::ZERO, Vec3::ZERO);
        let mut joint = PhysicsJoint::hinge(EntityId::INVALID, Vec3::ZERO, Vec3::ZERO, Vec3::Y);
        if let JointKind::Hinge(data) = &mut joint.kind {
            data.motor = Some(JointMotor {
                target_speed: 2.0,
                max_torque: 1.0e4,
            });
        }
        let mut scene = scene_with(vec![a], joint);
        let (bodies, _) = run(&mut scene, 20);
        // the body is B's counterpart of the world, so it spins opposite to the target
        assert!((bodies[0].w.y + 2.0).abs() < 1e-2, "{:?}", bodies[0].w);
    }

    #[test]
    fn test_distance_band_only_pulls_when_stretched() {
        let a = body_at(0, Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, -3.0, 0.0));
        let mut joint = PhysicsJoint::distance(EntityId::INVALID, Vec3::ZERO, Vec3::ZERO);
        if let JointKind::Distance(data) = &mut joint.kind {
            data.max_distance = Some(2.0);
        }
        let mut scene = scene_with(vec![a], joint.clone());
        let (bodies, _) = run(&mut scene, 10);
        assert!((bodies[0].v.y + 3.0).abs() < 1e-5, "slack band must not act");

        let a = body_at(0, Vec3::new(0.0, -2.5, 0.0), Vec3::new(0.0, -3.0, 0.0));
        let mut scene = scene_with(vec![a], joint);
        let (bodies, _) = run(&mut scene, 10);
        assert!(bodies[0].v.y > 0.0);
    }

    #[test]
    fn test_spring_pulls_toward_rest_length() {
        let a = body_at(0, Vec3::new(0.0, -3.0, 0.0), Vec3::ZERO);
        let joint = PhysicsJoint::spring(EntityId::INVALID, Vec3::ZERO, Vec3::ZERO, 1.0, 60.0, 0.0);
        let mut scene = scene_with(vec![a], joint);
        let (bodies, _) = run(&mut scene, 1);
        // 60 N/m * 2 m over one step on 1 kg
        assert!((bodies[0].v.y - 2.0).abs() < 1e-3, "{:?}", bodies[0].v);
    }

    #[test]
    fn test_slider_keeps_motion_on_axis() {
        let a = body_at(0, Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        let joint = PhysicsJoint::slider(EntityId::INVALID, Vec3::ZERO, Vec3::ZERO, Vec3::X);
        let mut scene = scene_with(vec![a], joint);
        let (bodies, _) = run(&mut scene, 20);
        let v = bodies[0].v;
        assert!(v.y.abs() < 1e-3 && v.z.abs() < 1e-3, "{v:?}");
        assert!((v.x - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_twist_angle_sign() {
        let q = Quat::from_rotation_y(0.4);
        assert!((twist_angle(q, Vec3::Y) - 0.4).abs() < 1e-5);
        assert!((twist_angle(q.inverse(), Vec3::Y) + 0.4).abs() < 1e-5);
    }
}
