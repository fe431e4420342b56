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
//! Continuous collision detection
//!
//! Fast or explicitly flagged bodies are swept along their step
//! displacement before positions are integrated. Orientation is held at the
//! start-of-step pose during the sweep. The earliest time of impact per
//! candidate advances the body to just short of contact, resolves the
//! approaching velocity and spends the remaining step on the new velocity.
//! Resting and penetrating contacts are left to the discrete pass.

use crate::config::PhysicsConfig;
use crate::ecs::components::PhysicsMaterial;
use crate::math::{closest_point_on_segment, closest_points_segments, integrate_rotation, Vec3};
use crate::physics::body::PhysicsScene;
use crate::physics::contact::ContactManifold;
use crate::physics::integrator::apply_locks;
use crate::physics::narrow_phase::{collide, ShapeRef};
use crate::physics::shapes::{capsule_segment, ColliderShape};
use tracing::{debug, trace};

/// Gap left between a swept body and the surface it hit (m)
pub const CCD_SKIN: f32 = 0.005;

/// Closing distance per step below which a touching pair counts as resting (m)
const RESTING_APPROACH: f32 = 2.0 * CCD_SKIN;
const TOLERANCE: f32 = 1e-4;
const MAX_ADVANCE_ITERATIONS: usize = 32;
const MAX_BISECTION_ITERATIONS: usize = 16;
const MAX_SAMPLES: usize = 32;

/// First contact along a sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOfImpact {
    /// Fraction of the displacement in `[0, 1]`
    pub toi: f32,
    /// Contact normal from the moving shape to the other
    pub normal: Vec3,
    /// Contact point at the time of impact
    pub point: Vec3,
}

enum Core {
    Point(Vec3),
    Segment(Vec3, Vec3),
    Box,
}

fn rounded_core(shape: &ShapeRef) -> Option<(Core, f32)> {
    match shape.shape {
        ColliderShape::Sphere { radius } => Some((Core::Point(shape.position), *radius)),
        ColliderShape::Capsule { radius, height } => {
            let (p, q) = capsule_segment(shape.position, shape.rotation, *height);
            Some((Core::Segment(p, q), *radius))
        }
        ColliderShape::Box { .. } => Some((Core::Box, 0.0)),
        _ => None,
    }
}

fn clamp_to_box(bx: &ShapeRef, point: Vec3) -> Vec3 {
    let h = match bx.shape {
        ColliderShape::Box { half_extents } => *half_extents,
        _ => Vec3::ZERO,
    };
    let local = bx.rotation.inverse() * (point - bx.position);
    bx.position + bx.rotation * local.clamp(-h, h)
}

fn segment_to_box(p: Vec3, q: Vec3, bx: &ShapeRef) -> (Vec3, Vec3) {
    let mut on_segment = (p + q) * 0.5;
    let mut on_box = clamp_to_box(bx, on_segment);
    for _ in 0..8 {
        on_segment = closest_point_on_segment(on_box, p, q);
        on_box = clamp_to_box(bx, on_segment);
    }
    (on_segment, on_box)
}

/// Closest points between the cores of two rounded shapes
fn core_points(a: &ShapeRef, ca: &Core, b: &ShapeRef, cb: &Core) -> Option<(Vec3, Vec3)> {
    Some(match (ca, cb) {
        (Core::Point(x), Core::Point(y)) => (*x, *y),
        (Core::Point(x), Core::Segment(p, q)) => (*x, closest_point_on_segment(*x, *p, *q)),
        (Core::Segment(p, q), Core::Point(y)) => (closest_point_on_segment(*y, *p, *q), *y),
        (Core::Segment(p1, q1), Core::Segment(p2, q2)) => {
            let (_, _, c1, c2) = closest_points_segments(*p1, *q1, *p2, *q2);
            (c1, c2)
        }
        (Core::Point(x), Core::Box) => (*x, clamp_to_box(b, *x)),
        (Core::Box, Core::Point(y)) => (clamp_to_box(a, *y), *y),
        (Core::Segment(p, q), Core::Box) => segment_to_box(*p, *q, b),
        (Core::Box, Core::Segment(p, q)) => {
            let (on_segment, on_box) = segment_to_box(*p, *q, a);
            (on_box, on_segment)
        }
        (Core::Box, Core::Box) => return None,
    })
}

/// Signed gap between two rounded shapes with the A→B normal and A's surface point
fn rounded_gap(a: &ShapeRef, b: &ShapeRef) -> Option<(f32, Vec3, Vec3)> {
    let (ca, ra) = rounded_core(a)?;
    let (cb, rb) = rounded_core(b)?;
    let (pa, pb) = core_points(a, &ca, b, &cb)?;
    let d = pb - pa;
    let dist = d.length();
    if dist < 1e-6 {
        // cores touch: treat as overlapping
        return Some((-(ra + rb), (b.position - a.position).normalize_or(Vec3::Y), pa));
    }
    let normal = d / dist;
    Some((dist - ra - rb, normal, pa + normal * ra))
}

fn moved<'a>(shape: &ShapeRef<'a>, offset: Vec3) -> ShapeRef<'a> {
    ShapeRef {
        position: shape.position + offset,
        ..*shape
    }
}

/// Conservative advancement of A along `d` toward a fixed B
fn advance(a: &ShapeRef, b: &ShapeRef, d: Vec3, start: f32) -> Option<TimeOfImpact> {
    let speed = d.length();
    if speed < 1e-9 {
        return None;
    }
    let mut t = start;
    for _ in 0..MAX_ADVANCE_ITERATIONS {
        let (gap, normal, point) = rounded_gap(&moved(a, d * t), b)?;
        if gap <= TOLERANCE {
            if t == 0.0 && gap < 0.0 {
                return None;
            }
            return Some(TimeOfImpact { toi: t, normal, point });
        }
        if d.dot(normal) <= 0.0 {
            return None;
        }
        // shapes close at most |d| per unit of t
        t += gap / speed;
        if t > 1.0 {
            return None;
        }
    }
    None
}

fn sphere_sphere(a: &ShapeRef, ra: f32, b: &ShapeRef, rb: f32, d: Vec3) -> Option<TimeOfImpact> {
    let rel = b.position - a.position;
    let sum = ra + rb;
    let c = rel.length_squared() - sum * sum;
    if c <= 0.0 {
        return None;
    }
    let qa = d.length_squared();
    if qa < 1e-12 {
        return None;
    }
    let qb = -2.0 * rel.dot(d);
    let disc = qb * qb - 4.0 * qa * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-qb - disc.sqrt()) / (2.0 * qa);
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let center = a.position + d * t;
    let normal = (b.position - center).normalize_or(Vec3::Y);
    Some(TimeOfImpact {
        toi: t,
        normal,
        point: center + normal * ra,
    })
}

fn sphere_box(sphere: &ShapeRef, radius: f32, bx: &ShapeRef, d: Vec3) -> Option<TimeOfImpact> {
    let h = match bx.shape {
        ColliderShape::Box { half_extents } => *half_extents,
        _ => return None,
    };
    let inv = bx.rotation.inverse();
    let origin = inv * (sphere.position - bx.position);
    let dir = inv * d;
    let rounded = crate::math::Aabb::new(-h - Vec3::splat(radius), h + Vec3::splat(radius));
    // minimum root over the radius-expanded box, refined on the true rounded shape
    let entry = rounded.ray_entry(origin, dir, 1.0)?;
    advance(sphere, bx, d, entry)
}

fn bisect(a: &ShapeRef, b: &ShapeRef, d: Vec3) -> Option<TimeOfImpact> {
    let mut scratch = ContactManifold::new(Default::default(), Default::default());
    let overlaps = |t: f32, m: &mut ContactManifold| collide(&moved(a, d * t), b, m);
    if overlaps(0.0, &mut scratch) {
        return None;
    }
    let size = a
        .shape
        .characteristic_size()
        .min(b.shape.characteristic_size())
        .max(1e-3);
    let samples = ((d.length() / (0.5 * size)).ceil() as usize).clamp(1, MAX_SAMPLES);

    let mut lo = 0.0;
    for k in 1..=samples {
        let t = k as f32 / samples as f32;
        if !overlaps(t, &mut scratch) {
            lo = t;
            continue;
        }
        let mut hi = t;
        for _ in 0..MAX_BISECTION_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if overlaps(mid, &mut scratch) {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        let _ = overlaps(hi, &mut scratch);
        let point = scratch.points().first().map_or(a.position + d * lo, |p| p.position);
        return Some(TimeOfImpact {
            toi: lo,
            normal: scratch.normal,
            point,
        });
    }
    None
}

/// Time of impact of A moving by `disp_a` and B moving by `disp_b`
///
/// Returns `None` when the shapes already overlap at the start or do not
/// meet during the sweep.
pub fn time_of_impact(a: &ShapeRef, disp_a: Vec3, b: &ShapeRef, disp_b: Vec3) -> Option<TimeOfImpact> {
    let d = disp_a - disp_b;
    let hit = match (a.shape, b.shape) {
        (ColliderShape::Sphere { radius: ra }, ColliderShape::Sphere { radius: rb }) => {
            sphere_sphere(a, *ra, b, *rb, d)
        }
        (ColliderShape::Sphere { radius }, ColliderShape::Box { .. }) => sphere_box(a, *radius, b, d),
        (ColliderShape::Box { .. }, ColliderShape::Sphere { radius }) => {
            sphere_box(b, *radius, a, -d).map(|hit| TimeOfImpact {
                toi: hit.toi,
                normal: -hit.normal,
                point: hit.point,
            })
        }
        (ColliderShape::Box { .. }, ColliderShape::Box { .. }) => bisect(a, b, d),
        _ if rounded_core(a).is_some() && rounded_core(b).is_some() => {
            match rounded_gap(a, b) {
                Some((gap, _, _)) if gap > 0.0 => advance(a, b, d, 0.0),
                _ => None,
            }
        }
        _ => bisect(a, b, d),
    }?;
    // touching pairs that barely close this step belong to the discrete pass
    let closing = d.dot(hit.normal);
    if closing < RESTING_APPROACH && hit.toi * closing < CCD_SKIN {
        return None;
    }
    // the sweep ran in B's frame
    Some(TimeOfImpact {
        point: hit.point + disp_b * hit.toi,
        ..hit
    })
}

/// Select candidates, sweep them and resolve the earliest impact of each
///
/// `can_pair` filters pairs that must never collide (masks, joints).
/// Manifolds for every resolved impact are appended to `contacts` so the
/// caller can raise events and build islands from them. Returns the number
/// of impacts handled.
pub fn resolve(
    scene: &mut PhysicsScene,
    config: &PhysicsConfig,
    dt: f32,
    can_pair: impl Fn(usize, usize) -> bool,
    contacts: &mut Vec<ContactManifold>,
) -> usize {
    if !config.enable_ccd || dt <= 0.0 {
        return 0;
    }

    let displacement: Vec<Vec3> = scene
        .bodies
        .iter()
        .map(|sim| {
            if sim.body.is_static() || sim.body.is_sleeping() {
                Vec3::ZERO
            } else {
                sim.body.linear_velocity * dt
            }
        })
        .collect();
    let swept: Vec<_> = scene
        .bodies
        .iter()
        .zip(&displacement)
        .map(|(sim, d)| sim.aabb.swept(*d))
        .collect();
    let thin: Vec<bool> = scene
        .bodies
        .iter()
        .map(|b| b.collider.as_ref().map_or(false, |c| c.shape().is_thin()))
        .collect();

    let mut candidates: Vec<(usize, f32)> = Vec::new();
    for (i, sim) in scene.bodies.iter().enumerate() {
        let Some(collider) = sim.collider.as_ref() else {
            continue;
        };
        if !sim.is_simulated() || collider.is_trigger {
            continue;
        }
        let speed = sim.body.linear_velocity.length();
        let travel = speed * dt;
        if travel < 1e-6 {
            continue;
        }
        let size = collider.shape().characteristic_size();
        let near_thin = || {
            (0..scene.bodies.len()).any(|j| j != i && thin[j] && swept[i].intersects(&swept[j]))
        };
        if sim.body.use_ccd
            || speed >= config.ccd_velocity_threshold
            || travel > config.ccd_displacement_threshold * size
            || near_thin()
        {
            candidates.push((i, speed));
        }
    }
    if candidates.is_empty() {
        return 0;
    }
    candidates.sort_by(|x, y| y.1.total_cmp(&x.1).then(x.0.cmp(&y.0)));
    if candidates.len() > config.max_ccd_objects {
        debug!(
            candidates = candidates.len(),
            limit = config.max_ccd_objects,
            "dropping slowest ccd candidates"
        );
        candidates.truncate(config.max_ccd_objects);
    }
    candidates.sort_by_key(|c| c.0);

    let mut handled = 0;
    for (i, _) in candidates {
        let disp_i = displacement[i];
        let mut earliest: Option<(usize, TimeOfImpact, Vec3)> = None;
        {
            let a = &scene.bodies[i];
            let Some(ca) = a.collider.as_ref() else {
                continue;
            };
            let (pa, ra) = ca.shape_pose(a.position, a.rotation);
            let shape_a = ShapeRef::new(ca.shape(), pa, ra);
            for (j, b) in scene.bodies.iter().enumerate() {
                if j == i || !swept[i].intersects(&swept[j]) || !can_pair(i, j) {
                    continue;
                }
                let Some(cb) = b.collider.as_ref() else {
                    continue;
                };
                if cb.is_trigger || !ca.can_collide_with(cb) {
                    continue;
                }
                let (pb, rb) = cb.shape_pose(b.position, b.rotation);
                let shape_b = ShapeRef::new(cb.shape(), pb, rb);
                let disp_j = displacement[j];
                if let Some(hit) = time_of_impact(&shape_a, disp_i, &shape_b, disp_j) {
                    if earliest.map_or(true, |(_, best, _)| hit.toi < best.toi) {
                        earliest = Some((j, hit, disp_j));
                    }
                }
            }
        }
        let Some((j, hit, disp_j)) = earliest else {
            continue;
        };
        if let Some(manifold) = apply_impact(scene, i, j, hit, disp_i - disp_j, dt) {
            contacts.push(manifold);
            handled += 1;
        }
    }
    if handled > 0 {
        trace!(handled, "continuous collision impacts resolved");
    }
    handled
}

fn apply_impact(
    scene: &mut PhysicsScene,
    i: usize,
    j: usize,
    hit: TimeOfImpact,
    relative: Vec3,
    dt: f32,
) -> Option<ContactManifold> {
    let rel_len = relative.length().max(1e-6);
    let safe = (hit.toi - CCD_SKIN / rel_len).max(0.0);
    let n = hit.normal.normalize_or(Vec3::Y);

    let (first, second) = if i < j { (i, j) } else { (j, i) };
    let (mat_first, mat_second) = {
        let f = scene.bodies[first].collider.as_ref()?;
        let s = scene.bodies[second].collider.as_ref()?;
        (f.material.clone(), s.material.clone())
    };
    let restitution = PhysicsMaterial::combined_restitution(&mat_first, &mat_second);
    let friction = PhysicsMaterial::combined_friction(&mat_first, &mat_second);

    let (a, b) = scene.pair_mut(i, j);
    let start_velocity = a.body.linear_velocity;
    a.position += start_velocity * dt * safe;

    let closing = (a.body.linear_velocity - b.body.linear_velocity).dot(n);
    if closing > 0.0 {
        let (inv_a, inv_b) = (a.inv_mass(), b.inv_mass());
        let total = inv_a + inv_b;
        if total > 0.0 {
            let impulse = (1.0 + restitution) * closing / total;
            a.body.linear_velocity -= n * (impulse * inv_a);
            apply_locks(&mut a.body);
            if b.body.is_dynamic() {
                b.body.wake_up();
                b.body.linear_velocity += n * (impulse * inv_b);
                apply_locks(&mut b.body);
                b.woken = true;
            }
        }
    }

    a.position += a.body.linear_velocity * dt * (1.0 - safe);
    let com_local = a.body.center_of_mass();
    let com = a.position + a.rotation * com_local;
    a.rotation = integrate_rotation(a.rotation, a.body.angular_velocity, dt);
    a.position = com - a.rotation * com_local;
    a.ccd_advanced = true;
    a.refresh_aabb();
    debug!(
        entity = %a.entity,
        other = %b.entity,
        toi = hit.toi,
        "continuous collision impact"
    );

    let (lo, hi) = if i < j { (&*a, &*b) } else { (&*b, &*a) };
    let mut manifold = ContactManifold::new(lo.entity, hi.entity);
    manifold.normal = if i < j { n } else { -n };
    manifold.add_point(hit.point, 0.0);
    manifold.friction = friction;
    manifold.restitution = restitution;
    manifold.compute_local_points(lo.position, lo.rotation, hi.position, hi.rotation);
    Some(manifold)
}
