//! Sequential impulse contact solver. Velocity constraints are solved with
//! warm-started impulses and a block solver for two-point manifolds; the
//! position error is then removed by a separate nonlinear Gauss-Seidel pass
//! so the velocity solution stays momentum-correct.

use glam::{Mat2, Vec2};
use slotmap::SlotMap;

use crate::collision::manifold::ManifoldType;
use crate::dynamics::body::Body;
use crate::dynamics::contact::Contact;
use crate::dynamics::fixture::Fixture;
use crate::dynamics::time_step::{Position, TimeStep, Velocity};
use crate::dynamics::{BodyHandle, ContactHandle, FixtureHandle};
use crate::math::{Rot, Transform2, cross, cross_sv, cross_vs};
use crate::settings::{
    BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE,
    VELOCITY_THRESHOLD,
};

// Above this condition number the block solver is numerically useless and
// the points are solved independently instead.
const MAX_CONDITION_NUMBER: f32 = 1000.0;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct VelocityConstraintPoint {
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    pub velocity_bias: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct ContactVelocityConstraint {
    pub points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    pub normal: Vec2,
    pub normal_mass: Mat2,
    pub k: Mat2,
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
    pub friction: f32,
    pub restitution: f32,
    pub tangent_speed: f32,
    pub point_count: usize,
    pub contact: ContactHandle,
}

#[derive(Debug, Clone)]
struct ContactPositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: f32,
    inv_i_b: f32,
    manifold_type: ManifoldType,
    radius_a: f32,
    radius_b: f32,
    point_count: usize,
}

pub(crate) struct ContactSolver {
    position_constraints: Vec<ContactPositionConstraint>,
    velocity_constraints: Vec<ContactVelocityConstraint>,
}

impl ContactSolver {
    pub(crate) fn new(
        step: TimeStep,
        contact_handles: &[ContactHandle],
        contacts: &SlotMap<ContactHandle, Contact>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
        bodies: &SlotMap<BodyHandle, Body>,
    ) -> Self {
        let mut position_constraints = Vec::with_capacity(contact_handles.len());
        let mut velocity_constraints = Vec::with_capacity(contact_handles.len());

        for &ch in contact_handles {
            let contact = &contacts[ch];
            let fixture_a = &fixtures[contact.fixture_a];
            let fixture_b = &fixtures[contact.fixture_b];
            let body_a = &bodies[contact.body_a];
            let body_b = &bodies[contact.body_b];
            let manifold = &contact.manifold;

            debug_assert!(manifold.point_count > 0);

            let mut vc = ContactVelocityConstraint {
                points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                normal: Vec2::ZERO,
                normal_mass: Mat2::ZERO,
                k: Mat2::ZERO,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                friction: contact.friction,
                restitution: contact.restitution,
                tangent_speed: contact.tangent_speed,
                point_count: manifold.point_count,
                contact: ch,
            };

            let mut pc = ContactPositionConstraint {
                local_points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                manifold_type: manifold.manifold_type,
                radius_a: fixture_a.shape.radius(),
                radius_b: fixture_b.shape.radius(),
                point_count: manifold.point_count,
            };

            for i in 0..manifold.point_count {
                let mp = &manifold.points[i];
                let vcp = &mut vc.points[i];
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * mp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
                pc.local_points[i] = mp.local_point;
            }

            position_constraints.push(pc);
            velocity_constraints.push(vc);
        }

        ContactSolver {
            position_constraints,
            velocity_constraints,
        }
    }

    pub(crate) fn velocity_constraints(&self) -> &[ContactVelocityConstraint] {
        &self.velocity_constraints
    }

    /// Build the world-space constraint data from the island positions.
    pub(crate) fn init_velocity_constraints(
        &mut self,
        contacts: &SlotMap<ContactHandle, Contact>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        for (vc, pc) in self
            .velocity_constraints
            .iter_mut()
            .zip(&self.position_constraints)
        {
            let contact = &contacts[vc.contact];
            let manifold = &contact.manifold;
            let radius_a = pc.radius_a;
            let radius_b = pc.radius_b;

            let m_a = vc.inv_mass_a;
            let m_b = vc.inv_mass_b;
            let i_a = vc.inv_i_a;
            let i_b = vc.inv_i_b;

            let c_a = positions[vc.index_a].c;
            let a_a = positions[vc.index_a].a;
            let v_a = velocities[vc.index_a].v;
            let w_a = velocities[vc.index_a].w;

            let c_b = positions[vc.index_b].c;
            let a_b = positions[vc.index_b].a;
            let v_b = velocities[vc.index_b].v;
            let w_b = velocities[vc.index_b].w;

            let q_a = Rot::new(a_a);
            let q_b = Rot::new(a_b);
            let xf_a = Transform2 {
                q: q_a,
                p: c_a - q_a.rotate(pc.local_center_a),
            };
            let xf_b = Transform2 {
                q: q_b,
                p: c_b - q_b.rotate(pc.local_center_b),
            };

            let world_manifold = crate::collision::manifold::WorldManifold::new(
                manifold, &xf_a, radius_a, &xf_b, radius_b,
            );

            vc.normal = world_manifold.normal;
            let tangent = cross_vs(vc.normal, 1.0);

            for i in 0..vc.point_count {
                let vcp = &mut vc.points[i];
                vcp.r_a = world_manifold.points[i] - c_a;
                vcp.r_b = world_manifold.points[i] - c_b;

                let rn_a = cross(vcp.r_a, vc.normal);
                let rn_b = cross(vcp.r_b, vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = cross(vcp.r_a, tangent);
                let rt_b = cross(vcp.r_b, tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Restitution bias, only past the bounce threshold.
                vcp.velocity_bias = 0.0;
                let v_rel = vc
                    .normal
                    .dot(v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a));
                if v_rel < -VELOCITY_THRESHOLD {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            // Block solver setup for two-point manifolds; fall back to the
            // independent solver when the matrix is ill-conditioned.
            if vc.point_count == 2 {
                let vcp1 = vc.points[0];
                let vcp2 = vc.points[1];

                let rn1_a = cross(vcp1.r_a, vc.normal);
                let rn1_b = cross(vcp1.r_b, vc.normal);
                let rn2_a = cross(vcp2.r_a, vc.normal);
                let rn2_b = cross(vcp2.r_b, vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Apply the impulses carried over from the previous step.
    pub(crate) fn warm_start(&mut self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let m_a = vc.inv_mass_a;
            let m_b = vc.inv_mass_b;
            let i_a = vc.inv_i_a;
            let i_b = vc.inv_i_b;
            let normal = vc.normal;
            let tangent = cross_vs(normal, 1.0);

            let mut v_a = velocities[vc.index_a].v;
            let mut w_a = velocities[vc.index_a].w;
            let mut v_b = velocities[vc.index_b].v;
            let mut w_b = velocities[vc.index_b].w;

            for i in 0..vc.point_count {
                let vcp = &vc.points[i];
                let p = vcp.normal_impulse * normal + vcp.tangent_impulse * tangent;
                w_a -= i_a * cross(vcp.r_a, p);
                v_a -= m_a * p;
                w_b += i_b * cross(vcp.r_b, p);
                v_b += m_b * p;
            }

            velocities[vc.index_a].v = v_a;
            velocities[vc.index_a].w = w_a;
            velocities[vc.index_b].v = v_b;
            velocities[vc.index_b].w = w_b;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let m_a = vc.inv_mass_a;
            let m_b = vc.inv_mass_b;
            let i_a = vc.inv_i_a;
            let i_b = vc.inv_i_b;
            let normal = vc.normal;
            let tangent = cross_vs(normal, 1.0);
            let friction = vc.friction;

            let mut v_a = velocities[vc.index_a].v;
            let mut w_a = velocities[vc.index_a].w;
            let mut v_b = velocities[vc.index_b].v;
            let mut w_b = velocities[vc.index_b].w;

            debug_assert!(vc.point_count == 1 || vc.point_count == 2);

            // Friction first, using the normal impulse from the previous
            // iteration as the cone bound.
            for i in 0..vc.point_count {
                let vcp = &mut vc.points[i];

                let dv = v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a);
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let mut lambda = vcp.tangent_mass * -vt;

                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                let p = lambda * tangent;
                v_a -= m_a * p;
                w_a -= i_a * cross(vcp.r_a, p);
                v_b += m_b * p;
                w_b += i_b * cross(vcp.r_b, p);
            }

            if vc.point_count == 1 {
                let vcp = &mut vc.points[0];

                let dv = v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a);
                let vn = dv.dot(normal);
                let mut lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                let p = lambda * normal;
                v_a -= m_a * p;
                w_a -= i_a * cross(vcp.r_a, p);
                v_b += m_b * p;
                w_b += i_b * cross(vcp.r_b, p);
            } else {
                // Two-point block solver. Solves the coupled LCP by trying
                // the four active-set cases in order of likelihood; the
                // accumulated impulses must stay non-negative.
                let cp1 = vc.points[0];
                let cp2 = vc.points[1];
                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                let dv1 = v_b + cross_sv(w_b, cp1.r_b) - v_a - cross_sv(w_a, cp1.r_a);
                let dv2 = v_b + cross_sv(w_b, cp2.r_b) - v_a - cross_sv(w_a, cp2.r_a);
                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                let mut b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias);
                b -= vc.k * a;

                let x = 'block: {
                    // Case 1: both points active.
                    let x = -(vc.normal_mass * b);
                    if x.x >= 0.0 && x.y >= 0.0 {
                        break 'block Some(x);
                    }

                    // Case 2: point 1 active, point 2 free.
                    let x1 = -cp1.normal_mass * b.x;
                    let vn2 = vc.k.x_axis.y * x1 + b.y;
                    if x1 >= 0.0 && vn2 >= 0.0 {
                        break 'block Some(Vec2::new(x1, 0.0));
                    }

                    // Case 3: point 2 active, point 1 free.
                    let x2 = -cp2.normal_mass * b.y;
                    let vn1 = vc.k.y_axis.x * x2 + b.x;
                    if x2 >= 0.0 && vn1 >= 0.0 {
                        break 'block Some(Vec2::new(0.0, x2));
                    }

                    // Case 4: both free.
                    if b.x >= 0.0 && b.y >= 0.0 {
                        break 'block Some(Vec2::ZERO);
                    }

                    None
                };

                if let Some(x) = x {
                    let d = x - a;
                    let p1 = d.x * normal;
                    let p2 = d.y * normal;
                    v_a -= m_a * (p1 + p2);
                    w_a -= i_a * (cross(cp1.r_a, p1) + cross(cp2.r_a, p2));
                    v_b += m_b * (p1 + p2);
                    w_b += i_b * (cross(cp1.r_b, p1) + cross(cp2.r_b, p2));

                    vc.points[0].normal_impulse = x.x;
                    vc.points[1].normal_impulse = x.y;
                }
                // No case matched: substep too degenerate, keep the old
                // impulses and let the next iteration retry.
            }

            velocities[vc.index_a].v = v_a;
            velocities[vc.index_a].w = w_a;
            velocities[vc.index_b].v = v_b;
            velocities[vc.index_b].w = w_b;
        }
    }

    /// Write accumulated impulses back into the manifolds for next step's
    /// warm start.
    pub(crate) fn store_impulses(&self, contacts: &mut SlotMap<ContactHandle, Contact>) {
        for vc in &self.velocity_constraints {
            let manifold = &mut contacts[vc.contact].manifold;
            for i in 0..vc.point_count {
                manifold.points[i].normal_impulse = vc.points[i].normal_impulse;
                manifold.points[i].tangent_impulse = vc.points[i].tangent_impulse;
            }
        }
    }

    /// Push the bodies apart to remove penetration. Returns true once the
    /// worst separation is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, positions: &mut [Position]) -> bool {
        self.solve_positions(positions, BAUMGARTE, -3.0 * LINEAR_SLOP, None)
    }

    /// TOI position solve: only the two sub-step bodies move, everything
    /// else is treated as infinitely heavy. Converges to a tighter
    /// separation than the discrete pass so the sub-step starts clear.
    pub(crate) fn solve_toi_position_constraints(
        &mut self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        self.solve_positions(
            positions,
            TOI_BAUMGARTE,
            -1.5 * LINEAR_SLOP,
            Some((toi_index_a, toi_index_b)),
        )
    }

    fn solve_positions(
        &mut self,
        positions: &mut [Position],
        baumgarte: f32,
        tolerance: f32,
        toi_indices: Option<(usize, usize)>,
    ) -> bool {
        let mut min_separation = 0.0_f32;

        for pc in &self.position_constraints {
            let index_a = pc.index_a;
            let index_b = pc.index_b;
            let local_center_a = pc.local_center_a;
            let local_center_b = pc.local_center_b;

            let (m_a, i_a, m_b, i_b) = match toi_indices {
                None => (pc.inv_mass_a, pc.inv_i_a, pc.inv_mass_b, pc.inv_i_b),
                Some((toi_a, toi_b)) => {
                    let a_movable = index_a == toi_a || index_a == toi_b;
                    let b_movable = index_b == toi_a || index_b == toi_b;
                    (
                        if a_movable { pc.inv_mass_a } else { 0.0 },
                        if a_movable { pc.inv_i_a } else { 0.0 },
                        if b_movable { pc.inv_mass_b } else { 0.0 },
                        if b_movable { pc.inv_i_b } else { 0.0 },
                    )
                }
            };

            let mut c_a = positions[index_a].c;
            let mut a_a = positions[index_a].a;
            let mut c_b = positions[index_b].c;
            let mut a_b = positions[index_b].a;

            for i in 0..pc.point_count {
                let q_a = Rot::new(a_a);
                let q_b = Rot::new(a_b);
                let xf_a = Transform2 {
                    q: q_a,
                    p: c_a - q_a.rotate(local_center_a),
                };
                let xf_b = Transform2 {
                    q: q_b,
                    p: c_b - q_b.rotate(local_center_b),
                };

                let (normal, point, separation) = position_solver_manifold(pc, &xf_a, &xf_b, i);

                let r_a = point - c_a;
                let r_b = point - c_b;

                min_separation = min_separation.min(separation);

                // Clamp the correction so overlapping stacks do not explode.
                let c = (baumgarte * (separation + LINEAR_SLOP))
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);

                let rn_a = cross(r_a, normal);
                let rn_b = cross(r_b, normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                let impulse = if k > 0.0 { -c / k } else { 0.0 };
                let p = impulse * normal;

                c_a -= m_a * p;
                a_a -= i_a * cross(r_a, p);
                c_b += m_b * p;
                a_b += i_b * cross(r_b, p);
            }

            positions[index_a].c = c_a;
            positions[index_a].a = a_a;
            positions[index_b].c = c_b;
            positions[index_b].a = a_b;
        }

        // Cannot push for zero separation: that would cause jitter against
        // the solver's slop-sized resting overlap.
        min_separation >= tolerance
    }
}

/// Evaluate one manifold point's world normal, point and separation at the
/// candidate positions.
fn position_solver_manifold(
    pc: &ContactPositionConstraint,
    xf_a: &Transform2,
    xf_b: &Transform2,
    index: usize,
) -> (Vec2, Vec2, f32) {
    debug_assert!(pc.point_count > 0);

    match pc.manifold_type {
        ManifoldType::Circles => {
            let point_a = xf_a.apply(pc.local_point);
            let point_b = xf_b.apply(pc.local_points[0]);
            let normal = (point_b - point_a).normalize_or_zero();
            let point = 0.5 * (point_a + point_b);
            let separation = (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b;
            (normal, point, separation)
        }
        ManifoldType::FaceA => {
            let normal = xf_a.q.rotate(pc.local_normal);
            let plane_point = xf_a.apply(pc.local_point);
            let clip_point = xf_b.apply(pc.local_points[index]);
            let separation = (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b;
            (normal, clip_point, separation)
        }
        ManifoldType::FaceB => {
            let normal = xf_b.q.rotate(pc.local_normal);
            let plane_point = xf_b.apply(pc.local_point);
            let clip_point = xf_a.apply(pc.local_points[index]);
            let separation = (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b;
            // Keep the normal pointing from A to B.
            (-normal, clip_point, separation)
        }
    }
}
