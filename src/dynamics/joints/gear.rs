//! Gear joint: couples the coordinates of two existing revolute or
//! prismatic joints so that `coordA + ratio * coordB` stays constant.
//! Gears can connect rotation to rotation, rotation to translation, or
//! translation to translation (rack and pinion).

use glam::Vec2;
use slotmap::SlotMap;

use crate::dynamics::body::Body;
use crate::dynamics::time_step::SolverData;
use crate::dynamics::{BodyHandle, JointHandle};
use crate::error::PhysicsError;
use crate::math::{Rot, cross};
use crate::settings::LINEAR_SLOP;

use super::Joint;

#[derive(Debug, Clone)]
pub struct GearJointDef {
    /// First joint; its first body is treated as the ground.
    pub joint1: JointHandle,
    /// Second joint; its first body is treated as the ground.
    pub joint2: JointHandle,
    /// Gear ratio relating the two joint coordinates.
    pub ratio: f32,
}

impl GearJointDef {
    pub fn new(joint1: JointHandle, joint2: JointHandle) -> Self {
        GearJointDef {
            joint1,
            joint2,
            ratio: 1.0,
        }
    }
}

/// Captured base of one side of a gear. Revolute bases gear on the joint
/// angle, prismatic on the translation along the stored ground-frame axis.
#[derive(Debug, Clone, Copy)]
enum GearBase {
    Revolute,
    Prismatic(Vec2),
}

#[derive(Debug)]
pub struct GearJoint {
    pub(crate) joint1: JointHandle,
    pub(crate) joint2: JointHandle,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    body_c: BodyHandle,
    body_d: BodyHandle,

    base_a: GearBase,
    base_b: GearBase,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    local_anchor_c: Vec2,
    local_anchor_d: Vec2,
    reference_angle_a: f32,
    reference_angle_b: f32,
    constant: f32,
    ratio: f32,

    impulse: f32,
    index_a: usize,
    index_b: usize,
    index_c: usize,
    index_d: usize,
    lc_a: Vec2,
    lc_b: Vec2,
    lc_c: Vec2,
    lc_d: Vec2,
    m_a: f32,
    m_b: f32,
    m_c: f32,
    m_d: f32,
    i_a: f32,
    i_b: f32,
    i_c: f32,
    i_d: f32,
    jv_ac: Vec2,
    jv_bd: Vec2,
    jw_a: f32,
    jw_b: f32,
    jw_c: f32,
    jw_d: f32,
    mass: f32,
}

impl GearJoint {
    pub(crate) fn new(
        def: &GearJointDef,
        joints: &SlotMap<JointHandle, Joint>,
        bodies: &SlotMap<BodyHandle, Body>,
    ) -> Result<Self, PhysicsError> {
        let joint1 = joints.get(def.joint1).ok_or(PhysicsError::StaleJointHandle)?;
        let joint2 = joints.get(def.joint2).ok_or(PhysicsError::StaleJointHandle)?;

        let (body_c, body_a, local_anchor_c, local_anchor_a, reference_angle_a, base_a) =
            match joint1 {
                Joint::Revolute(j) => (
                    j.body_a,
                    j.body_b,
                    j.local_anchor_a,
                    j.local_anchor_b,
                    j.reference_angle,
                    GearBase::Revolute,
                ),
                Joint::Prismatic(j) => (
                    j.body_a,
                    j.body_b,
                    j.local_anchor_a,
                    j.local_anchor_b,
                    j.reference_angle,
                    GearBase::Prismatic(j.local_axis_a),
                ),
                _ => return Err(PhysicsError::InvalidGearJoint),
            };

        let (body_d, body_b, local_anchor_d, local_anchor_b, reference_angle_b, base_b) =
            match joint2 {
                Joint::Revolute(j) => (
                    j.body_a,
                    j.body_b,
                    j.local_anchor_a,
                    j.local_anchor_b,
                    j.reference_angle,
                    GearBase::Revolute,
                ),
                Joint::Prismatic(j) => (
                    j.body_a,
                    j.body_b,
                    j.local_anchor_a,
                    j.local_anchor_b,
                    j.reference_angle,
                    GearBase::Prismatic(j.local_axis_a),
                ),
                _ => return Err(PhysicsError::InvalidGearJoint),
            };

        let xf_a = *bodies[body_a].transform();
        let xf_c = *bodies[body_c].transform();
        let coordinate_a = match base_a {
            GearBase::Revolute => {
                bodies[body_a].angle() - bodies[body_c].angle() - reference_angle_a
            }
            GearBase::Prismatic(axis) => {
                let p_c = local_anchor_c;
                let p_a = xf_c
                    .q
                    .inv_rotate(xf_a.q.rotate(local_anchor_a) + (xf_a.p - xf_c.p));
                (p_a - p_c).dot(axis)
            }
        };

        let xf_b = *bodies[body_b].transform();
        let xf_d = *bodies[body_d].transform();
        let coordinate_b = match base_b {
            GearBase::Revolute => {
                bodies[body_b].angle() - bodies[body_d].angle() - reference_angle_b
            }
            GearBase::Prismatic(axis) => {
                let p_d = local_anchor_d;
                let p_b = xf_d
                    .q
                    .inv_rotate(xf_b.q.rotate(local_anchor_b) + (xf_b.p - xf_d.p));
                (p_b - p_d).dot(axis)
            }
        };

        Ok(GearJoint {
            joint1: def.joint1,
            joint2: def.joint2,
            body_a,
            body_b,
            body_c,
            body_d,
            base_a,
            base_b,
            local_anchor_a,
            local_anchor_b,
            local_anchor_c,
            local_anchor_d,
            reference_angle_a,
            reference_angle_b,
            constant: coordinate_a + def.ratio * coordinate_b,
            ratio: def.ratio,
            impulse: 0.0,
            index_a: 0,
            index_b: 0,
            index_c: 0,
            index_d: 0,
            lc_a: Vec2::ZERO,
            lc_b: Vec2::ZERO,
            lc_c: Vec2::ZERO,
            lc_d: Vec2::ZERO,
            m_a: 0.0,
            m_b: 0.0,
            m_c: 0.0,
            m_d: 0.0,
            i_a: 0.0,
            i_b: 0.0,
            i_c: 0.0,
            i_d: 0.0,
            jv_ac: Vec2::ZERO,
            jv_bd: Vec2::ZERO,
            jw_a: 0.0,
            jw_b: 0.0,
            jw_c: 0.0,
            jw_d: 0.0,
            mass: 0.0,
        })
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        debug_assert!(ratio.is_finite());
        self.ratio = ratio;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse * self.jv_ac
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse * self.jw_a
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        bodies: &SlotMap<BodyHandle, Body>,
    ) {
        let body_a = &bodies[self.body_a];
        let body_b = &bodies[self.body_b];
        let body_c = &bodies[self.body_c];
        let body_d = &bodies[self.body_d];
        self.index_a = body_a.island_index;
        self.index_b = body_b.island_index;
        self.index_c = body_c.island_index;
        self.index_d = body_d.island_index;
        self.lc_a = body_a.sweep.local_center;
        self.lc_b = body_b.sweep.local_center;
        self.lc_c = body_c.sweep.local_center;
        self.lc_d = body_d.sweep.local_center;
        self.m_a = body_a.inv_mass;
        self.m_b = body_b.inv_mass;
        self.m_c = body_c.inv_mass;
        self.m_d = body_d.inv_mass;
        self.i_a = body_a.inv_inertia;
        self.i_b = body_b.inv_inertia;
        self.i_c = body_c.inv_inertia;
        self.i_d = body_d.inv_inertia;

        let a_a = data.positions[self.index_a].a;
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;

        let a_b = data.positions[self.index_b].a;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let a_c = data.positions[self.index_c].a;
        let mut v_c = data.velocities[self.index_c].v;
        let mut w_c = data.velocities[self.index_c].w;

        let a_d = data.positions[self.index_d].a;
        let mut v_d = data.velocities[self.index_d].v;
        let mut w_d = data.velocities[self.index_d].w;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);
        let q_c = Rot::new(a_c);
        let q_d = Rot::new(a_d);

        self.mass = 0.0;

        match self.base_a {
            GearBase::Revolute => {
                self.jv_ac = Vec2::ZERO;
                self.jw_a = 1.0;
                self.jw_c = 1.0;
                self.mass += self.i_a + self.i_c;
            }
            GearBase::Prismatic(axis) => {
                let u = q_c.rotate(axis);
                let r_c = q_c.rotate(self.local_anchor_c - self.lc_c);
                let r_a = q_a.rotate(self.local_anchor_a - self.lc_a);
                self.jv_ac = u;
                self.jw_c = cross(r_c, u);
                self.jw_a = cross(r_a, u);
                self.mass += self.m_c
                    + self.m_a
                    + self.i_c * self.jw_c * self.jw_c
                    + self.i_a * self.jw_a * self.jw_a;
            }
        }

        match self.base_b {
            GearBase::Revolute => {
                self.jv_bd = Vec2::ZERO;
                self.jw_b = self.ratio;
                self.jw_d = self.ratio;
                self.mass += self.ratio * self.ratio * (self.i_b + self.i_d);
            }
            GearBase::Prismatic(axis) => {
                let u = q_d.rotate(axis);
                let r_d = q_d.rotate(self.local_anchor_d - self.lc_d);
                let r_b = q_b.rotate(self.local_anchor_b - self.lc_b);
                self.jv_bd = self.ratio * u;
                self.jw_d = self.ratio * cross(r_d, u);
                self.jw_b = self.ratio * cross(r_b, u);
                self.mass += self.ratio * self.ratio * (self.m_d + self.m_b)
                    + self.i_d * self.jw_d * self.jw_d
                    + self.i_b * self.jw_b * self.jw_b;
            }
        }

        self.mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };

        if data.step.warm_starting {
            v_a += self.m_a * self.impulse * self.jv_ac;
            w_a += self.i_a * self.impulse * self.jw_a;
            v_b += self.m_b * self.impulse * self.jv_bd;
            w_b += self.i_b * self.impulse * self.jw_b;
            v_c -= self.m_c * self.impulse * self.jv_ac;
            w_c -= self.i_c * self.impulse * self.jw_c;
            v_d -= self.m_d * self.impulse * self.jv_bd;
            w_d -= self.i_d * self.impulse * self.jw_d;
        } else {
            self.impulse = 0.0;
        }

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
        data.velocities[self.index_c].v = v_c;
        data.velocities[self.index_c].w = w_c;
        data.velocities[self.index_d].v = v_d;
        data.velocities[self.index_d].w = w_d;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;
        let mut v_c = data.velocities[self.index_c].v;
        let mut w_c = data.velocities[self.index_c].w;
        let mut v_d = data.velocities[self.index_d].v;
        let mut w_d = data.velocities[self.index_d].w;

        let c_dot = self.jv_ac.dot(v_a - v_c) + self.jv_bd.dot(v_b - v_d)
            + self.jw_a * w_a
            - self.jw_c * w_c
            + self.jw_b * w_b
            - self.jw_d * w_d;

        let impulse = -self.mass * c_dot;
        self.impulse += impulse;

        v_a += self.m_a * impulse * self.jv_ac;
        w_a += self.i_a * impulse * self.jw_a;
        v_b += self.m_b * impulse * self.jv_bd;
        w_b += self.i_b * impulse * self.jw_b;
        v_c -= self.m_c * impulse * self.jv_ac;
        w_c -= self.i_c * impulse * self.jw_c;
        v_d -= self.m_d * impulse * self.jv_bd;
        w_d -= self.i_d * impulse * self.jw_d;

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
        data.velocities[self.index_c].v = v_c;
        data.velocities[self.index_c].w = w_c;
        data.velocities[self.index_d].v = v_d;
        data.velocities[self.index_d].w = w_d;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut c_a = data.positions[self.index_a].c;
        let mut a_a = data.positions[self.index_a].a;
        let mut c_b = data.positions[self.index_b].c;
        let mut a_b = data.positions[self.index_b].a;
        let mut c_c = data.positions[self.index_c].c;
        let mut a_c = data.positions[self.index_c].a;
        let mut c_d = data.positions[self.index_d].c;
        let mut a_d = data.positions[self.index_d].a;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);
        let q_c = Rot::new(a_c);
        let q_d = Rot::new(a_d);

        let mut mass = 0.0f32;

        let (jv_ac, jw_a, jw_c, coordinate_a) = match self.base_a {
            GearBase::Revolute => {
                mass += self.i_a + self.i_c;
                (Vec2::ZERO, 1.0, 1.0, a_a - a_c - self.reference_angle_a)
            }
            GearBase::Prismatic(axis) => {
                let u = q_c.rotate(axis);
                let r_c = q_c.rotate(self.local_anchor_c - self.lc_c);
                let r_a = q_a.rotate(self.local_anchor_a - self.lc_a);
                let jw_c = cross(r_c, u);
                let jw_a = cross(r_a, u);
                mass += self.m_c + self.m_a + self.i_c * jw_c * jw_c + self.i_a * jw_a * jw_a;

                let p_c = self.local_anchor_c - self.lc_c;
                let p_a = q_c.inv_rotate(r_a + (c_a - c_c));
                (u, jw_a, jw_c, (p_a - p_c).dot(axis))
            }
        };

        let (jv_bd, jw_b, jw_d, coordinate_b) = match self.base_b {
            GearBase::Revolute => {
                mass += self.ratio * self.ratio * (self.i_b + self.i_d);
                (
                    Vec2::ZERO,
                    self.ratio,
                    self.ratio,
                    a_b - a_d - self.reference_angle_b,
                )
            }
            GearBase::Prismatic(axis) => {
                let u = q_d.rotate(axis);
                let r_d = q_d.rotate(self.local_anchor_d - self.lc_d);
                let r_b = q_b.rotate(self.local_anchor_b - self.lc_b);
                let jw_d = self.ratio * cross(r_d, u);
                let jw_b = self.ratio * cross(r_b, u);
                mass += self.ratio * self.ratio * (self.m_d + self.m_b)
                    + self.i_d * jw_d * jw_d
                    + self.i_b * jw_b * jw_b;

                let p_d = self.local_anchor_d - self.lc_d;
                let p_b = q_d.inv_rotate(r_b + (c_b - c_d));
                (self.ratio * u, jw_b, jw_d, (p_b - p_d).dot(axis))
            }
        };

        let c = (coordinate_a + self.ratio * coordinate_b) - self.constant;

        let impulse = if mass > 0.0 { -c / mass } else { 0.0 };

        c_a += self.m_a * impulse * jv_ac;
        a_a += self.i_a * impulse * jw_a;
        c_b += self.m_b * impulse * jv_bd;
        a_b += self.i_b * impulse * jw_b;
        c_c -= self.m_c * impulse * jv_ac;
        a_c -= self.i_c * impulse * jw_c;
        c_d -= self.m_d * impulse * jv_bd;
        a_d -= self.i_d * impulse * jw_d;

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;
        data.positions[self.index_c].c = c_c;
        data.positions[self.index_c].a = a_c;
        data.positions[self.index_d].c = c_d;
        data.positions[self.index_d].a = a_d;

        c.abs() < LINEAR_SLOP
    }
}
