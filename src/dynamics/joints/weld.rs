//! Weld joint: locks the relative position and angle of two bodies.
//! With nonzero stiffness the angular lock becomes a damped spring,
//! which reads as a slightly flexible seam.

use glam::{Mat3, Vec2, Vec3};
use slotmap::SlotMap;

use crate::dynamics::body::Body;
use crate::dynamics::time_step::SolverData;
use crate::dynamics::BodyHandle;
use crate::math::{Rot, cross, cross_sv, inverse22, solve33, solve33_22, sym_inverse33};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};

#[derive(Debug, Clone)]
pub struct WeldJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,
    /// Angular stiffness in N*m/rad. Zero means a rigid weld.
    pub stiffness: f32,
    pub damping: f32,
}

impl WeldJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        WeldJointDef {
            body_a,
            body_b,
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            reference_angle: 0.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }

    pub fn initialize(mut self, bodies: &SlotMap<BodyHandle, Body>, anchor: Vec2) -> Self {
        let body_a = &bodies[self.body_a];
        let body_b = &bodies[self.body_b];
        self.local_anchor_a = body_a.local_point(anchor);
        self.local_anchor_b = body_b.local_point(anchor);
        self.reference_angle = body_b.angle() - body_a.angle();
        self
    }
}

#[derive(Debug)]
pub struct WeldJoint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,

    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) reference_angle: f32,
    stiffness: f32,
    damping: f32,

    impulse: Vec3,
    bias: f32,
    gamma: f32,
    index_a: usize,
    index_b: usize,
    r_a: Vec2,
    r_b: Vec2,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    mass: Mat3,
}

impl WeldJoint {
    pub(crate) fn new(def: &WeldJointDef) -> Self {
        WeldJoint {
            body_a: def.body_a,
            body_b: def.body_b,
            collide_connected: def.collide_connected,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: Vec3::ZERO,
            bias: 0.0,
            gamma: 0.0,
            index_a: 0,
            index_b: 0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_a: 0.0,
            inv_mass_b: 0.0,
            inv_i_a: 0.0,
            inv_i_b: 0.0,
            mass: Mat3::ZERO,
        }
    }

    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = stiffness;
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * Vec2::new(self.impulse.x, self.impulse.y)
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.z
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        bodies: &SlotMap<BodyHandle, Body>,
    ) {
        let body_a = &bodies[self.body_a];
        let body_b = &bodies[self.body_b];
        self.index_a = body_a.island_index;
        self.index_b = body_b.island_index;
        self.local_center_a = body_a.sweep.local_center;
        self.local_center_b = body_b.sweep.local_center;
        self.inv_mass_a = body_a.inv_mass;
        self.inv_mass_b = body_b.inv_mass;
        self.inv_i_a = body_a.inv_inertia;
        self.inv_i_b = body_b.inv_inertia;

        let a_a = data.positions[self.index_a].a;
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;

        let a_b = data.positions[self.index_b].a;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        self.r_a = q_a.rotate(self.local_anchor_a - self.local_center_a);
        self.r_b = q_b.rotate(self.local_anchor_b - self.local_center_b);

        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

        let k = weld_k(m_a, m_b, i_a, i_b, self.r_a, self.r_b);

        if self.stiffness > 0.0 {
            self.mass = inverse22(&k);

            let mut inv_m = i_a + i_b;
            let c = a_b - a_a - self.reference_angle;

            let d = self.damping;
            let s = self.stiffness;
            let h = data.step.dt;

            self.gamma = h * (d + h * s);
            if self.gamma != 0.0 {
                self.gamma = 1.0 / self.gamma;
            }
            self.bias = c * h * s * self.gamma;

            inv_m += self.gamma;
            self.mass.z_axis.z = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
        } else if k.z_axis.z == 0.0 {
            self.mass = inverse22(&k);
            self.gamma = 0.0;
            self.bias = 0.0;
        } else {
            self.mass = sym_inverse33(&k);
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;

            let p = Vec2::new(self.impulse.x, self.impulse.y);
            v_a -= m_a * p;
            w_a -= i_a * (cross(self.r_a, p) + self.impulse.z);
            v_b += m_b * p;
            w_b += i_b * (cross(self.r_b, p) + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
        }

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

        if self.stiffness > 0.0 {
            let c_dot2 = w_b - w_a;
            let impulse2 =
                -self.mass.z_axis.z * (c_dot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            w_a -= i_a * impulse2;
            w_b += i_b * impulse2;

            let c_dot1 = v_b + cross_sv(w_b, self.r_b) - v_a - cross_sv(w_a, self.r_a);
            let impulse1 = -mul22(&self.mass, c_dot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            v_a -= m_a * impulse1;
            w_a -= i_a * cross(self.r_a, impulse1);
            v_b += m_b * impulse1;
            w_b += i_b * cross(self.r_b, impulse1);
        } else {
            let c_dot1 = v_b + cross_sv(w_b, self.r_b) - v_a - cross_sv(w_a, self.r_a);
            let c_dot2 = w_b - w_a;
            let c_dot = Vec3::new(c_dot1.x, c_dot1.y, c_dot2);

            let impulse = -(self.mass * c_dot);
            self.impulse += impulse;

            let p = Vec2::new(impulse.x, impulse.y);
            v_a -= m_a * p;
            w_a -= i_a * (cross(self.r_a, p) + impulse.z);
            v_b += m_b * p;
            w_b += i_b * (cross(self.r_b, p) + impulse.z);
        }

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut c_a = data.positions[self.index_a].c;
        let mut a_a = data.positions[self.index_a].a;
        let mut c_b = data.positions[self.index_b].c;
        let mut a_b = data.positions[self.index_b].a;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

        let r_a = q_a.rotate(self.local_anchor_a - self.local_center_a);
        let r_b = q_b.rotate(self.local_anchor_b - self.local_center_b);

        let k = weld_k(m_a, m_b, i_a, i_b, r_a, r_b);

        let (position_error, angular_error);

        if self.stiffness > 0.0 {
            let c1 = c_b + r_b - c_a - r_a;
            position_error = c1.length();
            angular_error = 0.0;

            let p = -solve33_22(&k, c1);

            c_a -= m_a * p;
            a_a -= i_a * cross(r_a, p);
            c_b += m_b * p;
            a_b += i_b * cross(r_b, p);
        } else {
            let c1 = c_b + r_b - c_a - r_a;
            let c2 = a_b - a_a - self.reference_angle;

            position_error = c1.length();
            angular_error = c2.abs();

            let c = Vec3::new(c1.x, c1.y, c2);
            let impulse = if k.z_axis.z > 0.0 {
                -solve33(&k, c)
            } else {
                let impulse2 = -solve33_22(&k, c1);
                Vec3::new(impulse2.x, impulse2.y, 0.0)
            };

            let p = Vec2::new(impulse.x, impulse.y);
            c_a -= m_a * p;
            a_a -= i_a * (cross(r_a, p) + impulse.z);
            c_b += m_b * p;
            a_b += i_b * (cross(r_b, p) + impulse.z);
        }

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}

fn weld_k(m_a: f32, m_b: f32, i_a: f32, i_b: f32, r_a: Vec2, r_b: Vec2) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(
            m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b,
            -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
            -r_a.y * i_a - r_b.y * i_b,
        ),
        Vec3::new(
            -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
            m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b,
            r_a.x * i_a + r_b.x * i_b,
        ),
        Vec3::new(
            -r_a.y * i_a - r_b.y * i_b,
            r_a.x * i_a + r_b.x * i_b,
            i_a + i_b,
        ),
    )
}

fn mul22(m: &Mat3, v: Vec2) -> Vec2 {
    Vec2::new(
        m.x_axis.x * v.x + m.y_axis.x * v.y,
        m.x_axis.y * v.x + m.y_axis.y * v.y,
    )
}
