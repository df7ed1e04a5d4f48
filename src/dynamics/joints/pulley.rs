//! Pulley joint: an idealized rope over two ground anchors. The combined
//! length `lengthA + ratio * lengthB` stays constant, so one side rises
//! as the other falls.

use glam::Vec2;
use slotmap::SlotMap;

use crate::dynamics::body::Body;
use crate::dynamics::time_step::SolverData;
use crate::dynamics::BodyHandle;
use crate::math::{Rot, cross, cross_sv};
use crate::settings::LINEAR_SLOP;

#[derive(Debug, Clone)]
pub struct PulleyJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub ground_anchor_a: Vec2,
    pub ground_anchor_b: Vec2,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length_a: f32,
    pub length_b: f32,
    /// Block-and-tackle ratio; side B moves `ratio` times faster.
    pub ratio: f32,
}

impl PulleyJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        PulleyJointDef {
            body_a,
            body_b,
            // Pulley-connected bodies usually hang side by side.
            collide_connected: true,
            ground_anchor_a: Vec2::new(-1.0, 1.0),
            ground_anchor_b: Vec2::new(1.0, 1.0),
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            length_a: 0.0,
            length_b: 0.0,
            ratio: 1.0,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        mut self,
        bodies: &SlotMap<BodyHandle, Body>,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: f32,
    ) -> Self {
        debug_assert!(ratio > f32::EPSILON);
        self.ground_anchor_a = ground_anchor_a;
        self.ground_anchor_b = ground_anchor_b;
        self.local_anchor_a = bodies[self.body_a].local_point(anchor_a);
        self.local_anchor_b = bodies[self.body_b].local_point(anchor_b);
        self.length_a = (anchor_a - ground_anchor_a).length();
        self.length_b = (anchor_b - ground_anchor_b).length();
        self.ratio = ratio;
        self
    }
}

#[derive(Debug)]
pub struct PulleyJoint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,

    ground_anchor_a: Vec2,
    ground_anchor_b: Vec2,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    length_a: f32,
    length_b: f32,
    ratio: f32,
    constant: f32,

    impulse: f32,
    index_a: usize,
    index_b: usize,
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    mass: f32,
}

impl PulleyJoint {
    pub(crate) fn new(def: &PulleyJointDef) -> Self {
        PulleyJoint {
            body_a: def.body_a,
            body_b: def.body_b,
            collide_connected: def.collide_connected,
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length_a: def.length_a,
            length_b: def.length_b,
            ratio: def.ratio,
            constant: def.length_a + def.ratio * def.length_b,
            impulse: 0.0,
            index_a: 0,
            index_b: 0,
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_a: 0.0,
            inv_mass_b: 0.0,
            inv_i_a: 0.0,
            inv_i_b: 0.0,
            mass: 0.0,
        }
    }

    pub fn ground_anchor_a(&self) -> Vec2 {
        self.ground_anchor_a
    }

    pub fn ground_anchor_b(&self) -> Vec2 {
        self.ground_anchor_b
    }

    pub fn length_a(&self) -> f32 {
        self.length_a
    }

    pub fn length_b(&self) -> f32 {
        self.length_b
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn current_length_a(&self, bodies: &SlotMap<BodyHandle, Body>) -> f32 {
        let p = bodies[self.body_a].world_point(self.local_anchor_a);
        (p - self.ground_anchor_a).length()
    }

    pub fn current_length_b(&self, bodies: &SlotMap<BodyHandle, Body>) -> f32 {
        let p = bodies[self.body_b].world_point(self.local_anchor_b);
        (p - self.ground_anchor_b).length()
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse * self.u_b
    }

    pub fn reaction_torque(&self, _inv_dt: f32) -> f32 {
        0.0
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

        let c_a = data.positions[self.index_a].c;
        let a_a = data.positions[self.index_a].a;
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;

        let c_b = data.positions[self.index_b].c;
        let a_b = data.positions[self.index_b].a;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        self.r_a = q_a.rotate(self.local_anchor_a - self.local_center_a);
        self.r_b = q_b.rotate(self.local_anchor_b - self.local_center_b);

        self.u_a = c_a + self.r_a - self.ground_anchor_a;
        self.u_b = c_b + self.r_b - self.ground_anchor_b;

        let length_a = self.u_a.length();
        let length_b = self.u_b.length();

        // A rope segment shorter than this carries no direction.
        if length_a > 10.0 * LINEAR_SLOP {
            self.u_a /= length_a;
        } else {
            self.u_a = Vec2::ZERO;
        }
        if length_b > 10.0 * LINEAR_SLOP {
            self.u_b /= length_b;
        } else {
            self.u_b = Vec2::ZERO;
        }

        let ru_a = cross(self.r_a, self.u_a);
        let ru_b = cross(self.r_b, self.u_b);

        let m_a = self.inv_mass_a + self.inv_i_a * ru_a * ru_a;
        let m_b = self.inv_mass_b + self.inv_i_b * ru_b * ru_b;

        self.mass = m_a + self.ratio * self.ratio * m_b;
        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;

            let p_a = -self.impulse * self.u_a;
            let p_b = -self.ratio * self.impulse * self.u_b;

            v_a += self.inv_mass_a * p_a;
            w_a += self.inv_i_a * cross(self.r_a, p_a);
            v_b += self.inv_mass_b * p_b;
            w_b += self.inv_i_b * cross(self.r_b, p_b);
        } else {
            self.impulse = 0.0;
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

        let vp_a = v_a + cross_sv(w_a, self.r_a);
        let vp_b = v_b + cross_sv(w_b, self.r_b);

        let c_dot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * c_dot;
        self.impulse += impulse;

        let p_a = -impulse * self.u_a;
        let p_b = -self.ratio * impulse * self.u_b;
        v_a += self.inv_mass_a * p_a;
        w_a += self.inv_i_a * cross(self.r_a, p_a);
        v_b += self.inv_mass_b * p_b;
        w_b += self.inv_i_b * cross(self.r_b, p_b);

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

        let r_a = q_a.rotate(self.local_anchor_a - self.local_center_a);
        let r_b = q_b.rotate(self.local_anchor_b - self.local_center_b);

        let mut u_a = c_a + r_a - self.ground_anchor_a;
        let mut u_b = c_b + r_b - self.ground_anchor_b;

        let length_a = u_a.length();
        let length_b = u_b.length();

        if length_a > 10.0 * LINEAR_SLOP {
            u_a /= length_a;
        } else {
            u_a = Vec2::ZERO;
        }
        if length_b > 10.0 * LINEAR_SLOP {
            u_b /= length_b;
        } else {
            u_b = Vec2::ZERO;
        }

        let ru_a = cross(r_a, u_a);
        let ru_b = cross(r_b, u_b);

        let m_a = self.inv_mass_a + self.inv_i_a * ru_a * ru_a;
        let m_b = self.inv_mass_b + self.inv_i_b * ru_b * ru_b;

        let mut mass = m_a + self.ratio * self.ratio * m_b;
        if mass > 0.0 {
            mass = 1.0 / mass;
        }

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();

        let impulse = -mass * c;

        let p_a = -impulse * u_a;
        let p_b = -self.ratio * impulse * u_b;

        c_a += self.inv_mass_a * p_a;
        a_a += self.inv_i_a * cross(r_a, p_a);
        c_b += self.inv_mass_b * p_b;
        a_b += self.inv_i_b * cross(r_b, p_b);

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;

        linear_error < LINEAR_SLOP
    }
}
