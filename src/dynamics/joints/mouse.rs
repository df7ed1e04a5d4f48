//! Mouse joint: drags a body point toward a world target with a soft
//! critically-dampable spring. Meant for picking, so body A is only a
//! formal attachment and never receives forces.

use glam::{Mat2, Vec2};
use slotmap::SlotMap;

use crate::dynamics::body::Body;
use crate::dynamics::time_step::SolverData;
use crate::dynamics::BodyHandle;
use crate::math::{Rot, cross, cross_sv};

#[derive(Debug, Clone)]
pub struct MouseJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// World target the anchor is pulled toward.
    pub target: Vec2,
    /// Force ceiling; usually a few hundred times the body weight.
    pub max_force: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl MouseJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, target: Vec2) -> Self {
        MouseJointDef {
            body_a,
            body_b,
            target,
            max_force: 0.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }
}

#[derive(Debug)]
pub struct MouseJoint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,

    pub(crate) local_anchor_b: Vec2,
    target: Vec2,
    max_force: f32,
    stiffness: f32,
    damping: f32,

    impulse: Vec2,
    gamma: f32,
    beta: f32,
    index_b: usize,
    r_b: Vec2,
    local_center_b: Vec2,
    inv_mass_b: f32,
    inv_i_b: f32,
    mass: Mat2,
    c: Vec2,
}

impl MouseJoint {
    pub(crate) fn new(def: &MouseJointDef, bodies: &SlotMap<BodyHandle, Body>) -> Self {
        MouseJoint {
            body_a: def.body_a,
            body_b: def.body_b,
            local_anchor_b: bodies[def.body_b].local_point(def.target),
            target: def.target,
            max_force: def.max_force,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: Vec2::ZERO,
            gamma: 0.0,
            beta: 0.0,
            index_b: 0,
            r_b: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_b: 0.0,
            inv_i_b: 0.0,
            mass: Mat2::ZERO,
            c: Vec2::ZERO,
        }
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Move the target. The body is woken by the world wrapper.
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse
    }

    pub fn reaction_torque(&self, _inv_dt: f32) -> f32 {
        0.0
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        bodies: &SlotMap<BodyHandle, Body>,
    ) {
        let body_b = &bodies[self.body_b];
        self.index_b = body_b.island_index;
        self.local_center_b = body_b.sweep.local_center;
        self.inv_mass_b = body_b.inv_mass;
        self.inv_i_b = body_b.inv_inertia;

        let c_b = data.positions[self.index_b].c;
        let a_b = data.positions[self.index_b].a;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let q_b = Rot::new(a_b);

        let d = self.damping;
        let k = self.stiffness;
        let h = data.step.dt;

        self.gamma = h * (d + h * k);
        if self.gamma != 0.0 {
            self.gamma = 1.0 / self.gamma;
        }
        self.beta = h * k * self.gamma;

        self.r_b = q_b.rotate(self.local_anchor_b - self.local_center_b);

        // K = invMass + invI * skew(rB) * skew(rB)^T + gamma * I
        let k11 = self.inv_mass_b + self.inv_i_b * self.r_b.y * self.r_b.y + self.gamma;
        let k12 = -self.inv_i_b * self.r_b.x * self.r_b.y;
        let k22 = self.inv_mass_b + self.inv_i_b * self.r_b.x * self.r_b.x + self.gamma;
        let k_mat = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
        self.mass = k_mat.inverse();

        self.c = (c_b + self.r_b - self.target) * self.beta;

        // Extra rotational damping keeps picked bodies from spinning off.
        w_b *= 0.98;

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            v_b += self.inv_mass_b * self.impulse;
            w_b += self.inv_i_b * cross(self.r_b, self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }

        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let c_dot = v_b + cross_sv(w_b, self.r_b);
        let mut impulse = self.mass * (-(c_dot + self.c + self.gamma * self.impulse));

        let old_impulse = self.impulse;
        self.impulse += impulse;
        // The applied force is capped, which softens violent drags.
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.length_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.length();
        }
        impulse = self.impulse - old_impulse;

        v_b += self.inv_mass_b * impulse;
        w_b += self.inv_i_b * cross(self.r_b, impulse);

        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    pub(crate) fn solve_position_constraints(&mut self, _data: &mut SolverData) -> bool {
        true
    }
}
