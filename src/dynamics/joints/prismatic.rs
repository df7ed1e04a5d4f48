//! Prismatic joint: one translational degree of freedom along an axis
//! fixed in body A, with no relative rotation. Supports translation limits
//! and a linear motor.

use glam::{Mat3, Vec2, Vec3};
use slotmap::SlotMap;

use crate::dynamics::body::Body;
use crate::dynamics::time_step::SolverData;
use crate::dynamics::BodyHandle;
use crate::math::{Rot, cross, cross_sv, cross_vs, solve22, solve33};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_LINEAR_CORRECTION};

#[derive(Debug, Clone)]
pub struct PrismaticJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Slide axis in body A's frame; normalized on construction.
    pub local_axis_a: Vec2,
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_force: f32,
}

impl PrismaticJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        PrismaticJointDef {
            body_a,
            body_b,
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            local_axis_a: Vec2::X,
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_force: 0.0,
        }
    }

    pub fn initialize(
        mut self,
        bodies: &SlotMap<BodyHandle, Body>,
        anchor: Vec2,
        axis: Vec2,
    ) -> Self {
        let body_a = &bodies[self.body_a];
        let body_b = &bodies[self.body_b];
        self.local_anchor_a = body_a.local_point(anchor);
        self.local_anchor_b = body_b.local_point(anchor);
        self.local_axis_a = body_a.local_vector(axis);
        self.reference_angle = body_b.angle() - body_a.angle();
        self
    }
}

#[derive(Debug)]
pub struct PrismaticJoint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,

    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) local_axis_a: Vec2,
    local_y_axis_a: Vec2,
    pub(crate) reference_angle: f32,
    enable_limit: bool,
    lower_translation: f32,
    upper_translation: f32,
    enable_motor: bool,
    motor_speed: f32,
    max_motor_force: f32,

    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,
    index_a: usize,
    index_b: usize,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    axial_mass: f32,
    k: [f32; 3],
    translation: f32,
}

impl PrismaticJoint {
    pub(crate) fn new(def: &PrismaticJointDef) -> Self {
        let local_axis_a = def.local_axis_a.normalize_or_zero();
        PrismaticJoint {
            body_a: def.body_a,
            body_b: def.body_b,
            collide_connected: def.collide_connected,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_axis_a,
            local_y_axis_a: cross_sv(1.0, local_axis_a),
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_force: def.max_motor_force,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            index_a: 0,
            index_b: 0,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_a: 0.0,
            inv_mass_b: 0.0,
            inv_i_a: 0.0,
            inv_i_b: 0.0,
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            axial_mass: 0.0,
            k: [0.0; 3],
            translation: 0.0,
        }
    }

    pub fn joint_translation(&self, bodies: &SlotMap<BodyHandle, Body>) -> f32 {
        let body_a = &bodies[self.body_a];
        let body_b = &bodies[self.body_b];
        let p_a = body_a.world_point(self.local_anchor_a);
        let p_b = body_b.world_point(self.local_anchor_b);
        let axis = body_a.world_vector(self.local_axis_a);
        (p_b - p_a).dot(axis)
    }

    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, enabled: bool) {
        if enabled != self.enable_limit {
            self.enable_limit = enabled;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        debug_assert!(lower <= upper);
        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower;
            self.upper_translation = upper;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    pub fn enable_motor(&mut self, enabled: bool) {
        self.enable_motor = enabled;
    }

    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    pub fn set_max_motor_force(&mut self, force: f32) {
        self.max_motor_force = force;
    }

    pub fn motor_force(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt
            * (self.impulse.x * self.perp
                + (self.motor_impulse + self.lower_impulse - self.upper_impulse) * self.axis)
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.y
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

        let r_a = q_a.rotate(self.local_anchor_a - self.local_center_a);
        let r_b = q_b.rotate(self.local_anchor_b - self.local_center_b);
        let d = c_b - c_a + r_b - r_a;

        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

        self.axis = q_a.rotate(self.local_axis_a);
        self.a1 = cross(d + r_a, self.axis);
        self.a2 = cross(r_b, self.axis);

        self.axial_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        self.perp = q_a.rotate(self.local_y_axis_a);
        self.s1 = cross(d + r_a, self.perp);
        self.s2 = cross(r_b, self.perp);

        let k11 = m_a + m_b + i_a * self.s1 * self.s1 + i_b * self.s2 * self.s2;
        let k12 = i_a * self.s1 + i_b * self.s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            // Two fixed-rotation bodies: the angular row is free.
            k22 = 1.0;
        }
        self.k = [k11, k12, k22];

        self.translation = self.axis.dot(d);

        if !self.enable_limit {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;
            self.lower_impulse *= data.step.dt_ratio;
            self.upper_impulse *= data.step.dt_ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse.x * self.perp + axial_impulse * self.axis;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial_impulse * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial_impulse * self.a2;

            v_a -= m_a * p;
            w_a -= i_a * l_a;
            v_b += m_b * p;
            w_b += i_b * l_b;
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
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

        if self.enable_motor {
            let c_dot = self.axis.dot(v_b - v_a) + self.a2 * w_b - self.a1 * w_a;
            let mut impulse = self.axial_mass * (self.motor_speed - c_dot);
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_force;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            let p = impulse * self.axis;
            let l_a = impulse * self.a1;
            let l_b = impulse * self.a2;

            v_a -= m_a * p;
            w_a -= i_a * l_a;
            v_b += m_b * p;
            w_b += i_b * l_b;
        }

        if self.enable_limit {
            // Lower limit.
            {
                let c = self.translation - self.lower_translation;
                let c_dot = self.axis.dot(v_b - v_a) + self.a2 * w_b - self.a1 * w_a;
                let mut impulse =
                    -self.axial_mass * (c_dot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                impulse = self.lower_impulse - old_impulse;

                let p = impulse * self.axis;
                let l_a = impulse * self.a1;
                let l_b = impulse * self.a2;

                v_a -= m_a * p;
                w_a -= i_a * l_a;
                v_b += m_b * p;
                w_b += i_b * l_b;
            }

            // Upper limit.
            {
                let c = self.upper_translation - self.translation;
                let c_dot = self.axis.dot(v_a - v_b) + self.a1 * w_a - self.a2 * w_b;
                let mut impulse =
                    -self.axial_mass * (c_dot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                impulse = self.upper_impulse - old_impulse;

                let p = -impulse * self.axis;
                let l_a = -impulse * self.a1;
                let l_b = -impulse * self.a2;

                v_a -= m_a * p;
                w_a -= i_a * l_a;
                v_b += m_b * p;
                w_b += i_b * l_b;
            }
        }

        // Perpendicular and angular constraint rows.
        {
            let c_dot = Vec2::new(
                self.perp.dot(v_b - v_a) + self.s2 * w_b - self.s1 * w_a,
                w_b - w_a,
            );

            let df = solve22(self.k[0], self.k[1], self.k[1], self.k[2], -c_dot);
            self.impulse += df;

            let p = df.x * self.perp;
            let l_a = df.x * self.s1 + df.y;
            let l_b = df.x * self.s2 + df.y;

            v_a -= m_a * p;
            w_a -= i_a * l_a;
            v_b += m_b * p;
            w_b += i_b * l_b;
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
        let d = c_b + r_b - c_a - r_a;

        let axis = q_a.rotate(self.local_axis_a);
        let a1 = cross(d + r_a, axis);
        let a2 = cross(r_b, axis);
        let perp = q_a.rotate(self.local_y_axis_a);

        let s1 = cross(d + r_a, perp);
        let s2 = cross(r_b, perp);

        let c1 = Vec2::new(perp.dot(d), a_b - a_a - self.reference_angle);

        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.enable_limit {
            let translation = axis.dot(d);
            if self.upper_translation == self.lower_translation {
                c2 = (translation - self.lower_translation)
                    .clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);
                linear_error = linear_error.max(c2.abs());
                active = true;
            } else if translation <= self.lower_translation {
                c2 = (translation - self.lower_translation + LINEAR_SLOP)
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                c2 = (translation - self.upper_translation - LINEAR_SLOP)
                    .clamp(0.0, MAX_LINEAR_CORRECTION);
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let impulse = if active {
            let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
            let k12 = i_a * s1 + i_b * s2;
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let mut k22 = i_a + i_b;
            if k22 == 0.0 {
                k22 = 1.0;
            }
            let k23 = i_a * a1 + i_b * a2;
            let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;

            let k = Mat3::from_cols(
                Vec3::new(k11, k12, k13),
                Vec3::new(k12, k22, k23),
                Vec3::new(k13, k23, k33),
            );
            let c = Vec3::new(c1.x, c1.y, c2);
            solve33(&k, -c)
        } else {
            let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
            let k12 = i_a * s1 + i_b * s2;
            let mut k22 = i_a + i_b;
            if k22 == 0.0 {
                k22 = 1.0;
            }
            let impulse1 = solve22(k11, k12, k12, k22, -c1);
            Vec3::new(impulse1.x, impulse1.y, 0.0)
        };

        let p = impulse.x * perp + impulse.z * axis;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        c_a -= m_a * p;
        a_a -= i_a * l_a;
        c_b += m_b * p;
        a_b += i_b * l_b;

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
