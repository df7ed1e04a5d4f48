//! Constraints between pairs of bodies. Each joint removes degrees of
//! freedom from the relative motion of its two bodies and is solved with
//! sequential impulses, warm started across steps.

use glam::Vec2;
use slotmap::SlotMap;

use crate::dynamics::body::Body;
use crate::dynamics::time_step::SolverData;
use crate::dynamics::BodyHandle;

mod distance;
mod friction;
mod gear;
mod motor;
mod mouse;
mod prismatic;
mod pulley;
mod revolute;
mod weld;
mod wheel;

pub use distance::{DistanceJoint, DistanceJointDef};
pub use friction::{FrictionJoint, FrictionJointDef};
pub use gear::{GearJoint, GearJointDef};
pub use motor::{MotorJoint, MotorJointDef};
pub use mouse::{MouseJoint, MouseJointDef};
pub use prismatic::{PrismaticJoint, PrismaticJointDef};
pub use pulley::{PulleyJoint, PulleyJointDef};
pub use revolute::{RevoluteJoint, RevoluteJointDef};
pub use weld::{WeldJoint, WeldJointDef};
pub use wheel::{WheelJoint, WheelJointDef};

/// Creation parameters for every joint kind. Passed to
/// [`World::create_joint`](crate::dynamics::world::World::create_joint).
#[derive(Debug, Clone)]
pub enum JointDef {
    Distance(DistanceJointDef),
    Friction(FrictionJointDef),
    Gear(GearJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Revolute(RevoluteJointDef),
    Weld(WeldJointDef),
    Wheel(WheelJointDef),
}

#[derive(Debug)]
pub enum Joint {
    Distance(DistanceJoint),
    Friction(FrictionJoint),
    Gear(GearJoint),
    Motor(MotorJoint),
    Mouse(MouseJoint),
    Prismatic(PrismaticJoint),
    Pulley(PulleyJoint),
    Revolute(RevoluteJoint),
    Weld(WeldJoint),
    Wheel(WheelJoint),
}

impl Joint {
    pub fn body_a(&self) -> BodyHandle {
        match self {
            Joint::Distance(j) => j.body_a,
            Joint::Friction(j) => j.body_a,
            Joint::Gear(j) => j.body_a,
            Joint::Motor(j) => j.body_a,
            Joint::Mouse(j) => j.body_a,
            Joint::Prismatic(j) => j.body_a,
            Joint::Pulley(j) => j.body_a,
            Joint::Revolute(j) => j.body_a,
            Joint::Weld(j) => j.body_a,
            Joint::Wheel(j) => j.body_a,
        }
    }

    pub fn body_b(&self) -> BodyHandle {
        match self {
            Joint::Distance(j) => j.body_b,
            Joint::Friction(j) => j.body_b,
            Joint::Gear(j) => j.body_b,
            Joint::Motor(j) => j.body_b,
            Joint::Mouse(j) => j.body_b,
            Joint::Prismatic(j) => j.body_b,
            Joint::Pulley(j) => j.body_b,
            Joint::Revolute(j) => j.body_b,
            Joint::Weld(j) => j.body_b,
            Joint::Wheel(j) => j.body_b,
        }
    }

    pub fn collide_connected(&self) -> bool {
        match self {
            Joint::Distance(j) => j.collide_connected,
            Joint::Friction(j) => j.collide_connected,
            // The gear's bodies are coupled through other joints.
            Joint::Gear(_) => false,
            Joint::Motor(j) => j.collide_connected,
            // The mouse joint's body A is only a formal attachment.
            Joint::Mouse(_) => true,
            Joint::Prismatic(j) => j.collide_connected,
            Joint::Pulley(j) => j.collide_connected,
            Joint::Revolute(j) => j.collide_connected,
            Joint::Weld(j) => j.collide_connected,
            Joint::Wheel(j) => j.collide_connected,
        }
    }

    /// World-space anchor on body A.
    pub fn anchor_a(&self, bodies: &SlotMap<BodyHandle, Body>) -> Vec2 {
        match self {
            Joint::Distance(j) => bodies[j.body_a].world_point(j.local_anchor_a),
            Joint::Friction(j) => bodies[j.body_a].world_point(j.local_anchor_a()),
            Joint::Gear(j) => bodies[j.body_a].world_point(j.local_anchor_a),
            Joint::Motor(j) => bodies[j.body_a].position(),
            Joint::Mouse(j) => j.target(),
            Joint::Prismatic(j) => bodies[j.body_a].world_point(j.local_anchor_a),
            Joint::Pulley(j) => bodies[j.body_a].world_point(j.local_anchor_a),
            Joint::Revolute(j) => bodies[j.body_a].world_point(j.local_anchor_a),
            Joint::Weld(j) => bodies[j.body_a].world_point(j.local_anchor_a),
            Joint::Wheel(j) => bodies[j.body_a].world_point(j.local_anchor_a),
        }
    }

    /// World-space anchor on body B.
    pub fn anchor_b(&self, bodies: &SlotMap<BodyHandle, Body>) -> Vec2 {
        match self {
            Joint::Distance(j) => bodies[j.body_b].world_point(j.local_anchor_b),
            Joint::Friction(j) => bodies[j.body_b].world_point(j.local_anchor_b()),
            Joint::Gear(j) => bodies[j.body_b].world_point(j.local_anchor_b),
            Joint::Motor(j) => bodies[j.body_b].position(),
            Joint::Mouse(j) => bodies[j.body_b].world_point(j.local_anchor_b),
            Joint::Prismatic(j) => bodies[j.body_b].world_point(j.local_anchor_b),
            Joint::Pulley(j) => bodies[j.body_b].world_point(j.local_anchor_b),
            Joint::Revolute(j) => bodies[j.body_b].world_point(j.local_anchor_b),
            Joint::Weld(j) => bodies[j.body_b].world_point(j.local_anchor_b),
            Joint::Wheel(j) => bodies[j.body_b].world_point(j.local_anchor_b),
        }
    }

    /// Constraint force on body B at the anchor, in Newtons.
    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        match self {
            Joint::Distance(j) => j.reaction_force(inv_dt),
            Joint::Friction(j) => j.reaction_force(inv_dt),
            Joint::Gear(j) => j.reaction_force(inv_dt),
            Joint::Motor(j) => j.reaction_force(inv_dt),
            Joint::Mouse(j) => j.reaction_force(inv_dt),
            Joint::Prismatic(j) => j.reaction_force(inv_dt),
            Joint::Pulley(j) => j.reaction_force(inv_dt),
            Joint::Revolute(j) => j.reaction_force(inv_dt),
            Joint::Weld(j) => j.reaction_force(inv_dt),
            Joint::Wheel(j) => j.reaction_force(inv_dt),
        }
    }

    /// Constraint torque on body B, in N*m.
    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        match self {
            Joint::Distance(j) => j.reaction_torque(inv_dt),
            Joint::Friction(j) => j.reaction_torque(inv_dt),
            Joint::Gear(j) => j.reaction_torque(inv_dt),
            Joint::Motor(j) => j.reaction_torque(inv_dt),
            Joint::Mouse(j) => j.reaction_torque(inv_dt),
            Joint::Prismatic(j) => j.reaction_torque(inv_dt),
            Joint::Pulley(j) => j.reaction_torque(inv_dt),
            Joint::Revolute(j) => j.reaction_torque(inv_dt),
            Joint::Weld(j) => j.reaction_torque(inv_dt),
            Joint::Wheel(j) => j.reaction_torque(inv_dt),
        }
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        bodies: &SlotMap<BodyHandle, Body>,
    ) {
        match self {
            Joint::Distance(j) => j.init_velocity_constraints(data, bodies),
            Joint::Friction(j) => j.init_velocity_constraints(data, bodies),
            Joint::Gear(j) => j.init_velocity_constraints(data, bodies),
            Joint::Motor(j) => j.init_velocity_constraints(data, bodies),
            Joint::Mouse(j) => j.init_velocity_constraints(data, bodies),
            Joint::Prismatic(j) => j.init_velocity_constraints(data, bodies),
            Joint::Pulley(j) => j.init_velocity_constraints(data, bodies),
            Joint::Revolute(j) => j.init_velocity_constraints(data, bodies),
            Joint::Weld(j) => j.init_velocity_constraints(data, bodies),
            Joint::Wheel(j) => j.init_velocity_constraints(data, bodies),
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        match self {
            Joint::Distance(j) => j.solve_velocity_constraints(data),
            Joint::Friction(j) => j.solve_velocity_constraints(data),
            Joint::Gear(j) => j.solve_velocity_constraints(data),
            Joint::Motor(j) => j.solve_velocity_constraints(data),
            Joint::Mouse(j) => j.solve_velocity_constraints(data),
            Joint::Prismatic(j) => j.solve_velocity_constraints(data),
            Joint::Pulley(j) => j.solve_velocity_constraints(data),
            Joint::Revolute(j) => j.solve_velocity_constraints(data),
            Joint::Weld(j) => j.solve_velocity_constraints(data),
            Joint::Wheel(j) => j.solve_velocity_constraints(data),
        }
    }

    /// Returns true once the position error is within slop.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        match self {
            Joint::Distance(j) => j.solve_position_constraints(data),
            Joint::Friction(j) => j.solve_position_constraints(data),
            Joint::Gear(j) => j.solve_position_constraints(data),
            Joint::Motor(j) => j.solve_position_constraints(data),
            Joint::Mouse(j) => j.solve_position_constraints(data),
            Joint::Prismatic(j) => j.solve_position_constraints(data),
            Joint::Pulley(j) => j.solve_position_constraints(data),
            Joint::Revolute(j) => j.solve_position_constraints(data),
            Joint::Weld(j) => j.solve_position_constraints(data),
            Joint::Wheel(j) => j.solve_position_constraints(data),
        }
    }
}

/// Convert a frequency and damping ratio into the stiffness and damping
/// used by the soft joints, based on the reduced mass of the pair.
pub fn linear_stiffness(
    frequency_hertz: f32,
    damping_ratio: f32,
    body_a: &Body,
    body_b: &Body,
) -> (f32, f32) {
    let mass_a = body_a.mass();
    let mass_b = body_b.mass();
    let mass = if mass_a > 0.0 && mass_b > 0.0 {
        mass_a * mass_b / (mass_a + mass_b)
    } else if mass_a > 0.0 {
        mass_a
    } else {
        mass_b
    };

    let omega = 2.0 * std::f32::consts::PI * frequency_hertz;
    (mass * omega * omega, 2.0 * mass * damping_ratio * omega)
}

/// Angular counterpart of [`linear_stiffness`], based on rotational inertia.
pub fn angular_stiffness(
    frequency_hertz: f32,
    damping_ratio: f32,
    body_a: &Body,
    body_b: &Body,
) -> (f32, f32) {
    let inertia_a = body_a.inertia();
    let inertia_b = body_b.inertia();
    let inertia = if inertia_a > 0.0 && inertia_b > 0.0 {
        inertia_a * inertia_b / (inertia_a + inertia_b)
    } else if inertia_a > 0.0 {
        inertia_a
    } else {
        inertia_b
    };

    let omega = 2.0 * std::f32::consts::PI * frequency_hertz;
    (
        inertia * omega * omega,
        2.0 * inertia * damping_ratio * omega,
    )
}
