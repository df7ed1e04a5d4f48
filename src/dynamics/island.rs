//! Island solver: a connected cluster of awake bodies with the contacts
//! and joints between them, solved as one unit so impulses propagate and
//! the whole cluster can be put to sleep together.

use glam::Vec2;
use slotmap::SlotMap;

use crate::dynamics::body::{Body, BodyFlags, BodyType};
use crate::dynamics::contact::{Contact, ContactImpulse, ContactListener};
use crate::dynamics::contact_solver::ContactSolver;
use crate::dynamics::fixture::Fixture;
use crate::dynamics::joints::Joint;
use crate::dynamics::time_step::{Position, Profile, SolverData, TimeStep, Velocity};
use crate::dynamics::{BodyHandle, ContactHandle, FixtureHandle, JointHandle};
use crate::settings::{
    ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, MAX_ROTATION, MAX_ROTATION_SQUARED,
    MAX_TRANSLATION, MAX_TRANSLATION_SQUARED, TIME_TO_SLEEP,
};

#[derive(Debug, Default)]
pub(crate) struct Island {
    pub(crate) bodies: Vec<BodyHandle>,
    pub(crate) contacts: Vec<ContactHandle>,
    pub(crate) joints: Vec<JointHandle>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl Island {
    pub(crate) fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
        self.positions.clear();
        self.velocities.clear();
    }

    /// Add a body and assign its island-local index.
    pub(crate) fn add_body(&mut self, handle: BodyHandle, body: &mut Body) {
        body.island_index = self.bodies.len();
        self.bodies.push(handle);
    }

    pub(crate) fn add_contact(&mut self, handle: ContactHandle) {
        self.contacts.push(handle);
    }

    pub(crate) fn add_joint(&mut self, handle: JointHandle) {
        self.joints.push(handle);
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn solve(
        &mut self,
        profile: &mut Profile,
        step: TimeStep,
        gravity: Vec2,
        allow_sleep: bool,
        bodies: &mut SlotMap<BodyHandle, Body>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
        contacts: &mut SlotMap<ContactHandle, Contact>,
        joints: &mut SlotMap<JointHandle, Joint>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        let timer = std::time::Instant::now();
        let h = step.dt;

        self.positions.clear();
        self.velocities.clear();

        // Integrate velocities and collect island-local state.
        for &handle in &self.bodies {
            let body = &mut bodies[handle];

            let c = body.sweep.c;
            let a = body.sweep.a;
            let mut v = body.linear_velocity;
            let mut w = body.angular_velocity;

            body.sweep.c0 = c;
            body.sweep.a0 = a;

            if body.body_type == BodyType::Dynamic {
                v += h * (body.gravity_scale * gravity + body.inv_mass * body.force);
                w += h * body.inv_inertia * body.torque;

                // Linearized damping: dv/dt = -d * v integrates to
                // v * (1 - h * d), clamped so strong damping stops the
                // body in one step instead of reversing it.
                v *= (1.0 - h * body.linear_damping).clamp(0.0, 1.0);
                w *= (1.0 - h * body.angular_damping).clamp(0.0, 1.0);
            }

            self.positions.push(Position { c, a });
            self.velocities.push(Velocity { v, w });
        }

        let solve_init = std::time::Instant::now();
        let mut contact_solver =
            ContactSolver::new(step, &self.contacts, contacts, fixtures, bodies);
        contact_solver.init_velocity_constraints(
            contacts,
            fixtures,
            &self.positions,
            &self.velocities,
        );
        if step.warm_starting {
            contact_solver.warm_start(&mut self.velocities);
        }

        {
            let mut data = SolverData {
                step,
                positions: &mut self.positions,
                velocities: &mut self.velocities,
            };
            for &handle in &self.joints {
                joints[handle].init_velocity_constraints(&mut data, bodies);
            }
        }
        profile.solve_init += solve_init.elapsed().as_secs_f32() * 1000.0;

        let solve_velocity = std::time::Instant::now();
        for _ in 0..step.velocity_iterations {
            let mut data = SolverData {
                step,
                positions: &mut self.positions,
                velocities: &mut self.velocities,
            };
            for &handle in &self.joints {
                joints[handle].solve_velocity_constraints(&mut data);
            }
            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }
        contact_solver.store_impulses(contacts);
        profile.solve_velocity += solve_velocity.elapsed().as_secs_f32() * 1000.0;

        // Integrate positions with translation and rotation clamps so a
        // single step never moves a body further than the solver can fix.
        for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
            let mut v = velocity.v;
            let mut w = velocity.w;

            let translation = h * v;
            if translation.length_squared() > MAX_TRANSLATION_SQUARED {
                v *= MAX_TRANSLATION / translation.length();
            }
            let rotation = h * w;
            if rotation * rotation > MAX_ROTATION_SQUARED {
                w *= MAX_ROTATION / rotation.abs();
            }

            position.c += h * v;
            position.a += h * w;
            velocity.v = v;
            velocity.w = w;
        }

        let solve_position = std::time::Instant::now();
        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let contacts_okay = contact_solver.solve_position_constraints(&mut self.positions);

            let mut joints_okay = true;
            {
                let mut data = SolverData {
                    step,
                    positions: &mut self.positions,
                    velocities: &mut self.velocities,
                };
                for &handle in &self.joints {
                    let joint_okay = joints[handle].solve_position_constraints(&mut data);
                    joints_okay = joints_okay && joint_okay;
                }
            }

            if contacts_okay && joints_okay {
                position_solved = true;
                break;
            }
        }
        profile.solve_position += solve_position.elapsed().as_secs_f32() * 1000.0;

        // Write the solved state back.
        for (i, &handle) in self.bodies.iter().enumerate() {
            let body = &mut bodies[handle];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }

        self.report(contact_solver.velocity_constraints(), contacts, listener);

        if allow_sleep {
            let mut min_sleep_time = f32::MAX;

            let lin_tol_sq = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
            let ang_tol_sq = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

            for &handle in &self.bodies {
                let body = &mut bodies[handle];
                if body.body_type == BodyType::Static {
                    continue;
                }

                if !body.flags.contains(BodyFlags::AUTO_SLEEP)
                    || body.angular_velocity * body.angular_velocity > ang_tol_sq
                    || body.linear_velocity.length_squared() > lin_tol_sq
                {
                    body.sleep_time = 0.0;
                    min_sleep_time = 0.0;
                } else {
                    body.sleep_time += h;
                    min_sleep_time = min_sleep_time.min(body.sleep_time);
                }
            }

            if min_sleep_time >= TIME_TO_SLEEP && position_solved {
                for &handle in &self.bodies {
                    bodies[handle].set_awake(false);
                }
            }
        }

        profile.solve += timer.elapsed().as_secs_f32() * 1000.0;
    }

    /// Solve a TOI sub-step island: position correction for the two
    /// advanced bodies, then a velocity pass. No warm starting and no
    /// joints; sub-steps are too short for either to matter.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn solve_toi(
        &mut self,
        step: TimeStep,
        toi_index_a: usize,
        toi_index_b: usize,
        bodies: &mut SlotMap<BodyHandle, Body>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
        contacts: &mut SlotMap<ContactHandle, Contact>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        debug_assert!(toi_index_a < self.bodies.len());
        debug_assert!(toi_index_b < self.bodies.len());

        let h = step.dt;

        self.positions.clear();
        self.velocities.clear();
        for &handle in &self.bodies {
            let body = &bodies[handle];
            self.positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(Velocity {
                v: body.linear_velocity,
                w: body.angular_velocity,
            });
        }

        let mut contact_solver =
            ContactSolver::new(step, &self.contacts, contacts, fixtures, bodies);

        for _ in 0..step.position_iterations {
            let contacts_okay = contact_solver.solve_toi_position_constraints(
                &mut self.positions,
                toi_index_a,
                toi_index_b,
            );
            if contacts_okay {
                break;
            }
        }

        // The sub-step begins from the solved position.
        {
            let body_a = &mut bodies[self.bodies[toi_index_a]];
            body_a.sweep.c0 = self.positions[toi_index_a].c;
            body_a.sweep.a0 = self.positions[toi_index_a].a;
        }
        {
            let body_b = &mut bodies[self.bodies[toi_index_b]];
            body_b.sweep.c0 = self.positions[toi_index_b].c;
            body_b.sweep.a0 = self.positions[toi_index_b].a;
        }

        // Velocity constraints are solved against the fresh positions; no
        // warm starting because the sub-step impulses are throwaway.
        contact_solver.init_velocity_constraints(
            contacts,
            fixtures,
            &self.positions,
            &self.velocities,
        );
        for _ in 0..step.velocity_iterations {
            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }

        // Integrate positions.
        for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
            let mut v = velocity.v;
            let mut w = velocity.w;

            let translation = h * v;
            if translation.length_squared() > MAX_TRANSLATION_SQUARED {
                v *= MAX_TRANSLATION / translation.length();
            }
            let rotation = h * w;
            if rotation * rotation > MAX_ROTATION_SQUARED {
                w *= MAX_ROTATION / rotation.abs();
            }

            position.c += h * v;
            position.a += h * w;
            velocity.v = v;
            velocity.w = w;
        }

        for (i, &handle) in self.bodies.iter().enumerate() {
            let body = &mut bodies[handle];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }

        self.report(contact_solver.velocity_constraints(), contacts, listener);
    }

    fn report(
        &self,
        constraints: &[crate::dynamics::contact_solver::ContactVelocityConstraint],
        contacts: &SlotMap<ContactHandle, Contact>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        let Some(listener) = listener else {
            return;
        };

        for vc in constraints {
            let mut impulse = ContactImpulse {
                count: vc.point_count,
                ..Default::default()
            };
            for i in 0..vc.point_count {
                impulse.normal_impulses[i] = vc.points[i].normal_impulse;
                impulse.tangent_impulses[i] = vc.points[i].tangent_impulse;
            }
            listener.post_solve(&contacts[vc.contact], &impulse);
        }
    }
}
