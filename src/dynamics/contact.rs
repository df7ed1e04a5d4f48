//! Persistent contacts. A contact exists for every overlapping broad-phase
//! pair that passes filtering; `touching` tracks whether the narrow phase
//! currently produces a manifold for it.

use bitflags::bitflags;
use slotmap::SlotMap;

use crate::collision::collide;
use crate::collision::distance::test_overlap;
use crate::collision::manifold::Manifold;
use crate::dynamics::body::Body;
use crate::dynamics::fixture::Fixture;
use crate::dynamics::{BodyHandle, FixtureHandle};
use crate::settings::MAX_MANIFOLD_POINTS;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct ContactFlags: u8 {
        /// Already claimed by an island this step.
        const ISLAND = 0x01;
        /// The shapes are touching.
        const TOUCHING = 0x02;
        /// Contact participates in the solver; clearable per step from
        /// `pre_solve`.
        const ENABLED = 0x04;
        /// Filtering must be rechecked next step.
        const FILTER = 0x08;
        /// A bullet hit this contact during TOI.
        const BULLET_HIT = 0x10;
        /// TOI fraction is valid for the current sub-step pass.
        const TOI = 0x20;
    }
}

/// Solver impulses of a contact, reported to `post_solve`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Contact event callbacks. Invoked during `World::step`; the world is
/// locked, so implementations record what happened and act after the step.
pub trait ContactListener {
    /// Two fixtures began touching.
    fn begin_contact(&mut self, contact: &Contact) {
        let _ = contact;
    }

    /// Two fixtures stopped touching.
    fn end_contact(&mut self, contact: &Contact) {
        let _ = contact;
    }

    /// The manifold was recomputed and the contact is about to be solved.
    /// Disabling the contact here skips it for this step only.
    fn pre_solve(&mut self, contact: &mut Contact, old_manifold: &Manifold) {
        let _ = (contact, old_manifold);
    }

    /// The island solver finished with this contact.
    fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse) {
        let _ = (contact, impulse);
    }
}

#[derive(Debug)]
pub struct Contact {
    pub(crate) fixture_a: FixtureHandle,
    pub(crate) fixture_b: FixtureHandle,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) child_a: usize,
    pub(crate) child_b: usize,
    pub(crate) manifold: Manifold,
    pub(crate) flags: ContactFlags,
    /// Mixed friction, sqrt(a * b). Overridable per contact.
    pub(crate) friction: f32,
    /// Mixed restitution, max(a, b). Overridable per contact.
    pub(crate) restitution: f32,
    /// Surface translation speed along the tangent, for conveyor belts.
    pub(crate) tangent_speed: f32,
    /// TOI sub-steps already spent on this contact this step.
    pub(crate) toi_count: u32,
    pub(crate) toi: f32,
}

pub(crate) fn mix_friction(a: f32, b: f32) -> f32 {
    (a * b).sqrt()
}

pub(crate) fn mix_restitution(a: f32, b: f32) -> f32 {
    a.max(b)
}

impl Contact {
    pub(crate) fn new(
        fixture_a: FixtureHandle,
        child_a: usize,
        fixture_b: FixtureHandle,
        child_b: usize,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
    ) -> Self {
        let fa = &fixtures[fixture_a];
        let fb = &fixtures[fixture_b];
        Contact {
            fixture_a,
            fixture_b,
            body_a: fa.body,
            body_b: fb.body,
            child_a,
            child_b,
            manifold: Manifold::default(),
            flags: ContactFlags::ENABLED,
            friction: mix_friction(fa.friction, fb.friction),
            restitution: mix_restitution(fa.restitution, fb.restitution),
            tangent_speed: 0.0,
            toi_count: 0,
            toi: 1.0,
        }
    }

    pub fn fixture_a(&self) -> FixtureHandle {
        self.fixture_a
    }

    pub fn fixture_b(&self) -> FixtureHandle {
        self.fixture_b
    }

    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    pub fn child_index_a(&self) -> usize {
        self.child_a
    }

    pub fn child_index_b(&self) -> usize {
        self.child_b
    }

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub fn is_touching(&self) -> bool {
        self.flags.contains(ContactFlags::TOUCHING)
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(ContactFlags::ENABLED)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.flags.set(ContactFlags::ENABLED, enabled);
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    pub fn tangent_speed(&self) -> f32 {
        self.tangent_speed
    }

    pub fn set_tangent_speed(&mut self, speed: f32) {
        self.tangent_speed = speed;
    }

    /// Drop per-contact overrides back to the fixtures' mixed values.
    pub fn reset_friction(&mut self, fixtures: &SlotMap<FixtureHandle, Fixture>) {
        self.friction = mix_friction(
            fixtures[self.fixture_a].friction,
            fixtures[self.fixture_b].friction,
        );
    }

    pub fn reset_restitution(&mut self, fixtures: &SlotMap<FixtureHandle, Fixture>) {
        self.restitution = mix_restitution(
            fixtures[self.fixture_a].restitution,
            fixtures[self.fixture_b].restitution,
        );
    }

    pub(crate) fn flag_for_filtering(&mut self) {
        self.flags.insert(ContactFlags::FILTER);
    }

    /// Recompute the manifold at the current transforms, carrying warm-start
    /// impulses over matching contact ids, and fire begin/end/pre-solve
    /// callbacks on touching transitions.
    pub(crate) fn update(
        &mut self,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
        bodies: &mut SlotMap<BodyHandle, Body>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        let old_manifold = self.manifold;

        // Re-enable: pre_solve may disable again below.
        self.flags.insert(ContactFlags::ENABLED);

        let was_touching = self.flags.contains(ContactFlags::TOUCHING);

        let fa = &fixtures[self.fixture_a];
        let fb = &fixtures[self.fixture_b];
        let sensor = fa.is_sensor || fb.is_sensor;

        let xf_a = bodies[self.body_a].xf;
        let xf_b = bodies[self.body_b].xf;

        let touching;
        if sensor {
            touching = test_overlap(
                &fa.shape,
                self.child_a,
                &fb.shape,
                self.child_b,
                &xf_a,
                &xf_b,
            );
            // Sensors never generate a manifold.
            self.manifold.point_count = 0;
        } else {
            collide::evaluate(
                &mut self.manifold,
                &fa.shape,
                self.child_a,
                &xf_a,
                &fb.shape,
                self.child_b,
                &xf_b,
            );
            touching = self.manifold.point_count > 0;

            // Match old impulses to new points by feature id so the solver
            // warm starts across frames.
            for i in 0..self.manifold.point_count {
                let id = self.manifold.points[i].id;
                self.manifold.points[i].normal_impulse = 0.0;
                self.manifold.points[i].tangent_impulse = 0.0;
                for j in 0..old_manifold.point_count {
                    if old_manifold.points[j].id == id {
                        self.manifold.points[i].normal_impulse =
                            old_manifold.points[j].normal_impulse;
                        self.manifold.points[i].tangent_impulse =
                            old_manifold.points[j].tangent_impulse;
                        break;
                    }
                }
            }

            if touching != was_touching {
                bodies[self.body_a].set_awake(true);
                bodies[self.body_b].set_awake(true);
            }
        }

        self.flags.set(ContactFlags::TOUCHING, touching);

        if let Some(listener) = listener {
            if touching && !was_touching {
                listener.begin_contact(self);
            }
            if !touching && was_touching {
                listener.end_contact(self);
            }
            if touching && !sensor {
                listener.pre_solve(self, &old_manifold);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn friction_mixes_geometrically() {
        assert_relative_eq!(mix_friction(0.4, 0.9), 0.6, epsilon = 1e-6);
        assert_eq!(mix_friction(0.0, 1.0), 0.0);
    }

    #[test]
    fn restitution_takes_the_bouncier_surface() {
        assert_eq!(mix_restitution(0.2, 0.8), 0.8);
        assert_eq!(mix_restitution(0.0, 0.0), 0.0);
    }
}
