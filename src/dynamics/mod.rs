//! Rigid body dynamics: bodies, fixtures, joints, contacts and the world
//! that steps them.

use slotmap::new_key_type;

pub mod body;
pub mod contact;
pub(crate) mod contact_manager;
pub(crate) mod contact_solver;
pub mod fixture;
pub(crate) mod island;
pub mod joints;
pub mod time_step;
pub mod world;

new_key_type! {
    /// Stable handle to a body in a [`World`](world::World).
    pub struct BodyHandle;
    /// Stable handle to a fixture.
    pub struct FixtureHandle;
    /// Stable handle to a joint.
    pub struct JointHandle;
    /// Stable handle to a contact. Contacts are created and destroyed by
    /// the broad phase; holding a stale handle is safe, lookups just miss.
    pub struct ContactHandle;
}
