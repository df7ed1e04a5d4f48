//! impulse2d is a deterministic 2D rigid body physics engine: a dynamic
//! AABB tree broad phase, GJK/SAT narrow phase with persistent contact
//! ids, a warm-started sequential impulse solver with island-based
//! sleeping, and conservative-advancement continuous collision for fast
//! bodies.
//!
//! Units are meters, kilograms, seconds and radians. The solver is tuned
//! for moving objects between roughly 0.1 and 10 meters.
//!
//! ```
//! use glam::Vec2;
//! use impulse2d::prelude::*;
//!
//! let mut world = World::new(Vec2::new(0.0, -10.0));
//!
//! let ground = world.create_body(BodyDef::static_at(Vec2::new(0.0, -10.0)));
//! world
//!     .create_fixture(ground, FixtureDef::new(PolygonShape::rect(50.0, 10.0)))
//!     .unwrap();
//!
//! let body = world.create_body(BodyDef::dynamic_at(Vec2::new(0.0, 4.0)));
//! world
//!     .create_fixture(
//!         body,
//!         FixtureDef::new(PolygonShape::rect(1.0, 1.0)).with_density(1.0),
//!     )
//!     .unwrap();
//!
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0, 8, 3);
//! }
//! assert!(world.body(body).position().y > 0.9);
//! ```

pub mod collision;
pub mod dynamics;
pub mod error;
pub mod math;
pub mod settings;

pub use error::PhysicsError;

/// The commonly used types in one import.
pub mod prelude {
    pub use crate::collision::aabb::Aabb;
    pub use crate::collision::shapes::{
        ChainShape, CircleShape, EdgeShape, MassData, PolygonShape, Shape,
    };
    pub use crate::dynamics::body::{Body, BodyDef, BodyType};
    pub use crate::dynamics::contact::{Contact, ContactImpulse, ContactListener};
    pub use crate::dynamics::fixture::{Filter, Fixture, FixtureDef};
    pub use crate::dynamics::joints::{
        DistanceJointDef, FrictionJointDef, GearJointDef, Joint, JointDef, MotorJointDef,
        MouseJointDef, PrismaticJointDef, PulleyJointDef, RevoluteJointDef, WeldJointDef,
        WheelJointDef,
    };
    pub use crate::dynamics::world::World;
    pub use crate::dynamics::{BodyHandle, ContactHandle, FixtureHandle, JointHandle};
    pub use crate::error::PhysicsError;
}
