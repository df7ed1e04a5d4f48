//! Global tuning constants for the collision and solver pipeline.
//!
//! The tolerances are expressed in meters/kilograms/seconds and assume
//! moving shapes in roughly the 0.1..10 meter range; simulating far
//! outside that range degrades solver accuracy.

use std::f32::consts::PI;

/// A small length used as a collision and constraint tolerance. Usually it is
/// chosen to be numerically significant, but visually insignificant.
pub const LINEAR_SLOP: f32 = 0.005;

/// A small angle used as a collision and constraint tolerance.
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * PI;

/// The radius of the polygon/edge shape skin. This should not be modified.
/// Making this smaller means polygons will have an insufficient buffer for
/// continuous collision. Making it larger may create artifacts for vertex
/// collision.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Fattening applied to leaf AABBs in the dynamic tree. This allows proxies
/// to move by small amounts without triggering a tree update.
pub const AABB_EXTENSION: f32 = 0.1;

/// Multiplier on a moved proxy's displacement used to predictively extend
/// its fat AABB in the direction of travel.
pub const AABB_MULTIPLIER: f32 = 2.0;

/// A velocity threshold for elastic collisions. Any collision with a relative
/// linear velocity below this threshold is treated as inelastic.
pub const VELOCITY_THRESHOLD: f32 = 1.0;

/// Maximum linear position correction used when solving constraints.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Maximum angular position correction used when solving constraints.
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * PI;

/// Maximum translation of a body per sub-step. Large velocities are clamped
/// to this limit to avoid numerical blow-up.
pub const MAX_TRANSLATION: f32 = 2.0;
pub const MAX_TRANSLATION_SQUARED: f32 = MAX_TRANSLATION * MAX_TRANSLATION;

/// Maximum rotation of a body per sub-step.
pub const MAX_ROTATION: f32 = 0.5 * PI;
pub const MAX_ROTATION_SQUARED: f32 = MAX_ROTATION * MAX_ROTATION;

/// Baumgarte scale factor for position correction: only this fraction of the
/// overlap is resolved per position iteration.
pub const BAUMGARTE: f32 = 0.2;
pub const TOI_BAUMGARTE: f32 = 0.75;

/// The time that a body must be near-stationary before it is put to sleep.
pub const TIME_TO_SLEEP: f32 = 0.5;

/// A body cannot sleep while its linear velocity is above this.
pub const LINEAR_SLEEP_TOLERANCE: f32 = 0.01;

/// A body cannot sleep while its angular velocity is above this.
pub const ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * PI;

/// Maximum number of continuous-collision sub-steps per step.
pub const MAX_SUB_STEPS: usize = 8;

/// Maximum number of contacts considered in one TOI sub-step island.
pub const MAX_TOI_CONTACTS: usize = 32;

/// Iteration caps for the TOI root finder. Safety valves against numerical
/// non-convergence, not correctness guarantees.
pub const MAX_TOI_ITERATIONS: u32 = 20;
pub const MAX_TOI_ROOT_ITERATIONS: u32 = 50;
