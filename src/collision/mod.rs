//! Collision detection: spatial indexing, shape geometry, GJK distance,
//! SAT manifolds and time-of-impact root finding.

pub mod aabb;
pub mod broad_phase;
pub mod collide;
pub mod distance;
pub mod dynamic_tree;
pub mod manifold;
pub mod shapes;
pub mod time_of_impact;

use glam::Vec2;

/// Ray cast input: the segment from `p1` toward `p2`, clipped to
/// `p1 + max_fraction * (p2 - p1)`.
#[derive(Debug, Clone, Copy)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f32,
}

/// Ray cast hit: the surface normal at the hit point and the fraction along
/// the input segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: f32,
}
