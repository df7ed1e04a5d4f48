//! Shape geometry. Shapes are a closed set modeled as a sum type so the
//! narrow phase can dispatch on plain variants; there is no open shape
//! registration.

mod chain;
mod circle;
mod edge;
mod polygon;

pub use chain::ChainShape;
pub use circle::CircleShape;
pub use edge::EdgeShape;
pub use polygon::PolygonShape;

use glam::Vec2;

use crate::collision::aabb::Aabb;
use crate::collision::{RayCastInput, RayCastOutput};
use crate::math::Transform2;

/// Mass, centroid and rotational inertia of a shape at a given density.
/// Inertia is about the shape's local origin, not the centroid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MassData {
    pub mass: f32,
    pub center: Vec2,
    pub inertia: f32,
}

/// A shape attached to a body through a fixture. Edge and chain shapes are
/// hollow and never contribute mass.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle(CircleShape),
    Polygon(PolygonShape),
    Edge(EdgeShape),
    Chain(ChainShape),
}

impl Shape {
    /// Number of broad-phase children. Chains have one child per edge
    /// segment, every other shape has one.
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(chain) => chain.child_count(),
            _ => 1,
        }
    }

    /// The skin radius around the shape surface used by GJK and TOI.
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Polygon(p) => p.radius,
            Shape::Edge(e) => e.radius,
            Shape::Chain(c) => c.radius,
        }
    }

    pub fn compute_aabb(&self, xf: &Transform2, child_index: usize) -> Aabb {
        match self {
            Shape::Circle(c) => c.compute_aabb(xf),
            Shape::Polygon(p) => p.compute_aabb(xf),
            Shape::Edge(e) => e.compute_aabb(xf),
            Shape::Chain(c) => c.compute_aabb(xf, child_index),
        }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(c) => c.compute_mass(density),
            Shape::Polygon(p) => p.compute_mass(density),
            // Hollow shapes carry no mass.
            Shape::Edge(_) | Shape::Chain(_) => MassData::default(),
        }
    }

    /// Point containment in world space. Always false for hollow shapes.
    pub fn test_point(&self, xf: &Transform2, point: Vec2) -> bool {
        match self {
            Shape::Circle(c) => c.test_point(xf, point),
            Shape::Polygon(p) => p.test_point(xf, point),
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform2,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => c.ray_cast(input, xf),
            Shape::Polygon(p) => p.ray_cast(input, xf),
            Shape::Edge(e) => e.ray_cast(input, xf),
            Shape::Chain(c) => c.child_edge(child_index).ray_cast(input, xf),
        }
    }
}

impl From<CircleShape> for Shape {
    fn from(s: CircleShape) -> Self {
        Shape::Circle(s)
    }
}

impl From<PolygonShape> for Shape {
    fn from(s: PolygonShape) -> Self {
        Shape::Polygon(s)
    }
}

impl From<EdgeShape> for Shape {
    fn from(s: EdgeShape) -> Self {
        Shape::Edge(s)
    }
}

impl From<ChainShape> for Shape {
    fn from(s: ChainShape) -> Self {
        Shape::Chain(s)
    }
}
