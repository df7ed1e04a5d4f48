use glam::Vec2;

use crate::collision::aabb::Aabb;
use crate::collision::{RayCastInput, RayCastOutput};
use crate::math::Transform2;
use crate::settings::POLYGON_RADIUS;

/// A line segment. Optional adjacent ("ghost") vertices extend the segment
/// logically so that chains of edges collide smoothly: contact normals are
/// clamped against the neighboring segments instead of snagging on interior
/// vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeShape {
    pub vertex1: Vec2,
    pub vertex2: Vec2,
    /// Ghost vertex preceding `vertex1`.
    pub vertex0: Option<Vec2>,
    /// Ghost vertex following `vertex2`.
    pub vertex3: Option<Vec2>,
    pub radius: f32,
}

impl EdgeShape {
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        EdgeShape {
            vertex1: v1,
            vertex2: v2,
            vertex0: None,
            vertex3: None,
            radius: POLYGON_RADIUS,
        }
    }

    pub fn with_ghosts(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> Self {
        EdgeShape {
            vertex1: v1,
            vertex2: v2,
            vertex0: Some(v0),
            vertex3: Some(v3),
            radius: POLYGON_RADIUS,
        }
    }

    pub fn compute_aabb(&self, xf: &Transform2) -> Aabb {
        let v1 = xf.apply(self.vertex1);
        let v2 = xf.apply(self.vertex2);
        let r = Vec2::splat(self.radius);
        Aabb {
            min: v1.min(v2) - r,
            max: v1.max(v2) + r,
        }
    }

    /// p = p1 + t * d, v = v1 + s * e
    /// p1 + t * d = v1 + s * e
    /// s * e - t * d = p1 - v1
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform2) -> Option<RayCastOutput> {
        // Put the ray into the edge's frame of reference.
        let p1 = xf.apply_inv(input.p1);
        let p2 = xf.apply_inv(input.p2);
        let d = p2 - p1;

        let v1 = self.vertex1;
        let v2 = self.vertex2;
        let e = v2 - v1;
        let normal = Vec2::new(e.y, -e.x).normalize_or_zero();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        let numerator = normal.dot(v1 - p1);
        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + t * d;

        // q = v1 + s * r, s in [0,1]
        let rr = e.dot(e);
        if rr == 0.0 {
            return None;
        }
        let s = (q - v1).dot(e) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let normal = if numerator > 0.0 { -normal } else { normal };
        Some(RayCastOutput {
            fraction: t,
            normal: xf.q.rotate(normal),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ray_perpendicular_hit() {
        let edge = EdgeShape::new(Vec2::new(-1.0, 1.0), Vec2::new(1.0, 1.0));
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(0.0, 2.0),
            max_fraction: 1.0,
        };
        let hit = edge.ray_cast(&input, &Transform2::IDENTITY).expect("hit");
        assert_relative_eq!(hit.fraction, 0.5, epsilon = 1e-5);
        // Normal faces back toward the ray origin.
        assert_relative_eq!(hit.normal.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn ray_beyond_segment_end_misses() {
        let edge = EdgeShape::new(Vec2::new(-1.0, 1.0), Vec2::new(1.0, 1.0));
        let input = RayCastInput {
            p1: Vec2::new(2.0, 0.0),
            p2: Vec2::new(2.0, 2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&input, &Transform2::IDENTITY).is_none());
    }

    #[test]
    fn aabb_covers_segment_with_skin() {
        let edge = EdgeShape::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 1.0));
        let aabb = edge.compute_aabb(&Transform2::IDENTITY);
        assert!(aabb.min.x <= 0.0 && aabb.max.x >= 2.0);
        assert!(aabb.min.y <= 0.0 && aabb.max.y >= 1.0);
    }
}
