use glam::Vec2;

use crate::collision::aabb::Aabb;
use crate::collision::shapes::MassData;
use crate::collision::{RayCastInput, RayCastOutput};
use crate::error::PhysicsError;
use crate::math::Transform2;

/// A solid circle with a local-space center offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleShape {
    pub radius: f32,
    pub position: Vec2,
}

impl CircleShape {
    pub fn new(radius: f32) -> Result<Self, PhysicsError> {
        Self::with_offset(radius, Vec2::ZERO)
    }

    pub fn with_offset(radius: f32, position: Vec2) -> Result<Self, PhysicsError> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(PhysicsError::InvalidRadius(radius));
        }
        Ok(CircleShape { radius, position })
    }

    pub fn compute_aabb(&self, xf: &Transform2) -> Aabb {
        let center = xf.apply(self.position);
        Aabb {
            min: center - Vec2::splat(self.radius),
            max: center + Vec2::splat(self.radius),
        }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        let mass = density * std::f32::consts::PI * self.radius * self.radius;
        MassData {
            mass,
            center: self.position,
            // Inertia about the local origin via parallel axis.
            inertia: mass * (0.5 * self.radius * self.radius + self.position.dot(self.position)),
        }
    }

    pub fn test_point(&self, xf: &Transform2, point: Vec2) -> bool {
        let center = xf.apply(self.position);
        let d = point - center;
        d.dot(d) <= self.radius * self.radius
    }

    /// From Real-time Collision Detection, p179: solve the quadratic for the
    /// ray/circle entry point.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform2) -> Option<RayCastOutput> {
        let position = xf.apply(self.position);
        let s = input.p1 - position;
        let b = s.dot(s) - self.radius * self.radius;

        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.dot(r);
        let sigma = c * c - rr * b;

        if sigma < 0.0 || rr < f32::EPSILON {
            return None;
        }

        let mut t = -(c + sigma.sqrt());
        if 0.0 <= t && t <= input.max_fraction * rr {
            t /= rr;
            return Some(RayCastOutput {
                fraction: t,
                normal: (s + t * r).normalize_or_zero(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_non_positive_radius() {
        assert!(CircleShape::new(0.0).is_err());
        assert!(CircleShape::new(-1.0).is_err());
        assert!(CircleShape::new(f32::NAN).is_err());
    }

    #[test]
    fn mass_of_unit_circle() {
        let circle = CircleShape::new(1.0).unwrap();
        let data = circle.compute_mass(2.0);
        assert_relative_eq!(data.mass, 2.0 * std::f32::consts::PI, epsilon = 1e-5);
        assert_relative_eq!(data.inertia, data.mass * 0.5, epsilon = 1e-5);
        assert_eq!(data.center, Vec2::ZERO);
    }

    #[test]
    fn offset_circle_inertia_uses_parallel_axis() {
        let r = 0.5;
        let offset = Vec2::new(2.0, 0.0);
        let circle = CircleShape::with_offset(r, offset).unwrap();
        let data = circle.compute_mass(1.0);
        let expected = data.mass * (0.5 * r * r + offset.dot(offset));
        assert_relative_eq!(data.inertia, expected, epsilon = 1e-5);
    }

    #[test]
    fn point_test_respects_transform() {
        let circle = CircleShape::new(1.0).unwrap();
        let xf = Transform2::new(Vec2::new(5.0, 0.0), 0.0);
        assert!(circle.test_point(&xf, Vec2::new(5.5, 0.0)));
        assert!(!circle.test_point(&xf, Vec2::new(3.5, 0.0)));
    }

    #[test]
    fn ray_cast_hits_front_of_circle() {
        let circle = CircleShape::new(1.0).unwrap();
        let xf = Transform2::new(Vec2::new(3.0, 0.0), 0.0);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = circle.ray_cast(&input, &xf).expect("should hit");
        assert_relative_eq!(hit.fraction, 0.2, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn ray_starting_inside_reports_no_hit() {
        let circle = CircleShape::new(1.0).unwrap();
        let xf = Transform2::IDENTITY;
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        assert!(circle.ray_cast(&input, &xf).is_none());
    }
}
