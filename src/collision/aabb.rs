use glam::Vec2;

use crate::collision::RayCastInput;

/// Axis-aligned bounding box. Valid when `min <= max` componentwise; the
/// collision pipeline only constructs valid boxes, and validity is asserted
/// in debug builds rather than checked at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        let aabb = Aabb { min, max };
        debug_assert!(aabb.is_valid());
        aabb
    }

    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && self.min.is_finite() && self.max.is_finite()
    }

    pub fn center(&self) -> Vec2 {
        0.5 * (self.min + self.max)
    }

    pub fn extents(&self) -> Vec2 {
        0.5 * (self.max - self.min)
    }

    /// Perimeter of the box. The dynamic tree uses this as its surface-area
    /// cost heuristic.
    pub fn perimeter(&self) -> f32 {
        let d = self.max - self.min;
        2.0 * (d.x + d.y)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d1 = other.min - self.max;
        let d2 = self.min - other.max;
        d1.x <= 0.0 && d1.y <= 0.0 && d2.x <= 0.0 && d2.y <= 0.0
    }

    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// Slab-test ray cast against the box. Returns the entry fraction in
    /// `[0, input.max_fraction]`, or `None` when the segment misses.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<f32> {
        let mut tmin = f32::MIN;
        let mut tmax = f32::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;

        for i in 0..2 {
            let (di, pi, lo, hi) = if i == 0 {
                (d.x, p.x, self.min.x, self.max.x)
            } else {
                (d.y, p.y, self.min.y, self.max.y)
            };

            if di.abs() < f32::EPSILON {
                // Parallel to this slab.
                if pi < lo || hi < pi {
                    return None;
                }
            } else {
                let inv_d = 1.0 / di;
                let mut t1 = (lo - pi) * inv_d;
                let mut t2 = (hi - pi) * inv_d;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                tmin = tmin.max(t1);
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }

        // The intersection must lie on the segment, not just the line.
        if tmin < 0.0 || input.max_fraction < tmin {
            return None;
        }
        Some(tmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn aabb(min: (f32, f32), max: (f32, f32)) -> Aabb {
        Aabb::new(Vec2::new(min.0, min.1), Vec2::new(max.0, max.1))
    }

    #[test]
    fn union_covers_both() {
        let a = aabb((0.0, 0.0), (1.0, 1.0));
        let b = aabb((2.0, -1.0), (3.0, 0.5));
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_eq!(u.min, Vec2::new(0.0, -1.0));
        assert_eq!(u.max, Vec2::new(3.0, 1.0));
    }

    #[test]
    fn overlap_is_inclusive_of_touching_edges() {
        let a = aabb((0.0, 0.0), (1.0, 1.0));
        let b = aabb((1.0, 0.0), (2.0, 1.0));
        let c = aabb((1.1, 0.0), (2.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn perimeter_of_unit_box() {
        assert_relative_eq!(aabb((0.0, 0.0), (1.0, 1.0)).perimeter(), 4.0);
    }

    #[test]
    fn ray_hits_box_front_face() {
        let b = aabb((1.0, -1.0), (2.0, 1.0));
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(4.0, 0.0),
            max_fraction: 1.0,
        };
        let t = b.ray_cast(&input).expect("ray should hit");
        assert_relative_eq!(t, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn ray_misses_box_behind_origin() {
        let b = aabb((-3.0, -1.0), (-2.0, 1.0));
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(4.0, 0.0),
            max_fraction: 1.0,
        };
        assert!(b.ray_cast(&input).is_none());
    }

    #[test]
    fn ray_parallel_to_slab_outside_misses() {
        let b = aabb((0.0, 1.0), (4.0, 2.0));
        let input = RayCastInput {
            p1: Vec2::new(-1.0, 0.0),
            p2: Vec2::new(5.0, 0.0),
            max_fraction: 1.0,
        };
        assert!(b.ray_cast(&input).is_none());
    }

    #[test]
    fn ray_clipped_by_max_fraction() {
        let b = aabb((2.0, -1.0), (3.0, 1.0));
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(4.0, 0.0),
            max_fraction: 0.25,
        };
        assert!(b.ray_cast(&input).is_none());
    }
}
