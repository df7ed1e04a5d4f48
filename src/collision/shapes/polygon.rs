use glam::Vec2;

use crate::collision::aabb::Aabb;
use crate::collision::shapes::MassData;
use crate::collision::{RayCastInput, RayCastOutput};
use crate::error::PhysicsError;
use crate::math::{Transform2, cross};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};

/// A solid convex polygon with at most [`MAX_POLYGON_VERTICES`] vertices in
/// counter-clockwise order. Construction computes the convex hull of the
/// input points, so callers may pass unordered or slightly redundant point
/// sets.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonShape {
    pub vertices: Vec<Vec2>,
    pub normals: Vec<Vec2>,
    pub centroid: Vec2,
    pub radius: f32,
}

impl PolygonShape {
    pub fn new(points: &[Vec2]) -> Result<Self, PhysicsError> {
        if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
            return Err(PhysicsError::InvalidPolygonVertexCount(points.len()));
        }

        // Weld nearly-coincident points before hulling; duplicate input
        // vertices would produce zero-length edges.
        let weld_tol_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut unique: Vec<Vec2> = Vec::with_capacity(points.len());
        for &p in points {
            if unique.iter().all(|&q| (p - q).length_squared() > weld_tol_sq) {
                unique.push(p);
            }
        }
        if unique.len() < 3 {
            return Err(PhysicsError::DegeneratePolygon);
        }

        let vertices = convex_hull(&unique)?;

        let n = vertices.len();
        let mut normals = Vec::with_capacity(n);
        for i in 0..n {
            let edge = vertices[(i + 1) % n] - vertices[i];
            debug_assert!(edge.length_squared() > f32::EPSILON * f32::EPSILON);
            normals.push(Vec2::new(edge.y, -edge.x).normalize());
        }

        let centroid = compute_centroid(&vertices);

        Ok(PolygonShape {
            vertices,
            normals,
            centroid,
            radius: POLYGON_RADIUS,
        })
    }

    /// Axis-aligned box with the given half extents, centered on the origin.
    pub fn rect(half_width: f32, half_height: f32) -> Self {
        PolygonShape {
            vertices: vec![
                Vec2::new(-half_width, -half_height),
                Vec2::new(half_width, -half_height),
                Vec2::new(half_width, half_height),
                Vec2::new(-half_width, half_height),
            ],
            normals: vec![Vec2::NEG_Y, Vec2::X, Vec2::Y, Vec2::NEG_X],
            centroid: Vec2::ZERO,
            radius: POLYGON_RADIUS,
        }
    }

    /// A box offset and rotated in body-local space.
    pub fn rect_at(half_width: f32, half_height: f32, center: Vec2, angle: f32) -> Self {
        let mut shape = Self::rect(half_width, half_height);
        shape.centroid = center;
        let xf = Transform2::new(center, angle);
        for v in &mut shape.vertices {
            *v = xf.apply(*v);
        }
        for n in &mut shape.normals {
            *n = xf.q.rotate(*n);
        }
        shape
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn compute_aabb(&self, xf: &Transform2) -> Aabb {
        let mut min = xf.apply(self.vertices[0]);
        let mut max = min;
        for &v in &self.vertices[1..] {
            let p = xf.apply(v);
            min = min.min(p);
            max = max.max(p);
        }
        let r = Vec2::splat(self.radius);
        Aabb {
            min: min - r,
            max: max + r,
        }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        // Triangle decomposition relative to a reference point inside the
        // polygon, accumulating area, first moment and second moment.
        let n = self.vertices.len();
        let mut center = Vec2::ZERO;
        let mut area = 0.0;
        let mut inertia = 0.0;

        let mut s = Vec2::ZERO;
        for &v in &self.vertices {
            s += v;
        }
        s /= n as f32;

        const K_INV3: f32 = 1.0 / 3.0;
        for i in 0..n {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[(i + 1) % n] - s;

            let d = cross(e1, e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;
            center += triangle_area * K_INV3 * (e1 + e2);

            let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * K_INV3 * d) * (intx2 + inty2);
        }

        let mass = density * area;
        debug_assert!(area > f32::EPSILON);
        center *= 1.0 / area;
        let centroid = center + s;

        // Shift inertia from the reference point to the local origin.
        let inertia =
            density * inertia + mass * (centroid.dot(centroid) - center.dot(center));

        MassData {
            mass,
            center: centroid,
            inertia,
        }
    }

    pub fn test_point(&self, xf: &Transform2, point: Vec2) -> bool {
        let local = xf.apply_inv(point);
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(&v, &n)| n.dot(local - v) <= 0.0)
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform2) -> Option<RayCastOutput> {
        // Work in local space.
        let p1 = xf.apply_inv(input.p1);
        let p2 = xf.apply_inv(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0;
        let mut upper = input.max_fraction;
        let mut index = None;

        for i in 0..self.vertices.len() {
            // p = p1 + t * d
            // dot(normal, p - v) = 0 => dot(normal, p1 - v) + t * dot(normal, d) = 0
            let numerator = self.normals[i].dot(self.vertices[i] - p1);
            let denominator = self.normals[i].dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // Increase lower: the segment enters this half-plane.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // Decrease upper: the segment exits this half-plane.
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        debug_assert!((0.0..=input.max_fraction).contains(&lower));

        index.map(|i| RayCastOutput {
            fraction: lower,
            normal: xf.q.rotate(self.normals[i]),
        })
    }
}

fn compute_centroid(vertices: &[Vec2]) -> Vec2 {
    let n = vertices.len();
    let mut c = Vec2::ZERO;
    let mut area = 0.0;

    // Reference point for forming triangles; the first vertex keeps the
    // intermediate terms small.
    let origin = vertices[0];
    const K_INV3: f32 = 1.0 / 3.0;

    for i in 1..n - 1 {
        let e1 = vertices[i] - origin;
        let e2 = vertices[i + 1] - origin;
        let triangle_area = 0.5 * cross(e1, e2);
        area += triangle_area;
        c += triangle_area * K_INV3 * (e1 + e2);
    }

    debug_assert!(area > f32::EPSILON);
    c * (1.0 / area) + origin
}

/// Gift-wrap convex hull in counter-clockwise order. Rejects hulls that
/// collapse below 3 vertices.
fn convex_hull(points: &[Vec2]) -> Result<Vec<Vec2>, PhysicsError> {
    // Rightmost (then lowest) point is certainly on the hull.
    let mut i0 = 0;
    for (i, p) in points.iter().enumerate().skip(1) {
        let best = points[i0];
        if p.x > best.x || (p.x == best.x && p.y < best.y) {
            i0 = i;
        }
    }

    let mut hull: Vec<usize> = Vec::with_capacity(points.len());
    let mut ih = i0;
    loop {
        hull.push(ih);

        let mut ie = 0;
        for j in 1..points.len() {
            if ie == ih {
                ie = j;
                continue;
            }
            let r = points[ie] - points[ih];
            let v = points[j] - points[ih];
            let c = cross(r, v);
            if c < 0.0 || (c == 0.0 && v.length_squared() > r.length_squared()) {
                ie = j;
            }
        }

        ih = ie;
        if ie == i0 {
            break;
        }
        if hull.len() > points.len() {
            // All points collinear never terminates otherwise.
            return Err(PhysicsError::DegeneratePolygon);
        }
    }

    if hull.len() < 3 {
        return Err(PhysicsError::DegeneratePolygon);
    }

    Ok(hull.into_iter().map(|i| points[i]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn box_mass_matches_analytic_formula() {
        let shape = PolygonShape::rect(0.5, 0.5);
        let data = shape.compute_mass(1.0);
        assert_relative_eq!(data.mass, 1.0, epsilon = 1e-5);
        assert_relative_eq!(data.center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(data.center.y, 0.0, epsilon = 1e-5);
        // I = m * (w^2 + h^2) / 12 for a box about its centroid.
        assert_relative_eq!(data.inertia, 1.0 * (1.0 + 1.0) / 12.0, epsilon = 1e-4);
    }

    #[test]
    fn hull_reorders_and_discards_interior_points() {
        let points = [
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(0.5, 0.4), // interior
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ];
        let shape = PolygonShape::new(&points).unwrap();
        assert_eq!(shape.vertex_count(), 4);
        // Counter-clockwise winding: positive signed area.
        let mut area = 0.0;
        let n = shape.vertices.len();
        for i in 0..n {
            area += cross(shape.vertices[i], shape.vertices[(i + 1) % n]);
        }
        assert!(area > 0.0);
    }

    #[test]
    fn collinear_points_are_rejected() {
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 2.0),
        ];
        assert_eq!(
            PolygonShape::new(&points),
            Err(PhysicsError::DegeneratePolygon)
        );
    }

    #[test]
    fn coincident_points_are_welded() {
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ];
        let shape = PolygonShape::new(&points).unwrap();
        assert_eq!(shape.vertex_count(), 3);
    }

    #[test]
    fn too_few_or_too_many_vertices_rejected() {
        let two = [Vec2::ZERO, Vec2::X];
        assert!(matches!(
            PolygonShape::new(&two),
            Err(PhysicsError::InvalidPolygonVertexCount(2))
        ));
        let many: Vec<Vec2> = (0..9)
            .map(|i| {
                let a = i as f32 / 9.0 * std::f32::consts::TAU;
                Vec2::new(a.cos(), a.sin())
            })
            .collect();
        assert!(matches!(
            PolygonShape::new(&many),
            Err(PhysicsError::InvalidPolygonVertexCount(9))
        ));
    }

    #[test]
    fn test_point_inside_and_outside() {
        let shape = PolygonShape::rect(1.0, 1.0);
        let xf = Transform2::new(Vec2::new(10.0, 0.0), 0.0);
        assert!(shape.test_point(&xf, Vec2::new(10.5, 0.5)));
        assert!(!shape.test_point(&xf, Vec2::new(12.5, 0.0)));
    }

    #[test]
    fn ray_cast_hits_left_face() {
        let shape = PolygonShape::rect(1.0, 1.0);
        let xf = Transform2::new(Vec2::new(5.0, 0.0), 0.0);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = shape.ray_cast(&input, &xf).expect("should hit");
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn offset_box_centroid() {
        let shape = PolygonShape::rect_at(0.5, 0.5, Vec2::new(2.0, 3.0), 0.0);
        let data = shape.compute_mass(1.0);
        assert_relative_eq!(data.center.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(data.center.y, 3.0, epsilon = 1e-5);
    }
}
