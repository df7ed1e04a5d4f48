//! GJK distance between convex shapes, with a simplex cache so repeated
//! queries on the same pair (contact persistence, TOI advancement) converge
//! in very few iterations.

use glam::Vec2;

use crate::collision::shapes::Shape;
use crate::math::{Transform2, cross};

/// A convex point cloud plus skin radius, extracted from one shape child.
#[derive(Debug, Clone, Default)]
pub struct DistanceProxy {
    pub vertices: Vec<Vec2>,
    pub radius: f32,
}

impl DistanceProxy {
    pub fn from_shape(shape: &Shape, child_index: usize) -> Self {
        match shape {
            Shape::Circle(c) => DistanceProxy {
                vertices: vec![c.position],
                radius: c.radius,
            },
            Shape::Polygon(p) => DistanceProxy {
                vertices: p.vertices.clone(),
                radius: p.radius,
            },
            Shape::Edge(e) => DistanceProxy {
                vertices: vec![e.vertex1, e.vertex2],
                radius: e.radius,
            },
            Shape::Chain(c) => {
                let edge = c.child_edge(child_index);
                DistanceProxy {
                    vertices: vec![edge.vertex1, edge.vertex2],
                    radius: c.radius,
                }
            }
        }
    }

    /// Index of the vertex most extreme in direction `d`.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best = 0;
        let mut best_value = self.vertices[0].dot(d);
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best = i;
                best_value = value;
            }
        }
        best
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }
}

/// Witness-point indices carried across calls to warm-start the simplex.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplexCache {
    /// Length or area of the cached simplex, used to detect staleness.
    pub metric: f32,
    pub count: usize,
    pub index_a: [usize; 3],
    pub index_b: [usize; 3],
}

#[derive(Debug, Clone)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform2,
    pub transform_b: Transform2,
    /// Subtract the skin radii from the result.
    pub use_radii: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceOutput {
    /// Closest point on proxy A, world space.
    pub point_a: Vec2,
    /// Closest point on proxy B, world space.
    pub point_b: Vec2,
    pub distance: f32,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point on proxy A, world space.
    w_a: Vec2,
    /// Support point on proxy B, world space.
    w_b: Vec2,
    /// w_b - w_a
    w: Vec2,
    /// Barycentric weight.
    a: f32,
    index_a: usize,
    index_b: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        &mut self,
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform2,
        proxy_b: &DistanceProxy,
        xf_b: &Transform2,
    ) {
        debug_assert!(cache.count <= 3);

        self.count = cache.count;
        for i in 0..self.count {
            let v = &mut self.v[i];
            v.index_a = cache.index_a[i];
            v.index_b = cache.index_b[i];
            v.w_a = xf_a.apply(proxy_a.vertex(v.index_a));
            v.w_b = xf_b.apply(proxy_b.vertex(v.index_b));
            v.w = v.w_b - v.w_a;
            v.a = 0.0;
        }

        // If the cached simplex is too distorted relative to the new
        // transforms, discard it.
        if self.count > 1 {
            let metric1 = cache.metric;
            let metric2 = self.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                self.count = 0;
            }
        }

        if self.count == 0 {
            let v = &mut self.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = xf_a.apply(proxy_a.vertex(0));
            v.w_b = xf_b.apply(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            v.a = 1.0;
            self.count = 1;
        }
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a;
            cache.index_b[i] = self.v[i].index_b;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    Vec2::new(-e12.y, e12.x)
                } else {
                    Vec2::new(e12.y, -e12.x)
                }
            }
            _ => {
                debug_assert!(false);
                Vec2::ZERO
            }
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].a * self.v[0].w + self.v[1].a * self.v[1].w,
            3 => Vec2::ZERO,
            _ => {
                debug_assert!(false);
                Vec2::ZERO
            }
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].w_a, self.v[0].w_b),
            2 => (
                self.v[0].a * self.v[0].w_a + self.v[1].a * self.v[1].w_a,
                self.v[0].a * self.v[0].w_b + self.v[1].a * self.v[1].w_b,
            ),
            3 => {
                let p = self.v[0].a * self.v[0].w_a
                    + self.v[1].a * self.v[1].w_a
                    + self.v[2].a * self.v[2].w_a;
                (p, p)
            }
            _ => {
                debug_assert!(false);
                (Vec2::ZERO, Vec2::ZERO)
            }
        }
    }

    fn metric(&self) -> f32 {
        match self.count {
            1 => 0.0,
            2 => (self.v[1].w - self.v[0].w).length(),
            3 => cross(self.v[1].w - self.v[0].w, self.v[2].w - self.v[0].w),
            _ => {
                debug_assert!(false);
                0.0
            }
        }
    }

    /// Closest point on segment w1-w2 to the origin, expressed in
    /// barycentric coordinates.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // Interior.
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest point on triangle w1-w2-w3 to the origin. Voronoi region
    /// analysis with pre-computed edge barycentrics.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12 region
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13 region
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23 region
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Origin is inside the triangle.
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

const MAX_GJK_ITERATIONS: usize = 20;

/// Compute the distance and closest points between two convex proxies.
/// `cache` carries witness indices between calls; zero-initialize it for a
/// cold query.
pub fn compute_distance(input: &DistanceInput, cache: &mut SimplexCache) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = &input.transform_a;
    let xf_b = &input.transform_b;

    let mut simplex = Simplex::default();
    simplex.read_cache(cache, proxy_a, xf_a, proxy_b, xf_b);

    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < MAX_GJK_ITERATIONS {
        // Copy the simplex so we can detect duplicate support points.
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            1 => {}
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => debug_assert!(false),
        }

        // The origin is enclosed: overlap.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            // The origin is on an edge or vertex of the simplex; witness
            // points from here are still usable, termination from a
            // degenerate direction is not an overlap verdict.
            break;
        }

        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = proxy_a.support(xf_a.q.inv_rotate(-d));
        vertex.w_a = xf_a.apply(proxy_a.vertex(vertex.index_a));
        vertex.index_b = proxy_b.support(xf_b.q.inv_rotate(d));
        vertex.w_b = xf_b.apply(proxy_b.vertex(vertex.index_b));
        vertex.w = vertex.w_b - vertex.w_a;

        iter += 1;

        // A repeated support point means no further progress is possible.
        let mut duplicate = false;
        for i in 0..save_count {
            if vertex.index_a == save_a[i] && vertex.index_b == save_b[i] {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            break;
        }

        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut distance = (point_a - point_b).length();
    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;

        if distance > r_a + r_b && distance > f32::EPSILON {
            // Shapes are still not overlapping; shrink the witness points
            // onto the skinned surfaces.
            distance -= r_a + r_b;
            let normal = (point_b - point_a).normalize();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            // The skinned shapes overlap.
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            distance = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance,
        iterations: iter,
    }
}

/// Precise overlap test for two shape children, including skin radii.
pub fn test_overlap(
    shape_a: &Shape,
    index_a: usize,
    shape_b: &Shape,
    index_b: usize,
    xf_a: &Transform2,
    xf_b: &Transform2,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::from_shape(shape_a, index_a),
        proxy_b: DistanceProxy::from_shape(shape_b, index_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = compute_distance(&input, &mut cache);
    output.distance < 10.0 * f32::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{CircleShape, PolygonShape};
    use approx::assert_relative_eq;
    use glam::Vec2;

    fn distance_between(
        a: &Shape,
        xf_a: Transform2,
        b: &Shape,
        xf_b: Transform2,
        use_radii: bool,
    ) -> DistanceOutput {
        let input = DistanceInput {
            proxy_a: DistanceProxy::from_shape(a, 0),
            proxy_b: DistanceProxy::from_shape(b, 0),
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii,
        };
        let mut cache = SimplexCache::default();
        compute_distance(&input, &mut cache)
    }

    #[test]
    fn circle_circle_distance_is_center_gap_minus_radii() {
        let a: Shape = CircleShape::new(1.0).unwrap().into();
        let b: Shape = CircleShape::new(0.5).unwrap().into();
        let out = distance_between(
            &a,
            Transform2::IDENTITY,
            &b,
            Transform2::new(Vec2::new(5.0, 0.0), 0.0),
            true,
        );
        assert_relative_eq!(out.distance, 5.0 - 1.5, epsilon = 1e-4);
    }

    #[test]
    fn separated_boxes_distance_matches_gap() {
        let a: Shape = PolygonShape::rect(0.5, 0.5).into();
        let b: Shape = PolygonShape::rect(0.5, 0.5).into();
        let out = distance_between(
            &a,
            Transform2::IDENTITY,
            &b,
            Transform2::new(Vec2::new(3.0, 0.0), 0.0),
            false,
        );
        assert_relative_eq!(out.distance, 2.0, epsilon = 1e-4);
        assert_relative_eq!(out.point_a.x, 0.5, epsilon = 1e-4);
        assert_relative_eq!(out.point_b.x, 2.5, epsilon = 1e-4);
    }

    #[test]
    fn diagonal_box_gap_uses_corner_witnesses() {
        let a: Shape = PolygonShape::rect(0.5, 0.5).into();
        let b: Shape = PolygonShape::rect(0.5, 0.5).into();
        let out = distance_between(
            &a,
            Transform2::IDENTITY,
            &b,
            Transform2::new(Vec2::new(2.0, 2.0), 0.0),
            false,
        );
        let expected = (2.0f32.powi(2) * 2.0).sqrt() - (0.5f32.powi(2) * 2.0).sqrt() * 2.0;
        assert_relative_eq!(out.distance, expected, epsilon = 1e-3);
    }

    #[test]
    fn overlapping_shapes_report_zero_with_radii() {
        let a: Shape = CircleShape::new(1.0).unwrap().into();
        let b: Shape = CircleShape::new(1.0).unwrap().into();
        let out = distance_between(
            &a,
            Transform2::IDENTITY,
            &b,
            Transform2::new(Vec2::new(1.0, 0.0), 0.0),
            true,
        );
        assert_eq!(out.distance, 0.0);
    }

    #[test]
    fn warm_cache_converges_faster_on_second_query() {
        let a: Shape = PolygonShape::rect(0.5, 0.5).into();
        let b: Shape = PolygonShape::rect(0.5, 0.5).into();
        let input = DistanceInput {
            proxy_a: DistanceProxy::from_shape(&a, 0),
            proxy_b: DistanceProxy::from_shape(&b, 0),
            transform_a: Transform2::IDENTITY,
            transform_b: Transform2::new(Vec2::new(3.0, 1.0), 0.3),
            use_radii: false,
        };
        let mut cache = SimplexCache::default();
        let cold = compute_distance(&input, &mut cache);
        let warm = compute_distance(&input, &mut cache);
        assert_relative_eq!(cold.distance, warm.distance, epsilon = 1e-5);
        assert!(warm.iterations <= cold.iterations);
    }

    #[test]
    fn test_overlap_agrees_with_geometry() {
        let a: Shape = PolygonShape::rect(0.5, 0.5).into();
        let b: Shape = PolygonShape::rect(0.5, 0.5).into();
        let touching = Transform2::new(Vec2::new(0.9, 0.0), 0.0);
        let apart = Transform2::new(Vec2::new(2.5, 0.0), 0.0);
        assert!(test_overlap(&a, 0, &b, 0, &Transform2::IDENTITY, &touching));
        assert!(!test_overlap(&a, 0, &b, 0, &Transform2::IDENTITY, &apart));
    }
}
