//! Narrow phase manifold generation. Each shape-pair combination has its own
//! collider; polygon pairs use SAT with reference-face clipping, edges use
//! the ghost-vertex gauss-map filtering so chains collide smoothly.

use glam::Vec2;

use crate::collision::manifold::{
    ClipVertex, ContactFeature, FeatureType, Manifold, ManifoldType, clip_segment_to_line,
};
use crate::collision::shapes::{CircleShape, EdgeShape, PolygonShape, Shape};
use crate::math::{Transform2, cross};
use crate::settings::{LINEAR_SLOP, MAX_MANIFOLD_POINTS};

/// Evaluate the manifold for an ordered shape pair. The contact manager
/// guarantees shape A has the higher collider rank (edge/chain before
/// polygon before circle), so only these combinations appear.
pub fn evaluate(
    manifold: &mut Manifold,
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform2,
    shape_b: &Shape,
    _child_b: usize,
    xf_b: &Transform2,
) {
    manifold.point_count = 0;

    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(manifold, a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => {
            collide_polygon_and_circle(manifold, a, xf_a, b, xf_b)
        }
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(manifold, a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Circle(b)) => collide_edge_and_circle(manifold, a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_and_polygon(manifold, a, xf_a, b, xf_b),
        (Shape::Chain(a), Shape::Circle(b)) => {
            let edge = a.child_edge(child_a);
            collide_edge_and_circle(manifold, &edge, xf_a, b, xf_b)
        }
        (Shape::Chain(a), Shape::Polygon(b)) => {
            let edge = a.child_edge(child_a);
            collide_edge_and_polygon(manifold, &edge, xf_a, b, xf_b)
        }
        // Edge/chain vs edge/chain has no collision response.
        _ => {}
    }
}

/// Collider precedence: pairs are normalized so the reference-capable shape
/// comes first.
pub fn rank(shape: &Shape) -> u8 {
    match shape {
        Shape::Circle(_) => 0,
        Shape::Polygon(_) => 1,
        Shape::Edge(_) => 2,
        Shape::Chain(_) => 3,
    }
}

/// Whether a shape pair produces any manifold at all.
pub fn pair_supported(shape_a: &Shape, shape_b: &Shape) -> bool {
    // Hollow one-sided shapes cannot collide with each other.
    !(rank(shape_a) >= 2 && rank(shape_b) >= 2)
}

pub fn collide_circles(
    manifold: &mut Manifold,
    circle_a: &CircleShape,
    xf_a: &Transform2,
    circle_b: &CircleShape,
    xf_b: &Transform2,
) {
    let p_a = xf_a.apply(circle_a.position);
    let p_b = xf_b.apply(circle_b.position);

    let d = p_b - p_a;
    let dist_sqr = d.dot(d);
    let radius = circle_a.radius + circle_b.radius;
    if dist_sqr > radius * radius {
        return;
    }

    manifold.manifold_type = ManifoldType::Circles;
    manifold.local_point = circle_a.position;
    manifold.local_normal = Vec2::ZERO;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactFeature::default();
}

pub fn collide_polygon_and_circle(
    manifold: &mut Manifold,
    polygon_a: &PolygonShape,
    xf_a: &Transform2,
    circle_b: &CircleShape,
    xf_b: &Transform2,
) {
    // Circle center in the polygon's frame.
    let c = xf_b.apply(circle_b.position);
    let c_local = xf_a.apply_inv(c);

    let radius = polygon_a.radius + circle_b.radius;
    let count = polygon_a.vertex_count();

    // Face of maximum separation.
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    for i in 0..count {
        let s = polygon_a.normals[i].dot(c_local - polygon_a.vertices[i]);
        if s > radius {
            return;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let v1 = polygon_a.vertices[normal_index];
    let v2 = polygon_a.vertices[(normal_index + 1) % count];

    if separation < f32::EPSILON {
        // Center is inside the polygon.
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = polygon_a.normals[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id = ContactFeature::default();
        return;
    }

    // Voronoi regions of the reference face.
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    let (local_point, local_normal) = if u1 <= 0.0 {
        if (c_local - v1).length_squared() > radius * radius {
            return;
        }
        (v1, (c_local - v1).normalize())
    } else if u2 <= 0.0 {
        if (c_local - v2).length_squared() > radius * radius {
            return;
        }
        (v2, (c_local - v2).normalize())
    } else {
        let face_center = 0.5 * (v1 + v2);
        if (c_local - face_center).dot(polygon_a.normals[normal_index]) > radius {
            return;
        }
        (face_center, polygon_a.normals[normal_index])
    };

    manifold.point_count = 1;
    manifold.manifold_type = ManifoldType::FaceA;
    manifold.local_normal = local_normal;
    manifold.local_point = local_point;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactFeature::default();
}

/// Maximum separation of poly2's hull from poly1's faces, and the face that
/// attains it.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform2,
    poly2: &PolygonShape,
    xf2: &Transform2,
) -> (f32, usize) {
    let count1 = poly1.vertex_count();
    let count2 = poly2.vertex_count();
    let xf = xf2.mul_t(xf1);

    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for i in 0..count1 {
        // poly1's face normal and vertex in poly2's frame.
        let n = xf.q.rotate(poly1.normals[i]);
        let v1 = xf.apply(poly1.vertices[i]);

        let mut si = f32::MAX;
        for j in 0..count2 {
            let sij = n.dot(poly2.vertices[j] - v1);
            si = si.min(sij);
        }

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (max_separation, best_index)
}

fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform2,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform2,
) -> [ClipVertex; 2] {
    let normals1 = &poly1.normals;
    let count2 = poly2.vertex_count();

    debug_assert!(edge1 < poly1.vertex_count());

    // Reference normal in poly2's frame.
    let normal1 = xf2.q.inv_rotate(xf1.q.rotate(normals1[edge1]));

    // Most anti-parallel face on poly2.
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for i in 0..count2 {
        let dot = normal1.dot(poly2.normals[i]);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = (i1 + 1) % count2;

    [
        ClipVertex {
            v: xf2.apply(poly2.vertices[i1]),
            id: ContactFeature::new(edge1 as u8, i1 as u8, FeatureType::Face, FeatureType::Vertex),
        },
        ClipVertex {
            v: xf2.apply(poly2.vertices[i2]),
            id: ContactFeature::new(edge1 as u8, i2 as u8, FeatureType::Face, FeatureType::Vertex),
        },
    ]
}

pub fn collide_polygons(
    manifold: &mut Manifold,
    poly_a: &PolygonShape,
    xf_a: &Transform2,
    poly_b: &PolygonShape,
    xf_b: &Transform2,
) {
    let total_radius = poly_a.radius + poly_b.radius;

    let (separation_a, edge_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return;
    }

    let (separation_b, edge_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return;
    }

    // Small hysteresis toward face A keeps the reference face stable across
    // steps, which keeps contact ids stable for warm starting.
    const K_TOL: f32 = 0.1 * LINEAR_SLOP;
    let (poly1, poly2, xf1, xf2, edge1, flip, manifold_type) =
        if separation_b > separation_a + K_TOL {
            (poly_b, poly_a, xf_b, xf_a, edge_b, true, ManifoldType::FaceB)
        } else {
            (poly_a, poly_b, xf_a, xf_b, edge_a, false, ManifoldType::FaceA)
        };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let count1 = poly1.vertex_count();
    let iv1 = edge1;
    let iv2 = (edge1 + 1) % count1;

    let mut v11 = poly1.vertices[iv1];
    let mut v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalize();
    let local_normal = Vec2::new(local_tangent.y, -local_tangent.x);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q.rotate(local_tangent);
    let normal = Vec2::new(tangent.y, -tangent.x);

    v11 = xf1.apply(v11);
    v12 = xf1.apply(v12);

    let front_offset = normal.dot(v11);
    // Side offsets, extended by polygon skin thickness.
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    if clip_segment_to_line(
        &mut clip_points1,
        &incident_edge,
        -tangent,
        side_offset1,
        iv1 as u8,
    ) < 2
    {
        return;
    }
    if clip_segment_to_line(
        &mut clip_points2,
        &clip_points1,
        tangent,
        side_offset2,
        iv2 as u8,
    ) < 2
    {
        return;
    }

    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;
    manifold.manifold_type = manifold_type;

    let mut point_count = 0;
    for clip in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = normal.dot(clip.v) - front_offset;
        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.apply_inv(clip.v);
            cp.id = if flip { clip.id.flipped() } else { clip.id };
            point_count += 1;
        }
    }
    manifold.point_count = point_count;
}

pub fn collide_edge_and_circle(
    manifold: &mut Manifold,
    edge_a: &EdgeShape,
    xf_a: &Transform2,
    circle_b: &CircleShape,
    xf_b: &Transform2,
) {
    // Circle in the edge's frame.
    let q = xf_a.apply_inv(xf_b.apply(circle_b.position));

    let a = edge_a.vertex1;
    let b = edge_a.vertex2;
    let e = b - a;

    // Barycentric coordinates of q on the segment.
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = edge_a.radius + circle_b.radius;

    // Region A: closest to vertex1.
    if v <= 0.0 {
        let d = q - a;
        if d.dot(d) > radius * radius {
            return;
        }

        // The previous chain segment owns collisions in its own region.
        if let Some(a1) = edge_a.vertex0 {
            let e1 = a - a1;
            if e1.dot(a - q) > 0.0 {
                return;
            }
        }

        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = a;
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id =
            ContactFeature::new(0, 0, FeatureType::Vertex, FeatureType::Vertex);
        return;
    }

    // Region B: closest to vertex2.
    if u <= 0.0 {
        let d = q - b;
        if d.dot(d) > radius * radius {
            return;
        }

        if let Some(b2) = edge_a.vertex3 {
            let e2 = b2 - b;
            if e2.dot(q - b) > 0.0 {
                return;
            }
        }

        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = b;
        manifold.points[0].local_point = circle_b.position;
        manifold.points[0].id =
            ContactFeature::new(1, 0, FeatureType::Vertex, FeatureType::Vertex);
        return;
    }

    // Region AB: closest to the segment interior.
    let den = e.dot(e);
    debug_assert!(den > 0.0);
    let p = (1.0 / den) * (u * a + v * b);
    let d = q - p;
    if d.dot(d) > radius * radius {
        return;
    }

    let mut n = Vec2::new(-e.y, e.x);
    if n.dot(q - a) < 0.0 {
        n = -n;
    }

    manifold.point_count = 1;
    manifold.manifold_type = ManifoldType::FaceA;
    manifold.local_normal = n.normalize();
    manifold.local_point = a;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactFeature::new(0, 0, FeatureType::Face, FeatureType::Vertex);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EpAxisType {
    EdgeA,
    EdgeB,
}

#[derive(Debug, Clone, Copy)]
struct EpAxis {
    kind: EpAxisType,
    index: usize,
    separation: f32,
    normal: Vec2,
}

/// Polygon B pre-transformed into the edge's frame.
struct TempPolygon {
    vertices: Vec<Vec2>,
    normals: Vec<Vec2>,
}

fn compute_edge_separation(polygon_b: &TempPolygon, v1: Vec2, normal1: Vec2) -> EpAxis {
    let mut axis = EpAxis {
        kind: EpAxisType::EdgeA,
        index: 0,
        separation: f32::MIN,
        normal: Vec2::ZERO,
    };

    let axes = [normal1, -normal1];
    for (j, &axis_j) in axes.iter().enumerate() {
        let mut sj = f32::MAX;
        for &v in &polygon_b.vertices {
            sj = sj.min(axis_j.dot(v - v1));
        }
        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = axis_j;
        }
    }
    axis
}

fn compute_polygon_separation(polygon_b: &TempPolygon, v1: Vec2, v2: Vec2) -> EpAxis {
    let mut axis = EpAxis {
        kind: EpAxisType::EdgeB,
        index: 0,
        separation: f32::MIN,
        normal: Vec2::ZERO,
    };

    for i in 0..polygon_b.vertices.len() {
        let n = -polygon_b.normals[i];
        let s1 = n.dot(polygon_b.vertices[i] - v1);
        let s2 = n.dot(polygon_b.vertices[i] - v2);
        let s = s1.min(s2);
        if s > axis.separation {
            axis.kind = EpAxisType::EdgeB;
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }
    axis
}

pub fn collide_edge_and_polygon(
    manifold: &mut Manifold,
    edge_a: &EdgeShape,
    xf_a: &Transform2,
    polygon_b: &PolygonShape,
    xf_b: &Transform2,
) {
    let xf = xf_a.mul_t(xf_b);
    let centroid_b = xf.apply(polygon_b.centroid);

    let v1 = edge_a.vertex1;
    let v2 = edge_a.vertex2;

    let edge1 = (v2 - v1).normalize();

    // Normal points to the right of the edge direction.
    let normal1 = Vec2::new(edge1.y, -edge1.x);
    let offset1 = normal1.dot(centroid_b - v1);

    // With both ghost vertices the edge behaves one-sided.
    let one_sided = edge_a.vertex0.is_some() && edge_a.vertex3.is_some();
    if one_sided && offset1 < 0.0 {
        return;
    }

    let temp_b = TempPolygon {
        vertices: polygon_b.vertices.iter().map(|&v| xf.apply(v)).collect(),
        normals: polygon_b
            .normals
            .iter()
            .map(|&n| xf.q.rotate(n))
            .collect(),
    };

    let radius = polygon_b.radius + edge_a.radius;

    let edge_axis = compute_edge_separation(&temp_b, v1, normal1);
    if edge_axis.separation > radius {
        return;
    }

    let polygon_axis = compute_polygon_separation(&temp_b, v1, v2);
    if polygon_axis.separation > radius {
        return;
    }

    // Hysteresis for jitter reduction.
    const K_RELATIVE_TOL: f32 = 0.98;
    const K_ABSOLUTE_TOL: f32 = 0.001;

    let mut primary_axis =
        if polygon_axis.separation - radius > K_RELATIVE_TOL * (edge_axis.separation - radius) + K_ABSOLUTE_TOL {
            polygon_axis
        } else {
            edge_axis
        };

    if let (Some(v0), Some(v3)) = (edge_a.vertex0, edge_a.vertex3) {
        // Gauss-map filtering against the adjacent segments so sliding
        // bodies do not catch on interior chain vertices.
        let edge0 = (v1 - v0).normalize();
        let normal0 = Vec2::new(edge0.y, -edge0.x);
        let convex1 = cross(edge0, edge1) >= 0.0;

        let edge2 = (v3 - v2).normalize();
        let normal2 = Vec2::new(edge2.y, -edge2.x);
        let convex2 = cross(edge1, edge2) >= 0.0;

        const SIN_TOL: f32 = 0.1;
        let side1 = primary_axis.normal.dot(edge1) <= 0.0;

        if side1 {
            if convex1 {
                if cross(primary_axis.normal, normal0) > SIN_TOL {
                    // Normal points into the skip region of vertex1.
                    return;
                }
            } else {
                primary_axis = edge_axis;
            }
        } else if convex2 {
            if cross(normal2, primary_axis.normal) > SIN_TOL {
                return;
            }
        } else {
            primary_axis = edge_axis;
        }
    }

    let count_b = temp_b.vertices.len();
    let mut clip_points = [ClipVertex::default(); 2];
    let (ref_i1, ref_i2, ref_v1, ref_v2, ref_normal, side_normal1, side_normal2);

    if primary_axis.kind == EpAxisType::EdgeA {
        manifold.manifold_type = ManifoldType::FaceA;

        // Incident face: polygon normal most anti-parallel to the edge
        // normal.
        let mut best_index = 0;
        let mut best_value = primary_axis.normal.dot(temp_b.normals[0]);
        for i in 1..count_b {
            let value = primary_axis.normal.dot(temp_b.normals[i]);
            if value < best_value {
                best_value = value;
                best_index = i;
            }
        }

        let i1 = best_index;
        let i2 = (i1 + 1) % count_b;

        clip_points[0] = ClipVertex {
            v: temp_b.vertices[i1],
            id: ContactFeature::new(0, i1 as u8, FeatureType::Face, FeatureType::Vertex),
        };
        clip_points[1] = ClipVertex {
            v: temp_b.vertices[i2],
            id: ContactFeature::new(0, i2 as u8, FeatureType::Face, FeatureType::Vertex),
        };

        ref_i1 = 0;
        ref_i2 = 1;
        ref_v1 = v1;
        ref_v2 = v2;
        ref_normal = primary_axis.normal;
        side_normal1 = -edge1;
        side_normal2 = edge1;
    } else {
        manifold.manifold_type = ManifoldType::FaceB;

        clip_points[0] = ClipVertex {
            v: v2,
            id: ContactFeature::new(
                1,
                primary_axis.index as u8,
                FeatureType::Vertex,
                FeatureType::Face,
            ),
        };
        clip_points[1] = ClipVertex {
            v: v1,
            id: ContactFeature::new(
                0,
                primary_axis.index as u8,
                FeatureType::Vertex,
                FeatureType::Face,
            ),
        };

        ref_i1 = primary_axis.index;
        ref_i2 = (ref_i1 + 1) % count_b;
        ref_v1 = temp_b.vertices[ref_i1];
        ref_v2 = temp_b.vertices[ref_i2];
        ref_normal = temp_b.normals[ref_i1];
        side_normal1 = Vec2::new(ref_normal.y, -ref_normal.x);
        side_normal2 = -side_normal1;
    }

    let side_offset1 = side_normal1.dot(ref_v1);
    let side_offset2 = side_normal2.dot(ref_v2);

    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    if clip_segment_to_line(
        &mut clip_points1,
        &clip_points,
        side_normal1,
        side_offset1,
        ref_i1 as u8,
    ) < 2
    {
        return;
    }
    if clip_segment_to_line(
        &mut clip_points2,
        &clip_points1,
        side_normal2,
        side_offset2,
        ref_i2 as u8,
    ) < 2
    {
        return;
    }

    if primary_axis.kind == EpAxisType::EdgeA {
        manifold.local_normal = ref_normal;
        manifold.local_point = ref_v1;
    } else {
        manifold.local_normal = polygon_b.normals[ref_i1];
        manifold.local_point = polygon_b.vertices[ref_i1];
    }

    let mut point_count = 0;
    for clip in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = ref_normal.dot(clip.v - ref_v1);
        if separation <= radius {
            let cp = &mut manifold.points[point_count];
            if primary_axis.kind == EpAxisType::EdgeA {
                cp.local_point = xf.apply_inv(clip.v);
                cp.id = clip.id;
            } else {
                cp.local_point = clip.v;
                cp.id = clip.id.flipped();
            }
            point_count += 1;
        }
    }
    manifold.point_count = point_count;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::WorldManifold;
    use crate::collision::shapes::ChainShape;
    use approx::assert_relative_eq;

    #[test]
    fn circles_touching_produce_one_point() {
        let a = CircleShape::new(1.0).unwrap();
        let b = CircleShape::new(1.0).unwrap();
        let xf_a = Transform2::IDENTITY;
        let xf_b = Transform2::new(Vec2::new(1.5, 0.0), 0.0);

        let mut manifold = Manifold::default();
        collide_circles(&mut manifold, &a, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 1);

        let world = WorldManifold::new(&manifold, &xf_a, a.radius, &xf_b, b.radius);
        assert_relative_eq!(world.normal.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(world.separations[0], -0.5, epsilon = 1e-5);
    }

    #[test]
    fn separated_circles_produce_nothing() {
        let a = CircleShape::new(1.0).unwrap();
        let b = CircleShape::new(1.0).unwrap();
        let mut manifold = Manifold::default();
        collide_circles(
            &mut manifold,
            &a,
            &Transform2::IDENTITY,
            &b,
            &Transform2::new(Vec2::new(3.0, 0.0), 0.0),
        );
        assert_eq!(manifold.point_count, 0);
    }

    #[test]
    fn box_on_box_produces_two_point_face_manifold() {
        let a = PolygonShape::rect(1.0, 1.0);
        let b = PolygonShape::rect(1.0, 1.0);
        let xf_a = Transform2::IDENTITY;
        // Overlapping slightly from above.
        let xf_b = Transform2::new(Vec2::new(0.0, 1.99), 0.0);

        let mut manifold = Manifold::default();
        collide_polygons(&mut manifold, &a, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 2);

        let world = WorldManifold::new(&manifold, &xf_a, a.radius, &xf_b, b.radius);
        assert_relative_eq!(world.normal.y.abs(), 1.0, epsilon = 1e-4);
        assert!(world.separations[0] < 0.0);
        assert!(world.separations[1] < 0.0);
    }

    #[test]
    fn polygon_circle_side_contact() {
        let a = PolygonShape::rect(1.0, 1.0);
        let b = CircleShape::new(0.5).unwrap();
        let xf_a = Transform2::IDENTITY;
        let xf_b = Transform2::new(Vec2::new(1.4, 0.0), 0.0);

        let mut manifold = Manifold::default();
        collide_polygon_and_circle(&mut manifold, &a, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 1);
        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);

        let world = WorldManifold::new(&manifold, &xf_a, a.radius, &xf_b, b.radius);
        assert_relative_eq!(world.normal.x, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn polygon_circle_corner_region_miss() {
        let a = PolygonShape::rect(1.0, 1.0);
        let b = CircleShape::new(0.5).unwrap();
        // Diagonally past the corner, outside the radius.
        let xf_b = Transform2::new(Vec2::new(1.5, 1.5), 0.0);
        let mut manifold = Manifold::default();
        collide_polygon_and_circle(&mut manifold, &a, &Transform2::IDENTITY, &b, &xf_b);
        assert_eq!(manifold.point_count, 0);
    }

    #[test]
    fn stable_ids_for_resting_box() {
        // The same configuration twice must give identical contact ids:
        // that is what manifold persistence matches on.
        let a = PolygonShape::rect(10.0, 1.0);
        let b = PolygonShape::rect(0.5, 0.5);
        let xf_a = Transform2::IDENTITY;
        let xf_b = Transform2::new(Vec2::new(0.0, 1.49), 0.0);

        let mut m1 = Manifold::default();
        let mut m2 = Manifold::default();
        collide_polygons(&mut m1, &a, &xf_a, &b, &xf_b);
        collide_polygons(&mut m2, &a, &xf_a, &b, &xf_b);
        assert_eq!(m1.point_count, 2);
        assert_eq!(m1.points[0].id, m2.points[0].id);
        assert_eq!(m1.points[1].id, m2.points[1].id);
    }

    #[test]
    fn edge_circle_interior_contact() {
        let edge = EdgeShape::new(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0));
        let circle = CircleShape::new(0.5).unwrap();
        let xf_b = Transform2::new(Vec2::new(0.0, 0.4), 0.0);

        let mut manifold = Manifold::default();
        collide_edge_and_circle(&mut manifold, &edge, &Transform2::IDENTITY, &circle, &xf_b);
        assert_eq!(manifold.point_count, 1);
        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);
        assert_relative_eq!(manifold.local_normal.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn ghost_vertex_suppresses_interior_vertex_contact() {
        // Two collinear chain segments: the circle sits in the region owned
        // by the next segment, so this child must not report a contact.
        let chain = ChainShape::open(&[
            Vec2::new(-4.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
        ])
        .unwrap();
        let first = chain.child_edge(0);
        let circle = CircleShape::new(0.5).unwrap();
        // Just past vertex2 of the first segment.
        let xf_b = Transform2::new(Vec2::new(0.3, 0.2), 0.0);

        let mut manifold = Manifold::default();
        collide_edge_and_circle(&mut manifold, &first, &Transform2::IDENTITY, &circle, &xf_b);
        assert_eq!(manifold.point_count, 0);

        // The owning segment does report it.
        let second = chain.child_edge(1);
        collide_edge_and_circle(&mut manifold, &second, &Transform2::IDENTITY, &circle, &xf_b);
        assert_eq!(manifold.point_count, 1);
    }

    #[test]
    fn edge_polygon_face_contact() {
        let edge = EdgeShape::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));
        let poly = PolygonShape::rect(0.5, 0.5);
        let xf_b = Transform2::new(Vec2::new(0.0, 0.49), 0.0);

        let mut manifold = Manifold::default();
        collide_edge_and_polygon(&mut manifold, &edge, &Transform2::IDENTITY, &poly, &xf_b);
        assert_eq!(manifold.point_count, 2);

        let world = WorldManifold::new(&manifold, &Transform2::IDENTITY, edge.radius, &xf_b, poly.radius);
        assert_relative_eq!(world.normal.y, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn one_sided_edge_ignores_polygon_behind() {
        let chain = ChainShape::open(&[
            Vec2::new(-8.0, 0.0),
            Vec2::new(-4.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(8.0, 0.0),
        ])
        .unwrap();
        let edge = chain.child_edge(1); // has both ghosts
        let poly = PolygonShape::rect(0.5, 0.5);
        // Below the chain surface.
        let xf_b = Transform2::new(Vec2::new(0.0, -0.3), 0.0);

        let mut manifold = Manifold::default();
        collide_edge_and_polygon(&mut manifold, &edge, &Transform2::IDENTITY, &poly, &xf_b);
        assert_eq!(manifold.point_count, 0);
    }

    #[test]
    fn unsupported_pairs_yield_empty_manifold() {
        let e1: Shape = EdgeShape::new(Vec2::ZERO, Vec2::X).into();
        let e2: Shape = EdgeShape::new(Vec2::Y, Vec2::ONE).into();
        assert!(!pair_supported(&e1, &e2));

        let mut manifold = Manifold::default();
        manifold.point_count = 1;
        evaluate(
            &mut manifold,
            &e1,
            0,
            &Transform2::IDENTITY,
            &e2,
            0,
            &Transform2::IDENTITY,
        );
        assert_eq!(manifold.point_count, 0);
    }
}
