//! Contact manifolds and the persistent ids that match manifold points
//! across steps for warm starting.

use glam::Vec2;

use crate::math::Transform2;
use crate::settings::MAX_MANIFOLD_POINTS;

/// Which feature of a shape a contact point was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureType {
    #[default]
    Vertex,
    Face,
}

/// The feature pair that produced a contact point. Equal features across
/// two successive manifolds identify the same physical contact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactFeature {
    pub index_a: u8,
    pub index_b: u8,
    pub type_a: FeatureType,
    pub type_b: FeatureType,
}

impl ContactFeature {
    pub const fn new(index_a: u8, index_b: u8, type_a: FeatureType, type_b: FeatureType) -> Self {
        ContactFeature {
            index_a,
            index_b,
            type_a,
            type_b,
        }
    }

    /// Swap the roles of shape A and B.
    pub fn flipped(self) -> Self {
        ContactFeature {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

pub type ContactId = ContactFeature;

/// A contact point within a manifold. The point usage depends on the
/// manifold type; impulses persist so the next step can warm start.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManifoldPoint {
    /// Usage depends on the manifold type: local anchor for circles, clip
    /// point on the incident shape for face manifolds.
    pub local_point: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub id: ContactId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Up to two contact points plus the reference normal, all in the local
/// frame of the reference shape so the manifold survives body movement
/// between narrow-phase updates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub manifold_type: ManifoldType,
    pub point_count: usize,
}

/// The manifold evaluated in world space for the current transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldManifold {
    /// World normal pointing from A to B.
    pub normal: Vec2,
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative values mean penetration.
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform2,
        radius_a: f32,
        xf_b: &Transform2,
        radius_b: f32,
    ) -> Self {
        let mut world = WorldManifold::default();
        if manifold.point_count == 0 {
            return world;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                world.normal = Vec2::X;
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                if (point_a - point_b).length_squared() > f32::EPSILON * f32::EPSILON {
                    world.normal = (point_b - point_a).normalize();
                }
                let c_a = point_a + radius_a * world.normal;
                let c_b = point_b - radius_b * world.normal;
                world.points[0] = 0.5 * (c_a + c_b);
                world.separations[0] = (c_b - c_a).dot(world.normal);
            }
            ManifoldType::FaceA => {
                world.normal = xf_a.q.rotate(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);
                for i in 0..manifold.point_count {
                    let clip_point = xf_b.apply(manifold.points[i].local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(world.normal)) * world.normal;
                    let c_b = clip_point - radius_b * world.normal;
                    world.points[i] = 0.5 * (c_a + c_b);
                    world.separations[i] = (c_b - c_a).dot(world.normal);
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.rotate(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);
                for i in 0..manifold.point_count {
                    let clip_point = xf_a.apply(manifold.points[i].local_point);
                    let c_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    world.points[i] = 0.5 * (c_a + c_b);
                    world.separations[i] = (c_a - c_b).dot(normal);
                }
                // The reported normal always points from A to B.
                world.normal = -normal;
            }
        }
        world
    }
}

/// Cross-step classification of a manifold point, driving warm-start
/// impulse carry-over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointState {
    /// Point does not exist on this side.
    #[default]
    Null,
    /// Point was added in the new manifold.
    Add,
    /// Point persisted across both manifolds.
    Persist,
    /// Point was removed from the old manifold.
    Remove,
}

/// Classify the points of `manifold1` (previous step) and `manifold2`
/// (current step) by matching contact ids.
pub fn get_point_states(
    manifold1: &Manifold,
    manifold2: &Manifold,
) -> (
    [PointState; MAX_MANIFOLD_POINTS],
    [PointState; MAX_MANIFOLD_POINTS],
) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    for i in 0..manifold1.point_count {
        let id = manifold1.points[i].id;
        state1[i] = PointState::Remove;
        for j in 0..manifold2.point_count {
            if manifold2.points[j].id == id {
                state1[i] = PointState::Persist;
                break;
            }
        }
    }

    for i in 0..manifold2.point_count {
        let id = manifold2.points[i].id;
        state2[i] = PointState::Add;
        for j in 0..manifold1.point_count {
            if manifold1.points[j].id == id {
                state2[i] = PointState::Persist;
                break;
            }
        }
    }

    (state1, state2)
}

/// A clip vertex for polygon clipping: carries the contact id through the
/// clipping pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactId,
}

/// Sutherland-Hodgman style clip of a two-vertex segment against a plane.
/// Returns the number of output points (0, 1 or 2); the solver only uses
/// the result when 2 points survive.
pub fn clip_segment_to_line(
    v_out: &mut [ClipVertex; 2],
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: u8,
) -> usize {
    let mut count = 0;

    // Distances of the end points from the line.
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    if distance0 * distance1 < 0.0 {
        // The segment straddles the plane; the intersection point takes a
        // fresh vertex/face feature pair.
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + interp * (v_in[1].v - v_in[0].v);
        v_out[count].id = ContactFeature::new(
            vertex_index_a,
            v_in[0].id.index_b,
            FeatureType::Vertex,
            FeatureType::Face,
        );
        count += 1;
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index_a: u8, index_b: u8) -> ContactId {
        ContactFeature::new(index_a, index_b, FeatureType::Vertex, FeatureType::Face)
    }

    fn manifold_with_ids(ids: &[ContactId]) -> Manifold {
        let mut m = Manifold::default();
        m.point_count = ids.len();
        for (i, &cid) in ids.iter().enumerate() {
            m.points[i].id = cid;
        }
        m
    }

    #[test]
    fn persist_remove_add_classification() {
        let x = id(0, 0);
        let y = id(1, 0);
        let z = id(2, 1);

        let previous = manifold_with_ids(&[x, y]);
        let current = manifold_with_ids(&[x, z]);

        let (state1, state2) = get_point_states(&previous, &current);
        assert_eq!(state1[0], PointState::Persist); // x carried over
        assert_eq!(state1[1], PointState::Remove); // y vanished
        assert_eq!(state2[0], PointState::Persist);
        assert_eq!(state2[1], PointState::Add); // z is new
    }

    #[test]
    fn empty_manifolds_classify_as_null() {
        let empty = Manifold::default();
        let (state1, state2) = get_point_states(&empty, &empty);
        assert!(state1.iter().all(|&s| s == PointState::Null));
        assert!(state2.iter().all(|&s| s == PointState::Null));
    }

    #[test]
    fn clip_keeps_both_points_behind_plane() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                id: id(0, 0),
            },
            ClipVertex {
                v: Vec2::new(1.0, 0.0),
                id: id(1, 0),
            },
        ];
        let mut v_out = [ClipVertex::default(); 2];
        // Plane x <= 2.
        let count = clip_segment_to_line(&mut v_out, &v_in, Vec2::X, 2.0, 7);
        assert_eq!(count, 2);
        assert_eq!(v_out[0].v, v_in[0].v);
        assert_eq!(v_out[1].v, v_in[1].v);
    }

    #[test]
    fn clip_splits_straddling_segment() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                id: id(0, 0),
            },
            ClipVertex {
                v: Vec2::new(1.0, 0.0),
                id: id(1, 0),
            },
        ];
        let mut v_out = [ClipVertex::default(); 2];
        // Plane x <= 0: first point kept, intersection synthesized.
        let count = clip_segment_to_line(&mut v_out, &v_in, Vec2::X, 0.0, 7);
        assert_eq!(count, 2);
        assert_eq!(v_out[0].v, Vec2::new(-1.0, 0.0));
        assert_eq!(v_out[1].v, Vec2::new(0.0, 0.0));
        assert_eq!(v_out[1].id.index_a, 7);
        assert_eq!(v_out[1].id.type_a, FeatureType::Vertex);
    }

    #[test]
    fn clip_rejects_fully_front_segment() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(1.0, 0.0),
                id: id(0, 0),
            },
            ClipVertex {
                v: Vec2::new(2.0, 0.0),
                id: id(1, 0),
            },
        ];
        let mut v_out = [ClipVertex::default(); 2];
        let count = clip_segment_to_line(&mut v_out, &v_in, Vec2::X, 0.5, 7);
        assert_eq!(count, 1);
    }
}
