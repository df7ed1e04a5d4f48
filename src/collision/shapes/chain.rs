use glam::Vec2;

use crate::collision::aabb::Aabb;
use crate::collision::shapes::EdgeShape;
use crate::error::PhysicsError;
use crate::math::Transform2;
use crate::settings::{LINEAR_SLOP, POLYGON_RADIUS};

/// A free-form sequence of line segments, used for static terrain. Each
/// segment is a broad-phase child; adjacent segments provide ghost vertices
/// so bodies slide across interior joints without snagging.
///
/// Chains are one-sided and hollow; they do not support mass computation and
/// self-intersection is not detected.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainShape {
    pub vertices: Vec<Vec2>,
    /// Whether the last vertex connects back to the first.
    pub is_loop: bool,
    /// Ghost vertex before the first segment of an open chain.
    pub prev_vertex: Option<Vec2>,
    /// Ghost vertex after the last segment of an open chain.
    pub next_vertex: Option<Vec2>,
    pub radius: f32,
}

impl ChainShape {
    /// An open chain. Adjacent ghost vertices may be attached afterwards via
    /// the `prev_vertex`/`next_vertex` fields.
    pub fn open(vertices: &[Vec2]) -> Result<Self, PhysicsError> {
        Self::validate(vertices, 2)?;
        Ok(ChainShape {
            vertices: vertices.to_vec(),
            is_loop: false,
            prev_vertex: None,
            next_vertex: None,
            radius: POLYGON_RADIUS,
        })
    }

    /// A closed loop; the closing segment from last back to first vertex is
    /// implicit.
    pub fn looped(vertices: &[Vec2]) -> Result<Self, PhysicsError> {
        Self::validate(vertices, 3)?;
        Ok(ChainShape {
            vertices: vertices.to_vec(),
            is_loop: true,
            prev_vertex: None,
            next_vertex: None,
            radius: POLYGON_RADIUS,
        })
    }

    fn validate(vertices: &[Vec2], required: usize) -> Result<(), PhysicsError> {
        if vertices.len() < required {
            return Err(PhysicsError::InvalidChain {
                required,
                got: vertices.len(),
            });
        }
        let min_dist_sq = LINEAR_SLOP * LINEAR_SLOP;
        for pair in vertices.windows(2) {
            // Zero-length segments produce degenerate edge normals.
            if (pair[1] - pair[0]).length_squared() <= min_dist_sq {
                return Err(PhysicsError::DegeneratePolygon);
            }
        }
        Ok(())
    }

    pub fn child_count(&self) -> usize {
        if self.is_loop {
            self.vertices.len()
        } else {
            self.vertices.len() - 1
        }
    }

    fn vertex(&self, i: usize) -> Vec2 {
        self.vertices[i % self.vertices.len()]
    }

    /// Materialize child `index` as an edge shape with ghost vertices taken
    /// from the neighboring segments.
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        debug_assert!(index < self.child_count());
        let v1 = self.vertex(index);
        let v2 = self.vertex(index + 1);

        let vertex0 = if index > 0 {
            Some(self.vertices[index - 1])
        } else if self.is_loop {
            Some(self.vertex(self.vertices.len() - 1))
        } else {
            self.prev_vertex
        };

        let vertex3 = if index + 2 < self.vertices.len() {
            Some(self.vertices[index + 2])
        } else if self.is_loop {
            Some(self.vertex(index + 2))
        } else {
            self.next_vertex
        };

        EdgeShape {
            vertex1: v1,
            vertex2: v2,
            vertex0,
            vertex3,
            radius: self.radius,
        }
    }

    pub fn compute_aabb(&self, xf: &Transform2, child_index: usize) -> Aabb {
        debug_assert!(child_index < self.child_count());
        let v1 = xf.apply(self.vertex(child_index));
        let v2 = xf.apply(self.vertex(child_index + 1));
        let r = Vec2::splat(self.radius);
        Aabb {
            min: v1.min(v2) - r,
            max: v1.max(v2) + r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(0.0, 4.0),
        ]
    }

    #[test]
    fn open_chain_child_count() {
        let chain = ChainShape::open(&square()).unwrap();
        assert_eq!(chain.child_count(), 3);
    }

    #[test]
    fn loop_chain_child_count_and_wrap() {
        let chain = ChainShape::looped(&square()).unwrap();
        assert_eq!(chain.child_count(), 4);
        let closing = chain.child_edge(3);
        assert_eq!(closing.vertex1, Vec2::new(0.0, 4.0));
        assert_eq!(closing.vertex2, Vec2::new(0.0, 0.0));
        // Loop edges always carry both ghosts.
        assert_eq!(closing.vertex0, Some(Vec2::new(4.0, 4.0)));
        assert_eq!(closing.vertex3, Some(Vec2::new(4.0, 0.0)));
    }

    #[test]
    fn interior_edge_gets_neighbor_ghosts() {
        let chain = ChainShape::open(&square()).unwrap();
        let edge = chain.child_edge(1);
        assert_eq!(edge.vertex0, Some(Vec2::new(0.0, 0.0)));
        assert_eq!(edge.vertex3, Some(Vec2::new(0.0, 4.0)));
    }

    #[test]
    fn boundary_edges_of_open_chain_have_no_ghosts() {
        let chain = ChainShape::open(&square()).unwrap();
        assert_eq!(chain.child_edge(0).vertex0, None);
        assert_eq!(chain.child_edge(2).vertex3, None);
    }

    #[test]
    fn rejects_too_short_and_degenerate_input() {
        assert!(ChainShape::open(&[Vec2::ZERO]).is_err());
        assert!(ChainShape::looped(&[Vec2::ZERO, Vec2::X]).is_err());
        let dup = [Vec2::ZERO, Vec2::ZERO, Vec2::X];
        assert_eq!(
            ChainShape::open(&dup),
            Err(PhysicsError::DegeneratePolygon)
        );
    }
}
