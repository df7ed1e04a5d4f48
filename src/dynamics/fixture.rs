//! Fixtures bind a shape to a body, carrying the non-geometric material
//! and filtering state. Each shape child gets its own broad-phase proxy.

use glam::Vec2;

use crate::collision::RayCastInput;
use crate::collision::RayCastOutput;
use crate::collision::aabb::Aabb;
use crate::collision::broad_phase::BroadPhase;
use crate::collision::dynamic_tree::ProxyId;
use crate::collision::shapes::{MassData, Shape};
use crate::dynamics::{BodyHandle, FixtureHandle};
use crate::error::PhysicsError;
use crate::math::Transform2;

/// Collision filtering data. Two fixtures collide when their group says so,
/// or failing a group verdict, when each one's category is in the other's
/// mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    /// Category bits, usually one bit per fixture kind.
    pub category: u16,
    /// Mask of categories this fixture accepts.
    pub mask: u16,
    /// Same positive group always collides, same negative group never
    /// collides, zero defers to category/mask.
    pub group: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            category: 0x0001,
            mask: 0xFFFF,
            group: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group == other.group && self.group != 0 {
            return self.group > 0;
        }
        (self.mask & other.category) != 0 && (self.category & other.mask) != 0
    }
}

/// Blueprint for a fixture. The shape is cloned into the fixture.
#[derive(Debug, Clone)]
pub struct FixtureDef {
    pub shape: Shape,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    pub is_sensor: bool,
    pub filter: Filter,
}

impl FixtureDef {
    pub fn new(shape: impl Into<Shape>) -> Self {
        FixtureDef {
            shape: shape.into(),
            friction: 0.2,
            restitution: 0.0,
            density: 1.0,
            is_sensor: false,
            filter: Filter::default(),
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

/// The broad-phase payload: which fixture child a tree proxy belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureProxy {
    pub fixture: FixtureHandle,
    pub child_index: usize,
}

#[derive(Debug)]
pub struct Fixture {
    pub(crate) body: BodyHandle,
    pub(crate) shape: Shape,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) density: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    /// One proxy per shape child, empty while the body is disabled.
    pub(crate) proxies: Vec<ProxyId>,
}

impl Fixture {
    pub(crate) fn new(body: BodyHandle, def: FixtureDef) -> Result<Self, PhysicsError> {
        if !(def.density.is_finite() && def.density >= 0.0) {
            return Err(PhysicsError::InvalidDensity(def.density));
        }
        Ok(Fixture {
            body,
            shape: def.shape,
            friction: def.friction,
            restitution: def.restitution,
            density: def.density,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
        })
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    pub fn test_point(&self, xf: &Transform2, point: Vec2) -> bool {
        self.shape.test_point(xf, point)
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform2,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf, child_index)
    }

    pub(crate) fn create_proxies(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureProxy>,
        handle: FixtureHandle,
        xf: &Transform2,
    ) {
        debug_assert!(self.proxies.is_empty());
        for child_index in 0..self.shape.child_count() {
            let aabb = self.shape.compute_aabb(xf, child_index);
            let id = broad_phase.create_proxy(
                aabb,
                FixtureProxy {
                    fixture: handle,
                    child_index,
                },
            );
            self.proxies.push(id);
        }
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut BroadPhase<FixtureProxy>) {
        for id in self.proxies.drain(..) {
            broad_phase.destroy_proxy(id);
        }
    }

    /// Move the proxies to cover both the old and new transform, so the
    /// broad phase never has a gap between narrow-phase updates.
    pub(crate) fn synchronize(
        &self,
        broad_phase: &mut BroadPhase<FixtureProxy>,
        xf1: &Transform2,
        xf2: &Transform2,
    ) {
        for (child_index, &id) in self.proxies.iter().enumerate() {
            let aabb1 = self.shape.compute_aabb(xf1, child_index);
            let aabb2 = self.shape.compute_aabb(xf2, child_index);
            let aabb = aabb1.union(&aabb2);
            let displacement = aabb2.center() - aabb1.center();
            broad_phase.move_proxy(id, aabb, displacement);
        }
    }

    pub(crate) fn compute_aabb(&self, xf: &Transform2, child_index: usize) -> Aabb {
        self.shape.compute_aabb(xf, child_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_collides_with_itself() {
        let f = Filter::default();
        assert!(f.should_collide(&f));
    }

    #[test]
    fn category_mask_filtering() {
        let player = Filter {
            category: 0x0002,
            mask: 0x0004,
            group: 0,
        };
        let enemy = Filter {
            category: 0x0004,
            mask: 0x0002,
            group: 0,
        };
        let scenery = Filter {
            category: 0x0008,
            mask: 0xFFFF,
            group: 0,
        };
        assert!(player.should_collide(&enemy));
        // Mask must accept in both directions.
        assert!(!player.should_collide(&scenery));
    }

    #[test]
    fn groups_override_masks() {
        let a = Filter {
            category: 0x0002,
            mask: 0x0000,
            group: 3,
        };
        let b = Filter {
            category: 0x0004,
            mask: 0x0000,
            group: 3,
        };
        // Positive group forces collision despite empty masks.
        assert!(a.should_collide(&b));

        let c = Filter {
            group: -2,
            ..Filter::default()
        };
        let d = Filter {
            group: -2,
            ..Filter::default()
        };
        // Negative group suppresses despite permissive masks.
        assert!(!c.should_collide(&d));
    }

    #[test]
    fn negative_density_rejected() {
        let def = FixtureDef::new(crate::collision::shapes::CircleShape::new(1.0).unwrap())
            .with_density(-1.0);
        let err = Fixture::new(BodyHandle::default(), def).unwrap_err();
        assert_eq!(err, PhysicsError::InvalidDensity(-1.0));
    }
}
