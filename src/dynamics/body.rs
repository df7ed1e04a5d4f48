//! Rigid bodies. A body owns its mass state and sweep; fixtures, contacts
//! and joints hang off it through handle lists so the world can traverse
//! the constraint graph without pointer cycles.

use bitflags::bitflags;
use glam::Vec2;
use slotmap::SlotMap;

use crate::dynamics::fixture::Fixture;
use crate::dynamics::{BodyHandle, ContactHandle, FixtureHandle, JointHandle};
use crate::math::{Sweep, Transform2, cross, cross_sv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    /// Zero mass, zero velocity, moved only by hand.
    #[default]
    Static,
    /// Infinite mass, velocity set by the user, never collides with other
    /// non-dynamic bodies.
    Kinematic,
    /// Finite mass, fully simulated.
    Dynamic,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct BodyFlags: u8 {
        const ISLAND = 0x01;
        const AWAKE = 0x02;
        const AUTO_SLEEP = 0x04;
        const BULLET = 0x08;
        const FIXED_ROTATION = 0x10;
        const ENABLED = 0x20;
        const TOI = 0x40;
    }
}

/// Blueprint for a body.
#[derive(Debug, Clone)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub allow_sleep: bool,
    pub awake: bool,
    pub fixed_rotation: bool,
    pub bullet: bool,
    pub enabled: bool,
    pub gravity_scale: f32,
}

impl Default for BodyDef {
    fn default() -> Self {
        BodyDef {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            gravity_scale: 1.0,
        }
    }
}

impl BodyDef {
    pub fn dynamic_at(position: Vec2) -> Self {
        BodyDef {
            body_type: BodyType::Dynamic,
            position,
            ..Default::default()
        }
    }

    pub fn static_at(position: Vec2) -> Self {
        BodyDef {
            position,
            ..Default::default()
        }
    }

    pub fn kinematic_at(position: Vec2) -> Self {
        BodyDef {
            body_type: BodyType::Kinematic,
            position,
            ..Default::default()
        }
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_linear_velocity(mut self, v: Vec2) -> Self {
        self.linear_velocity = v;
        self
    }

    pub fn with_angular_velocity(mut self, w: f32) -> Self {
        self.angular_velocity = w;
        self
    }

    pub fn bullet(mut self) -> Self {
        self.bullet = true;
        self
    }

    pub fn fixed_rotation(mut self) -> Self {
        self.fixed_rotation = true;
        self
    }
}

/// A contact attached to a body, with the body on the other end. Lets the
/// island builder walk the contact graph body-to-body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEdge {
    pub contact: ContactHandle,
    pub other: BodyHandle,
}

/// A joint attached to a body. `collide_connected` is copied here so the
/// contact filter can consult it without a joint lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointEdge {
    pub joint: JointHandle,
    pub other: BodyHandle,
    pub collide_connected: bool,
}

#[derive(Debug)]
pub struct Body {
    pub(crate) body_type: BodyType,
    pub(crate) flags: BodyFlags,
    /// Index into the island state arrays while this body is being solved.
    pub(crate) island_index: usize,
    pub(crate) xf: Transform2,
    pub(crate) sweep: Sweep,
    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,
    pub(crate) force: Vec2,
    pub(crate) torque: f32,
    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    /// Rotational inertia about the center of mass.
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,
    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) gravity_scale: f32,
    pub(crate) sleep_time: f32,
    pub(crate) fixtures: Vec<FixtureHandle>,
    pub(crate) contact_edges: Vec<ContactEdge>,
    pub(crate) joint_edges: Vec<JointEdge>,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let mut flags = BodyFlags::empty();
        if def.allow_sleep {
            flags |= BodyFlags::AUTO_SLEEP;
        }
        if def.awake && def.body_type != BodyType::Static {
            flags |= BodyFlags::AWAKE;
        }
        if def.bullet {
            flags |= BodyFlags::BULLET;
        }
        if def.fixed_rotation {
            flags |= BodyFlags::FIXED_ROTATION;
        }
        if def.enabled {
            flags |= BodyFlags::ENABLED;
        }

        let xf = Transform2::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: def.position,
            c: def.position,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };

        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };

        Body {
            body_type: def.body_type,
            flags,
            island_index: 0,
            xf,
            sweep,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            fixtures: Vec::new(),
            contact_edges: Vec::new(),
            joint_edges: Vec::new(),
        }
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn transform(&self) -> &Transform2 {
        &self.xf
    }

    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    /// World position of the center of mass.
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.dot(v) > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = v;
    }

    pub fn set_angular_velocity(&mut self, w: f32) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = w;
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Rotational inertia about the body origin.
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.dot(self.sweep.local_center)
    }

    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping;
    }

    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping;
    }

    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }

    pub fn is_bullet(&self) -> bool {
        self.flags.contains(BodyFlags::BULLET)
    }

    pub fn set_bullet(&mut self, bullet: bool) {
        self.flags.set(BodyFlags::BULLET, bullet);
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.flags.contains(BodyFlags::FIXED_ROTATION)
    }

    pub fn is_awake(&self) -> bool {
        self.flags.contains(BodyFlags::AWAKE)
    }

    pub fn set_awake(&mut self, awake: bool) {
        if self.body_type == BodyType::Static {
            return;
        }
        if awake {
            self.flags.insert(BodyFlags::AWAKE);
        } else {
            self.flags.remove(BodyFlags::AWAKE);
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
        self.sleep_time = 0.0;
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(BodyFlags::ENABLED)
    }

    pub fn is_sleeping_allowed(&self) -> bool {
        self.flags.contains(BodyFlags::AUTO_SLEEP)
    }

    pub fn set_sleeping_allowed(&mut self, allowed: bool) {
        if allowed {
            self.flags.insert(BodyFlags::AUTO_SLEEP);
        } else {
            self.flags.remove(BodyFlags::AUTO_SLEEP);
            self.set_awake(true);
        }
    }

    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures
    }

    pub fn contact_edges(&self) -> &[ContactEdge] {
        &self.contact_edges
    }

    pub fn joint_edges(&self) -> &[JointEdge] {
        &self.joint_edges
    }

    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.apply(local_point)
    }

    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q.rotate(local_vector)
    }

    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.apply_inv(world_point)
    }

    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.q.inv_rotate(world_vector)
    }

    /// Velocity of a world point attached to this body.
    pub fn velocity_at_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity + cross_sv(self.angular_velocity, world_point - self.sweep.c)
    }

    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        // Forces on sleeping bodies vanish; waking them just to absorb a
        // force would defeat sleeping.
        if self.is_awake() {
            self.force += force;
            self.torque += cross(point - self.sweep.c, force);
        }
    }

    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        if self.is_awake() {
            self.force += force;
        }
    }

    pub fn apply_torque(&mut self, torque: f32, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        if self.is_awake() {
            self.torque += torque;
        }
    }

    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        if self.is_awake() {
            self.linear_velocity += self.inv_mass * impulse;
            self.angular_velocity += self.inv_inertia * cross(point - self.sweep.c, impulse);
        }
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        if self.is_awake() {
            self.angular_velocity += self.inv_inertia * impulse;
        }
    }

    /// Recompute mass, center of mass and inertia from the fixtures.
    pub(crate) fn reset_mass_data(&mut self, fixtures: &SlotMap<FixtureHandle, Fixture>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::ZERO;
        for &fh in &self.fixtures {
            let fixture = &fixtures[fh];
            if fixture.density == 0.0 {
                continue;
            }
            let md = fixture.mass_data();
            self.mass += md.mass;
            local_center += md.mass * md.center;
            self.inertia += md.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        } else {
            // Dynamic bodies always have mass one as a floor.
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if self.inertia > 0.0 && !self.flags.contains(BodyFlags::FIXED_ROTATION) {
            // Shift from the origin to the center of mass.
            self.inertia -= self.mass * local_center.dot(local_center);
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        // Moving the center of mass changes the velocity of the center.
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        let c = self.xf.apply(local_center);
        self.sweep.c0 = c;
        self.sweep.c = c;
        self.linear_velocity += cross_sv(self.angular_velocity, c - old_center);
    }

    /// Overwrite the transform and collapse the sweep onto it. The world
    /// wrapper re-synchronizes the broad-phase proxies afterwards.
    pub(crate) fn set_transform_internal(&mut self, position: Vec2, angle: f32) {
        self.xf = Transform2::new(position, angle);
        self.sweep.c = self.xf.apply(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    /// Pull the transform up to the sweep endpoint.
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf = Transform2::new(Vec2::ZERO, self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.rotate(self.sweep.local_center);
    }

    /// Advance to a mid-step time, used by the TOI solver.
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Whether any joint to `other` forbids collision between the pair.
    pub(crate) fn should_collide_connected(&self, other: BodyHandle) -> bool {
        for edge in &self.joint_edges {
            if edge.other == other && !edge.collide_connected {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::CircleShape;
    use crate::dynamics::fixture::{Fixture, FixtureDef};
    use approx::assert_relative_eq;

    fn body_with_circle(radius: f32, density: f32, offset: Vec2) -> Body {
        let mut fixtures: SlotMap<FixtureHandle, Fixture> = SlotMap::with_key();
        let mut body = Body::new(&BodyDef::dynamic_at(Vec2::ZERO));
        let shape = CircleShape::with_offset(radius, offset).unwrap();
        let fh = fixtures
            .insert(Fixture::new(BodyHandle::default(), FixtureDef::new(shape).with_density(density)).unwrap());
        body.fixtures.push(fh);
        body.reset_mass_data(&fixtures);
        body
    }

    #[test]
    fn mass_from_fixture_density() {
        let body = body_with_circle(1.0, 2.0, Vec2::ZERO);
        assert_relative_eq!(body.mass(), 2.0 * std::f32::consts::PI, epsilon = 1e-4);
    }

    #[test]
    fn offset_fixture_moves_center_of_mass() {
        let body = body_with_circle(0.5, 1.0, Vec2::new(2.0, 0.0));
        assert_relative_eq!(body.local_center().x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(body.world_center().x, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn massless_dynamic_body_gets_unit_mass() {
        let body = body_with_circle(1.0, 0.0, Vec2::ZERO);
        assert_eq!(body.mass(), 1.0);
        assert_eq!(body.inv_mass, 1.0);
    }

    #[test]
    fn static_body_ignores_velocity_and_forces() {
        let mut body = Body::new(&BodyDef::static_at(Vec2::ZERO));
        body.set_linear_velocity(Vec2::new(5.0, 0.0));
        body.apply_force_to_center(Vec2::new(100.0, 0.0), true);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.force, Vec2::ZERO);
        assert!(!body.is_awake());
    }

    #[test]
    fn sleep_clears_motion_state() {
        let mut body = Body::new(&BodyDef::dynamic_at(Vec2::ZERO));
        body.set_linear_velocity(Vec2::new(1.0, 0.0));
        body.apply_torque(2.0, true);
        body.set_awake(false);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.angular_velocity(), 0.0);
        assert_eq!(body.torque, 0.0);
    }

    #[test]
    fn forces_on_sleeping_body_without_wake_are_dropped() {
        let mut body = Body::new(&BodyDef::dynamic_at(Vec2::ZERO));
        body.set_awake(false);
        body.apply_force_to_center(Vec2::new(10.0, 0.0), false);
        assert_eq!(body.force, Vec2::ZERO);
        assert!(!body.is_awake());
    }

    #[test]
    fn velocity_at_point_includes_rotation() {
        let mut body = Body::new(&BodyDef::dynamic_at(Vec2::ZERO));
        body.set_angular_velocity(2.0);
        let v = body.velocity_at_world_point(Vec2::new(1.0, 0.0));
        assert_relative_eq!(v.y, 2.0, epsilon = 1e-6);
    }
}
