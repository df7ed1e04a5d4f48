//! The world: owns all bodies, fixtures, joints and contacts, and advances
//! the simulation with discrete island solving plus continuous sub-stepping
//! for fast bodies.

use glam::Vec2;
use log::{debug, trace};
use slotmap::{SecondaryMap, SlotMap};

use crate::collision::aabb::Aabb;
use crate::collision::distance::DistanceProxy;
use crate::collision::time_of_impact::{self, ToiInput, ToiState, ToiStats};
use crate::collision::RayCastInput;
use crate::dynamics::body::{Body, BodyDef, BodyFlags, BodyType, JointEdge};
use crate::dynamics::contact::{ContactFlags, ContactListener};
use crate::dynamics::contact_manager::ContactManager;
use crate::dynamics::fixture::{Filter, Fixture, FixtureDef};
use crate::dynamics::island::Island;
use crate::dynamics::joints::{Joint, JointDef};
use crate::dynamics::time_step::{Profile, TimeStep};
use crate::dynamics::{BodyHandle, ContactHandle, FixtureHandle, JointHandle};
use crate::error::PhysicsError;
use crate::settings::{MAX_SUB_STEPS, MAX_TOI_CONTACTS};

pub struct World {
    pub(crate) bodies: SlotMap<BodyHandle, Body>,
    pub(crate) fixtures: SlotMap<FixtureHandle, Fixture>,
    pub(crate) joints: SlotMap<JointHandle, Joint>,
    pub(crate) contact_manager: ContactManager,

    gravity: Vec2,
    listener: Option<Box<dyn ContactListener>>,

    allow_sleep: bool,
    warm_starting: bool,
    continuous_physics: bool,
    sub_stepping: bool,
    auto_clear_forces: bool,

    /// New fixtures or transforms need a broad-phase pass before stepping.
    new_contacts: bool,
    step_complete: bool,
    inv_dt0: f32,

    island: Island,
    island_stack: Vec<BodyHandle>,
    body_scratch: Vec<BodyHandle>,

    profile: Profile,
    toi_stats: ToiStats,
}

impl World {
    pub fn new(gravity: Vec2) -> Self {
        World {
            bodies: SlotMap::with_key(),
            fixtures: SlotMap::with_key(),
            joints: SlotMap::with_key(),
            contact_manager: ContactManager::new(),
            gravity,
            listener: None,
            allow_sleep: true,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            auto_clear_forces: true,
            new_contacts: false,
            step_complete: true,
            inv_dt0: 0.0,
            island: Island::default(),
            island_stack: Vec::new(),
            body_scratch: Vec::new(),
            profile: Profile::default(),
            toi_stats: ToiStats::default(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.listener = Some(listener);
    }

    pub fn clear_contact_listener(&mut self) {
        self.listener = None;
    }

    pub fn allow_sleeping(&self) -> bool {
        self.allow_sleep
    }

    pub fn set_allow_sleeping(&mut self, allow: bool) {
        if allow == self.allow_sleep {
            return;
        }
        self.allow_sleep = allow;
        if !allow {
            for (_, body) in self.bodies.iter_mut() {
                body.set_awake(true);
            }
        }
    }

    pub fn set_warm_starting(&mut self, enabled: bool) {
        self.warm_starting = enabled;
    }

    pub fn set_continuous_physics(&mut self, enabled: bool) {
        self.continuous_physics = enabled;
    }

    /// Sub-stepping finishes each TOI event in its own solver pass; slower
    /// but more accurate for stacked fast bodies.
    pub fn set_sub_stepping(&mut self, enabled: bool) {
        self.sub_stepping = enabled;
    }

    pub fn set_auto_clear_forces(&mut self, enabled: bool) {
        self.auto_clear_forces = enabled;
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn toi_stats(&self) -> &ToiStats {
        &self.toi_stats
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn contact_count(&self) -> usize {
        self.contact_manager.contact_count()
    }

    pub fn body(&self, handle: BodyHandle) -> &Body {
        &self.bodies[handle]
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> &mut Body {
        &mut self.bodies[handle]
    }

    pub fn try_body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies.iter()
    }

    pub fn fixture(&self, handle: FixtureHandle) -> &Fixture {
        &self.fixtures[handle]
    }

    pub fn joint(&self, handle: JointHandle) -> &Joint {
        &self.joints[handle]
    }

    pub fn joint_mut(&mut self, handle: JointHandle) -> &mut Joint {
        &mut self.joints[handle]
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointHandle, &Joint)> {
        self.joints.iter()
    }

    /// Move a mouse joint's target and wake the dragged body. Has no
    /// effect on other joint kinds.
    pub fn set_mouse_target(&mut self, handle: JointHandle, target: Vec2) {
        if let Joint::Mouse(mouse) = &mut self.joints[handle] {
            mouse.set_target(target);
            let body = mouse.body_b;
            self.bodies[body].set_awake(true);
        }
    }

    pub fn joint_anchor_a(&self, handle: JointHandle) -> Vec2 {
        self.joints[handle].anchor_a(&self.bodies)
    }

    pub fn joint_anchor_b(&self, handle: JointHandle) -> Vec2 {
        self.joints[handle].anchor_b(&self.bodies)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &crate::dynamics::contact::Contact> {
        self.contact_manager
            .contact_list
            .iter()
            .map(|&h| &self.contact_manager.contacts[h])
    }

    pub fn create_body(&mut self, def: BodyDef) -> BodyHandle {
        self.bodies.insert(Body::new(&def))
    }

    /// Destroy a body along with its joints, contacts and fixtures.
    pub fn destroy_body(&mut self, handle: BodyHandle) {
        let joint_handles: Vec<JointHandle> = self.bodies[handle]
            .joint_edges
            .iter()
            .map(|e| e.joint)
            .collect();
        for jh in joint_handles {
            let _ = self.destroy_joint(jh);
        }

        let contact_handles: Vec<ContactHandle> = self.bodies[handle]
            .contact_edges
            .iter()
            .map(|e| e.contact)
            .collect();
        for ch in contact_handles {
            self.contact_manager
                .destroy(ch, &mut self.bodies, &self.fixtures, &mut self.listener);
        }

        let fixture_handles = std::mem::take(&mut self.bodies[handle].fixtures);
        for fh in fixture_handles {
            if let Some(mut fixture) = self.fixtures.remove(fh) {
                fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
            }
        }

        self.bodies.remove(handle);
        debug!("destroyed body {handle:?}");
    }

    pub fn create_fixture(
        &mut self,
        body: BodyHandle,
        def: FixtureDef,
    ) -> Result<FixtureHandle, PhysicsError> {
        if !self.bodies.contains_key(body) {
            return Err(PhysicsError::StaleBodyHandle);
        }
        let fixture = Fixture::new(body, def)?;
        let handle = self.fixtures.insert(fixture);

        let xf = *self.bodies[body].transform();
        self.fixtures[handle].create_proxies(&mut self.contact_manager.broad_phase, handle, &xf);
        self.bodies[body].fixtures.push(handle);

        if self.fixtures[handle].density > 0.0 {
            self.bodies[body].reset_mass_data(&self.fixtures);
        }

        // The broad phase must look at the new proxies before solving.
        self.new_contacts = true;
        Ok(handle)
    }

    /// Enable or disable a body. A disabled body keeps its fixtures and
    /// joints but leaves the broad phase entirely, so it neither collides
    /// nor gets simulated until re-enabled.
    pub fn set_body_enabled(&mut self, handle: BodyHandle, enabled: bool) {
        if self.bodies[handle].is_enabled() == enabled {
            return;
        }

        if enabled {
            self.bodies[handle].flags.insert(BodyFlags::ENABLED);
            let xf = *self.bodies[handle].transform();
            for i in 0..self.bodies[handle].fixtures.len() {
                let fh = self.bodies[handle].fixtures[i];
                self.fixtures[fh].create_proxies(&mut self.contact_manager.broad_phase, fh, &xf);
            }
            self.new_contacts = true;
        } else {
            self.bodies[handle].flags.remove(BodyFlags::ENABLED);

            let contact_handles: Vec<ContactHandle> = self.bodies[handle]
                .contact_edges
                .iter()
                .map(|e| e.contact)
                .collect();
            for ch in contact_handles {
                self.contact_manager
                    .destroy(ch, &mut self.bodies, &self.fixtures, &mut self.listener);
            }

            for i in 0..self.bodies[handle].fixtures.len() {
                let fh = self.bodies[handle].fixtures[i];
                self.fixtures[fh].destroy_proxies(&mut self.contact_manager.broad_phase);
            }
        }
    }

    /// Change a fixture's collision filter and re-run filtering on its
    /// existing contacts at the next step.
    pub fn set_filter(&mut self, handle: FixtureHandle, filter: Filter) {
        self.fixtures[handle].filter = filter;
        self.refilter(handle);
    }

    pub fn refilter(&mut self, handle: FixtureHandle) {
        let body = self.fixtures[handle].body;
        for edge in &self.bodies[body].contact_edges {
            let contact = &mut self.contact_manager.contacts[edge.contact];
            if contact.fixture_a == handle || contact.fixture_b == handle {
                contact.flag_for_filtering();
            }
        }
        for &proxy in &self.fixtures[handle].proxies {
            self.contact_manager.broad_phase.touch_proxy(proxy);
        }
        self.new_contacts = true;
    }

    pub fn create_joint(&mut self, def: JointDef) -> Result<JointHandle, PhysicsError> {
        let joint = self.build_joint(&def)?;

        let body_a = joint.body_a();
        let body_b = joint.body_b();
        if body_a == body_b {
            return Err(PhysicsError::SelfJoint);
        }
        if !self.bodies.contains_key(body_a) || !self.bodies.contains_key(body_b) {
            return Err(PhysicsError::StaleBodyHandle);
        }

        let collide_connected = joint.collide_connected();
        let handle = self.joints.insert(joint);

        self.bodies[body_a].joint_edges.push(JointEdge {
            joint: handle,
            other: body_b,
            collide_connected,
        });
        self.bodies[body_b].joint_edges.push(JointEdge {
            joint: handle,
            other: body_a,
            collide_connected,
        });

        // Existing contacts between the bodies may now be filtered out.
        if !collide_connected {
            self.flag_contacts_for_filtering(body_a, body_b);
        }

        Ok(handle)
    }

    fn build_joint(&self, def: &JointDef) -> Result<Joint, PhysicsError> {
        let joint = match def {
            JointDef::Distance(d) => Joint::Distance(
                crate::dynamics::joints::DistanceJoint::new(d),
            ),
            JointDef::Friction(d) => Joint::Friction(
                crate::dynamics::joints::FrictionJoint::new(d),
            ),
            JointDef::Gear(d) => Joint::Gear(crate::dynamics::joints::GearJoint::new(
                d,
                &self.joints,
                &self.bodies,
            )?),
            JointDef::Motor(d) => Joint::Motor(crate::dynamics::joints::MotorJoint::new(d)),
            JointDef::Mouse(d) => {
                if !self.bodies.contains_key(d.body_b) {
                    return Err(PhysicsError::StaleBodyHandle);
                }
                Joint::Mouse(crate::dynamics::joints::MouseJoint::new(d, &self.bodies))
            }
            JointDef::Prismatic(d) => {
                Joint::Prismatic(crate::dynamics::joints::PrismaticJoint::new(d))
            }
            JointDef::Pulley(d) => Joint::Pulley(crate::dynamics::joints::PulleyJoint::new(d)),
            JointDef::Revolute(d) => {
                Joint::Revolute(crate::dynamics::joints::RevoluteJoint::new(d))
            }
            JointDef::Weld(d) => Joint::Weld(crate::dynamics::joints::WeldJoint::new(d)),
            JointDef::Wheel(d) => Joint::Wheel(crate::dynamics::joints::WheelJoint::new(d)),
        };
        Ok(joint)
    }

    pub fn destroy_joint(&mut self, handle: JointHandle) -> Result<(), PhysicsError> {
        let joint = self
            .joints
            .remove(handle)
            .ok_or(PhysicsError::StaleJointHandle)?;

        let body_a = joint.body_a();
        let body_b = joint.body_b();
        let collide_connected = joint.collide_connected();

        if let Some(body) = self.bodies.get_mut(body_a) {
            body.set_awake(true);
            body.joint_edges.retain(|e| e.joint != handle);
        }
        if let Some(body) = self.bodies.get_mut(body_b) {
            body.set_awake(true);
            body.joint_edges.retain(|e| e.joint != handle);
        }

        // Contacts suppressed by the joint become valid again.
        if !collide_connected
            && self.bodies.contains_key(body_a)
            && self.bodies.contains_key(body_b)
        {
            self.flag_contacts_for_filtering(body_a, body_b);
        }

        Ok(())
    }

    fn flag_contacts_for_filtering(&mut self, body_a: BodyHandle, body_b: BodyHandle) {
        for edge in &self.bodies[body_b].contact_edges {
            if edge.other == body_a {
                self.contact_manager.contacts[edge.contact].flag_for_filtering();
            }
        }
    }

    /// Move a body immediately. Teleporting is not physical: any overlap
    /// created here is resolved over the following steps.
    pub fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: f32) {
        let body = &mut self.bodies[handle];
        body.set_transform_internal(position, angle);
        let xf = *body.transform();

        let fixture_handles = body.fixtures.clone();
        for fh in fixture_handles {
            self.fixtures[fh].synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
        }
        self.new_contacts = true;
    }

    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    /// Find a fixture whose shape contains the world point, if any.
    pub fn test_point(&self, point: Vec2) -> Option<FixtureHandle> {
        let aabb = Aabb {
            min: point,
            max: point,
        };
        let mut hit = None;
        self.query_aabb(&aabb, |handle, _child| {
            let fixture = &self.fixtures[handle];
            let xf = self.bodies[fixture.body].transform();
            if fixture.test_point(xf, point) {
                hit = Some(handle);
                return false;
            }
            true
        });
        hit
    }

    /// Report every fixture whose fat AABB overlaps the query box. Return
    /// false from the callback to stop early.
    pub fn query_aabb(&self, aabb: &Aabb, mut callback: impl FnMut(FixtureHandle, usize) -> bool) {
        self.contact_manager.broad_phase.query(aabb, |proxy| {
            let fp = self.contact_manager.broad_phase.data(proxy);
            callback(fp.fixture, fp.child_index)
        });
    }

    /// Cast a ray through the world. The callback receives each fixture hit
    /// with the hit point, normal and fraction, and returns a new maximum
    /// fraction: 0 terminates the cast, the given fraction clips the ray to
    /// the hit (closest-hit search), and 1 continues unclipped.
    pub fn ray_cast(
        &self,
        p1: Vec2,
        p2: Vec2,
        mut callback: impl FnMut(FixtureHandle, Vec2, Vec2, f32) -> f32,
    ) {
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: 1.0,
        };
        self.contact_manager
            .broad_phase
            .ray_cast(&input, |sub_input, proxy| {
                let fp = self.contact_manager.broad_phase.data(proxy);
                let fixture = &self.fixtures[fp.fixture];
                let xf = self.bodies[fixture.body].transform();

                if let Some(output) = fixture.ray_cast(sub_input, xf, fp.child_index) {
                    let fraction = output.fraction;
                    let point = (1.0 - fraction) * sub_input.p1 + fraction * sub_input.p2;
                    callback(fp.fixture, point, output.normal, fraction)
                } else {
                    sub_input.max_fraction
                }
            });
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32, velocity_iterations: usize, position_iterations: usize) {
        let step_timer = std::time::Instant::now();
        self.profile = Profile::default();

        if self.new_contacts {
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures);
            self.new_contacts = false;
        }

        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        let step = TimeStep {
            dt,
            inv_dt,
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.warm_starting,
        };

        let collide_timer = std::time::Instant::now();
        self.contact_manager
            .collide(&mut self.bodies, &self.fixtures, &mut self.listener);
        self.profile.collide = collide_timer.elapsed().as_secs_f32() * 1000.0;

        if self.step_complete && step.dt > 0.0 {
            self.solve(step);
        }

        if self.continuous_physics && step.dt > 0.0 {
            let toi_timer = std::time::Instant::now();
            self.solve_toi(step);
            self.profile.solve_toi = toi_timer.elapsed().as_secs_f32() * 1000.0;
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.auto_clear_forces {
            self.clear_forces();
        }

        self.profile.step = step_timer.elapsed().as_secs_f32() * 1000.0;
    }

    /// Build islands by flood fill over awake bodies and solve each one.
    fn solve(&mut self, step: TimeStep) {
        for (_, body) in self.bodies.iter_mut() {
            body.flags.remove(BodyFlags::ISLAND);
        }
        for &ch in &self.contact_manager.contact_list {
            self.contact_manager.contacts[ch]
                .flags
                .remove(ContactFlags::ISLAND);
        }
        let mut joint_in_island: SecondaryMap<JointHandle, ()> = SecondaryMap::new();

        self.body_scratch.clear();
        self.body_scratch.extend(self.bodies.keys());

        for seed_index in 0..self.body_scratch.len() {
            let seed = self.body_scratch[seed_index];
            {
                let body = &self.bodies[seed];
                if body.flags.contains(BodyFlags::ISLAND)
                    || !body.is_awake()
                    || !body.is_enabled()
                    || body.body_type == BodyType::Static
                {
                    continue;
                }
            }

            self.island.clear();
            self.island_stack.clear();
            self.island_stack.push(seed);
            self.bodies[seed].flags.insert(BodyFlags::ISLAND);

            while let Some(handle) = self.island_stack.pop() {
                self.island.add_body(handle, &mut self.bodies[handle]);

                // Islands stay awake as a unit. Raise the flag directly so
                // the sleep timer keeps accumulating across steps.
                self.bodies[handle].flags.insert(BodyFlags::AWAKE);

                // Static bodies anchor an island without growing it.
                if self.bodies[handle].body_type == BodyType::Static {
                    continue;
                }

                for i in 0..self.bodies[handle].contact_edges.len() {
                    let edge = self.bodies[handle].contact_edges[i];
                    let contact = &mut self.contact_manager.contacts[edge.contact];

                    if contact.flags.contains(ContactFlags::ISLAND)
                        || !contact.is_enabled()
                        || !contact.is_touching()
                    {
                        continue;
                    }
                    if self.fixtures[contact.fixture_a].is_sensor
                        || self.fixtures[contact.fixture_b].is_sensor
                    {
                        continue;
                    }

                    contact.flags.insert(ContactFlags::ISLAND);
                    self.island.add_contact(edge.contact);

                    let other = edge.other;
                    if !self.bodies[other].flags.contains(BodyFlags::ISLAND) {
                        self.bodies[other].flags.insert(BodyFlags::ISLAND);
                        self.island_stack.push(other);
                    }
                }

                for i in 0..self.bodies[handle].joint_edges.len() {
                    let edge = self.bodies[handle].joint_edges[i];
                    if joint_in_island.contains_key(edge.joint) {
                        continue;
                    }
                    if !self.bodies[edge.other].is_enabled() {
                        continue;
                    }

                    joint_in_island.insert(edge.joint, ());
                    self.island.add_joint(edge.joint);

                    if !self.bodies[edge.other].flags.contains(BodyFlags::ISLAND) {
                        self.bodies[edge.other].flags.insert(BodyFlags::ISLAND);
                        self.island_stack.push(edge.other);
                    }
                }
            }

            self.island.solve(
                &mut self.profile,
                step,
                self.gravity,
                self.allow_sleep,
                &mut self.bodies,
                &self.fixtures,
                &mut self.contact_manager.contacts,
                &mut self.joints,
                &mut self.listener,
            );

            // Static bodies can participate in several islands.
            for i in 0..self.island.bodies.len() {
                let handle = self.island.bodies[i];
                if self.bodies[handle].body_type == BodyType::Static {
                    self.bodies[handle].flags.remove(BodyFlags::ISLAND);
                }
            }
        }

        let broad_phase_timer = std::time::Instant::now();
        for i in 0..self.body_scratch.len() {
            let handle = self.body_scratch[i];
            let body = &self.bodies[handle];
            if !body.flags.contains(BodyFlags::ISLAND) || body.body_type == BodyType::Static {
                continue;
            }
            self.synchronize_fixtures(handle);
        }
        self.contact_manager
            .find_new_contacts(&mut self.bodies, &self.fixtures);
        self.profile.broad_phase = broad_phase_timer.elapsed().as_secs_f32() * 1000.0;
    }

    fn synchronize_fixtures(&mut self, handle: BodyHandle) {
        let body = &self.bodies[handle];
        let xf2 = *body.transform();
        let fixture_handles = body.fixtures.clone();

        if body.is_awake() {
            let xf1 = body.sweep.transform(0.0);
            for fh in fixture_handles {
                self.fixtures[fh].synchronize(&mut self.contact_manager.broad_phase, &xf1, &xf2);
            }
        } else {
            for fh in fixture_handles {
                self.fixtures[fh].synchronize(&mut self.contact_manager.broad_phase, &xf2, &xf2);
            }
        }
    }

    /// Continuous collision: find the earliest time of impact among moving
    /// contacts, advance the involved bodies to it, and solve a sub-step so
    /// fast bodies never tunnel through thin geometry.
    fn solve_toi(&mut self, step: TimeStep) {
        if self.step_complete {
            for (_, body) in self.bodies.iter_mut() {
                body.flags.remove(BodyFlags::ISLAND);
                body.sweep.alpha0 = 0.0;
            }
            for &ch in &self.contact_manager.contact_list {
                let contact = &mut self.contact_manager.contacts[ch];
                contact
                    .flags
                    .remove(ContactFlags::TOI | ContactFlags::ISLAND);
                contact.toi_count = 0;
                contact.toi = 1.0;
            }
        }

        // Sub-step until no TOI event remains inside this step.
        loop {
            let mut min_contact: Option<ContactHandle> = None;
            let mut min_alpha = 1.0f32;

            for i in 0..self.contact_manager.contact_list.len() {
                let ch = self.contact_manager.contact_list[i];
                let contact = &self.contact_manager.contacts[ch];

                if !contact.is_enabled() {
                    continue;
                }
                if contact.toi_count > MAX_SUB_STEPS as u32 {
                    continue;
                }

                let alpha;
                if contact.flags.contains(ContactFlags::TOI) {
                    alpha = contact.toi;
                } else {
                    let fixture_a = contact.fixture_a;
                    let fixture_b = contact.fixture_b;
                    if self.fixtures[fixture_a].is_sensor || self.fixtures[fixture_b].is_sensor {
                        continue;
                    }

                    let body_a = contact.body_a;
                    let body_b = contact.body_b;
                    let child_a = contact.child_a;
                    let child_b = contact.child_b;
                    {
                        let ba = &self.bodies[body_a];
                        let bb = &self.bodies[body_b];

                        let active_a = ba.is_awake() && ba.body_type != BodyType::Static;
                        let active_b = bb.is_awake() && bb.body_type != BodyType::Static;
                        if !active_a && !active_b {
                            continue;
                        }

                        let collide_a = ba.is_bullet() || ba.body_type != BodyType::Dynamic;
                        let collide_b = bb.is_bullet() || bb.body_type != BodyType::Dynamic;
                        if !collide_a && !collide_b {
                            continue;
                        }
                    }

                    // Advance both sweeps to the later alpha0 so the TOI
                    // query starts from a common time.
                    let alpha0;
                    {
                        let a0_a = self.bodies[body_a].sweep.alpha0;
                        let a0_b = self.bodies[body_b].sweep.alpha0;
                        if a0_a < a0_b {
                            alpha0 = a0_b;
                            self.bodies[body_a].sweep.advance(alpha0);
                        } else if a0_b < a0_a {
                            alpha0 = a0_a;
                            self.bodies[body_b].sweep.advance(alpha0);
                        } else {
                            alpha0 = a0_a;
                        }
                    }
                    debug_assert!(alpha0 < 1.0);

                    let input = ToiInput {
                        proxy_a: DistanceProxy::from_shape(
                            &self.fixtures[fixture_a].shape,
                            child_a,
                        ),
                        proxy_b: DistanceProxy::from_shape(
                            &self.fixtures[fixture_b].shape,
                            child_b,
                        ),
                        sweep_a: self.bodies[body_a].sweep,
                        sweep_b: self.bodies[body_b].sweep,
                        t_max: 1.0,
                    };
                    let output = time_of_impact::time_of_impact(&input, &mut self.toi_stats);

                    let beta = output.t;
                    alpha = if output.state == ToiState::Touching {
                        (alpha0 + (1.0 - alpha0) * beta).min(1.0)
                    } else {
                        1.0
                    };

                    let contact = &mut self.contact_manager.contacts[ch];
                    contact.toi = alpha;
                    contact.flags.insert(ContactFlags::TOI);
                }

                if alpha < min_alpha {
                    min_contact = Some(ch);
                    min_alpha = alpha;
                }
            }

            let Some(min_handle) = min_contact else {
                self.step_complete = true;
                break;
            };
            if min_alpha > 1.0 - 10.0 * f32::EPSILON {
                self.step_complete = true;
                break;
            }

            // Advance the two bodies to the impact time and refresh the
            // contact there.
            let (body_a, body_b) = {
                let contact = &self.contact_manager.contacts[min_handle];
                (contact.body_a, contact.body_b)
            };
            let backup_a = self.bodies[body_a].sweep;
            let backup_b = self.bodies[body_b].sweep;

            self.bodies[body_a].advance(min_alpha);
            self.bodies[body_b].advance(min_alpha);

            self.contact_manager.contacts[min_handle].update(
                &self.fixtures,
                &mut self.bodies,
                &mut self.listener,
            );
            {
                let contact = &mut self.contact_manager.contacts[min_handle];
                contact.flags.remove(ContactFlags::TOI);
                contact.toi_count += 1;
            }

            // A speculative miss: roll the bodies back and look again.
            let contact = &self.contact_manager.contacts[min_handle];
            if !contact.is_enabled() || !contact.is_touching() {
                self.contact_manager.contacts[min_handle].set_enabled(false);
                self.bodies[body_a].sweep = backup_a;
                self.bodies[body_b].sweep = backup_b;
                self.bodies[body_a].synchronize_transform();
                self.bodies[body_b].synchronize_transform();
                continue;
            }

            self.bodies[body_a].set_awake(true);
            self.bodies[body_b].set_awake(true);

            // Build a small island around the impact: the two bodies, their
            // touching contacts, one ring out.
            self.island.clear();
            self.island.add_body(body_a, &mut self.bodies[body_a]);
            self.island.add_body(body_b, &mut self.bodies[body_b]);
            self.island.add_contact(min_handle);

            self.bodies[body_a].flags.insert(BodyFlags::ISLAND);
            self.bodies[body_b].flags.insert(BodyFlags::ISLAND);
            self.contact_manager.contacts[min_handle]
                .flags
                .insert(ContactFlags::ISLAND);

            for seed in [body_a, body_b] {
                if self.bodies[seed].body_type != BodyType::Dynamic {
                    continue;
                }
                self.grow_toi_island(seed, min_alpha);
            }

            trace!(
                "toi sub-step at alpha {min_alpha:.4}, island of {} bodies / {} contacts",
                self.island.bodies.len(),
                self.island.contacts.len()
            );

            let dt = (1.0 - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
                dt_ratio: 1.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: 20,
                warm_starting: false,
            };
            self.island.solve_toi(
                sub_step,
                self.bodies[body_a].island_index,
                self.bodies[body_b].island_index,
                &mut self.bodies,
                &self.fixtures,
                &mut self.contact_manager.contacts,
                &mut self.listener,
            );

            // Island flags off, broad phase refreshed, TOIs invalidated.
            for i in 0..self.island.bodies.len() {
                let handle = self.island.bodies[i];
                self.bodies[handle].flags.remove(BodyFlags::ISLAND);

                if self.bodies[handle].body_type != BodyType::Dynamic {
                    continue;
                }
                self.synchronize_fixtures(handle);

                for j in 0..self.bodies[handle].contact_edges.len() {
                    let edge = self.bodies[handle].contact_edges[j];
                    self.contact_manager.contacts[edge.contact]
                        .flags
                        .remove(ContactFlags::TOI | ContactFlags::ISLAND);
                }
            }

            // The sub-step may have pushed bodies into new overlaps.
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures);

            if self.sub_stepping {
                self.step_complete = false;
                break;
            }
        }
    }

    /// Pull the contacts of a TOI body into the island, advancing the other
    /// bodies to the impact time as they join.
    fn grow_toi_island(&mut self, seed: BodyHandle, min_alpha: f32) {
        for i in 0..self.bodies[seed].contact_edges.len() {
            if self.island.bodies.len() >= 2 * MAX_TOI_CONTACTS
                || self.island.contacts.len() >= MAX_TOI_CONTACTS
            {
                break;
            }

            let edge = self.bodies[seed].contact_edges[i];
            let ch = edge.contact;
            if self.contact_manager.contacts[ch]
                .flags
                .contains(ContactFlags::ISLAND)
            {
                continue;
            }

            let other = edge.other;

            // Only bullets bring other dynamic bodies into a TOI island.
            if self.bodies[other].body_type == BodyType::Dynamic
                && !self.bodies[seed].is_bullet()
                && !self.bodies[other].is_bullet()
            {
                continue;
            }
            {
                let contact = &self.contact_manager.contacts[ch];
                if self.fixtures[contact.fixture_a].is_sensor
                    || self.fixtures[contact.fixture_b].is_sensor
                {
                    continue;
                }
            }

            let backup = self.bodies[other].sweep;
            if !self.bodies[other].flags.contains(BodyFlags::ISLAND) {
                self.bodies[other].advance(min_alpha);
            }

            self.contact_manager.contacts[ch].update(
                &self.fixtures,
                &mut self.bodies,
                &mut self.listener,
            );

            let contact = &self.contact_manager.contacts[ch];
            if !contact.is_enabled() || !contact.is_touching() {
                self.bodies[other].sweep = backup;
                self.bodies[other].synchronize_transform();
                continue;
            }

            self.contact_manager.contacts[ch]
                .flags
                .insert(ContactFlags::ISLAND);
            self.island.add_contact(ch);

            if self.bodies[other].flags.contains(BodyFlags::ISLAND) {
                continue;
            }
            self.bodies[other].flags.insert(BodyFlags::ISLAND);
            if self.bodies[other].body_type != BodyType::Static {
                self.bodies[other].set_awake(true);
            }
            self.island.add_body(other, &mut self.bodies[other]);
        }
    }
}
