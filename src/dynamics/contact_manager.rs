//! Contact lifecycle: the broad phase proposes fixture pairs, the manager
//! creates and destroys contacts and drives narrow-phase updates each step.

use slotmap::SlotMap;

use crate::collision::broad_phase::BroadPhase;
use crate::collision::collide;
use crate::collision::dynamic_tree::ProxyId;
use crate::dynamics::body::{Body, BodyType, ContactEdge};
use crate::dynamics::contact::{Contact, ContactFlags, ContactListener};
use crate::dynamics::fixture::{Fixture, FixtureProxy};
use crate::dynamics::{BodyHandle, ContactHandle, FixtureHandle};

#[derive(Debug)]
pub struct ContactManager {
    pub(crate) broad_phase: BroadPhase<FixtureProxy>,
    pub(crate) contacts: SlotMap<ContactHandle, Contact>,
    /// Insertion-ordered view of the contacts, iterated by the solver.
    pub(crate) contact_list: Vec<ContactHandle>,
    /// Scratch buffer for candidate pairs, reused across steps.
    pair_buffer: Vec<(ProxyId, ProxyId)>,
}

impl ContactManager {
    pub fn new() -> Self {
        ContactManager {
            broad_phase: BroadPhase::new(),
            contacts: SlotMap::with_key(),
            contact_list: Vec::new(),
            pair_buffer: Vec::new(),
        }
    }

    pub fn contact_count(&self) -> usize {
        self.contact_list.len()
    }

    /// Run the broad phase over proxies moved since the last step and
    /// create contacts for new overlapping pairs.
    pub(crate) fn find_new_contacts(
        &mut self,
        bodies: &mut SlotMap<BodyHandle, Body>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
    ) {
        let mut pairs = std::mem::take(&mut self.pair_buffer);
        pairs.clear();
        self.broad_phase.update_pairs(|a, b| pairs.push((a, b)));

        for &(proxy_a, proxy_b) in &pairs {
            let fp_a = *self.broad_phase.data(proxy_a);
            let fp_b = *self.broad_phase.data(proxy_b);
            self.add_pair(fp_a, fp_b, bodies, fixtures);
        }

        self.pair_buffer = pairs;
    }

    fn add_pair(
        &mut self,
        fp_a: FixtureProxy,
        fp_b: FixtureProxy,
        bodies: &mut SlotMap<BodyHandle, Body>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
    ) {
        let mut fixture_a = fp_a.fixture;
        let mut fixture_b = fp_b.fixture;
        let mut child_a = fp_a.child_index;
        let mut child_b = fp_b.child_index;

        let body_a = fixtures[fixture_a].body;
        let body_b = fixtures[fixture_b].body;

        // Fixtures on the same body never collide.
        if body_a == body_b {
            return;
        }

        // The pair may already have a contact, found through another proxy
        // pair of the same two fixtures.
        for edge in &bodies[body_b].contact_edges {
            if edge.other != body_a {
                continue;
            }
            let c = &self.contacts[edge.contact];
            let same = (c.fixture_a == fixture_a
                && c.fixture_b == fixture_b
                && c.child_a == child_a
                && c.child_b == child_b)
                || (c.fixture_a == fixture_b
                    && c.fixture_b == fixture_a
                    && c.child_a == child_b
                    && c.child_b == child_a);
            if same {
                return;
            }
        }

        if bodies[body_a].body_type != BodyType::Dynamic
            && bodies[body_b].body_type != BodyType::Dynamic
        {
            return;
        }
        if !bodies[body_b].should_collide_connected(body_a) {
            return;
        }
        if !fixtures[fixture_a]
            .filter
            .should_collide(&fixtures[fixture_b].filter)
        {
            return;
        }

        let shape_a = &fixtures[fixture_a].shape;
        let shape_b = &fixtures[fixture_b].shape;
        if !collide::pair_supported(shape_a, shape_b) {
            return;
        }
        // The narrow phase expects the higher-order shape first.
        if collide::rank(shape_a) < collide::rank(shape_b) {
            std::mem::swap(&mut fixture_a, &mut fixture_b);
            std::mem::swap(&mut child_a, &mut child_b);
        }

        let contact = Contact::new(fixture_a, child_a, fixture_b, child_b, fixtures);
        let body_a = contact.body_a;
        let body_b = contact.body_b;

        let handle = self.contacts.insert(contact);
        self.contact_list.push(handle);
        bodies[body_a].contact_edges.push(ContactEdge {
            contact: handle,
            other: body_b,
        });
        bodies[body_b].contact_edges.push(ContactEdge {
            contact: handle,
            other: body_a,
        });
    }

    pub(crate) fn destroy(
        &mut self,
        handle: ContactHandle,
        bodies: &mut SlotMap<BodyHandle, Body>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        let Some(contact) = self.contacts.remove(handle) else {
            return;
        };

        if contact.is_touching() {
            if let Some(listener) = listener {
                listener.end_contact(&contact);
            }
        }

        if contact.manifold.point_count > 0
            && !fixtures[contact.fixture_a].is_sensor
            && !fixtures[contact.fixture_b].is_sensor
        {
            bodies[contact.body_a].set_awake(true);
            bodies[contact.body_b].set_awake(true);
        }

        bodies[contact.body_a]
            .contact_edges
            .retain(|e| e.contact != handle);
        bodies[contact.body_b]
            .contact_edges
            .retain(|e| e.contact != handle);
        self.contact_list.retain(|&h| h != handle);
    }

    /// Narrow phase: refresh every contact's manifold, destroying contacts
    /// whose fat AABBs no longer overlap or that fail a refreshed filter.
    pub(crate) fn collide(
        &mut self,
        bodies: &mut SlotMap<BodyHandle, Body>,
        fixtures: &SlotMap<FixtureHandle, Fixture>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        let mut i = 0;
        while i < self.contact_list.len() {
            let handle = self.contact_list[i];
            let contact = &self.contacts[handle];
            let body_a = contact.body_a;
            let body_b = contact.body_b;
            let fixture_a = contact.fixture_a;
            let fixture_b = contact.fixture_b;
            let child_a = contact.child_a;
            let child_b = contact.child_b;

            if contact.flags.contains(ContactFlags::FILTER) {
                let keep = bodies[body_b].should_collide_connected(body_a)
                    && fixtures[fixture_a]
                        .filter
                        .should_collide(&fixtures[fixture_b].filter);
                if !keep {
                    self.destroy(handle, bodies, fixtures, listener);
                    continue;
                }
                self.contacts[handle].flags.remove(ContactFlags::FILTER);
            }

            let active_a =
                bodies[body_a].is_awake() && bodies[body_a].body_type != BodyType::Static;
            let active_b =
                bodies[body_b].is_awake() && bodies[body_b].body_type != BodyType::Static;
            if !active_a && !active_b {
                i += 1;
                continue;
            }

            let proxy_a = fixtures[fixture_a].proxies[child_a];
            let proxy_b = fixtures[fixture_b].proxies[child_b];
            if !self.broad_phase.test_overlap(proxy_a, proxy_b) {
                self.destroy(handle, bodies, fixtures, listener);
                continue;
            }

            self.contacts[handle].update(fixtures, bodies, listener);
            i += 1;
        }
    }
}
