use glam::Vec2;

use crate::collision::RayCastInput;
use crate::collision::aabb::Aabb;
use crate::collision::dynamic_tree::{DynamicTree, ProxyId};

/// Broad phase: wraps the dynamic tree and buffers moved proxies so that
/// candidate pairs are generated in one batch per step instead of on every
/// individual move.
#[derive(Debug, Default)]
pub struct BroadPhase<T> {
    tree: DynamicTree<T>,
    moved: Vec<ProxyId>,
    /// Scratch pair buffer, reused across updates.
    pairs: Vec<(ProxyId, ProxyId)>,
}

impl<T> BroadPhase<T> {
    pub fn new() -> Self {
        BroadPhase {
            tree: DynamicTree::new(),
            moved: Vec::new(),
            pairs: Vec::new(),
        }
    }

    pub fn create_proxy(&mut self, aabb: Aabb, data: T) -> ProxyId {
        let id = self.tree.create_proxy(aabb, data);
        self.moved.push(id);
        id
    }

    pub fn destroy_proxy(&mut self, id: ProxyId) -> T {
        self.moved.retain(|&m| m != id);
        self.tree.destroy_proxy(id)
    }

    /// Update a proxy AABB; buffers the proxy for the next `update_pairs`
    /// when the tree actually changed.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: Aabb, displacement: Vec2) {
        if self.tree.move_proxy(id, aabb, displacement) {
            self.moved.push(id);
        }
    }

    /// Force pair regeneration for a proxy whose filtering changed without
    /// the AABB moving.
    pub fn touch_proxy(&mut self, id: ProxyId) {
        self.tree.mark_moved(id);
        self.moved.push(id);
    }

    pub fn test_overlap(&self, a: ProxyId, b: ProxyId) -> bool {
        self.tree.fat_aabb(a).overlaps(self.tree.fat_aabb(b))
    }

    pub fn data(&self, id: ProxyId) -> &T {
        self.tree.data(id)
    }

    pub fn fat_aabb(&self, id: ProxyId) -> &Aabb {
        self.tree.fat_aabb(id)
    }

    pub fn query(&self, aabb: &Aabb, callback: impl FnMut(ProxyId) -> bool) {
        self.tree.query(aabb, callback);
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        callback: impl FnMut(&RayCastInput, ProxyId) -> f32,
    ) {
        self.tree.ray_cast(input, callback);
    }

    pub fn tree_height(&self) -> i32 {
        self.tree.height()
    }

    /// Re-query the tree for every buffered moved proxy and report each
    /// unique overlapping candidate pair exactly once, ids ordered low-high.
    pub fn update_pairs(&mut self, mut callback: impl FnMut(ProxyId, ProxyId)) {
        self.pairs.clear();

        for i in 0..self.moved.len() {
            let query_id = self.moved[i];
            let fat = *self.tree.fat_aabb(query_id);

            let tree = &self.tree;
            let pairs = &mut self.pairs;
            tree.query(&fat, |id| {
                if id == query_id {
                    return true;
                }
                // When both proxies moved, only the lower id reports the
                // pair; the higher id's own query would double-count it.
                if tree.was_moved(id) && id > query_id {
                    return true;
                }
                pairs.push((query_id.min(id), query_id.max(id)));
                true
            });
        }

        self.pairs.sort_unstable();
        self.pairs.dedup();
        for &(a, b) in self.pairs.iter() {
            callback(a, b);
        }

        for &id in &self.moved {
            self.tree.clear_moved(id);
        }
        self.moved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb_at(x: f32, y: f32, half: f32) -> Aabb {
        Aabb {
            min: Vec2::new(x - half, y - half),
            max: Vec2::new(x + half, y + half),
        }
    }

    fn collect_pairs<T>(bp: &mut BroadPhase<T>) -> Vec<(ProxyId, ProxyId)> {
        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a, b)));
        pairs
    }

    #[test]
    fn overlapping_pair_reported_once_ordered() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(aabb_at(0.0, 0.0, 0.5), ());
        let b = bp.create_proxy(aabb_at(0.4, 0.0, 0.5), ());

        let pairs = collect_pairs(&mut bp);
        assert_eq!(pairs, vec![(a.min(b), a.max(b))]);
    }

    #[test]
    fn no_pairs_when_nothing_moved_since_last_update() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(aabb_at(0.0, 0.0, 0.5), ());
        bp.create_proxy(aabb_at(0.4, 0.0, 0.5), ());
        collect_pairs(&mut bp);

        // Second update with an empty move buffer.
        assert!(collect_pairs(&mut bp).is_empty());
    }

    #[test]
    fn both_members_moving_still_yields_one_pair() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(aabb_at(0.0, 0.0, 0.5), ());
        let b = bp.create_proxy(aabb_at(10.0, 0.0, 0.5), ());
        collect_pairs(&mut bp);

        bp.move_proxy(a, aabb_at(5.0, 0.0, 0.5), Vec2::new(5.0, 0.0));
        bp.move_proxy(b, aabb_at(5.3, 0.0, 0.5), Vec2::new(-4.7, 0.0));
        let pairs = collect_pairs(&mut bp);
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].0 < pairs[0].1);
    }

    #[test]
    fn dense_cluster_pair_count_is_exact() {
        // Five proxies all mutually overlapping: C(5,2) = 10 unique pairs.
        let mut bp = BroadPhase::new();
        for i in 0..5 {
            bp.create_proxy(aabb_at(i as f32 * 0.1, 0.0, 1.0), i);
        }
        let pairs = collect_pairs(&mut bp);
        assert_eq!(pairs.len(), 10);
        for &(a, b) in &pairs {
            assert!(a < b);
        }
    }

    #[test]
    fn touch_proxy_requeues_pairs() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(aabb_at(0.0, 0.0, 0.5), ());
        let b = bp.create_proxy(aabb_at(0.4, 0.0, 0.5), ());
        collect_pairs(&mut bp);

        bp.touch_proxy(a);
        let pairs = collect_pairs(&mut bp);
        assert_eq!(pairs, vec![(a.min(b), a.max(b))]);
    }

    #[test]
    fn destroyed_proxy_never_reported() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(aabb_at(0.0, 0.0, 0.5), ());
        let _b = bp.create_proxy(aabb_at(0.4, 0.0, 0.5), ());
        bp.destroy_proxy(a);
        assert!(collect_pairs(&mut bp).is_empty());
    }
}
