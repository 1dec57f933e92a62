use crate::engine::octree::geometry_node::GeometryNode;
use bevy::prelude::*;
use constants::point_budget::DEFAULT_POINT_BUDGET;
use lru::LruCache;

struct LruEntry<G> {
    node: G,
    num_points: u64,
}

/// Materialized geometry nodes keyed by id, least recently used first.
pub struct PointBudgetLru<G: GeometryNode> {
    entries: LruCache<u32, LruEntry<G>>,
    num_points: u64,
    point_budget: u64,
}

impl<G: GeometryNode> Default for PointBudgetLru<G> {
    fn default() -> Self {
        Self::new(DEFAULT_POINT_BUDGET)
    }
}

impl<G: GeometryNode> PointBudgetLru<G> {
    pub fn new(point_budget: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            num_points: 0,
            point_budget,
        }
    }

    pub fn point_budget(&self) -> u64 {
        self.point_budget
    }

    pub fn set_point_budget(&mut self, point_budget: u64) {
        self.point_budget = point_budget;
    }

    /// Points held by every tracked node.
    pub fn num_points(&self) -> u64 {
        self.num_points
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains(&id)
    }

    /// Mark `node` as the most recently used.
    pub fn touch(&mut self, node: &G) {
        let id = node.id();
        if self.entries.contains(&id) {
            self.entries.promote(&id);
            return;
        }

        let num_points = node.num_points() as u64;
        self.num_points += num_points;
        self.entries.put(
            id,
            LruEntry {
                node: node.clone(),
                num_points,
            },
        );
    }

    pub fn remove(&mut self, id: u32) -> Option<G> {
        let entry = self.entries.pop(&id)?;
        self.num_points -= entry.num_points;
        Some(entry.node)
    }

    /// Forget every tracked node without disposing it.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.num_points = 0;
    }

    /// Evict least recently used nodes until the budget fits. The most
    /// recent node is never evicted.
    pub fn free_memory(&mut self) -> Vec<G> {
        let mut evicted = Vec::new();
        while self.num_points > self.point_budget && self.entries.len() > 1 {
            let Some((_, entry)) = self.entries.pop_lru() else {
                break;
            };
            self.num_points -= entry.num_points;
            evicted.push(entry.node);
        }

        if !evicted.is_empty() {
            debug!(
                "Evicted {} nodes, {} points remain of {}",
                evicted.len(),
                self.num_points,
                self.point_budget
            );
        }
        evicted
    }
}
