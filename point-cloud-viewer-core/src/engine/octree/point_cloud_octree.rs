use crate::engine::camera::ray_cast::ray_sphere_distance;
use crate::engine::octree::geometry_node::GeometryNode;
use crate::engine::octree::point_batch::{BatchRender, PointBatch};
use crate::engine::octree::tree_node::{NodeState, PointCloudTreeNode};
use bevy::prelude::*;
use constants::point_budget::DEFAULT_MIN_NODE_PIXEL_SIZE;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OctreeError {
    #[error("No octree node at path {0:?}")]
    NodeNotFound(Vec<usize>),
    #[error("Node {0} is already materialized")]
    AlreadyMaterialized(u32),
    #[error("Geometry for node {0} is not loaded")]
    GeometryNotLoaded(u32),
    #[error("Octree has been disposed")]
    Disposed,
}

/// One point cloud: an octree of geometry nodes, some of which have been
/// materialized into renderable tree nodes.
///
/// Nodes are addressed by their path of octant indices from the root. A
/// path only resolves through materialized parents, since the child slots
/// of bare geometry are not stored here.
pub struct PointCloudOctree<G: GeometryNode> {
    root: NodeState<G>,
    pub world_from_local: Mat4,
    pub visible: bool,
    pub min_node_pixel_size: f32,
    pub max_level: u32,
    /// Ids of the nodes shown this frame.
    pub visible_nodes: Vec<u32>,
    pub num_visible_points: u64,
    /// Spawned batches released since the last sync, waiting to be despawned.
    released_renders: Vec<BatchRender>,
    disposed: bool,
}

impl<G: GeometryNode> PointCloudOctree<G> {
    pub fn new(root: G) -> Self {
        Self {
            root: NodeState::Geometry(root),
            world_from_local: Mat4::IDENTITY,
            visible: true,
            min_node_pixel_size: DEFAULT_MIN_NODE_PIXEL_SIZE,
            max_level: u32::MAX,
            visible_nodes: Vec::new(),
            num_visible_points: 0,
            released_renders: Vec::new(),
            disposed: false,
        }
    }

    pub fn with_world_from_local(mut self, world_from_local: Mat4) -> Self {
        self.world_from_local = world_from_local;
        self
    }

    pub fn root(&self) -> &NodeState<G> {
        &self.root
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&NodeState<G>> {
        let mut state = &self.root;
        for &octant in path {
            state = state.tree_node()?.children.get(octant)?.as_ref()?;
        }
        Some(state)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut NodeState<G>> {
        let mut state = &mut self.root;
        for &octant in path {
            state = state.tree_node_mut()?.children.get_mut(octant)?.as_mut()?;
        }
        Some(state)
    }

    /// Replace the loaded geometry at `path` with a tree node carrying a
    /// freshly built point batch.
    pub fn to_tree_node(&mut self, path: &[usize]) -> Result<&mut PointCloudTreeNode<G>, OctreeError> {
        if self.disposed {
            return Err(OctreeError::Disposed);
        }
        let world_from_local = self.world_from_local;

        let slot = self
            .node_at_mut(path)
            .ok_or_else(|| OctreeError::NodeNotFound(path.to_vec()))?;
        let geometry = match &*slot {
            NodeState::Materialized(node) => {
                return Err(OctreeError::AlreadyMaterialized(node.id()));
            }
            NodeState::Geometry(geometry) => geometry.clone(),
        };

        let batch = geometry
            .with_points(|points| PointBatch::from_points(points, world_from_local))
            .filter(|_| geometry.is_loaded())
            .ok_or_else(|| OctreeError::GeometryNotLoaded(geometry.id()))?;

        debug!(
            "Materializing node {} with {} points",
            geometry.name(),
            geometry.num_points()
        );
        *slot = NodeState::Materialized(Box::new(PointCloudTreeNode::new(geometry, batch)));
        slot.tree_node_mut()
            .ok_or_else(|| OctreeError::NodeNotFound(path.to_vec()))
    }

    /// Materialized nodes, depth first from the root.
    pub fn materialized_nodes(&self) -> Vec<&PointCloudTreeNode<G>> {
        self.root
            .tree_node()
            .map(PointCloudTreeNode::materialized)
            .unwrap_or_default()
    }

    /// Apply `f` to every materialized node, parents before children.
    pub fn for_each_materialized_mut(&mut self, f: &mut impl FnMut(&mut PointCloudTreeNode<G>)) {
        if let Some(root) = self.root.tree_node_mut() {
            root.for_each_materialized_mut(f);
        }
    }

    pub fn take_released_renders(&mut self) -> Vec<BatchRender> {
        std::mem::take(&mut self.released_renders)
    }

    pub fn hide_descendants(&mut self) {
        if let Some(root) = self.root.tree_node_mut() {
            root.for_each_materialized_mut(&mut |node| node.scene_node_mut().visible = false);
        }
    }

    /// Revert the subtree rooted at node `id` to bare geometry, releasing
    /// every point batch and loaded geometry payload in it.
    /// Returns the ids of the released nodes.
    pub fn unload_node(&mut self, id: u32) -> Vec<u32> {
        let Some(slot) = find_slot_mut(&mut self.root, id) else {
            return Vec::new();
        };

        let geometry = slot.geometry().clone();
        let previous = std::mem::replace(slot, NodeState::Geometry(geometry.clone()));
        let mut released = Vec::new();
        let released_renders = &mut self.released_renders;

        if let NodeState::Materialized(mut node) = previous {
            node.for_each_materialized_mut(&mut |node| {
                released_renders.extend(node.scene_node_mut().render.take());
                node.dispose_scene_node();
                node.dispose();
                released.push(node.id());
            });
        }
        for descendant in geometry.traverse(true) {
            if descendant.is_loaded() {
                descendant.dispose();
                released.push(descendant.id());
            }
        }

        debug!("Unloaded node {} ({} released)", geometry.name(), released.len());
        released
    }

    /// Ids of visible materialized nodes whose world-space bounding sphere
    /// `ray` passes through.
    pub fn nodes_on_ray(&self, ray: &Ray3d) -> Vec<u32> {
        let radius_scale = max_axis_scale(&self.world_from_local);
        self.materialized_nodes()
            .into_iter()
            .filter(|node| node.scene_node().visible)
            .filter(|node| {
                let sphere = node.bounding_sphere();
                let center = self.world_from_local.transform_point3(sphere.center.into());
                ray_sphere_distance(ray, center, sphere.radius * radius_scale).is_some()
            })
            .map(PointCloudTreeNode::id)
            .collect()
    }

    /// Release everything this octree holds. Later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        let root_id = self.root.id();
        let released = self.unload_node(root_id);
        info!("Disposed point cloud octree ({} nodes released)", released.len());

        self.visible_nodes.clear();
        self.num_visible_points = 0;
        self.disposed = true;
    }
}

fn find_slot_mut<G: GeometryNode>(state: &mut NodeState<G>, id: u32) -> Option<&mut NodeState<G>> {
    if state.id() == id {
        return Some(state);
    }
    let NodeState::Materialized(node) = state else {
        return None;
    };
    node.children
        .iter_mut()
        .flatten()
        .find_map(|child| find_slot_mut(child, id))
}

/// Largest axis scale of `matrix`, used to grow bounding sphere radii.
fn max_axis_scale(matrix: &Mat4) -> f32 {
    Vec3::new(
        matrix.x_axis.truncate().length(),
        matrix.y_axis.truncate().length(),
        matrix.z_axis.truncate().length(),
    )
    .max_element()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::octree::geometry_node::{LoadState, PointBuffer, PointCloudGeometryNode};
    use bevy::render::primitives::Aabb;

    fn loaded(node: &PointCloudGeometryNode, count: usize) {
        node.set_points(PointBuffer::from_positions(vec![[0.5; 3]; count]));
    }

    /// Root with two children, child 1 has a grandchild in octant 3.
    fn sample_octree() -> PointCloudOctree<PointCloudGeometryNode> {
        let root = PointCloudGeometryNode::new_root(
            Aabb::from_min_max(Vec3::ZERO, Vec3::splat(8.0)),
            1.0,
        );
        let first = root.create_child(0);
        let second = root.create_child(1);
        let grandchild = second.create_child(3);
        loaded(&root, 10);
        loaded(&first, 5);
        loaded(&second, 5);
        loaded(&grandchild, 2);
        PointCloudOctree::new(root)
    }

    #[test]
    fn materializing_replaces_in_place() {
        let mut octree = sample_octree();
        octree.to_tree_node(&[]).unwrap();
        assert!(octree.root().is_tree_node());
        assert_eq!(octree.root().tree_node().unwrap().children.len(), 2);

        octree.to_tree_node(&[1]).unwrap();
        octree.to_tree_node(&[1, 3]).unwrap();

        let root = octree.root().tree_node().unwrap();
        assert_eq!(root.children.len(), 2);
        assert!(root.children[0].as_ref().unwrap().is_geometry_node());
        assert!(root.children[1].as_ref().unwrap().is_tree_node());
        assert_eq!(octree.node_at(&[1, 3]).unwrap().geometry().name(), "r13");
        assert_eq!(octree.materialized_nodes().len(), 3);
    }

    #[test]
    fn materializing_reports_caller_mistakes() {
        let mut octree = sample_octree();
        assert_eq!(
            octree.to_tree_node(&[0]).err(),
            Some(OctreeError::NodeNotFound(vec![0]))
        );

        let root_id = octree.to_tree_node(&[]).unwrap().id();
        assert_eq!(
            octree.to_tree_node(&[]).err(),
            Some(OctreeError::AlreadyMaterialized(root_id))
        );

        let unloaded = octree.node_at(&[0]).unwrap().geometry().clone();
        unloaded.dispose();
        assert_eq!(
            octree.to_tree_node(&[0]).err(),
            Some(OctreeError::GeometryNotLoaded(unloaded.id()))
        );

        octree.dispose();
        assert_eq!(octree.to_tree_node(&[1]).err(), Some(OctreeError::Disposed));
    }

    #[test]
    fn hide_descendants_clears_every_batch() {
        let mut octree = sample_octree();
        octree.to_tree_node(&[]).unwrap().scene_node_mut().visible = true;
        octree.to_tree_node(&[1]).unwrap().scene_node_mut().visible = true;

        octree.hide_descendants();
        assert!(octree.materialized_nodes().iter().all(|node| !node.scene_node().visible));
    }

    #[test]
    fn unloading_reverts_the_subtree() {
        let mut octree = sample_octree();
        octree.to_tree_node(&[]).unwrap();
        octree.to_tree_node(&[1]).unwrap();
        let second = octree.node_at(&[1]).unwrap().geometry().clone();

        let released = octree.unload_node(second.id());
        // The materialized child plus its loaded grandchild.
        assert_eq!(released.len(), 2);
        assert!(released.contains(&second.id()));
        assert!(octree.node_at(&[1]).unwrap().is_geometry_node());
        assert_eq!(second.load_state(), LoadState::Unloaded);
        assert!(second.traverse(true).all(|node| !node.is_loaded()));

        assert!(octree.unload_node(second.id()).is_empty());
        assert!(octree.unload_node(9_999_999).is_empty());
    }

    #[test]
    fn ray_picks_visible_nodes_only() {
        let mut octree = sample_octree().with_world_from_local(Mat4::from_translation(Vec3::X * 100.0));
        octree.to_tree_node(&[]).unwrap().scene_node_mut().visible = true;
        octree.to_tree_node(&[1]).unwrap();

        let root_id = octree.root().id();
        let ray = Ray3d {
            origin: Vec3::new(104.0, 4.0, 50.0),
            direction: Dir3::NEG_Z,
        };
        assert_eq!(octree.nodes_on_ray(&ray), vec![root_id]);

        let miss = Ray3d {
            origin: Vec3::new(4.0, 4.0, 50.0),
            direction: Dir3::NEG_Z,
        };
        assert!(octree.nodes_on_ray(&miss).is_empty());
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut octree = sample_octree();
        octree.to_tree_node(&[]).unwrap();
        let root = octree.root().geometry().clone();

        octree.dispose();
        assert!(octree.is_disposed());
        assert!(root.traverse(true).all(|node| !node.is_loaded()));
        assert!(octree.root().is_geometry_node());

        octree.dispose();
        assert!(octree.is_disposed());
    }

    #[test]
    fn unloading_hands_back_spawned_batches() {
        let mut octree = sample_octree();
        octree.to_tree_node(&[]).unwrap();
        octree.to_tree_node(&[1]).unwrap();
        let mut next_entity = 10;
        octree.for_each_materialized_mut(&mut |node| {
            node.scene_node_mut().render = Some(BatchRender {
                entity: Entity::from_raw(next_entity),
                mesh: Handle::default(),
            });
            next_entity += 1;
        });

        let child_id = octree.node_at(&[1]).unwrap().id();
        octree.unload_node(child_id);
        let released = octree.take_released_renders();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].entity, Entity::from_raw(11));
        assert!(octree.take_released_renders().is_empty());

        octree.dispose();
        assert_eq!(octree.take_released_renders()[0].entity, Entity::from_raw(10));
    }
}
