use crate::engine::octree::geometry_node::{GeometryNode, GeometryTraversal};
use crate::engine::octree::point_batch::PointBatch;
use bevy::render::mesh::MeshVertexAttributeId;
use bevy::render::primitives::{Aabb, Sphere as BoundingSphere};

/// A child slot in the octree: either bare geometry, or geometry that has
/// been turned into a renderable tree node.
pub enum NodeState<G: GeometryNode> {
    Geometry(G),
    Materialized(Box<PointCloudTreeNode<G>>),
}

impl<G: GeometryNode> NodeState<G> {
    pub fn is_geometry_node(&self) -> bool {
        matches!(self, NodeState::Geometry(_))
    }

    pub fn is_tree_node(&self) -> bool {
        matches!(self, NodeState::Materialized(_))
    }

    /// Geometry behind this slot, whichever state it is in.
    pub fn geometry(&self) -> &G {
        match self {
            NodeState::Geometry(geometry) => geometry,
            NodeState::Materialized(node) => node.geometry_node(),
        }
    }

    pub fn tree_node(&self) -> Option<&PointCloudTreeNode<G>> {
        match self {
            NodeState::Materialized(node) => Some(node.as_ref()),
            NodeState::Geometry(_) => None,
        }
    }

    pub fn tree_node_mut(&mut self) -> Option<&mut PointCloudTreeNode<G>> {
        match self {
            NodeState::Materialized(node) => Some(node.as_mut()),
            NodeState::Geometry(_) => None,
        }
    }

    pub fn id(&self) -> u32 {
        self.geometry().id()
    }

    pub fn num_points(&self) -> u32 {
        self.geometry().num_points()
    }
}

/// Pairs a geometry node with the point batch built from its points.
pub struct PointCloudTreeNode<G: GeometryNode> {
    geometry_node: G,
    scene_node: PointBatch,
    /// Child slots as they were when this node was created.
    pub children: Vec<Option<NodeState<G>>>,
}

impl<G: GeometryNode> PointCloudTreeNode<G> {
    pub fn new(geometry_node: G, scene_node: PointBatch) -> Self {
        let children = geometry_node
            .children()
            .into_iter()
            .map(|child| child.map(NodeState::Geometry))
            .collect();

        Self {
            geometry_node,
            scene_node,
            children,
        }
    }

    pub fn geometry_node(&self) -> &G {
        &self.geometry_node
    }

    pub fn scene_node(&self) -> &PointBatch {
        &self.scene_node
    }

    pub fn scene_node_mut(&mut self) -> &mut PointBatch {
        &mut self.scene_node
    }

    pub fn id(&self) -> u32 {
        self.geometry_node.id()
    }

    pub fn name(&self) -> String {
        self.geometry_node.name()
    }

    pub fn level(&self) -> u32 {
        self.geometry_node.level()
    }

    pub fn index(&self) -> usize {
        self.geometry_node.index()
    }

    pub fn is_leaf_node(&self) -> bool {
        self.geometry_node.is_leaf_node()
    }

    pub fn num_points(&self) -> u32 {
        self.geometry_node.num_points()
    }

    pub fn spacing(&self) -> f32 {
        self.geometry_node.spacing()
    }

    pub fn bounding_box(&self) -> Aabb {
        self.geometry_node.bounding_box()
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.geometry_node.bounding_sphere()
    }

    /// Release the geometry node's payload.
    pub fn dispose(&self) {
        self.geometry_node.dispose();
    }

    /// Release the point batch geometry. Large buffers go first.
    pub fn dispose_scene_node(&mut self) -> Vec<MeshVertexAttributeId> {
        self.scene_node.dispose()
    }

    pub fn traverse(&self, include_self: bool) -> GeometryTraversal<G> {
        self.geometry_node.traverse(include_self)
    }

    /// Materialized nodes of this subtree, depth first, self included.
    pub fn materialized(&self) -> Vec<&PointCloudTreeNode<G>> {
        let mut found = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            found.push(node);
            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .flatten()
                    .filter_map(NodeState::tree_node),
            );
        }
        found
    }

    /// Apply `f` to every materialized node of this subtree, self included.
    pub fn for_each_materialized_mut(&mut self, f: &mut impl FnMut(&mut PointCloudTreeNode<G>)) {
        f(self);
        for child in self.children.iter_mut().flatten() {
            if let Some(node) = child.tree_node_mut() {
                node.for_each_materialized_mut(f);
            }
        }
    }
}
