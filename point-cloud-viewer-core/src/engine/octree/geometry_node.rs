use bevy::prelude::*;
use bevy::render::primitives::{Aabb, Sphere as BoundingSphere};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

/// Where a geometry node is in its load lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// Point payload of one octree cell once it has been fetched and decoded.
#[derive(Clone, Debug, Default)]
pub struct PointBuffer {
    pub positions: Vec<[f32; 3]>,
    pub colours: Option<Vec<[f32; 4]>>,
    pub intensities: Option<Vec<f32>>,
}

impl PointBuffer {
    pub fn from_positions(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            ..default()
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// One octree cell as produced by the octree loader.
///
/// Implementors are cheap handles: cloning one must yield another handle to
/// the same node, so accessors observe later refinements.
pub trait GeometryNode: Clone {
    fn id(&self) -> u32;
    fn name(&self) -> String;
    fn level(&self) -> u32;
    /// Octant slot (0..8) in the parent.
    fn index(&self) -> usize;
    fn is_leaf_node(&self) -> bool;
    fn num_points(&self) -> u32;
    fn spacing(&self) -> f32;
    fn bounding_box(&self) -> Aabb;
    fn bounding_sphere(&self) -> BoundingSphere;
    /// Sparse octant children, absent octants are `None`.
    fn children(&self) -> Vec<Option<Self>>;
    fn load_state(&self) -> LoadState;
    /// Request the payload. Completion is reported by the loader.
    fn load(&self);
    /// Release the payload. Safe to call repeatedly.
    fn dispose(&self);
    /// Run `f` against the loaded payload, if any.
    fn with_points<R>(&self, f: impl FnOnce(&PointBuffer) -> R) -> Option<R>;

    fn is_loaded(&self) -> bool {
        self.load_state() == LoadState::Loaded
    }

    fn is_failed(&self) -> bool {
        self.load_state() == LoadState::Failed
    }

    /// Depth-first walk over this node's subtree.
    fn traverse(&self, include_self: bool) -> GeometryTraversal<Self> {
        GeometryTraversal::new(self, include_self)
    }
}

/// Lazy pre-order iterator over a geometry subtree, children in octant order.
pub struct GeometryTraversal<G> {
    stack: Vec<G>,
}

impl<G: GeometryNode> GeometryTraversal<G> {
    fn new(root: &G, include_self: bool) -> Self {
        let stack = if include_self {
            vec![root.clone()]
        } else {
            root.children().into_iter().rev().flatten().collect()
        };
        Self { stack }
    }
}

impl<G: GeometryNode> Iterator for GeometryTraversal<G> {
    type Item = G;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().into_iter().rev().flatten());
        Some(node)
    }
}

/// Split `aabb` in half along every axis and return octant `index`.
/// Bit 0 selects z, bit 1 selects y, bit 2 selects x.
pub fn create_child_aabb(aabb: &Aabb, index: usize) -> Aabb {
    let mut min = Vec3::from(aabb.min());
    let mut max = Vec3::from(aabb.max());
    let size = (max - min) * 0.5;

    if (index & 0b0001) > 0 {
        min.z += size.z;
    } else {
        max.z -= size.z;
    }
    if (index & 0b0010) > 0 {
        min.y += size.y;
    } else {
        max.y -= size.y;
    }
    if (index & 0b0100) > 0 {
        min.x += size.x;
    } else {
        max.x -= size.x;
    }

    Aabb::from_min_max(min, max)
}

/// Smallest sphere around `aabb`.
pub fn bounding_sphere_of(aabb: &Aabb) -> BoundingSphere {
    BoundingSphere {
        center: aabb.center,
        radius: aabb.half_extents.length(),
    }
}

#[derive(Debug)]
pub struct GeometryNodeData {
    pub id: u32,
    pub name: String,
    pub index: usize,
    pub level: u32,
    pub spacing: f32,
    pub bounding_box: Aabb,
    pub bounding_sphere: BoundingSphere,
    pub num_points: u32,
    pub is_leaf: bool,
    pub load_state: LoadState,
    pub points: Option<PointBuffer>,
    pub children: Vec<Option<PointCloudGeometryNode>>,
}

/// Shared handle to an in-memory octree cell.
#[derive(Clone, Debug)]
pub struct PointCloudGeometryNode(Rc<RefCell<GeometryNodeData>>);

impl PointCloudGeometryNode {
    /// Root cell of an octree.
    pub fn new_root(bounding_box: Aabb, spacing: f32) -> Self {
        Self::new("r".to_string(), 0, 0, bounding_box, spacing)
    }

    pub fn new(name: String, index: usize, level: u32, bounding_box: Aabb, spacing: f32) -> Self {
        Self(Rc::new(RefCell::new(GeometryNodeData {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            index,
            level,
            spacing,
            bounding_box,
            bounding_sphere: bounding_sphere_of(&bounding_box),
            num_points: 0,
            is_leaf: true,
            load_state: LoadState::Unloaded,
            points: None,
            children: Vec::new(),
        })))
    }

    pub fn data(&self) -> Ref<'_, GeometryNodeData> {
        self.0.borrow()
    }

    pub fn data_mut(&self) -> RefMut<'_, GeometryNodeData> {
        self.0.borrow_mut()
    }

    /// Create the child occupying `octant`, replacing any previous one.
    pub fn create_child(&self, octant: usize) -> PointCloudGeometryNode {
        let (name, bounding_box, spacing, level) = {
            let data = self.data();
            (
                format!("{}{}", data.name, octant),
                create_child_aabb(&data.bounding_box, octant),
                data.spacing / 2.0,
                data.level + 1,
            )
        };
        let child = PointCloudGeometryNode::new(name, octant, level, bounding_box, spacing);

        let mut data = self.data_mut();
        if data.children.len() <= octant {
            data.children.resize(octant + 1, None);
        }
        data.children[octant] = Some(child.clone());
        data.is_leaf = false;
        child
    }

    /// Append a raw entry to the children list.
    pub fn push_child(&self, child: Option<PointCloudGeometryNode>) {
        let mut data = self.data_mut();
        if child.is_some() {
            data.is_leaf = false;
        }
        data.children.push(child);
    }

    pub fn set_num_points(&self, num_points: u32) {
        self.data_mut().num_points = num_points;
    }

    /// Replace the bounding volume after a finer estimate became available.
    pub fn refine_bounds(&self, bounding_box: Aabb) {
        let mut data = self.data_mut();
        data.bounding_box = bounding_box;
        data.bounding_sphere = bounding_sphere_of(&bounding_box);
    }

    /// Complete a load with the decoded payload.
    pub fn set_points(&self, points: PointBuffer) {
        let mut data = self.data_mut();
        data.num_points = points.len() as u32;
        data.points = Some(points);
        data.load_state = LoadState::Loaded;
    }

    pub fn mark_failed(&self) {
        let mut data = self.data_mut();
        warn!("Loading geometry node {} failed", data.name);
        data.points = None;
        data.load_state = LoadState::Failed;
    }

    pub fn ptr_eq(&self, other: &PointCloudGeometryNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl GeometryNode for PointCloudGeometryNode {
    fn id(&self) -> u32 {
        self.data().id
    }

    fn name(&self) -> String {
        self.data().name.clone()
    }

    fn level(&self) -> u32 {
        self.data().level
    }

    fn index(&self) -> usize {
        self.data().index
    }

    fn is_leaf_node(&self) -> bool {
        self.data().is_leaf
    }

    fn num_points(&self) -> u32 {
        self.data().num_points
    }

    fn spacing(&self) -> f32 {
        self.data().spacing
    }

    fn bounding_box(&self) -> Aabb {
        self.data().bounding_box
    }

    fn bounding_sphere(&self) -> BoundingSphere {
        self.data().bounding_sphere.clone()
    }

    fn children(&self) -> Vec<Option<Self>> {
        self.data().children.clone()
    }

    fn load_state(&self) -> LoadState {
        self.data().load_state
    }

    fn load(&self) {
        let mut data = self.data_mut();
        if data.load_state == LoadState::Unloaded {
            debug!("Requesting geometry for node {}", data.name);
            data.load_state = LoadState::Loading;
        }
    }

    fn dispose(&self) {
        let mut data = self.data_mut();
        if matches!(data.load_state, LoadState::Loaded | LoadState::Loading) {
            data.points = None;
            data.load_state = LoadState::Unloaded;
        }
    }

    fn with_points<R>(&self, f: impl FnOnce(&PointBuffer) -> R) -> Option<R> {
        self.data().points.as_ref().map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_root() -> PointCloudGeometryNode {
        PointCloudGeometryNode::new_root(Aabb::from_min_max(Vec3::ZERO, Vec3::splat(8.0)), 1.0)
    }

    #[test]
    fn child_octants_split_the_parent_box() {
        let root = unit_root();
        let child = root.create_child(0b101);

        let bounds = child.bounding_box();
        assert_eq!(Vec3::from(bounds.min()), Vec3::new(4.0, 0.0, 4.0));
        assert_eq!(Vec3::from(bounds.max()), Vec3::new(8.0, 4.0, 8.0));
        assert_eq!(child.name(), "r5");
        assert_eq!(child.level(), 1);
        assert_eq!(child.index(), 5);
        assert_eq!(child.spacing(), 0.5);
        assert!(!root.is_leaf_node());
        assert!(child.is_leaf_node());
        assert_eq!(root.children().len(), 6);
        assert!(root.children()[0].is_none());
    }

    #[test]
    fn traversal_is_depth_first_in_octant_order() {
        let root = unit_root();
        let a = root.create_child(0);
        let b = root.create_child(3);
        a.create_child(1);
        b.create_child(2);

        let names: Vec<String> = root.traverse(true).map(|node| node.name()).collect();
        assert_eq!(names, ["r", "r0", "r01", "r3", "r32"]);

        let without_root: Vec<String> = root.traverse(false).map(|node| node.name()).collect();
        assert_eq!(without_root, ["r0", "r01", "r3", "r32"]);

        // Restartable: a second walk yields the same sequence.
        assert_eq!(root.traverse(true).count(), 5);
    }

    #[test]
    fn load_lifecycle() {
        let node = unit_root();
        assert_eq!(node.load_state(), LoadState::Unloaded);

        node.load();
        assert_eq!(node.load_state(), LoadState::Loading);

        node.set_points(PointBuffer::from_positions(vec![[0.0; 3]; 3]));
        assert!(node.is_loaded());
        assert_eq!(node.num_points(), 3);
        assert_eq!(node.with_points(|points| points.len()), Some(3));

        node.dispose();
        node.dispose();
        assert_eq!(node.load_state(), LoadState::Unloaded);
        assert!(node.with_points(|points| points.len()).is_none());
    }

    #[test]
    fn failed_nodes_stay_failed_after_dispose() {
        let node = unit_root();
        node.load();
        node.mark_failed();
        node.dispose();
        assert!(node.is_failed());
    }

    #[test]
    fn refined_bounds_update_the_sphere() {
        let node = unit_root();
        node.refine_bounds(Aabb::from_min_max(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)));
        let sphere = node.bounding_sphere();
        assert_eq!(Vec3::from(sphere.center), Vec3::new(1.0, 0.0, 0.0));
        assert!((sphere.radius - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bounding_sphere_reads_leave_the_node_borrowable() {
        let node = unit_root();
        let first = node.bounding_sphere();
        node.refine_bounds(Aabb::from_min_max(Vec3::ZERO, Vec3::splat(4.0)));
        let second = node.bounding_sphere();

        assert!(second.radius < first.radius);
        assert_eq!(Vec3::from(second.center), Vec3::splat(2.0));
    }

    #[test]
    fn node_ids_are_unique() {
        let root = unit_root();
        let child = root.create_child(1);
        assert_ne!(root.id(), child.id());
    }
}
