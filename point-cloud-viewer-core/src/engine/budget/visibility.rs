use crate::engine::budget::lru::PointBudgetLru;
use crate::engine::camera::camera_view::CameraView;
use crate::engine::octree::geometry_node::{GeometryNode, LoadState};
use crate::engine::octree::point_cloud_octree::PointCloudOctree;
use crate::engine::octree::tree_node::NodeState;
use bevy::math::Affine3A;
use bevy::prelude::*;
use bevy::render::primitives::Frustum;
use constants::point_budget::{DEFAULT_POINT_BUDGET, MAX_LOADS_TO_GPU, MAX_NUM_NODES_LOADING};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Limits applied by every visibility pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibilitySettings {
    pub point_budget: u64,
    /// Loaded nodes turned into point batches per frame.
    pub max_loads_to_gpu: usize,
    /// Geometry loads in flight at once.
    pub max_num_nodes_loading: usize,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            point_budget: DEFAULT_POINT_BUDGET,
            max_loads_to_gpu: MAX_LOADS_TO_GPU,
            max_num_nodes_loading: MAX_NUM_NODES_LOADING,
        }
    }
}

/// Outcome of one visibility pass.
#[derive(Debug, Default)]
pub struct VisibilityUpdateResult {
    /// Ids of the nodes shown this frame, in visit order.
    pub visible_nodes: Vec<u32>,
    pub num_visible_points: u64,
    pub exceeded_max_loads_to_gpu: bool,
    pub node_load_failed: bool,
    /// Ids of nodes asked to start loading this frame.
    pub nodes_loading: Vec<u32>,
    /// Ids of nodes released to stay within the point budget.
    pub evicted_nodes: Vec<u32>,
}

struct QueueItem<G> {
    weight: f32,
    cloud: usize,
    path: Vec<usize>,
    geometry: G,
}

impl<G> PartialEq for QueueItem<G> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<G> Eq for QueueItem<G> {}

impl<G> PartialOrd for QueueItem<G> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<G> Ord for QueueItem<G> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight.total_cmp(&other.weight)
    }
}

/// Per-octree values derived from the camera once per pass.
struct CloudView {
    world_from_local: Affine3A,
    camera_position: Vec3,
}

/// Decides each frame which octree nodes are shown, loaded and evicted.
pub struct PointCloudVisibility<G: GeometryNode> {
    pub settings: VisibilitySettings,
    lru: PointBudgetLru<G>,
}

impl<G: GeometryNode> Default for PointCloudVisibility<G> {
    fn default() -> Self {
        Self::new(VisibilitySettings::default())
    }
}

impl<G: GeometryNode> PointCloudVisibility<G> {
    pub fn new(settings: VisibilitySettings) -> Self {
        Self {
            settings,
            lru: PointBudgetLru::new(settings.point_budget),
        }
    }

    pub fn lru(&self) -> &PointBudgetLru<G> {
        &self.lru
    }

    /// Drop every budget entry, for when the octrees they belong to are gone.
    pub fn clear(&mut self) {
        self.lru.clear();
    }

    /// Walk every octree from the most to the least significant node.
    pub fn update_point_clouds(
        &mut self,
        octrees: &mut [PointCloudOctree<G>],
        camera: &CameraView,
        viewport_height: f32,
    ) -> VisibilityUpdateResult {
        let mut result = VisibilityUpdateResult::default();
        let mut queue = BinaryHeap::new();
        let mut unloaded: Vec<G> = Vec::new();
        let mut loads_to_gpu = 0;
        let frustum = Frustum::from_clip_from_world(&camera.clip_from_world());

        let views: Vec<CloudView> = octrees
            .iter_mut()
            .enumerate()
            .map(|(cloud, octree)| {
                octree.visible_nodes.clear();
                octree.num_visible_points = 0;
                octree.hide_descendants();

                if octree.visible && !octree.is_disposed() {
                    queue.push(QueueItem {
                        weight: f32::MAX,
                        cloud,
                        path: Vec::new(),
                        geometry: octree.root().geometry().clone(),
                    });
                }

                CloudView {
                    world_from_local: Affine3A::from_mat4(octree.world_from_local),
                    camera_position: octree.world_from_local.inverse().transform_point3(camera.position),
                }
            })
            .collect();

        while let Some(item) = queue.pop() {
            let num_points = item.geometry.num_points() as u64;
            if result.num_visible_points + num_points > self.settings.point_budget {
                break;
            }

            let octree = &mut octrees[item.cloud];
            let view = &views[item.cloud];

            if item.geometry.level() > octree.max_level {
                continue;
            }
            let bounding_box = item.geometry.bounding_box();
            if !frustum.intersects_obb(&bounding_box, &view.world_from_local, false, false)
            {
                continue;
            }

            result.num_visible_points += num_points;
            octree.num_visible_points += num_points;

            let materialized = octree
                .node_at(&item.path)
                .is_some_and(NodeState::is_tree_node);

            if !materialized {
                match item.geometry.load_state() {
                    LoadState::Loaded if loads_to_gpu < self.settings.max_loads_to_gpu => {
                        loads_to_gpu += 1;
                        if let Err(error) = octree.to_tree_node(&item.path) {
                            warn!("Could not materialize node {}: {error}", item.geometry.name());
                            continue;
                        }
                    }
                    LoadState::Loaded => {
                        result.exceeded_max_loads_to_gpu = true;
                        continue;
                    }
                    LoadState::Failed => {
                        result.node_load_failed = true;
                        continue;
                    }
                    LoadState::Unloaded | LoadState::Loading => {
                        unloaded.push(item.geometry);
                        continue;
                    }
                }
            }

            let Some(node) = octree
                .node_at_mut(&item.path)
                .and_then(NodeState::tree_node_mut)
            else {
                continue;
            };
            self.lru.touch(node.geometry_node());
            node.scene_node_mut().visible = true;
            let id = node.id();

            octree.visible_nodes.push(id);
            result.visible_nodes.push(id);

            let node = octree
                .node_at(&item.path)
                .and_then(NodeState::tree_node);
            for (octant, child) in node.into_iter().flat_map(|node| node.children.iter().enumerate()) {
                let Some(child) = child else {
                    continue;
                };
                let Some(weight) = child_weight(
                    child.geometry(),
                    view,
                    camera,
                    viewport_height,
                    octree.min_node_pixel_size,
                ) else {
                    continue;
                };

                let mut path = item.path.clone();
                path.push(octant);
                queue.push(QueueItem {
                    weight,
                    cloud: item.cloud,
                    path,
                    geometry: child.geometry().clone(),
                });
            }
        }

        let in_flight = unloaded
            .iter()
            .filter(|node| node.load_state() == LoadState::Loading)
            .count();
        let free_slots = self.settings.max_num_nodes_loading.saturating_sub(in_flight);
        for node in unloaded
            .iter()
            .filter(|node| node.load_state() == LoadState::Unloaded)
            .take(free_slots)
        {
            node.load();
            result.nodes_loading.push(node.id());
        }

        self.lru.set_point_budget(self.settings.point_budget);
        for evicted in self.lru.free_memory() {
            for octree in octrees.iter_mut() {
                for id in octree.unload_node(evicted.id()) {
                    self.lru.remove(id);
                    result.evicted_nodes.push(id);
                }
            }
        }

        result
    }
}

/// Priority of a child node, or `None` when it is too small on screen.
fn child_weight<G: GeometryNode>(
    geometry: &G,
    view: &CloudView,
    camera: &CameraView,
    viewport_height: f32,
    min_node_pixel_size: f32,
) -> Option<f32> {
    let sphere = geometry.bounding_sphere();
    let distance = Vec3::from(sphere.center).distance(view.camera_position);
    let radius = sphere.radius;

    let screen_pixel_radius = camera.projected_radius(radius, distance, viewport_height);
    if screen_pixel_radius < min_node_pixel_size {
        return None;
    }

    Some(if distance < radius {
        f32::MAX
    } else {
        screen_pixel_radius + 1.0 / distance
    })
}
