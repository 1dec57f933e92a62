use crate::engine::assets::viewer_settings::ViewerSettings;
use crate::engine::budget::visibility::{PointCloudVisibility, VisibilityUpdateResult};
use crate::engine::camera::camera_view::CameraView;
use crate::engine::octree::geometry_node::PointCloudGeometryNode;
use crate::engine::octree::point_batch::BatchRender;
use crate::engine::octree::point_cloud_octree::PointCloudOctree;
use crate::engine::render::point_batch_material::PointBatchMaterial;
use crate::engine::systems::active_camera::active_camera_view;
use bevy::prelude::*;
use bevy::render::view::NoFrustumCulling;

/// Streamed point clouds and their shared point budget.
///
/// Geometry handles are reference counted without locking, so this lives in
/// the world as a non-send resource.
#[derive(Default)]
pub struct PointCloudScene {
    pub octrees: Vec<PointCloudOctree<PointCloudGeometryNode>>,
    pub visibility: PointCloudVisibility<PointCloudGeometryNode>,
    pub last_update: VisibilityUpdateResult,
    /// Material shared by every point batch entity, created on first sync.
    pub material: Option<Handle<PointBatchMaterial>>,
    /// Batches of disposed octrees, waiting to be despawned.
    released_renders: Vec<BatchRender>,
}

impl PointCloudScene {
    /// Register an octree and return its index.
    pub fn add_octree(&mut self, root: PointCloudGeometryNode, world_from_local: Mat4) -> usize {
        info!("Adding point cloud octree {}", self.octrees.len());
        self.octrees
            .push(PointCloudOctree::new(root).with_world_from_local(world_from_local));
        self.octrees.len() - 1
    }

    pub fn apply_settings(&mut self, settings: &ViewerSettings) {
        self.visibility.settings = settings.visibility();
        for octree in &mut self.octrees {
            octree.min_node_pixel_size = settings.min_node_pixel_size;
        }
    }

    pub fn update(&mut self, camera: &CameraView, viewport_height: f32) -> &VisibilityUpdateResult {
        self.last_update =
            self.visibility
                .update_point_clouds(&mut self.octrees, camera, viewport_height);
        &self.last_update
    }

    /// Octree index and node id of every visible node on `ray`.
    pub fn pick(&self, ray: &Ray3d) -> Vec<(usize, u32)> {
        self.octrees
            .iter()
            .enumerate()
            .flat_map(|(cloud, octree)| {
                octree
                    .nodes_on_ray(ray)
                    .into_iter()
                    .map(move |id| (cloud, id))
            })
            .collect()
    }

    /// Spawned batches released by any octree since the last call.
    pub fn take_released_renders(&mut self) -> Vec<BatchRender> {
        let mut released = std::mem::take(&mut self.released_renders);
        for octree in &mut self.octrees {
            released.extend(octree.take_released_renders());
        }
        released
    }

    pub fn dispose(&mut self) {
        for octree in &mut self.octrees {
            octree.dispose();
            self.released_renders.extend(octree.take_released_renders());
        }
        self.octrees.clear();
        self.visibility.clear();
    }
}

/// Tags the entity drawing one point batch.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointBatchEntity {
    pub cloud: usize,
    pub node: u32,
}

/// Run the visibility pass against the active camera.
pub fn update_point_cloud_visibility(
    mut scene: NonSendMut<PointCloudScene>,
    settings: Res<ViewerSettings>,
    cameras: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
) {
    if settings.is_changed() {
        scene.apply_settings(&settings);
        debug!("Point budget set to {}", settings.point_budget);
    }

    let Some((camera, viewport_height)) = active_camera_view(&cameras) else {
        return;
    };

    let result = scene.update(&camera, viewport_height);
    if result.node_load_failed {
        warn!("A visible point cloud node failed to load");
    }
    if !result.evicted_nodes.is_empty() {
        debug!("Evicted {} nodes over budget", result.evicted_nodes.len());
    }
}

/// Mirror point batches into entities: spawn newly materialized ones,
/// follow their visibility, and despawn released ones along with their mesh.
pub fn sync_point_batches(
    mut commands: Commands,
    mut scene: NonSendMut<PointCloudScene>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<PointBatchMaterial>>,
    mut batch_visibility: Query<&mut Visibility, With<PointBatchEntity>>,
) {
    let scene = &mut *scene;
    for render in scene.take_released_renders() {
        commands.entity(render.entity).despawn();
        meshes.remove(&render.mesh);
    }

    let material = scene
        .material
        .get_or_insert_with(|| materials.add(PointBatchMaterial::default()))
        .clone();

    for (cloud, octree) in scene.octrees.iter_mut().enumerate() {
        octree.for_each_materialized_mut(&mut |node| {
            let id = node.id();
            let batch = node.scene_node_mut();
            let visibility = if batch.visible {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            };

            if !batch.has_geometry() {
                // Scene node disposed directly, outside an unload.
                if let Some(render) = batch.render.take() {
                    commands.entity(render.entity).despawn();
                    meshes.remove(&render.mesh);
                }
                return;
            }

            if let Some(render) = &batch.render {
                if let Ok(mut entity_visibility) = batch_visibility.get_mut(render.entity) {
                    entity_visibility.set_if_neq(visibility);
                }
                return;
            }

            let Some(geometry) = &batch.geometry else {
                return;
            };
            let mesh = meshes.add(geometry.clone());
            let entity = commands
                .spawn((
                    Mesh3d(mesh.clone()),
                    MeshMaterial3d(material.clone()),
                    Transform::from_matrix(batch.world_from_local),
                    visibility,
                    NoFrustumCulling,
                    PointBatchEntity { cloud, node: id },
                ))
                .id();
            debug!("Spawned point batch for node {id} as {entity}");
            batch.render = Some(BatchRender { entity, mesh });
        });
    }
}
