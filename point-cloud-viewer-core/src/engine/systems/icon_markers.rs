use crate::engine::assets::viewer_settings::ViewerSettings;
use crate::engine::camera::camera_view::CameraView;
use crate::engine::icons::adaptive_icon::{AdaptiveIconMarker, PixelBand};
use crate::engine::icons::alpha_buffer::AlphaAttributeBuffer;
use crate::engine::icons::scene_handler::{CustomObjectId, SceneHandler};
use crate::engine::systems::active_camera::active_camera_view;
use bevy::prelude::*;
use bevy::render::mesh::PrimitiveTopology;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::view::NoFrustumCulling;
use constants::texture::ALPHA_VISIBLE;

/// Every adaptive icon marker in the scene, indexed by alpha slot.
#[derive(Resource, Default)]
pub struct IconMarkers {
    markers: Vec<AdaptiveIconMarker>,
    pixel_band: PixelBand,
}

impl IconMarkers {
    /// Create a marker at `position`, giving it the next alpha slot.
    pub fn add_marker(
        &mut self,
        position: Vec3,
        scene: &mut SceneHandler,
        alpha: &mut AlphaAttributeBuffer,
    ) -> &AdaptiveIconMarker {
        let alpha_index = self.markers.len();
        alpha.grow_to(alpha_index + 1);

        let marker =
            AdaptiveIconMarker::new(position, scene, alpha_index).with_pixel_band(self.pixel_band);
        self.markers.push(marker);
        &self.markers[alpha_index]
    }

    pub fn markers(&self) -> &[AdaptiveIconMarker] {
        &self.markers
    }

    pub fn set_pixel_band(&mut self, pixel_band: PixelBand) {
        self.pixel_band = pixel_band;
        for marker in &mut self.markers {
            *marker = marker.clone().with_pixel_band(pixel_band);
        }
    }

    /// Rescale every visible marker for this frame.
    pub fn update_visible(
        &self,
        scene: &mut SceneHandler,
        alpha: &AlphaAttributeBuffer,
        camera: &CameraView,
        viewport_height: f32,
    ) {
        for marker in self.markers.iter().filter(|marker| marker.visible(alpha)) {
            marker.update(scene, camera, viewport_height);
        }
    }

    /// Closest visible marker hit by `ray`.
    pub fn pick(
        &self,
        scene: &SceneHandler,
        alpha: &AlphaAttributeBuffer,
        ray: &Ray3d,
    ) -> Option<(&AdaptiveIconMarker, Vec3)> {
        self.markers
            .iter()
            .filter(|marker| marker.visible(alpha))
            .filter_map(|marker| Some((marker, marker.intersect(scene, ray)?)))
            .min_by(|(_, a), (_, b)| {
                a.distance_squared(ray.origin)
                    .total_cmp(&b.distance_squared(ray.origin))
            })
    }
}

/// Links a spawned entity back to its sprite in the `SceneHandler`.
#[derive(Component)]
pub struct BillboardSpriteEntity(pub CustomObjectId);

pub fn apply_icon_pixel_band(settings: Res<ViewerSettings>, mut markers: ResMut<IconMarkers>) {
    if settings.is_changed() {
        markers.set_pixel_band(settings.icon_pixel_band());
    }
}

/// Keep every visible marker inside its pixel band for the active camera.
pub fn update_icon_markers(
    markers: Res<IconMarkers>,
    alpha: Res<AlphaAttributeBuffer>,
    mut scene: ResMut<SceneHandler>,
    cameras: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
) {
    let Some((camera, viewport_height)) = active_camera_view(&cameras) else {
        return;
    };
    markers.update_visible(&mut scene, &alpha, &camera, viewport_height);
}

/// Mirror sprites into entities: spawn new ones, face them to the camera,
/// and despawn the ones whose resources were released or that were removed.
/// Translation and scale are only copied when the sprite flags a change.
pub fn sync_billboard_sprites(
    mut commands: Commands,
    mut scene: ResMut<SceneHandler>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
    cameras: Query<&GlobalTransform, With<Camera3d>>,
    mut sprite_entities: Query<(&mut Transform, &mut Visibility), With<BillboardSpriteEntity>>,
) {
    for entity in scene.take_removed_entities() {
        commands.entity(entity).despawn();
    }

    let facing = cameras
        .iter()
        .next()
        .map(|camera_transform| camera_transform.compute_transform().rotation);

    for (id, sprite) in scene.custom_objects_mut() {
        let visibility = if sprite.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };

        match sprite.entity {
            Some(entity) if sprite.is_disposed() => {
                commands.entity(entity).despawn();
                sprite.entity = None;
            }
            Some(entity) => {
                let Ok((mut transform, mut entity_visibility)) = sprite_entities.get_mut(entity)
                else {
                    continue;
                };
                if sprite.matrix_world_needs_update {
                    transform.translation = sprite.transform.translation;
                    transform.scale = sprite.transform.scale;
                    sprite.matrix_world_needs_update = false;
                }
                if let Some(rotation) = facing {
                    transform.rotation = rotation;
                }
                entity_visibility.set_if_neq(visibility);
            }
            None => {
                let (Some(texture), Some(material), Some(geometry)) =
                    (&sprite.texture, &sprite.material, &sprite.geometry)
                else {
                    continue;
                };

                let material = StandardMaterial {
                    base_color_texture: Some(images.add(texture.clone())),
                    ..material.clone()
                };
                let entity = commands
                    .spawn((
                        Mesh3d(meshes.add(geometry.clone())),
                        MeshMaterial3d(materials.add(material)),
                        sprite.transform,
                        visibility,
                        BillboardSpriteEntity(id),
                    ))
                    .id();
                debug!("Spawned billboard sprite {:?} as {entity}", id);
                sprite.entity = Some(entity);
                sprite.matrix_world_needs_update = false;
            }
        }
    }
}

/// Single point list carrying every marker, with presence in the vertex
/// colour alpha.
#[derive(Resource, Default)]
pub struct MarkerPresenceMesh {
    pub mesh: Option<Handle<Mesh>>,
    pub entity: Option<Entity>,
}

/// Upload marker presence once the alpha buffer changed.
pub fn sync_marker_presence(
    mut commands: Commands,
    markers: Res<IconMarkers>,
    mut alpha: ResMut<AlphaAttributeBuffer>,
    mut presence: ResMut<MarkerPresenceMesh>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(values) = alpha.take_update() else {
        return;
    };
    let positions: Vec<Vec3> = markers.markers().iter().map(|marker| marker.position()).collect();
    let colours = presence_colours(markers.markers(), values);

    if let Some(mesh) = presence.mesh.as_ref().and_then(|handle| meshes.get_mut(handle)) {
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colours);
        return;
    }

    let mut mesh = Mesh::new(PrimitiveTopology::PointList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colours);

    let handle = meshes.add(mesh);
    let entity = commands
        .spawn((
            Mesh3d(handle.clone()),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::WHITE,
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                ..default()
            })),
            Transform::IDENTITY,
            NoFrustumCulling,
        ))
        .id();
    debug!("Spawned marker presence points as {entity}");
    presence.mesh = Some(handle);
    presence.entity = Some(entity);
}

/// Vertex colours for the presence points, alpha read from each marker's slot.
fn presence_colours(markers: &[AdaptiveIconMarker], values: &[u8]) -> Vec<[f32; 4]> {
    markers
        .iter()
        .map(|marker| {
            let value = values.get(marker.alpha_index()).copied().unwrap_or(0);
            [1.0, 1.0, 1.0, value as f32 / ALPHA_VISIBLE as f32]
        })
        .collect()
}
