use crate::engine::assets::viewer_settings::ViewerSettings;
use crate::engine::icons::alpha_buffer::AlphaAttributeBuffer;
use crate::engine::icons::scene_handler::SceneHandler;
use crate::engine::render::point_batch_material::PointBatchMaterial;
use crate::engine::systems::icon_markers::{
    IconMarkers, MarkerPresenceMesh, apply_icon_pixel_band, sync_billboard_sprites,
    sync_marker_presence, update_icon_markers,
};
use crate::engine::systems::point_clouds::{
    PointCloudScene, sync_point_batches, update_point_cloud_visibility,
};
use crate::engine::systems::viewer_settings::{
    ViewerSettingsLoader, apply_loaded_viewer_settings, start_loading_viewer_settings,
};
use bevy::asset::embedded_asset;
use bevy::prelude::*;
use bevy_common_assets::json::JsonAssetPlugin;

/// Point cloud streaming and adaptive icon markers for a Bevy app.
///
/// Expects `DefaultPlugins` (or at least assets, PBR and a 3D camera).
/// Point batches are drawn with `PointBatchMaterial`, whose shader is
/// embedded in the crate.
#[derive(Default)]
pub struct PointCloudViewerCorePlugin {
    /// Optional `*.viewer.json` asset path overriding the default settings.
    pub settings_path: Option<String>,
}

impl Plugin for PointCloudViewerCorePlugin {
    fn build(&self, app: &mut App) {
        embedded_asset!(app, "engine/render/point_batch.wgsl");

        app
            // Registers ViewerSettings as a loadable asset type from JSON files.
            .add_plugins(JsonAssetPlugin::<ViewerSettings>::new(&["viewer.json"]))
            .add_plugins(MaterialPlugin::<PointBatchMaterial>::default())
            .init_resource::<ViewerSettings>()
            .init_resource::<SceneHandler>()
            .init_resource::<AlphaAttributeBuffer>()
            .init_resource::<IconMarkers>()
            .init_resource::<MarkerPresenceMesh>()
            .insert_resource(ViewerSettingsLoader::new(self.settings_path.clone()))
            .insert_non_send_resource(PointCloudScene::default())
            .add_systems(Startup, start_loading_viewer_settings)
            .add_systems(
                Update,
                (
                    apply_loaded_viewer_settings,
                    apply_icon_pixel_band,
                    update_point_cloud_visibility,
                    sync_point_batches,
                    update_icon_markers,
                    sync_billboard_sprites,
                    sync_marker_presence,
                )
                    .chain(),
            );
    }
}
