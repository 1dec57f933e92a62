use crate::engine::assets::viewer_settings::ViewerSettings;
use bevy::prelude::*;

/// Tracks the optional settings file and whether it has been applied.
#[derive(Resource, Default)]
pub struct ViewerSettingsLoader {
    pub path: Option<String>,
    handle: Option<Handle<ViewerSettings>>,
    applied: bool,
}

impl ViewerSettingsLoader {
    pub fn new(path: Option<String>) -> Self {
        Self {
            path,
            ..default()
        }
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

pub fn start_loading_viewer_settings(
    mut loader: ResMut<ViewerSettingsLoader>,
    asset_server: Res<AssetServer>,
) {
    if let Some(path) = loader.path.clone() {
        info!("Loading viewer settings from {path}");
        loader.handle = Some(asset_server.load(path));
    }
}

/// Replace the settings resource once the file finished loading.
pub fn apply_loaded_viewer_settings(
    mut loader: ResMut<ViewerSettingsLoader>,
    loaded: Res<Assets<ViewerSettings>>,
    mut settings: ResMut<ViewerSettings>,
) {
    if loader.applied {
        return;
    }

    let Some(handle) = &loader.handle else {
        return;
    };
    if let Some(loaded_settings) = loaded.get(handle) {
        *settings = loaded_settings.clone();
        loader.applied = true;
        info!("✓ Viewer settings loaded (point budget {})", settings.point_budget);
    }
}
