use crate::engine::camera::camera_view::CameraView;
use bevy::prelude::*;

/// View of the first active 3D camera and its viewport height in logical
/// pixels. `None` until the render target size is known.
pub fn active_camera_view(
    cameras: &Query<(&Camera, &GlobalTransform), With<Camera3d>>,
) -> Option<(CameraView, f32)> {
    let (camera, camera_transform) = cameras.iter().find(|(camera, _)| camera.is_active)?;
    let viewport_height = camera.logical_viewport_size()?.y;
    Some((
        CameraView::from_camera(camera, camera_transform),
        viewport_height,
    ))
}
