use bevy::prelude::*;

/// Matrices of the active camera for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    pub view_from_world: Mat4,
    pub clip_from_view: Mat4,
    /// Camera origin in world space.
    pub position: Vec3,
}

impl CameraView {
    pub fn new(view_from_world: Mat4, clip_from_view: Mat4) -> Self {
        Self {
            view_from_world,
            clip_from_view,
            position: view_from_world.inverse().w_axis.truncate(),
        }
    }

    /// Snapshot a Bevy camera.
    pub fn from_camera(camera: &Camera, camera_transform: &GlobalTransform) -> Self {
        Self::new(
            camera_transform.compute_matrix().inverse(),
            camera.clip_from_view(),
        )
    }

    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, clip_from_view: Mat4) -> Self {
        Self::new(Mat4::look_at_rh(eye, target, up), clip_from_view)
    }

    pub fn clip_from_world(&self) -> Mat4 {
        self.clip_from_view * self.view_from_world
    }

    /// Orthographic projections keep `w` fixed at one.
    pub fn is_perspective(&self) -> bool {
        self.clip_from_view.w_axis.w == 0.0
    }

    /// Screen pixels covered by `radius` world units at `distance` from the
    /// camera, for a viewport `viewport_height` pixels tall.
    pub fn projected_radius(&self, radius: f32, distance: f32, viewport_height: f32) -> f32 {
        // y_axis.y is 1/tan(fov/2) for perspective, 2/(top-bottom) for orthographic.
        let scale = self.clip_from_view.y_axis.y * viewport_height * 0.5;
        if self.is_perspective() {
            radius * scale / distance
        } else {
            radius * scale
        }
    }
}
