use crate::engine::camera::camera_view::CameraView;
use crate::engine::camera::ray_cast::ray_sphere_intersection;
use crate::engine::icons::alpha_buffer::AlphaAttributeBuffer;
use crate::engine::icons::hover_texture::create_hover_selector_image;
use crate::engine::icons::scene_handler::{
    BillboardSprite, CustomObjectId, SceneHandler, SpriteResource,
};
use bevy::prelude::*;
use constants::render_settings::{
    HOVER_SPRITE_RENDER_ORDER, ICON_MEASURE_OFFSET, MAX_PIXEL_SIZE, MIN_PIXEL_SIZE,
};
use constants::texture::{ALPHA_HIDDEN, ALPHA_VISIBLE, HOVER_ICON_TEXTURE_SIZE};

/// On-screen size range, in pixels, an adaptive icon is kept within.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelBand {
    pub min: f32,
    pub max: f32,
}

impl Default for PixelBand {
    fn default() -> Self {
        Self {
            min: MIN_PIXEL_SIZE,
            max: MAX_PIXEL_SIZE,
        }
    }
}

impl PixelBand {
    /// Scale that brings `span` pixels back inside the band.
    pub fn scale_factor(&self, span: f32) -> f32 {
        if span > self.max {
            self.max / span
        } else if span < self.min {
            self.min / span
        } else {
            1.0
        }
    }
}

/// A marker that keeps a roughly constant size on screen at any distance.
#[derive(Clone, Debug)]
pub struct AdaptiveIconMarker {
    position: Vec3,
    alpha_index: usize,
    sprite: CustomObjectId,
    pixel_band: PixelBand,
}

impl AdaptiveIconMarker {
    /// Build the hover sprite at `position` and add it to `scene`, hidden.
    pub fn new(position: Vec3, scene: &mut SceneHandler, alpha_index: usize) -> Self {
        let mut sprite = BillboardSprite::new(
            create_hover_selector_image(HOVER_ICON_TEXTURE_SIZE),
            HOVER_SPRITE_RENDER_ORDER,
        );
        sprite.transform.translation = position;
        sprite.visible = false;

        Self {
            position,
            alpha_index,
            sprite: scene.add_custom_object(sprite),
            pixel_band: PixelBand::default(),
        }
    }

    pub fn with_pixel_band(mut self, pixel_band: PixelBand) -> Self {
        self.pixel_band = pixel_band;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn alpha_index(&self) -> usize {
        self.alpha_index
    }

    pub fn sprite(&self) -> CustomObjectId {
        self.sprite
    }

    pub fn pixel_band(&self) -> PixelBand {
        self.pixel_band
    }

    pub fn visible(&self, alpha: &AlphaAttributeBuffer) -> bool {
        alpha.get(self.alpha_index) > 0
    }

    pub fn set_visible(&self, alpha: &mut AlphaAttributeBuffer, visible: bool) {
        let value = if visible { ALPHA_VISIBLE } else { ALPHA_HIDDEN };
        alpha.set(self.alpha_index, value);
    }

    pub fn set_hover_sprite_visible(&self, scene: &mut SceneHandler, visible: bool) {
        if let Some(sprite) = scene.custom_object_mut(self.sprite) {
            sprite.visible = visible;
        }
    }

    /// Pixels that `ICON_MEASURE_OFFSET` world units span vertically at the
    /// anchor, for a viewport `viewport_height` pixels tall.
    pub fn measured_span(&self, camera: &CameraView, viewport_height: f32) -> f32 {
        let anchor = camera.view_from_world.transform_point3(self.position);
        let above = anchor + Vec3::Y * ICON_MEASURE_OFFSET;

        let anchor_ndc = camera.clip_from_view.project_point3(anchor);
        let above_ndc = camera.clip_from_view.project_point3(above);
        (anchor_ndc.y - above_ndc.y).abs() * viewport_height
    }

    /// Scale factor for the current camera.
    pub fn adaptive_scale(&self, camera: &CameraView, viewport_height: f32) -> f32 {
        self.pixel_band
            .scale_factor(self.measured_span(camera, viewport_height))
    }

    /// Rescale the sprite so it stays inside the pixel band. Runs every frame.
    pub fn update(&self, scene: &mut SceneHandler, camera: &CameraView, viewport_height: f32) {
        let span = self.measured_span(camera, viewport_height);
        // Anchor at the camera, or a degenerate projection.
        if !span.is_finite() || span <= 0.0 {
            return;
        }

        let Some(sprite) = scene.custom_object_mut(self.sprite) else {
            return;
        };
        sprite.transform.scale = Vec3::splat(self.pixel_band.scale_factor(span));
        sprite.matrix_world_needs_update = true;
    }

    /// Nearest point where `ray` meets a sphere at the anchor sized to the
    /// sprite's current world size.
    pub fn intersect(&self, scene: &SceneHandler, ray: &Ray3d) -> Option<Vec3> {
        let sprite = scene.custom_object(self.sprite)?;
        ray_sphere_intersection(ray, self.position, 0.5 * sprite.world_size())
    }

    /// Release the sprite's GPU resources. The sprite stays in `scene`.
    pub fn dispose(&self, scene: &mut SceneHandler) -> Vec<SpriteResource> {
        scene
            .custom_object_mut(self.sprite)
            .map(BillboardSprite::dispose)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn camera_at_distance(distance: f32) -> CameraView {
        CameraView::look_at(
            Vec3::new(0.0, 0.0, distance),
            Vec3::ZERO,
            Vec3::Y,
            Mat4::perspective_rh(FRAC_PI_4, 16.0 / 9.0, 0.01, 10_000.0),
        )
    }

    #[test]
    fn construction_adds_a_hidden_sprite() {
        let mut scene = SceneHandler::new();
        let marker = AdaptiveIconMarker::new(Vec3::new(1.0, 2.0, 3.0), &mut scene, 0);

        assert_eq!(scene.len(), 1);
        let sprite = scene.custom_object(marker.sprite()).unwrap();
        assert!(!sprite.visible);
        assert_eq!(sprite.transform.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(sprite.render_order, HOVER_SPRITE_RENDER_ORDER);
        assert_eq!(
            sprite.texture.as_ref().unwrap().width(),
            HOVER_ICON_TEXTURE_SIZE
        );
    }

    #[test]
    fn presence_only_writes_its_own_slot() {
        let mut scene = SceneHandler::new();
        let mut alpha = AlphaAttributeBuffer::new(3);
        let first = AdaptiveIconMarker::new(Vec3::ZERO, &mut scene, 0);
        let second = AdaptiveIconMarker::new(Vec3::X, &mut scene, 2);

        second.set_visible(&mut alpha, true);
        assert!(second.visible(&alpha));
        assert!(!first.visible(&alpha));
        assert_eq!(alpha.as_slice(), &[0, 0, 255]);

        second.set_visible(&mut alpha, false);
        assert_eq!(alpha.get(2), 0);
    }

    #[test]
    fn hover_and_presence_are_independent() {
        let mut scene = SceneHandler::new();
        let mut alpha = AlphaAttributeBuffer::new(1);
        let marker = AdaptiveIconMarker::new(Vec3::ZERO, &mut scene, 0);

        marker.set_hover_sprite_visible(&mut scene, true);
        assert!(scene.custom_object(marker.sprite()).unwrap().visible);
        assert!(!marker.visible(&alpha));

        marker.set_visible(&mut alpha, true);
        marker.set_hover_sprite_visible(&mut scene, false);
        assert!(marker.visible(&alpha));
        assert!(!scene.custom_object(marker.sprite()).unwrap().visible);
    }

    #[test]
    fn scale_factor_band() {
        let band = PixelBand::default();
        assert_eq!(band.scale_factor(128.0), 0.5);
        assert_eq!(band.scale_factor(8.0), 2.0);
        assert_eq!(band.scale_factor(40.0), 1.0);
        assert_eq!(band.scale_factor(16.0), 1.0);
        assert_eq!(band.scale_factor(64.0), 1.0);
    }

    #[test]
    fn on_screen_size_stays_in_band_at_any_distance() {
        let mut scene = SceneHandler::new();
        let marker = AdaptiveIconMarker::new(Vec3::ZERO, &mut scene, 0);

        for distance in [0.05, 0.5, 1.0, 3.0, 10.0, 40.0, 150.0, 1_000.0, 5_000.0] {
            let camera = camera_at_distance(distance);
            marker.update(&mut scene, &camera, 720.0);

            let sprite = scene.custom_object(marker.sprite()).unwrap();
            let on_screen = marker.measured_span(&camera, 720.0) * sprite.transform.scale.x;
            assert!(
                (MIN_PIXEL_SIZE - 1e-2..=MAX_PIXEL_SIZE + 1e-2).contains(&on_screen),
                "{on_screen} px at distance {distance}"
            );
            assert!(sprite.matrix_world_needs_update);
        }
    }

    #[test]
    fn icons_shrink_up_close_and_grow_far_away() {
        let mut scene = SceneHandler::new();
        let marker = AdaptiveIconMarker::new(Vec3::ZERO, &mut scene, 0);

        marker.update(&mut scene, &camera_at_distance(0.5), 720.0);
        let near = scene.custom_object(marker.sprite()).unwrap().transform.scale.x;
        marker.update(&mut scene, &camera_at_distance(2_000.0), 720.0);
        let far = scene.custom_object(marker.sprite()).unwrap().transform.scale.x;

        assert!(near < 1.0);
        assert!(far > 1.0);
    }

    #[test]
    fn hit_radius_follows_the_current_scale() {
        let mut scene = SceneHandler::new();
        let marker = AdaptiveIconMarker::new(Vec3::new(0.0, 0.0, -10.0), &mut scene, 0);
        let ray = Ray3d {
            origin: Vec3::new(0.0, 1.5, 0.0),
            direction: Dir3::NEG_Z,
        };

        scene.custom_object_mut(marker.sprite()).unwrap().transform.scale = Vec3::splat(2.0);
        assert!(marker.intersect(&scene, &ray).is_none());

        scene.custom_object_mut(marker.sprite()).unwrap().transform.scale = Vec3::splat(4.0);
        let hit = marker.intersect(&scene, &ray).unwrap();
        assert!((hit.y - 1.5).abs() < 1e-5);
        assert!(hit.z > -10.0);
    }

    #[test]
    fn centred_ray_hits_the_front_of_the_sphere() {
        let mut scene = SceneHandler::new();
        let marker = AdaptiveIconMarker::new(Vec3::new(0.0, 0.0, -10.0), &mut scene, 0);
        let ray = Ray3d {
            origin: Vec3::ZERO,
            direction: Dir3::NEG_Z,
        };
        // Unit scale: radius 0.5.
        let hit = marker.intersect(&scene, &ray).unwrap();
        assert!(hit.abs_diff_eq(Vec3::new(0.0, 0.0, -9.5), 1e-5));
    }

    #[test]
    fn dispose_releases_in_order_and_keeps_the_sprite() {
        let mut scene = SceneHandler::new();
        let marker = AdaptiveIconMarker::new(Vec3::ZERO, &mut scene, 0);

        assert_eq!(
            marker.dispose(&mut scene),
            vec![
                SpriteResource::Texture,
                SpriteResource::Material,
                SpriteResource::Geometry
            ]
        );
        assert!(marker.dispose(&mut scene).is_empty());
        assert_eq!(scene.len(), 1);
    }
}
