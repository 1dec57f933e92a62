use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use constants::texture::HOVER_SELECTOR_COLOUR;

/// Radius of the filled selector disc for a texture `size` pixels wide.
pub fn hover_selector_radius(size: u32) -> f32 {
    let size = size as f32;
    size / 2.0 - size / 16.0 - 2.0 * (size / 8.0)
}

/// RGBA pixels of the hover selector: a filled disc centred in a
/// transparent square, with a one pixel soft edge.
pub fn hover_selector_pixels(size: u32) -> Vec<u8> {
    let radius = hover_selector_radius(size);
    let centre = size as f32 / 2.0;
    let [red, green, blue, alpha] = HOVER_SELECTOR_COLOUR;

    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let offset = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - Vec2::splat(centre);
            let coverage = (radius + 0.5 - offset.length()).clamp(0.0, 1.0);
            let pixel_alpha = (alpha as f32 * coverage).round() as u8;
            pixels.extend_from_slice(&[red, green, blue, pixel_alpha]);
        }
    }
    pixels
}

/// Square sRGB texture holding the hover selector glyph.
pub fn create_hover_selector_image(size: u32) -> Image {
    Image::new(
        Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        hover_selector_pixels(size),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    )
}
