/// Smallest on-screen size, in pixels, an adaptive icon may shrink to.
pub const MIN_PIXEL_SIZE: f32 = 16.0;

/// Largest on-screen size, in pixels, an adaptive icon may grow to.
pub const MAX_PIXEL_SIZE: f32 = 64.0;

/// View-space offset (world units, straight up) used to measure how many
/// pixels the icon currently spans.
pub const ICON_MEASURE_OFFSET: f32 = 0.5;

/// Hover sprites draw on top of point batches and the ground grid.
pub const HOVER_SPRITE_RENDER_ORDER: i32 = 5;
