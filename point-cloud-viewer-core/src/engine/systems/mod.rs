//! Per-frame Bevy systems driving the viewer core.
//!
//! Runs the point cloud visibility pass and mirrors its point batches into
//! entities, rescales icon markers, and keeps their sprites and presence
//! points in sync.

/// Lookup of the camera the viewer renders through.
pub mod active_camera;

/// Icon marker registry, per-frame rescaling, sprite and presence sync.
pub mod icon_markers;

/// Point cloud scene resource, the visibility pass and point batch sync.
pub mod point_clouds;

/// Settings file loading and application.
pub mod viewer_settings;
