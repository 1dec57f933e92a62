//! Screen-size adaptive markers drawn over the point clouds.
//!
//! Markers share one alpha attribute buffer for presence and each own a
//! billboard sprite in the `SceneHandler` for hover highlighting.

/// Adaptive icon marker and its pixel band.
pub mod adaptive_icon;
/// Shared per-marker alpha attribute.
pub mod alpha_buffer;
/// Procedural hover selector texture.
pub mod hover_texture;
/// Custom object storage for billboard sprites.
pub mod scene_handler;
