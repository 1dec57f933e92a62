//! Camera state snapshots and ray casting helpers.
//!
//! The octree visibility pass and the icon markers both work against a
//! `CameraView` so they can run outside a Bevy world as well as inside one.

/// View and projection matrices captured for one frame.
pub mod camera_view;
/// Ray intersection against bounding spheres.
pub mod ray_cast;
