//! Rendering support for a streamed point cloud viewer: octree node
//! materialization under a point budget, screen-size adaptive icon markers
//! and float packing for 8-bit GPU channels.

pub mod engine;
pub mod plugin;

pub use plugin::PointCloudViewerCorePlugin;
