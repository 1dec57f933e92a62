//! Octree node wrappers for streamed point clouds.

/// Geometry node trait and the in-memory implementation.
pub mod geometry_node;
/// Point list meshes built from loaded geometry.
pub mod point_batch;
/// Octree container and node materialization.
pub mod point_cloud_octree;
/// Geometry node paired with its point batch.
pub mod tree_node;
