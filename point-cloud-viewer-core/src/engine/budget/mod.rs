//! Point budget enforcement for streamed octrees.
//!
//! Each frame the visibility pass decides which nodes to show, which to
//! request from the loader and which to evict once the budget is exceeded.

/// Least recently used tracking of materialized nodes.
pub mod lru;
/// Priority-queue traversal across every loaded octree.
pub mod visibility;
