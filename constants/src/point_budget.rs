/// Maximum number of points kept visible across all point clouds
pub const DEFAULT_POINT_BUDGET: u64 = 1_000_000;

/// Loaded geometry nodes turned into GPU point batches per frame
pub const MAX_LOADS_TO_GPU: usize = 2;

/// Geometry node loads requested per frame
pub const MAX_NUM_NODES_LOADING: usize = 4;

/// Nodes whose bounding sphere projects smaller than this (pixels) are skipped
pub const DEFAULT_MIN_NODE_PIXEL_SIZE: f32 = 50.0;
