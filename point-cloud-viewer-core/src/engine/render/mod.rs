//! Material and shader used to draw point batches.

/// Point batch material decoding packed intensities on the GPU.
pub mod point_batch_material;
