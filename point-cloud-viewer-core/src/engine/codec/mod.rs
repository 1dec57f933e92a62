//! Encoders for shuttling scalar values through 8-bit GPU channels.

/// Float to four byte channels and back.
pub mod float_packing;
