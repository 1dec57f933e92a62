//! Configuration assets loaded through the asset server.

/// Point budget and icon size settings read from JSON.
pub mod viewer_settings;
