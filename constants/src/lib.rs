pub mod point_budget;
pub mod render_settings;
pub mod texture;
