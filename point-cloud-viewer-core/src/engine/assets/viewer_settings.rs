use crate::engine::budget::visibility::VisibilitySettings;
use crate::engine::icons::adaptive_icon::PixelBand;
use bevy::prelude::*;
use constants::point_budget::{
    DEFAULT_MIN_NODE_PIXEL_SIZE, DEFAULT_POINT_BUDGET, MAX_LOADS_TO_GPU, MAX_NUM_NODES_LOADING,
};
use constants::render_settings::{MAX_PIXEL_SIZE, MIN_PIXEL_SIZE};
use serde::{Deserialize, Serialize};

/// Viewer tuning loaded from a `*.viewer.json` file. Missing fields keep
/// their defaults.
#[derive(Asset, Debug, Clone, PartialEq, Serialize, Deserialize, TypePath, Resource)]
#[serde(default)]
pub struct ViewerSettings {
    pub point_budget: u64,
    pub max_loads_to_gpu: usize,
    pub max_num_nodes_loading: usize,
    pub min_node_pixel_size: f32,
    pub min_icon_pixel_size: f32,
    pub max_icon_pixel_size: f32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            point_budget: DEFAULT_POINT_BUDGET,
            max_loads_to_gpu: MAX_LOADS_TO_GPU,
            max_num_nodes_loading: MAX_NUM_NODES_LOADING,
            min_node_pixel_size: DEFAULT_MIN_NODE_PIXEL_SIZE,
            min_icon_pixel_size: MIN_PIXEL_SIZE,
            max_icon_pixel_size: MAX_PIXEL_SIZE,
        }
    }
}

impl ViewerSettings {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn visibility(&self) -> VisibilitySettings {
        VisibilitySettings {
            point_budget: self.point_budget,
            max_loads_to_gpu: self.max_loads_to_gpu,
            max_num_nodes_loading: self.max_num_nodes_loading,
        }
    }

    pub fn icon_pixel_band(&self) -> PixelBand {
        PixelBand {
            min: self.min_icon_pixel_size,
            max: self.max_icon_pixel_size,
        }
    }
}
