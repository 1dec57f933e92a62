pub mod assets;
pub mod budget;
pub mod camera;
pub mod codec;
pub mod icons;
pub mod octree;
pub mod render;
pub mod systems;
