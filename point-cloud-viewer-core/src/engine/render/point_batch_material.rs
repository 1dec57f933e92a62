use crate::engine::octree::point_batch::ATTRIBUTE_PACKED_INTENSITY;
use bevy::pbr::{MaterialPipeline, MaterialPipelineKey};
use bevy::prelude::*;
use bevy::reflect::TypePath;
use bevy::render::mesh::MeshVertexBufferLayoutRef;
use bevy::render::render_resource::{
    AsBindGroup, RenderPipelineDescriptor, ShaderRef, SpecializedMeshPipelineError,
};

/// Embedded path of the point batch shader, registered by the plugin.
pub const POINT_BATCH_SHADER_PATH: &str =
    "embedded://point_cloud_viewer_core/engine/render/point_batch.wgsl";

/// Unlit points shaded by their unpacked intensity.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct PointBatchMaterial {
    #[uniform(0)]
    pub colour: LinearRgba,
    /// x: intensity drawn darkest, y: intensity drawn brightest.
    #[uniform(1)]
    pub intensity_range: Vec4,
}

impl Default for PointBatchMaterial {
    fn default() -> Self {
        Self {
            colour: LinearRgba::WHITE,
            intensity_range: Vec4::new(0.0, 1.0, 0.0, 0.0),
        }
    }
}

impl PointBatchMaterial {
    pub fn with_intensity_range(mut self, min: f32, max: f32) -> Self {
        self.intensity_range.x = min;
        self.intensity_range.y = max;
        self
    }
}

impl Material for PointBatchMaterial {
    fn vertex_shader() -> ShaderRef {
        POINT_BATCH_SHADER_PATH.into()
    }

    fn fragment_shader() -> ShaderRef {
        POINT_BATCH_SHADER_PATH.into()
    }

    fn specialize(
        _pipeline: &MaterialPipeline<Self>,
        descriptor: &mut RenderPipelineDescriptor,
        layout: &MeshVertexBufferLayoutRef,
        _key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let vertex_layout = layout.0.get_layout(&[
            Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
            ATTRIBUTE_PACKED_INTENSITY.at_shader_location(1),
        ])?;
        descriptor.vertex.buffers = vec![vertex_layout];
        Ok(())
    }
}
