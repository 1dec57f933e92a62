use crate::engine::codec::float_packing::{PackedFloat, pack};
use crate::engine::octree::geometry_node::PointBuffer;
use bevy::prelude::*;
use bevy::render::mesh::{MeshVertexAttribute, MeshVertexAttributeId, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::VertexFormat;

/// Per-point intensity, packed into four byte-valued channels.
pub const ATTRIBUTE_PACKED_INTENSITY: MeshVertexAttribute =
    MeshVertexAttribute::new("Packed_Intensity", 988_540_917, VertexFormat::Float32x4);

/// Buffers released explicitly before the generic attribute sweep.
pub const LARGE_ATTRIBUTES: [MeshVertexAttribute; 1] = [Mesh::ATTRIBUTE_POSITION];

/// Entity and mesh asset a batch was spawned as.
#[derive(Clone, Debug)]
pub struct BatchRender {
    pub entity: Entity,
    pub mesh: Handle<Mesh>,
}

/// GPU-ready point list built from one octree cell.
pub struct PointBatch {
    pub geometry: Option<Mesh>,
    pub visible: bool,
    pub world_from_local: Mat4,
    /// Set once the batch has been spawned into the world.
    pub render: Option<BatchRender>,
}

impl PointBatch {
    pub fn new(geometry: Mesh, world_from_local: Mat4) -> Self {
        Self {
            geometry: Some(geometry),
            visible: false,
            world_from_local,
            render: None,
        }
    }

    /// Build a point list mesh, packing intensities for the shader.
    /// Points without intensities get zeros so every batch shares one
    /// vertex layout.
    pub fn from_points(points: &PointBuffer, world_from_local: Mat4) -> Self {
        let mut mesh = Mesh::new(PrimitiveTopology::PointList, RenderAssetUsages::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, points.positions.clone());

        if let Some(colours) = &points.colours {
            mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colours.clone());
        }

        let packed: Vec<[f32; 4]> = match &points.intensities {
            Some(intensities) => intensities
                .iter()
                .map(|&intensity| pack(intensity as f64).to_array())
                .collect(),
            None => vec![PackedFloat::ZERO.to_array(); points.len()],
        };
        mesh.insert_attribute(ATTRIBUTE_PACKED_INTENSITY, packed);

        Self::new(mesh, world_from_local)
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn vertex_count(&self) -> usize {
        self.geometry.as_ref().map_or(0, Mesh::count_vertices)
    }

    /// Release the geometry in two phases, then drop the mesh.
    /// Returns the released attribute ids in release order.
    pub fn dispose(&mut self) -> Vec<MeshVertexAttributeId> {
        let Some(mut mesh) = self.geometry.take() else {
            return Vec::new();
        };

        let mut released = Vec::new();
        for attribute in LARGE_ATTRIBUTES {
            if mesh.remove_attribute(attribute.id).is_some() {
                released.push(attribute.id);
            }
        }

        let remaining: Vec<MeshVertexAttributeId> =
            mesh.attributes().map(|(attribute, _)| attribute.id).collect();
        for id in remaining {
            mesh.remove_attribute(id);
            released.push(id);
        }

        drop(mesh);
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> PointBuffer {
        PointBuffer {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]],
            colours: Some(vec![[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0]]),
            intensities: Some(vec![1.0, -3.5]),
        }
    }

    #[test]
    fn packed_intensity_attribute_is_filled() {
        let batch = PointBatch::from_points(&sample_points(), Mat4::IDENTITY);
        let mesh = batch.geometry.as_ref().unwrap();

        assert_eq!(batch.vertex_count(), 2);
        assert!(!batch.visible);
        match mesh.attribute(ATTRIBUTE_PACKED_INTENSITY) {
            Some(bevy::render::mesh::VertexAttributeValues::Float32x4(values)) => {
                assert_eq!(values[0], [63.0, 128.0, 0.0, 0.0]);
                assert_eq!(values[1], pack(-3.5).to_array());
            }
            other => panic!("unexpected intensity attribute {other:?}"),
        }
    }

    #[test]
    fn dispose_releases_large_buffers_first() {
        let mut batch = PointBatch::from_points(&sample_points(), Mat4::IDENTITY);
        let released = batch.dispose();

        assert_eq!(released.len(), 3);
        assert_eq!(released[0], Mesh::ATTRIBUTE_POSITION.id);
        assert!(released.contains(&Mesh::ATTRIBUTE_COLOR.id));
        assert!(released.contains(&ATTRIBUTE_PACKED_INTENSITY.id));
        assert!(!batch.has_geometry());
    }

    #[test]
    fn missing_intensities_are_packed_as_zero() {
        let batch = PointBatch::from_points(
            &PointBuffer::from_positions(vec![[0.0; 3]; 3]),
            Mat4::IDENTITY,
        );
        match batch.geometry.as_ref().unwrap().attribute(ATTRIBUTE_PACKED_INTENSITY) {
            Some(bevy::render::mesh::VertexAttributeValues::Float32x4(values)) => {
                assert_eq!(values, &vec![[0.0; 4]; 3]);
            }
            other => panic!("unexpected intensity attribute {other:?}"),
        }
        assert!(batch.render.is_none());
    }

    #[test]
    fn dispose_twice_is_a_no_op() {
        let mut batch = PointBatch::from_points(&PointBuffer::default(), Mat4::IDENTITY);
        assert_eq!(batch.dispose().len(), 2);
        assert!(batch.dispose().is_empty());
        assert_eq!(batch.vertex_count(), 0);
    }
}
