use bevy::prelude::*;
use slab::Slab;

/// Handle to an object added through [`SceneHandler::add_custom_object`].
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash)]
pub struct CustomObjectId(pub(crate) usize);

/// GPU resources a sprite can hold, in release order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpriteResource {
    Texture,
    Material,
    Geometry,
}

/// A camera-facing textured quad.
#[derive(Debug)]
pub struct BillboardSprite {
    pub texture: Option<Image>,
    pub material: Option<StandardMaterial>,
    pub geometry: Option<Mesh>,
    pub transform: Transform,
    pub visible: bool,
    pub render_order: i32,
    pub depth_test: bool,
    /// Set when `transform` changed since the last sync into the world.
    pub matrix_world_needs_update: bool,
    /// Entity mirroring this sprite once spawned.
    pub entity: Option<Entity>,
}

impl BillboardSprite {
    /// Unit quad showing `texture`, unlit and alpha blended.
    pub fn new(texture: Image, render_order: i32) -> Self {
        Self {
            texture: Some(texture),
            material: Some(StandardMaterial {
                base_color: Color::WHITE,
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                cull_mode: None,
                fog_enabled: false,
                depth_bias: render_order as f32,
                ..default()
            }),
            geometry: Some(Mesh::from(Rectangle::new(1.0, 1.0))),
            transform: Transform::IDENTITY,
            visible: true,
            render_order,
            depth_test: false,
            matrix_world_needs_update: true,
            entity: None,
        }
    }

    /// Side length of the quad in world units.
    pub fn world_size(&self) -> f32 {
        self.transform.scale.x
    }

    /// Release texture, material and geometry. Returns what was released,
    /// in order. Anything already released is skipped.
    pub fn dispose(&mut self) -> Vec<SpriteResource> {
        let mut released = Vec::new();
        if self.texture.take().is_some() {
            released.push(SpriteResource::Texture);
        }
        if self.material.take().is_some() {
            released.push(SpriteResource::Material);
        }
        if self.geometry.take().is_some() {
            released.push(SpriteResource::Geometry);
        }
        released
    }

    pub fn is_disposed(&self) -> bool {
        self.texture.is_none() && self.material.is_none() && self.geometry.is_none()
    }
}

/// Owns the custom objects drawn on top of the point clouds.
#[derive(Resource, Default)]
pub struct SceneHandler {
    custom_objects: Slab<BillboardSprite>,
    /// Entities of removed objects, waiting to be despawned.
    removed_entities: Vec<Entity>,
}

impl SceneHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_custom_object(&mut self, sprite: BillboardSprite) -> CustomObjectId {
        CustomObjectId(self.custom_objects.insert(sprite))
    }

    /// Remove an object. Its entity, if spawned, is queued for despawning
    /// so a reused id never shares the world with a stale entity.
    pub fn remove_custom_object(&mut self, id: CustomObjectId) -> Option<BillboardSprite> {
        let mut sprite = self.custom_objects.try_remove(id.0)?;
        if let Some(entity) = sprite.entity.take() {
            self.removed_entities.push(entity);
        }
        Some(sprite)
    }

    pub fn take_removed_entities(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.removed_entities)
    }

    pub fn custom_object(&self, id: CustomObjectId) -> Option<&BillboardSprite> {
        self.custom_objects.get(id.0)
    }

    pub fn custom_object_mut(&mut self, id: CustomObjectId) -> Option<&mut BillboardSprite> {
        self.custom_objects.get_mut(id.0)
    }

    pub fn custom_objects(&self) -> impl Iterator<Item = (CustomObjectId, &BillboardSprite)> {
        self.custom_objects
            .iter()
            .map(|(key, sprite)| (CustomObjectId(key), sprite))
    }

    pub fn custom_objects_mut(
        &mut self,
    ) -> impl Iterator<Item = (CustomObjectId, &mut BillboardSprite)> {
        self.custom_objects
            .iter_mut()
            .map(|(key, sprite)| (CustomObjectId(key), sprite))
    }

    pub fn len(&self) -> usize {
        self.custom_objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.custom_objects.is_empty()
    }
}
