use bevy::prelude::*;

/// Per-marker alpha values shared by every marker in a batch, one byte each.
/// Markers only ever write their own slot.
#[derive(Resource, Clone, Debug, Default)]
pub struct AlphaAttributeBuffer {
    values: Vec<u8>,
    /// Set on every write, cleared once the values were uploaded.
    pub needs_update: bool,
}

impl AlphaAttributeBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            values: vec![0; len],
            needs_update: false,
        }
    }

    pub fn get(&self, index: usize) -> u8 {
        self.values[index]
    }

    pub fn set(&mut self, index: usize, value: u8) {
        self.values[index] = value;
        self.needs_update = true;
    }

    /// Extend with hidden slots so `len` indices are addressable.
    pub fn grow_to(&mut self, len: usize) {
        if len > self.values.len() {
            self.values.resize(len, 0);
            self.needs_update = true;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.values
    }

    /// Hand the values to an uploader and clear the dirty flag.
    pub fn take_update(&mut self) -> Option<&[u8]> {
        if !self.needs_update {
            return None;
        }
        self.needs_update = false;
        Some(&self.values)
    }
}
