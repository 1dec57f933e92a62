/// Edge length of the square hover selector texture
pub const HOVER_ICON_TEXTURE_SIZE: u32 = 64;

/// Hover selector fill (#FC2574), RGBA
pub const HOVER_SELECTOR_COLOUR: [u8; 4] = [0xFC, 0x25, 0x74, 0xFF];

/// Alpha written into the shared marker attribute for a visible marker
pub const ALPHA_VISIBLE: u8 = 255;

/// Alpha written into the shared marker attribute for a hidden marker
pub const ALPHA_HIDDEN: u8 = 0;
