//! Per-face texture assignment (texface)

use bitflags::bitflags;

use crate::image::ImageId;

bitflags! {
    /// Texface drawing modes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct TexFaceMode: u32 {
        /// Use a single tile of a tiled image
        const TILES = 1 << 0;
        /// Lit by the fixed-function lights
        const LIGHT = 1 << 1;
        const TWOSIDE = 1 << 2;
        /// Use the object color instead of vertex colors
        const OBCOL = 1 << 3;
        /// Face displays bitmap text from a font image
        const TEXT = 1 << 4;
    }
}

/// Texture page of one polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TexPoly {
    pub image: Option<ImageId>,
    pub tile: u32,
    pub mode: TexFaceMode,
}

impl TexPoly {
    pub fn new(image: ImageId) -> Self {
        Self {
            image: Some(image),
            ..Default::default()
        }
    }

    pub fn with_tile(mut self, tile: u32) -> Self {
        self.tile = tile;
        self.mode |= TexFaceMode::TILES;
        self
    }

    pub fn with_mode(mut self, mode: TexFaceMode) -> Self {
        self.mode |= mode;
        self
    }
}
