//! Bitmap font metadata attached to font images

/// Placement of one glyph inside the font image, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Glyph {
    pub unicode: u16,
    pub locx: i32,
    pub locy: i32,
    pub sizex: i32,
    pub sizey: i32,
    pub ofsx: i32,
    pub ofsy: i32,
    pub advance: i32,
}

/// Glyph table of a bitmap font image
///
/// The reference glyph defines the unit size every other glyph is scaled
/// against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BitmapFont {
    reference: Glyph,
    glyphs: Vec<Glyph>,
}

impl BitmapFont {
    pub fn new(reference: Glyph, mut glyphs: Vec<Glyph>) -> Self {
        glyphs.sort_by_key(|g| g.unicode);
        glyphs.dedup_by_key(|g| g.unicode);
        Self { reference, glyphs }
    }

    pub fn reference(&self) -> &Glyph {
        &self.reference
    }

    pub fn glyph(&self, unicode: u16) -> Option<&Glyph> {
        self.glyphs
            .binary_search_by_key(&unicode, |g| g.unicode)
            .ok()
            .map(|index| &self.glyphs[index])
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}
