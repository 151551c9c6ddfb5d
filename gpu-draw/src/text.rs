//! Bitmap font text drawn on texface polygons
//!
//! Every character repeats the face, scaled and offset by its glyph, with the
//! face UVs remapped into the glyph's cell of the font image. The face spans
//! two units for the reference glyph.

use glam::{Vec2, Vec3};
use gpu_scene::{ImageBuffer, TexFaceMode};

use crate::backend::{Primitive, TexturedVertex};

/// Line height as a multiple of the face height
pub const LINE_SPACING: f32 = 1.2;

/// Tab width in spaces
pub const TAB_SPACES: f32 = 4.0;

/// Where one glyph lives in the font image and how it sits on the face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphMatrix {
    /// UV of the reference glyph
    pub center: Vec2,
    /// Glyph size relative to the reference glyph
    pub size: Vec2,
    /// UV of the glyph
    pub trans: Vec2,
    /// Face-space offset of the glyph
    pub offset: Vec2,
    /// Pen advance in face units
    pub advance: f32,
}

impl GlyphMatrix {
    /// Draws the face as is: used without a font or for missing glyphs
    pub const IDENTITY: Self = Self {
        center: Vec2::ZERO,
        size: Vec2::ONE,
        trans: Vec2::ZERO,
        offset: Vec2::ZERO,
        advance: 1.0,
    };

    /// Matrix of `unicode` in the font attached to `buffer`
    pub fn for_glyph(buffer: Option<&ImageBuffer>, unicode: u16) -> Self {
        let Some(buffer) = buffer else {
            return Self::IDENTITY;
        };
        let Some(font) = &buffer.font else {
            return Self::IDENTITY;
        };
        let Some(glyph) = font.glyph(unicode) else {
            return Self::IDENTITY;
        };
        let reference = font.reference();
        if reference.sizex == 0
            || reference.sizey == 0
            || reference.advance == 0
            || buffer.width == 0
            || buffer.height == 0
        {
            return Self::IDENTITY;
        }

        let (width, height) = (buffer.width as f32, buffer.height as f32);
        let (ref_x, ref_y) = (reference.sizex as f32, reference.sizey as f32);
        let size = Vec2::new(glyph.sizex as f32 / ref_x, glyph.sizey as f32 / ref_y);
        // Font rows are stored top-down, UVs run bottom-up
        Self {
            center: Vec2::new(
                reference.locx as f32 / width,
                (height - reference.locy as f32) / height,
            ),
            size,
            trans: Vec2::new(
                glyph.locx as f32 / width,
                (height - glyph.locy as f32) / height,
            ),
            offset: Vec2::new(
                size.x - 1.0 + 2.0 * (glyph.ofsx - reference.ofsx) as f32 / ref_x,
                1.0 - size.y + 2.0 * (glyph.ofsy - reference.ofsy) as f32 / ref_y,
            ),
            advance: 2.0 * glyph.advance as f32 / reference.advance as f32,
        }
    }

    pub fn map_uv(&self, uv: Vec2) -> Vec2 {
        (uv - self.center) * self.size + self.trans
    }

    pub fn map_position(&self, position: Vec3) -> Vec3 {
        Vec3::new(
            self.size.x * position.x + self.offset.x,
            self.size.y * position.y + self.offset.y,
            position.z,
        )
    }
}

/// Glyph geometry ready to submit
#[derive(Debug, Clone, PartialEq)]
pub struct TextMesh {
    /// `Triangles` for three-corner faces, `Quads` otherwise
    pub primitive: Primitive,
    pub vertices: Vec<TexturedVertex>,
    pub glyphs: usize,
}

/// Lay out `text` over a face
///
/// `v_quad` and `uv_quad` are the face corners (three or four). Nothing is
/// produced unless `mode` has [`TexFaceMode::TEXT`]. With
/// [`TexFaceMode::OBCOL`] the corner colors are ignored and vertices are
/// white, leaving the current draw color to the caller.
pub fn layout_text(
    font: Option<&ImageBuffer>,
    mode: TexFaceMode,
    text: &str,
    colors: Option<&[[u8; 4]]>,
    v_quad: &[Vec3],
    uv_quad: &[Vec2],
) -> TextMesh {
    let corners = v_quad.len().min(uv_quad.len()).min(4);
    let primitive = if corners == 3 {
        Primitive::Triangles
    } else {
        Primitive::Quads
    };
    let mut mesh = TextMesh {
        primitive,
        vertices: Vec::new(),
        glyphs: 0,
    };
    if !mode.contains(TexFaceMode::TEXT) || text.is_empty() || corners < 3 {
        return mesh;
    }

    let colors = colors.filter(|_| !mode.contains(TexFaceMode::OBCOL));
    let corner_color = |corner: usize| {
        colors
            .and_then(|colors| colors.get(corner))
            .copied()
            .unwrap_or([255; 4])
    };

    let (min_y, max_y) = v_quad[..corners]
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.y), hi.max(v.y)));
    let line_height = (max_y - min_y) * LINE_SPACING;
    let tab = GlyphMatrix::for_glyph(font, u16::from(b' ')).advance * TAB_SPACES;

    let mut pen = Vec2::ZERO;
    for ch in text.chars() {
        match ch {
            '\n' => {
                pen = Vec2::new(0.0, pen.y - line_height);
                continue;
            }
            '\t' => {
                pen.x += tab;
                continue;
            }
            _ => {}
        }
        // Bitmap fonts only cover the basic multilingual plane
        let unicode = u16::try_from(u32::from(ch)).unwrap_or(u16::from(b'?'));
        let matrix = GlyphMatrix::for_glyph(font, unicode);

        for corner in 0..corners {
            let uv = matrix.map_uv(uv_quad[corner]);
            let position = matrix.map_position(v_quad[corner]) + pen.extend(0.0);
            mesh.vertices.push(TexturedVertex {
                position: position.to_array(),
                uv: uv.to_array(),
                color: corner_color(corner),
            });
        }
        pen.x += matrix.advance;
        mesh.glyphs += 1;
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_scene::{BitmapFont, Glyph};

    fn quad() -> ([Vec3; 4], [Vec2; 4]) {
        (
            [
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            [
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
        )
    }

    fn font_image() -> ImageBuffer {
        let reference = Glyph {
            unicode: u16::from(b' '),
            locx: 0,
            locy: 64,
            sizex: 8,
            sizey: 8,
            advance: 8,
            ..Default::default()
        };
        let a = Glyph {
            unicode: u16::from(b'A'),
            locx: 8,
            locy: 64,
            sizex: 8,
            sizey: 16,
            ofsy: 2,
            advance: 16,
            ..Default::default()
        };
        let question = Glyph {
            unicode: u16::from(b'?'),
            locx: 32,
            locy: 32,
            sizex: 8,
            sizey: 8,
            advance: 8,
            ..Default::default()
        };
        ImageBuffer::solid(64, 64, [0; 4]).with_font(BitmapFont::new(
            reference,
            vec![reference, a, question],
        ))
    }

    fn text_mode() -> TexFaceMode {
        TexFaceMode::TEXT
    }

    #[test]
    fn test_glyph_matrix() {
        let font = font_image();
        let m = GlyphMatrix::for_glyph(Some(&font), u16::from(b'A'));
        assert_eq!(m.size, Vec2::new(1.0, 2.0));
        assert_eq!(m.trans, Vec2::new(0.125, 0.0));
        assert_eq!(m.center, Vec2::ZERO);
        assert_eq!(m.offset, Vec2::new(0.0, -0.5));
        assert_eq!(m.advance, 4.0);
        assert_eq!(m.map_uv(Vec2::ONE), Vec2::new(1.125, 2.0));
    }

    #[test]
    fn test_identity_without_font_or_glyph() {
        assert_eq!(GlyphMatrix::for_glyph(None, 65), GlyphMatrix::IDENTITY);
        let plain = ImageBuffer::solid(4, 4, [0; 4]);
        assert_eq!(GlyphMatrix::for_glyph(Some(&plain), 65), GlyphMatrix::IDENTITY);
        let font = font_image();
        assert_eq!(GlyphMatrix::for_glyph(Some(&font), 66), GlyphMatrix::IDENTITY);
    }

    #[test]
    fn test_pen_advances_per_glyph() {
        let (v, uv) = quad();
        let mesh = layout_text(None, text_mode(), "ab", None, &v, &uv);
        assert_eq!(mesh.primitive, Primitive::Quads);
        assert_eq!(mesh.glyphs, 2);
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.vertices[0].position, [-1.0, -1.0, 0.0]);
        assert_eq!(mesh.vertices[4].position, [0.0, -1.0, 0.0]);
        assert_eq!(mesh.vertices[4].uv, [0.0, 0.0]);
    }

    #[test]
    fn test_newline_and_tab() {
        let (v, uv) = quad();
        let mesh = layout_text(None, text_mode(), "ab\nc\td", None, &v, &uv);
        assert_eq!(mesh.glyphs, 4);
        // 'c' starts the second line, 1.2 face heights down
        let c = mesh.vertices[8].position;
        assert!((c[0] + 1.0).abs() < 1e-6);
        assert!((c[1] - (-1.0 - 2.4)).abs() < 1e-6);
        // 'd' sits one advance plus one tab after 'c'
        let d = mesh.vertices[12].position;
        assert!((d[0] - (c[0] + 1.0 + TAB_SPACES)).abs() < 1e-6);
    }

    #[test]
    fn test_astral_characters_become_question_marks() {
        let (v, uv) = quad();
        let font = font_image();
        let mesh = layout_text(Some(&font), text_mode(), "\u{1F600}", None, &v, &uv);
        let question = GlyphMatrix::for_glyph(Some(&font), u16::from(b'?'));
        assert_eq!(mesh.vertices[0].uv, question.map_uv(uv[0]).to_array());
    }

    #[test]
    fn test_triangles_and_colors() {
        let (v, uv) = quad();
        let colors = [[10, 20, 30, 255], [40, 50, 60, 255], [70, 80, 90, 255]];
        let mesh = layout_text(None, text_mode(), "x", Some(&colors), &v[..3], &uv[..3]);
        assert_eq!(mesh.primitive, Primitive::Triangles);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.vertices[1].color, [40, 50, 60, 255]);

        let obcol = text_mode() | TexFaceMode::OBCOL;
        let mesh = layout_text(None, obcol, "x", Some(&colors), &v[..3], &uv[..3]);
        assert_eq!(mesh.vertices[1].color, [255; 4]);
    }

    #[test]
    fn test_nothing_without_text_mode() {
        let (v, uv) = quad();
        let mesh = layout_text(None, TexFaceMode::empty(), "abc", None, &v, &uv);
        assert!(mesh.vertices.is_empty());
        let mesh = layout_text(None, text_mode(), "", None, &v, &uv);
        assert_eq!(mesh.glyphs, 0);
    }
}
