//! Per-face texture pages
//!
//! Texface drawing binds the image of each polygon directly instead of going
//! through materials. The page bound last is remembered so runs of faces
//! sharing an image cost one bind.

use glam::{Vec2, Vec3};
use gpu_scene::{ImageId, ImageLibrary, TexFaceMode, TexPoly};

use crate::backend::{Capability, GpuBackend, TextureId, TextureTarget, UvTarget};
use crate::context::GpuContext;
use crate::error::DrawError;
use crate::material::AlphaBlend;
use crate::text;
use crate::texture::VerifyParams;

/// Texture page tracking kept in the context between sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct TexPageState {
    /// A page was set since the last clear
    active: bool,
    current: Option<(ImageId, TextureId)>,
}

/// Result of [`TexFaceSession::set_texture_page`]
#[derive(Debug)]
pub enum TexPageOutcome {
    Bound(TextureId),
    /// No polygon given, texturing is off
    Cleared,
    /// The polygon has no image, draw it untextured
    NoImage,
    /// The texture could not be created, draw untextured
    Failed(DrawError),
}

impl TexPageOutcome {
    pub fn is_bound(&self) -> bool {
        matches!(self, TexPageOutcome::Bound(_))
    }
}

/// Texface drawing scope, see the module docs
pub struct TexFaceSession<'a, B: GpuBackend> {
    ctx: &'a mut GpuContext<B>,
    images: &'a ImageLibrary,
    finished: bool,
}

impl<'a, B: GpuBackend> TexFaceSession<'a, B> {
    pub(crate) fn begin(ctx: &'a mut GpuContext<B>, images: &'a ImageLibrary) -> Self {
        Self {
            ctx,
            images,
            finished: false,
        }
    }

    /// The backend, for submitting geometry between pages
    pub fn backend(&mut self) -> &mut B {
        &mut self.ctx.backend
    }

    /// Texture currently bound as the page, if any
    pub fn current_texture(&self) -> Option<TextureId> {
        self.ctx.texpage.current.map(|(_, texture)| texture)
    }

    /// Bind the image of `poly` for the faces that follow
    ///
    /// `None` clears the page. Tiled faces pick their tile from the image;
    /// animated tiles follow the cache's animation state.
    pub fn set_texture_page(
        &mut self,
        poly: Option<&TexPoly>,
        mipmap: bool,
        transparency: AlphaBlend,
    ) -> TexPageOutcome {
        let Some(poly) = poly else {
            self.clear_texture_page(false);
            return TexPageOutcome::Cleared;
        };

        self.ctx.texpage.active = true;
        self.ctx.set_material_alpha_blend(transparency);

        let images = self.images;
        let Some(image) = poly.image.and_then(|id| images.get(id)) else {
            self.unbind_page();
            return TexPageOutcome::NoImage;
        };

        let tile = if poly.mode.contains(TexFaceMode::TILES) {
            poly.tile
        } else {
            0
        };
        let params = VerifyParams {
            tile,
            mipmap,
            ..Default::default()
        };
        // Verify every time: the image may have changed since the last face
        let texture = match self.ctx.verify_image(image, &params) {
            Ok(texture) => texture,
            Err(e) => {
                tracing::debug!(image = image.name(), "texface drawn untextured: {e}");
                self.unbind_page();
                return TexPageOutcome::Failed(e);
            }
        };

        let page = (image.id(), texture);
        if self.ctx.texpage.current != Some(page) {
            let backend = &mut self.ctx.backend;
            backend.bind_texture(0, TextureTarget::Texture2D, Some(texture));
            backend.set_enabled(Capability::Texture2D, true);
            self.ctx.texpage.current = Some(page);
        }
        TexPageOutcome::Bound(texture)
    }

    fn unbind_page(&mut self) {
        let backend = &mut self.ctx.backend;
        backend.bind_texture(0, TextureTarget::Texture2D, None);
        backend.set_enabled(Capability::Texture2D, false);
        self.ctx.texpage.current = None;
    }

    /// Turn texturing and blending off
    ///
    /// Without `force`, clearing an already clear page does nothing.
    pub fn clear_texture_page(&mut self, force: bool) {
        if !self.ctx.texpage.active && !force {
            return;
        }
        self.ctx.texpage = TexPageState::default();
        self.ctx.forget_alpha_blend();

        let backend = &mut self.ctx.backend;
        backend.set_enabled(Capability::Blend, false);
        backend.set_enabled(Capability::Texture2D, false);
        backend.set_enabled(Capability::AlphaTest, false);
        backend.bind_texture(0, TextureTarget::Texture2D, None);
    }

    /// Draw `text` on the face of `poly` with its font image
    ///
    /// The page of `poly` should be bound first. Returns the number of glyphs
    /// drawn.
    pub fn render_text(
        &mut self,
        poly: &TexPoly,
        text: &str,
        colors: Option<&[[u8; 4]]>,
        v_quad: &[Vec3],
        uv_quad: &[Vec2],
        uv_target: UvTarget,
    ) -> usize {
        let images = self.images;
        let font = poly
            .image
            .and_then(|id| images.get(id))
            .and_then(|image| image.buffer(None));
        let mesh = text::layout_text(font, poly.mode, text, colors, v_quad, uv_quad);
        if mesh.vertices.is_empty() {
            return 0;
        }
        self.ctx
            .backend
            .draw_textured(mesh.primitive, &mesh.vertices, uv_target);
        mesh.glyphs
    }

    /// Finish texface drawing, leaving texturing off
    pub fn end(mut self) {
        self.clear_texture_page(true);
        self.finished = true;
    }
}

impl<B: GpuBackend> Drop for TexFaceSession<'_, B> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("texface session dropped without end");
            self.clear_texture_page(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, Primitive, RecordingBackend, Wrap};
    use crate::config::DrawConfig;
    use gpu_scene::{BitmapFont, Glyph, Image, ImageBuffer, ImageFlags};

    fn library() -> ImageLibrary {
        let mut images = ImageLibrary::new();
        images.insert(Image::new(ImageId(1), "wall", ImageBuffer::solid(8, 8, [255; 4])));
        images.insert(Image::new(ImageId(2), "floor", ImageBuffer::solid(4, 4, [0; 4])));
        images.insert(
            Image::new(ImageId(3), "atlas", ImageBuffer::solid(16, 16, [9; 4])).with_tiles(4, 4),
        );
        images.insert(Image::new(ImageId(4), "empty", ImageBuffer::solid(0, 0, [0; 4])));
        images
    }

    fn context() -> GpuContext<RecordingBackend> {
        let mut ctx = GpuContext::new(RecordingBackend::new(), &DrawConfig::default());
        ctx.state_init();
        ctx
    }

    fn binds(ctx: &GpuContext<RecordingBackend>) -> usize {
        ctx.backend().count_calls(|call| {
            matches!(call, BackendCall::BindTexture { unit: 0, texture: Some(_) })
        })
    }

    #[test]
    fn test_same_page_binds_once() {
        let images = library();
        let mut ctx = context();
        ctx.backend_mut().clear_calls();
        {
            let mut session = ctx.begin_texface(&images);
            let poly = TexPoly::new(ImageId(1));
            let first = session.set_texture_page(Some(&poly), true, AlphaBlend::Solid);
            let second = session.set_texture_page(Some(&poly), true, AlphaBlend::Solid);
            let (TexPageOutcome::Bound(a), TexPageOutcome::Bound(b)) = (first, second) else {
                panic!("expected both pages bound");
            };
            assert_eq!(a, b);
            assert_eq!(session.current_texture(), Some(a));
            session.end();
        }
        assert_eq!(binds(&ctx), 1);
        assert_eq!(ctx.backend().created_textures(), 1);
    }

    #[test]
    fn test_switching_pages_rebinds() {
        let images = library();
        let mut ctx = context();
        let mut session = ctx.begin_texface(&images);
        for id in [1, 2, 1] {
            let poly = TexPoly::new(ImageId(id));
            assert!(session.set_texture_page(Some(&poly), true, AlphaBlend::Solid).is_bound());
        }
        session.end();
        assert_eq!(binds(&ctx), 3);
        assert_eq!(ctx.backend().bound_texture(0), None);
    }

    #[test]
    fn test_transparency_applies_blend() {
        let images = library();
        let mut ctx = context();
        let mut session = ctx.begin_texface(&images);
        session.set_texture_page(Some(&TexPoly::new(ImageId(1))), true, AlphaBlend::Alpha);
        assert!(session.backend().is_enabled(Capability::Blend));
        session.end();
        assert!(!ctx.backend().is_enabled(Capability::Blend));
        assert_eq!(ctx.material_alpha_blend(), None);
    }

    #[test]
    fn test_missing_image_and_clear() {
        let images = library();
        let mut ctx = context();
        let mut session = ctx.begin_texface(&images);
        session.set_texture_page(Some(&TexPoly::new(ImageId(1))), true, AlphaBlend::Solid);

        let no_image = TexPoly::default();
        let outcome = session.set_texture_page(Some(&no_image), true, AlphaBlend::Solid);
        assert!(matches!(outcome, TexPageOutcome::NoImage));
        assert!(!session.backend().is_enabled(Capability::Texture2D));

        let unknown = TexPoly::new(ImageId(99));
        let outcome = session.set_texture_page(Some(&unknown), true, AlphaBlend::Solid);
        assert!(matches!(outcome, TexPageOutcome::NoImage));

        assert!(matches!(
            session.set_texture_page(None, true, AlphaBlend::Solid),
            TexPageOutcome::Cleared
        ));
        session.end();
    }

    #[test]
    fn test_repeated_clear_is_noop() {
        let images = library();
        let mut ctx = context();
        let mut session = ctx.begin_texface(&images);
        session.set_texture_page(Some(&TexPoly::new(ImageId(1))), true, AlphaBlend::Solid);
        session.clear_texture_page(false);
        session.backend().clear_calls();
        session.clear_texture_page(false);
        assert!(session.backend().calls().is_empty());
        session.clear_texture_page(true);
        assert!(!session.backend().calls().is_empty());
        session.end();
    }

    #[test]
    fn test_failed_verify_draws_untextured() {
        let images = library();
        let mut ctx = context();
        let mut session = ctx.begin_texface(&images);
        let outcome =
            session.set_texture_page(Some(&TexPoly::new(ImageId(4))), true, AlphaBlend::Solid);
        assert!(matches!(outcome, TexPageOutcome::Failed(_)));
        assert_eq!(session.current_texture(), None);
        session.end();
    }

    #[test]
    fn test_tiles_get_their_own_textures() {
        let images = library();
        let mut ctx = context();
        let mut session = ctx.begin_texface(&images);
        let a = TexPoly::new(ImageId(3)).with_tile(1);
        let b = TexPoly::new(ImageId(3)).with_tile(2);
        let TexPageOutcome::Bound(ta) = session.set_texture_page(Some(&a), false, AlphaBlend::Solid)
        else {
            panic!("tile 1 not bound");
        };
        let TexPageOutcome::Bound(tb) = session.set_texture_page(Some(&b), false, AlphaBlend::Solid)
        else {
            panic!("tile 2 not bound");
        };
        assert_ne!(ta, tb);
        session.end();
        assert_eq!(ctx.backend().texture(ta).map(|t| t.desc.width), Some(4));
    }

    #[test]
    fn test_clamp_flags_reach_sampling() {
        let mut images = library();
        images.insert(
            Image::new(ImageId(5), "decal", ImageBuffer::solid(4, 4, [1; 4]))
                .with_flags(ImageFlags::CLAMP_U | ImageFlags::CLAMP_V),
        );
        let mut ctx = context();
        let mut session = ctx.begin_texface(&images);
        let TexPageOutcome::Bound(texture) =
            session.set_texture_page(Some(&TexPoly::new(ImageId(5))), true, AlphaBlend::Solid)
        else {
            panic!("decal not bound");
        };
        session.end();
        let sampling = ctx.backend().texture(texture).map(|t| t.sampling);
        let clamped = sampling.map(|s| (s.wrap_u, s.wrap_v));
        assert_eq!(clamped, Some((Wrap::ClampToEdge, Wrap::ClampToEdge)));
    }

    #[test]
    fn test_render_text() {
        let reference = Glyph {
            unicode: u16::from(b' '),
            sizex: 8,
            sizey: 8,
            advance: 8,
            ..Default::default()
        };
        let font = BitmapFont::new(reference, vec![reference]);
        let mut images = library();
        images.insert(Image::new(
            ImageId(6),
            "font",
            ImageBuffer::solid(64, 64, [255; 4]).with_font(font),
        ));

        let mut ctx = context();
        let mut session = ctx.begin_texface(&images);
        let poly = TexPoly::new(ImageId(6)).with_mode(TexFaceMode::TEXT);
        session.set_texture_page(Some(&poly), true, AlphaBlend::Alpha);
        let v = [Vec3::ZERO, Vec3::X, Vec3::ONE, Vec3::Y];
        let uv = [Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y];
        assert_eq!(
            session.render_text(&poly, "hi", None, &v, &uv, UvTarget::TexCoord),
            2
        );

        let plain = TexPoly::new(ImageId(6));
        assert_eq!(
            session.render_text(&plain, "hi", None, &v, &uv, UvTarget::TexCoord),
            0
        );
        session.end();

        let draws = ctx.backend().count_calls(|call| {
            matches!(call, BackendCall::Draw { primitive: Primitive::Quads, vertices: 8 })
        });
        assert_eq!(draws, 1);
    }

    #[test]
    fn test_drop_clears_page() {
        let images = library();
        let mut ctx = context();
        {
            let mut session = ctx.begin_texface(&images);
            session.set_texture_page(Some(&TexPoly::new(ImageId(1))), true, AlphaBlend::Solid);
        }
        assert!(!ctx.backend().is_enabled(Capability::Texture2D));
        assert_eq!(ctx.backend().bound_texture(0), None);
    }
}
