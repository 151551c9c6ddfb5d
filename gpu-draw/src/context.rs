//! The draw context: one backend plus everything the draw layer tracks
//! about it
//!
//! All pipeline state changes made by the draw layer go through
//! [`GpuContext`]. Material and texface drawing happen inside sessions that
//! mutably borrow the context, so only one of them can be active at a time.

use glam::Mat4;
use gpu_scene::{Image, ImageLibrary, Object, SceneLayer};

use crate::backend::{
    BlendFunc, Capability, CompareFunc, Face, GpuBackend, MAX_CLIP_PLANES, MaterialParams,
    TextureId, TextureTarget, Winding,
};
use crate::config::{DrawConfig, SolidLight};
use crate::error::Result;
use crate::lights;
use crate::material::{AlphaBlend, MaterialPassParams, MaterialSession, alpha_blend};
use crate::select::SelectEncoding;
use crate::state::{GpuStateValues, StateMask};
use crate::texface::{TexFaceSession, TexPageState};
use crate::texture::{TextureCache, TextureSettings, VerifyParams};

/// Texture units reset by [`GpuContext::state_init`]
pub const MAX_TEXTURE_UNITS: u32 = 8;

/// Capabilities [`GpuContext::state_init`] turns off
const INIT_DISABLED: [Capability; 17] = [
    Capability::AlphaTest,
    Capability::Blend,
    Capability::DepthTest,
    Capability::Fog,
    Capability::Lighting,
    Capability::ColorMaterial,
    Capability::ColorLogicOp,
    Capability::StencilTest,
    Capability::ScissorTest,
    Capability::Texture2D,
    Capability::CullFace,
    Capability::Multisample,
    Capability::PolygonOffsetLine,
    Capability::PolygonOffsetFill,
    Capability::PolygonSmooth,
    Capability::LineSmooth,
    Capability::SampleAlphaToCoverage,
];

/// Draw layer state bound to one backend
pub struct GpuContext<B: GpuBackend> {
    pub(crate) backend: B,
    pub(crate) textures: TextureCache,
    /// Last blend mode applied, `None` when unknown
    alpha_blend: Option<AlphaBlend>,
    pub(crate) texpage: TexPageState,
    select: SelectEncoding,
    solid_lights: Vec<SolidLight>,
    max_lights: usize,
    alpha_clip: f32,
}

impl<B: GpuBackend> GpuContext<B> {
    /// Wrap a backend; call [`GpuContext::state_init`] before drawing
    pub fn new(backend: B, config: &DrawConfig) -> Self {
        let limits = backend.limits();
        let settings = TextureSettings::from_config(&config.textures, limits);
        let color_depth = match config.select.color_depth {
            0 => limits.color_depth,
            bits => bits,
        };
        let select = SelectEncoding::from_color_depth(color_depth);
        tracing::debug!(
            ?select,
            max_lights = config.shading.max_lights,
            glsl = limits.glsl,
            "draw context created"
        );

        Self {
            backend,
            textures: TextureCache::new(settings),
            alpha_blend: None,
            texpage: TexPageState::default(),
            select,
            solid_lights: config.lights.clone(),
            max_lights: config.shading.max_lights,
            alpha_clip: config.shading.alpha_clip,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct backend access; changes made here bypass the memoized blend
    /// and texture page state
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Backend and texture cache borrowed together, for cache calls that
    /// need the backend
    pub fn parts_mut(&mut self) -> (&mut B, &mut TextureCache) {
        (&mut self.backend, &mut self.textures)
    }

    pub fn select_encoding(&self) -> SelectEncoding {
        self.select
    }

    pub fn alpha_clip(&self) -> f32 {
        self.alpha_clip
    }

    // ===== Global state =====

    /// Put the pipeline into the baseline state the draw layer assumes
    pub fn state_init(&mut self) {
        self.set_program_point_size(false);

        let backend = &mut self.backend;
        for cap in INIT_DISABLED {
            backend.set_enabled(cap, false);
        }
        for plane in 0..MAX_CLIP_PLANES {
            backend.set_enabled(Capability::ClipPlane(plane as u8), false);
        }
        backend.set_enabled(Capability::Normalize, true);
        backend.set_enabled(Capability::Dither, true);

        backend.set_depth_func(CompareFunc::LessEqual);
        backend.set_depth_mask(true);
        backend.set_depth_clear_value(1.0);
        backend.set_depth_range(0.0, 1.0);

        backend.set_blend_func(BlendFunc::ALPHA);
        backend.set_cull_face(Face::Back);
        backend.set_front_face(Winding::CounterClockwise);
        backend.set_point_size(1.0);
        backend.set_line_width(1.0);

        backend.unbind_material_program();
        backend.set_fixed_material(&MaterialParams::default());
        backend.set_light_two_sided(true);

        for unit in 0..MAX_TEXTURE_UNITS {
            backend.bind_texture(unit, TextureTarget::Texture2D, None);
        }

        self.default_lights();
        self.alpha_blend = None;
        self.texpage = TexPageState::default();
    }

    fn set_program_point_size(&mut self, enabled: bool) {
        self.backend.set_enabled(Capability::ProgramPointSize, enabled);
    }

    /// Let shaders write their own point size
    pub fn enable_program_point_size(&mut self) {
        self.set_program_point_size(true);
    }

    pub fn disable_program_point_size(&mut self) {
        self.set_program_point_size(false);
    }

    // ===== Snapshots =====

    /// Capture the masked state groups
    pub fn save_state(&self, mask: StateMask) -> GpuStateValues {
        GpuStateValues::capture(&self.backend, mask)
    }

    /// Put back the groups captured in `values`
    ///
    /// Snapshots must be restored in LIFO order.
    pub fn restore_state(&mut self, values: &GpuStateValues) {
        values.restore(&mut self.backend);
        if values.mask().intersects(StateMask::ENABLE | StateMask::BLEND) {
            self.alpha_blend = None;
        }
    }

    /// Run `f` and restore the masked groups afterwards
    pub fn with_saved_state<R>(
        &mut self,
        mask: StateMask,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let saved = self.save_state(mask);
        let result = f(self);
        self.restore_state(&saved);
        result
    }

    // ===== Alpha blending =====

    /// Apply a blend mode unless it is already active
    pub fn set_material_alpha_blend(&mut self, mode: AlphaBlend) {
        if self.alpha_blend == Some(mode) {
            return;
        }
        alpha_blend::apply(&mut self.backend, mode, self.alpha_clip);
        self.alpha_blend = Some(mode);
    }

    pub fn material_alpha_blend(&self) -> Option<AlphaBlend> {
        self.alpha_blend
    }

    pub(crate) fn forget_alpha_blend(&mut self) {
        self.alpha_blend = None;
    }

    // ===== Lights =====

    /// Enable the visible lights of `layer` in view space, in layer order
    pub fn scene_object_lights(
        &mut self,
        layer: &SceneLayer,
        view: &Mat4,
        ortho: bool,
    ) -> usize {
        lights::scene_object_lights(&mut self.backend, layer, view, ortho, self.max_lights)
    }

    /// Enable the solid-mode lights
    pub fn default_lights(&mut self) -> usize {
        lights::default_lights(&mut self.backend, &self.solid_lights)
    }

    // ===== Selection =====

    /// Set the draw color to the pick color of `index`
    pub fn select_index_set(&mut self, index: u32) {
        let rgba = self.select.index_to_rgba(index);
        self.backend.set_color(rgba);
    }

    /// Packed pick color of `index`
    pub fn select_index_get(&self, index: u32) -> u32 {
        self.select.index_to_color(index)
    }

    // ===== Textures =====

    /// Seconds clock for texture last-use stamps and collection
    pub fn set_clock(&mut self, now_secs: u64) {
        self.textures.set_clock(now_secs);
    }

    /// Look up or create the texture of an image
    pub fn verify_image(&mut self, image: &Image, params: &VerifyParams<'_>) -> Result<TextureId> {
        self.textures.verify(&mut self.backend, image, params)
    }

    /// Frame housekeeping: run queued frees and the periodic collection
    pub fn end_frame(&mut self) -> usize {
        let flushed = self.textures.flush_pending_frees(&mut self.backend);
        flushed + self.textures.collect_garbage(&mut self.backend)
    }

    // ===== Sessions =====

    /// Start drawing `object` with its materials
    pub fn begin_object_materials<'a>(
        &'a mut self,
        images: &'a ImageLibrary,
        object: &'a Object,
        params: MaterialPassParams,
    ) -> MaterialSession<'a, B> {
        MaterialSession::begin(self, images, object, params)
    }

    /// Start drawing texface polygons
    pub fn begin_texface<'a>(&'a mut self, images: &'a ImageLibrary) -> TexFaceSession<'a, B> {
        TexFaceSession::begin(self, images)
    }
}

impl<B: GpuBackend> Drop for GpuContext<B> {
    fn drop(&mut self) {
        self.textures.release(&mut self.backend);
    }
}
