//! Alpha blend modes

use gpu_scene::MaterialBlend;

use crate::backend::{BlendFactor, BlendFunc, Capability, CompareFunc, GpuBackend};

/// Alpha test reference of [`AlphaBlend::Clip`]
pub const CLIP_THRESHOLD: f32 = 0.5;

/// How a draw combines with the framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaBlend {
    #[default]
    Solid,
    Add,
    Alpha,
    /// Alpha test at [`CLIP_THRESHOLD`], no blending
    Clip,
    /// Like `Alpha`; the caller sorts faces back to front
    AlphaSort,
    AlphaToCoverage,
}

impl AlphaBlend {
    /// Drawn in the opaque pass when an alpha pass is in use
    pub fn is_solid_pass(self) -> bool {
        matches!(self, AlphaBlend::Solid | AlphaBlend::Clip)
    }

    /// Worth moving to a second pass after opaque geometry
    pub fn wants_deferral(self) -> bool {
        matches!(self, AlphaBlend::Alpha | AlphaBlend::Add | AlphaBlend::AlphaSort)
    }
}

impl From<MaterialBlend> for AlphaBlend {
    fn from(blend: MaterialBlend) -> Self {
        match blend {
            MaterialBlend::Opaque => AlphaBlend::Solid,
            MaterialBlend::Add => AlphaBlend::Add,
            MaterialBlend::AlphaBlend => AlphaBlend::Alpha,
            MaterialBlend::AlphaClip => AlphaBlend::Clip,
            MaterialBlend::AlphaSort => AlphaBlend::AlphaSort,
            MaterialBlend::AlphaToCoverage => AlphaBlend::AlphaToCoverage,
        }
    }
}

/// Straight alpha for color, accumulated coverage for the alpha channel
const ALPHA_OVER: BlendFunc = BlendFunc::separate(
    BlendFactor::SrcAlpha,
    BlendFactor::OneMinusSrcAlpha,
    BlendFactor::One,
    BlendFactor::OneMinusSrcAlpha,
);

/// Program the backend for `mode`; `alpha_clip` is the alpha test reference
/// of the blending modes
pub(crate) fn apply<B: GpuBackend + ?Sized>(backend: &mut B, mode: AlphaBlend, alpha_clip: f32) {
    match mode {
        AlphaBlend::Solid => {
            backend.set_enabled(Capability::Blend, false);
            backend.set_enabled(Capability::AlphaTest, false);
            backend.set_enabled(Capability::SampleAlphaToCoverage, false);
            backend.set_blend_func(BlendFunc::REPLACE);
        }
        AlphaBlend::Add => {
            backend.set_enabled(Capability::Blend, true);
            backend.set_blend_func(BlendFunc::ADD);
            backend.set_enabled(Capability::AlphaTest, false);
            backend.set_enabled(Capability::SampleAlphaToCoverage, false);
        }
        AlphaBlend::Alpha | AlphaBlend::AlphaSort => {
            backend.set_enabled(Capability::Blend, true);
            backend.set_enabled(Capability::SampleAlphaToCoverage, false);
            backend.set_blend_func(ALPHA_OVER);
            // A threshold of 1 would discard everything
            if alpha_clip >= 1.0 {
                backend.set_enabled(Capability::AlphaTest, false);
            } else {
                backend.set_enabled(Capability::AlphaTest, true);
                backend.set_alpha_func(CompareFunc::Greater, alpha_clip);
            }
        }
        AlphaBlend::Clip => {
            backend.set_enabled(Capability::Blend, false);
            backend.set_enabled(Capability::SampleAlphaToCoverage, false);
            backend.set_enabled(Capability::AlphaTest, true);
            backend.set_alpha_func(CompareFunc::Greater, CLIP_THRESHOLD);
        }
        AlphaBlend::AlphaToCoverage => {
            backend.set_enabled(Capability::AlphaTest, true);
            backend.set_alpha_func(CompareFunc::Greater, alpha_clip);
            backend.set_enabled(Capability::SampleAlphaToCoverage, true);
        }
    }
}
