//! Immediate-mode graphics API consumed by the draw layer
//!
//! The draw layer never talks to a driver directly. Everything goes through
//! [`GpuBackend`], which mirrors a classic immediate-mode API: global toggles,
//! a handful of fixed-function parameters, and textures addressed by handle.
//! Every setter has a matching getter so state can be snapshotted and put
//! back.
//!
//! [`RecordingBackend`] is a headless implementation that keeps the state in
//! memory and logs every call. Tests and the probe binary run against it.

mod recording;
mod types;

pub use recording::{BackendCall, RecordedTexture, RecordingBackend};
pub use types::*;

use crate::error::BackendError;

/// Graphics API the draw layer drives
///
/// Implementations are assumed to be current on the calling thread.
pub trait GpuBackend {
    fn limits(&self) -> &BackendLimits;

    // ===== Toggles =====

    fn set_enabled(&mut self, cap: Capability, enabled: bool);
    fn is_enabled(&self, cap: Capability) -> bool;

    // ===== Depth =====

    fn set_depth_func(&mut self, func: CompareFunc);
    fn depth_func(&self) -> CompareFunc;
    fn set_depth_clear_value(&mut self, value: f64);
    fn depth_clear_value(&self) -> f64;
    fn set_depth_mask(&mut self, write: bool);
    fn depth_mask(&self) -> bool;
    fn set_depth_range(&mut self, near: f64, far: f64);
    fn depth_range(&self) -> [f64; 2];

    // ===== Rectangles =====

    fn set_viewport(&mut self, rect: Rect);
    fn viewport(&self) -> Rect;
    fn set_scissor(&mut self, rect: Rect);
    fn scissor(&self) -> Rect;

    // ===== Blending and rasterization =====

    fn set_blend_func(&mut self, func: BlendFunc);
    fn blend_func(&self) -> BlendFunc;
    fn set_alpha_func(&mut self, func: CompareFunc, reference: f32);
    fn set_cull_face(&mut self, face: Face);
    fn set_front_face(&mut self, winding: Winding);
    fn set_point_size(&mut self, size: f32);
    fn set_line_width(&mut self, width: f32);
    /// Current vertex color used when a draw carries none
    fn set_color(&mut self, rgba: [u8; 4]);

    // ===== Fixed-function lighting =====

    /// Set the parameters of a light slot; enabling it is a separate toggle
    fn set_light(&mut self, slot: usize, params: &LightParams);
    fn set_light_two_sided(&mut self, two_sided: bool);
    fn set_local_viewer(&mut self, local: bool);
    fn set_fixed_material(&mut self, material: &MaterialParams);

    // ===== Material programs =====

    fn bind_material_program(&mut self, kind: ProgramKind, material: &MaterialParams);
    fn unbind_material_program(&mut self);

    // ===== Textures =====

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, BackendError>;
    fn upload_texture(
        &mut self,
        texture: TextureId,
        upload: &TextureUpload<'_>,
    ) -> Result<(), BackendError>;
    fn generate_mipmaps(&mut self, texture: TextureId);
    fn set_sampling(&mut self, texture: TextureId, sampling: &Sampling);
    fn delete_texture(&mut self, texture: TextureId);
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureId>);

    // ===== Geometry =====

    fn draw_textured(&mut self, primitive: Primitive, vertices: &[TexturedVertex], uv: UvTarget);
}
