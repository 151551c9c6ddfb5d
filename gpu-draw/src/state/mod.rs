//! Pipeline state snapshots
//!
//! [`GpuStateValues`] captures groups of pipeline state selected by a
//! [`StateMask`] and writes exactly those groups back later. Snapshots nest:
//! take them and restore them in strict LIFO order around nested drawing.
//!
//! Restore order is fixed:
//! 1. depth group (test toggle, func, clear value, write mask)
//! 2. enable group (every toggle, lights and clip planes included)
//! 3. viewport group (viewport, then depth range)
//! 4. scissor group (box, then the scissor-test toggle)
//! 5. blend group (toggle, then blend func)

use crate::backend::{
    BlendFunc, Capability, CompareFunc, GpuBackend, MAX_CLIP_PLANES, MAX_LIGHTS, Rect,
};

#[cfg(test)]
mod tests;

bitflags::bitflags! {
    /// Which groups a snapshot holds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct StateMask: u32 {
        const DEPTH_BUFFER = 1 << 0;
        const ENABLE = 1 << 1;
        const SCISSOR = 1 << 2;
        const VIEWPORT = 1 << 3;
        const BLEND = 1 << 4;
    }
}

/// Number of toggles in the enable group
pub const ENABLE_COUNT: usize = 15 + MAX_CLIP_PLANES + MAX_LIGHTS;

/// Toggles of the enable group in the order they are restored
pub const ENABLE_ORDER: [Capability; ENABLE_COUNT] = [
    Capability::Blend,
    Capability::ClipPlane(0),
    Capability::ClipPlane(1),
    Capability::ClipPlane(2),
    Capability::ClipPlane(3),
    Capability::ClipPlane(4),
    Capability::ClipPlane(5),
    Capability::CullFace,
    Capability::DepthTest,
    Capability::Dither,
    Capability::Lighting,
    Capability::Light(0),
    Capability::Light(1),
    Capability::Light(2),
    Capability::Light(3),
    Capability::Light(4),
    Capability::Light(5),
    Capability::Light(6),
    Capability::Light(7),
    Capability::LineSmooth,
    Capability::ColorLogicOp,
    Capability::Multisample,
    Capability::PolygonOffsetLine,
    Capability::PolygonOffsetFill,
    Capability::PolygonSmooth,
    Capability::SampleAlphaToCoverage,
    Capability::ScissorTest,
    Capability::StencilTest,
    Capability::AlphaTest,
];

/// Snapshot of the masked pipeline state groups
///
/// Fields of groups outside [`GpuStateValues::mask`] hold defaults and are
/// never written back.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuStateValues {
    mask: StateMask,

    // DEPTH_BUFFER
    pub depth_test: bool,
    pub depth_func: CompareFunc,
    pub depth_clear_value: f64,
    pub depth_write: bool,

    // ENABLE, indexed like ENABLE_ORDER
    pub enables: [bool; ENABLE_COUNT],

    // VIEWPORT
    pub viewport: Rect,
    pub depth_range: [f64; 2],

    // SCISSOR
    pub scissor: Rect,
    pub scissor_test: bool,

    // BLEND
    pub blend: bool,
    pub blend_func: BlendFunc,
}

impl Default for GpuStateValues {
    fn default() -> Self {
        Self {
            mask: StateMask::empty(),
            depth_test: false,
            depth_func: CompareFunc::Less,
            depth_clear_value: 1.0,
            depth_write: true,
            enables: [false; ENABLE_COUNT],
            viewport: Rect::default(),
            depth_range: [0.0, 1.0],
            scissor: Rect::default(),
            scissor_test: false,
            blend: false,
            blend_func: BlendFunc::REPLACE,
        }
    }
}

impl GpuStateValues {
    /// Read the masked groups from the backend without changing anything
    pub fn capture<B: GpuBackend + ?Sized>(backend: &B, mask: StateMask) -> Self {
        let mut values = Self {
            mask,
            ..Default::default()
        };

        if mask.contains(StateMask::DEPTH_BUFFER) {
            values.depth_test = backend.is_enabled(Capability::DepthTest);
            values.depth_func = backend.depth_func();
            values.depth_clear_value = backend.depth_clear_value();
            values.depth_write = backend.depth_mask();
        }

        if mask.contains(StateMask::ENABLE) {
            for (slot, cap) in values.enables.iter_mut().zip(ENABLE_ORDER) {
                *slot = backend.is_enabled(cap);
            }
        }

        if mask.contains(StateMask::VIEWPORT) {
            values.viewport = backend.viewport();
            values.depth_range = backend.depth_range();
        }

        if mask.contains(StateMask::SCISSOR) {
            values.scissor = backend.scissor();
            values.scissor_test = backend.is_enabled(Capability::ScissorTest);
        }

        if mask.contains(StateMask::BLEND) {
            values.blend = backend.is_enabled(Capability::Blend);
            values.blend_func = backend.blend_func();
        }

        values
    }

    /// Write the masked groups back in the fixed restore order
    pub fn restore<B: GpuBackend + ?Sized>(&self, backend: &mut B) {
        let mask = self.mask;

        if mask.contains(StateMask::DEPTH_BUFFER) {
            backend.set_enabled(Capability::DepthTest, self.depth_test);
            backend.set_depth_func(self.depth_func);
            backend.set_depth_clear_value(self.depth_clear_value);
            backend.set_depth_mask(self.depth_write);
        }

        if mask.contains(StateMask::ENABLE) {
            for (&enabled, cap) in self.enables.iter().zip(ENABLE_ORDER) {
                backend.set_enabled(cap, enabled);
            }
        }

        if mask.contains(StateMask::VIEWPORT) {
            backend.set_viewport(self.viewport);
            let [near, far] = self.depth_range;
            backend.set_depth_range(near, far);
        }

        if mask.contains(StateMask::SCISSOR) {
            backend.set_scissor(self.scissor);
            backend.set_enabled(Capability::ScissorTest, self.scissor_test);
        }

        if mask.contains(StateMask::BLEND) {
            backend.set_enabled(Capability::Blend, self.blend);
            backend.set_blend_func(self.blend_func);
        }
    }

    pub fn mask(&self) -> StateMask {
        self.mask
    }

    /// Captured value of a toggle, `None` when the enable group was not saved
    /// or the capability is not part of it
    pub fn enabled(&self, cap: Capability) -> Option<bool> {
        if !self.mask.contains(StateMask::ENABLE) {
            return None;
        }
        ENABLE_ORDER
            .iter()
            .position(|&c| c == cap)
            .map(|index| self.enables[index])
    }
}
