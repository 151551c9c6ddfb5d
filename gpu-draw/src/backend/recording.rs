//! Headless backend that keeps state in memory and records every call

use hashbrown::{HashMap, HashSet};

use super::*;
use crate::error::BackendError;

/// One call made against a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SetEnabled(Capability, bool),
    SetDepthFunc(CompareFunc),
    SetDepthClearValue(f64),
    SetDepthMask(bool),
    SetDepthRange(f64, f64),
    SetViewport(Rect),
    SetScissor(Rect),
    SetBlendFunc(BlendFunc),
    SetAlphaFunc(CompareFunc, f32),
    SetCullFace(Face),
    SetFrontFace(Winding),
    SetPointSize(f32),
    SetLineWidth(f32),
    SetColor([u8; 4]),
    SetLight(usize),
    SetLightTwoSided(bool),
    SetLocalViewer(bool),
    SetFixedMaterial,
    BindMaterialProgram(ProgramKind),
    UnbindMaterialProgram,
    CreateTexture(TextureId),
    UploadTexture { texture: TextureId, level: u32 },
    GenerateMipmaps(TextureId),
    SetSampling(TextureId),
    DeleteTexture(TextureId),
    BindTexture { unit: u32, texture: Option<TextureId> },
    Draw { primitive: Primitive, vertices: usize },
}

/// A texture alive in a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTexture {
    pub desc: TextureDesc,
    pub sampling: Sampling,
    /// Levels that received at least one upload
    pub uploaded_levels: Vec<u32>,
    pub upload_count: u32,
    pub mipmaps_generated: bool,
    pub bytes: usize,
}

/// In-memory [`GpuBackend`]
///
/// Starts in the state a freshly created context is in (dither on, everything
/// else off, depth func `Less`). Allocation failures can be injected with
/// [`RecordingBackend::set_fail_allocations`] or a memory budget.
#[derive(Debug)]
pub struct RecordingBackend {
    limits: BackendLimits,
    calls: Vec<BackendCall>,

    enabled: HashSet<Capability>,
    depth_func: CompareFunc,
    depth_clear: f64,
    depth_mask: bool,
    depth_range: [f64; 2],
    viewport: Rect,
    scissor: Rect,
    blend_func: BlendFunc,
    alpha_func: (CompareFunc, f32),
    cull_face: Face,
    front_face: Winding,
    point_size: f32,
    line_width: f32,
    color: [u8; 4],
    lights: [Option<LightParams>; MAX_LIGHTS],
    two_sided: bool,
    local_viewer: bool,
    fixed_material: MaterialParams,
    program: Option<(ProgramKind, MaterialParams)>,

    textures: HashMap<TextureId, RecordedTexture>,
    bound: HashMap<u32, (TextureTarget, TextureId)>,
    next_texture: u32,
    created: usize,
    drawn_vertices: Vec<TexturedVertex>,

    fail_allocations: bool,
    memory_budget: Option<usize>,
    memory_used: usize,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::with_limits(BackendLimits::default())
    }

    pub fn with_limits(limits: BackendLimits) -> Self {
        let mut enabled = HashSet::new();
        enabled.insert(Capability::Dither);
        Self {
            limits,
            calls: Vec::new(),
            enabled,
            depth_func: CompareFunc::Less,
            depth_clear: 1.0,
            depth_mask: true,
            depth_range: [0.0, 1.0],
            viewport: Rect::new(0, 0, 1920, 1080),
            scissor: Rect::new(0, 0, 1920, 1080),
            blend_func: BlendFunc::REPLACE,
            alpha_func: (CompareFunc::Always, 0.0),
            cull_face: Face::Back,
            front_face: Winding::CounterClockwise,
            point_size: 1.0,
            line_width: 1.0,
            color: [255; 4],
            lights: [None; MAX_LIGHTS],
            two_sided: false,
            local_viewer: false,
            fixed_material: MaterialParams::default(),
            program: None,
            textures: HashMap::new(),
            bound: HashMap::new(),
            next_texture: 1,
            created: 0,
            drawn_vertices: Vec::new(),
            fail_allocations: false,
            memory_budget: None,
            memory_used: 0,
        }
    }

    /// Make every following texture creation fail with `OutOfMemory`
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Limit the total bytes of live textures
    pub fn set_memory_budget(&mut self, budget: Option<usize>) {
        self.memory_budget = budget;
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Calls recorded so far that match `pred`
    pub fn count_calls(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    pub fn texture(&self, id: TextureId) -> Option<&RecordedTexture> {
        self.textures.get(&id)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Textures created over the lifetime of the backend
    pub fn created_textures(&self) -> usize {
        self.created
    }

    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.bound.get(&unit).map(|&(_, id)| id)
    }

    pub fn light(&self, slot: usize) -> Option<&LightParams> {
        self.lights.get(slot).and_then(Option::as_ref)
    }

    pub fn enabled_lights(&self) -> usize {
        (0..MAX_LIGHTS as u8)
            .filter(|&slot| self.is_enabled(Capability::Light(slot)))
            .count()
    }

    pub fn light_two_sided(&self) -> bool {
        self.two_sided
    }

    pub fn local_viewer(&self) -> bool {
        self.local_viewer
    }

    pub fn alpha_func(&self) -> (CompareFunc, f32) {
        self.alpha_func
    }

    pub fn cull_face(&self) -> Face {
        self.cull_face
    }

    pub fn front_face(&self) -> Winding {
        self.front_face
    }

    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn color(&self) -> [u8; 4] {
        self.color
    }

    pub fn fixed_material(&self) -> &MaterialParams {
        &self.fixed_material
    }

    pub fn bound_program(&self) -> Option<&(ProgramKind, MaterialParams)> {
        self.program.as_ref()
    }

    /// Every vertex submitted through `draw_textured`, in order
    pub fn drawn_vertices(&self) -> &[TexturedVertex] {
        &self.drawn_vertices
    }

    fn record(&mut self, call: BackendCall) {
        tracing::trace!(?call, "recording backend");
        self.calls.push(call);
    }

    fn texture_bytes(desc: &TextureDesc) -> usize {
        let texels = desc.width as usize * desc.height as usize * desc.depth.max(1) as usize;
        let base = match desc.format.texel_size() {
            Some(size) => texels * size,
            // DXT1 packs 16 texels in 8 bytes, DXT3/5 in 16
            None if desc.format == TexelFormat::Dxt1 => texels / 2,
            None => texels,
        };
        let faces = if desc.target == TextureTarget::CubeMap { 6 } else { 1 };
        let base = base * faces;
        if desc.mip_levels > 1 { base + base / 3 } else { base }
    }
}

impl GpuBackend for RecordingBackend {
    fn limits(&self) -> &BackendLimits {
        &self.limits
    }

    fn set_enabled(&mut self, cap: Capability, enabled: bool) {
        if enabled {
            self.enabled.insert(cap);
        } else {
            self.enabled.remove(&cap);
        }
        self.record(BackendCall::SetEnabled(cap, enabled));
    }

    fn is_enabled(&self, cap: Capability) -> bool {
        self.enabled.contains(&cap)
    }

    fn set_depth_func(&mut self, func: CompareFunc) {
        self.depth_func = func;
        self.record(BackendCall::SetDepthFunc(func));
    }

    fn depth_func(&self) -> CompareFunc {
        self.depth_func
    }

    fn set_depth_clear_value(&mut self, value: f64) {
        self.depth_clear = value;
        self.record(BackendCall::SetDepthClearValue(value));
    }

    fn depth_clear_value(&self) -> f64 {
        self.depth_clear
    }

    fn set_depth_mask(&mut self, write: bool) {
        self.depth_mask = write;
        self.record(BackendCall::SetDepthMask(write));
    }

    fn depth_mask(&self) -> bool {
        self.depth_mask
    }

    fn set_depth_range(&mut self, near: f64, far: f64) {
        self.depth_range = [near, far];
        self.record(BackendCall::SetDepthRange(near, far));
    }

    fn depth_range(&self) -> [f64; 2] {
        self.depth_range
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
        self.record(BackendCall::SetViewport(rect));
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn set_scissor(&mut self, rect: Rect) {
        self.scissor = rect;
        self.record(BackendCall::SetScissor(rect));
    }

    fn scissor(&self) -> Rect {
        self.scissor
    }

    fn set_blend_func(&mut self, func: BlendFunc) {
        self.blend_func = func;
        self.record(BackendCall::SetBlendFunc(func));
    }

    fn blend_func(&self) -> BlendFunc {
        self.blend_func
    }

    fn set_alpha_func(&mut self, func: CompareFunc, reference: f32) {
        self.alpha_func = (func, reference);
        self.record(BackendCall::SetAlphaFunc(func, reference));
    }

    fn set_cull_face(&mut self, face: Face) {
        self.cull_face = face;
        self.record(BackendCall::SetCullFace(face));
    }

    fn set_front_face(&mut self, winding: Winding) {
        self.front_face = winding;
        self.record(BackendCall::SetFrontFace(winding));
    }

    fn set_point_size(&mut self, size: f32) {
        self.point_size = size;
        self.record(BackendCall::SetPointSize(size));
    }

    fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
        self.record(BackendCall::SetLineWidth(width));
    }

    fn set_color(&mut self, rgba: [u8; 4]) {
        self.color = rgba;
        self.record(BackendCall::SetColor(rgba));
    }

    fn set_light(&mut self, slot: usize, params: &LightParams) {
        if let Some(light) = self.lights.get_mut(slot) {
            *light = Some(*params);
        }
        self.record(BackendCall::SetLight(slot));
    }

    fn set_light_two_sided(&mut self, two_sided: bool) {
        self.two_sided = two_sided;
        self.record(BackendCall::SetLightTwoSided(two_sided));
    }

    fn set_local_viewer(&mut self, local: bool) {
        self.local_viewer = local;
        self.record(BackendCall::SetLocalViewer(local));
    }

    fn set_fixed_material(&mut self, material: &MaterialParams) {
        self.fixed_material = *material;
        self.record(BackendCall::SetFixedMaterial);
    }

    fn bind_material_program(&mut self, kind: ProgramKind, material: &MaterialParams) {
        self.program = Some((kind, *material));
        self.record(BackendCall::BindMaterialProgram(kind));
    }

    fn unbind_material_program(&mut self) {
        self.program = None;
        self.record(BackendCall::UnbindMaterialProgram);
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, BackendError> {
        let bytes = Self::texture_bytes(desc);
        let over_budget = self
            .memory_budget
            .is_some_and(|budget| self.memory_used + bytes > budget);
        if self.fail_allocations || over_budget {
            tracing::trace!(label = %desc.label, bytes, "recording backend: allocation refused");
            return Err(BackendError::OutOfMemory { bytes });
        }
        if desc.format.is_compressed() && !self.limits.s3tc {
            return Err(BackendError::UnsupportedFormat(desc.format));
        }

        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.created += 1;
        self.memory_used += bytes;
        self.textures.insert(
            id,
            RecordedTexture {
                desc: desc.clone(),
                sampling: Sampling::default(),
                uploaded_levels: Vec::new(),
                upload_count: 0,
                mipmaps_generated: false,
                bytes,
            },
        );
        self.record(BackendCall::CreateTexture(id));
        Ok(id)
    }

    fn upload_texture(
        &mut self,
        texture: TextureId,
        upload: &TextureUpload<'_>,
    ) -> Result<(), BackendError> {
        let entry = self
            .textures
            .get_mut(&texture)
            .ok_or(BackendError::InvalidTexture(texture))?;

        let desc = &entry.desc;
        let size = [
            (desc.width >> upload.level).max(1),
            (desc.height >> upload.level).max(1),
            (desc.depth >> upload.level).max(1),
        ];
        let fits = (0..3).all(|axis| {
            upload.offset[axis] < size[axis]
                && upload.offset[axis] + upload.extent[axis] <= size[axis]
        });
        if !fits {
            return Err(BackendError::UploadOutOfBounds {
                level: upload.level,
                offset: upload.offset,
                extent: upload.extent,
                size,
            });
        }

        if let Some(texel) = entry.desc.format.texel_size() {
            let [w, h, d] = upload.extent;
            let expected = w as usize * h as usize * d.max(1) as usize * texel;
            let got = upload.data.byte_len();
            if expected != got {
                return Err(BackendError::UploadSize { expected, got });
            }
        }

        if !entry.uploaded_levels.contains(&upload.level) {
            entry.uploaded_levels.push(upload.level);
        }
        entry.upload_count += 1;
        self.record(BackendCall::UploadTexture {
            texture,
            level: upload.level,
        });
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.get_mut(&texture) {
            entry.mipmaps_generated = true;
        }
        self.record(BackendCall::GenerateMipmaps(texture));
    }

    fn set_sampling(&mut self, texture: TextureId, sampling: &Sampling) {
        if let Some(entry) = self.textures.get_mut(&texture) {
            entry.sampling = *sampling;
        }
        self.record(BackendCall::SetSampling(texture));
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.remove(&texture) {
            self.memory_used -= entry.bytes;
        }
        self.bound.retain(|_, &mut (_, id)| id != texture);
        self.record(BackendCall::DeleteTexture(texture));
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<TextureId>) {
        match texture {
            Some(id) => {
                self.bound.insert(unit, (target, id));
            }
            None => {
                self.bound.remove(&unit);
            }
        }
        self.record(BackendCall::BindTexture { unit, texture });
    }

    fn draw_textured(&mut self, primitive: Primitive, vertices: &[TexturedVertex], _uv: UvTarget) {
        self.drawn_vertices.extend_from_slice(vertices);
        self.record(BackendCall::Draw {
            primitive,
            vertices: vertices.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(width: u32, height: u32) -> TextureDesc {
        TextureDesc {
            label: "test".into(),
            target: TextureTarget::Texture2D,
            format: TexelFormat::Rgba8,
            width,
            height,
            depth: 1,
            mip_levels: 1,
        }
    }

    #[test]
    fn test_create_and_delete_tracks_memory() {
        let mut backend = RecordingBackend::new();
        let id = backend.create_texture(&desc(4, 4)).unwrap();
        assert_eq!(backend.memory_used(), 64);
        backend.bind_texture(0, TextureTarget::Texture2D, Some(id));
        backend.delete_texture(id);
        assert_eq!(backend.memory_used(), 0);
        assert_eq!(backend.bound_texture(0), None);
        assert_eq!(backend.created_textures(), 1);
    }

    #[test]
    fn test_memory_budget_refuses_allocation() {
        let mut backend = RecordingBackend::new();
        backend.set_memory_budget(Some(100));
        assert!(backend.create_texture(&desc(4, 4)).is_ok());
        assert_eq!(
            backend.create_texture(&desc(4, 4)),
            Err(BackendError::OutOfMemory { bytes: 64 })
        );
    }

    #[test]
    fn test_upload_size_checked() {
        let mut backend = RecordingBackend::new();
        let id = backend.create_texture(&desc(2, 2)).unwrap();
        let pixels = [0u8; 16];
        let ok = TextureUpload::level_2d(0, 2, 2, TexelData::Rgba8(&pixels));
        assert!(backend.upload_texture(id, &ok).is_ok());
        let short = TextureUpload::level_2d(0, 2, 2, TexelData::Rgba8(&pixels[..8]));
        assert!(matches!(
            backend.upload_texture(id, &short),
            Err(BackendError::UploadSize { expected: 16, got: 8 })
        ));
    }

    #[test]
    fn test_upload_bounds_checked() {
        let mut backend = RecordingBackend::new();
        let id = backend.create_texture(&desc(4, 4)).unwrap();
        let pixels = [0u8; 16];
        let inside = TextureUpload {
            offset: [2, 2, 0],
            ..TextureUpload::level_2d(0, 2, 2, TexelData::Rgba8(&pixels))
        };
        assert!(backend.upload_texture(id, &inside).is_ok());

        let outside = TextureUpload {
            offset: [3, 2, 0],
            ..inside
        };
        assert!(matches!(
            backend.upload_texture(id, &outside),
            Err(BackendError::UploadOutOfBounds { size: [4, 4, 1], .. })
        ));
        let empty_past_edge = TextureUpload {
            offset: [10, 10, 0],
            ..TextureUpload::level_2d(0, 0, 0, TexelData::Rgba8(&[]))
        };
        assert!(backend.upload_texture(id, &empty_past_edge).is_err());
        assert_eq!(backend.texture(id).unwrap().upload_count, 1);
    }

    #[test]
    fn test_initial_state() {
        let backend = RecordingBackend::new();
        assert!(backend.is_enabled(Capability::Dither));
        assert!(!backend.is_enabled(Capability::Blend));
        assert_eq!(backend.depth_func(), CompareFunc::Less);
        assert!(backend.calls().is_empty());
    }
}
