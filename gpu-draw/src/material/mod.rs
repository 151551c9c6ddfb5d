//! Material binding for one object's draw
//!
//! A [`MaterialSession`] walks through `begin → bind → unbind → end`:
//!
//! ```text
//! Idle ──begin──► ObjectBound ──bind(i)──► MaterialBound
//!  ▲                  ▲  ▲                     │  │
//!  │                  │  └─────unbind──────────┘  │ bind(j)
//!  └──────end─────────┘                        ◄──┘
//! ```
//!
//! Binding the same slot twice in a row is free. Skipped slots leave the
//! session in `ObjectBound`; the caller must not draw the geometry of a
//! skipped slot.

pub(crate) mod alpha_blend;


pub use alpha_blend::{AlphaBlend, CLIP_THRESHOLD};

use glam::Vec3;
use gpu_scene::{DupliObject, ImageLibrary, Material, Object};
use smallvec::SmallVec;

use crate::backend::{Capability, GpuBackend, MaterialParams, ProgramKind, TextureTarget};
use crate::context::GpuContext;
use crate::error::{DrawError, Result};
use crate::texture::VerifyParams;

/// How the object is being drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialPassParams {
    /// Shader materials, when the backend supports them
    pub glsl: bool,
    /// Blended materials belong to a second pass after opaque geometry
    pub use_alpha_pass: bool,
    /// This is that second pass
    pub is_alpha_pass: bool,
    /// Draw every slot with the matcap shader
    pub use_matcaps: bool,
    /// Bind material textures
    pub textured: bool,
}

/// Why a slot must not be drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Index past the object's material slots
    OutOfRange,
    /// Blended with zero alpha
    Transparent,
    /// Belongs to the other pass
    NotInPass,
}

/// Result of [`MaterialSession::bind_material`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindOutcome {
    Bound,
    Skip(SkipReason),
}

impl BindOutcome {
    pub fn is_bound(self) -> bool {
        self == BindOutcome::Bound
    }
}

/// Fixed-function colors of a material
///
/// Shadeless materials keep their flat color. Otherwise the diffuse color is
/// scaled by its intensity (and tinted by `object_color` when the material
/// asks for it) and hardness is clamped to `1..=128`.
pub fn fixed_params(material: &Material, object_color: [f32; 4], alpha: f32) -> MaterialParams {
    if material.shadeless {
        let [r, g, b] = material.diffuse;
        return MaterialParams {
            diffuse: [r, g, b, alpha],
            specular: [0.0; 3],
            hardness: 0,
            shadeless: true,
        };
    }

    let mut diffuse = Vec3::from(material.diffuse) * material.diffuse_intensity;
    if material.use_object_color {
        let [r, g, b, _] = object_color;
        diffuse *= Vec3::new(r, g, b);
    }
    let specular = Vec3::from(material.specular) * material.specular_intensity;
    MaterialParams {
        diffuse: diffuse.extend(alpha).to_array(),
        specular: specular.to_array(),
        hardness: material.hardness.clamp(1, 128),
        shadeless: false,
    }
}

/// Material bindings of one object, see the module docs
pub struct MaterialSession<'a, B: GpuBackend> {
    ctx: &'a mut GpuContext<B>,
    images: &'a ImageLibrary,
    object: &'a Object,
    default_material: Material,
    params: MaterialPassParams,
    /// Shader materials in use (requested and supported)
    glsl: bool,
    use_matcaps: bool,
    bound: Option<usize>,
    last: Option<(usize, BindOutcome)>,
    program_bound: bool,
    deferred_alpha: bool,
    units: SmallVec<[u32; 4]>,
    dupli: Option<DupliObject>,
    finished: bool,
}

impl<'a, B: GpuBackend> MaterialSession<'a, B> {
    pub(crate) fn begin(
        ctx: &'a mut GpuContext<B>,
        images: &'a ImageLibrary,
        object: &'a Object,
        params: MaterialPassParams,
    ) -> Self {
        let programs = ctx.backend.limits().glsl;
        if (params.glsl || params.use_matcaps) && !programs {
            tracing::debug!(
                object = %object.name,
                "no shader support, using fixed-function materials"
            );
        }

        let mut session = Self {
            ctx,
            images,
            object,
            default_material: Material::default(),
            params,
            glsl: params.glsl && programs,
            use_matcaps: params.use_matcaps && programs,
            bound: None,
            last: None,
            program_bound: false,
            deferred_alpha: false,
            units: SmallVec::new(),
            dupli: None,
            finished: false,
        };
        session.ctx.set_material_alpha_blend(AlphaBlend::Solid);
        session
    }

    // ===== Queries =====

    pub fn object(&self) -> &Object {
        self.object
    }

    /// Whether this session draws `object`
    pub fn is_for_object(&self, object: &Object) -> bool {
        self.object.id == object.id
    }

    pub fn is_glsl(&self) -> bool {
        self.glsl
    }

    pub fn use_matcaps(&self) -> bool {
        self.use_matcaps
    }

    /// A bound material wants a second, blended pass
    pub fn deferred_alpha(&self) -> bool {
        self.deferred_alpha
    }

    /// Slot currently bound, `None` in the `ObjectBound` state
    pub fn bound_material(&self) -> Option<usize> {
        self.bound
    }

    pub fn dupli(&self) -> Option<&DupliObject> {
        self.dupli.as_ref()
    }

    /// The backend, for submitting geometry between binds
    pub fn backend(&mut self) -> &mut B {
        &mut self.ctx.backend
    }

    fn material(&self, index: usize) -> Option<&Material> {
        if index >= self.object.material_count() {
            return None;
        }
        Some(
            self.object
                .materials
                .get(index)
                .and_then(Option::as_ref)
                .unwrap_or(&self.default_material),
        )
    }

    fn blend_of(&self, material: &Material) -> AlphaBlend {
        // Without shaders or a second pass there is nowhere to blend
        if self.use_matcaps || !(self.glsl || self.params.use_alpha_pass) {
            AlphaBlend::Solid
        } else {
            material.blend.into()
        }
    }

    fn decide(&self, index: usize) -> BindOutcome {
        let Some(material) = self.material(index) else {
            return BindOutcome::Skip(SkipReason::OutOfRange);
        };
        let blend = self.blend_of(material);
        let in_pass = match (self.params.use_alpha_pass, self.params.is_alpha_pass) {
            (true, true) => !blend.is_solid_pass(),
            (true, false) => true,
            (false, is_alpha_pass) => !is_alpha_pass,
        };
        if !in_pass {
            BindOutcome::Skip(SkipReason::NotInPass)
        } else if !blend.is_solid_pass() && material.alpha <= 0.0 {
            BindOutcome::Skip(SkipReason::Transparent)
        } else {
            BindOutcome::Bound
        }
    }

    /// Whether `bind_material(index)` would bind, without binding
    pub fn material_visible(&self, index: usize) -> bool {
        self.decide(index).is_bound()
    }

    fn object_color(&self) -> [f32; 4] {
        self.dupli
            .and_then(|dupli| dupli.color)
            .unwrap_or(self.object.color)
    }

    fn params_for(&self, material: &Material) -> MaterialParams {
        let alpha = match self.blend_of(material) {
            AlphaBlend::Solid => 1.0,
            _ => material.alpha,
        };
        fixed_params(material, self.object_color(), alpha)
    }

    /// Effective RGBA of a slot, the default material's for invalid slots
    pub fn material_diffuse(&self, index: usize) -> [f32; 4] {
        let material = self.material(index).unwrap_or(&self.default_material);
        self.params_for(material).diffuse
    }

    // ===== Binding =====

    /// Bind slot `index`
    ///
    /// On [`BindOutcome::Skip`] the geometry of the slot must not be drawn.
    /// Blended materials drawn in the first pass of a two-pass draw set
    /// [`MaterialSession::deferred_alpha`].
    pub fn bind_material(&mut self, index: usize) -> BindOutcome {
        if let Some((last, outcome)) = self.last {
            if last == index {
                return outcome;
            }
        }

        self.release();
        let outcome = self.decide(index);
        self.last = Some((index, outcome));

        let BindOutcome::Skip(reason) = outcome else {
            self.apply(index);
            return outcome;
        };
        tracing::trace!(object = %self.object.name, index, ?reason, "material skipped");
        outcome
    }

    fn apply(&mut self, index: usize) {
        let Some(material) = self.material(index) else {
            return;
        };
        let params = self.params_for(material);
        let blend = self.blend_of(material);
        let texture = material.texture.filter(|_| self.params.textured && !self.use_matcaps);
        let programs = self.glsl || self.use_matcaps;

        if self.params.use_alpha_pass && !self.params.is_alpha_pass && blend.wants_deferral() {
            self.deferred_alpha = true;
        }

        let backend = &mut self.ctx.backend;
        if programs {
            let kind = if self.use_matcaps {
                ProgramKind::Matcap
            } else {
                ProgramKind::Material
            };
            backend.bind_material_program(kind, &params);
            if self.use_matcaps {
                backend.set_color([255; 4]);
            }
            self.program_bound = true;
        } else {
            backend.set_fixed_material(&params);
            backend.set_enabled(Capability::Lighting, !params.shadeless);
        }

        if let Some(image_id) = texture {
            let images = self.images;
            match images.get(image_id) {
                Some(image) => match self.ctx.verify_image(image, &VerifyParams::default()) {
                    Ok(texture) => {
                        let backend = &mut self.ctx.backend;
                        backend.bind_texture(0, TextureTarget::Texture2D, Some(texture));
                        if !programs {
                            backend.set_enabled(Capability::Texture2D, true);
                        }
                        self.units.push(0);
                    }
                    Err(e) => {
                        tracing::debug!(image = image.name(), "drawing untextured: {e}");
                    }
                },
                None => tracing::debug!(?image_id, "material image missing, drawing untextured"),
            }
        }

        self.ctx.set_material_alpha_blend(blend);
        self.bound = Some(index);
    }

    /// Undo what the bound material set up, if anything
    fn release(&mut self) {
        let backend = &mut self.ctx.backend;
        let had_units = !self.units.is_empty();
        for unit in self.units.drain(..) {
            backend.bind_texture(unit, TextureTarget::Texture2D, None);
        }
        if self.program_bound {
            backend.unbind_material_program();
            self.program_bound = false;
        } else if self.bound.is_some() {
            if had_units {
                backend.set_enabled(Capability::Texture2D, false);
            }
            backend.set_enabled(Capability::Lighting, false);
        }
        self.bound = None;
    }

    /// Back to `ObjectBound`: release the material's textures and program
    /// and return to solid blending
    pub fn unbind_material(&mut self) {
        self.release();
        self.last = None;
        self.ctx.set_material_alpha_blend(AlphaBlend::Solid);
    }

    // ===== Dupli objects =====

    /// Override the object color for one instance
    pub fn begin_dupli_object(&mut self, dupli: &DupliObject) {
        debug_assert!(self.dupli.is_none(), "dupli object already active");
        self.dupli = Some(*dupli);
        // Colors depend on the override, rebind on the next call
        self.last = None;
    }

    pub fn end_dupli_object(&mut self) {
        debug_assert!(self.dupli.is_some(), "no dupli object active");
        self.dupli = None;
        self.last = None;
    }

    // ===== End =====

    fn finish(&mut self) {
        self.unbind_material();
        self.dupli = None;
        self.finished = true;
    }

    /// Finish the session
    ///
    /// Ending with a material still bound is a protocol error: the binding is
    /// cleaned up and reported.
    pub fn end(mut self) -> Result<()> {
        let still_bound = self.bound;
        self.finish();
        match still_bound {
            Some(index) => {
                tracing::warn!(
                    object = %self.object.name,
                    index,
                    "session ended with a material bound"
                );
                Err(DrawError::MaterialStillBound { index })
            }
            None => Ok(()),
        }
    }
}

impl<B: GpuBackend> Drop for MaterialSession<'_, B> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(object = %self.object.name, "material session dropped without end");
            self.finish();
        }
    }
}
