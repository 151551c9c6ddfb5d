//! Materials

use crate::image::ImageId;

/// How a material composites with what is already drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum MaterialBlend {
    #[default]
    Opaque,
    Add,
    AlphaBlend,
    AlphaClip,
    AlphaSort,
    AlphaToCoverage,
}

/// Surface description used by both the shader and fixed-function paths
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: [f32; 3],
    pub diffuse_intensity: f32,
    pub specular: [f32; 3],
    pub specular_intensity: f32,
    pub hardness: u32,
    pub alpha: f32,
    pub blend: MaterialBlend,
    /// Take the diffuse color from the object (or dupli override)
    pub use_object_color: bool,
    pub shadeless: bool,
    pub texture: Option<ImageId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "Material".to_string(),
            diffuse: [0.8, 0.8, 0.8],
            diffuse_intensity: 0.8,
            specular: [1.0, 1.0, 1.0],
            specular_intensity: 0.5,
            hardness: 50,
            alpha: 1.0,
            blend: MaterialBlend::Opaque,
            use_object_color: false,
            shadeless: false,
            texture: None,
        }
    }
}

impl Material {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_blend(mut self, blend: MaterialBlend, alpha: f32) -> Self {
        self.blend = blend;
        self.alpha = alpha;
        self
    }

    pub fn with_texture(mut self, image: ImageId) -> Self {
        self.texture = Some(image);
        self
    }

    /// Blends with the framebuffer (as opposed to opaque or clipped)
    pub fn is_blended(&self) -> bool {
        matches!(
            self.blend,
            MaterialBlend::Add
                | MaterialBlend::AlphaBlend
                | MaterialBlend::AlphaSort
                | MaterialBlend::AlphaToCoverage
        )
    }
}
