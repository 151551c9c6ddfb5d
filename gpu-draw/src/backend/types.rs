//! Value types shared by the backend trait and its callers

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use half::f16;

/// Number of fixed-function light slots tracked in state snapshots
pub const MAX_LIGHTS: usize = 8;

/// Number of user clip planes tracked in state snapshots
pub const MAX_CLIP_PLANES: usize = 6;

/// Handle to a backend texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u32);

/// Pipeline capabilities that can be toggled on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    CullFace,
    DepthTest,
    Dither,
    Lighting,
    LineSmooth,
    ColorLogicOp,
    Multisample,
    PolygonOffsetLine,
    PolygonOffsetFill,
    PolygonSmooth,
    SampleAlphaToCoverage,
    ScissorTest,
    StencilTest,
    AlphaTest,
    Normalize,
    Fog,
    ColorMaterial,
    Texture2D,
    /// Shaders write their own point size
    ProgramPointSize,
    /// Fixed-function light slot, `0..MAX_LIGHTS`
    Light(u8),
    /// User clip plane, `0..MAX_CLIP_PLANES`
    ClipPlane(u8),
}

/// Depth and alpha comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
}

/// Blend factors for color and alpha channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// Same factors for color and alpha
    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }

    pub const fn separate(
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        Self {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        }
    }

    /// Framebuffer default: replace
    pub const REPLACE: BlendFunc = BlendFunc::new(BlendFactor::One, BlendFactor::Zero);
    pub const ALPHA: BlendFunc = BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
    pub const ADD: BlendFunc = BlendFunc::new(BlendFactor::One, BlendFactor::One);
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self::REPLACE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Face {
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Winding {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Integer window-space rectangle (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// What the backend can do
#[derive(Debug, Clone, PartialEq)]
pub struct BackendLimits {
    pub max_lights: usize,
    pub max_texture_size: u32,
    pub max_anisotropy: f32,
    /// Non-power-of-two textures work with mipmaps and repeat
    pub npot_textures: bool,
    /// DXT1/3/5 block uploads
    pub s3tc: bool,
    /// Mip chains can be generated on the device
    pub gpu_mipmap: bool,
    /// Programmable material shaders are available
    pub glsl: bool,
    /// Framebuffer bits per pixel, used by selection encoding
    pub color_depth: u8,
}

impl Default for BackendLimits {
    fn default() -> Self {
        Self {
            max_lights: MAX_LIGHTS,
            max_texture_size: 16384,
            max_anisotropy: 16.0,
            npot_textures: true,
            s3tc: true,
            gpu_mipmap: true,
            glsl: true,
            color_depth: 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
    Texture3D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    Rgba8,
    Rgba16F,
    R8,
    Dxt1,
    Dxt3,
    Dxt5,
}

impl TexelFormat {
    /// Bytes per texel for uncompressed formats, `None` for block formats
    pub fn texel_size(self) -> Option<usize> {
        match self {
            TexelFormat::Rgba8 => Some(4),
            TexelFormat::Rgba16F => Some(8),
            TexelFormat::R8 => Some(1),
            TexelFormat::Dxt1 | TexelFormat::Dxt3 | TexelFormat::Dxt5 => None,
        }
    }

    pub fn is_compressed(self) -> bool {
        self.texel_size().is_none()
    }
}

/// Texture creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub target: TextureTarget,
    pub format: TexelFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
}

/// Texel payload of one upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TexelData<'a> {
    Rgba8(&'a [u8]),
    Rgba16F(&'a [f16]),
    R8(&'a [u8]),
    Compressed(&'a [u8]),
}

impl TexelData<'_> {
    pub fn byte_len(&self) -> usize {
        match self {
            TexelData::Rgba8(data) | TexelData::R8(data) | TexelData::Compressed(data) => {
                data.len()
            }
            TexelData::Rgba16F(data) => bytemuck::cast_slice::<f16, u8>(data).len(),
        }
    }
}

/// Write of a box of texels into one mip level (and cube face / layer)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureUpload<'a> {
    pub level: u32,
    /// Cube face index for cube maps, 0 otherwise
    pub layer: u32,
    pub offset: [u32; 3],
    pub extent: [u32; 3],
    pub data: TexelData<'a>,
}

impl<'a> TextureUpload<'a> {
    /// Whole 2D level starting at the origin
    pub fn level_2d(level: u32, width: u32, height: u32, data: TexelData<'a>) -> Self {
        Self {
            level,
            layer: 0,
            offset: [0, 0, 0],
            extent: [width, height, 1],
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MinFilter {
    Nearest,
    #[default]
    Linear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    #[default]
    Repeat,
    ClampToEdge,
}

/// Sampler state stored on a texture
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sampling {
    pub min: MinFilter,
    pub mag: Filter,
    pub anisotropy: f32,
    pub wrap_u: Wrap,
    pub wrap_v: Wrap,
    /// Highest mip level present, `None` for the full chain
    pub max_level: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightType {
    #[default]
    Sun,
    Point,
    Spot,
}

/// Fixed-function light, already in view space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightParams {
    pub kind: LightType,
    pub position: Vec3,
    pub direction: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
    /// Degrees
    pub spot_cutoff: f32,
    pub spot_exponent: f32,
}

/// Surface colors handed to the fixed-function material or the shader uniforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    /// RGB times intensity, alpha in `w`
    pub diffuse: [f32; 4],
    pub specular: [f32; 3],
    pub hardness: u32,
    pub shadeless: bool,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            diffuse: [0.8, 0.8, 0.8, 1.0],
            specular: [0.5, 0.5, 0.5],
            hardness: 35,
            shadeless: false,
        }
    }
}

/// Which shader the backend builds for a material bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Material,
    Matcap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    Quads,
}

/// Where texture coordinates of a draw go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UvTarget {
    #[default]
    TexCoord,
    Attribute(u32),
}

/// Position, texture coordinate and color of one vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: [u8; 4],
}
