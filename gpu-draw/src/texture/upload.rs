//! Host-side pixel preparation and texture creation
//!
//! Image buffers are decoded into linear RGBA `f32` working pixels, cut to a
//! tile or cube face, resized to what the backend accepts, and encoded to the
//! upload format. Mip chains are either generated by the device or built here
//! with a 2x2 box filter.

use gpu_scene::{CompressedFormat, CompressedImage, Image, ImageBuffer, ImageFlags, ImageId};
use half::f16;

use super::TextureSettings;
use crate::backend::{
    Filter, GpuBackend, MinFilter, Sampling, TexelData, TexelFormat, TextureDesc, TextureId,
    TextureTarget, TextureUpload, Wrap,
};
use crate::error::{DrawError, Result};

/// Number of cube faces in a 3x2 cube map layout
const CUBE_FACES: u32 = 6;

/// How working pixels turn into uploaded texels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Encoding {
    /// Display-referred bytes, copied through
    Rgba8,
    /// Scene-linear floats, sRGB-encoded into bytes
    Rgba8FromLinear,
    Rgba16F,
}

impl Encoding {
    pub(crate) fn format(self) -> TexelFormat {
        match self {
            Encoding::Rgba8 | Encoding::Rgba8FromLinear => TexelFormat::Rgba8,
            Encoding::Rgba16F => TexelFormat::Rgba16F,
        }
    }
}

pub(crate) enum Encoded {
    Rgba8(Vec<u8>),
    Rgba16F(Vec<f16>),
}

impl Encoded {
    pub(crate) fn data(&self) -> TexelData<'_> {
        match self {
            Encoded::Rgba8(bytes) => TexelData::Rgba8(bytes),
            Encoded::Rgba16F(halves) => TexelData::Rgba16F(halves),
        }
    }
}

/// RGBA working pixels, bottom row first
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<f32>,
}

fn texel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub(crate) fn linear_to_srgb(value: f32) -> f32 {
    if value <= 0.003_130_8 {
        value.max(0.0) * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

pub(crate) fn is_power_of_two(value: u32) -> bool {
    value.is_power_of_two()
}

/// Largest power of two not above `value` (1 for 0)
pub(crate) fn smaller_power_of_two(value: u32) -> u32 {
    if value <= 1 {
        1
    } else {
        1 << (31 - value.leading_zeros())
    }
}

/// Levels in a full mip chain down to 1x1
pub(crate) fn mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

impl Pixels {
    pub(crate) fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        let expected = texel_count(width, height);
        if bytes.len() != expected {
            return Err(DrawError::PixelSizeMismatch {
                expected,
                got: bytes.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba: bytes.iter().map(|&b| f32::from(b) / 255.0).collect(),
        })
    }

    pub(crate) fn from_f32(width: u32, height: u32, floats: &[f32]) -> Result<Self> {
        let expected = texel_count(width, height);
        if floats.len() != expected {
            return Err(DrawError::PixelSizeMismatch {
                expected,
                got: floats.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba: floats.to_vec(),
        })
    }

    fn texel(&self, x: u32, y: u32) -> &[f32] {
        let start = (y as usize * self.width as usize + x as usize) * 4;
        &self.rgba[start..start + 4]
    }

    /// Copy of a sub-rectangle, clipped to the pixels
    pub(crate) fn region(&self, x: u32, y: u32, width: u32, height: u32) -> Pixels {
        let x = x.min(self.width);
        let y = y.min(self.height);
        let width = width.min(self.width - x);
        let height = height.min(self.height - y);
        let mut rgba = Vec::with_capacity(texel_count(width, height));
        for row in y..y + height {
            for col in x..x + width {
                rgba.extend_from_slice(self.texel(col, row));
            }
        }
        Pixels {
            width,
            height,
            rgba,
        }
    }

    /// Area-averaged resample, used for downscaling
    pub(crate) fn resized(&self, width: u32, height: u32) -> Pixels {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let span = |dst: u32, dst_len: u32, src_len: u32| {
            let start = (u64::from(dst) * u64::from(src_len) / u64::from(dst_len)) as u32;
            let end = (u64::from(dst + 1) * u64::from(src_len) / u64::from(dst_len)) as u32;
            (start.min(src_len - 1), end.clamp(start + 1, src_len.max(start + 1)))
        };

        let mut rgba = Vec::with_capacity(texel_count(width, height));
        for dy in 0..height {
            let (y0, y1) = span(dy, height, self.height);
            for dx in 0..width {
                let (x0, x1) = span(dx, width, self.width);
                let mut sum = [0.0f32; 4];
                let mut count = 0.0f32;
                for y in y0..y1.min(self.height) {
                    for x in x0..x1.min(self.width) {
                        for (acc, value) in sum.iter_mut().zip(self.texel(x, y)) {
                            *acc += value;
                        }
                        count += 1.0;
                    }
                }
                rgba.extend(sum.iter().map(|v| v / count.max(1.0)));
            }
        }
        Pixels {
            width,
            height,
            rgba,
        }
    }

    /// Next level of a box-filtered mip chain
    pub(crate) fn half(&self) -> Pixels {
        self.resized((self.width / 2).max(1), (self.height / 2).max(1))
    }

    pub(crate) fn encode(&self, encoding: Encoding) -> Encoded {
        match encoding {
            Encoding::Rgba8 => Encoded::Rgba8(self.rgba.iter().copied().map(to_byte).collect()),
            Encoding::Rgba8FromLinear => Encoded::Rgba8(
                self.rgba
                    .chunks_exact(4)
                    .flat_map(|px| {
                        [
                            to_byte(linear_to_srgb(px[0])),
                            to_byte(linear_to_srgb(px[1])),
                            to_byte(linear_to_srgb(px[2])),
                            to_byte(px[3]),
                        ]
                    })
                    .collect(),
            ),
            Encoding::Rgba16F => {
                Encoded::Rgba16F(self.rgba.iter().copied().map(f16::from_f32).collect())
            }
        }
    }
}

/// Pick the pixel source of a buffer and how it will be encoded
pub(crate) fn decode(
    image: ImageId,
    buffer: &ImageBuffer,
    is_data: bool,
    high_bit_depth: bool,
) -> Result<(Pixels, Encoding)> {
    let (width, height) = (buffer.width, buffer.height);
    if width == 0 || height == 0 {
        return Err(DrawError::InvalidDimensions { width, height });
    }
    match (&buffer.rect, &buffer.rect_float) {
        (_, Some(floats)) if high_bit_depth || is_data => {
            Ok((Pixels::from_f32(width, height, floats)?, Encoding::Rgba16F))
        }
        (Some(bytes), _) => Ok((Pixels::from_rgba8(width, height, bytes)?, Encoding::Rgba8)),
        (None, Some(floats)) => Ok((
            Pixels::from_f32(width, height, floats)?,
            Encoding::Rgba8FromLinear,
        )),
        (None, None) => Err(DrawError::UnsupportedFormat {
            image,
            reason: "only block-compressed pixels and no decoded copy",
        }),
    }
}

/// Texture size the backend accepts for an image of `width` x `height`
pub(crate) fn fit_size<B: GpuBackend + ?Sized>(
    backend: &B,
    settings: &TextureSettings,
    width: u32,
    height: u32,
) -> (u32, u32) {
    let limits = backend.limits();
    let limit = match settings.max_size {
        0 => limits.max_texture_size,
        max => max.min(limits.max_texture_size),
    }
    .max(1);

    let (mut width, mut height) = (width, height);
    if !limits.npot_textures {
        width = smaller_power_of_two(width);
        height = smaller_power_of_two(height);
    }
    (width.min(limit), height.min(limit))
}

/// Sampler state for an image texture
pub(crate) fn sampling(settings: &TextureSettings, mipmapped: bool, flags: ImageFlags) -> Sampling {
    let min = if mipmapped && !settings.texpaint {
        if settings.linear_mipmap {
            MinFilter::LinearMipmapLinear
        } else {
            MinFilter::LinearMipmapNearest
        }
    } else {
        MinFilter::Linear
    };
    let wrap = |clamp: bool| if clamp { Wrap::ClampToEdge } else { Wrap::Repeat };
    Sampling {
        min,
        mag: Filter::Linear,
        anisotropy: settings.anisotropic,
        wrap_u: wrap(flags.contains(ImageFlags::CLAMP_U)),
        wrap_v: wrap(flags.contains(ImageFlags::CLAMP_V)),
        max_level: None,
    }
}

/// What was created for a cache entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Uploaded {
    pub texture: TextureId,
    pub format: TexelFormat,
    pub encoding: Option<Encoding>,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub bytes: usize,
}

/// Parameters of one texture creation
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct UploadRequest {
    pub target: TextureTarget,
    pub tile: u32,
    pub mipmap: bool,
    pub is_data: bool,
}

/// Create a texture for one frame (and tile) of an image
pub(crate) fn create_image_texture<B: GpuBackend + ?Sized>(
    backend: &mut B,
    settings: &TextureSettings,
    image: &Image,
    buffer: &ImageBuffer,
    request: &UploadRequest,
) -> Result<Uploaded> {
    if buffer.is_empty() {
        return Err(DrawError::NoImageBuffer(image.id()));
    }

    let tiled = image.flags().contains(ImageFlags::TILES) && image.tile_count() > 1;
    if request.target == TextureTarget::Texture2D && !tiled {
        if let Some(compressed) = &buffer.compressed {
            match create_compressed(backend, settings, image, buffer, compressed, request.mipmap)
            {
                Ok(uploaded) => return Ok(uploaded),
                Err(e) => {
                    tracing::debug!(image = image.name(), "dxt upload skipped: {e}");
                }
            }
        }
    }

    let (mut pixels, encoding) =
        decode(image.id(), buffer, request.is_data, settings.high_bit_depth)?;

    if tiled {
        let (xrep, yrep) = image.tiles();
        let tile = request.tile.min(image.tile_count() - 1);
        let tile_w = pixels.width / xrep;
        let tile_h = pixels.height / yrep;
        if tile_w == 0 || tile_h == 0 {
            return Err(DrawError::InvalidDimensions {
                width: tile_w,
                height: tile_h,
            });
        }
        pixels = pixels.region((tile % xrep) * tile_w, (tile / xrep) * tile_h, tile_w, tile_h);
    }

    match request.target {
        TextureTarget::Texture2D => {
            create_2d(backend, settings, image, pixels, encoding, request.mipmap)
        }
        TextureTarget::CubeMap => {
            create_cube(backend, settings, image, pixels, encoding, request.mipmap)
        }
        TextureTarget::Texture3D => Err(DrawError::UnsupportedFormat {
            image: image.id(),
            reason: "3D textures are only built from smoke domains",
        }),
    }
}

/// Upload `levels` mip levels starting from `base`
fn upload_levels<B: GpuBackend + ?Sized>(
    backend: &mut B,
    texture: TextureId,
    layer: u32,
    base: &Pixels,
    encoding: Encoding,
    levels: u32,
    gpu_mipmap: bool,
) -> Result<()> {
    let encoded = base.encode(encoding);
    backend.upload_texture(
        texture,
        &TextureUpload {
            layer,
            ..TextureUpload::level_2d(0, base.width, base.height, encoded.data())
        },
    )?;
    if levels <= 1 || gpu_mipmap {
        return Ok(());
    }

    let mut level_pixels = base.half();
    for level in 1..levels {
        let encoded = level_pixels.encode(encoding);
        backend.upload_texture(
            texture,
            &TextureUpload {
                layer,
                ..TextureUpload::level_2d(
                    level,
                    level_pixels.width,
                    level_pixels.height,
                    encoded.data(),
                )
            },
        )?;
        level_pixels = level_pixels.half();
    }
    Ok(())
}

fn level_bytes(width: u32, height: u32, format: TexelFormat, levels: u32) -> usize {
    let base = width as usize * height as usize * format.texel_size().unwrap_or(1);
    if levels > 1 { base + base / 3 } else { base }
}

fn create_2d<B: GpuBackend + ?Sized>(
    backend: &mut B,
    settings: &TextureSettings,
    image: &Image,
    pixels: Pixels,
    encoding: Encoding,
    mipmap: bool,
) -> Result<Uploaded> {
    let (width, height) = fit_size(backend, settings, pixels.width, pixels.height);
    let pixels = if (width, height) != (pixels.width, pixels.height) {
        tracing::debug!(
            image = image.name(),
            "scaling {}x{} to {}x{}",
            pixels.width,
            pixels.height,
            width,
            height
        );
        pixels.resized(width, height)
    } else {
        pixels
    };

    let levels = if mipmap { mip_count(width, height) } else { 1 };
    let format = encoding.format();
    let texture = backend.create_texture(&TextureDesc {
        label: image.name().to_string(),
        target: TextureTarget::Texture2D,
        format,
        width,
        height,
        depth: 1,
        mip_levels: levels,
    })?;

    let gpu_mipmap = settings.gpu_mipmap;
    if let Err(e) = upload_levels(backend, texture, 0, &pixels, encoding, levels, gpu_mipmap) {
        backend.delete_texture(texture);
        return Err(e);
    }
    if levels > 1 && gpu_mipmap {
        backend.generate_mipmaps(texture);
    }
    backend.set_sampling(texture, &sampling(settings, levels > 1, image.flags()));

    Ok(Uploaded {
        texture,
        format,
        encoding: Some(encoding),
        width,
        height,
        mip_levels: levels,
        bytes: level_bytes(width, height, format, levels),
    })
}

/// Cube map from a 3x2 layout: the bottom row holds +X, -X, +Y and the top
/// row -Y, +Z, -Z
fn create_cube<B: GpuBackend + ?Sized>(
    backend: &mut B,
    settings: &TextureSettings,
    image: &Image,
    pixels: Pixels,
    encoding: Encoding,
    mipmap: bool,
) -> Result<Uploaded> {
    let face = pixels.width / 3;
    let valid_layout = face > 0 && pixels.width == face * 3 && pixels.height == face * 2;
    let npot_ok = backend.limits().npot_textures || is_power_of_two(face);
    if !valid_layout || !npot_ok || face > backend.limits().max_texture_size {
        tracing::warn!(
            image = image.name(),
            "cube map layout must be 3x2 square faces, got {}x{}",
            pixels.width,
            pixels.height
        );
        return Err(DrawError::InvalidDimensions {
            width: pixels.width,
            height: pixels.height,
        });
    }

    let levels = if mipmap { mip_count(face, face) } else { 1 };
    let format = encoding.format();
    let texture = backend.create_texture(&TextureDesc {
        label: image.name().to_string(),
        target: TextureTarget::CubeMap,
        format,
        width: face,
        height: face,
        depth: 1,
        mip_levels: levels,
    })?;

    for layer in 0..CUBE_FACES {
        let region = pixels.region((layer % 3) * face, (layer / 3) * face, face, face);
        let result = upload_levels(
            backend,
            texture,
            layer,
            &region,
            encoding,
            levels,
            settings.gpu_mipmap,
        );
        if let Err(e) = result {
            backend.delete_texture(texture);
            return Err(e);
        }
    }
    if levels > 1 && settings.gpu_mipmap {
        backend.generate_mipmaps(texture);
    }
    let mut cube_sampling = sampling(settings, levels > 1, image.flags());
    cube_sampling.wrap_u = Wrap::ClampToEdge;
    cube_sampling.wrap_v = Wrap::ClampToEdge;
    backend.set_sampling(texture, &cube_sampling);

    Ok(Uploaded {
        texture,
        format,
        encoding: Some(encoding),
        width: face,
        height: face,
        mip_levels: levels,
        bytes: level_bytes(face, face, format, levels) * CUBE_FACES as usize,
    })
}

fn compressed_format(format: CompressedFormat) -> TexelFormat {
    match format {
        CompressedFormat::Dxt1 => TexelFormat::Dxt1,
        CompressedFormat::Dxt3 => TexelFormat::Dxt3,
        CompressedFormat::Dxt5 => TexelFormat::Dxt5,
    }
}

/// Bytes of one DXT level
pub(crate) fn dxt_level_size(width: u32, height: u32, format: CompressedFormat) -> usize {
    width.div_ceil(4) as usize * height.div_ceil(4) as usize * format.block_size()
}

/// Upload the DXT blocks of a buffer as they are
fn create_compressed<B: GpuBackend + ?Sized>(
    backend: &mut B,
    settings: &TextureSettings,
    image: &Image,
    buffer: &ImageBuffer,
    compressed: &CompressedImage,
    mipmap: bool,
) -> Result<Uploaded> {
    let format = compressed_format(compressed.format);
    if !backend.limits().s3tc {
        return Err(DrawError::Backend(
            crate::error::BackendError::UnsupportedFormat(format),
        ));
    }
    let (width, height) = (buffer.width, buffer.height);
    if !is_power_of_two(width) || !is_power_of_two(height) {
        return Err(DrawError::InvalidDimensions { width, height });
    }

    let levels = if mipmap { compressed.mip_count.max(1) } else { 1 };
    let texture = backend.create_texture(&TextureDesc {
        label: image.name().to_string(),
        target: TextureTarget::Texture2D,
        format,
        width,
        height,
        depth: 1,
        mip_levels: levels,
    })?;

    let (mut level_w, mut level_h) = (width, height);
    let mut offset = 0;
    for level in 0..levels {
        let size = dxt_level_size(level_w, level_h, compressed.format);
        let Some(blocks) = compressed.data.get(offset..offset + size) else {
            backend.delete_texture(texture);
            return Err(DrawError::PixelSizeMismatch {
                expected: offset + size,
                got: compressed.data.len(),
            });
        };
        let upload =
            TextureUpload::level_2d(level, level_w, level_h, TexelData::Compressed(blocks));
        if let Err(e) = backend.upload_texture(texture, &upload) {
            backend.delete_texture(texture);
            return Err(e.into());
        }
        offset += size;
        level_w = (level_w / 2).max(1);
        level_h = (level_h / 2).max(1);
    }

    let mut dxt_sampling = sampling(settings, levels > 1, image.flags());
    dxt_sampling.max_level = Some(levels - 1);
    backend.set_sampling(texture, &dxt_sampling);

    Ok(Uploaded {
        texture,
        format,
        encoding: None,
        width,
        height,
        mip_levels: levels,
        bytes: offset,
    })
}

/// Re-upload a painted rectangle of level 0
pub(crate) fn upload_region<B: GpuBackend + ?Sized>(
    backend: &mut B,
    texture: TextureId,
    pixels: &Pixels,
    encoding: Encoding,
    x: u32,
    y: u32,
) -> Result<()> {
    let encoded = pixels.encode(encoding);
    backend.upload_texture(
        texture,
        &TextureUpload {
            level: 0,
            layer: 0,
            offset: [x, y, 0],
            extent: [pixels.width, pixels.height, 1],
            data: encoded.data(),
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Pixels {
        let rgba = (0..width * height)
            .flat_map(|i| {
                let v = i as f32 / (width * height) as f32;
                [v, v, v, 1.0]
            })
            .collect();
        Pixels {
            width,
            height,
            rgba,
        }
    }

    #[test]
    fn test_power_of_two_helpers() {
        assert_eq!(smaller_power_of_two(0), 1);
        assert_eq!(smaller_power_of_two(100), 64);
        assert_eq!(smaller_power_of_two(256), 256);
        assert_eq!(mip_count(1, 1), 1);
        assert_eq!(mip_count(256, 64), 9);
        assert_eq!(mip_count(5, 3), 3);
    }

    #[test]
    fn test_half_box_filter() {
        let pixels = Pixels {
            width: 2,
            height: 2,
            rgba: vec![
                0.0, 0.0, 0.0, 1.0, //
                1.0, 1.0, 1.0, 1.0, //
                1.0, 0.0, 0.0, 1.0, //
                0.0, 1.0, 0.0, 1.0,
            ],
        };
        let half = pixels.half();
        assert_eq!((half.width, half.height), (1, 1));
        assert_eq!(half.rgba, vec![0.5, 0.5, 0.25, 1.0]);
    }

    #[test]
    fn test_half_of_odd_and_thin_sizes() {
        let thin = gradient(8, 1).half();
        assert_eq!((thin.width, thin.height), (4, 1));
        let odd = gradient(5, 3).half();
        assert_eq!((odd.width, odd.height), (2, 1));
        assert_eq!(odd.rgba.len(), 2 * 4);
    }

    #[test]
    fn test_region_clips() {
        let pixels = gradient(4, 4);
        let region = pixels.region(2, 3, 10, 10);
        assert_eq!((region.width, region.height), (2, 1));
        assert_eq!(region.rgba[..4], pixels.rgba[(3 * 4 + 2) * 4..(3 * 4 + 2) * 4 + 4]);
    }

    #[test]
    fn test_srgb_encoding() {
        assert_eq!(linear_to_srgb(0.0), 0.0);
        assert!((linear_to_srgb(1.0) - 1.0).abs() < 1e-5);
        // Mid grey lands near 188 once encoded
        let pixels = Pixels {
            width: 1,
            height: 1,
            rgba: vec![0.5, 0.5, 0.5, 0.5],
        };
        let Encoded::Rgba8(bytes) = pixels.encode(Encoding::Rgba8FromLinear) else {
            panic!("expected bytes");
        };
        assert_eq!(bytes, vec![188, 188, 188, 128]);
    }

    #[test]
    fn test_byte_round_trip_is_exact() {
        let bytes: Vec<u8> = (0..=255).collect();
        let pixels = Pixels::from_rgba8(8, 8, &bytes).unwrap();
        let Encoded::Rgba8(out) = pixels.encode(Encoding::Rgba8) else {
            panic!("expected bytes");
        };
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_decode_prefers_bytes_unless_float_requested() {
        let buffer = ImageBuffer {
            width: 1,
            height: 1,
            rect: Some(vec![10, 20, 30, 255]),
            rect_float: Some(vec![0.1, 0.2, 0.3, 1.0]),
            ..Default::default()
        };
        let id = ImageId(1);
        assert_eq!(decode(id, &buffer, false, false).unwrap().1, Encoding::Rgba8);
        assert_eq!(decode(id, &buffer, false, true).unwrap().1, Encoding::Rgba16F);
        assert_eq!(decode(id, &buffer, true, false).unwrap().1, Encoding::Rgba16F);

        let float_only = ImageBuffer::from_rgba_f32(1, 1, vec![0.1, 0.2, 0.3, 1.0]);
        assert_eq!(
            decode(id, &float_only, false, false).unwrap().1,
            Encoding::Rgba8FromLinear
        );
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let buffer = ImageBuffer::from_rgba8(2, 2, vec![0; 12]);
        assert!(matches!(
            decode(ImageId(1), &buffer, false, false),
            Err(DrawError::PixelSizeMismatch {
                expected: 16,
                got: 12
            })
        ));
    }

    #[test]
    fn test_dxt_level_sizes() {
        assert_eq!(dxt_level_size(4, 4, CompressedFormat::Dxt1), 8);
        assert_eq!(dxt_level_size(8, 8, CompressedFormat::Dxt5), 64);
        assert_eq!(dxt_level_size(1, 1, CompressedFormat::Dxt3), 16);
    }
}
