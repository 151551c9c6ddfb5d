//! 3D textures for smoke domains

use gpu_scene::{SmokeDomain, SmokeGrid};

use crate::backend::{
    Filter, GpuBackend, MinFilter, Sampling, TexelData, TexelFormat, TextureDesc, TextureId,
    TextureTarget, TextureUpload, Wrap,
};
use crate::error::{DrawError, Result};

/// Volume textures of one smoke domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmokeTextures {
    /// R8 density, or RGBA8 color with density in alpha
    pub density: TextureId,
    /// R8 flame intensity, present when the domain burns fuel
    pub flame: Option<TextureId>,
    /// R8 shadow, always at base resolution
    pub shadow: TextureId,
    pub resolution: [u32; 3],
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(DrawError::PixelSizeMismatch { expected, got })
    }
}

fn volume_sampling() -> Sampling {
    Sampling {
        min: MinFilter::Linear,
        mag: Filter::Linear,
        anisotropy: 1.0,
        wrap_u: Wrap::ClampToEdge,
        wrap_v: Wrap::ClampToEdge,
        max_level: None,
    }
}

/// Create and fill one volume texture
fn create_volume<B: GpuBackend + ?Sized>(
    backend: &mut B,
    label: String,
    resolution: [u32; 3],
    format: TexelFormat,
    texels: &[u8],
) -> Result<TextureId> {
    let [width, height, depth] = resolution;
    let texture = backend.create_texture(&TextureDesc {
        label,
        target: TextureTarget::Texture3D,
        format,
        width,
        height,
        depth,
        mip_levels: 1,
    })?;
    let data = match format {
        TexelFormat::R8 => TexelData::R8(texels),
        _ => TexelData::Rgba8(texels),
    };
    let upload = TextureUpload {
        level: 0,
        layer: 0,
        offset: [0, 0, 0],
        extent: resolution,
        data,
    };
    if let Err(e) = backend.upload_texture(texture, &upload) {
        backend.delete_texture(texture);
        return Err(e.into());
    }
    backend.set_sampling(texture, &volume_sampling());
    Ok(texture)
}

fn density_texels(grid: &SmokeGrid) -> Result<(TexelFormat, Vec<u8>)> {
    let cells = grid.cell_count();
    check_len(cells, grid.density.len())?;
    match &grid.color {
        Some(colors) => {
            check_len(cells, colors.len())?;
            let texels = colors
                .iter()
                .zip(&grid.density)
                .flat_map(|(rgb, &density)| {
                    [to_byte(rgb[0]), to_byte(rgb[1]), to_byte(rgb[2]), to_byte(density)]
                })
                .collect();
            Ok((TexelFormat::Rgba8, texels))
        }
        None => Ok((
            TexelFormat::R8,
            grid.density.iter().copied().map(to_byte).collect(),
        )),
    }
}

/// Build the textures of a domain, from the high resolution grid when asked
/// for and present
pub(crate) fn create<B: GpuBackend + ?Sized>(
    backend: &mut B,
    domain: &SmokeDomain,
    high_res: bool,
) -> Result<SmokeTextures> {
    let grid = match (&domain.high_res, high_res) {
        (Some(grid), true) => grid,
        _ => &domain.base,
    };
    let [x, y, z] = grid.resolution;
    if x == 0 || y == 0 || z == 0 {
        return Err(DrawError::InvalidDimensions {
            width: x,
            height: y * z,
        });
    }

    let (format, texels) = density_texels(grid)?;
    let flame_texels = match &grid.flame {
        Some(flame) => {
            check_len(grid.cell_count(), flame.len())?;
            Some(flame.iter().copied().map(to_byte).collect::<Vec<_>>())
        }
        None => None,
    };
    check_len(domain.base.cell_count(), domain.shadow.len())?;
    let shadow_texels: Vec<u8> = domain.shadow.iter().copied().map(to_byte).collect();

    let id = domain.id.0;
    let density = create_volume(
        backend,
        format!("smoke {id} density"),
        grid.resolution,
        format,
        &texels,
    )?;

    let flame = match flame_texels {
        Some(flame_texels) => {
            match create_volume(
                backend,
                format!("smoke {id} flame"),
                grid.resolution,
                TexelFormat::R8,
                &flame_texels,
            ) {
                Ok(texture) => Some(texture),
                Err(e) => {
                    backend.delete_texture(density);
                    return Err(e);
                }
            }
        }
        None => None,
    };

    let shadow = match create_volume(
        backend,
        format!("smoke {id} shadow"),
        domain.base.resolution,
        TexelFormat::R8,
        &shadow_texels,
    ) {
        Ok(texture) => texture,
        Err(e) => {
            backend.delete_texture(density);
            if let Some(flame) = flame {
                backend.delete_texture(flame);
            }
            return Err(e);
        }
    };

    tracing::debug!(smoke = id, ?format, "created smoke textures {x}x{y}x{z}");
    Ok(SmokeTextures {
        density,
        flame,
        shadow,
        resolution: grid.resolution,
    })
}

pub(crate) fn delete<B: GpuBackend + ?Sized>(backend: &mut B, textures: &SmokeTextures) {
    backend.delete_texture(textures.density);
    if let Some(flame) = textures.flame {
        backend.delete_texture(flame);
    }
    backend.delete_texture(textures.shadow);
}
