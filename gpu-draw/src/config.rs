//! Draw layer configuration (`gpu-draw.toml`)
//!
//! User preferences that shape texture uploads, alpha handling, lighting and
//! picking. Stored as TOML in the platform config directory; every section
//! and key is optional and falls back to its default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DrawError, Result};

const CONFIG_FILE: &str = "gpu-draw.toml";

/// Draw layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawConfig {
    #[serde(default)]
    pub textures: TextureConfig,
    #[serde(default)]
    pub shading: ShadingConfig,
    #[serde(default)]
    pub select: SelectConfig,
    /// Lights used when the scene's own lights are not drawn
    #[serde(default = "default_solid_lights")]
    pub lights: Vec<SolidLight>,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            textures: TextureConfig::default(),
            shading: ShadingConfig::default(),
            select: SelectConfig::default(),
            lights: default_solid_lights(),
        }
    }
}

/// Texture upload and cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureConfig {
    /// Build mip chains for image textures (default: true)
    #[serde(default = "default_true")]
    pub mipmap: bool,
    /// Blend between mip levels instead of picking the nearest (default: true)
    #[serde(default = "default_true")]
    pub linear_mipmap: bool,
    /// Anisotropic filtering level, clamped to the backend maximum (default: 2)
    #[serde(default = "default_anisotropic")]
    pub anisotropic: f32,
    /// Let the device build mip chains when it can (default: true)
    #[serde(default = "default_true")]
    pub gpu_mipmap: bool,
    /// Upload float images as half floats instead of 8-bit (default: false)
    #[serde(default)]
    pub high_bit_depth: bool,
    /// Largest texture edge, 0 for the backend maximum (default: 0)
    #[serde(default)]
    pub max_size: u32,
    /// Seconds a texture may go unused before it is collected, 0 disables
    /// collection (default: 120)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Seconds between collection sweeps (default: 60)
    #[serde(default = "default_collect_rate")]
    pub collect_rate_secs: u64,
}

/// Material shading settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadingConfig {
    /// Alpha test threshold for alpha-blended materials (default: 0.004)
    #[serde(default = "default_alpha_clip")]
    pub alpha_clip: f32,
    /// Upper bound on scene lights, on top of the backend limit (default: 8)
    #[serde(default = "default_max_lights")]
    pub max_lights: usize,
}

/// Picking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SelectConfig {
    /// Framebuffer bits per pixel to encode for, 0 asks the backend (default: 0)
    #[serde(default)]
    pub color_depth: u8,
}

/// One solid-mode light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidLight {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Direction towards the light in view space
    pub direction: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
}

fn default_true() -> bool {
    true
}
fn default_anisotropic() -> f32 {
    2.0
}
fn default_timeout() -> u64 {
    120
}
fn default_collect_rate() -> u64 {
    60
}
fn default_alpha_clip() -> f32 {
    0.004
}
fn default_max_lights() -> usize {
    8
}

fn default_solid_lights() -> Vec<SolidLight> {
    vec![
        SolidLight {
            enabled: true,
            direction: [-0.3, 0.3, 0.9],
            diffuse: [0.8, 0.8, 0.8],
            specular: [0.5, 0.5, 0.5],
        },
        SolidLight {
            enabled: true,
            direction: [0.5, 0.5, 0.1],
            diffuse: [0.4, 0.4, 0.4],
            specular: [0.3, 0.3, 0.3],
        },
        SolidLight {
            enabled: false,
            direction: [0.3, -0.3, -0.2],
            diffuse: [0.8, 0.5, 0.4],
            specular: [0.5, 0.5, 0.5],
        },
    ]
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            mipmap: true,
            linear_mipmap: true,
            anisotropic: default_anisotropic(),
            gpu_mipmap: true,
            high_bit_depth: false,
            max_size: 0,
            timeout_secs: default_timeout(),
            collect_rate_secs: default_collect_rate(),
        }
    }
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            alpha_clip: default_alpha_clip(),
            max_lights: default_max_lights(),
        }
    }
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "gpu-draw", "gpu-draw")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from the platform config directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> DrawConfig {
    let Some(path) = config_dir().map(|dir| dir.join(CONFIG_FILE)) else {
        return DrawConfig::default();
    };
    if !path.exists() {
        return DrawConfig::default();
    }
    match load_from_path(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("{e}, using defaults");
            DrawConfig::default()
        }
    }
}

/// Loads the configuration from an explicit path, reporting every failure.
pub fn load_from_path(path: &Path) -> Result<DrawConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| DrawError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| DrawError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Saves the configuration to the platform config directory.
pub fn save(config: &DrawConfig) -> Result<()> {
    if let Some(dir) = config_dir() {
        save_to_path(config, &dir.join(CONFIG_FILE))?;
    }
    Ok(())
}

/// Saves the configuration to `path`, creating parent directories.
pub fn save_to_path(config: &DrawConfig, path: &Path) -> Result<()> {
    let io_err = |source| DrawError::ConfigIo {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = DrawConfig::default();
        assert!(config.textures.mipmap);
        assert!(config.textures.gpu_mipmap);
        assert_eq!(config.textures.timeout_secs, 120);
        assert_eq!(config.shading.alpha_clip, 0.004);
        assert_eq!(config.shading.max_lights, 8);
        assert_eq!(config.lights.len(), 3);
        assert!(!config.lights[2].enabled);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = DrawConfig::default();
        config.textures.anisotropic = 8.0;
        config.select.color_depth = 16;
        config.lights.truncate(1);

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: DrawConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_config_partial_toml() {
        let toml_str = r#"
[textures]
mipmap = false
timeout_secs = 5
"#;
        let config: DrawConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.textures.mipmap);
        assert_eq!(config.textures.timeout_secs, 5);
        assert_eq!(config.textures.collect_rate_secs, 60);
        assert_eq!(config.shading, ShadingConfig::default());
        assert_eq!(config.lights, default_solid_lights());
    }

    #[test]
    fn test_config_empty_toml() {
        let config: DrawConfig = toml::from_str("").unwrap();
        assert_eq!(config, DrawConfig::default());
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = DrawConfig::default();
        config.shading.alpha_clip = 0.5;
        save_to_path(&config, &path).unwrap();

        assert_eq!(load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_load_from_path_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_from_path(&missing),
            Err(DrawError::ConfigIo { .. })
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[textures\nmipmap = ").unwrap();
        assert!(matches!(
            load_from_path(&broken),
            Err(DrawError::ConfigParse { .. })
        ));
    }
}
