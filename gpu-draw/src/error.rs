//! Error types for the draw layer

use std::path::PathBuf;

use gpu_scene::ImageId;

use crate::backend::{TexelFormat, TextureId};

/// Failure reported by a graphics backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("out of texture memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("texel format {0:?} is not supported by this backend")]
    UnsupportedFormat(TexelFormat),

    #[error("texture {0:?} does not exist")]
    InvalidTexture(TextureId),

    #[error("upload of {got} bytes does not match the {expected} bytes of the region")]
    UploadSize { expected: usize, got: usize },

    #[error("upload at {offset:?} of {extent:?} does not fit level {level} of {size:?}")]
    UploadOutOfBounds {
        level: u32,
        offset: [u32; 3],
        extent: [u32; 3],
        size: [u32; 3],
    },
}

/// Errors surfaced by the draw layer
///
/// Texture failures are never fatal to a draw: sessions log them and fall
/// back to untextured drawing. They are still returned from the cache so
/// callers can report them.
#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    #[error("image {0:?} has no pixel buffer for the requested frame")]
    NoImageBuffer(ImageId),

    #[error("image {0:?} is not in the image library")]
    UnknownImage(ImageId),

    #[error("image {image:?} has an unsupported pixel layout: {reason}")]
    UnsupportedFormat { image: ImageId, reason: &'static str },

    #[error("invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("pixel buffer has {got} values, expected {expected}")]
    PixelSizeMismatch { expected: usize, got: usize },

    #[error("material {index} is still bound when ending the object")]
    MaterialStillBound { index: usize },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T, E = DrawError> = std::result::Result<T, E>;
