//! Scene data for the gpu-draw layer
//!
//! Plain data describing what the draw layer binds: images and their pixel
//! buffers, materials, objects, lights and texface polygons. Nothing here owns
//! GPU resources; the draw layer keys its caches by the ids defined here.

pub mod font;
pub mod image;
pub mod light;
pub mod material;
pub mod object;
pub mod smoke;
pub mod texpoly;

pub use font::{BitmapFont, Glyph};
pub use image::{
    CompressedFormat, CompressedImage, Image, ImageBuffer, ImageFlags, ImageId, ImageLibrary,
    ImageSource, ImageUser, TileAnimation,
};
pub use light::{Light, LightKind, SceneLayer};
pub use material::{Material, MaterialBlend};
pub use object::{DupliObject, Object, ObjectId};
pub use smoke::{SmokeDomain, SmokeGrid, SmokeId};
pub use texpoly::{TexFaceMode, TexPoly};
