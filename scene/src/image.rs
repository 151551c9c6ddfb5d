//! Images, image buffers and the image library
//!
//! An [`Image`] owns one buffer per frame (a single buffer for stills). Buffers
//! may carry 8-bit pixels, float pixels, DXT blocks, or a combination, the way
//! a decoded file usually does (DDS files keep their decoded pixels next to
//! the blocks).

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use hashbrown::HashMap;

use crate::font::BitmapFont;

/// Generations are unique across all images, so a replacement image never
/// matches a texture cached for the image it replaced
fn next_generation() -> u64 {
    static GENERATION: AtomicU64 = AtomicU64::new(1);
    GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Stable image identity used as a cache key by the draw layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub u32);

/// Where the image frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSource {
    #[default]
    Still,
    Sequence,
    Movie,
    Generated,
}

bitflags! {
    /// Per-image texture flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct ImageFlags: u32 {
        /// Image is a grid of `xrep * yrep` tiles, faces pick one tile
        const TILES = 1 << 0;
        /// Tiles are played back as an animation
        const TILE_ANIMATION = 1 << 1;
        /// Clamp instead of repeat along U
        const CLAMP_U = 1 << 2;
        /// Clamp instead of repeat along V
        const CLAMP_V = 1 << 3;
        /// Never evicted by the stale texture collector
        const NO_COLLECT = 1 << 4;
    }
}

/// Block compression format of a DDS payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressedFormat {
    Dxt1,
    Dxt3,
    Dxt5,
}

impl CompressedFormat {
    /// Bytes per 4x4 block
    pub fn block_size(self) -> usize {
        match self {
            CompressedFormat::Dxt1 => 8,
            CompressedFormat::Dxt3 | CompressedFormat::Dxt5 => 16,
        }
    }
}

/// Block-compressed pixel data with its full mip chain packed back to back
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub format: CompressedFormat,
    pub mip_count: u32,
    pub data: Vec<u8>,
}

/// One decoded frame of an image
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major, bottom row first
    pub rect: Option<Vec<u8>>,
    /// RGBA32F in scene linear space
    pub rect_float: Option<Vec<f32>>,
    pub compressed: Option<CompressedImage>,
    /// Bitmap font metadata for text faces
    pub font: Option<BitmapFont>,
}

impl ImageBuffer {
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rect: Some(pixels),
            ..Default::default()
        }
    }

    pub fn from_rgba_f32(width: u32, height: u32, pixels: Vec<f32>) -> Self {
        Self {
            width,
            height,
            rect_float: Some(pixels),
            ..Default::default()
        }
    }

    /// Single-color RGBA8 buffer, handy for generated images
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::from_rgba8(width, height, pixels)
    }

    pub fn with_compressed(mut self, compressed: CompressedImage) -> Self {
        self.compressed = Some(compressed);
        self
    }

    pub fn with_font(mut self, font: BitmapFont) -> Self {
        self.font = Some(font);
        self
    }

    /// True when there is nothing that could be uploaded
    pub fn is_empty(&self) -> bool {
        self.width == 0
            || self.height == 0
            || (self.rect.is_none() && self.rect_float.is_none() && self.compressed.is_none())
    }
}

/// Tile animation range and speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileAnimation {
    pub start: u32,
    pub end: u32,
    /// Tiles per second
    pub speed: u32,
}

/// Per-user image parameters (which frame of a sequence to show)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ImageUser {
    pub frame: i32,
}

impl ImageUser {
    pub fn frame(frame: i32) -> Self {
        Self { frame }
    }
}

/// An image with one buffer per frame
#[derive(Debug, Clone)]
pub struct Image {
    id: ImageId,
    name: String,
    source: ImageSource,
    flags: ImageFlags,
    xrep: u32,
    yrep: u32,
    animation: TileAnimation,
    frames: Vec<ImageBuffer>,
    /// Bumped on every content change, used as the cheap freshness check
    generation: u64,
}

impl Image {
    /// Still image with a single buffer
    pub fn new(id: ImageId, name: impl Into<String>, buffer: ImageBuffer) -> Self {
        Self {
            id,
            name: name.into(),
            source: ImageSource::Still,
            flags: ImageFlags::empty(),
            xrep: 1,
            yrep: 1,
            animation: TileAnimation::default(),
            frames: vec![buffer],
            generation: next_generation(),
        }
    }

    /// Image sequence, frame N of the user maps to buffer N
    pub fn sequence(id: ImageId, name: impl Into<String>, frames: Vec<ImageBuffer>) -> Self {
        Self {
            source: ImageSource::Sequence,
            frames,
            ..Self::new(id, name, ImageBuffer::default())
        }
    }

    pub fn with_source(mut self, source: ImageSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_flags(mut self, flags: ImageFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Replace the flags in place; does not count as a content change
    pub fn set_flags(&mut self, flags: ImageFlags) {
        self.flags = flags;
    }

    /// Split the image into a grid of tiles
    pub fn with_tiles(mut self, xrep: u32, yrep: u32) -> Self {
        self.xrep = xrep.max(1);
        self.yrep = yrep.max(1);
        self.flags |= ImageFlags::TILES;
        self
    }

    /// Animate through tiles `start..=end` at `speed` tiles per second
    pub fn with_tile_animation(mut self, start: u32, end: u32, speed: u32) -> Self {
        self.animation = TileAnimation { start, end, speed };
        self.flags |= ImageFlags::TILE_ANIMATION;
        self
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> ImageSource {
        self.source
    }

    pub fn flags(&self) -> ImageFlags {
        self.flags
    }

    /// Tile grid `(xrep, yrep)`, `(1, 1)` for untiled images
    pub fn tiles(&self) -> (u32, u32) {
        (self.xrep, self.yrep)
    }

    pub fn tile_count(&self) -> u32 {
        self.xrep * self.yrep
    }

    /// Tile animation settings, `None` unless the animation flag is set
    pub fn tile_animation(&self) -> Option<TileAnimation> {
        self.flags
            .contains(ImageFlags::TILE_ANIMATION)
            .then_some(self.animation)
    }

    /// Sequences and movies change their pixels over time
    pub fn is_animated(&self) -> bool {
        matches!(self.source, ImageSource::Sequence | ImageSource::Movie)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Buffer index selected by the image user
    pub fn frame_index(&self, user: Option<&ImageUser>) -> usize {
        if !self.is_animated() {
            return 0;
        }
        let frame = user.map_or(0, |u| u.frame).max(0) as usize;
        frame.min(self.frames.len().saturating_sub(1))
    }

    /// Buffer for the frame the user is looking at
    pub fn buffer(&self, user: Option<&ImageUser>) -> Option<&ImageBuffer> {
        self.frames.get(self.frame_index(user))
    }

    /// Mutable buffer access, marks the image as changed
    pub fn buffer_mut(&mut self, user: Option<&ImageUser>) -> Option<&mut ImageBuffer> {
        let index = self.frame_index(user);
        self.generation = next_generation();
        self.frames.get_mut(index)
    }

    /// Mark the content as changed without touching the buffers
    pub fn tag_changed(&mut self) {
        self.generation = next_generation();
    }
}

/// All images of a scene, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ImageLibrary {
    images: HashMap<ImageId, Image>,
}

impl ImageLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an image, replacing any image with the same id
    pub fn insert(&mut self, image: Image) -> Option<Image> {
        self.images.insert(image.id(), image)
    }

    pub fn get(&self, id: ImageId) -> Option<&Image> {
        self.images.get(&id)
    }

    pub fn get_mut(&mut self, id: ImageId) -> Option<&mut Image> {
        self.images.get_mut(&id)
    }

    pub fn remove(&mut self, id: ImageId) -> Option<Image> {
        self.images.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Image> {
        self.images.values()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_image_ignores_user_frame() {
        let image = Image::new(ImageId(1), "still", ImageBuffer::solid(2, 2, [255; 4]));
        assert_eq!(image.frame_index(Some(&ImageUser::frame(12))), 0);
        assert!(image.buffer(None).is_some());
    }

    #[test]
    fn test_sequence_clamps_frame() {
        let frames = (0..3)
            .map(|i| ImageBuffer::solid(1, 1, [i, i, i, 255]))
            .collect();
        let image = Image::sequence(ImageId(2), "seq", frames);
        assert!(image.is_animated());
        assert_eq!(image.frame_index(Some(&ImageUser::frame(1))), 1);
        assert_eq!(image.frame_index(Some(&ImageUser::frame(99))), 2);
        assert_eq!(image.frame_index(Some(&ImageUser::frame(-4))), 0);
    }

    #[test]
    fn test_buffer_mut_bumps_generation() {
        let mut image = Image::new(ImageId(3), "paint", ImageBuffer::solid(1, 1, [0; 4]));
        let before = image.generation();
        image.buffer_mut(None).unwrap().rect = Some(vec![1, 2, 3, 4]);
        assert!(image.generation() > before);
        let painted = image.generation();
        image.tag_changed();
        assert!(image.generation() > painted);
    }

    #[test]
    fn test_new_images_never_share_a_generation() {
        let first = Image::new(ImageId(5), "a", ImageBuffer::solid(1, 1, [0; 4]));
        let second = Image::new(ImageId(5), "a", ImageBuffer::solid(1, 1, [0; 4]));
        assert_ne!(first.generation(), second.generation());
    }

    #[test]
    fn test_tile_animation_requires_flag() {
        let image = Image::new(ImageId(4), "tiles", ImageBuffer::solid(4, 4, [0; 4]))
            .with_tiles(2, 2);
        assert_eq!(image.tile_count(), 4);
        assert!(image.tile_animation().is_none());

        let animated = image.with_tile_animation(0, 3, 10);
        assert_eq!(
            animated.tile_animation(),
            Some(TileAnimation {
                start: 0,
                end: 3,
                speed: 10
            })
        );
    }

    #[test]
    fn test_empty_buffer() {
        assert!(ImageBuffer::default().is_empty());
        assert!(ImageBuffer::from_rgba8(0, 4, Vec::new()).is_empty());
        assert!(!ImageBuffer::solid(1, 1, [0; 4]).is_empty());
    }
}
