//! Texture cache and lifecycle
//!
//! The cache exclusively owns every backend texture made from scene images.
//! Textures are keyed by what was uploaded (image, frame, target, tile,
//! mipmap and data flags) and checked for freshness on every
//! [`TextureCache::verify`]: either by trusting the image generation counter
//! or, when asked, by hashing the pixel content.
//!
//! Eviction is explicit. Apart from the calls that free textures directly,
//! [`TextureCache::collect_garbage`] sweeps textures that went unused for the
//! configured timeout, and frees requested from other threads wait in a queue
//! until [`TextureCache::flush_pending_frees`] runs on the owning thread.

mod animation;
mod free_queue;
mod smoke;
mod upload;


pub use animation::TileAnimState;
pub use free_queue::{FreeQueueHandle, FreeRequest};
pub use smoke::SmokeTextures;

use gpu_scene::{
    Image, ImageBuffer, ImageFlags, ImageId, ImageLibrary, ImageUser, SmokeDomain, SmokeId,
};
use hashbrown::HashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh3::Xxh3;

use crate::backend::{
    BackendLimits, GpuBackend, Sampling, TexelFormat, TextureId, TextureTarget, Wrap,
};
use crate::config::TextureConfig;
use crate::error::{DrawError, Result};
use free_queue::FreeQueue;
use upload::{Encoding, UploadRequest};

/// Upload and eviction settings in effect
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSettings {
    pub mipmap: bool,
    pub linear_mipmap: bool,
    pub anisotropic: f32,
    /// Device mip generation, only true when the backend supports it
    pub gpu_mipmap: bool,
    pub high_bit_depth: bool,
    pub max_size: u32,
    pub timeout_secs: u64,
    pub collect_rate_secs: u64,
    /// Texture painting is active: sample without mipmaps
    pub texpaint: bool,
}

impl TextureSettings {
    pub fn from_config(config: &TextureConfig, limits: &BackendLimits) -> Self {
        Self {
            mipmap: config.mipmap,
            linear_mipmap: config.linear_mipmap,
            anisotropic: clamp_anisotropy(config.anisotropic, limits),
            gpu_mipmap: config.gpu_mipmap && limits.gpu_mipmap,
            high_bit_depth: config.high_bit_depth,
            max_size: config.max_size,
            timeout_secs: config.timeout_secs,
            collect_rate_secs: config.collect_rate_secs,
            texpaint: false,
        }
    }
}

/// Non-finite values turn filtering off
fn clamp_anisotropy(value: f32, limits: &BackendLimits) -> f32 {
    if value.is_finite() {
        value.clamp(1.0, limits.max_anisotropy.max(1.0))
    } else {
        1.0
    }
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self::from_config(&TextureConfig::default(), &BackendLimits::default())
    }
}

/// What a cached texture was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub image: ImageId,
    /// Buffer index picked by the image user
    pub frame: usize,
    pub target: TextureTarget,
    pub tile: u32,
    pub mipmap: bool,
    pub is_data: bool,
}

/// A cached backend texture
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub texture: TextureId,
    pub format: TexelFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    /// Every mip level holds current pixels
    pub mip_complete: bool,
    /// Image generation the upload was made from
    pub generation: u64,
    pub content_hash: u64,
    /// Cache clock at the last verify, seconds
    pub last_used: u64,
    pub bytes: usize,
    /// Sequence or movie source
    pub animated: bool,
    pub flags: ImageFlags,
    source_size: (u32, u32),
    encoding: Option<Encoding>,
}

/// Parameters of [`TextureCache::verify`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyParams<'a> {
    pub user: Option<&'a ImageUser>,
    pub target: TextureTarget,
    /// Tile of a tiled image, ignored for untiled images
    pub tile: u32,
    /// Compare pixel content instead of trusting the generation counter
    pub compare: bool,
    pub mipmap: bool,
    /// Non-color data (normal maps, masks): no color conversion
    pub is_data: bool,
}

impl Default for VerifyParams<'_> {
    fn default() -> Self {
        Self {
            user: None,
            target: TextureTarget::Texture2D,
            tile: 0,
            compare: false,
            mipmap: true,
            is_data: false,
        }
    }
}

impl<'a> VerifyParams<'a> {
    pub fn with_user(mut self, user: &'a ImageUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_target(mut self, target: TextureTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_tile(mut self, tile: u32) -> Self {
        self.tile = tile;
        self
    }
}

/// xxh3 over the dimensions and every pixel payload of a buffer
pub fn content_hash(buffer: &ImageBuffer) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(&buffer.width.to_le_bytes());
    hasher.update(&buffer.height.to_le_bytes());
    if let Some(rect) = &buffer.rect {
        hasher.update(rect);
    }
    if let Some(rect_float) = &buffer.rect_float {
        hasher.update(bytemuck::cast_slice(rect_float));
    }
    if let Some(compressed) = &buffer.compressed {
        hasher.update(&compressed.data);
    }
    hasher.digest()
}

/// Cache of image textures, tile animation state and smoke volumes
#[derive(Debug)]
pub struct TextureCache {
    settings: TextureSettings,
    entries: HashMap<TextureKey, CacheEntry>,
    animations: HashMap<ImageId, TileAnimState>,
    smoke: HashMap<SmokeId, SmokeTextures>,
    free_queue: FreeQueue,
    clock: u64,
    last_collect: u64,
}

impl TextureCache {
    pub fn new(settings: TextureSettings) -> Self {
        Self {
            settings,
            entries: HashMap::new(),
            animations: HashMap::new(),
            smoke: HashMap::new(),
            free_queue: FreeQueue::new(),
            clock: 0,
            last_collect: 0,
        }
    }

    pub fn settings(&self) -> &TextureSettings {
        &self.settings
    }

    /// Set the wall clock used for last-use stamps and collection, seconds
    pub fn set_clock(&mut self, now_secs: u64) {
        self.clock = now_secs;
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&TextureKey, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn entry(&self, key: &TextureKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Bytes of all cached image textures
    pub fn memory_used(&self) -> usize {
        self.entries.values().map(|entry| entry.bytes).sum()
    }

    /// Tile the animation of `image` currently shows
    pub fn animation_frame(&self, image: &Image) -> Option<u32> {
        let animation = image.tile_animation()?;
        Some(
            self.animations
                .get(&image.id())
                .map_or(animation.start, |state| state.frame),
        )
    }

    fn effective_tile(&self, image: &Image, requested: u32) -> u32 {
        let count = image.tile_count();
        if !image.flags().contains(ImageFlags::TILES) || count <= 1 {
            return 0;
        }
        self.animation_frame(image)
            .unwrap_or(requested)
            .min(count - 1)
    }

    fn key_for(&self, image: &Image, params: &VerifyParams<'_>) -> TextureKey {
        TextureKey {
            image: image.id(),
            frame: image.frame_index(params.user),
            target: params.target,
            tile: self.effective_tile(image, params.tile),
            mipmap: params.mipmap && self.settings.mipmap,
            is_data: params.is_data,
        }
    }

    // ===== Verify =====

    /// Look up or create the texture for an image
    ///
    /// Failures leave the cache without an entry for the key; the caller
    /// draws untextured.
    pub fn verify<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        image: &Image,
        params: &VerifyParams<'_>,
    ) -> Result<TextureId> {
        let key = self.key_for(image, params);
        let buffer = image.buffer(params.user);

        let mut stale = None;
        if let Some(entry) = self.entries.get_mut(&key) {
            let fresh = if params.compare {
                let same = buffer.map(content_hash) == Some(entry.content_hash);
                if same {
                    entry.generation = image.generation();
                }
                same
            } else {
                entry.generation == image.generation()
            };
            if fresh {
                entry.last_used = self.clock;
                if entry.flags != image.flags() {
                    // Clamp flags changed without new pixels
                    entry.flags = image.flags();
                    let sampling = Self::entry_sampling(&self.settings, &key, entry);
                    backend.set_sampling(entry.texture, &sampling);
                }
                return Ok(entry.texture);
            }
            stale = Some(entry.texture);
        }
        if let Some(texture) = stale {
            tracing::debug!(image = image.name(), "texture out of date, re-uploading");
            backend.delete_texture(texture);
            self.entries.remove(&key);
        }

        let buffer = buffer
            .filter(|buffer| !buffer.is_empty())
            .ok_or(DrawError::NoImageBuffer(image.id()))?;
        let request = UploadRequest {
            target: key.target,
            tile: key.tile,
            mipmap: key.mipmap,
            is_data: key.is_data,
        };
        let uploaded =
            upload::create_image_texture(backend, &self.settings, image, buffer, &request)
                .inspect_err(|e| {
                    tracing::warn!(image = image.name(), "texture upload failed: {e}")
                })?;

        tracing::debug!(
            image = image.name(),
            texture = uploaded.texture.0,
            "created {}x{} {:?} texture, {} levels",
            uploaded.width,
            uploaded.height,
            uploaded.format,
            uploaded.mip_levels
        );
        self.entries.insert(
            key,
            CacheEntry {
                texture: uploaded.texture,
                format: uploaded.format,
                width: uploaded.width,
                height: uploaded.height,
                mip_levels: uploaded.mip_levels,
                mip_complete: true,
                generation: image.generation(),
                content_hash: content_hash(buffer),
                last_used: self.clock,
                bytes: uploaded.bytes,
                animated: image.is_animated(),
                flags: image.flags(),
                source_size: (buffer.width, buffer.height),
                encoding: uploaded.encoding,
            },
        );
        Ok(uploaded.texture)
    }

    // ===== Tile animation =====

    /// Advance the tile animation of `image` to `time` (seconds)
    ///
    /// Returns whether at least one tile step elapsed. Calling again with the
    /// same time returns false.
    pub fn update_image_time(&mut self, image: &Image, time: f64) -> bool {
        let Some(animation) = image.tile_animation() else {
            return false;
        };
        let state = self
            .animations
            .entry(image.id())
            .or_insert_with(|| TileAnimState::new(&animation));
        animation::advance(state, image, &animation, time)
    }

    /// Step every tile animation of the library one tile forward
    pub fn update_images_framechange(&mut self, library: &ImageLibrary) {
        for image in library.iter() {
            let Some(animation) = image.tile_animation() else {
                continue;
            };
            let state = self
                .animations
                .entry(image.id())
                .or_insert_with(|| TileAnimState::new(&animation));
            animation::step(state, image, &animation);
        }
    }

    // ===== Painting =====

    /// Push a painted rectangle of the image to its textures
    ///
    /// Textures that cannot take a partial update (tiled, scaled, compressed,
    /// or with host-built mipmaps that would go stale) are freed and rebuilt
    /// on the next verify.
    #[allow(clippy::too_many_arguments)]
    pub fn paint_update_image<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        image: &Image,
        user: Option<&ImageUser>,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let frame = image.frame_index(user);
        let keys: SmallVec<[TextureKey; 4]> = self
            .entries
            .keys()
            .filter(|key| key.image == image.id() && key.frame == frame)
            .copied()
            .collect();
        if keys.is_empty() {
            return Ok(());
        }

        let buffer = image.buffer(user).filter(|buffer| !buffer.is_empty());
        // An empty request means the whole image changed
        let whole_image = width == 0 || height == 0;
        let (x, y, width, height) = match buffer {
            Some(buffer) if !whole_image => {
                let x = x.min(buffer.width);
                let y = y.min(buffer.height);
                (x, y, width.min(buffer.width - x), height.min(buffer.height - y))
            }
            _ => (x, y, width, height),
        };
        if !whole_image && buffer.is_some() && (width == 0 || height == 0) {
            tracing::trace!(image = %image.name(), "paint region outside the image");
            return Ok(());
        }
        let host_mipmaps =
            self.settings.mipmap && !self.settings.texpaint && !self.settings.gpu_mipmap;
        let full_reload = whole_image
            || buffer.is_none()
            || image.flags().contains(ImageFlags::TILES)
            || host_mipmaps;

        for key in keys {
            let partial = match (self.entries.get(&key), buffer) {
                (Some(entry), Some(buffer)) => {
                    !full_reload
                        && key.target == TextureTarget::Texture2D
                        && entry.encoding.is_some()
                        && entry.source_size == (buffer.width, buffer.height)
                        && (entry.width, entry.height) == (buffer.width, buffer.height)
                }
                _ => false,
            };
            if !partial {
                self.remove_entry(backend, &key);
                continue;
            }

            let (Some(entry), Some(buffer)) = (self.entries.get_mut(&key), buffer) else {
                continue;
            };
            let (pixels, encoding) = upload::decode(
                image.id(),
                buffer,
                key.is_data,
                self.settings.high_bit_depth,
            )?;
            if Some(encoding) != entry.encoding {
                let texture = entry.texture;
                backend.delete_texture(texture);
                self.entries.remove(&key);
                continue;
            }

            let region = pixels.region(x, y, width, height);
            upload::upload_region(backend, entry.texture, &region, encoding, x, y)?;
            if entry.mip_levels > 1 {
                if self.settings.gpu_mipmap {
                    backend.generate_mipmaps(entry.texture);
                } else {
                    entry.mip_complete = false;
                }
            }
            entry.generation = image.generation();
            entry.content_hash = content_hash(buffer);
        }
        Ok(())
    }

    // ===== Eviction =====

    fn remove_entry<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, key: &TextureKey) {
        if let Some(entry) = self.entries.remove(key) {
            backend.delete_texture(entry.texture);
        }
    }

    fn free_where<B, F>(&mut self, backend: &mut B, mut pred: F) -> usize
    where
        B: GpuBackend + ?Sized,
        F: FnMut(&TextureKey, &CacheEntry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            if pred(key, entry) {
                backend.delete_texture(entry.texture);
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }

    /// Free every texture of one image
    pub fn free_image<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, image: ImageId) -> usize {
        self.free_where(backend, |key, _| key.image == image)
    }

    pub fn free_all<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        let freed = self.free_where(backend, |_, _| true);
        if freed > 0 {
            tracing::debug!(freed, "freed all image textures");
        }
        freed
    }

    /// Free textures of sequences and movies
    pub fn free_animated<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        self.free_where(backend, |_, entry| entry.animated)
    }

    /// Free textures unused for more than `max_age_secs`, except images
    /// flagged as never collected
    pub fn free_stale<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, max_age_secs: u64) -> usize {
        let now = self.clock;
        let freed = self.free_where(backend, |_, entry| {
            !entry.flags.contains(ImageFlags::NO_COLLECT)
                && now.saturating_sub(entry.last_used) > max_age_secs
        });
        if freed > 0 {
            tracing::debug!(freed, max_age_secs, "freed stale textures");
        }
        freed
    }

    /// Periodic stale sweep, gated by the collect rate and timeout settings
    pub fn collect_garbage<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        let timeout = self.settings.timeout_secs;
        if timeout == 0 {
            return 0;
        }
        let now = self.clock;
        let rate = self.settings.collect_rate_secs.max(1);
        if now % rate != 0 || now == self.last_collect {
            return 0;
        }
        self.last_collect = now;
        self.free_stale(backend, timeout)
    }

    // ===== Deferred frees =====

    /// Handle other threads use to request frees
    pub fn free_queue_handle(&self) -> FreeQueueHandle {
        self.free_queue.handle()
    }

    /// Carry out queued frees; returns the number of requests handled
    pub fn flush_pending_frees<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        let requests = self.free_queue.drain();
        for request in &requests {
            match *request {
                FreeRequest::Image(image) => {
                    self.free_image(backend, image);
                }
                FreeRequest::Smoke(smoke) => {
                    self.free_smoke(backend, smoke);
                }
            }
        }
        if !requests.is_empty() {
            tracing::trace!(count = requests.len(), "flushed pending frees");
        }
        requests.len()
    }

    // ===== Settings =====

    fn entry_sampling(settings: &TextureSettings, key: &TextureKey, entry: &CacheEntry) -> Sampling {
        let mut sampling = upload::sampling(settings, entry.mip_levels > 1, entry.flags);
        if key.target == TextureTarget::CubeMap {
            sampling.wrap_u = Wrap::ClampToEdge;
            sampling.wrap_v = Wrap::ClampToEdge;
        }
        if entry.encoding.is_none() {
            sampling.max_level = Some(entry.mip_levels.saturating_sub(1));
        }
        sampling
    }

    pub fn mipmap(&self) -> bool {
        self.settings.mipmap
    }

    /// Turn mipmapping on or off; frees every texture on change
    pub fn set_mipmap<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, mipmap: bool) {
        if self.settings.mipmap != mipmap {
            self.free_all(backend);
            self.settings.mipmap = mipmap;
        }
    }

    pub fn linear_mipmap(&self) -> bool {
        self.settings.linear_mipmap
    }

    /// Switch between nearest and linear mip selection; frees mipmapped
    /// textures on change
    pub fn set_linear_mipmap<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, linear: bool) {
        if self.settings.linear_mipmap != linear {
            self.free_where(backend, |_, entry| entry.mip_levels > 1);
            self.settings.linear_mipmap = linear;
        }
    }

    /// Texture painting toggles mipmapped sampling without rebuilding
    ///
    /// With mipmaps off, mipmapped textures sample level 0 only. Turning them
    /// back on frees textures whose mip chain went stale while painting.
    pub fn paint_set_mipmap<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, mipmap: bool) {
        if !self.settings.mipmap {
            return;
        }
        self.settings.texpaint = !mipmap;

        if mipmap {
            self.free_where(backend, |_, entry| entry.mip_levels > 1 && !entry.mip_complete);
        }
        let updates: Vec<(TextureId, Sampling)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.mip_levels > 1)
            .map(|(key, entry)| (entry.texture, Self::entry_sampling(&self.settings, key, entry)))
            .collect();
        for (texture, sampling) in updates {
            backend.set_sampling(texture, &sampling);
        }
    }

    pub fn anisotropic(&self) -> f32 {
        self.settings.anisotropic
    }

    /// Set anisotropic filtering, clamped to `1..=backend max`; frees every
    /// texture on change
    pub fn set_anisotropic<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, value: f32) {
        let value = clamp_anisotropy(value, backend.limits());
        if self.settings.anisotropic != value {
            self.free_all(backend);
            self.settings.anisotropic = value;
        }
    }

    pub fn gpu_mipmapping(&self) -> bool {
        self.settings.gpu_mipmap
    }

    /// Prefer device mip generation; only takes effect when supported.
    /// Frees every texture on change.
    pub fn set_gpu_mipmapping<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, enabled: bool) {
        let supported = backend.limits().gpu_mipmap;
        if enabled && !supported {
            tracing::warn!("device mipmap generation not supported, building mipmaps on the host");
        }
        let effective = enabled && supported;
        if self.settings.gpu_mipmap != effective {
            self.free_all(backend);
            self.settings.gpu_mipmap = effective;
        }
    }

    // ===== Smoke =====

    /// Build (or rebuild) the volume textures of a smoke domain
    pub fn create_smoke<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        domain: &SmokeDomain,
        high_res: bool,
    ) -> Result<SmokeTextures> {
        self.free_smoke(backend, domain.id);
        let textures = smoke::create(backend, domain, high_res)?;
        self.smoke.insert(domain.id, textures);
        Ok(textures)
    }

    pub fn smoke(&self, id: SmokeId) -> Option<&SmokeTextures> {
        self.smoke.get(&id)
    }

    pub fn free_smoke<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, id: SmokeId) -> bool {
        match self.smoke.remove(&id) {
            Some(textures) => {
                smoke::delete(backend, &textures);
                true
            }
            None => false,
        }
    }

    /// Free everything the cache owns, smoke volumes included
    pub(crate) fn release<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        self.free_all(backend);
        for (_, textures) in self.smoke.drain() {
            smoke::delete(backend, &textures);
        }
    }
}
