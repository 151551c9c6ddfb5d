//! Tile animation playback

use gpu_scene::{Image, TileAnimation};

/// Playback position of one tile-animated image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileAnimState {
    /// Tile currently shown
    pub frame: u32,
    /// Time the current frame was reached, seconds
    pub last_update: f64,
}

impl TileAnimState {
    pub fn new(animation: &TileAnimation) -> Self {
        Self {
            frame: animation.start,
            last_update: 0.0,
        }
    }
}

/// Animation range with the end clamped to the tiles the image has
pub(crate) fn clamped_range(image: &Image, animation: &TileAnimation) -> (u32, u32) {
    let last_tile = image.tile_count().saturating_sub(1);
    let end = animation.end.min(last_tile);
    (animation.start.min(end), end)
}

/// Wrap a frame that ran past the end back into `start..=end`
fn wrap(frame: u32, start: u32, end: u32) -> u32 {
    if frame <= end {
        return frame.max(start);
    }
    let cycle = end - start + 1;
    start + (frame - start) % cycle
}

/// Advance `state` to `time`; returns whether at least one tile step elapsed
pub(crate) fn advance(
    state: &mut TileAnimState,
    image: &Image,
    animation: &TileAnimation,
    time: f64,
) -> bool {
    let (start, end) = clamped_range(image, animation);

    if state.last_update < 0.0 {
        state.last_update = 0.0;
    }
    // Time went backwards (scrubbing): restart the window here
    if state.last_update > time {
        state.last_update = time;
    }

    let speed = f64::from(animation.speed);
    let inc = ((time - state.last_update) * speed) as u32;
    if inc == 0 {
        return false;
    }

    state.last_update += f64::from(inc) / speed;
    state.frame = wrap(state.frame.saturating_add(inc), start, end);
    true
}

/// One step forward on a scene frame change
pub(crate) fn step(state: &mut TileAnimState, image: &Image, animation: &TileAnimation) {
    let (start, end) = clamped_range(image, animation);
    state.frame += 1;
    if state.frame > end {
        state.frame = start;
    }
}
