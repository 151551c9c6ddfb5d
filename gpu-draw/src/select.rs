//! Selection index encoding
//!
//! Picking draws every selectable element with its index packed into the
//! vertex color, then reads the framebuffer back. How many index bits survive
//! depends on the framebuffer color depth: shallow framebuffers drop the low
//! bits of each channel, so indices are spread over the high bits and the low
//! bits are filled with ones to land in the middle of each quantization step.
//!
//! Colors are packed `0x00BBGGRR`, red in the low byte, matching a read-back
//! RGBA8 pixel viewed as a little-endian `u32` without its alpha.

/// Packing scheme for a framebuffer color depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectEncoding {
    /// 12 bits (4 per channel)
    Bits12,
    /// 15 or 16 bits (5 per channel)
    Bits15,
    /// 18 bits (6 per channel)
    Bits18,
    /// 24 bits and up (8 per channel)
    #[default]
    Bits24,
}

impl SelectEncoding {
    /// Encoding for a framebuffer with `bits` bits per pixel
    pub fn from_color_depth(bits: u8) -> Self {
        match bits {
            0..=12 => SelectEncoding::Bits12,
            13..=16 => SelectEncoding::Bits15,
            17..=18 => SelectEncoding::Bits18,
            _ => SelectEncoding::Bits24,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            SelectEncoding::Bits12 => 12,
            SelectEncoding::Bits15 => 15,
            SelectEncoding::Bits18 => 18,
            SelectEncoding::Bits24 => 24,
        }
    }

    /// Largest index that round-trips
    pub fn max_index(self) -> u32 {
        (1 << self.bits()) - 1
    }

    /// Pack an index into a color; bits above `max_index` are dropped
    pub fn index_to_color(self, index: u32) -> u32 {
        match self {
            SelectEncoding::Bits12 => {
                ((index & 0xF00) << 12) + ((index & 0xF0) << 8) + ((index & 0xF) << 4) | 0x070707
            }
            SelectEncoding::Bits15 => {
                ((index & 0x7C00) << 9) + ((index & 0x3E0) << 6) + ((index & 0x1F) << 3)
                    | 0x030303
            }
            SelectEncoding::Bits18 => {
                ((index & 0x3F000) << 6) + ((index & 0xFC0) << 4) + ((index & 0x3F) << 2)
                    | 0x010101
            }
            SelectEncoding::Bits24 => index & 0xFFFFFF,
        }
    }

    /// Unpack a color read back from the framebuffer; 0 is background
    pub fn color_to_index(self, color: u32) -> u32 {
        if color == 0 {
            return 0;
        }
        match self {
            SelectEncoding::Bits12 => {
                ((color & 0xF00000) >> 12) + ((color & 0xF000) >> 8) + ((color & 0xF0) >> 4)
            }
            SelectEncoding::Bits15 => {
                ((color & 0xF80000) >> 9) + ((color & 0xF800) >> 6) + ((color & 0xF8) >> 3)
            }
            SelectEncoding::Bits18 => {
                ((color & 0xFC0000) >> 6) + ((color & 0xFC00) >> 4) + ((color & 0xFC) >> 2)
            }
            SelectEncoding::Bits24 => color & 0xFFFFFF,
        }
    }

    /// Decode a read-back buffer in place
    ///
    /// Neighbouring pixels usually repeat, so the last color/index pair is
    /// reused instead of decoding again.
    pub fn colors_to_indices(self, buffer: &mut [u32]) {
        let mut last: Option<(u32, u32)> = None;
        for value in buffer.iter_mut() {
            let color = *value;
            let index = match last {
                Some((prev_color, prev_index)) if prev_color == color => prev_index,
                _ => {
                    let index = self.color_to_index(color);
                    last = Some((color, index));
                    index
                }
            };
            *value = index;
        }
    }

    /// RGBA bytes to draw with for `index`
    pub fn index_to_rgba(self, index: u32) -> [u8; 4] {
        let color = self.index_to_color(index);
        [
            (color & 0xFF) as u8,
            ((color >> 8) & 0xFF) as u8,
            ((color >> 16) & 0xFF) as u8,
            0xFF,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    const ALL: [SelectEncoding; 4] = [
        SelectEncoding::Bits12,
        SelectEncoding::Bits15,
        SelectEncoding::Bits18,
        SelectEncoding::Bits24,
    ];

    #[test]
    fn test_round_trip_full_range_shallow_depths() {
        for encoding in [
            SelectEncoding::Bits12,
            SelectEncoding::Bits15,
            SelectEncoding::Bits18,
        ] {
            for index in 0..=encoding.max_index() {
                let color = encoding.index_to_color(index);
                assert_eq!(encoding.color_to_index(color), index, "{encoding:?} {index}");
            }
        }
    }

    #[test]
    fn test_round_trip_24_bit_samples() {
        let encoding = SelectEncoding::Bits24;
        let mut rng = Pcg32::seed_from_u64(24);
        let samples = (0..10_000).map(|_| rng.random_range(0..=encoding.max_index()));
        for index in samples.chain([0, encoding.max_index()]) {
            assert_eq!(encoding.color_to_index(encoding.index_to_color(index)), index);
        }
    }

    #[test]
    fn test_zero_color_is_background() {
        for encoding in ALL {
            assert_eq!(encoding.color_to_index(0), 0);
        }
    }

    #[test]
    fn test_low_bits_filled() {
        assert_eq!(SelectEncoding::Bits12.index_to_color(0), 0x070707);
        assert_eq!(SelectEncoding::Bits15.index_to_color(1), 0x03030B);
        assert_eq!(SelectEncoding::Bits18.index_to_color(0x3F), 0x0101FD);
    }

    #[test]
    fn test_from_color_depth() {
        assert_eq!(SelectEncoding::from_color_depth(12), SelectEncoding::Bits12);
        assert_eq!(SelectEncoding::from_color_depth(16), SelectEncoding::Bits15);
        assert_eq!(SelectEncoding::from_color_depth(18), SelectEncoding::Bits18);
        assert_eq!(SelectEncoding::from_color_depth(32), SelectEncoding::Bits24);
    }

    #[test]
    fn test_colors_to_indices_in_place() {
        let encoding = SelectEncoding::Bits15;
        let a = encoding.index_to_color(17);
        let b = encoding.index_to_color(300);
        let mut buffer = [0, a, a, a, b, b, 0];
        encoding.colors_to_indices(&mut buffer);
        assert_eq!(buffer, [0, 17, 17, 17, 300, 300, 0]);
    }

    #[test]
    fn test_index_to_rgba_channel_order() {
        assert_eq!(
            SelectEncoding::Bits24.index_to_rgba(0x030201),
            [0x01, 0x02, 0x03, 0xFF]
        );
    }
}
