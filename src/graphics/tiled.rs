//! # Tiled 4bpp images
//!
//! Portraits are stored as a grid of 8x8 tiles, tiles and pixels both in row-major order, two
//! 4 bit pixels per byte. Kaomado images keep the first pixel of each byte in the low nibble.

use crate::error::FormatError;

pub const TILE_DIM: usize = 8;
pub const PIXELS_PER_TILE: usize = TILE_DIM * TILE_DIM;

/// Kaomado portraits store their pixels low nibble first.
pub const KAO_PORTRAIT_PIXEL_ORDER_REVERSED: bool = true;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: usize,
    pub height: usize,
}

pub const RES_PORTRAIT: Resolution = Resolution {
    width: 40,
    height: 40,
};

impl Resolution {
    pub const fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Length in bytes of the packed tiled image.
    pub const fn tiled_len(&self) -> usize {
        self.pixel_count().div_ceil(2)
    }

    const fn tiles_per_row(&self) -> usize {
        self.width / TILE_DIM
    }

    /// Position in the linear buffer of the `idx`th pixel of the tiled stream.
    fn linear_index(&self, idx: usize) -> usize {
        let tile_id = idx / PIXELS_PER_TILE;
        let idx_in_tile = idx % PIXELS_PER_TILE;

        let x = (tile_id % self.tiles_per_row()) * TILE_DIM + idx_in_tile % TILE_DIM;
        let y = (tile_id / self.tiles_per_row()) * TILE_DIM + idx_in_tile / TILE_DIM;
        y * self.width + x
    }
}

/// Unpacks a tiled image into one palette index per pixel, row by row.
pub fn decode_tile_image(
    data: &[u8],
    resolution: Resolution,
    reverse_pixel_order: bool,
) -> Result<Vec<u8>, FormatError> {
    if data.len() != resolution.tiled_len() {
        return Err(FormatError::TiledImageLength {
            expected: resolution.tiled_len(),
            actual: data.len(),
        });
    }

    let mut pixels = vec![0u8; resolution.pixel_count()];
    for (byte_idx, &byte) in data.iter().enumerate() {
        let (first, second) = if reverse_pixel_order {
            (byte & 0x0F, byte >> 4)
        } else {
            (byte >> 4, byte & 0x0F)
        };

        pixels[resolution.linear_index(byte_idx * 2)] = first;
        pixels[resolution.linear_index(byte_idx * 2 + 1)] = second;
    }

    Ok(pixels)
}

/// Packs linear pixels into a tiled image appended to `out`.
///
/// `pixels` must hold `resolution.pixel_count()` entries.
pub fn encode_tile_image(
    pixels: &[u8],
    resolution: Resolution,
    reverse_pixel_order: bool,
    out: &mut Vec<u8>,
) {
    out.reserve(resolution.tiled_len());
    for byte_idx in 0..resolution.tiled_len() {
        let first = pixels[resolution.linear_index(byte_idx * 2)] & 0x0F;
        let second = pixels[resolution.linear_index(byte_idx * 2 + 1)] & 0x0F;

        out.push(if reverse_pixel_order {
            (second << 4) | first
        } else {
            (first << 4) | second
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tile_fills_top_left_corner() {
        let mut data = vec![0u8; RES_PORTRAIT.tiled_len()];
        // First byte: pixels (0,0) and (1,0)
        data[0] = 0x21;
        // Byte 4 of the first tile starts its second row
        data[4] = 0x03;
        // First byte of tile 1 sits at x = 8
        data[32] = 0x50;

        let pixels = decode_tile_image(&data, RES_PORTRAIT, true).unwrap();
        assert_eq!(pixels[0], 1);
        assert_eq!(pixels[1], 2);
        assert_eq!(pixels[40], 3);
        assert_eq!(pixels[9], 5);

        let not_reversed = decode_tile_image(&data, RES_PORTRAIT, false).unwrap();
        assert_eq!(not_reversed[0], 2);
        assert_eq!(not_reversed[1], 1);
    }

    #[test]
    fn second_tile_row_starts_at_y_eight() {
        let mut data = vec![0u8; RES_PORTRAIT.tiled_len()];
        // Tile 5 is the first tile of the second row
        data[5 * 32] = 0x07;
        let pixels = decode_tile_image(&data, RES_PORTRAIT, true).unwrap();
        assert_eq!(pixels[8 * 40], 7);
    }

    #[test]
    fn encode_inverts_decode() {
        let pixels: Vec<u8> = (0..RES_PORTRAIT.pixel_count())
            .map(|i| ((i * 7 + i / 40) % 16) as u8)
            .collect();

        for reverse in [true, false] {
            let mut tiled = Vec::new();
            encode_tile_image(&pixels, RES_PORTRAIT, reverse, &mut tiled);
            assert_eq!(tiled.len(), 800);
            assert_eq!(decode_tile_image(&tiled, RES_PORTRAIT, reverse).unwrap(), pixels);
        }
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(matches!(
            decode_tile_image(&[0u8; 799], RES_PORTRAIT, true),
            Err(FormatError::TiledImageLength { expected: 800, actual: 799 })
        ));
    }
}
