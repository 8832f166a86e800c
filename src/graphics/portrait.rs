use image::{Rgba, RgbaImage};

use super::palette::Palette;
use super::tiled::{Resolution, RES_PORTRAIT};

/// A single decoded portrait: its palette and one palette index per pixel, row by row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Portrait {
    palette: Palette,
    pixels: Vec<u8>,
}

impl Portrait {
    /// Builds a portrait at the canonical 40x40 resolution. Returns `None` when the pixel count
    /// doesn't match. Indices are masked to 4 bits.
    pub fn new(palette: Palette, mut pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != RES_PORTRAIT.pixel_count() {
            return None;
        }
        for px in &mut pixels {
            *px &= 0x0F;
        }
        Some(Portrait { palette, pixels })
    }

    /// An all-black, all-zero portrait. Used for the reserved store slot.
    pub fn blank() -> Self {
        Portrait {
            palette: Palette::default(),
            pixels: vec![0; RES_PORTRAIT.pixel_count()],
        }
    }

    pub fn resolution(&self) -> Resolution {
        RES_PORTRAIT
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * RES_PORTRAIT.width + x]
    }

    /// Size in bytes of the packed 4bpp image.
    pub fn raw_len(&self) -> usize {
        RES_PORTRAIT.tiled_len()
    }

    /// Renders the portrait with its palette. Every pixel is opaque.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let res = self.resolution();
        RgbaImage::from_fn(res.width as u32, res.height as u32, |x, y| {
            let colour = self.palette.get(self.pixel(x as usize, y as usize));
            Rgba([colour.r, colour.g, colour.b, 255])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::palette::Rgb;

    #[test]
    fn rejects_wrong_pixel_count() {
        assert!(Portrait::new(Palette::default(), vec![0; 16]).is_none());
    }

    #[test]
    fn masks_indices_and_renders() {
        let palette = Palette::from_colours(&[Rgb::new(0, 0, 0), Rgb::new(10, 20, 30)]);
        let mut pixels = vec![0u8; 1600];
        pixels[41] = 0x11;
        let portrait = Portrait::new(palette, pixels).unwrap();

        assert_eq!(portrait.pixel(1, 1), 1);
        let rgba = portrait.to_rgba_image();
        assert_eq!(rgba.dimensions(), (40, 40));
        assert_eq!(rgba.get_pixel(1, 1), &Rgba([10, 20, 30, 255]));
        assert_eq!(rgba.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }
}
