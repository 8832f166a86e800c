//! # Portrait palette
//!
//! Sixteen RGB24 colours stored back to back in front of every portrait's compressed image.

use crate::binary_utils::checked_slice;

pub const PORTRAIT_PALETTE_COLOURS: usize = 16;
pub const PORTRAIT_PALETTE_LEN: usize = PORTRAIT_PALETTE_COLOURS * 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Palette {
    pub colours: [Rgb; PORTRAIT_PALETTE_COLOURS],
}

impl Palette {
    pub fn new(colours: [Rgb; PORTRAIT_PALETTE_COLOURS]) -> Self {
        Palette { colours }
    }

    /// Builds a palette from up to 16 colours, padding the rest with black.
    pub fn from_colours(colours: &[Rgb]) -> Self {
        let mut palette = Palette::default();
        for (slot, colour) in palette.colours.iter_mut().zip(colours) {
            *slot = *colour;
        }
        palette
    }

    pub fn get(&self, index: u8) -> Rgb {
        self.colours[(index & 0x0F) as usize]
    }
}

/// Reads a raw RGB24 palette. Returns `None` when `data` holds fewer than 48 bytes.
pub fn read_palette(data: &[u8]) -> Option<Palette> {
    let raw = checked_slice(data, 0..PORTRAIT_PALETTE_LEN)?;

    let mut palette = Palette::default();
    for (col, rgb) in palette.colours.iter_mut().zip(raw.chunks_exact(3)) {
        *col = Rgb::new(rgb[0], rgb[1], rgb[2]);
    }
    Some(palette)
}

/// Appends the palette as raw RGB24.
pub fn write_palette(palette: &Palette, out: &mut Vec<u8>) {
    for col in &palette.colours {
        out.extend_from_slice(&[col.r, col.g, col.b]);
    }
}
