//! Headerless image dumps: a `.raw` file of linear 4 bit pixels, high nibble first, and a
//! `.pal` file with the 16 RGB24 colours.

use std::{fs, path::Path};

use super::portrait_from_indices;
use crate::error::ImageIoError;
use crate::graphics::palette::{read_palette, write_palette, PORTRAIT_PALETTE_LEN};
use crate::graphics::{Portrait, RES_PORTRAIT};

pub const RAW_IMG_FILE_EXTENSION: &str = "raw";
pub const RAW_PAL_FILE_EXTENSION: &str = "pal";

/// Writes `path` and its sibling palette file.
pub fn export_to_raw_img_and_pal(portrait: &Portrait, path: &Path) -> Result<(), ImageIoError> {
    let packed: Vec<u8> = portrait
        .pixels()
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect();
    fs::write(path, packed)?;

    let mut palette = Vec::with_capacity(PORTRAIT_PALETTE_LEN);
    write_palette(portrait.palette(), &mut palette);
    fs::write(path.with_extension(RAW_PAL_FILE_EXTENSION), palette)?;
    Ok(())
}

pub fn import_from_raw_img_and_pal(path: &Path) -> Result<Portrait, ImageIoError> {
    let pal_path = path.with_extension(RAW_PAL_FILE_EXTENSION);
    if !pal_path.is_file() {
        return Err(ImageIoError::MissingPalette {
            path: path.to_path_buf(),
            palette: pal_path,
        });
    }

    let raw_palette = fs::read(&pal_path)?;
    let palette = read_palette(&raw_palette).ok_or_else(|| ImageIoError::Unsupported {
        path: pal_path.clone(),
        reason: format!(
            "palette holds {} bytes, expected {}",
            raw_palette.len(),
            PORTRAIT_PALETTE_LEN
        ),
    })?;

    let packed = fs::read(path)?;
    let expected = RES_PORTRAIT.tiled_len();
    if packed.len() != expected {
        return Err(ImageIoError::Unsupported {
            path: path.to_path_buf(),
            reason: format!("raw image holds {} bytes, expected {}", packed.len(), expected),
        });
    }

    let pixels = packed
        .iter()
        .flat_map(|&byte| [byte >> 4, byte & 0x0F])
        .collect();
    portrait_from_indices(path, &palette.colours, pixels)
}
