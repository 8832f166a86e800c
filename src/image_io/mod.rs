//! Import and export of portraits as regular image files.
//!
//! Every format keeps the palette and the 4 bit indices untouched, so a portrait exported and
//! imported again is identical.

pub mod bmp;
pub mod png;
pub mod raw;

use std::path::{Path, PathBuf};

use crate::error::{ImageIoError, KaoError};
use crate::graphics::palette::{Rgb, PORTRAIT_PALETTE_COLOURS};
use crate::graphics::{Palette, Portrait, RES_PORTRAIT};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    #[default]
    Png,
    Bmp,
    /// Packed pixels in a `.raw` file, palette in a `.pal` file next to it.
    Raw,
}

impl ImageFormat {
    pub const SUPPORTED: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Bmp, ImageFormat::Raw];

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => png::PNG_FILE_EXTENSION,
            ImageFormat::Bmp => bmp::BMP_FILE_EXTENSION,
            ImageFormat::Raw => raw::RAW_IMG_FILE_EXTENSION,
        }
    }

    /// Detects the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::SUPPORTED
            .into_iter()
            .find(|format| format.extension() == ext)
    }
}

pub fn is_supported_image_type(path: &Path) -> bool {
    ImageFormat::from_path(path).is_some()
}

/// Loads a portrait, picking the importer from the file extension.
pub fn import_portrait(path: &Path) -> Result<Portrait, KaoError> {
    let format = ImageFormat::from_path(path)
        .ok_or_else(|| KaoError::UnsupportedImageType(path.to_path_buf()))?;
    Ok(import_portrait_as(path, format)?)
}

pub fn import_portrait_as(path: &Path, format: ImageFormat) -> Result<Portrait, ImageIoError> {
    match format {
        ImageFormat::Png => png::import_from_png(path),
        ImageFormat::Bmp => bmp::import_from_4bpp_bmp(path),
        ImageFormat::Raw => raw::import_from_raw_img_and_pal(path),
    }
}

/// Writes `portrait` next to `stem`, appending the format's extension. Returns the path of the
/// image file.
pub fn export_portrait(
    portrait: &Portrait,
    stem: &Path,
    format: ImageFormat,
) -> Result<PathBuf, ImageIoError> {
    let path = with_added_extension(stem, format.extension());
    match format {
        ImageFormat::Png => png::export_to_4bpp_png(portrait, &path)?,
        ImageFormat::Bmp => bmp::export_to_4bpp_bmp(portrait, &path)?,
        ImageFormat::Raw => raw::export_to_raw_img_and_pal(portrait, &path)?,
    }
    Ok(path)
}

/// Appends `.ext` without replacing anything after a dot already in the file name.
pub(crate) fn with_added_extension(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn check_dimensions(path: &Path, width: u32, height: u32) -> Result<(), ImageIoError> {
    let expected_width = RES_PORTRAIT.width as u32;
    let expected_height = RES_PORTRAIT.height as u32;
    if width != expected_width || height != expected_height {
        return Err(ImageIoError::Dimensions {
            path: path.to_path_buf(),
            width,
            height,
            expected_width,
            expected_height,
        });
    }
    Ok(())
}

/// Converts a truecolour image into a portrait, assigning palette slots in order of first use.
fn quantise_truecolour(path: &Path, image: &image::RgbImage) -> Result<Portrait, ImageIoError> {
    check_dimensions(path, image.width(), image.height())?;

    let mut colours: Vec<Rgb> = Vec::with_capacity(PORTRAIT_PALETTE_COLOURS);
    let mut pixels = Vec::with_capacity((image.width() * image.height()) as usize);

    for pixel in image.pixels() {
        let colour = Rgb::new(pixel[0], pixel[1], pixel[2]);
        let index = match colours.iter().position(|&c| c == colour) {
            Some(index) => index,
            None => {
                colours.push(colour);
                colours.len() - 1
            }
        };
        pixels.push(index as u8);
    }

    if colours.len() > PORTRAIT_PALETTE_COLOURS {
        return Err(ImageIoError::TooManyColours {
            path: path.to_path_buf(),
            colours: colours.len(),
        });
    }

    portrait_from_indices(path, &colours, pixels)
}

/// Builds a portrait from an imported palette table and index buffer.
fn portrait_from_indices(
    path: &Path,
    colours: &[Rgb],
    pixels: Vec<u8>,
) -> Result<Portrait, ImageIoError> {
    if let Some(&max) = pixels.iter().max() {
        if max as usize >= PORTRAIT_PALETTE_COLOURS {
            return Err(ImageIoError::TooManyColours {
                path: path.to_path_buf(),
                colours: max as usize + 1,
            });
        }
    }

    Portrait::new(Palette::from_colours(colours), pixels).ok_or_else(|| {
        ImageIoError::Unsupported {
            path: path.to_path_buf(),
            reason: "pixel buffer doesn't match the portrait resolution".to_string(),
        }
    })
}
