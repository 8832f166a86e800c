//! Indexed PNG import and export.
//!
//! Portraits are written as 4 bit indexed PNGs so that the palette order survives editing in
//! external tools. Importing also accepts 8 bit indexed images and truecolour images using at
//! most 16 distinct colours.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use png::{BitDepth, ColorType, Decoder, Encoder, Transformations};

use super::{check_dimensions, portrait_from_indices, quantise_truecolour};
use crate::error::ImageIoError;
use crate::graphics::palette::{write_palette, Rgb, PORTRAIT_PALETTE_COLOURS};
use crate::graphics::Portrait;

pub const PNG_FILE_EXTENSION: &str = "png";

pub fn export_to_4bpp_png(portrait: &Portrait, path: &Path) -> Result<(), ImageIoError> {
    let res = portrait.resolution();
    let writer = BufWriter::new(File::create(path)?);

    let mut encoder = Encoder::new(writer, res.width as u32, res.height as u32);
    encoder.set_color(ColorType::Indexed);
    encoder.set_depth(BitDepth::Four);

    let mut palette = Vec::with_capacity(PORTRAIT_PALETTE_COLOURS * 3);
    write_palette(portrait.palette(), &mut palette);
    encoder.set_palette(palette);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&pack_4bpp_rows(portrait.pixels(), res.width))?;
    writer.finish()?;
    Ok(())
}

/// Packs one index per nibble, first pixel in the high nibble, each row starting on a new byte.
fn pack_4bpp_rows(pixels: &[u8], width: usize) -> Vec<u8> {
    let row_len = width.div_ceil(2);
    let mut packed = Vec::with_capacity(row_len * pixels.len() / width.max(1));

    for row in pixels.chunks(width) {
        for pair in row.chunks(2) {
            let high = pair[0] & 0x0F;
            let low = pair.get(1).map_or(0, |p| p & 0x0F);
            packed.push((high << 4) | low);
        }
    }
    packed
}

pub fn import_from_png(path: &Path) -> Result<Portrait, ImageIoError> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?));
    decoder.set_transformations(Transformations::IDENTITY);
    let mut reader = decoder.read_info()?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf)?;
    check_dimensions(path, frame.width, frame.height)?;

    if frame.color_type != ColorType::Indexed {
        return quantise_truecolour(path, &image::open(path)?.to_rgb8());
    }

    let colours: Vec<Rgb> = match reader.info().palette.as_ref() {
        Some(raw) => raw
            .chunks_exact(3)
            .map(|rgb| Rgb::new(rgb[0], rgb[1], rgb[2]))
            .collect(),
        None => {
            return Err(ImageIoError::Unsupported {
                path: path.to_path_buf(),
                reason: "indexed PNG without a palette".to_string(),
            })
        }
    };

    let depth = frame.bit_depth as usize;
    let pixels = unpack_indexed_rows(
        &buf[..frame.buffer_size()],
        frame.width as usize,
        frame.line_size,
        depth,
    );
    portrait_from_indices(path, &colours, pixels)
}

/// Reads indices of 1, 2, 4 or 8 bits, most significant bits first.
fn unpack_indexed_rows(data: &[u8], width: usize, line_size: usize, depth: usize) -> Vec<u8> {
    let per_byte = 8 / depth;
    let mask = ((1u16 << depth) - 1) as u8;
    let mut pixels = Vec::with_capacity(width * data.len() / line_size.max(1));

    for line in data.chunks(line_size) {
        for x in 0..width {
            let byte = line[x / per_byte];
            let shift = 8 - depth - (x % per_byte) * depth;
            pixels.push((byte >> shift) & mask);
        }
    }
    pixels
}

/// Recompresses a PNG in place with oxipng, leaving the palette and bit depth alone.
pub fn optimise_png(path: &Path) -> Result<(), ImageIoError> {
    let temp_path = path.with_extension("temp.png");
    fs::rename(path, &temp_path)?;

    let mut options = oxipng::Options::from_preset(2);
    // Any reduction could reorder or trim the palette
    options.bit_depth_reduction = false;
    options.color_type_reduction = false;
    options.palette_reduction = false;
    options.grayscale_reduction = false;

    let result = oxipng::optimize(
        &oxipng::InFile::Path(temp_path.clone()),
        &oxipng::OutFile::Path(Some(path.to_path_buf())),
        &options,
    );

    if let Err(e) = result {
        // Put the unoptimised file back
        fs::rename(&temp_path, path)?;
        return Err(ImageIoError::Optimise(e.to_string()));
    }

    if !path.exists() {
        fs::rename(&temp_path, path)?;
        return Ok(());
    }

    if let Err(e) = fs::remove_file(&temp_path) {
        log::warn!("Failed to remove temporary file {}: {}", temp_path.display(), e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Palette;

    fn four_colour_portrait() -> Portrait {
        let palette = Palette::from_colours(&[
            Rgb::new(255, 0, 0),
            Rgb::new(0, 255, 0),
            Rgb::new(0, 0, 255),
            Rgb::new(255, 255, 0),
        ]);
        let pixels = (0..1600)
            .map(|i| {
                let (x, y) = (i % 40, i / 40);
                ((x % 2) + (y % 2) * 2) as u8
            })
            .collect();
        Portrait::new(palette, pixels).unwrap()
    }

    #[test]
    fn packs_high_nibble_first() {
        assert_eq!(pack_4bpp_rows(&[1, 2, 3, 4], 4), vec![0x12, 0x34]);
        assert_eq!(pack_4bpp_rows(&[1, 2, 3, 4, 5, 6], 3), vec![0x12, 0x30, 0x45, 0x60]);
    }

    #[test]
    fn unpacks_every_depth() {
        assert_eq!(unpack_indexed_rows(&[0b1011_0000], 4, 1, 1), vec![1, 0, 1, 1]);
        assert_eq!(unpack_indexed_rows(&[0b1110_0100], 4, 1, 2), vec![3, 2, 1, 0]);
        assert_eq!(unpack_indexed_rows(&[0xAB, 0xC0], 3, 2, 4), vec![0xA, 0xB, 0xC]);
        assert_eq!(unpack_indexed_rows(&[7, 9], 2, 2, 8), vec![7, 9]);
    }

    #[test]
    fn indexed_png_keeps_palette_and_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0000.png");
        let portrait = four_colour_portrait();

        export_to_4bpp_png(&portrait, &path).unwrap();
        assert_eq!(import_from_png(&path).unwrap(), portrait);
    }

    #[test]
    fn optimised_png_still_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0000.png");
        let portrait = four_colour_portrait();

        export_to_4bpp_png(&portrait, &path).unwrap();
        optimise_png(&path).unwrap();
        assert!(!path.with_extension("temp.png").exists());
        assert_eq!(import_from_png(&path).unwrap(), portrait);
    }

    #[test]
    fn truecolour_png_is_quantised_in_order_of_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        let source = four_colour_portrait();
        source.to_rgba_image().save(&path).unwrap();

        let imported = import_from_png(&path).unwrap();
        assert_eq!(imported.pixels(), source.pixels());
        assert_eq!(imported.palette(), source.palette());
    }

    #[test]
    fn wrong_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        image::RgbaImage::new(8, 8).save(&path).unwrap();

        assert!(matches!(
            import_from_png(&path),
            Err(ImageIoError::Dimensions { width: 8, height: 8, .. })
        ));
    }

    #[test]
    fn seventeen_colours_are_too_many() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.png");
        let image = image::RgbImage::from_fn(40, 40, |x, _| image::Rgb([(x % 17) as u8 * 10, 0, 0]));
        image.save(&path).unwrap();

        assert!(matches!(
            import_from_png(&path),
            Err(ImageIoError::TooManyColours { colours: 17, .. })
        ));
    }
}
