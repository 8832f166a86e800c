//! 4 bit BMP import and export.
//!
//! Indexed images are decoded here so the palette order survives. Only uncompressed
//! `BITMAPINFOHEADER` images are handled, rows are stored bottom-up unless the height is negative,
//! and each row is padded to 4 bytes. 24 and 32 bit images go through `image` and are quantised
//! like truecolour PNGs.

use std::{fs, path::Path};

use super::{check_dimensions, portrait_from_indices, quantise_truecolour};
use crate::binary_utils::{checked_slice, read_i32_le, read_u16_le, read_u32_le};
use crate::error::ImageIoError;
use crate::graphics::palette::{Rgb, PORTRAIT_PALETTE_COLOURS};
use crate::graphics::Portrait;

pub const BMP_FILE_EXTENSION: &str = "bmp";

const BMP_MAGIC: &[u8; 2] = b"BM";
const FILE_HEADER_LEN: usize = 14;
const INFO_HEADER_LEN: usize = 40;
const BI_RGB: u32 = 0;
/// 72 DPI
const PIXELS_PER_METRE: i32 = 2835;

fn row_stride(width: usize, bits_per_pixel: usize) -> usize {
    (width * bits_per_pixel).div_ceil(32) * 4
}

pub fn export_to_4bpp_bmp(portrait: &Portrait, path: &Path) -> Result<(), ImageIoError> {
    fs::write(path, encode_4bpp_bmp(portrait))?;
    Ok(())
}

fn encode_4bpp_bmp(portrait: &Portrait) -> Vec<u8> {
    let res = portrait.resolution();
    let stride = row_stride(res.width, 4);
    let pixel_offset = FILE_HEADER_LEN + INFO_HEADER_LEN + PORTRAIT_PALETTE_COLOURS * 4;
    let image_len = stride * res.height;
    let file_len = pixel_offset + image_len;

    let mut out = Vec::with_capacity(file_len);

    // File header
    out.extend_from_slice(BMP_MAGIC);
    out.extend_from_slice(&(file_len as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(pixel_offset as u32).to_le_bytes());

    // Info header
    out.extend_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&(res.width as i32).to_le_bytes());
    out.extend_from_slice(&(res.height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&BI_RGB.to_le_bytes());
    out.extend_from_slice(&(image_len as u32).to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
    out.extend_from_slice(&(PORTRAIT_PALETTE_COLOURS as u32).to_le_bytes());
    out.extend_from_slice(&(PORTRAIT_PALETTE_COLOURS as u32).to_le_bytes());

    for colour in &portrait.palette().colours {
        out.extend_from_slice(&[colour.b, colour.g, colour.r, 0]);
    }

    for y in (0..res.height).rev() {
        let row_start = out.len();
        for x in (0..res.width).step_by(2) {
            let high = portrait.pixel(x, y);
            let low = if x + 1 < res.width {
                portrait.pixel(x + 1, y)
            } else {
                0
            };
            out.push((high << 4) | low);
        }
        out.resize(row_start + stride, 0);
    }

    out
}

pub fn import_from_4bpp_bmp(path: &Path) -> Result<Portrait, ImageIoError> {
    let data = fs::read(path)?;
    decode_bmp(path, &data)
}

fn decode_bmp(path: &Path, data: &[u8]) -> Result<Portrait, ImageIoError> {
    let unsupported = |reason: &str| ImageIoError::Unsupported {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let truncated = || unsupported("truncated BMP");

    if !data.starts_with(BMP_MAGIC) {
        return Err(unsupported("missing BM signature"));
    }

    let pixel_offset = read_u32_le(data, 10).ok_or_else(truncated)? as usize;
    let header_len = read_u32_le(data, 14).ok_or_else(truncated)? as usize;
    if header_len < INFO_HEADER_LEN {
        return Err(unsupported("BMP core headers are not supported"));
    }

    let width = read_i32_le(data, 18).ok_or_else(truncated)?;
    let height = read_i32_le(data, 22).ok_or_else(truncated)?;
    let bits_per_pixel = read_u16_le(data, 28).ok_or_else(truncated)? as usize;
    let compression = read_u32_le(data, 30).ok_or_else(truncated)?;
    let colours_used = read_u32_le(data, 46).ok_or_else(truncated)? as usize;

    if bits_per_pixel == 24 || bits_per_pixel == 32 {
        let image = image::load_from_memory_with_format(data, image::ImageFormat::Bmp)?;
        return quantise_truecolour(path, &image.to_rgb8());
    }

    if compression != BI_RGB {
        return Err(unsupported("compressed BMPs are not supported"));
    }
    if bits_per_pixel != 4 && bits_per_pixel != 8 {
        return Err(unsupported("only 4, 8, 24 and 32 bit BMPs are supported"));
    }

    let top_down = height < 0;
    check_dimensions(path, width.unsigned_abs(), height.unsigned_abs())?;
    let width = width.unsigned_abs() as usize;
    let height = height.unsigned_abs() as usize;

    let palette_len = if colours_used == 0 {
        1 << bits_per_pixel
    } else {
        colours_used
    };
    let palette_start = FILE_HEADER_LEN + header_len;
    let raw_palette = checked_slice(data, palette_start..palette_start + palette_len * 4)
        .ok_or_else(truncated)?;
    let colours: Vec<Rgb> = raw_palette
        .chunks_exact(4)
        .map(|bgra| Rgb::new(bgra[2], bgra[1], bgra[0]))
        .collect();

    let stride = row_stride(width, bits_per_pixel);
    let raw_pixels =
        checked_slice(data, pixel_offset..pixel_offset + stride * height).ok_or_else(truncated)?;

    let mut pixels = vec![0u8; width * height];
    for (row_idx, row) in raw_pixels.chunks_exact(stride).enumerate() {
        let y = if top_down { row_idx } else { height - 1 - row_idx };
        let dest = &mut pixels[y * width..(y + 1) * width];
        for (x, px) in dest.iter_mut().enumerate() {
            *px = if bits_per_pixel == 4 {
                let byte = row[x / 2];
                if x % 2 == 0 {
                    byte >> 4
                } else {
                    byte & 0x0F
                }
            } else {
                row[x]
            };
        }
    }

    portrait_from_indices(path, &colours, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Palette;

    fn gradient_portrait() -> Portrait {
        let colours: Vec<Rgb> = (0..16).map(|i| Rgb::new(i * 16, 255 - i, i)).collect();
        let pixels = (0..1600).map(|i| ((i % 40 + i / 40) % 16) as u8).collect();
        Portrait::new(Palette::from_colours(&colours), pixels).unwrap()
    }

    #[test]
    fn header_layout() {
        let bmp = encode_4bpp_bmp(&gradient_portrait());
        assert_eq!(&bmp[..2], b"BM");
        assert_eq!(read_u32_le(&bmp, 2).unwrap() as usize, bmp.len());
        assert_eq!(read_u32_le(&bmp, 10).unwrap(), 14 + 40 + 64);
        assert_eq!(read_u16_le(&bmp, 28).unwrap(), 4);
        assert_eq!(bmp.len(), 118 + 20 * 40);
        // Palette entry 1 stored as BGR0
        assert_eq!(&bmp[58..62], &[1, 254, 16, 0]);
    }

    #[test]
    fn bottom_row_is_stored_first() {
        let portrait = gradient_portrait();
        let bmp = encode_4bpp_bmp(&portrait);
        let first_row = &bmp[118..138];
        assert_eq!(first_row[0] >> 4, portrait.pixel(0, 39));
        assert_eq!(first_row[0] & 0x0F, portrait.pixel(1, 39));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0003.bmp");
        let portrait = gradient_portrait();

        export_to_4bpp_bmp(&portrait, &path).unwrap();
        assert_eq!(import_from_4bpp_bmp(&path).unwrap(), portrait);
    }

    #[test]
    fn top_down_rows_are_flipped_back() {
        let portrait = gradient_portrait();
        let mut bmp = encode_4bpp_bmp(&portrait);
        bmp[22..26].copy_from_slice(&(-40i32).to_le_bytes());

        let decoded = decode_bmp(Path::new("flipped.bmp"), &bmp).unwrap();
        assert_eq!(decoded.pixel(0, 0), portrait.pixel(0, 39));
        assert_eq!(decoded.pixel(5, 39), portrait.pixel(5, 0));
    }

    #[test]
    fn truecolour_bmp_is_quantised_in_order_of_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001.bmp");
        // First-use order of the checker pattern matches its palette order
        let colours = [
            Rgb::new(255, 0, 0),
            Rgb::new(0, 255, 0),
            Rgb::new(0, 0, 255),
            Rgb::new(255, 255, 0),
        ];
        let pixels: Vec<u8> = (0..1600)
            .map(|i| ((i % 40) % 2 + ((i / 40) % 2) * 2) as u8)
            .collect();
        let source = Portrait::new(Palette::from_colours(&colours), pixels).unwrap();

        image::DynamicImage::ImageRgba8(source.to_rgba_image())
            .to_rgb8()
            .save(&path)
            .unwrap();
        let data = fs::read(&path).unwrap();
        assert_eq!(read_u16_le(&data, 28).unwrap(), 24);

        let imported = import_from_4bpp_bmp(&path).unwrap();
        assert_eq!(imported.pixels(), source.pixels());
        assert_eq!(imported.palette(), source.palette());
    }

    #[test]
    fn truecolour_bmp_with_too_many_colours_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.bmp");
        image::RgbImage::from_fn(40, 40, |x, y| image::Rgb([(x % 20) as u8 * 10, (y % 2) as u8, 0]))
            .save(&path)
            .unwrap();

        assert!(matches!(
            import_from_4bpp_bmp(&path),
            Err(ImageIoError::TooManyColours { colours: 40, .. })
        ));
    }

    #[test]
    fn rejects_other_files() {
        assert!(matches!(
            decode_bmp(Path::new("x.bmp"), b"PK\x03\x04"),
            Err(ImageIoError::Unsupported { .. })
        ));

        let mut bmp = encode_4bpp_bmp(&gradient_portrait());
        bmp.truncate(200);
        assert!(matches!(
            decode_bmp(Path::new("x.bmp"), &bmp),
            Err(ImageIoError::Unsupported { .. })
        ));
    }
}
