use crate::binary_utils::{checked_slice, read_i32_le};
use crate::containers::compression::at4px::At4pxContainer;
use crate::containers::{CompressionContainer, ContainerHandler};
use crate::error::FormatError;
use crate::graphics::palette::{read_palette, PORTRAIT_PALETTE_LEN};
use crate::graphics::tiled::{decode_tile_image, KAO_PORTRAIT_PIXEL_ORDER_REVERSED, RES_PORTRAIT};
use crate::graphics::Portrait;
use crate::progress::{NoProgress, Phase, ProgressObserver};

use super::{Kaomado, SubEntry, TocPointer, SUBENTRY_LEN};

impl Kaomado {
    /// Parses a whole kaomado file whose entries hold `subentry_count` pointers.
    pub fn parse(data: &[u8], subentry_count: usize) -> Result<Self, FormatError> {
        Self::parse_with_progress(data, subentry_count, &mut NoProgress)
    }

    pub fn parse_with_progress(
        data: &[u8],
        subentry_count: usize,
        progress: &mut dyn ProgressObserver,
    ) -> Result<Self, FormatError> {
        let entry_count = infer_entry_count(data, subentry_count)?;
        let mut kao = Kaomado::new(entry_count, subentry_count);

        log::info!(
            "Parsing kaomado: {} entries of {} portraits",
            entry_count,
            subentry_count
        );

        for entry in 0..entry_count {
            kao.read_toc_entry(data, entry)?;
            progress.on_progress(Phase::Parsing, entry + 1, entry_count);
        }

        log::info!("Parsed {} portraits", kao.store.len() - 1);
        Ok(kao)
    }

    fn read_toc_entry(&mut self, data: &[u8], entry: usize) -> Result<(), FormatError> {
        let entry_start = entry * self.subentry_count * SUBENTRY_LEN;

        for subentry in 0..self.subentry_count {
            let pos = entry_start + subentry * SUBENTRY_LEN;
            let raw = read_i32_le(data, pos).ok_or(FormatError::TruncatedToc {
                toc_len: pos + SUBENTRY_LEN,
                data_len: data.len(),
            })?;

            let slot = match TocPointer::from_raw(raw) {
                TocPointer::Valid(offset) => {
                    let portrait = read_portrait(data, offset as usize, entry, subentry)?;
                    SubEntry::Resolved(self.store.push(portrait))
                }
                TocPointer::Empty | TocPointer::LegacyEmptyMarker(_) => SubEntry::Empty,
            };
            self.toc[entry].subentries[subentry] = slot;
        }

        Ok(())
    }
}

/// Works out how many entries the table of contents holds from its first non-null pointer.
pub fn infer_entry_count(data: &[u8], subentry_count: usize) -> Result<usize, FormatError> {
    let entry_len = subentry_count * SUBENTRY_LEN;

    let first_non_null = data
        .iter()
        .position(|&b| b != 0)
        .ok_or(FormatError::EmptyContainer)?;

    // A pointer whose low byte is zero still starts on the pointer grid
    let pointer_pos = first_non_null - first_non_null % SUBENTRY_LEN;
    if pointer_pos > entry_len {
        return Err(FormatError::UnexpectedEntryLength(first_non_null));
    }

    let first_pointer = read_i32_le(data, pointer_pos).ok_or(FormatError::TruncatedToc {
        toc_len: pointer_pos + SUBENTRY_LEN,
        data_len: data.len(),
    })?;

    if first_pointer <= 0 || entry_len == 0 {
        return Err(FormatError::InvalidFirstPointer(first_pointer));
    }

    // The first pointer is the table length, so it must cover at least one entry and its own slot
    let toc_len = first_pointer as usize;
    if toc_len < entry_len || pointer_pos + SUBENTRY_LEN > toc_len {
        return Err(FormatError::InvalidFirstPointer(first_pointer));
    }

    if toc_len > data.len() {
        return Err(FormatError::TruncatedToc {
            toc_len,
            data_len: data.len(),
        });
    }

    Ok(toc_len / entry_len)
}

/// Decodes the portrait starting `offset` bytes into the file.
fn read_portrait(
    data: &[u8],
    offset: usize,
    entry: usize,
    subentry: usize,
) -> Result<Portrait, FormatError> {
    let out_of_bounds = |end: usize| FormatError::PortraitOutOfBounds {
        entry,
        subentry,
        start: offset,
        end,
        data_len: data.len(),
    };
    let portrait_error = |source| FormatError::Portrait {
        entry,
        subentry,
        source,
    };

    // Skip the palette and read the AT4PX header for the portrait's length
    let container_start = offset + PORTRAIT_PALETTE_LEN;
    let header = data
        .get(container_start..)
        .ok_or_else(|| out_of_bounds(container_start))?;
    let container_len = At4pxContainer::read_container_length(header).map_err(portrait_error)?;

    let entry_len = container_len + PORTRAIT_PALETTE_LEN;
    let raw = checked_slice(data, offset..offset + entry_len)
        .ok_or_else(|| out_of_bounds(offset + entry_len))?;

    let palette = read_palette(raw).ok_or_else(|| out_of_bounds(offset + PORTRAIT_PALETTE_LEN))?;
    let container =
        At4pxContainer::deserialise(&raw[PORTRAIT_PALETTE_LEN..]).map_err(portrait_error)?;
    let tiled = container.decompress().map_err(portrait_error)?;

    let pixels = decode_tile_image(&tiled, RES_PORTRAIT, KAO_PORTRAIT_PIXEL_ORDER_REVERSED)?;

    log::debug!(
        "Entry {} sub-entry {}: {} bytes at 0x{:x}",
        entry,
        subentry,
        entry_len,
        offset
    );

    Portrait::new(palette, pixels).ok_or(FormatError::TiledImageLength {
        expected: RES_PORTRAIT.tiled_len(),
        actual: tiled.len(),
    })
}
