use crate::binary_utils::{next_multiple_of_16, write_i32_le};
use crate::containers::compression::at4px::{At4pxContainer, AT4PX_CONTAINER_HEADER_SIZE};
use crate::containers::compression::px::PxCompLevel;
use crate::error::KaoError;
use crate::graphics::palette::{write_palette, PORTRAIT_PALETTE_LEN};
use crate::graphics::tiled::{encode_tile_image, KAO_PORTRAIT_PIXEL_ORDER_REVERSED};
use crate::graphics::Portrait;
use crate::progress::{NoProgress, Phase, ProgressObserver};

use super::{Kaomado, TocPointer, COMMON_PADDING_BYTE, SUBENTRY_LEN};

/// Compression settings used when building a kaomado file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub level: PxCompLevel,
    /// Look for repeated sequences before trying the nibble patterns.
    pub aggressive_search: bool,
}

/// Worst case sizes computed before writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeEstimate {
    /// Length of the whole file if no portrait compressed at all.
    pub total: usize,
    /// Largest single portrait estimate, used to size the scratch buffer.
    pub biggest_image: usize,
}

impl Kaomado {
    /// Worst case output length, counting every portrait as palette, header and twice its raw
    /// size to leave room for command bytes.
    pub fn estimate_output_len(&self) -> SizeEstimate {
        let mut estimate = SizeEstimate {
            total: self.toc_len_bytes(),
            biggest_image: 0,
        };

        for (_, _, portrait) in self.portraits() {
            let raw = portrait.raw_len();
            let image_len = PORTRAIT_PALETTE_LEN + AT4PX_CONTAINER_HEADER_SIZE + raw + raw;
            estimate.biggest_image = estimate.biggest_image.max(image_len);
            estimate.total += image_len;
        }

        estimate
    }

    /// Builds the kaomado file.
    pub fn serialize(&self, options: &WriteOptions) -> Result<Vec<u8>, KaoError> {
        self.serialize_with_progress(options, &mut NoProgress)
    }

    pub fn serialize_with_progress(
        &self,
        options: &WriteOptions,
        progress: &mut dyn ProgressObserver,
    ) -> Result<Vec<u8>, KaoError> {
        // A store with only unreferenced portraits would still produce an all-null table
        if self.toc.is_empty() || self.portraits().next().is_none() {
            return Err(KaoError::EmptyContainer);
        }

        let toc_len = self.toc_len_bytes();
        let estimate = self.estimate_output_len();
        let capacity = next_multiple_of_16(estimate.total);

        if let Some((entry, _, _)) = self.portraits().next() {
            if entry > 1 {
                log::warn!(
                    "First portrait is in entry {}; readers expect entry 1 to hold the first pointer",
                    entry
                );
            }
        }

        let mut output = Vec::with_capacity(capacity);
        output.resize(toc_len, 0u8);
        let mut scratch = Vec::with_capacity(estimate.biggest_image);

        // Empty slots repeat the negated end offset of the last portrait written
        let mut last_valid_end = TocPointer::Empty;
        let entry_count = self.toc.len();

        log::info!(
            "Building kaomado: {} entries, {} portraits",
            entry_count,
            self.portraits().count()
        );

        for (entry_idx, entry) in self.toc.iter().enumerate() {
            for (subentry_idx, slot) in entry.subentries.iter().enumerate() {
                let portrait = slot.index().and_then(|idx| self.store.get(idx));

                let pointer = match portrait {
                    Some(portrait) => {
                        let start = file_offset(output.len())?;
                        write_a_portrait(portrait, &mut output, &mut scratch, options)?;

                        if output.len() > capacity {
                            return Err(KaoError::CapacityExceeded {
                                required: output.len(),
                                capacity,
                            });
                        }

                        last_valid_end = TocPointer::LegacyEmptyMarker(file_offset(output.len())?);
                        TocPointer::Valid(start)
                    }
                    None => last_valid_end,
                };

                let toc_pos = (entry_idx * self.subentry_count + subentry_idx) * SUBENTRY_LEN;
                write_toc_pointer(&mut output, toc_pos, pointer)?;
            }

            progress.on_progress(Phase::Building, entry_idx + 1, entry_count);
        }

        // Align the end of the file on 16 bytes
        let padded_len = next_multiple_of_16(output.len());
        output.resize(padded_len, COMMON_PADDING_BYTE);

        log::info!("Built kaomado of {} bytes", output.len());
        Ok(output)
    }
}

/// Appends palette and AT4PX container for one portrait.
fn write_a_portrait(
    portrait: &Portrait,
    output: &mut Vec<u8>,
    scratch: &mut Vec<u8>,
    options: &WriteOptions,
) -> Result<(), KaoError> {
    write_palette(portrait.palette(), output);

    scratch.clear();
    encode_tile_image(
        portrait.pixels(),
        portrait.resolution(),
        KAO_PORTRAIT_PIXEL_ORDER_REVERSED,
        scratch,
    );

    let container = At4pxContainer::compress(scratch, options.level, options.aggressive_search)?;
    container.write_to(output);
    Ok(())
}

fn write_toc_pointer(output: &mut [u8], pos: usize, pointer: TocPointer) -> Result<(), KaoError> {
    if write_i32_le(output, pointer.to_raw(), pos) {
        Ok(())
    } else {
        Err(KaoError::TocSlotOutOfRange {
            pos,
            len: output.len(),
        })
    }
}

fn file_offset(len: usize) -> Result<u32, KaoError> {
    i32::try_from(len)
        .map(|offset| offset as u32)
        .map_err(|_| KaoError::CapacityExceeded {
            required: len,
            capacity: i32::MAX as usize,
        })
}
