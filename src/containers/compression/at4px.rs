use crate::binary_utils::{checked_slice, read_u16_le};
use crate::containers::{CompressionContainer, ContainerHandler};
use crate::error::CompressionError;

use super::px::{self, PxCompLevel, PX_NB_CONTROL_FLAGS};

// At4pxContainer is a specialised compression container used for compressed image data for
// Pokémon portrait sprites. Its payload is a PX stream.

pub const AT4PX_CONTAINER_HEADER_SIZE: usize = 0x12;

const AT4PX_LENGTH_OFFSET: usize = 5;
const AT4PX_FLAGS_OFFSET: usize = 7;
const AT4PX_DECOMPRESSED_SIZE_OFFSET: usize = 0x10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct At4pxContainer {
    pub container_length: u16,
    pub control_flags: [u8; PX_NB_CONTROL_FLAGS],
    pub decompressed_size: u16,
    pub compressed_data: Vec<u8>,
}

impl At4pxContainer {
    /// Reads only the declared container length (header included) from the start of `data`.
    pub fn read_container_length(data: &[u8]) -> Result<usize, CompressionError> {
        if data.len() < AT4PX_LENGTH_OFFSET + 2 {
            return Err(CompressionError::TooShort {
                what: "AT4PX container size",
                len: data.len(),
            });
        }

        if !Self::matches(data) {
            return Err(CompressionError::InvalidMagic { expected: "AT4PX" });
        }

        let container_length = read_u16_le(data, AT4PX_LENGTH_OFFSET)
            .ok_or(CompressionError::UnexpectedEnd(AT4PX_LENGTH_OFFSET))?
            as usize;

        if container_length < AT4PX_CONTAINER_HEADER_SIZE {
            return Err(CompressionError::LengthBelowHeader(container_length));
        }

        Ok(container_length)
    }

    /// Compresses raw image bytes into a new container.
    pub fn compress(
        data: &[u8],
        level: PxCompLevel,
        aggressive_search: bool,
    ) -> Result<Self, CompressionError> {
        let decompressed_size =
            u16::try_from(data.len()).map_err(|_| CompressionError::InputTooLong(data.len()))?;

        let output = px::compress(data, level, aggressive_search)?;
        let total = AT4PX_CONTAINER_HEADER_SIZE + output.data.len();
        let container_length =
            u16::try_from(total).map_err(|_| CompressionError::OutputTooLong(total))?;

        Ok(At4pxContainer {
            container_length,
            control_flags: output.control_flags,
            decompressed_size,
            compressed_data: output.data,
        })
    }

    /// Appends the header and payload to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(Self::magic_word());
        out.extend_from_slice(&self.container_length.to_le_bytes());
        out.extend_from_slice(&self.control_flags);
        out.extend_from_slice(&self.decompressed_size.to_le_bytes());
        out.extend_from_slice(&self.compressed_data);
    }

    pub fn len(&self) -> usize {
        self.container_length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.compressed_data.is_empty()
    }
}

impl ContainerHandler for At4pxContainer {
    fn magic_word() -> &'static [u8] {
        b"AT4PX"
    }

    // Converts raw binary data to At4pxContainer
    fn deserialise(data: &[u8]) -> Result<Self, CompressionError> {
        if data.len() < AT4PX_CONTAINER_HEADER_SIZE {
            return Err(CompressionError::TooShort {
                what: "AT4PX header",
                len: data.len(),
            });
        }

        let container_length = Self::read_container_length(data)?;
        let compressed_data = checked_slice(data, AT4PX_CONTAINER_HEADER_SIZE..container_length)
            .ok_or(CompressionError::LengthExceedsData {
                declared: container_length,
                available: data.len(),
            })?
            .to_vec();

        let mut control_flags = [0u8; PX_NB_CONTROL_FLAGS];
        control_flags.copy_from_slice(
            &data[AT4PX_FLAGS_OFFSET..AT4PX_FLAGS_OFFSET + PX_NB_CONTROL_FLAGS],
        );

        let decompressed_size = read_u16_le(data, AT4PX_DECOMPRESSED_SIZE_OFFSET)
            .ok_or(CompressionError::UnexpectedEnd(AT4PX_DECOMPRESSED_SIZE_OFFSET))?;

        Ok(At4pxContainer {
            container_length: container_length as u16,
            control_flags,
            decompressed_size,
            compressed_data,
        })
    }
}

impl CompressionContainer for At4pxContainer {
    fn decompress(&self) -> Result<Vec<u8>, CompressionError> {
        let decompressed = px::PxDecompressor::new(&self.compressed_data, &self.control_flags)
            .with_capacity(self.decompressed_size as usize)
            .decompress()?;

        if decompressed.len() != self.decompressed_size as usize {
            return Err(CompressionError::SizeMismatch {
                expected: self.decompressed_size as usize,
                actual: decompressed.len(),
            });
        }

        Ok(decompressed)
    }
}
