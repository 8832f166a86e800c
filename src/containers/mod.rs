pub mod compression;

use crate::error::CompressionError;

pub trait CompressionContainer {
    fn decompress(&self) -> Result<Vec<u8>, CompressionError>;
}

pub trait ContainerHandler: Sized {
    fn magic_word() -> &'static [u8];
    fn matches(data: &[u8]) -> bool {
        data.starts_with(Self::magic_word())
    }
    fn deserialise(data: &[u8]) -> Result<Self, CompressionError>;
}
