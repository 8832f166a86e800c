//! Reading, writing and unpacking of the kaomado portrait container used by Pokémon Mystery
//! Dungeon: Explorers of Sky.

pub mod binary_utils;
pub mod containers;
pub mod error;
pub mod graphics;
pub mod image_io;
pub mod kaomado;
pub mod progress;

pub use error::{CompressionError, FormatError, ImageIoError, KaoError};
pub use graphics::{Palette, Portrait, Rgb};
pub use image_io::ImageFormat;
pub use kaomado::{
    ExportOptions, ImportReport, KaoLayout, Kaomado, NameTable, SubEntry, TocPointer, WriteOptions,
};
pub use progress::{JsonProgressFile, LogProgress, NoProgress, Phase, ProgressObserver};
