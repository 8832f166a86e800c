use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised by the PX codec and the AT4PX container wrapping it.
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("invalid magic number (expected '{expected}')")]
    InvalidMagic { expected: &'static str },

    #[error("data too short for {what}: {len} bytes")]
    TooShort { what: &'static str, len: usize },

    #[error("container length ({declared}) exceeds available data ({available})")]
    LengthExceedsData { declared: usize, available: usize },

    #[error("container length ({0}) is smaller than its header")]
    LengthBelowHeader(usize),

    #[error("unexpected end of compressed data at byte {0}")]
    UnexpectedEnd(usize),

    #[error("sequence to copy out of bounds: offset {offset} with {available} bytes decoded")]
    BackReferenceOutOfBounds { offset: isize, available: usize },

    #[error("input of {0} bytes is too long for PX compression")]
    InputTooLong(usize),

    #[error("compressed size {0} overflows the 16 bit container length")]
    OutputTooLong(usize),

    #[error("decompressed {actual} bytes but the header declares {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Errors raised while interpreting a buffer as a kaomado container.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("the entire kaomado is null")]
    EmptyContainer,

    #[error("first null entry has unexpected length of {0} bytes")]
    UnexpectedEntryLength(usize),

    #[error("first table of contents pointer is not a valid offset: {0}")]
    InvalidFirstPointer(i32),

    #[error("table of contents of {toc_len} bytes runs past the end of a {data_len} byte buffer")]
    TruncatedToc { toc_len: usize, data_len: usize },

    #[error("portrait at entry {entry}, sub-entry {subentry} spans {start}..{end} outside a {data_len} byte buffer")]
    PortraitOutOfBounds {
        entry: usize,
        subentry: usize,
        start: usize,
        end: usize,
        data_len: usize,
    },

    #[error("portrait at entry {entry}, sub-entry {subentry} could not be decoded: {source}")]
    Portrait {
        entry: usize,
        subentry: usize,
        #[source]
        source: CompressionError,
    },

    #[error("tiled image holds {actual} bytes, expected {expected}")]
    TiledImageLength { expected: usize, actual: usize },
}

/// Errors raised by the on-disk image importers and exporters.
#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("{path}: image is {width}x{height}, expected {expected_width}x{expected_height}")]
    Dimensions {
        path: PathBuf,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("{path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    #[error("{path}: image uses {colours} colours, at most 16 fit a portrait palette")]
    TooManyColours { path: PathBuf, colours: usize },

    #[error("{path}: missing palette file {palette}")]
    MissingPalette { path: PathBuf, palette: PathBuf },

    #[error("PNG decoding failed: {0}")]
    PngDecode(#[from] png::DecodingError),

    #[error("PNG encoding failed: {0}")]
    PngEncode(#[from] png::EncodingError),

    #[error("image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("PNG optimisation failed: {0}")]
    Optimise(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Top level error of the kaomado engine.
#[derive(Debug, Error)]
pub enum KaoError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("nothing to write in the output kaomado file")]
    EmptyContainer,

    #[error("the index of {file} in folder {folder} exceeds the number of slots available ({max})")]
    IndexOutOfRange {
        folder: String,
        file: String,
        max: usize,
    },

    #[error("{0} doesn't look like a BMP, RAW or PNG image")]
    UnsupportedImageType(PathBuf),

    #[error("output grew to {required} bytes, past the {capacity} byte worst case estimate")]
    CapacityExceeded { required: usize, capacity: usize },

    #[error("entry {entry}, sub-entry {subentry} is outside a {entries}x{subentries} table of contents")]
    SlotOutOfRange {
        entry: usize,
        subentry: usize,
        entries: usize,
        subentries: usize,
    },

    #[error("table of contents slot at {pos} is past the {len} byte output")]
    TocSlotOutOfRange { pos: usize, len: usize },

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error(transparent)]
    Image(#[from] ImageIoError),

    #[error("failed to read names file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
