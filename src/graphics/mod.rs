//! Graphics processing for kaomado portraits
//!
//! Palettes, the tiled 4bpp pixel layout and the decoded portrait record.

pub mod palette;
pub mod portrait;
pub mod tiled;

pub use palette::{Palette, Rgb};
pub use portrait::Portrait;
pub use tiled::{Resolution, RES_PORTRAIT};
