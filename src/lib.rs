//! # zenbmp
//!
//! Windows and OS/2 BMP decoder and encoder.
//!
//! ## Supported Files
//!
//! - **Headers**: OS/2 core (12 bytes), Windows 3 info (40 bytes, with the
//!   NT bitfield extension), Windows 4 (108 bytes) and Windows 5 (124 bytes)
//! - **Depths**: 1, 4 and 8-bit indexed; 16 and 32-bit direct colour with
//!   default or declared channel masks; 24-bit BGR
//! - **Compression**: none, RLE8, RLE4, bitfields; JPEG and PNG payloads are
//!   handed to a caller-supplied [`EmbeddedCodec`]
//!
//! Decoding can be restricted to a source rectangle, subsampled by integer
//! steps and limited to a subset of bands. Files that end inside the pixel
//! data still yield every row decoded so far through
//! [`BitmapError::partial`].
//!
//! ## Non-Goals
//!
//! - Colour management (profiles are carried, never applied)
//! - Icon and cursor containers
//! - Writing OS/2 or Windows 4/5 headers
//!
//! ## Usage
//!
//! ```no_run
//! use zenbmp::{CompressionPreference, DecodeRequest, EncodeRequest, Unstoppable};
//!
//! let data: &[u8] = &[]; // your BMP bytes
//!
//! // Headers only
//! let header = zenbmp::probe(data)?;
//! println!("{}x{} at {} bpp", header.image_width(), header.image_height(), header.bits_per_pixel);
//!
//! let decoded = DecodeRequest::new(data).decode(Unstoppable)?;
//! for warning in &decoded.warnings {
//!     eprintln!("{warning:?}");
//! }
//!
//! let encoded = EncodeRequest::new()
//!     .with_compression(CompressionPreference::Auto)
//!     .encode(&decoded.pixels, Unstoppable)?;
//! # Ok::<(), zenbmp::BitmapError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod bmp;
mod decode;
mod embedded;
mod encode;
mod error;
mod limits;
mod pixel;
mod region;

// Re-exports
pub use bmp::header::{
    BitmapHeader, Calibration, ColorSpaceType, Compression, Dialect, ProfileLocation,
};
pub use decode::{DecodeOutput, DecodeRequest, DecodeWarning, Status};
pub use embedded::{EmbeddedCodec, EmbeddedFormat};
pub use encode::{CompressionPreference, EncodeOutput, EncodeRequest, RowOrder};
pub use enough::{Stop, Unstoppable};
pub use error::BitmapError;
pub use limits::Limits;
pub use pixel::{ChannelMasks, Lane, Palette, PaletteEntry, PixelBuffer, PixelLayout, Samples};
pub use region::{Rect, RegionSpec};

/// Parse the file and info headers (and palette) without touching pixels.
pub fn probe(data: &[u8]) -> Result<BitmapHeader, BitmapError> {
    bmp::probe(data)
}

/// Decode a whole bitmap with default settings.
pub fn decode(data: &[u8], stop: impl Stop) -> Result<DecodeOutput, BitmapError> {
    DecodeRequest::new(data).decode(stop)
}

/// Encode `image` with automatic compression, bottom-up rows and 72 DPI.
pub fn encode(image: &PixelBuffer, stop: impl Stop) -> Result<EncodeOutput, BitmapError> {
    EncodeRequest::new().encode(image, stop)
}
