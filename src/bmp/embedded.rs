//! Framing for JPEG/PNG payloads carried inside a bitmap container.

use alloc::vec::Vec;

use enough::Stop;

use super::header::BitmapHeader;
use crate::embedded::{EmbeddedCodec, EmbeddedFormat};
use crate::error::BitmapError;
use crate::pixel::PixelBuffer;
use crate::region::RegionSpec;

/// The embedded stream: `image_size` bytes at the pixel data offset, or
/// everything after the offset when the size is not declared.
pub(crate) fn payload<'d>(header: &BitmapHeader, data: &'d [u8]) -> Result<&'d [u8], BitmapError> {
    let start = header.pixel_data_offset as usize;
    let rest = data.get(start..).ok_or_else(BitmapError::eof)?;
    if header.image_size == 0 {
        return Ok(rest);
    }
    rest.get(..header.image_size as usize)
        .ok_or_else(BitmapError::eof)
}

pub(crate) fn decode(
    header: &BitmapHeader,
    data: &[u8],
    format: EmbeddedFormat,
    region: &RegionSpec,
    codec: Option<&dyn EmbeddedCodec>,
    stop: &dyn Stop,
) -> Result<PixelBuffer, BitmapError> {
    let codec = codec.ok_or(BitmapError::MissingEmbeddedCodec(format))?;
    let bytes = payload(header, data)?;
    log::debug!("delegating {}-byte {format:?} payload", bytes.len());
    codec.decode(format, bytes, region, stop)
}

/// Serialize `image` through the delegate, returning the raw stream.
pub(crate) fn encode(
    image: &PixelBuffer,
    format: EmbeddedFormat,
    region: &RegionSpec,
    codec: &dyn EmbeddedCodec,
    stop: &dyn Stop,
) -> Result<Vec<u8>, BitmapError> {
    let bytes = codec.encode(format, image, region, stop)?;
    log::debug!("embedded {format:?} codec produced {} bytes", bytes.len());
    Ok(bytes)
}
