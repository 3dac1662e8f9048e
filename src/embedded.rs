//! Pass-through boundary for BMP files whose pixel data is a complete JPEG
//! or PNG stream (compression codes 4 and 5).
//!
//! The codec never decodes those payloads itself. Register an
//! [`EmbeddedCodec`] on the request to handle them.

use alloc::vec::Vec;

use enough::Stop;

use crate::error::BitmapError;
use crate::pixel::PixelBuffer;
use crate::region::RegionSpec;

/// Format of an embedded payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EmbeddedFormat {
    Jpeg,
    Png,
}

/// External JPEG/PNG codec used for embedded payloads.
pub trait EmbeddedCodec {
    /// Decode `data`, which is exactly the payload slice of the bitmap,
    /// honouring `region` as the bitmap decoder would.
    fn decode(
        &self,
        format: EmbeddedFormat,
        data: &[u8],
        region: &RegionSpec,
        stop: &dyn Stop,
    ) -> Result<PixelBuffer, BitmapError>;

    /// Serialize `image` restricted to `region`.
    fn encode(
        &self,
        format: EmbeddedFormat,
        image: &PixelBuffer,
        region: &RegionSpec,
        stop: &dyn Stop,
    ) -> Result<Vec<u8>, BitmapError>;
}
