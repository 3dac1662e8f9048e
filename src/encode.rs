use alloc::vec::Vec;

use enough::Stop;

use crate::decode::Status;
use crate::embedded::EmbeddedCodec;
use crate::error::BitmapError;
use crate::limits::Limits;
use crate::pixel::PixelBuffer;
use crate::region::RegionSpec;

/// Requested output compression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompressionPreference {
    /// Bitfields for direct colour with non-default masks, otherwise none.
    #[default]
    Auto,
    None,
    /// RLE8 for 8-bit indexed or gray sources, RLE4 for 4-bit indexed.
    Rle,
    Bitfields,
    /// Hand the pixels to the registered embedded codec.
    Jpeg,
    Png,
}

/// Order rows are written in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RowOrder {
    #[default]
    BottomUp,
    /// Only honoured for uncompressed and bitfield output.
    TopDown,
}

/// Encoded bitmap bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeOutput {
    pub data: Vec<u8>,
    pub status: Status,
}

impl EncodeOutput {
    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Builder for an encode call. Output always uses the 40-byte Windows 3
/// info header.
///
/// ```
/// use zenbmp::{CompressionPreference, EncodeRequest, Palette, PixelBuffer, PixelLayout, Unstoppable};
///
/// let layout = PixelLayout::Indexed { bits_per_pixel: 8, palette: Palette::grayscale(256) };
/// let image = PixelBuffer::new(16, 16, layout)?;
/// let out = EncodeRequest::new()
///     .with_compression(CompressionPreference::Rle)
///     .encode(&image, Unstoppable)?;
/// assert_eq!(&out.data[..2], b"BM");
/// # Ok::<(), zenbmp::BitmapError>(())
/// ```
pub struct EncodeRequest<'a> {
    pub(crate) compression: CompressionPreference,
    pub(crate) row_order: RowOrder,
    pub(crate) region: RegionSpec,
    pub(crate) resolution: (i32, i32),
    pub(crate) limits: Option<&'a Limits>,
    pub(crate) embedded: Option<&'a dyn EmbeddedCodec>,
    pub(crate) progress: Option<&'a mut dyn FnMut(f32)>,
}

impl Default for EncodeRequest<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> EncodeRequest<'a> {
    /// 72 DPI expressed in pixels per metre.
    pub const DEFAULT_RESOLUTION: i32 = 2835;

    pub fn new() -> Self {
        Self {
            compression: CompressionPreference::Auto,
            row_order: RowOrder::BottomUp,
            region: RegionSpec::default(),
            resolution: (Self::DEFAULT_RESOLUTION, Self::DEFAULT_RESOLUTION),
            limits: None,
            embedded: None,
            progress: None,
        }
    }

    pub fn with_compression(mut self, compression: CompressionPreference) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    /// Encode only part of the source, subsampled and/or band-selected.
    /// The destination offset is ignored.
    pub fn with_region(mut self, region: RegionSpec) -> Self {
        self.region = region;
        self
    }

    /// Horizontal and vertical resolution in pixels per metre.
    pub fn with_resolution(mut self, x_pixels_per_meter: i32, y_pixels_per_meter: i32) -> Self {
        self.resolution = (x_pixels_per_meter, y_pixels_per_meter);
        self
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_embedded_codec(mut self, codec: &'a dyn EmbeddedCodec) -> Self {
        self.embedded = Some(codec);
        self
    }

    /// Called once per written row with the percentage done (0-100).
    pub fn with_progress(mut self, progress: &'a mut dyn FnMut(f32)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn encode(self, image: &PixelBuffer, stop: impl Stop) -> Result<EncodeOutput, BitmapError> {
        let mut data = Vec::new();
        let status = self.encode_into(image, &mut data, stop)?;
        Ok(EncodeOutput { data, status })
    }

    /// Append the bitmap to `sink`. Nothing is appended when the request is
    /// rejected.
    pub fn encode_into(
        self,
        image: &PixelBuffer,
        sink: &mut Vec<u8>,
        stop: impl Stop,
    ) -> Result<Status, BitmapError> {
        crate::bmp::encode(self, image, sink, &stop)
    }
}
