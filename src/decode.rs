use alloc::vec::Vec;

use enough::Stop;

use crate::bmp::header::{BitmapHeader, ColorSpaceType};
use crate::embedded::EmbeddedCodec;
use crate::error::BitmapError;
use crate::limits::Limits;
use crate::pixel::{PixelBuffer, PixelLayout};
use crate::region::RegionSpec;

/// Whether a decode or encode ran to the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Complete,
    /// The stop signal fired between rows. Output holds every row finished
    /// before that point.
    Aborted,
}

/// Non-fatal oddities found while decoding. Each is also logged at warn
/// level.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeWarning {
    /// The header implied more than 256 palette entries; the rest were
    /// dropped.
    PaletteOverflow { declared: usize, retained: usize },
    /// An indexed image had no palette; a gray ramp was substituted.
    MissingPalette { synthesized: usize },
    /// The colour profile location points outside the file.
    ProfileOutOfBounds { offset: u32, size: u32 },
    /// The header declares more compressed data than the file holds.
    PayloadShorterThanDeclared { declared: usize, available: usize },
}

/// Decoded bitmap.
#[derive(Clone, Debug)]
pub struct DecodeOutput {
    pub header: BitmapHeader,
    pub pixels: PixelBuffer,
    pub status: Status,
    pub warnings: Vec<DecodeWarning>,
    /// Indexed image whose palette is entirely gray.
    pub grayscale_palette: bool,
    /// Colour space declared by Windows 4/5 headers.
    pub color_space: Option<ColorSpaceType>,
}

impl DecodeOutput {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn layout(&self) -> &PixelLayout {
        self.pixels.layout()
    }

    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }

    /// Take the pixel buffer, dropping the metadata.
    pub fn into_pixels(self) -> PixelBuffer {
        self.pixels
    }
}

/// Builder for a decode call.
///
/// ```no_run
/// use zenbmp::{DecodeRequest, Rect, RegionSpec, Unstoppable};
///
/// let data: &[u8] = &[]; // BMP bytes
/// let thumb = DecodeRequest::new(data)
///     .with_region(RegionSpec::new().with_source(Rect::new(0, 0, 64, 64)).with_subsampling(4, 4))
///     .decode(Unstoppable)?;
/// # Ok::<(), zenbmp::BitmapError>(())
/// ```
pub struct DecodeRequest<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) limits: Option<&'a Limits>,
    pub(crate) region: RegionSpec,
    pub(crate) embedded: Option<&'a dyn EmbeddedCodec>,
    pub(crate) progress: Option<&'a mut dyn FnMut(f32)>,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            limits: None,
            region: RegionSpec::default(),
            embedded: None,
            progress: None,
        }
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Decode only part of the image, subsampled and/or band-selected.
    pub fn with_region(mut self, region: RegionSpec) -> Self {
        self.region = region;
        self
    }

    /// Codec for bitmaps whose pixel data is a JPEG or PNG stream.
    pub fn with_embedded_codec(mut self, codec: &'a dyn EmbeddedCodec) -> Self {
        self.embedded = Some(codec);
        self
    }

    /// Called once per output row with the percentage done (0-100).
    pub fn with_progress(mut self, progress: &'a mut dyn FnMut(f32)) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Parse the headers only.
    pub fn probe(&self) -> Result<BitmapHeader, BitmapError> {
        crate::bmp::probe(self.data)
    }

    pub fn decode(self, stop: impl Stop) -> Result<DecodeOutput, BitmapError> {
        crate::bmp::decode(self, &stop)
    }
}
