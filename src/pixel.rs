use alloc::vec;
use alloc::vec::Vec;

use crate::embedded::EmbeddedFormat;
use crate::error::BitmapError;

// ── Palette ─────────────────────────────────────────────────────────

/// One palette colour. The on-disk order (B,G,R[,reserved]) is a file
/// concern; in memory entries are plain RGB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PaletteEntry {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl PaletteEntry {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub const fn gray(v: u8) -> Self {
        Self::new(v, v, v)
    }

    pub fn is_gray(&self) -> bool {
        self.red == self.green && self.green == self.blue
    }
}

/// Colour table for indexed images. Decoded palettes never exceed 256
/// entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Largest palette the decoder keeps.
    pub const MAX_ENTRIES: usize = 256;

    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self { entries }
    }

    /// Linear gray ramp with `len` entries spanning 0..=255.
    pub fn grayscale(len: usize) -> Self {
        let entries = match len {
            0 => Vec::new(),
            1 => vec![PaletteEntry::gray(0)],
            n => (0..n)
                .map(|i| PaletteEntry::gray((i * 255 / (n - 1)) as u8))
                .collect(),
        };
        Self { entries }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<PaletteEntry> {
        self.entries.get(index).copied()
    }

    /// True when every entry has R = G = B.
    pub fn is_grayscale(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(PaletteEntry::is_gray)
    }
}

// ── Channel masks ───────────────────────────────────────────────────

/// Bit masks locating each channel inside a 16- or 32-bit pixel word.
/// A zero mask means the channel is absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChannelMasks {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub alpha: u32,
}

impl ChannelMasks {
    /// 16-bit default: 5-5-5 with the top bit unused.
    pub const RGB555: Self = Self::rgb(0x7C00, 0x03E0, 0x001F);
    pub const RGB565: Self = Self::rgb(0xF800, 0x07E0, 0x001F);
    /// 8-8-8 in the low three bytes, no alpha.
    pub const RGB888: Self = Self::rgb(0x00FF_0000, 0x0000_FF00, 0x0000_00FF);
    /// 32-bit default.
    pub const ARGB8888: Self = Self {
        red: 0x00FF_0000,
        green: 0x0000_FF00,
        blue: 0x0000_00FF,
        alpha: 0xFF00_0000,
    };

    pub const fn rgb(red: u32, green: u32, blue: u32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 0,
        }
    }

    /// Masks assumed for plain (non-bitfield) direct colour.
    pub fn default_for(bits_per_pixel: u16) -> Option<Self> {
        match bits_per_pixel {
            16 => Some(Self::RGB555),
            32 => Some(Self::ARGB8888),
            _ => None,
        }
    }

    /// Masks in R, G, B, A order.
    pub fn to_array(&self) -> [u32; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }

    /// Bit width of each channel in R, G, B, A order.
    pub fn widths(&self) -> [u32; 4] {
        self.to_array().map(u32::count_ones)
    }

    /// Number of channels with a non-zero mask.
    pub fn channel_count(&self) -> usize {
        self.to_array().iter().filter(|m| **m != 0).count()
    }

    /// Every non-zero mask is one contiguous run of bits and no two overlap.
    pub fn is_well_formed(&self) -> bool {
        let masks = self.to_array();
        let contiguous = masks.iter().all(|&m| {
            let run = m.checked_shr(m.trailing_zeros()).unwrap_or(0);
            run & run.wrapping_add(1) == 0
        });
        let mut seen = 0u32;
        for m in masks {
            if seen & m != 0 {
                return false;
            }
            seen |= m;
        }
        contiguous
    }

    /// Extract channel `mask` from `word`, right-aligned.
    pub fn extract(word: u32, mask: u32) -> u32 {
        if mask == 0 {
            return 0;
        }
        (word & mask) >> mask.trailing_zeros()
    }

    /// Place a right-aligned channel value into `mask`'s position.
    pub fn insert(value: u32, mask: u32) -> u32 {
        if mask == 0 {
            return 0;
        }
        (value << mask.trailing_zeros()) & mask
    }
}

// ── Layout ──────────────────────────────────────────────────────────

/// How pixels are laid out, both in a decoded [`PixelBuffer`] and in an
/// encoder source.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// Palette indices at 1, 4 or 8 bits per pixel.
    Indexed { bits_per_pixel: u8, palette: Palette },
    /// 8-bit gray samples. Encoder input only; written as an indexed image
    /// with a gray ramp.
    Grayscale { bits_per_pixel: u8 },
    /// Interleaved 8-bit samples in B,G,R order. `bands` is 3 unless a band
    /// subset was requested.
    Bgr { bands: u8 },
    /// One 16- or 32-bit word per pixel with channels located by masks.
    DirectMasked { bits_per_pixel: u8, masks: ChannelMasks },
    /// The pixel data is a JPEG or PNG stream. Never the layout of a buffer.
    EmbeddedCompressed { format: EmbeddedFormat },
}

/// Sample lane width used by a layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    U8,
    U16,
    U32,
}

impl PixelLayout {
    pub const BGR24: Self = Self::Bgr { bands: 3 };

    /// Bits one pixel occupies in memory (and on disk for uncompressed data).
    pub fn bits_per_pixel(&self) -> u16 {
        match self {
            Self::Indexed { bits_per_pixel, .. }
            | Self::Grayscale { bits_per_pixel }
            | Self::DirectMasked { bits_per_pixel, .. } => u16::from(*bits_per_pixel),
            Self::Bgr { bands } => u16::from(*bands) * 8,
            Self::EmbeddedCompressed { .. } => 0,
        }
    }

    /// Number of addressable bands per pixel.
    pub fn bands(&self) -> usize {
        match self {
            Self::Indexed { .. } | Self::Grayscale { .. } => 1,
            Self::Bgr { bands } => usize::from(*bands),
            Self::DirectMasked { masks, .. } => masks.channel_count(),
            Self::EmbeddedCompressed { .. } => 0,
        }
    }

    pub fn lane(&self) -> Option<Lane> {
        match self {
            Self::Indexed { .. } | Self::Grayscale { .. } | Self::Bgr { .. } => Some(Lane::U8),
            Self::DirectMasked {
                bits_per_pixel: 16, ..
            } => Some(Lane::U16),
            Self::DirectMasked {
                bits_per_pixel: 32, ..
            } => Some(Lane::U32),
            _ => None,
        }
    }

    pub fn palette(&self) -> Option<&Palette> {
        match self {
            Self::Indexed { palette, .. } => Some(palette),
            _ => None,
        }
    }

    /// Lane elements in one row of `width` pixels.
    pub fn row_lanes(&self, width: u32) -> Option<usize> {
        let w = width as usize;
        match self {
            Self::Indexed { bits_per_pixel, .. } if *bits_per_pixel < 8 => w
                .checked_mul(usize::from(*bits_per_pixel))
                .map(|bits| bits.div_ceil(8)),
            Self::Indexed { .. } | Self::Grayscale { .. } | Self::DirectMasked { .. } => Some(w),
            Self::Bgr { bands } => w.checked_mul(usize::from(*bands)),
            Self::EmbeddedCompressed { .. } => None,
        }
    }

    /// Bytes a `width` x `height` buffer of this layout needs.
    pub fn buffer_bytes(&self, width: u32, height: u32) -> Option<usize> {
        let lane_bytes = match self.lane()? {
            Lane::U8 => 1,
            Lane::U16 => 2,
            Lane::U32 => 4,
        };
        self.row_lanes(width)?
            .checked_mul(height as usize)?
            .checked_mul(lane_bytes)
    }

    fn validate(&self) -> Result<(), BitmapError> {
        let ok = match self {
            Self::Indexed { bits_per_pixel, .. } => matches!(bits_per_pixel, 1 | 4 | 8),
            Self::Grayscale { bits_per_pixel } => *bits_per_pixel == 8,
            Self::Bgr { bands } => (1..=3).contains(bands),
            Self::DirectMasked { bits_per_pixel, .. } => matches!(bits_per_pixel, 16 | 32),
            Self::EmbeddedCompressed { .. } => false,
        };
        if ok {
            Ok(())
        } else {
            Err(BitmapError::InvalidParameter(alloc::format!(
                "{self:?} cannot back a pixel buffer"
            )))
        }
    }
}

// ── Samples ─────────────────────────────────────────────────────────

/// Raw sample storage of a [`PixelBuffer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Samples {
    fn zeroed(lane: Lane, len: usize) -> Self {
        match lane {
            Lane::U8 => Samples::U8(vec![0; len]),
            Lane::U16 => Samples::U16(vec![0; len]),
            Lane::U32 => Samples::U32(vec![0; len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::U16(v) => v.len(),
            Samples::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lane(&self) -> Lane {
        match self {
            Samples::U8(_) => Lane::U8,
            Samples::U16(_) => Lane::U16,
            Samples::U32(_) => Lane::U32,
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            Samples::U8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            Samples::U16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            Samples::U32(v) => Some(v),
            _ => None,
        }
    }
}

// ── Pixel buffer ────────────────────────────────────────────────────

/// A width x height grid of samples, rows stored top-down.
///
/// Storage per layout: 1- and 4-bit indices are packed MSB-first, one row
/// every `stride` bytes; 8-bit indices, gray and BGR samples take one byte
/// each; 16- and 32-bit direct colour takes one `u16`/`u32` word per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    stride: usize,
    samples: Samples,
}

impl PixelBuffer {
    /// Zero-filled buffer.
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Result<Self, BitmapError> {
        layout.validate()?;
        let lane = layout.lane().ok_or_else(|| {
            BitmapError::InvalidParameter(alloc::format!("{layout:?} has no sample lane"))
        })?;
        let stride = layout
            .row_lanes(width)
            .ok_or(BitmapError::DimensionsTooLarge { width, height })?;
        let len = stride
            .checked_mul(height as usize)
            .ok_or(BitmapError::DimensionsTooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            layout,
            stride,
            samples: Samples::zeroed(lane, len),
        })
    }

    /// Wrap caller-provided samples with a tightly packed stride.
    pub fn from_samples(
        width: u32,
        height: u32,
        layout: PixelLayout,
        samples: Samples,
    ) -> Result<Self, BitmapError> {
        layout.validate()?;
        if layout.lane() != Some(samples.lane()) {
            return Err(BitmapError::InvalidParameter(alloc::format!(
                "{:?} samples do not match {layout:?}",
                samples.lane()
            )));
        }
        let stride = layout
            .row_lanes(width)
            .ok_or(BitmapError::DimensionsTooLarge { width, height })?;
        let needed = stride
            .checked_mul(height as usize)
            .ok_or(BitmapError::DimensionsTooLarge { width, height })?;
        if samples.len() < needed {
            return Err(BitmapError::BufferTooSmall {
                needed,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            stride,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> &PixelLayout {
        &self.layout
    }

    /// Lane elements between the starts of consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut Samples {
        &mut self.samples
    }

    pub fn into_samples(self) -> Samples {
        self.samples
    }

    /// Read one sample. For indexed and gray images `band` must be 0 and the
    /// result is the index or gray value; for BGR it selects the byte; for
    /// direct colour `band` must be 0 and the whole word is returned.
    pub fn sample(&self, x: u32, y: u32, band: usize) -> Option<u32> {
        if x >= self.width || y >= self.height || band >= self.lanes_per_pixel() {
            return None;
        }
        let row = y as usize * self.stride;
        let x = x as usize;
        match (&self.samples, &self.layout) {
            (Samples::U8(v), PixelLayout::Indexed { bits_per_pixel, .. }) if *bits_per_pixel < 8 => {
                let bits = usize::from(*bits_per_pixel);
                let (byte, shift) = packed_position(x, bits);
                Some(u32::from(v[row + byte] >> shift) & ((1 << bits) - 1))
            }
            (Samples::U8(v), _) => Some(u32::from(v[row + x * self.lanes_per_pixel() + band])),
            (Samples::U16(v), _) => Some(u32::from(v[row + x])),
            (Samples::U32(v), _) => Some(v[row + x]),
        }
    }

    /// Write one sample; see [`PixelBuffer::sample`] for addressing. Values
    /// are truncated to the lane width. Out-of-range positions are ignored.
    pub fn set_sample(&mut self, x: u32, y: u32, band: usize, value: u32) {
        if x >= self.width || y >= self.height || band >= self.lanes_per_pixel() {
            return;
        }
        let lanes = self.lanes_per_pixel();
        let row = y as usize * self.stride;
        let x = x as usize;
        match (&mut self.samples, &self.layout) {
            (Samples::U8(v), PixelLayout::Indexed { bits_per_pixel, .. }) if *bits_per_pixel < 8 => {
                let bits = usize::from(*bits_per_pixel);
                let (byte, shift) = packed_position(x, bits);
                let mask = (((1u32 << bits) - 1) as u8) << shift;
                let b = &mut v[row + byte];
                *b = (*b & !mask) | (((value as u8) << shift) & mask);
            }
            (Samples::U8(v), _) => v[row + x * lanes + band] = value as u8,
            (Samples::U16(v), _) => v[row + x] = value as u16,
            (Samples::U32(v), _) => v[row + x] = value,
        }
    }

    /// Lane elements addressed per pixel by [`PixelBuffer::sample`].
    fn lanes_per_pixel(&self) -> usize {
        match self.layout {
            PixelLayout::Bgr { bands } => usize::from(bands),
            _ => 1,
        }
    }

    /// Reinterpret 8-bit samples as typed pixels (e.g. `rgb::alt::BGR8` for
    /// a three-band BGR buffer). Only tightly packed U8 buffers qualify.
    #[cfg(feature = "rgb")]
    pub fn as_pixels<P>(&self) -> Result<&[P], BitmapError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        use rgb::AsPixels as _;
        let bytes = self.samples.as_u8().ok_or_else(|| {
            BitmapError::InvalidParameter(alloc::string::String::from(
                "typed views need 8-bit samples",
            ))
        })?;
        let bands = self.lanes_per_pixel();
        let packed = !matches!(self.layout, PixelLayout::Indexed { bits_per_pixel, .. } if bits_per_pixel < 8);
        if !packed || core::mem::size_of::<P>() != bands {
            return Err(BitmapError::InvalidParameter(alloc::format!(
                "pixel type of {} bytes does not match {:?}",
                core::mem::size_of::<P>(),
                self.layout
            )));
        }
        Ok(bytes.as_pixels())
    }

    /// Zero-copy [`imgref::ImgRef`] view of typed pixels.
    #[cfg(feature = "imgref")]
    pub fn as_imgref<P>(&self) -> Result<imgref::ImgRef<'_, P>, BitmapError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        let pixels: &[P] = self.as_pixels()?;
        Ok(imgref::ImgRef::new(
            pixels,
            self.width as usize,
            self.height as usize,
        ))
    }
}

/// Byte offset and right shift of pixel `x` in an MSB-first packed row.
pub(crate) fn packed_position(x: usize, bits: usize) -> (usize, u32) {
    let bit = x * bits;
    (bit / 8, (8 - bits - bit % 8) as u32)
}
