//! Region clipping, integer subsampling and band selection.
//!
//! A [`RegionSpec`] is resolved against concrete image dimensions into a
//! [`Geometry`] once per call; the transcoders only ever see the resolved
//! form.

use alloc::vec::Vec;

use crate::error::BitmapError;

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (u64::from(self.x) + u64::from(self.width))
            .min(u64::from(other.x) + u64::from(other.width));
        let y1 = (u64::from(self.y) + u64::from(self.height))
            .min(u64::from(other.y) + u64::from(other.height));
        if x1 <= u64::from(x0) || y1 <= u64::from(y0) {
            return None;
        }
        Some(Rect::new(x0, y0, x1 as u32 - x0, y1 as u32 - y0))
    }
}

/// Which part of an image to read or write, and how.
///
/// The default selects the whole image with no subsampling and all bands,
/// which lets the decoder take the bulk row-copy path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionSpec {
    /// Source rectangle; `None` means the whole image. Clipped to the image.
    pub source: Option<Rect>,
    /// Where the first output pixel lands in the decoded buffer. Ignored
    /// when encoding.
    pub destination_offset: (u32, u32),
    /// Keep every `x`-th column and every `y`-th row. Both must be at least 1.
    pub subsampling: (u32, u32),
    /// Source band indices to read.
    pub source_bands: Option<Vec<usize>>,
    /// Output band position for each entry of `source_bands`.
    pub destination_bands: Option<Vec<usize>>,
}

impl Default for RegionSpec {
    fn default() -> Self {
        Self {
            source: None,
            destination_offset: (0, 0),
            subsampling: (1, 1),
            source_bands: None,
            destination_bands: None,
        }
    }
}

impl RegionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, rect: Rect) -> Self {
        self.source = Some(rect);
        self
    }

    pub fn with_subsampling(mut self, step_x: u32, step_y: u32) -> Self {
        self.subsampling = (step_x, step_y);
        self
    }

    pub fn with_destination_offset(mut self, x: u32, y: u32) -> Self {
        self.destination_offset = (x, y);
        self
    }

    pub fn with_bands(mut self, source: Vec<usize>, destination: Vec<usize>) -> Self {
        self.source_bands = Some(source);
        self.destination_bands = Some(destination);
        self
    }
}

/// Source band `source[i]` lands in output band `dest[i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BandMap {
    pub source: Vec<usize>,
    pub dest: Vec<usize>,
}

/// A [`RegionSpec`] resolved against an image of known size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub width: u32,
    pub height: u32,
    pub source: Rect,
    pub step_x: u32,
    pub step_y: u32,
    /// Output rectangle inside a buffer of `buffer_width` x `buffer_height`.
    pub dest: Rect,
    pub buffer_width: u32,
    pub buffer_height: u32,
    /// `None` when every band is kept in place.
    pub bands: Option<BandMap>,
}

impl Geometry {
    pub fn resolve(
        width: u32,
        height: u32,
        region: &RegionSpec,
        band_count: usize,
    ) -> Result<Self, BitmapError> {
        let (step_x, step_y) = region.subsampling;
        if step_x == 0 || step_y == 0 {
            return Err(BitmapError::InvalidParameter(alloc::format!(
                "subsampling {step_x}x{step_y} must be at least 1x1"
            )));
        }
        let full = Rect::new(0, 0, width, height);
        let source = match region.source {
            Some(rect) => rect.intersect(&full).ok_or_else(|| {
                BitmapError::InvalidParameter(alloc::format!(
                    "source region {rect:?} lies outside a {width}x{height} image"
                ))
            })?,
            None => full,
        };
        let (dx, dy) = region.destination_offset;
        let dest = Rect::new(
            dx,
            dy,
            source.width.div_ceil(step_x),
            source.height.div_ceil(step_y),
        );
        let buffer_width = dx.checked_add(dest.width);
        let buffer_height = dy.checked_add(dest.height);
        let (Some(buffer_width), Some(buffer_height)) = (buffer_width, buffer_height) else {
            return Err(BitmapError::DimensionsTooLarge { width, height });
        };
        Ok(Self {
            width,
            height,
            source,
            step_x,
            step_y,
            dest,
            buffer_width,
            buffer_height,
            bands: resolve_bands(region, band_count)?,
        })
    }

    /// The output covers the whole image one-to-one, so rows can be copied
    /// without any per-pixel mapping.
    pub fn is_identity(&self) -> bool {
        self.bands.is_none()
            && self.dest == Rect::new(0, 0, self.width, self.height)
            && self.buffer_width == self.width
            && self.buffer_height == self.height
    }

    /// Source column feeding output column `i`.
    pub fn source_column(&self, i: u32) -> u32 {
        self.source.x + i * self.step_x
    }

    /// Source row feeding output row `j`.
    pub fn source_row(&self, j: u32) -> u32 {
        self.source.y + j * self.step_y
    }

    /// Output row for source row `y`, if that row is sampled at all.
    pub fn dest_row_for(&self, y: u32) -> Option<u32> {
        let rel = y.checked_sub(self.source.y)?;
        if rel >= self.source.height || rel % self.step_y != 0 {
            return None;
        }
        Some(self.dest.y + rel / self.step_y)
    }

    /// Output band count after band selection.
    pub fn output_bands(&self, band_count: usize) -> usize {
        self.bands.as_ref().map_or(band_count, |b| b.dest.len())
    }
}

fn resolve_bands(region: &RegionSpec, band_count: usize) -> Result<Option<BandMap>, BitmapError> {
    let (source, dest) = match (&region.source_bands, &region.destination_bands) {
        (None, None) => return Ok(None),
        (Some(s), None) => (s.clone(), (0..s.len()).collect()),
        (None, Some(d)) => ((0..d.len()).collect(), d.clone()),
        (Some(s), Some(d)) => (s.clone(), d.clone()),
    };
    if source.is_empty() || source.len() != dest.len() {
        return Err(BitmapError::InvalidParameter(alloc::format!(
            "band lists {source:?} and {dest:?} must be non-empty and of equal length"
        )));
    }
    if let Some(bad) = source.iter().find(|&&b| b >= band_count) {
        return Err(BitmapError::InvalidParameter(alloc::format!(
            "source band {bad} out of range for {band_count} bands"
        )));
    }
    let mut seen = [false; 4];
    for &d in &dest {
        if d >= dest.len() || d >= seen.len() || seen[d] {
            return Err(BitmapError::InvalidParameter(alloc::format!(
                "destination bands {dest:?} must be a permutation of 0..{}",
                dest.len()
            )));
        }
        seen[d] = true;
    }
    let identity = source.len() == band_count
        && source
            .iter()
            .zip(&dest)
            .enumerate()
            .all(|(i, (&s, &d))| s == i && d == i);
    if identity {
        return Ok(None);
    }
    Ok(Some(BandMap { source, dest }))
}
