//! Bitmap writer.
//!
//! Every request is validated and planned before the first byte is
//! appended. Output always carries a 40-byte Windows 3 info header; the
//! file size and image size fields are patched once the payload is known.

use alloc::vec::Vec;

use enough::Stop;

use super::header::{Compression, FILE_HEADER_SIZE, INFO_HEADER_SIZE};
use super::monitor::RowMonitor;
use super::scanline::{pack_indices, pad_row};
use super::utils::{padded_row_bytes, rescale_bits};
use super::{embedded, rle};
use crate::decode::Status;
use crate::embedded::EmbeddedFormat;
use crate::encode::{CompressionPreference, EncodeRequest, RowOrder};
use crate::error::BitmapError;
use crate::pixel::{ChannelMasks, Palette, PixelBuffer, PixelLayout};
use crate::region::Geometry;

const FILE_SIZE_FIELD: usize = 2;
const IMAGE_SIZE_FIELD: usize = 34;

// ── Planning ────────────────────────────────────────────────────────

/// The source as the writer reads it, after band selection.
#[derive(Clone, Debug)]
enum Source<'i> {
    Indexed { bits: u8, palette: &'i Palette },
    Gray { band: usize },
    /// Source band feeding each of the output B, G, R bytes.
    Bgr { bands: [usize; 3] },
    Masked { bits: u8, masks: ChannelMasks },
}

/// What goes on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Target {
    Indexed { bits: u8, palette: Palette, rle: bool },
    Bgr24,
    Masked {
        bits: u8,
        masks: ChannelMasks,
        bitfields: bool,
    },
    Embedded(EmbeddedFormat),
}

impl Target {
    fn bits_per_pixel(&self) -> u16 {
        match self {
            Target::Indexed { bits, .. } | Target::Masked { bits, .. } => u16::from(*bits),
            Target::Bgr24 => 24,
            Target::Embedded(_) => 0,
        }
    }

    fn compression(&self) -> Compression {
        match self {
            Target::Indexed {
                rle: true, bits: 8, ..
            } => Compression::Rle8,
            Target::Indexed { rle: true, .. } => Compression::Rle4,
            Target::Masked {
                bitfields: true, ..
            } => Compression::Bitfields,
            Target::Embedded(EmbeddedFormat::Jpeg) => Compression::Jpeg,
            Target::Embedded(EmbeddedFormat::Png) => Compression::Png,
            _ => Compression::None,
        }
    }

    fn palette(&self) -> Option<&Palette> {
        match self {
            Target::Indexed { palette, .. } => Some(palette),
            _ => None,
        }
    }

    fn allows_top_down(&self) -> bool {
        matches!(
            self,
            Target::Bgr24 | Target::Masked { .. } | Target::Indexed { rle: false, .. }
        )
    }
}

fn unencodable(msg: impl Into<alloc::string::String>) -> BitmapError {
    BitmapError::UnencodableSource(msg.into())
}

fn source_of<'i>(image: &'i PixelBuffer, geometry: &Geometry) -> Result<Source<'i>, BitmapError> {
    let layout = image.layout();
    if let Some(map) = &geometry.bands {
        let PixelLayout::Bgr { .. } = layout else {
            return Err(unencodable(alloc::format!(
                "band selection is only supported for BGR sources, not {layout:?}"
            )));
        };
        let n = map.dest.len();
        if n != 1 && n != 3 {
            return Err(unencodable(alloc::format!(
                "{n} selected bands; only 1 or 3 can be written"
            )));
        }
        let mut order = [0usize; 3];
        for (&s, &d) in map.source.iter().zip(&map.dest) {
            order[d] = s;
        }
        return Ok(if n == 1 {
            Source::Gray { band: order[0] }
        } else {
            Source::Bgr { bands: order }
        });
    }
    match layout {
        PixelLayout::Indexed {
            bits_per_pixel,
            palette,
        } => Ok(Source::Indexed {
            bits: *bits_per_pixel,
            palette,
        }),
        PixelLayout::Grayscale { .. } | PixelLayout::Bgr { bands: 1 } => Ok(Source::Gray { band: 0 }),
        PixelLayout::Bgr { bands: 3 } => Ok(Source::Bgr { bands: [0, 1, 2] }),
        PixelLayout::DirectMasked {
            bits_per_pixel,
            masks,
        } => {
            if !masks.is_well_formed() {
                return Err(BitmapError::InvalidMaskConfiguration(alloc::format!(
                    "{masks:?} contains split or overlapping channels"
                )));
            }
            Ok(Source::Masked {
                bits: *bits_per_pixel,
                masks: *masks,
            })
        }
        other => Err(unencodable(alloc::format!("{other:?} cannot be written"))),
    }
}

fn rgb_widths(masks: &ChannelMasks) -> [u32; 3] {
    let [r, g, b, _] = masks.widths();
    [r, g, b]
}

fn auto_compression(source: &Source<'_>) -> CompressionPreference {
    match source {
        Source::Masked { bits: 16, masks }
            if *masks != ChannelMasks::RGB555
                && masks.alpha == 0
                && matches!(rgb_widths(masks), [5, 5, 5] | [5, 6, 5]) =>
        {
            CompressionPreference::Bitfields
        }
        Source::Masked { bits: 32, masks }
            if *masks != ChannelMasks::ARGB8888 && masks.alpha == 0 =>
        {
            CompressionPreference::Bitfields
        }
        _ => CompressionPreference::None,
    }
}

fn plan(source: &Source<'_>, preference: CompressionPreference) -> Result<Target, BitmapError> {
    let preference = match preference {
        CompressionPreference::Auto => auto_compression(source),
        p => p,
    };
    let gray_palette = || Palette::grayscale(256);
    Ok(match (preference, source) {
        (CompressionPreference::Jpeg, _) => Target::Embedded(EmbeddedFormat::Jpeg),
        (CompressionPreference::Png, _) => Target::Embedded(EmbeddedFormat::Png),

        (CompressionPreference::Rle, Source::Indexed { bits, palette })
            if matches!(bits, 4 | 8) && palette.len() <= Palette::MAX_ENTRIES =>
        {
            Target::Indexed {
                bits: *bits,
                palette: (*palette).clone(),
                rle: true,
            }
        }
        (CompressionPreference::Rle, Source::Gray { .. }) => Target::Indexed {
            bits: 8,
            palette: gray_palette(),
            rle: true,
        },
        (CompressionPreference::Rle, other) => {
            return Err(unencodable(alloc::format!(
                "run-length output needs a 4- or 8-bit indexed or gray source, not {other:?}"
            )));
        }

        (CompressionPreference::Bitfields, Source::Masked { bits: 16, masks }) => {
            if masks.alpha != 0 || !matches!(rgb_widths(masks), [5, 5, 5] | [5, 6, 5]) {
                return Err(BitmapError::InvalidMaskConfiguration(alloc::format!(
                    "16-bit bitfield output needs 5-5-5 or 5-6-5 masks without alpha, got {masks:?}"
                )));
            }
            Target::Masked {
                bits: 16,
                masks: *masks,
                bitfields: true,
            }
        }
        (CompressionPreference::Bitfields, Source::Masked { masks, .. }) => {
            if masks.alpha != 0 {
                return Err(BitmapError::InvalidMaskConfiguration(alloc::string::String::from(
                    "bitfield output carries only red, green and blue masks",
                )));
            }
            Target::Masked {
                bits: 32,
                masks: *masks,
                bitfields: true,
            }
        }
        (CompressionPreference::Bitfields, _) => Target::Masked {
            bits: 32,
            masks: ChannelMasks::RGB888,
            bitfields: true,
        },

        // Plain output.
        (_, Source::Indexed { palette, .. }) if palette.len() > Palette::MAX_ENTRIES => Target::Bgr24,
        (_, Source::Indexed { bits, palette }) => Target::Indexed {
            bits: *bits,
            palette: (*palette).clone(),
            rle: false,
        },
        (_, Source::Gray { .. }) => Target::Indexed {
            bits: 8,
            palette: gray_palette(),
            rle: false,
        },
        (_, Source::Bgr { .. }) => Target::Bgr24,
        (_, Source::Masked { bits: 16, masks }) => {
            if rgb_widths(masks) != [5, 5, 5] {
                return Err(BitmapError::InvalidMaskConfiguration(alloc::format!(
                    "plain 16-bit output needs 5-5-5 masks, got {masks:?}"
                )));
            }
            Target::Masked {
                bits: 16,
                masks: ChannelMasks::RGB555,
                bitfields: false,
            }
        }
        (_, Source::Masked { masks, .. }) => {
            if masks.widths().iter().any(|&w| w > 8) {
                return Err(BitmapError::InvalidMaskConfiguration(alloc::format!(
                    "plain 32-bit output holds at most 8 bits per channel, got {masks:?}"
                )));
            }
            Target::Masked {
                bits: 32,
                masks: ChannelMasks::ARGB8888,
                bitfields: false,
            }
        }
    })
}

// ── Pixel conversion ────────────────────────────────────────────────

struct Converter<'i> {
    image: &'i PixelBuffer,
    source: Source<'i>,
}

impl Converter<'_> {
    fn raw(&self, x: u32, y: u32, band: usize) -> u32 {
        self.image.sample(x, y, band).unwrap_or(0)
    }

    fn index(&self, x: u32, y: u32) -> u8 {
        match self.source {
            Source::Gray { band } => self.raw(x, y, band) as u8,
            _ => self.raw(x, y, 0) as u8,
        }
    }

    /// Colour as B, G, R bytes.
    fn bgr(&self, x: u32, y: u32) -> [u8; 3] {
        match &self.source {
            Source::Indexed { palette, .. } => {
                let e = palette.get(self.raw(x, y, 0) as usize).unwrap_or_default();
                [e.blue, e.green, e.red]
            }
            Source::Gray { band } => [self.raw(x, y, *band) as u8; 3],
            Source::Bgr { bands } => bands.map(|b| self.raw(x, y, b) as u8),
            Source::Masked { masks, .. } => {
                let word = self.raw(x, y, 0);
                [masks.blue, masks.green, masks.red].map(|m| {
                    rescale_bits(ChannelMasks::extract(word, m), m.count_ones(), 8) as u8
                })
            }
        }
    }

    fn word(&self, x: u32, y: u32, target: &ChannelMasks) -> u32 {
        let Source::Masked { masks, .. } = &self.source else {
            let [b, g, r] = self.bgr(x, y).map(u32::from);
            return ChannelMasks::insert(r, target.red)
                | ChannelMasks::insert(g, target.green)
                | ChannelMasks::insert(b, target.blue)
                | target.alpha;
        };
        let word = self.raw(x, y, 0);
        if masks == target {
            return word;
        }
        let mut out = 0;
        for (i, (s, t)) in masks.to_array().into_iter().zip(target.to_array()).enumerate() {
            if t == 0 {
                continue;
            }
            let value = if s != 0 {
                rescale_bits(ChannelMasks::extract(word, s), s.count_ones(), t.count_ones())
            } else if i == 3 {
                // no source alpha: opaque
                u32::MAX
            } else {
                0
            };
            out |= ChannelMasks::insert(value, t);
        }
        out
    }
}

// ── Writing ─────────────────────────────────────────────────────────

pub(crate) fn encode(
    req: EncodeRequest<'_>,
    image: &PixelBuffer,
    sink: &mut Vec<u8>,
    stop: &dyn Stop,
) -> Result<Status, BitmapError> {
    let EncodeRequest {
        compression,
        row_order,
        region,
        resolution,
        limits,
        embedded: codec,
        progress,
    } = req;

    let geometry = Geometry::resolve(image.width(), image.height(), &region, image.layout().bands())?;
    let (width, height) = (geometry.dest.width, geometry.dest.height);
    if let Some(limits) = limits {
        limits.check(width, height)?;
    }
    let too_large = || BitmapError::DimensionsTooLarge { width, height };
    let signed_width = i32::try_from(width).map_err(|_| too_large())?;
    let signed_height = i32::try_from(height).map_err(|_| too_large())?;

    let source = source_of(image, &geometry)?;
    let target = plan(&source, compression)?;
    let codec = match target {
        Target::Embedded(format) => Some(codec.ok_or(BitmapError::MissingEmbeddedCodec(format))?),
        _ => None,
    };
    let top_down = row_order == RowOrder::TopDown && target.allows_top_down();
    if row_order == RowOrder::TopDown && !top_down {
        log::debug!("{:?} output is always written bottom-up", target.compression());
    }
    log::debug!(
        "writing {width}x{height} bitmap at {} bpp, {:?}",
        target.bits_per_pixel(),
        target.compression()
    );

    let palette_entries = target.palette().map_or(0, Palette::len);
    let masks_bytes = if target.compression() == Compression::Bitfields {
        12
    } else {
        0
    };
    let offset = (FILE_HEADER_SIZE + INFO_HEADER_SIZE) as usize + palette_entries * 4 + masks_bytes;
    if let (Some(limits), false) = (limits, matches!(target, Target::Embedded(_))) {
        // Run-length output is measured at its uncompressed size.
        let bytes = padded_row_bytes(width, target.bits_per_pixel())
            .and_then(|row| row.checked_mul(height as usize))
            .and_then(|pixels| pixels.checked_add(offset))
            .ok_or_else(too_large)?;
        limits.check_memory(bytes)?;
    }

    // Nothing below rejects the request, so bytes can be appended now.
    let start = sink.len();
    sink.extend_from_slice(b"BM");
    sink.extend_from_slice(&0u32.to_le_bytes()); // file size, patched
    sink.extend_from_slice(&[0u8; 4]); // reserved
    sink.extend_from_slice(&(offset as u32).to_le_bytes());

    sink.extend_from_slice(&INFO_HEADER_SIZE.to_le_bytes());
    sink.extend_from_slice(&signed_width.to_le_bytes());
    let stored_height = if top_down {
        -signed_height
    } else {
        signed_height
    };
    sink.extend_from_slice(&stored_height.to_le_bytes());
    sink.extend_from_slice(&1u16.to_le_bytes()); // planes
    sink.extend_from_slice(&target.bits_per_pixel().to_le_bytes());
    sink.extend_from_slice(&target.compression().code().to_le_bytes());
    sink.extend_from_slice(&0u32.to_le_bytes()); // image size, patched
    sink.extend_from_slice(&resolution.0.to_le_bytes());
    sink.extend_from_slice(&resolution.1.to_le_bytes());
    sink.extend_from_slice(&(palette_entries as u32).to_le_bytes()); // colours used
    sink.extend_from_slice(&(palette_entries as u32).to_le_bytes()); // colours important

    if let Some(palette) = target.palette() {
        for e in palette.entries() {
            sink.extend_from_slice(&[e.blue, e.green, e.red, 0]);
        }
    }
    if let Target::Masked {
        masks,
        bitfields: true,
        ..
    } = &target
    {
        for m in [masks.red, masks.green, masks.blue] {
            sink.extend_from_slice(&m.to_le_bytes());
        }
    }
    debug_assert_eq!(sink.len() - start, offset);

    let status = if let (Target::Embedded(format), Some(codec)) = (&target, codec) {
        match embedded::encode(image, *format, &region, codec, stop) {
            Ok(bytes) => sink.extend_from_slice(&bytes),
            Err(e) => {
                sink.truncate(start);
                return Err(e);
            }
        }
        Status::Complete
    } else {
        let convert = Converter { image, source };
        let mut monitor = RowMonitor::new(stop, progress, height);
        write_rows(&convert, &target, &geometry, top_down, sink, &mut monitor)
    };

    let file_size = (sink.len() - start) as u32;
    let image_size = file_size - offset as u32;
    sink[start + FILE_SIZE_FIELD..start + FILE_SIZE_FIELD + 4].copy_from_slice(&file_size.to_le_bytes());
    sink[start + IMAGE_SIZE_FIELD..start + IMAGE_SIZE_FIELD + 4].copy_from_slice(&image_size.to_le_bytes());
    Ok(status)
}

fn write_rows(
    convert: &Converter<'_>,
    target: &Target,
    geometry: &Geometry,
    top_down: bool,
    sink: &mut Vec<u8>,
    monitor: &mut RowMonitor<'_>,
) -> Status {
    let (width, height) = (geometry.dest.width, geometry.dest.height);
    let mut status = Status::Complete;
    let mut indices = Vec::with_capacity(width as usize);

    for k in 0..height {
        if monitor.should_stop() {
            status = Status::Aborted;
            break;
        }
        let j = if top_down { k } else { height - 1 - k };
        let y = geometry.source_row(j);
        let columns = (0..width).map(|i| geometry.source_column(i));
        let row_start = sink.len();
        match target {
            Target::Indexed { bits, rle, .. } => {
                indices.clear();
                indices.extend(columns.map(|x| convert.index(x, y)));
                if *rle {
                    rle::encode_row(&indices, *bits, sink);
                } else {
                    pack_indices(&indices, *bits, sink);
                    pad_row(sink, row_start);
                }
            }
            Target::Bgr24 => {
                for x in columns {
                    sink.extend_from_slice(&convert.bgr(x, y));
                }
                pad_row(sink, row_start);
            }
            Target::Masked { bits: 16, masks, .. } => {
                for x in columns {
                    sink.extend_from_slice(&(convert.word(x, y, masks) as u16).to_le_bytes());
                }
                pad_row(sink, row_start);
            }
            Target::Masked { masks, .. } => {
                for x in columns {
                    sink.extend_from_slice(&convert.word(x, y, masks).to_le_bytes());
                }
            }
            Target::Embedded(_) => {}
        }
        monitor.row_done();
    }

    if let Target::Indexed { rle: true, .. } = target {
        rle::end_of_bitmap(sink);
    }
    status
}
