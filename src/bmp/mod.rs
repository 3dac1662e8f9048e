//! Bitmap container: header parsing, pixel transcoding and the writer.
//!
//! Use the top-level [`crate::decode`], [`crate::encode`] and the request
//! builders.

mod cursor;
mod embedded;
mod encode;
mod format;
pub(crate) mod header;
mod monitor;
mod rle;
mod scanline;
mod utils;

use alloc::boxed::Box;
use alloc::vec::Vec;

use enough::Stop;

use self::cursor::Cursor;
use self::header::{BitmapHeader, Compression};
use self::monitor::{Completion, RowMonitor};
use crate::decode::{DecodeOutput, DecodeRequest, DecodeWarning, Status};
use crate::encode::EncodeRequest;
use crate::error::BitmapError;
use crate::pixel::{ChannelMasks, PixelBuffer, PixelLayout};
use crate::region::Geometry;

/// Everything the pixel passes need to know about the source.
pub(crate) struct DecodeContext<'a> {
    pub header: &'a BitmapHeader,
    /// Layout of the stored pixels (before band selection).
    pub layout: &'a PixelLayout,
    pub geometry: Geometry,
}

impl DecodeContext<'_> {
    pub fn bottom_up(&self) -> bool {
        self.header.is_bottom_up()
    }
}

pub(crate) fn probe(data: &[u8]) -> Result<BitmapHeader, BitmapError> {
    header::parse(data, &mut Vec::new())
}

pub(crate) fn decode(req: DecodeRequest<'_>, stop: &dyn Stop) -> Result<DecodeOutput, BitmapError> {
    let DecodeRequest {
        data,
        limits,
        region,
        embedded: codec,
        progress,
    } = req;

    let mut warnings = Vec::new();
    let header = header::parse(data, &mut warnings)?;
    let resolved = format::resolve(&header, &mut warnings)?;
    let (width, height) = (header.image_width(), header.image_height());
    if let Some(limits) = limits {
        limits.check(width, height)?;
    }

    if let PixelLayout::EmbeddedCompressed { format } = resolved.layout {
        let pixels = embedded::decode(&header, data, format, &region, codec, stop)?;
        if let Some(limits) = limits {
            limits.check_buffer(pixels.width(), pixels.height(), pixels.layout())?;
        }
        return Ok(DecodeOutput {
            header,
            pixels,
            status: Status::Complete,
            warnings,
            grayscale_palette: false,
            color_space: resolved.color_space,
        });
    }

    let geometry = Geometry::resolve(width, height, &region, resolved.layout.bands())?;
    let out_layout = output_layout(&resolved.layout, &geometry)?;
    if let Some(limits) = limits {
        limits.check_buffer(geometry.buffer_width, geometry.buffer_height, &out_layout)?;
    }
    let mut pixels = PixelBuffer::new(geometry.buffer_width, geometry.buffer_height, out_layout)?;
    let mut monitor = RowMonitor::new(stop, progress, geometry.dest.height);
    let ctx = DecodeContext {
        header: &header,
        layout: &resolved.layout,
        geometry,
    };

    let offset = header.pixel_data_offset as usize;
    let completion = if offset > data.len() {
        Completion::Truncated
    } else if matches!(header.compression, Compression::Rle4 | Compression::Rle8) {
        let payload = rle_payload(&header, data, &mut warnings);
        rle::decode(&ctx, payload, &mut pixels, &mut monitor)?
    } else {
        let mut cursor = Cursor::new(data);
        cursor.set_position(offset)?;
        scanline::read_rows(&ctx, &mut cursor, &mut pixels, &mut monitor)?
    };
    let rows_decoded = monitor.rows_done();

    let mut output = DecodeOutput {
        header,
        pixels,
        status: Status::Complete,
        warnings,
        grayscale_palette: resolved.grayscale,
        color_space: resolved.color_space,
    };
    match completion {
        Completion::Finished => Ok(output),
        Completion::Aborted => {
            log::debug!("decode stopped after {rows_decoded} rows");
            output.status = Status::Aborted;
            Ok(output)
        }
        Completion::Truncated => {
            log::warn!("pixel data ends after {rows_decoded} rows");
            Err(BitmapError::Truncated {
                rows_decoded,
                partial: Some(Box::new(output)),
            })
        }
    }
}

pub(crate) fn encode(
    req: EncodeRequest<'_>,
    image: &PixelBuffer,
    sink: &mut Vec<u8>,
    stop: &dyn Stop,
) -> Result<Status, BitmapError> {
    encode::encode(req, image, sink, stop)
}

/// Layout of the decoded buffer once band selection is applied.
fn output_layout(layout: &PixelLayout, geometry: &Geometry) -> Result<PixelLayout, BitmapError> {
    let Some(map) = &geometry.bands else {
        return Ok(layout.clone());
    };
    match layout {
        PixelLayout::Bgr { .. } => Ok(PixelLayout::Bgr {
            bands: map.dest.len() as u8,
        }),
        PixelLayout::DirectMasked {
            bits_per_pixel,
            masks,
        } => {
            // Words are copied whole; selection keeps a subset of the
            // channels in place.
            if map.source != map.dest {
                return Err(BitmapError::InvalidParameter(alloc::format!(
                    "direct colour band selection cannot reorder bands ({:?} -> {:?})",
                    map.source,
                    map.dest
                )));
            }
            let present: Vec<u32> = masks.to_array().into_iter().filter(|&m| m != 0).collect();
            let keep = |m: u32| {
                let kept = map.source.iter().any(|&b| present.get(b) == Some(&m));
                if kept { m } else { 0 }
            };
            Ok(PixelLayout::DirectMasked {
                bits_per_pixel: *bits_per_pixel,
                masks: ChannelMasks {
                    red: keep(masks.red),
                    green: keep(masks.green),
                    blue: keep(masks.blue),
                    alpha: keep(masks.alpha),
                },
            })
        }
        other => Err(BitmapError::InvalidParameter(alloc::format!(
            "band selection is not supported for {other:?}"
        ))),
    }
}

/// The RLE stream: `image_size` bytes when declared, else up to the
/// declared file size, else the rest of the input. Clamped to what exists.
fn rle_payload<'d>(
    header: &BitmapHeader,
    data: &'d [u8],
    warnings: &mut Vec<DecodeWarning>,
) -> &'d [u8] {
    let start = header.pixel_data_offset as usize;
    let rest = data.get(start..).unwrap_or_default();
    let declared = if header.image_size != 0 {
        header.image_size as usize
    } else if header.file_size as usize > start {
        header.file_size as usize - start
    } else {
        rest.len()
    };
    if declared > rest.len() {
        log::warn!(
            "header declares {declared} bytes of run-length data, only {} present",
            rest.len()
        );
        warnings.push(DecodeWarning::PayloadShorterThanDeclared {
            declared,
            available: rest.len(),
        });
        return rest;
    }
    &rest[..declared]
}
