//! Uncompressed scanlines at 1, 4, 8, 16, 24 and 32 bits per pixel.
//!
//! Rows on disk are padded to 4 bytes. When the request covers the whole
//! image the rows are copied in bulk; otherwise each destination column is
//! mapped back to its source column once, up front, and reused for every
//! row.

use alloc::vec::Vec;

use super::DecodeContext;
use super::cursor::Cursor;
use super::monitor::{Completion, RowMonitor};
use super::utils::{packed_row_bytes, padded_row_bytes};
use crate::error::BitmapError;
use crate::pixel::{PixelBuffer, PixelLayout, Samples, packed_position};
use crate::region::Geometry;

// ── Decode ──────────────────────────────────────────────────────────

pub(crate) fn read_rows(
    ctx: &DecodeContext<'_>,
    cursor: &mut Cursor<'_>,
    buf: &mut PixelBuffer,
    monitor: &mut RowMonitor<'_>,
) -> Result<Completion, BitmapError> {
    let g = &ctx.geometry;
    let bpp = ctx.header.bits_per_pixel;
    let (Some(packed), Some(padded)) = (
        packed_row_bytes(g.width, bpp),
        padded_row_bytes(g.width, bpp),
    ) else {
        return Err(BitmapError::DimensionsTooLarge {
            width: g.width,
            height: g.height,
        });
    };

    if g.is_identity() {
        read_direct(ctx, cursor, buf, monitor, packed, padded)
    } else {
        read_transformed(ctx, cursor, buf, monitor, packed, padded)
    }
}

fn read_direct(
    ctx: &DecodeContext<'_>,
    cursor: &mut Cursor<'_>,
    buf: &mut PixelBuffer,
    monitor: &mut RowMonitor<'_>,
    packed: usize,
    padded: usize,
) -> Result<Completion, BitmapError> {
    let height = ctx.geometry.height;
    for i in 0..height {
        if monitor.should_stop() {
            return Ok(Completion::Aborted);
        }
        let Ok(line) = cursor.take(packed) else {
            return Ok(Completion::Truncated);
        };
        cursor.skip_lenient(padded - packed);
        let y = if ctx.bottom_up() { height - 1 - i } else { i };
        store_row(buf, y as usize, line);
        monitor.row_done();
    }
    Ok(Completion::Finished)
}

fn store_row(buf: &mut PixelBuffer, y: usize, line: &[u8]) {
    let stride = buf.stride();
    let start = y * stride;
    match buf.samples_mut() {
        Samples::U8(v) => v[start..start + stride].copy_from_slice(&line[..stride]),
        Samples::U16(v) => {
            for (dst, src) in v[start..start + stride].iter_mut().zip(line.chunks_exact(2)) {
                *dst = u16::from_le_bytes([src[0], src[1]]);
            }
        }
        Samples::U32(v) => {
            for (dst, src) in v[start..start + stride].iter_mut().zip(line.chunks_exact(4)) {
                *dst = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
            }
        }
    }
}

fn read_transformed(
    ctx: &DecodeContext<'_>,
    cursor: &mut Cursor<'_>,
    buf: &mut PixelBuffer,
    monitor: &mut RowMonitor<'_>,
    packed: usize,
    padded: usize,
) -> Result<Completion, BitmapError> {
    let g = &ctx.geometry;
    let bottom_up = ctx.bottom_up();
    let map = ColumnMap::new(ctx.layout, buf.layout(), g);

    // Rows before the first one we need, in file order.
    let leading = if bottom_up {
        g.height - 1 - g.source_row(g.dest.height - 1)
    } else {
        g.source.y
    };
    let between = (g.step_y - 1) as usize;
    let Some(lead_bytes) = (leading as usize).checked_mul(padded) else {
        return Ok(Completion::Truncated);
    };
    if cursor.skip(lead_bytes).is_err() {
        return Ok(Completion::Truncated);
    }

    for j in 0..g.dest.height {
        if monitor.should_stop() {
            return Ok(Completion::Aborted);
        }
        let Ok(line) = cursor.take(packed) else {
            return Ok(Completion::Truncated);
        };
        cursor.skip_lenient(padded - packed);
        let dest_y = if bottom_up {
            g.dest.y + g.dest.height - 1 - j
        } else {
            g.dest.y + j
        };
        map.apply(line, buf, dest_y as usize);
        monitor.row_done();

        if j + 1 < g.dest.height && cursor.skip(between * padded).is_err() {
            return Ok(Completion::Truncated);
        }
    }
    Ok(Completion::Finished)
}

/// Precomputed source/destination positions for every output column.
enum ColumnMap {
    /// Sub-byte indices as (byte, shift) pairs.
    Packed {
        bits: u8,
        src: Vec<(usize, u32)>,
        dst: Vec<(usize, u32)>,
    },
    /// (source byte, destination byte)
    Bytes(Vec<(usize, usize)>),
    /// (source byte, destination word), masked down to the kept channels.
    Words16 { pairs: Vec<(usize, usize)>, keep: u16 },
    Words32 { pairs: Vec<(usize, usize)>, keep: u32 },
}

impl ColumnMap {
    fn new(layout: &PixelLayout, output: &PixelLayout, g: &Geometry) -> Self {
        let columns = move || {
            (0..g.dest.width).map(move |i| (g.source_column(i) as usize, (g.dest.x + i) as usize))
        };
        match layout {
            PixelLayout::Indexed { bits_per_pixel, .. } if *bits_per_pixel < 8 => {
                let bits = usize::from(*bits_per_pixel);
                let (src, dst) = columns()
                    .map(|(s, d)| (packed_position(s, bits), packed_position(d, bits)))
                    .unzip();
                ColumnMap::Packed {
                    bits: *bits_per_pixel,
                    src,
                    dst,
                }
            }
            PixelLayout::Bgr { bands } => {
                let bands = usize::from(*bands);
                let out_bands = g.output_bands(bands);
                let pairs: Vec<(usize, usize)> = match &g.bands {
                    Some(map) => map.source.iter().copied().zip(map.dest.iter().copied()).collect(),
                    None => (0..bands).map(|b| (b, b)).collect(),
                };
                ColumnMap::Bytes(
                    columns()
                        .flat_map(|(s, d)| {
                            pairs
                                .iter()
                                .map(move |&(sb, db)| (s * bands + sb, d * out_bands + db))
                        })
                        .collect(),
                )
            }
            PixelLayout::DirectMasked { bits_per_pixel, .. } => {
                // Channels dropped by band selection are cleared from the words.
                let keep = match (&g.bands, output) {
                    (Some(_), PixelLayout::DirectMasked { masks, .. }) => {
                        masks.red | masks.green | masks.blue | masks.alpha
                    }
                    _ => u32::MAX,
                };
                if *bits_per_pixel == 16 {
                    ColumnMap::Words16 {
                        pairs: columns().map(|(s, d)| (s * 2, d)).collect(),
                        keep: keep as u16,
                    }
                } else {
                    ColumnMap::Words32 {
                        pairs: columns().map(|(s, d)| (s * 4, d)).collect(),
                        keep,
                    }
                }
            }
            _ => ColumnMap::Bytes(columns().collect()),
        }
    }

    fn apply(&self, line: &[u8], buf: &mut PixelBuffer, y: usize) {
        let start = y * buf.stride();
        match (self, buf.samples_mut()) {
            (ColumnMap::Packed { bits, src, dst }, Samples::U8(v)) => {
                let mask = (1u8 << bits) - 1;
                for (&(sb, ss), &(db, ds)) in src.iter().zip(dst) {
                    let value = (line[sb] >> ss) & mask;
                    let out = &mut v[start + db];
                    *out = (*out & !(mask << ds)) | (value << ds);
                }
            }
            (ColumnMap::Bytes(pairs), Samples::U8(v)) => {
                for &(s, d) in pairs {
                    v[start + d] = line[s];
                }
            }
            (ColumnMap::Words16 { pairs, keep }, Samples::U16(v)) => {
                for &(s, d) in pairs {
                    v[start + d] = u16::from_le_bytes([line[s], line[s + 1]]) & keep;
                }
            }
            (ColumnMap::Words32 { pairs, keep }, Samples::U32(v)) => {
                for &(s, d) in pairs {
                    v[start + d] =
                        u32::from_le_bytes([line[s], line[s + 1], line[s + 2], line[s + 3]]) & keep;
                }
            }
            _ => {}
        }
    }
}

// ── Encode ──────────────────────────────────────────────────────────

/// Append `values` packed MSB-first at `bits` (1, 4 or 8) per sample.
pub(crate) fn pack_indices(values: &[u8], bits: u8, out: &mut Vec<u8>) {
    if bits == 8 {
        out.extend_from_slice(values);
        return;
    }
    let per_byte = usize::from(8 / bits);
    let mask = (1u8 << bits) - 1;
    for chunk in values.chunks(per_byte) {
        let mut byte = 0u8;
        for (k, &v) in chunk.iter().enumerate() {
            byte |= (v & mask) << (8 - bits as usize * (k + 1));
        }
        out.push(byte);
    }
}

/// Zero-pad the row that started at `row_start` to a multiple of 4 bytes.
pub(crate) fn pad_row(out: &mut Vec<u8>, row_start: usize) {
    let len = out.len() - row_start;
    out.resize(row_start + len.next_multiple_of(4), 0);
}
