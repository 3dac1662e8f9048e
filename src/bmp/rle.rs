//! RLE8 and RLE4 run-length coding.
//!
//! The stream is a sequence of two-byte opcodes. A non-zero first byte is a
//! run: repeat the second byte (RLE8) or alternate its two nibbles (RLE4)
//! that many times. A zero first byte escapes: `0,0` ends the line, `0,1`
//! ends the bitmap, `0,2,dx,dy` moves the write position, and `0,n` for
//! n >= 3 is followed by n literal values padded to a 16-bit boundary.

use alloc::vec;
use alloc::vec::Vec;

use super::DecodeContext;
use super::cursor::Cursor;
use super::monitor::{Completion, RowMonitor};
use crate::error::BitmapError;
use crate::pixel::PixelBuffer;
use crate::region::Geometry;

// ── Opcodes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op<'a> {
    /// `count` pixels of `value` (RLE4: the two nibbles alternate).
    Run { count: u8, value: u8 },
    EndOfLine,
    EndOfBitmap,
    /// Move right by `right` pixels and `lines` lines in file order.
    Delta { right: u8, lines: u8 },
    /// `count` literal pixels packed in `data`.
    Absolute { count: u8, data: &'a [u8] },
}

fn next_op<'a>(c: &mut Cursor<'a>, bits: u8) -> Result<Op<'a>, BitmapError> {
    let [count, value] = c.read_array()?;
    if count != 0 {
        return Ok(Op::Run { count, value });
    }
    Ok(match value {
        0 => Op::EndOfLine,
        1 => Op::EndOfBitmap,
        2 => {
            let [right, lines] = c.read_array()?;
            Op::Delta { right, lines }
        }
        n => {
            let bytes = if bits == 4 {
                usize::from(n).div_ceil(2)
            } else {
                usize::from(n)
            };
            let data = c.take(bytes)?;
            if bytes % 2 == 1 {
                c.skip(1)?;
            }
            Op::Absolute { count: n, data }
        }
    })
}

/// What the decode loop should do after one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    EndOfLine,
    EndOfBitmap,
}

// ── Decode ──────────────────────────────────────────────────────────

struct RleState<'g, 'b, 'm> {
    geometry: &'g Geometry,
    bits: u8,
    /// One index per pixel of the current line.
    row: Vec<u8>,
    col: usize,
    /// Current line, counted from the top of the image.
    line: i64,
    /// +1 for top-down files, -1 for bottom-up.
    dir: i64,
    dirty: bool,
    buf: &'b mut PixelBuffer,
    monitor: &'b mut RowMonitor<'m>,
}

impl RleState<'_, '_, '_> {
    fn put(&mut self, value: u8) {
        if let Some(slot) = self.row.get_mut(self.col) {
            *slot = value;
        }
        self.col = self.col.saturating_add(1);
        self.dirty = true;
    }

    fn in_image(&self) -> bool {
        (0..i64::from(self.geometry.height)).contains(&self.line)
    }

    /// Hand the current line to the output through the region mapping, then
    /// clear it.
    fn flush(&mut self) {
        if self.in_image() {
            let g = self.geometry;
            if let Some(dest_y) = g.dest_row_for(self.line as u32) {
                for i in 0..g.dest.width {
                    let value = self.row[g.source_column(i) as usize];
                    self.buf.set_sample(g.dest.x + i, dest_y, 0, u32::from(value));
                }
                self.monitor.row_done();
            }
        }
        self.row.fill(0);
        self.dirty = false;
    }

    fn next_line(&mut self) {
        self.line += self.dir;
        self.col = 0;
    }

    fn apply(&mut self, op: Op<'_>) -> Step {
        match op {
            Op::Run { count, value } => {
                if self.bits == 8 {
                    for _ in 0..count {
                        self.put(value);
                    }
                } else {
                    let pair = [value >> 4, value & 0x0F];
                    for i in 0..usize::from(count) {
                        self.put(pair[i % 2]);
                    }
                }
                Step::Continue
            }
            Op::Absolute { count, data } => {
                if self.bits == 8 {
                    for &v in data {
                        self.put(v);
                    }
                } else {
                    for i in 0..usize::from(count) {
                        let byte = data[i / 2];
                        self.put(if i % 2 == 0 { byte >> 4 } else { byte & 0x0F });
                    }
                }
                Step::Continue
            }
            Op::EndOfLine => {
                self.flush();
                self.next_line();
                Step::EndOfLine
            }
            Op::EndOfBitmap => {
                self.flush();
                Step::EndOfBitmap
            }
            Op::Delta { right, lines } => {
                let col = self.col;
                for _ in 0..lines {
                    self.flush();
                    self.next_line();
                }
                self.col = col.saturating_add(usize::from(right));
                Step::Continue
            }
        }
    }
}

/// Decode an RLE4/RLE8 payload into `buf`.
///
/// Running out of input between opcodes ends the image normally; running
/// out inside an opcode is reported as [`Completion::Truncated`].
pub(crate) fn decode(
    ctx: &DecodeContext<'_>,
    payload: &[u8],
    buf: &mut PixelBuffer,
    monitor: &mut RowMonitor<'_>,
) -> Result<Completion, BitmapError> {
    let g = &ctx.geometry;
    let bits = ctx.header.bits_per_pixel as u8;
    let mut state = RleState {
        geometry: g,
        bits,
        row: vec![0; g.width as usize],
        col: 0,
        line: if ctx.bottom_up() {
            i64::from(g.height) - 1
        } else {
            0
        },
        dir: if ctx.bottom_up() { -1 } else { 1 },
        dirty: false,
        buf,
        monitor,
    };
    let mut c = Cursor::new(payload);
    loop {
        if c.is_empty() {
            if state.dirty {
                state.flush();
            }
            return Ok(Completion::Finished);
        }
        let Ok(op) = next_op(&mut c, bits) else {
            if state.dirty {
                state.flush();
            }
            return Ok(Completion::Truncated);
        };
        let before = state.monitor.rows_done();
        let step = state.apply(op);
        if step == Step::EndOfBitmap || !state.in_image() {
            return Ok(Completion::Finished);
        }
        let emitted = step == Step::EndOfLine || state.monitor.rows_done() != before;
        if emitted && state.monitor.should_stop() {
            return Ok(Completion::Aborted);
        }
    }
}

// ── Encode ──────────────────────────────────────────────────────────

const MAX_RUN: usize = 255;
/// Shortest literal stretch worth an absolute-mode opcode.
const MIN_ABSOLUTE: usize = 3;

/// Append one encoded row of palette indices followed by end-of-line.
pub(crate) fn encode_row(values: &[u8], bits: u8, out: &mut Vec<u8>) {
    if bits == 4 {
        encode_row_rle4(values, out);
    } else {
        encode_row_rle8(values, out);
    }
    out.extend_from_slice(&[0, 0]);
}

pub(crate) fn end_of_bitmap(out: &mut Vec<u8>) {
    out.extend_from_slice(&[0, 1]);
}

fn same_run(values: &[u8], start: usize) -> usize {
    let first = values[start];
    values[start..]
        .iter()
        .take(MAX_RUN)
        .take_while(|&&v| v == first)
        .count()
}

fn encode_row_rle8(values: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < values.len() {
        let run = same_run(values, i);
        if run >= 2 {
            out.push(run as u8);
            out.push(values[i]);
            i += run;
            continue;
        }
        let mut j = i + 1;
        while j < values.len() && j - i < MAX_RUN && !(j + 1 < values.len() && values[j] == values[j + 1]) {
            j += 1;
        }
        let literal = &values[i..j];
        if literal.len() >= MIN_ABSOLUTE {
            out.push(0);
            out.push(literal.len() as u8);
            out.extend_from_slice(literal);
            if literal.len() % 2 == 1 {
                out.push(0);
            }
        } else {
            for &v in literal {
                out.extend_from_slice(&[1, v]);
            }
        }
        i = j;
    }
}

/// Length of the a,b,a,b,... pattern starting at `start`, at most `cap`.
fn alternating_run(values: &[u8], start: usize, cap: usize) -> usize {
    let pair = [values[start], values.get(start + 1).copied().unwrap_or(0)];
    values[start..]
        .iter()
        .take(cap)
        .enumerate()
        .take_while(|&(k, &v)| v == pair[k % 2])
        .count()
}

fn encode_row_rle4(values: &[u8], out: &mut Vec<u8>) {
    let nibble = |i: usize| values.get(i).map_or(0, |v| v & 0x0F);
    let mut i = 0;
    while i < values.len() {
        let run = alternating_run(values, i, MAX_RUN);
        if run >= MIN_ABSOLUTE {
            out.push(run as u8);
            out.push(nibble(i) << 4 | nibble(i + 1));
            i += run;
            continue;
        }
        let mut j = i + 1;
        while j < values.len() && j - i < MAX_RUN && alternating_run(values, j, MIN_ABSOLUTE) < MIN_ABSOLUTE {
            j += 1;
        }
        let n = j - i;
        match n {
            1 => out.extend_from_slice(&[1, nibble(i) << 4]),
            2 => out.extend_from_slice(&[2, nibble(i) << 4 | nibble(i + 1)]),
            _ => {
                out.push(0);
                out.push(n as u8);
                let bytes = n.div_ceil(2);
                for k in 0..bytes {
                    let hi = nibble(i + 2 * k);
                    let lo = if 2 * k + 1 < n { nibble(i + 2 * k + 1) } else { 0 };
                    out.push(hi << 4 | lo);
                }
                if bytes % 2 == 1 {
                    out.push(0);
                }
            }
        }
        i = j;
    }
}
