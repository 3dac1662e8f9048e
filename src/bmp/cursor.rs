//! Bounds-checked little-endian reader over the input slice.

use crate::error::BitmapError;

pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn set_position(&mut self, pos: usize) -> Result<(), BitmapError> {
        if pos > self.data.len() {
            return Err(BitmapError::eof());
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), BitmapError> {
        let new_pos = self.pos.checked_add(n).ok_or_else(BitmapError::eof)?;
        self.set_position(new_pos)
    }

    /// Skip up to `n` bytes, stopping at the end of input.
    pub fn skip_lenient(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.data.len());
    }

    /// Borrow the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], BitmapError> {
        let end = self.pos.checked_add(n).ok_or_else(BitmapError::eof)?;
        let slice = self.data.get(self.pos..end).ok_or_else(BitmapError::eof)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BitmapError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, BitmapError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_i16_le(&mut self) -> Result<i16, BitmapError> {
        self.read_array().map(i16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, BitmapError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32_le(&mut self) -> Result<i32, BitmapError> {
        self.read_array().map(i32::from_le_bytes)
    }
}
