//! Row length arithmetic and small bit helpers shared by the decoder and
//! encoder.

/// Bytes of pixel data in one row, without padding: `ceil(width * bpp / 8)`.
pub(crate) fn packed_row_bytes(width: u32, bits_per_pixel: u16) -> Option<usize> {
    (width as usize)
        .checked_mul(usize::from(bits_per_pixel))
        .map(|bits| bits.div_ceil(8))
}

/// Bytes one row occupies on disk: the packed length rounded up to a
/// multiple of 4.
pub(crate) fn padded_row_bytes(width: u32, bits_per_pixel: u16) -> Option<usize> {
    packed_row_bytes(width, bits_per_pixel)?
        .checked_add(3)
        .map(|n| n & !3)
}

/// Rescale a `from`-bit channel value to `to` bits. Widening replicates
/// the bit pattern so full scale stays full scale.
pub(crate) fn rescale_bits(value: u32, from: u32, to: u32) -> u32 {
    if from == 0 || to == 0 {
        return 0;
    }
    if to <= from {
        return value >> (from - to);
    }
    let mut out = 0u64;
    let mut filled = 0;
    while filled < to {
        out = (out << from) | u64::from(value);
        filled += from;
    }
    (out >> (filled - to)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_length_law() {
        for width in [1u32, 3, 4, 5, 31, 32, 33] {
            for bpp in [1u16, 4, 8, 16, 24, 32] {
                let expected = 4 * (width as usize * bpp as usize).div_ceil(8).div_ceil(4);
                let got = padded_row_bytes(width, bpp).unwrap();
                assert_eq!(got, expected, "width {width} bpp {bpp}");
                assert_eq!(got % 4, 0);
                assert!(got >= packed_row_bytes(width, bpp).unwrap());
            }
        }
        assert_eq!(padded_row_bytes(1, 1), Some(4));
        assert_eq!(padded_row_bytes(33, 1), Some(8));
        assert_eq!(padded_row_bytes(5, 24), Some(16));
        assert_eq!(padded_row_bytes(3, 4), Some(4));
    }

    #[test]
    fn rescaling_keeps_full_scale() {
        assert_eq!(rescale_bits(0x1F, 5, 8), 0xFF);
        assert_eq!(rescale_bits(0, 5, 8), 0);
        assert_eq!(rescale_bits(0x10, 5, 8), 0x84);
        assert_eq!(rescale_bits(1, 1, 8), 0xFF);
        assert_eq!(rescale_bits(0xAB, 8, 8), 0xAB);
        assert_eq!(rescale_bits(0xFF, 8, 5), 0x1F);
        assert_eq!(rescale_bits(0x3F, 6, 5), 0x1F);
    }
}
