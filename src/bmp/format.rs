//! Derives the in-memory pixel layout from parsed header fields.

use alloc::vec::Vec;

use super::header::{BitmapHeader, ColorSpaceType, Compression};
use crate::decode::DecodeWarning;
use crate::error::BitmapError;
use crate::pixel::{ChannelMasks, Palette, PixelLayout};

/// Result of format resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedFormat {
    pub layout: PixelLayout,
    /// Indexed image whose palette is entirely gray. Storage is unchanged.
    pub grayscale: bool,
    pub color_space: Option<ColorSpaceType>,
}

pub(crate) fn resolve(
    header: &BitmapHeader,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<ResolvedFormat, BitmapError> {
    let bpp = header.bits_per_pixel;
    let compression = header.compression;

    let layout = if let Some(format) = compression.embedded_format() {
        PixelLayout::EmbeddedCompressed { format }
    } else {
        match bpp {
            0 => {
                return Err(BitmapError::InvalidHeader(alloc::string::String::from(
                    "0 bits per pixel is only valid for JPEG or PNG payloads",
                )));
            }
            1 | 4 | 8 => {
                match (compression, bpp) {
                    (Compression::None, _) | (Compression::Rle8, 8) | (Compression::Rle4, 4) => {}
                    _ => return Err(mismatch(compression, bpp)),
                }
                PixelLayout::Indexed {
                    bits_per_pixel: bpp as u8,
                    palette: indexed_palette(header, warnings),
                }
            }
            16 | 32 => {
                let masks = match compression {
                    Compression::None => ChannelMasks::default_for(bpp),
                    Compression::Bitfields => declared_masks(header, bpp),
                    _ => return Err(mismatch(compression, bpp)),
                }
                .ok_or_else(|| mismatch(compression, bpp))?;
                check_masks(&masks, bpp)?;
                PixelLayout::DirectMasked {
                    bits_per_pixel: bpp as u8,
                    masks,
                }
            }
            24 => {
                if compression != Compression::None {
                    return Err(mismatch(compression, bpp));
                }
                PixelLayout::BGR24
            }
            other => {
                return Err(BitmapError::InvalidHeader(alloc::format!(
                    "unsupported bit depth {other}"
                )));
            }
        }
    };

    let grayscale = layout.palette().is_some_and(Palette::is_grayscale);
    log::debug!("resolved pixel layout {layout:?} (grayscale palette: {grayscale})");
    Ok(ResolvedFormat {
        layout,
        grayscale,
        color_space: header.color_space,
    })
}

fn mismatch(compression: Compression, bpp: u16) -> BitmapError {
    BitmapError::InvalidHeader(alloc::format!(
        "{compression:?} compression cannot carry {bpp} bits per pixel"
    ))
}

fn indexed_palette(header: &BitmapHeader, warnings: &mut Vec<DecodeWarning>) -> Palette {
    if !header.palette.is_empty() {
        return header.palette.clone();
    }
    let synthesized = 1usize << header.bits_per_pixel;
    log::warn!(
        "{}-bit indexed bitmap has no palette, using a {synthesized}-entry gray ramp",
        header.bits_per_pixel
    );
    warnings.push(DecodeWarning::MissingPalette { synthesized });
    Palette::grayscale(synthesized)
}

/// Declared bitfield masks; headers that leave R, G and B all zero get the
/// plain defaults.
fn declared_masks(header: &BitmapHeader, bpp: u16) -> Option<ChannelMasks> {
    match header.masks {
        Some(m) if m.red | m.green | m.blue != 0 => Some(m),
        _ => ChannelMasks::default_for(bpp),
    }
}

fn check_masks(masks: &ChannelMasks, bpp: u16) -> Result<(), BitmapError> {
    if !masks.is_well_formed() {
        return Err(BitmapError::InvalidMaskConfiguration(alloc::format!(
            "{masks:?} contains split or overlapping channels"
        )));
    }
    let all = masks.red | masks.green | masks.blue | masks.alpha;
    if bpp == 16 && all >> 16 != 0 {
        return Err(BitmapError::InvalidMaskConfiguration(alloc::format!(
            "{masks:?} does not fit in 16 bits"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bmp::header::Dialect;
    use crate::pixel::PaletteEntry;

    fn header(bpp: u16, compression: Compression) -> BitmapHeader {
        let mut warnings = Vec::new();
        let mut data = alloc::vec![0u8; 54];
        data[..2].copy_from_slice(b"BM");
        data[10..14].copy_from_slice(&54u32.to_le_bytes());
        data[14..18].copy_from_slice(&40u32.to_le_bytes());
        data[18..22].copy_from_slice(&1i32.to_le_bytes());
        data[22..26].copy_from_slice(&1i32.to_le_bytes());
        data[28..30].copy_from_slice(&bpp.to_le_bytes());
        let mut h = super::super::header::parse(&data, &mut warnings).unwrap();
        h.compression = compression;
        h
    }

    #[test]
    fn plain_direct_colour_gets_default_masks() {
        let r16 = resolve(&header(16, Compression::None), &mut Vec::new()).unwrap();
        assert_eq!(
            r16.layout,
            PixelLayout::DirectMasked {
                bits_per_pixel: 16,
                masks: ChannelMasks {
                    red: 0x7C00,
                    green: 0x03E0,
                    blue: 0x001F,
                    alpha: 0
                }
            }
        );
        let r32 = resolve(&header(32, Compression::None), &mut Vec::new()).unwrap();
        assert_eq!(
            r32.layout,
            PixelLayout::DirectMasked {
                bits_per_pixel: 32,
                masks: ChannelMasks {
                    red: 0x00FF_0000,
                    green: 0x0000_FF00,
                    blue: 0x0000_00FF,
                    alpha: 0xFF00_0000
                }
            }
        );
    }

    #[test]
    fn declared_masks_are_kept_for_bitfields() {
        let mut h = header(16, Compression::Bitfields);
        h.dialect = Dialect::Windows3NT;
        h.masks = Some(ChannelMasks::RGB565);
        let r = resolve(&h, &mut Vec::new()).unwrap();
        assert_eq!(
            r.layout,
            PixelLayout::DirectMasked {
                bits_per_pixel: 16,
                masks: ChannelMasks::RGB565
            }
        );

        h.masks = Some(ChannelMasks::rgb(0xF0F0, 0x0F00, 0x000F));
        assert!(matches!(
            resolve(&h, &mut Vec::new()),
            Err(BitmapError::InvalidMaskConfiguration(_))
        ));
    }

    #[test]
    fn embedded_and_24_bit() {
        let r = resolve(&header(0, Compression::Png), &mut Vec::new()).unwrap();
        assert!(matches!(r.layout, PixelLayout::EmbeddedCompressed { .. }));
        let r = resolve(&header(24, Compression::None), &mut Vec::new()).unwrap();
        assert_eq!(r.layout, PixelLayout::BGR24);
        assert!(resolve(&header(24, Compression::Rle8), &mut Vec::new()).is_err());
        assert!(resolve(&header(4, Compression::Rle8), &mut Vec::new()).is_err());
        assert!(resolve(&header(2, Compression::None), &mut Vec::new()).is_err());
    }

    #[test]
    fn gray_palette_sets_hint_and_missing_palette_is_synthesized() {
        let mut h = header(8, Compression::None);
        h.palette = Palette::new(alloc::vec![PaletteEntry::gray(0), PaletteEntry::gray(9)]);
        assert!(resolve(&h, &mut Vec::new()).unwrap().grayscale);
        h.palette = Palette::new(alloc::vec![PaletteEntry::new(1, 2, 3)]);
        assert!(!resolve(&h, &mut Vec::new()).unwrap().grayscale);

        h.palette = Palette::default();
        let mut warnings = Vec::new();
        let r = resolve(&h, &mut warnings).unwrap();
        assert_eq!(r.layout.palette().map(Palette::len), Some(256));
        assert_eq!(
            warnings,
            alloc::vec![DecodeWarning::MissingPalette { synthesized: 256 }]
        );
    }
}
