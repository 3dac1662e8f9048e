//! File header and info header parsing.
//!
//! The info header announces its own size, and that size alone picks the
//! dialect: 12 (OS/2 core), 40 (Windows 3, or Windows NT bitfields), 108
//! (Windows 4) and 124 (Windows 5).

use alloc::vec::Vec;

use super::cursor::Cursor;
use crate::decode::DecodeWarning;
use crate::embedded::EmbeddedFormat;
use crate::error::BitmapError;
use crate::pixel::{ChannelMasks, Palette, PaletteEntry};

pub(crate) const FILE_HEADER_SIZE: u32 = 14;
pub(crate) const CORE_HEADER_SIZE: u32 = 12;
pub(crate) const INFO_HEADER_SIZE: u32 = 40;
pub(crate) const V4_HEADER_SIZE: u32 = 108;
pub(crate) const V5_HEADER_SIZE: u32 = 124;

// ── Enumerations ────────────────────────────────────────────────────

/// Header dialect, determined by the info header size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// OS/2 1.x `BITMAPCOREHEADER` (12 bytes, 16-bit dimensions, RGB triples).
    Core2,
    /// `BITMAPINFOHEADER` (40 bytes).
    Windows3,
    /// 40-byte header followed by three inline bitfield masks.
    Windows3NT,
    /// `BITMAPV4HEADER` (108 bytes).
    Windows4,
    /// `BITMAPV5HEADER` (124 bytes).
    Windows5,
}

/// Pixel data compression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Rle8,
    Rle4,
    Bitfields,
    Jpeg,
    Png,
}

impl Compression {
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Rle8),
            2 => Some(Self::Rle4),
            3 => Some(Self::Bitfields),
            4 => Some(Self::Jpeg),
            5 => Some(Self::Png),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Rle8 => 1,
            Self::Rle4 => 2,
            Self::Bitfields => 3,
            Self::Jpeg => 4,
            Self::Png => 5,
        }
    }

    pub fn embedded_format(self) -> Option<EmbeddedFormat> {
        match self {
            Self::Jpeg => Some(EmbeddedFormat::Jpeg),
            Self::Png => Some(EmbeddedFormat::Png),
            _ => None,
        }
    }
}

/// Colour space declared by Windows 4/5 headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpaceType {
    /// Endpoints and gamma in the header describe the colour space.
    CalibratedRgb,
    /// `'sRGB'`
    Srgb,
    /// `'Win '`
    WindowsDefault,
    /// `'LINK'`: the profile blob is a file name.
    ProfileLinked,
    /// `'MBED'`: the profile blob is an ICC profile.
    ProfileEmbedded,
    Other(u32),
}

impl ColorSpaceType {
    pub fn from_u32(v: u32) -> Self {
        match v {
            0 => Self::CalibratedRgb,
            0x7352_4742 => Self::Srgb,
            0x5769_6E20 => Self::WindowsDefault,
            0x4C49_4E4B => Self::ProfileLinked,
            0x4D42_4544 => Self::ProfileEmbedded,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::CalibratedRgb => 0,
            Self::Srgb => 0x7352_4742,
            Self::WindowsDefault => 0x5769_6E20,
            Self::ProfileLinked => 0x4C49_4E4B,
            Self::ProfileEmbedded => 0x4D42_4544,
            Self::Other(v) => v,
        }
    }
}

/// CIE XYZ endpoints (2.30 fixed point, R/G/B each as X,Y,Z) and the
/// per-channel gamma (16.16 fixed point).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Calibration {
    pub endpoints: [[i32; 3]; 3],
    pub gamma: [u32; 3],
}

/// Where the ICC profile lives, relative to the start of the info header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProfileLocation {
    pub offset: u32,
    pub size: u32,
}

// ── Header record ───────────────────────────────────────────────────

/// Everything the file and info headers declare.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitmapHeader {
    pub dialect: Dialect,
    pub file_size: u32,
    pub reserved: [u16; 2],
    pub pixel_data_offset: u32,
    pub header_size: u32,
    /// Width as stored.
    pub width: i32,
    /// Height as stored; positive means rows run bottom-up.
    pub height: i32,
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub compression: Compression,
    /// Declared pixel payload size; 0 is common for uncompressed data.
    pub image_size: u32,
    pub x_pixels_per_meter: i32,
    pub y_pixels_per_meter: i32,
    pub colors_used: u32,
    pub colors_important: u32,
    /// Masks as declared. Absent for Core2 and plain Windows3 headers.
    pub masks: Option<ChannelMasks>,
    pub color_space: Option<ColorSpaceType>,
    /// Present only for [`ColorSpaceType::CalibratedRgb`].
    pub calibration: Option<Calibration>,
    pub rendering_intent: Option<u32>,
    pub profile_location: Option<ProfileLocation>,
    /// Raw profile bytes for linked/embedded colour spaces. Never
    /// interpreted.
    pub icc_profile: Option<Vec<u8>>,
    /// Palette, capped at [`Palette::MAX_ENTRIES`].
    pub palette: Palette,
    /// Palette entries the header layout implied before capping.
    pub declared_palette_entries: usize,
}

impl BitmapHeader {
    pub fn is_bottom_up(&self) -> bool {
        self.height > 0
    }

    pub fn image_width(&self) -> u32 {
        self.width.unsigned_abs()
    }

    pub fn image_height(&self) -> u32 {
        self.height.unsigned_abs()
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

pub(crate) fn parse(data: &[u8], warnings: &mut Vec<DecodeWarning>) -> Result<BitmapHeader, BitmapError> {
    if data.len() < 2 || &data[..2] != b"BM" {
        return Err(BitmapError::MalformedMagic);
    }
    let mut c = Cursor::new(data);
    c.skip(2)?;
    let file_size = c.read_u32_le()?;
    let reserved = [c.read_u16_le()?, c.read_u16_le()?];
    let pixel_data_offset = c.read_u32_le()?;
    let header_size = c.read_u32_le()?;

    let mut h = match header_size {
        CORE_HEADER_SIZE => {
            let width = i32::from(c.read_i16_le()?);
            let height = i32::from(c.read_i16_le()?);
            let planes = c.read_u16_le()?;
            let bits_per_pixel = c.read_u16_le()?;
            blank_header(Dialect::Core2, width, height, planes, bits_per_pixel, Compression::None)
        }
        INFO_HEADER_SIZE | V4_HEADER_SIZE | V5_HEADER_SIZE => {
            let width = c.read_i32_le()?;
            let height = c.read_i32_le()?;
            let planes = c.read_u16_le()?;
            let bits_per_pixel = c.read_u16_le()?;
            let code = c.read_u32_le()?;
            let compression =
                Compression::from_u32(code).ok_or(BitmapError::UnsupportedCompression(code))?;
            let mut h = blank_header(
                Dialect::Windows3,
                width,
                height,
                planes,
                bits_per_pixel,
                compression,
            );
            h.image_size = c.read_u32_le()?;
            h.x_pixels_per_meter = c.read_i32_le()?;
            h.y_pixels_per_meter = c.read_i32_le()?;
            h.colors_used = c.read_u32_le()?;
            h.colors_important = c.read_u32_le()?;

            if header_size == INFO_HEADER_SIZE {
                if compression == Compression::Bitfields {
                    h.dialect = Dialect::Windows3NT;
                    h.masks = Some(ChannelMasks::rgb(
                        c.read_u32_le()?,
                        c.read_u32_le()?,
                        c.read_u32_le()?,
                    ));
                }
            } else {
                read_v4_fields(&mut c, &mut h)?;
                if header_size == V5_HEADER_SIZE {
                    h.dialect = Dialect::Windows5;
                    h.rendering_intent = Some(c.read_u32_le()?);
                    h.profile_location = Some(ProfileLocation {
                        offset: c.read_u32_le()?,
                        size: c.read_u32_le()?,
                    });
                    c.skip(4)?;
                }
            }
            h
        }
        other => return Err(BitmapError::UnsupportedDialect(other)),
    };

    h.file_size = file_size;
    h.reserved = reserved;
    h.pixel_data_offset = pixel_data_offset;
    h.header_size = header_size;

    if h.width <= 0 {
        return Err(BitmapError::InvalidHeader(alloc::format!(
            "width {} must be positive",
            h.width
        )));
    }
    if h.height == 0 || h.height == i32::MIN {
        return Err(BitmapError::InvalidHeader(alloc::format!(
            "height {} is not usable",
            h.height
        )));
    }

    if h.compression.embedded_format().is_none() {
        read_palette(&mut c, &mut h, warnings)?;
    }
    if matches!(
        h.color_space,
        Some(ColorSpaceType::ProfileLinked | ColorSpaceType::ProfileEmbedded)
    ) {
        read_profile(data, &mut h, warnings);
    }

    log::trace!(
        "bitmap header: {:?} {}x{} {} bpp {:?}",
        h.dialect,
        h.width,
        h.height,
        h.bits_per_pixel,
        h.compression
    );
    Ok(h)
}

fn blank_header(
    dialect: Dialect,
    width: i32,
    height: i32,
    planes: u16,
    bits_per_pixel: u16,
    compression: Compression,
) -> BitmapHeader {
    BitmapHeader {
        dialect,
        file_size: 0,
        reserved: [0; 2],
        pixel_data_offset: 0,
        header_size: 0,
        width,
        height,
        planes,
        bits_per_pixel,
        compression,
        image_size: 0,
        x_pixels_per_meter: 0,
        y_pixels_per_meter: 0,
        colors_used: 0,
        colors_important: 0,
        masks: None,
        color_space: None,
        calibration: None,
        rendering_intent: None,
        profile_location: None,
        icc_profile: None,
        palette: Palette::default(),
        declared_palette_entries: 0,
    }
}

fn read_v4_fields(c: &mut Cursor<'_>, h: &mut BitmapHeader) -> Result<(), BitmapError> {
    h.dialect = Dialect::Windows4;
    h.masks = Some(ChannelMasks {
        red: c.read_u32_le()?,
        green: c.read_u32_le()?,
        blue: c.read_u32_le()?,
        alpha: c.read_u32_le()?,
    });
    let color_space = ColorSpaceType::from_u32(c.read_u32_le()?);
    let mut endpoints = [[0i32; 3]; 3];
    for xyz in endpoints.iter_mut() {
        for v in xyz.iter_mut() {
            *v = c.read_i32_le()?;
        }
    }
    let gamma = [c.read_u32_le()?, c.read_u32_le()?, c.read_u32_le()?];
    if color_space == ColorSpaceType::CalibratedRgb {
        h.calibration = Some(Calibration { endpoints, gamma });
    }
    h.color_space = Some(color_space);
    Ok(())
}

fn read_palette(
    c: &mut Cursor<'_>,
    h: &mut BitmapHeader,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<(), BitmapError> {
    let entry_size = if h.dialect == Dialect::Core2 { 3 } else { 4 };
    let declared = if h.dialect == Dialect::Windows3NT && h.colors_used != 0 {
        h.colors_used as usize
    } else {
        let start = c.position() as u64;
        (u64::from(h.pixel_data_offset).saturating_sub(start) / entry_size as u64) as usize
    };
    h.declared_palette_entries = declared;

    let kept = declared.min(Palette::MAX_ENTRIES);
    if declared > kept {
        log::warn!("palette declares {declared} entries, keeping the first {kept}");
        warnings.push(DecodeWarning::PaletteOverflow {
            declared,
            retained: kept,
        });
    }
    // Optional on direct colour: keep what is present.
    let kept = if h.bits_per_pixel > 8 {
        kept.min(c.remaining() / entry_size)
    } else {
        kept
    };
    let raw = c.take(kept * entry_size)?;
    let entries = raw
        .chunks_exact(entry_size)
        .map(|e| PaletteEntry::new(e[2], e[1], e[0]))
        .collect();
    h.palette = Palette::new(entries);
    Ok(())
}

fn read_profile(data: &[u8], h: &mut BitmapHeader, warnings: &mut Vec<DecodeWarning>) {
    let Some(loc) = h.profile_location else {
        return;
    };
    let start = u64::from(FILE_HEADER_SIZE) + u64::from(loc.offset);
    let end = start + u64::from(loc.size);
    match data.get(start as usize..end as usize) {
        Some(bytes) => h.icc_profile = Some(bytes.to_vec()),
        _ => {
            log::warn!(
                "colour profile at {}+{} lies outside the {}-byte file",
                loc.offset,
                loc.size,
                data.len()
            );
            warnings.push(DecodeWarning::ProfileOutOfBounds {
                offset: loc.offset,
                size: loc.size,
            });
        }
    }
}
