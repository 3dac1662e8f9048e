//! Decoding hand-assembled bitmaps.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use enough::{StopReason, Unstoppable};
use zenbmp::*;

// ── Builders ────────────────────────────────────────────────────────

struct Bmp {
    width: i32,
    height: i32,
    bpp: u16,
    compression: u32,
    palette: Vec<[u8; 4]>,
    masks: Option<[u32; 3]>,
    image_size: Option<u32>,
    pixels: Vec<u8>,
}

impl Bmp {
    fn new(width: i32, height: i32, bpp: u16, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bpp,
            compression: 0,
            palette: Vec::new(),
            masks: None,
            image_size: None,
            pixels,
        }
    }

    fn gray_palette(mut self, n: usize) -> Self {
        self.palette = (0..n)
            .map(|i| {
                let v = (i * 255 / (n - 1).max(1)) as u8;
                [v, v, v, 0]
            })
            .collect();
        self
    }

    fn compression(mut self, code: u32) -> Self {
        self.compression = code;
        self
    }

    fn masks(mut self, masks: [u32; 3]) -> Self {
        self.masks = Some(masks);
        self
    }

    fn build(&self) -> Vec<u8> {
        let masks_len = if self.masks.is_some() { 12 } else { 0 };
        let offset = 54 + masks_len + self.palette.len() as u32 * 4;
        let file_size = offset + self.pixels.len() as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&file_size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&self.bpp.to_le_bytes());
        out.extend_from_slice(&self.compression.to_le_bytes());
        let image_size = self.image_size.unwrap_or(self.pixels.len() as u32);
        out.extend_from_slice(&image_size.to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&(self.palette.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        if let Some(masks) = self.masks {
            for m in masks {
                out.extend_from_slice(&m.to_le_bytes());
            }
        }
        for e in &self.palette {
            out.extend_from_slice(e);
        }
        out.extend_from_slice(&self.pixels);
        out
    }
}

/// Allows `allowed` checks, then reports cancellation.
struct StopAfter {
    allowed: usize,
    calls: AtomicUsize,
}

impl StopAfter {
    fn new(allowed: usize) -> Self {
        Self {
            allowed,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Stop for StopAfter {
    fn check(&self) -> Result<(), StopReason> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.allowed {
            Ok(())
        } else {
            Err(StopReason::Cancelled)
        }
    }
}

/// 24-bit image where pixel (x, y) is B=x, G=y, R=7.
fn coordinate_image(w: u8, h: u8, bottom_up: bool) -> Vec<u8> {
    let mut rows: Vec<Vec<u8>> = (0..h)
        .map(|y| {
            let mut row: Vec<u8> = (0..w).flat_map(|x| [x, y, 7]).collect();
            row.resize(row.len().next_multiple_of(4), 0);
            row
        })
        .collect();
    let height = if bottom_up {
        rows.reverse();
        i32::from(h)
    } else {
        -i32::from(h)
    };
    Bmp::new(i32::from(w), height, 24, rows.concat()).build()
}

// ── Uncompressed ────────────────────────────────────────────────────

#[test]
fn eight_bit_gray_palette() {
    let row = [10u8, 20, 30, 40, 50, 60, 70, 80];
    let file = Bmp::new(8, 2, 8, [row, row].concat())
        .gray_palette(256)
        .build();
    let decoded = decode(&file, Unstoppable).unwrap();
    assert!(decoded.is_complete());
    assert!(decoded.grayscale_palette);
    assert_eq!((decoded.width(), decoded.height()), (8, 2));
    assert_eq!(decoded.pixels.sample(0, 0, 0), Some(10));
    assert_eq!(decoded.pixels.sample(7, 1, 0), Some(80));
    assert_eq!(decoded.layout().palette().map(Palette::len), Some(256));
    assert_eq!(decoded.header.dialect, Dialect::Windows3);
    assert!(decoded.warnings.is_empty());
}

#[test]
fn one_and_four_bit_indices_are_msb_first() {
    let file = Bmp::new(10, -2, 1, vec![0b1010_1010, 0b1100_0000, 0, 0, 0xFF, 0xC0, 0, 0])
        .gray_palette(2)
        .build();
    let px = decode(&file, Unstoppable).unwrap().into_pixels();
    let row0: Vec<u32> = (0..10).map(|x| px.sample(x, 0, 0).unwrap()).collect();
    assert_eq!(row0, [1, 0, 1, 0, 1, 0, 1, 0, 1, 1]);
    assert!((0..10).all(|x| px.sample(x, 1, 0) == Some(1)));

    let file = Bmp::new(3, 1, 4, vec![0x12, 0x30, 0, 0])
        .gray_palette(16)
        .build();
    let px = decode(&file, Unstoppable).unwrap().into_pixels();
    assert_eq!(px.samples().as_u8(), Some(&[0x12, 0x30][..]));
    assert_eq!(px.sample(2, 0, 0), Some(3));
}

#[test]
fn bottom_up_rows_are_flipped() {
    let file = Bmp::new(1, 2, 24, vec![1, 2, 3, 0, 4, 5, 6, 0]).build();
    let decoded = decode(&file, Unstoppable).unwrap();
    assert!(decoded.header.is_bottom_up());
    assert_eq!(decoded.layout(), &PixelLayout::BGR24);
    assert_eq!(decoded.pixels.samples().as_u8(), Some(&[4, 5, 6, 1, 2, 3][..]));
}

#[test]
fn top_down_and_bottom_up_agree() {
    let a = decode(&coordinate_image(5, 3, true), Unstoppable).unwrap();
    let b = decode(&coordinate_image(5, 3, false), Unstoppable).unwrap();
    assert_eq!(a.pixels, b.pixels);
    assert_eq!(a.pixels.sample(4, 2, 0), Some(4));
    assert_eq!(a.pixels.sample(4, 2, 1), Some(2));
}

#[test]
fn sixteen_bit_defaults_to_555() {
    let file = Bmp::new(2, 1, 16, vec![0x00, 0x7C, 0x1F, 0x00]).build();
    let decoded = decode(&file, Unstoppable).unwrap();
    assert_eq!(
        decoded.layout(),
        &PixelLayout::DirectMasked {
            bits_per_pixel: 16,
            masks: ChannelMasks::RGB555
        }
    );
    assert_eq!(decoded.pixels.samples().as_u16(), Some(&[0x7C00, 0x001F][..]));
}

#[test]
fn sixteen_bit_bitfields_565() {
    let file = Bmp::new(1, 1, 16, vec![0xE0, 0x07, 0, 0])
        .compression(3)
        .masks([0xF800, 0x07E0, 0x001F])
        .build();
    let decoded = decode(&file, Unstoppable).unwrap();
    assert_eq!(decoded.header.dialect, Dialect::Windows3NT);
    assert_eq!(decoded.header.compression, Compression::Bitfields);
    assert_eq!(
        decoded.layout(),
        &PixelLayout::DirectMasked {
            bits_per_pixel: 16,
            masks: ChannelMasks::RGB565
        }
    );
    assert_eq!(decoded.pixels.sample(0, 0, 0), Some(0x07E0));
}

#[test]
fn thirty_two_bit_defaults_to_argb() {
    let file = Bmp::new(1, 1, 32, vec![0x33, 0x22, 0x11, 0x80]).build();
    let decoded = decode(&file, Unstoppable).unwrap();
    assert_eq!(
        decoded.layout(),
        &PixelLayout::DirectMasked {
            bits_per_pixel: 32,
            masks: ChannelMasks::ARGB8888
        }
    );
    assert_eq!(decoded.pixels.samples().as_u32(), Some(&[0x8011_2233][..]));
}

#[test]
fn windows4_header_carries_alpha_mask_and_colour_space() {
    let mut file = Vec::new();
    let offset = 14u32 + 108;
    file.extend_from_slice(b"BM");
    file.extend_from_slice(&(offset + 4).to_le_bytes());
    file.extend_from_slice(&0u32.to_le_bytes());
    file.extend_from_slice(&offset.to_le_bytes());
    file.extend_from_slice(&108u32.to_le_bytes());
    file.extend_from_slice(&1i32.to_le_bytes());
    file.extend_from_slice(&1i32.to_le_bytes());
    file.extend_from_slice(&1u16.to_le_bytes());
    file.extend_from_slice(&32u16.to_le_bytes());
    file.extend_from_slice(&3u32.to_le_bytes());
    file.extend_from_slice(&4u32.to_le_bytes());
    file.extend_from_slice(&[0u8; 16]);
    for m in [0x0000_FF00u32, 0x00FF_0000, 0xFF00_0000, 0x0000_00FF] {
        file.extend_from_slice(&m.to_le_bytes());
    }
    file.extend_from_slice(b"BGRs");
    file.extend_from_slice(&[0u8; 48]);
    assert_eq!(file.len(), offset as usize);
    file.extend_from_slice(&[0x40, 0x30, 0x20, 0x10]);

    let decoded = decode(&file, Unstoppable).unwrap();
    assert_eq!(decoded.header.dialect, Dialect::Windows4);
    assert_eq!(decoded.color_space, Some(ColorSpaceType::Srgb));
    let PixelLayout::DirectMasked { masks, .. } = decoded.layout() else {
        panic!("unexpected layout {:?}", decoded.layout());
    };
    assert_eq!(masks.alpha, 0xFF);
    assert_eq!(ChannelMasks::extract(0x1020_3040, masks.red), 0x30);
    assert_eq!(decoded.pixels.sample(0, 0, 0), Some(0x1020_3040));
}

#[test]
fn oversized_palette_is_capped() {
    let palette: Vec<[u8; 4]> = (0..300).map(|i| [(i % 256) as u8, 0, 0, 0]).collect();
    let mut bmp = Bmp::new(4, 1, 8, vec![255, 0, 1, 2]);
    bmp.palette = palette;
    let decoded = decode(&bmp.build(), Unstoppable).unwrap();
    assert_eq!(decoded.header.declared_palette_entries, 300);
    assert_eq!(decoded.layout().palette().map(Palette::len), Some(256));
    assert_eq!(
        decoded.warnings,
        vec![DecodeWarning::PaletteOverflow {
            declared: 300,
            retained: 256
        }]
    );
    assert_eq!(decoded.pixels.sample(0, 0, 0), Some(255));
}

#[test]
fn missing_palette_gets_gray_ramp() {
    let file = Bmp::new(4, 1, 4, vec![0x0F, 0, 0, 0]).build();
    let decoded = decode(&file, Unstoppable).unwrap();
    assert_eq!(
        decoded.warnings,
        vec![DecodeWarning::MissingPalette { synthesized: 16 }]
    );
    assert!(decoded.grayscale_palette);
}

// ── Errors and partial results ──────────────────────────────────────

#[test]
fn structural_errors_are_fatal() {
    let good = Bmp::new(1, 1, 24, vec![0; 4]).build();

    let mut bad = good.clone();
    bad[0] = b'X';
    assert!(matches!(decode(&bad, Unstoppable), Err(BitmapError::MalformedMagic)));

    let mut bad = good.clone();
    bad[14..18].copy_from_slice(&50u32.to_le_bytes());
    assert!(matches!(
        decode(&bad, Unstoppable),
        Err(BitmapError::UnsupportedDialect(50))
    ));

    let mut bad = good.clone();
    bad[30..34].copy_from_slice(&9u32.to_le_bytes());
    assert!(matches!(
        decode(&bad, Unstoppable),
        Err(BitmapError::UnsupportedCompression(9))
    ));

    let err = decode(&good[..20], Unstoppable).unwrap_err();
    assert!(matches!(err, BitmapError::Truncated { rows_decoded: 0, .. }));
    assert!(err.partial().is_none());
}

#[test]
fn truncated_pixels_keep_finished_rows() {
    let file = Bmp::new(4, -4, 8, vec![1, 1, 1, 1, 2, 2, 2, 2])
        .gray_palette(256)
        .build();
    let err = decode(&file, Unstoppable).unwrap_err();
    let BitmapError::Truncated { rows_decoded, .. } = &err else {
        panic!("expected truncation, got {err:?}");
    };
    assert_eq!(*rows_decoded, 2);
    let partial = err.partial().unwrap();
    assert_eq!(partial.pixels.sample(3, 1, 0), Some(2));
    assert_eq!(partial.pixels.sample(0, 2, 0), Some(0));
}

#[test]
fn stop_signal_returns_partial_image() {
    let file = Bmp::new(2, -4, 8, vec![1, 1, 0, 0, 2, 2, 0, 0, 3, 3, 0, 0, 4, 4, 0, 0])
        .gray_palette(256)
        .build();
    let decoded = DecodeRequest::new(&file)
        .decode(StopAfter::new(2))
        .unwrap();
    assert_eq!(decoded.status, Status::Aborted);
    assert_eq!(decoded.pixels.sample(0, 1, 0), Some(2));
    assert_eq!(decoded.pixels.sample(0, 2, 0), Some(0));
}

#[test]
fn progress_reaches_one_hundred() {
    let file = coordinate_image(3, 5, true);
    let mut seen = Vec::new();
    let mut record = |p: f32| seen.push(p);
    DecodeRequest::new(&file)
        .with_progress(&mut record)
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(seen.len(), 5);
    assert_eq!(seen.last().copied(), Some(100.0));
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn limits_are_enforced() {
    let file = coordinate_image(8, 8, true);
    let limits = Limits {
        max_pixels: Some(32),
        ..Limits::default()
    };
    assert!(matches!(
        DecodeRequest::new(&file).with_limits(&limits).decode(Unstoppable),
        Err(BitmapError::LimitExceeded(_))
    ));
}

// ── Regions, subsampling and bands ──────────────────────────────────

#[test]
fn region_with_subsampling_and_offset() {
    for bottom_up in [true, false] {
        let file = coordinate_image(4, 4, bottom_up);
        let region = RegionSpec::new()
            .with_source(Rect::new(1, 1, 3, 3))
            .with_subsampling(2, 2)
            .with_destination_offset(1, 0);
        let px = DecodeRequest::new(&file)
            .with_region(region)
            .decode(Unstoppable)
            .unwrap()
            .into_pixels();
        assert_eq!((px.width(), px.height()), (3, 2));
        assert_eq!(px.sample(0, 0, 2), Some(0), "offset column stays empty");
        assert_eq!(px.sample(1, 0, 0), Some(1));
        assert_eq!(px.sample(1, 0, 1), Some(1));
        assert_eq!(px.sample(2, 1, 0), Some(3));
        assert_eq!(px.sample(2, 1, 1), Some(3));
        assert_eq!(px.sample(2, 1, 2), Some(7));
    }
}

#[test]
fn region_matches_full_decode_on_every_depth() {
    let region = RegionSpec::new()
        .with_source(Rect::new(1, 1, 6, 4))
        .with_subsampling(2, 3);
    for (bpp, palette) in [(1u16, 2usize), (4, 16), (8, 256), (16, 0), (24, 0), (32, 0)] {
        let row_bytes = (7 * usize::from(bpp)).div_ceil(8).next_multiple_of(4);
        let pixels: Vec<u8> = (0..row_bytes * 5).map(|i| (i * 37 % 251) as u8).collect();
        let file = Bmp::new(7, 5, bpp, pixels).gray_palette(palette).build();

        let full = decode(&file, Unstoppable).unwrap().into_pixels();
        let part = DecodeRequest::new(&file)
            .with_region(region.clone())
            .decode(Unstoppable)
            .unwrap()
            .into_pixels();
        assert_eq!((part.width(), part.height()), (3, 2), "{bpp} bpp");
        assert_eq!(part.layout(), full.layout());
        let bands = if bpp == 24 { 3 } else { 1 };
        for j in 0..2 {
            for i in 0..3 {
                for b in 0..bands {
                    assert_eq!(
                        part.sample(i, j, b),
                        full.sample(1 + 2 * i, 1 + 3 * j, b),
                        "{bpp} bpp at ({i}, {j}) band {b}"
                    );
                }
            }
        }
    }
}

#[test]
fn band_selection_on_bgr() {
    let file = coordinate_image(3, 2, true);

    let red = DecodeRequest::new(&file)
        .with_region(RegionSpec::new().with_bands(vec![2], vec![0]))
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(red.layout(), &PixelLayout::Bgr { bands: 1 });
    assert!(red.pixels.samples().as_u8().unwrap().iter().all(|&v| v == 7));

    let swapped = DecodeRequest::new(&file)
        .with_region(RegionSpec::new().with_bands(vec![2, 1, 0], vec![0, 1, 2]))
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(swapped.pixels.sample(2, 1, 0), Some(7));
    assert_eq!(swapped.pixels.sample(2, 1, 2), Some(2));
}

#[test]
fn band_selection_on_direct_colour() {
    let file = Bmp::new(1, 1, 32, vec![0x33, 0x22, 0x11, 0x80]).build();
    let rgb = DecodeRequest::new(&file)
        .with_region(RegionSpec::new().with_bands(vec![0, 1, 2], vec![0, 1, 2]))
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(
        rgb.layout(),
        &PixelLayout::DirectMasked {
            bits_per_pixel: 32,
            masks: ChannelMasks::RGB888
        }
    );
    assert_eq!(rgb.pixels.sample(0, 0, 0), Some(0x0011_2233));

    let red = DecodeRequest::new(&file)
        .with_region(RegionSpec::new().with_bands(vec![0], vec![0]))
        .decode(Unstoppable)
        .unwrap();
    let PixelLayout::DirectMasked { masks, .. } = red.layout() else {
        panic!("expected direct colour, got {:?}", red.layout());
    };
    assert_eq!(*masks, ChannelMasks::rgb(0xFF_0000, 0, 0));
    let word = red.pixels.sample(0, 0, 0).unwrap();
    assert_eq!(word & !(masks.red | masks.green | masks.blue | masks.alpha), 0);
    assert_eq!(word, 0x0011_0000);

    let reordered = DecodeRequest::new(&file)
        .with_region(RegionSpec::new().with_bands(vec![1, 0], vec![0, 1]))
        .decode(Unstoppable);
    assert!(matches!(reordered, Err(BitmapError::InvalidParameter(_))));
}

#[test]
fn subsampled_one_bit_columns() {
    let file = Bmp::new(10, -1, 1, vec![0b1010_1010, 0b1100_0000, 0, 0])
        .gray_palette(2)
        .build();
    let px = DecodeRequest::new(&file)
        .with_region(
            RegionSpec::new()
                .with_source(Rect::new(1, 0, 9, 1))
                .with_subsampling(2, 1),
        )
        .decode(Unstoppable)
        .unwrap()
        .into_pixels();
    let row: Vec<u32> = (0..px.width()).map(|x| px.sample(x, 0, 0).unwrap()).collect();
    assert_eq!(row, [0, 0, 0, 0, 1]);
}

// ── Run-length data ─────────────────────────────────────────────────

fn rle8_grid() -> Bmp {
    let payload = vec![
        3, 5, 0, 0, // bottom line: run of three 5s
        0, 3, 1, 2, 3, 0, 0, 0, // absolute 1,2,3 plus pad, end of line
        0, 2, 1, 0, // move right one
        2, 9, 0, 1, // run of two 9s, end of bitmap
    ];
    Bmp::new(4, 3, 8, payload).compression(1).gray_palette(256)
}

fn rows_u8(px: &PixelBuffer) -> Vec<Vec<u32>> {
    (0..px.height())
        .map(|y| (0..px.width()).map(|x| px.sample(x, y, 0).unwrap()).collect())
        .collect()
}

#[test]
fn rle8_opcodes() {
    let decoded = decode(&rle8_grid().build(), Unstoppable).unwrap();
    assert_eq!(decoded.header.compression, Compression::Rle8);
    assert_eq!(
        rows_u8(&decoded.pixels),
        [vec![0, 9, 9, 0], vec![1, 2, 3, 0], vec![5, 5, 5, 0]]
    );
}

#[test]
fn rle8_delta_skips_lines() {
    let file = Bmp::new(2, 3, 8, vec![1, 7, 0, 2, 0, 2, 1, 8, 0, 1])
        .compression(1)
        .gray_palette(256)
        .build();
    let decoded = decode(&file, Unstoppable).unwrap();
    assert_eq!(rows_u8(&decoded.pixels), [vec![0, 8], vec![0, 0], vec![7, 0]]);
}

#[test]
fn rle4_runs_and_absolute() {
    let payload = vec![5, 0x12, 0, 0, 0, 3, 0x45, 0x60, 2, 0x77, 0, 1];
    let file = Bmp::new(5, 2, 4, payload)
        .compression(2)
        .gray_palette(16)
        .build();
    let decoded = decode(&file, Unstoppable).unwrap();
    assert_eq!(
        rows_u8(&decoded.pixels),
        [vec![4, 5, 6, 7, 7], vec![1, 2, 1, 2, 1]]
    );
}

#[test]
fn rle_with_subsampling() {
    let decoded = DecodeRequest::new(&rle8_grid().build())
        .with_region(RegionSpec::new().with_subsampling(2, 2))
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(rows_u8(&decoded.pixels), [vec![0, 9], vec![5, 5]]);
}

#[test]
fn rle_payload_shorter_than_declared() {
    let mut bmp = rle8_grid();
    let available = bmp.pixels.len();
    bmp.image_size = Some(1000);
    let decoded = decode(&bmp.build(), Unstoppable).unwrap();
    assert_eq!(
        decoded.warnings,
        vec![DecodeWarning::PayloadShorterThanDeclared {
            declared: 1000,
            available
        }]
    );
    assert_eq!(decoded.pixels.sample(1, 0, 0), Some(9));
}

#[test]
fn rle_truncated_inside_opcode() {
    let file = Bmp::new(4, 3, 8, vec![3, 5, 0, 0, 0, 3, 1])
        .compression(1)
        .gray_palette(256)
        .build();
    let err = decode(&file, Unstoppable).unwrap_err();
    assert!(matches!(err, BitmapError::Truncated { rows_decoded: 1, .. }));
    let partial = err.partial().unwrap();
    assert_eq!(rows_u8(&partial.pixels)[2], vec![5, 5, 5, 0]);
}

// ── Embedded payloads ───────────────────────────────────────────────

/// Stand-in PNG codec: returns a 1x1 pixel and remembers what it was given.
#[derive(Default)]
struct FakePng {
    seen: RefCell<Vec<u8>>,
}

impl EmbeddedCodec for FakePng {
    fn decode(
        &self,
        format: EmbeddedFormat,
        data: &[u8],
        _region: &RegionSpec,
        _stop: &dyn Stop,
    ) -> Result<PixelBuffer, BitmapError> {
        assert_eq!(format, EmbeddedFormat::Png);
        self.seen.borrow_mut().extend_from_slice(data);
        PixelBuffer::from_samples(1, 1, PixelLayout::BGR24, Samples::U8(vec![1, 2, 3]))
    }

    fn encode(
        &self,
        _format: EmbeddedFormat,
        _image: &PixelBuffer,
        _region: &RegionSpec,
        _stop: &dyn Stop,
    ) -> Result<Vec<u8>, BitmapError> {
        Ok(b"PNGDATA".to_vec())
    }
}

#[test]
fn embedded_png_goes_through_codec() {
    let file = Bmp::new(1, 1, 0, b"\x89PNG fake".to_vec())
        .compression(5)
        .build();

    assert!(matches!(
        decode(&file, Unstoppable),
        Err(BitmapError::MissingEmbeddedCodec(EmbeddedFormat::Png))
    ));

    let codec = FakePng::default();
    let decoded = DecodeRequest::new(&file)
        .with_embedded_codec(&codec)
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(codec.seen.borrow().as_slice(), b"\x89PNG fake");
    assert_eq!(decoded.header.compression, Compression::Png);
    assert_eq!(decoded.pixels.sample(0, 0, 2), Some(3));

    // the codec's 3-byte buffer is held to the memory limit
    let limits = Limits {
        max_memory_bytes: Some(2),
        ..Limits::default()
    };
    let limited = DecodeRequest::new(&file)
        .with_embedded_codec(&codec)
        .with_limits(&limits)
        .decode(Unstoppable);
    assert!(matches!(limited, Err(BitmapError::LimitExceeded(_))));
}

#[test]
fn colour_table_on_direct_colour_is_carried_not_applied() {
    let mut bmp = Bmp::new(1, 1, 24, vec![0x10, 0x20, 0x30, 0]);
    bmp.palette = vec![[1, 2, 3, 0], [4, 5, 6, 0]];
    let decoded = decode(&bmp.build(), Unstoppable).unwrap();
    assert_eq!(decoded.header.palette.len(), 2);
    assert_eq!(decoded.header.declared_palette_entries, 2);
    assert_eq!(decoded.layout(), &PixelLayout::BGR24);
    assert_eq!(decoded.pixels.sample(0, 0, 2), Some(0x30));
    assert!(decoded.warnings.is_empty());
}
