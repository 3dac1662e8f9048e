#!/usr/bin/env -S cargo +nightly -Zscript
//! Generate seed corpus files for fuzzing.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

fn info_header(width: i32, height: i32, bpp: u16, compression: u32, palette: u32, data: &[u8]) -> Vec<u8> {
    let offset = 54 + palette * 4;
    let mut out = Vec::new();
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(offset + data.len() as u32).to_le_bytes()); // file size
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes()); // data offset
    out.extend_from_slice(&40u32.to_le_bytes()); // info header size
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&bpp.to_le_bytes());
    out.extend_from_slice(&compression.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes()); // image size
    out.extend_from_slice(&[0u8; 8]); // resolution
    out.extend_from_slice(&palette.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for i in 0..palette {
        let v = (i * 255 / palette.max(2).saturating_sub(1)) as u8;
        out.extend_from_slice(&[v, v, v, 0]);
    }
    out.extend_from_slice(data);
    out
}

fn main() {
    use std::fs;
    let dir = "fuzz/corpus/fuzz_decode";
    fs::create_dir_all(dir).unwrap();

    fs::write(format!("{dir}/bgr24_1x1.bmp"), info_header(1, 1, 24, 0, 0, &[0xff, 0, 0, 0])).unwrap();
    fs::write(format!("{dir}/gray8_top_down.bmp"), info_header(4, -2, 8, 0, 256, &[1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
    fs::write(format!("{dir}/mono_10x1.bmp"), info_header(10, 1, 1, 0, 2, &[0xaa, 0xc0, 0, 0])).unwrap();
    fs::write(format!("{dir}/rgb555_2x1.bmp"), info_header(2, 1, 16, 0, 0, &[0, 0x7c, 0x1f, 0])).unwrap();
    fs::write(format!("{dir}/rle8.bmp"), info_header(4, 2, 8, 1, 256, &[3, 5, 0, 0, 0, 3, 1, 2, 3, 0, 0, 1])).unwrap();
    fs::write(format!("{dir}/rle4.bmp"), info_header(5, 1, 4, 2, 16, &[5, 0x12, 0, 1])).unwrap();

    // Truncated/malformed seeds for edge coverage
    fs::write(format!("{dir}/empty.bin"), b"").unwrap();
    fs::write(format!("{dir}/bm_short.bin"), b"BM\x00\x00").unwrap();
    let mut cut = info_header(8, 8, 24, 0, 0, &[0; 96]);
    cut.truncate(100);
    fs::write(format!("{dir}/bgr24_truncated.bmp"), cut).unwrap();

    println!("Generated seed corpus in {dir}/");
}
