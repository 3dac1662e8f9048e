#![no_main]
use libfuzzer_sys::fuzz_target;
use zenbmp::{DecodeRequest, Limits, Rect, RegionSpec};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 24),
        ..Limits::default()
    };

    // Must never panic, truncated or not
    let _ = zenbmp::probe(data);
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .decode(enough::Unstoppable);

    // Region path uses the per-column mapping
    let region = RegionSpec::new()
        .with_source(Rect::new(1, 1, 64, 64))
        .with_subsampling(3, 2)
        .with_destination_offset(2, 1);
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .with_region(region)
        .decode(enough::Unstoppable);
});
