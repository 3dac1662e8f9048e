#![no_main]
use libfuzzer_sys::fuzz_target;
use zenbmp::*;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must re-encode and decode to the same pixels
    let limits = Limits {
        max_pixels: Some(1 << 22),
        ..Limits::default()
    };
    let Ok(decoded) = DecodeRequest::new(data)
        .with_limits(&limits)
        .decode(enough::Unstoppable)
    else {
        return;
    };

    let Ok(reencoded) = EncodeRequest::new().encode(&decoded.pixels, enough::Unstoppable) else {
        // some mask layouts have no plain or bitfield encoding
        return;
    };
    let Ok(decoded2) = decode(&reencoded.data, enough::Unstoppable) else {
        panic!("re-encoded data failed to decode");
    };

    assert_eq!(decoded.width(), decoded2.width());
    assert_eq!(decoded.height(), decoded2.height());
    if decoded.layout() == decoded2.layout() {
        assert_eq!(decoded.pixels, decoded2.pixels, "roundtrip pixel mismatch");
    }
});
