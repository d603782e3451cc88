#![no_main]

use heatshrink_core::{decode_all, encode_all};
use libfuzzer_sys::fuzz_target;

// chosen to match spec.md's W=8 L=4 default pairing used throughout §8's
// concrete scenarios and fuzz sweep.
const DEFAULT_WINDOW_BITS: u8 = 8;
const DEFAULT_LOOKAHEAD_BITS: u8 = 4;

fuzz_target!(|data: &[u8]| {
    // Drive sink/poll in small, uneven chunks rather than one shot: spec.md
    // §8 property 4 requires the compressed stream to be independent of how
    // the input was chunked, so exercising a small chunk size here is a
    // stronger check than feeding the whole slice at once.
    let compressed = encode_all(data, DEFAULT_WINDOW_BITS, DEFAULT_LOOKAHEAD_BITS, 37);
    let decompressed = decode_all(
        &compressed,
        DEFAULT_WINDOW_BITS,
        DEFAULT_LOOKAHEAD_BITS,
        64,
        41,
    );
    assert_eq!(data, decompressed.as_slice());
});
