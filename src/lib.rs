//! A streaming LZSS-style codec tuned for memory-constrained targets.
//!
//! The core state machines ([`encoder::Encoder`]/[`encoder::StaticEncoder`]
//! and [`decoder::Decoder`]/[`decoder::StaticDecoder`]) never allocate or
//! block: each call to `sink`/`poll`/`finish` makes as much progress as the
//! buffers on hand allow and then returns, so the caller drives the whole
//! pipeline — there is no internal thread, callback, or hidden I/O. This
//! makes the algorithm equally at home compressing a file on a workstation
//! and compressing sensor readings on a microcontroller with a few hundred
//! bytes of RAM to spare.
//!
//! Wire format in one sentence: a stream of 1-bit tags, each followed either
//! by an 8-bit literal byte or by a `window_bits`-bit back-reference index
//! and a `lookahead_bits`-bit run length, packed MSB-first with no framing,
//! headers, or checksums (see [`bitio`]).
//!
//! `std` is enabled by default and brings in the heap-backed [`Encoder`]/
//! [`Decoder`], the [`encode_all`]/[`decode_all`] one-shot helpers, and the
//! `heatshrink` CLI binary. Disabling it (`default-features = false`) keeps
//! the crate `no_std` + `alloc`-free, leaving only [`StaticEncoder`] and
//! [`StaticDecoder`] (and the parts of [`bitio`] that don't allocate).

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate alloc;

pub mod bitio;
pub mod decoder;
pub mod encoder;
pub mod io;

pub use decoder::{Decoder, FinishStatus as DecoderFinishStatus, PollStatus as DecoderPollStatus,
    SinkStatus as DecoderSinkStatus, StaticDecoder};
pub use encoder::{Encoder, FinishStatus as EncoderFinishStatus, PollStatus as EncoderPollStatus,
    SinkStatus as EncoderSinkStatus, StaticEncoder};

#[cfg(feature = "std")]
use alloc::vec;
#[cfg(feature = "std")]
use alloc::vec::Vec;

/// Compress all of `input` in one call, feeding it through a freshly
/// constructed [`Encoder`] in `chunk_size`-byte pieces.
///
/// This is a convenience wrapper, not a new wire format: the returned bytes
/// are exactly what driving the same [`Encoder`] by hand would produce.
#[cfg(feature = "std")]
pub fn encode_all(input: &[u8], window_bits: u8, lookahead_bits: u8, chunk_size: usize) -> Vec<u8> {
    let mut encoder =
        Encoder::new(window_bits, lookahead_bits).expect("invalid window/lookahead parameters");
    let mut compressed = Vec::new();
    let mut scratch = vec![0u8; chunk_size.max(1) * 2];

    for chunk in input.chunks(chunk_size.max(1)) {
        let mut remaining = chunk;
        while !remaining.is_empty() {
            match encoder.sink(remaining) {
                EncoderSinkStatus::Ok(n) => remaining = &remaining[n..],
                EncoderSinkStatus::Misuse => unreachable!("encoder not finishing, state just filled"),
            }
            drain_encoder(&mut encoder, &mut scratch, &mut compressed);
        }
    }

    while !matches!(encoder.finish(), EncoderFinishStatus::Done) {
        drain_encoder(&mut encoder, &mut scratch, &mut compressed);
    }
    drain_encoder(&mut encoder, &mut scratch, &mut compressed);

    compressed
}

#[cfg(feature = "std")]
fn drain_encoder(encoder: &mut Encoder, scratch: &mut [u8], out: &mut Vec<u8>) {
    loop {
        match encoder.poll(scratch) {
            EncoderPollStatus::Empty(n) => {
                out.extend_from_slice(&scratch[..n]);
                break;
            }
            EncoderPollStatus::More(n) => out.extend_from_slice(&scratch[..n]),
            EncoderPollStatus::Misuse => unreachable!("scratch buffer is never empty"),
        }
    }
}

/// Decompress all of `input` in one call, feeding it through a freshly
/// constructed [`Decoder`] in `chunk_size`-byte pieces.
#[cfg(feature = "std")]
pub fn decode_all(
    input: &[u8],
    window_bits: u8,
    lookahead_bits: u8,
    input_buffer_size: u16,
    chunk_size: usize,
) -> Vec<u8> {
    let mut decoder = Decoder::new(window_bits, lookahead_bits, input_buffer_size)
        .expect("invalid window/lookahead/input_buffer_size parameters");
    let mut decompressed = Vec::new();
    let mut scratch = vec![0u8; chunk_size.max(1) * 2];

    for chunk in input.chunks(chunk_size.max(1)) {
        let mut remaining = chunk;
        while !remaining.is_empty() {
            match decoder.sink(remaining) {
                DecoderSinkStatus::Ok(n) => remaining = &remaining[n..],
                DecoderSinkStatus::Full => drain_decoder(&mut decoder, &mut scratch, &mut decompressed),
            }
        }
        drain_decoder(&mut decoder, &mut scratch, &mut decompressed);
    }

    while !matches!(decoder.finish(), DecoderFinishStatus::Done) {
        drain_decoder(&mut decoder, &mut scratch, &mut decompressed);
    }
    drain_decoder(&mut decoder, &mut scratch, &mut decompressed);

    decompressed
}

#[cfg(feature = "std")]
fn drain_decoder(decoder: &mut Decoder, scratch: &mut [u8], out: &mut Vec<u8>) {
    loop {
        match decoder.poll(scratch) {
            DecoderPollStatus::Empty(n) => {
                out.extend_from_slice(&scratch[..n]);
                break;
            }
            DecoderPollStatus::More(n) => out.extend_from_slice(&scratch[..n]),
            DecoderPollStatus::Unknown => unreachable!("decoder state machine is exhaustive"),
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rayon::prelude::*;

    #[test]
    fn round_trip_repeated_bytes() {
        let input: Vec<u8> = (0..100u8).flat_map(|x| vec![x; 10]).collect();
        let compressed = encode_all(&input, 8, 4, 16);
        let decompressed = decode_all(&compressed, 8, 4, 100, 16);
        assert_eq!(input, decompressed);
    }

    #[test]
    fn round_trip_empty_input() {
        let compressed = encode_all(&[], 8, 4, 16);
        let decompressed = decode_all(&compressed, 8, 4, 64, 16);
        assert!(decompressed.is_empty());
    }

    // Regression seeds named in spec §8: sizes/parameters that historically
    // tripped up window-clamping or counter-overflow bugs in this family of
    // codecs. Kept as deterministic unit tests since this crate can't run
    // `cargo fuzz` here (see `fuzz/`).
    #[test]
    fn regression_window_clamp_size_337() {
        let input: Vec<u8> = (0..337u32).map(|i| ((i * 2654435761) >> 24) as u8).collect();
        let compressed = encode_all(&input, 8, 4, 64);
        let decompressed = decode_all(&compressed, 8, 4, 256, 64);
        assert_eq!(input, decompressed);
    }

    #[test]
    fn regression_no_16_bit_counter_overflow_64ki() {
        let input: Vec<u8> = (0..65536u32).map(|i| (i % 251) as u8).collect();
        let compressed = encode_all(&input, 11, 6, 1024);
        let decompressed = decode_all(&compressed, 11, 6, 1024, 1024);
        assert_eq!(input, decompressed);
    }

    #[test]
    fn regression_index_agreement_size_507() {
        let mut state = 3u32;
        let input: Vec<u8> = (0..507)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                (state >> 16) as u8
            })
            .collect();
        let compressed = encode_all(&input, 9, 5, 32);
        let decompressed = decode_all(&compressed, 9, 5, 128, 32);
        assert_eq!(input, decompressed);
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let compressed = encode_all(&data, 8, 4, 37);
            let decompressed = decode_all(&compressed, 8, 4, 64, 41);
            prop_assert_eq!(data, decompressed);
        }

        #[test]
        fn round_trip_arbitrary_chunking(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            chunk in 1usize..64,
            out_chunk in 1usize..64,
        ) {
            let compressed = encode_all(&data, 9, 5, chunk);
            let decompressed = decode_all(&compressed, 9, 5, 96, out_chunk);
            prop_assert_eq!(data, decompressed);
        }
    }

    #[test]
    fn parameter_sweep_round_trips() {
        let samples: Vec<(&'static str, Vec<u8>)> = vec![
            ("zeros", vec![0u8; 600]),
            ("text", b"the quick brown fox jumps over the lazy dog ".repeat(20)),
            ("ramp", (0..600u32).map(|i| i as u8).collect()),
        ];

        let mut configs = Vec::new();
        for window_bits in bitio::MIN_WINDOW_BITS..=12 {
            for lookahead_bits in bitio::MIN_LOOKAHEAD_BITS..window_bits {
                for (name, data) in &samples {
                    configs.push((window_bits, lookahead_bits, name, data));
                }
            }
        }

        configs.into_par_iter().for_each(|(w, l, name, data)| {
            let compressed = encode_all(data, w, l, 64);
            let decompressed = decode_all(&compressed, w, l, 256, 64);
            assert_eq!(*data, decompressed, "round trip failed for {name} at w={w} l={l}");
        });
    }
}
