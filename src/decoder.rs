//! Streaming LZSS-style decoder.
//!
//! Mirrors `encoder`'s shape: [`Decoder`] is heap-backed and
//! runtime-parameterized, [`StaticDecoder`] is const-generic and
//! allocation-free, and both wrap a private [`DecoderCore`] that carries
//! only the scalar state. The state machine follows the seven states and
//! the suspendable `get_bits` contract of the reference bitstream format
//! exactly (see `decoder`'s inline tests for the named concrete scenarios).

use crate::bitio::{validate_window_and_lookahead, ConfigError, OutputInfo};

#[cfg(feature = "std")]
extern crate alloc;
#[cfg(feature = "std")]
use alloc::vec;
#[cfg(feature = "std")]
use alloc::vec::Vec;

/// Outcome of [`Decoder::sink`] / [`StaticDecoder::sink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// `usize` bytes were copied into the decoder's input ring.
    Ok(usize),
    /// The input ring is full; drain it with [`poll`](Decoder::poll) first.
    Full,
}

/// Outcome of [`Decoder::poll`] / [`StaticDecoder::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// `usize` bytes were produced; the decoder needs more input to make
    /// further progress.
    Empty(usize),
    /// `usize` bytes were produced and the output buffer is full; poll
    /// again with a fresh buffer.
    More(usize),
    /// The state machine reached a state with no defined transition. This
    /// cannot happen with the states this crate defines; it exists so the
    /// status enum has a variant to grow into, matching the reference
    /// decoder's own `HSDR_POLL_ERROR_UNKNOWN`.
    Unknown,
}

/// Outcome of [`Decoder::finish`] / [`StaticDecoder::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishStatus {
    /// Every sunk bit has been decoded.
    Done,
    /// Call [`poll`](Decoder::poll) again; there is more input to consume.
    More,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    InputAvailable,
    YieldLiteral,
    BackrefIndex,
    BackrefCount,
    YieldBackref,
    CheckForMoreInput,
}

/// Scalar state machine shared by [`Decoder`] and [`StaticDecoder`]. The
/// buffer passed to every method is laid out as `[0..input_buffer_size)` =
/// the input ring, followed by `[input_buffer_size..input_buffer_size +
/// window_size)` = the circular window of already-decoded bytes.
#[derive(Debug)]
struct DecoderCore {
    window_bits: u8,
    lookahead_bits: u8,
    input_buffer_size: u16,
    window_size: u16,

    input_size: u16,
    input_index: u16,
    bit_index: u8,
    current_byte: u8,
    bit_accumulator: u32,
    /// How many bits of the field currently being read are already folded
    /// into `bit_accumulator`. Lets `get_bits` resume a field that spans
    /// more than one `sink` without losing or re-reading bits (needed for
    /// fields wider than a byte, since a single `sink` may hand over less
    /// than a full field's worth of input).
    acc_bits: u8,
    head_index: u16,
    output_count: u16,
    output_index: u16,
    state: State,
}

impl DecoderCore {
    fn new(window_bits: u8, lookahead_bits: u8, input_buffer_size: u16) -> Self {
        DecoderCore {
            window_bits,
            lookahead_bits,
            input_buffer_size,
            window_size: 1u16 << window_bits,
            input_size: 0,
            input_index: 0,
            bit_index: 0x00,
            current_byte: 0,
            bit_accumulator: 0,
            acc_bits: 0,
            head_index: 0,
            output_count: 0,
            output_index: 0,
            state: State::Empty,
        }
    }

    fn reset(&mut self) {
        let (w, l, ibs) = (self.window_bits, self.lookahead_bits, self.input_buffer_size);
        *self = DecoderCore::new(w, l, ibs);
    }

    fn sink(&mut self, buffer: &mut [u8], input: &[u8]) -> SinkStatus {
        let remaining = self.input_buffer_size - self.input_size;
        if remaining == 0 {
            return SinkStatus::Full;
        }
        let copy_size = (remaining as usize).min(input.len());
        let offset = self.input_size as usize;
        buffer[offset..offset + copy_size].copy_from_slice(&input[..copy_size]);
        self.input_size += copy_size as u16;

        if self.state == State::Empty {
            self.state = State::InputAvailable;
            self.input_index = 0;
        }

        log::trace!(
            "decoder: sunk {copy_size} bytes, input_size now {}",
            self.input_size
        );
        SinkStatus::Ok(copy_size)
    }

    fn finish(&self) -> FinishStatus {
        match self.state {
            State::Empty => FinishStatus::Done,
            // The zero-bit padding at the end of the final byte can look
            // like a backref tag bit followed by all-zero index/count
            // bits; only call it DONE once the input ring is truly empty.
            State::BackrefIndex | State::BackrefCount => {
                if self.input_size == 0 {
                    FinishStatus::Done
                } else {
                    FinishStatus::More
                }
            }
            _ => FinishStatus::More,
        }
    }

    fn poll(&mut self, buffer: &mut [u8], out_buf: &mut [u8]) -> PollStatus {
        let mut oi = OutputInfo::new(out_buf);
        loop {
            let in_state = self.state;
            log::trace!("decoder: poll state {in_state:?}");
            self.state = match in_state {
                State::Empty => return PollStatus::Empty(oi.written),
                State::InputAvailable => self.st_input_available(buffer),
                State::YieldLiteral => self.st_yield_literal(buffer, &mut oi),
                State::BackrefIndex => self.st_backref_index(buffer),
                State::BackrefCount => self.st_backref_count(buffer),
                State::YieldBackref => self.st_yield_backref(buffer, &mut oi),
                State::CheckForMoreInput => self.st_check_for_input(),
            };

            if self.state == in_state {
                return if oi.written == oi.buf.len() {
                    PollStatus::More(oi.written)
                } else {
                    PollStatus::Empty(oi.written)
                };
            }
        }
    }

    fn st_input_available(&mut self, buffer: &mut [u8]) -> State {
        match self.get_bits(buffer, 1) {
            None => State::InputAvailable,
            Some(bit) => {
                if bit != 0 {
                    State::YieldLiteral
                } else {
                    State::BackrefIndex
                }
            }
        }
    }

    fn st_yield_literal(&mut self, buffer: &mut [u8], oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldLiteral;
        }
        match self.get_bits(buffer, 8) {
            None => State::YieldLiteral,
            Some(bits) => {
                let c = bits as u8;
                let mask = self.window_size - 1;
                let window = self.window_mut(buffer);
                window[(self.head_index & mask) as usize] = c;
                self.head_index = self.head_index.wrapping_add(1);
                oi.push_byte(c);
                State::CheckForMoreInput
            }
        }
    }

    fn st_backref_index(&mut self, buffer: &mut [u8]) -> State {
        match self.get_bits(buffer, self.window_bits) {
            None => State::BackrefIndex,
            Some(bits) => {
                self.output_index = bits as u16 + 1;
                State::BackrefCount
            }
        }
    }

    fn st_backref_count(&mut self, buffer: &mut [u8]) -> State {
        match self.get_bits(buffer, self.lookahead_bits) {
            None => State::BackrefCount,
            Some(bits) => {
                self.output_count = bits as u16 + 1;
                State::YieldBackref
            }
        }
    }

    fn st_yield_backref(&mut self, buffer: &mut [u8], oi: &mut OutputInfo) -> State {
        let room = oi.buf.len() - oi.written;
        if room > 0 {
            let count = room.min(self.output_count as usize);
            let mask = self.window_size - 1;
            let neg_offset = self.output_index;
            let window = self.window_mut(buffer);
            for _ in 0..count {
                let c = window[((self.head_index.wrapping_sub(neg_offset)) & mask) as usize];
                oi.push_byte(c);
                let window = self.window_mut(buffer);
                window[(self.head_index & mask) as usize] = c;
                self.head_index = self.head_index.wrapping_add(1);
            }
            self.output_count -= count as u16;
            if self.output_count == 0 {
                return State::CheckForMoreInput;
            }
        }
        State::YieldBackref
    }

    fn st_check_for_input(&self) -> State {
        if self.input_size == 0 {
            State::Empty
        } else {
            State::InputAvailable
        }
    }

    #[inline]
    fn window_mut<'b>(&self, buffer: &'b mut [u8]) -> &'b mut [u8] {
        &mut buffer[self.input_buffer_size as usize..]
    }

    /// Pull `count` (<= 31) bits MSB-first out of the input ring, suspending
    /// (returning `None`) if there isn't enough input buffered to complete
    /// the read. Progress toward the current `count`-bit field survives a
    /// suspend: `acc_bits` records how many of its bits are already folded
    /// into `bit_accumulator`, so a resumed call (after a `sink`) only reads
    /// the bits still missing rather than re-reading (and shifting in) the
    /// whole field from scratch.
    fn get_bits(&mut self, buffer: &mut [u8], count: u8) -> Option<u32> {
        if count == 0 || count > 31 {
            return None;
        }
        let remaining = count - self.acc_bits;
        if self.input_size == 0 && (self.bit_index as u32) < (1u32 << (remaining - 1)) {
            return None;
        }

        for _ in 0..remaining {
            if self.bit_index == 0x00 {
                if self.input_size == 0 {
                    return None;
                }
                self.current_byte = buffer[self.input_index as usize];
                self.input_index += 1;
                if self.input_index == self.input_size {
                    self.input_index = 0;
                    self.input_size = 0;
                }
                self.bit_index = 0x80;
            }
            self.bit_accumulator <<= 1;
            if self.current_byte & self.bit_index != 0 {
                self.bit_accumulator |= 1;
            }
            self.bit_index >>= 1;
            self.acc_bits += 1;
        }

        let result = self.bit_accumulator;
        self.bit_accumulator = 0;
        self.acc_bits = 0;
        Some(result)
    }
}

/// Heap-backed, runtime-parameterized decoder context.
#[cfg(feature = "std")]
pub struct Decoder {
    core: DecoderCore,
    buffer: Vec<u8>,
}

#[cfg(feature = "std")]
impl Decoder {
    /// Create a decoder matching an encoder configured with the same
    /// `window_bits`/`lookahead_bits`. `input_buffer_size` need not match
    /// the encoder's; it only governs how many compressed bytes may be
    /// sunk before a `poll` is required to make room.
    pub fn new(window_bits: u8, lookahead_bits: u8, input_buffer_size: u16) -> Option<Self> {
        validate_window_and_lookahead(window_bits, lookahead_bits).ok()?;
        if input_buffer_size == 0 {
            return None;
        }
        let buf_size = (1usize << window_bits) + input_buffer_size as usize;
        log::debug!(
            "decoder: new window_bits={window_bits} lookahead_bits={lookahead_bits} input_buffer_size={input_buffer_size}"
        );
        Some(Decoder {
            core: DecoderCore::new(window_bits, lookahead_bits, input_buffer_size),
            buffer: vec![0; buf_size],
        })
    }

    /// Reset to the freshly-constructed state; buffers are zeroed.
    pub fn reset(&mut self) {
        self.core.reset();
        self.buffer.iter_mut().for_each(|b| *b = 0);
    }

    /// Copy as many bytes of `input` as fit into the input ring. See
    /// [`SinkStatus`].
    pub fn sink(&mut self, input: &[u8]) -> SinkStatus {
        self.core.sink(&mut self.buffer, input)
    }

    /// Advance the state machine, writing decompressed bytes to `out_buf`.
    /// See [`PollStatus`].
    pub fn poll(&mut self, out_buf: &mut [u8]) -> PollStatus {
        self.core.poll(&mut self.buffer, out_buf)
    }

    /// Declare the compressed stream closed. See [`FinishStatus`].
    pub fn finish(&self) -> FinishStatus {
        self.core.finish()
    }
}

/// Const-generic, no-allocation sibling of [`Decoder`].
///
/// `BUF` must equal `2^window_bits + input_buffer_size`.
pub struct StaticDecoder<const BUF: usize> {
    core: DecoderCore,
    buffer: [u8; BUF],
}

impl<const BUF: usize> StaticDecoder<BUF> {
    /// Create a decoder backed by a fixed `BUF`-byte array, split into a
    /// `input_buffer_size`-byte input ring and a `2^window_bits`-byte
    /// window; `BUF` must equal their sum.
    pub fn new(
        window_bits: u8,
        lookahead_bits: u8,
        input_buffer_size: u16,
    ) -> Result<Self, ConfigError> {
        validate_window_and_lookahead(window_bits, lookahead_bits)?;
        if input_buffer_size == 0 {
            return Err(ConfigError::EmptyInputBuffer);
        }
        let expected = (1usize << window_bits) + input_buffer_size as usize;
        if expected != BUF {
            return Err(ConfigError::BufferSizeMismatch {
                expected,
                actual: BUF,
            });
        }
        Ok(StaticDecoder {
            core: DecoderCore::new(window_bits, lookahead_bits, input_buffer_size),
            buffer: [0u8; BUF],
        })
    }

    /// Reset to the freshly-constructed state; the buffer is zeroed.
    pub fn reset(&mut self) {
        self.core.reset();
        self.buffer.iter_mut().for_each(|b| *b = 0);
    }

    /// Copy as many bytes of `input` as fit into the input ring. See
    /// [`SinkStatus`].
    pub fn sink(&mut self, input: &[u8]) -> SinkStatus {
        self.core.sink(&mut self.buffer, input)
    }

    /// Advance the state machine, writing decompressed bytes to `out_buf`.
    /// See [`PollStatus`].
    pub fn poll(&mut self, out_buf: &mut [u8]) -> PollStatus {
        self.core.poll(&mut self.buffer, out_buf)
    }

    /// Declare the compressed stream closed. See [`FinishStatus`].
    pub fn finish(&self) -> FinishStatus {
        self.core.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one_shot(src: &[u8], window_bits: u8, lookahead_bits: u8) -> Vec<u8> {
        let mut dec = Decoder::new(window_bits, lookahead_bits, 64).unwrap();
        let mut out = Vec::new();
        let mut scratch = [0u8; 64];
        let mut sunk = 0;
        while sunk < src.len() {
            match dec.sink(&src[sunk..]) {
                SinkStatus::Ok(n) => sunk += n,
                SinkStatus::Full => loop {
                    match dec.poll(&mut scratch) {
                        PollStatus::Empty(n) => {
                            out.extend_from_slice(&scratch[..n]);
                            break;
                        }
                        PollStatus::More(n) => out.extend_from_slice(&scratch[..n]),
                        PollStatus::Unknown => panic!("unexpected unknown state"),
                    }
                },
            }
            loop {
                match dec.poll(&mut scratch) {
                    PollStatus::Empty(n) => {
                        out.extend_from_slice(&scratch[..n]);
                        break;
                    }
                    PollStatus::More(n) => out.extend_from_slice(&scratch[..n]),
                    PollStatus::Unknown => panic!("unexpected unknown state"),
                }
            }
        }
        loop {
            if let FinishStatus::Done = dec.finish() {
                break;
            }
            loop {
                match dec.poll(&mut scratch) {
                    PollStatus::Empty(n) => {
                        out.extend_from_slice(&scratch[..n]);
                        break;
                    }
                    PollStatus::More(n) => out.extend_from_slice(&scratch[..n]),
                    PollStatus::Unknown => panic!("unexpected unknown state"),
                }
            }
        }
        out
    }

    #[test]
    fn five_literals_round_trip() {
        // spec.md §8 concrete scenario 5: decode the five-literal encoding.
        let compressed = [0x80u8, 0x40, 0x60, 0x50, 0x38, 0x20];
        let out = decode_one_shot(&compressed, 8, 7);
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn literal_plus_backref_round_trip() {
        // spec.md §8 concrete scenario 6: decode "aaaaa".
        let compressed = [0xb0u8, 0x80, 0x01, 0x80];
        let out = decode_one_shot(&compressed, 8, 7);
        assert_eq!(out, b"aaaaa");
    }

    #[test]
    fn repeated_prefix_round_trip() {
        let compressed = [0xb0u8, 0xd8, 0xac, 0x76, 0x40, 0x1b];
        let out = decode_one_shot(&compressed, 8, 3);
        assert_eq!(out, b"abcdabcd");
    }

    #[test]
    fn repeated_prefix_plus_trailing_literal_round_trip() {
        let compressed = [0xb0u8, 0xd8, 0xac, 0x76, 0x40, 0x1b, 0xb2, 0x80];
        let out = decode_one_shot(&compressed, 8, 3);
        assert_eq!(out, b"abcdabcde");
    }

    #[test]
    fn byte_at_a_time_sink_matches_one_shot() {
        let compressed = [0xb0u8, 0xd8, 0xac, 0x76, 0x40, 0x1b];
        let whole = decode_one_shot(&compressed, 8, 3);

        let mut dec = Decoder::new(8, 3, 64).unwrap();
        let mut out = Vec::new();
        let mut scratch = [0u8; 4];
        for &byte in &compressed {
            assert!(matches!(dec.sink(&[byte]), SinkStatus::Ok(1)));
            loop {
                match dec.poll(&mut scratch) {
                    PollStatus::Empty(n) => {
                        out.extend_from_slice(&scratch[..n]);
                        break;
                    }
                    PollStatus::More(n) => out.extend_from_slice(&scratch[..n]),
                    PollStatus::Unknown => panic!(),
                }
            }
        }
        loop {
            if let FinishStatus::Done = dec.finish() {
                break;
            }
            loop {
                match dec.poll(&mut scratch) {
                    PollStatus::Empty(n) => {
                        out.extend_from_slice(&scratch[..n]);
                        break;
                    }
                    PollStatus::More(n) => out.extend_from_slice(&scratch[..n]),
                    PollStatus::Unknown => panic!(),
                }
            }
        }
        assert_eq!(whole, out);
    }

    #[test]
    fn static_decoder_matches_heap_decoder() {
        let compressed = [0xb0u8, 0xd8, 0xac, 0x76, 0x40, 0x1b, 0xb2, 0x80];
        let heap_out = decode_one_shot(&compressed, 8, 3);

        let mut dec = StaticDecoder::<288>::new(8, 3, 32).unwrap();
        let mut out = Vec::new();
        let mut scratch = [0u8; 32];
        let mut sunk = 0;
        while sunk < compressed.len() {
            match dec.sink(&compressed[sunk..]) {
                SinkStatus::Ok(n) => sunk += n,
                SinkStatus::Full => panic!(),
            }
        }
        loop {
            if let FinishStatus::Done = dec.finish() {
                break;
            }
            loop {
                match dec.poll(&mut scratch) {
                    PollStatus::Empty(n) => {
                        out.extend_from_slice(&scratch[..n]);
                        break;
                    }
                    PollStatus::More(n) => out.extend_from_slice(&scratch[..n]),
                    PollStatus::Unknown => panic!(),
                }
            }
        }
        assert_eq!(heap_out, out);
    }

    #[test]
    fn static_decoder_rejects_mismatched_buffer() {
        assert!(matches!(
            StaticDecoder::<10>::new(8, 3, 32),
            Err(ConfigError::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn sink_full_is_reported() {
        let mut dec = Decoder::new(8, 3, 4).unwrap();
        assert!(matches!(dec.sink(&[1, 2, 3, 4]), SinkStatus::Ok(4)));
        assert!(matches!(dec.sink(&[5]), SinkStatus::Full));
    }

    #[test]
    fn new_rejects_zero_input_buffer() {
        assert!(Decoder::new(8, 3, 0).is_none());
    }

    #[test]
    fn backref_field_wider_than_a_byte_survives_sink_boundary() {
        // window_bits = 9 makes the BACKREF_INDEX field 9 bits wide, so a
        // single-byte sink can hand the decoder less than a full field and
        // force get_bits to resume mid-field (see DESIGN.md Open Question 3).
        use crate::encoder::{
            Encoder, FinishStatus as EncFinishStatus, PollStatus as EncPollStatus,
            SinkStatus as EncSinkStatus,
        };

        let data: Vec<u8> = b"mississippi river mississippi river mississippi".to_vec();
        let mut enc = Encoder::new(9, 6).unwrap();
        let mut compressed = Vec::new();
        let mut scratch = [0u8; 64];
        let mut sunk = 0;
        while sunk < data.len() {
            match enc.sink(&data[sunk..]) {
                EncSinkStatus::Ok(n) => sunk += n,
                EncSinkStatus::Misuse => panic!(),
            }
            loop {
                match enc.poll(&mut scratch) {
                    EncPollStatus::Empty(n) => {
                        compressed.extend_from_slice(&scratch[..n]);
                        break;
                    }
                    EncPollStatus::More(n) => compressed.extend_from_slice(&scratch[..n]),
                    EncPollStatus::Misuse => panic!(),
                }
            }
        }
        loop {
            if let EncFinishStatus::Done = enc.finish() {
                break;
            }
            loop {
                match enc.poll(&mut scratch) {
                    EncPollStatus::Empty(n) => {
                        compressed.extend_from_slice(&scratch[..n]);
                        break;
                    }
                    EncPollStatus::More(n) => compressed.extend_from_slice(&scratch[..n]),
                    EncPollStatus::Misuse => panic!(),
                }
            }
        }

        // Feed the compressed bytes to the decoder one at a time, the worst
        // case for a field that needs more than one input byte to complete.
        let mut dec = Decoder::new(9, 6, 64).unwrap();
        let mut out = Vec::new();
        let mut out_scratch = [0u8; 4];
        for &byte in &compressed {
            assert!(matches!(dec.sink(&[byte]), SinkStatus::Ok(1)));
            loop {
                match dec.poll(&mut out_scratch) {
                    PollStatus::Empty(n) => {
                        out.extend_from_slice(&out_scratch[..n]);
                        break;
                    }
                    PollStatus::More(n) => out.extend_from_slice(&out_scratch[..n]),
                    PollStatus::Unknown => panic!(),
                }
            }
        }
        loop {
            if let FinishStatus::Done = dec.finish() {
                break;
            }
            loop {
                match dec.poll(&mut out_scratch) {
                    PollStatus::Empty(n) => {
                        out.extend_from_slice(&out_scratch[..n]);
                        break;
                    }
                    PollStatus::More(n) => out.extend_from_slice(&out_scratch[..n]),
                    PollStatus::Unknown => panic!(),
                }
            }
        }

        assert_eq!(out, data);
    }
}
