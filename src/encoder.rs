//! Streaming LZSS-style encoder.
//!
//! [`Encoder`] is the heap-backed, runtime-parameterized context (window and
//! lookahead bit-widths are chosen at construction time). [`StaticEncoder`]
//! is the const-generic, no-allocation sibling described in spec §9: same
//! algorithm, buffer size fixed at compile time. Both are thin wrappers
//! around [`EncoderCore`], which holds only the scalar state machine fields
//! and never the buffer itself — every method takes the buffer (and,
//! optionally, the search index) as an argument, so the two storage
//! strategies share one implementation of the state machine.

use crate::bitio::{validate_window_and_lookahead, ConfigError, OutputInfo, BREAK_EVEN_LENGTH};

#[cfg(feature = "std")]
extern crate alloc;
#[cfg(feature = "std")]
use alloc::vec;
#[cfg(feature = "std")]
use alloc::vec::Vec;

/// Outcome of [`Encoder::sink`] / [`StaticEncoder::sink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// `usize` bytes were copied into the encoder's input region.
    Ok(usize),
    /// The encoder is finishing, or the input region is already full and
    /// must be drained with [`poll`](Encoder::poll) before sinking more.
    Misuse,
}

/// Outcome of [`Encoder::poll`] / [`StaticEncoder::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The encoder produced `usize` bytes and cannot make further progress
    /// without more input (or has reached its terminal state).
    Empty(usize),
    /// The encoder produced `usize` bytes and filled the output buffer
    /// before it ran out of work; poll again with a fresh buffer.
    More(usize),
    /// `out_buf` had length zero.
    Misuse,
}

/// Outcome of [`Encoder::finish`] / [`StaticEncoder::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishStatus {
    /// The encoder has emitted every remaining bit; `poll` will now return
    /// `Empty(0)` until [`reset`](Encoder::reset).
    Done,
    /// Call [`poll`](Encoder::poll) again; there is more output pending.
    More,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotFull,
    Filled,
    Search,
    YieldTagBit,
    YieldLiteral,
    YieldBrIndex,
    YieldBrLength,
    SaveBacklog,
    FlushBits,
    Done,
}

const FLAG_IS_FINISHING: u8 = 0x01;
const FLAG_HAS_LITERAL: u8 = 0x02;
const FLAG_ON_FINAL_LITERAL: u8 = 0x04;
const FLAG_BACKLOG_IS_PARTIAL: u8 = 0x08;
const FLAG_BACKLOG_IS_FILLED: u8 = 0x10;

/// Sentinel meaning "no earlier occurrence of this byte value."
const NO_LINK: i32 = -1;

/// Scalar state machine shared by [`Encoder`] and [`StaticEncoder`]. Buffers
/// are threaded through each call rather than owned here.
#[derive(Debug)]
struct EncoderCore {
    window_bits: u8,
    lookahead_bits: u8,
    input_buffer_size: u16,
    lookahead_size: u16,

    input_size: u16,
    match_scan_index: u16,
    match_length: u16,
    match_pos: u16,
    outgoing_bits: u16,
    outgoing_bits_count: u8,
    flags: u8,
    current_byte: u8,
    bit_index: u8,
    state: State,
}

impl EncoderCore {
    fn new(window_bits: u8, lookahead_bits: u8) -> Self {
        EncoderCore {
            window_bits,
            lookahead_bits,
            input_buffer_size: 1u16 << window_bits,
            lookahead_size: 1u16 << lookahead_bits,
            input_size: 0,
            match_scan_index: 0,
            match_length: 0,
            match_pos: 0,
            outgoing_bits: 0,
            outgoing_bits_count: 0,
            flags: 0,
            current_byte: 0,
            bit_index: 0x80,
            state: State::NotFull,
        }
    }

    fn reset(&mut self) {
        let (window_bits, lookahead_bits) = (self.window_bits, self.lookahead_bits);
        *self = EncoderCore::new(window_bits, lookahead_bits);
    }

    #[inline]
    fn is_finishing(&self) -> bool {
        self.flags & FLAG_IS_FINISHING != 0
    }

    #[inline]
    fn has_literal(&self) -> bool {
        self.flags & FLAG_HAS_LITERAL != 0
    }

    #[inline]
    fn on_final_literal(&self) -> bool {
        self.flags & FLAG_ON_FINAL_LITERAL != 0
    }

    #[inline]
    fn backlog_is_partial(&self) -> bool {
        self.flags & FLAG_BACKLOG_IS_PARTIAL != 0
    }

    #[inline]
    fn backlog_is_filled(&self) -> bool {
        self.flags & FLAG_BACKLOG_IS_FILLED != 0
    }

    #[inline]
    fn input_offset(&self) -> u16 {
        self.input_buffer_size
    }

    fn sink(&mut self, buffer: &mut [u8], input: &[u8]) -> SinkStatus {
        if self.is_finishing() || self.state != State::NotFull {
            return SinkStatus::Misuse;
        }

        let write_offset = (self.input_offset() + self.input_size) as usize;
        let remaining = self.input_buffer_size - self.input_size;
        let copy_size = (remaining as usize).min(input.len());

        buffer[write_offset..write_offset + copy_size].copy_from_slice(&input[..copy_size]);
        self.input_size += copy_size as u16;

        if copy_size as u16 == remaining {
            self.state = State::Filled;
        }

        log::trace!(
            "encoder: sunk {copy_size} bytes, input_size now {}",
            self.input_size
        );
        SinkStatus::Ok(copy_size)
    }

    fn finish(&mut self) -> FinishStatus {
        self.flags |= FLAG_IS_FINISHING;
        if self.state == State::NotFull {
            self.state = State::Filled;
        }
        if self.state == State::Done {
            FinishStatus::Done
        } else {
            FinishStatus::More
        }
    }

    fn poll(
        &mut self,
        buffer: &mut [u8],
        mut index: Option<&mut [i32]>,
        out_buf: &mut [u8],
    ) -> PollStatus {
        if out_buf.is_empty() {
            return PollStatus::Misuse;
        }

        let mut oi = OutputInfo::new(out_buf);
        loop {
            let in_state = self.state;
            log::trace!("encoder: poll state {in_state:?}");
            self.state = match in_state {
                State::NotFull | State::Done => return PollStatus::Empty(oi.written),
                State::Filled => {
                    if let Some(idx) = index.as_deref_mut() {
                        build_index(buffer, self.input_offset(), self.input_size, idx);
                    }
                    State::Search
                }
                State::Search => self.step_search(buffer, index.as_deref()),
                State::YieldTagBit => self.yield_tag_bit(&mut oi),
                State::YieldLiteral => self.yield_literal(buffer, &mut oi),
                State::YieldBrIndex => self.yield_br_index(&mut oi),
                State::YieldBrLength => self.yield_br_length(&mut oi),
                State::SaveBacklog => self.step_save_backlog(buffer),
                State::FlushBits => self.flush_bit_buffer(&mut oi),
            };

            if self.state == in_state && !oi.can_take_byte() {
                return PollStatus::More(oi.written);
            }
        }
    }

    fn step_search(&mut self, buffer: &[u8], index: Option<&[i32]>) -> State {
        let window_length = self.input_buffer_size;
        let lookahead_sz = self.lookahead_size;
        let msi = self.match_scan_index;
        let fin = self.is_finishing();

        if msi > self.input_size - if fin { 1 } else { lookahead_sz } {
            // Search buffer exhausted; stash it as backlog and await more
            // input (or, if finishing, flush whatever remains).
            return State::SaveBacklog;
        }

        let input_offset = self.input_offset();
        let end = input_offset + msi;

        let start = if self.backlog_is_filled() {
            // The full window precedes `end`; scan all of it.
            end - window_length + 1
        } else if self.backlog_is_partial() {
            // Only part of the window is valid data; clamp to it.
            let s = end - window_length + 1;
            s.max(lookahead_sz)
        } else {
            // No backlog yet at all; nothing before `input_offset` is real.
            input_offset
        };

        let mut max_possible = lookahead_sz;
        if self.input_size - msi < lookahead_sz {
            max_possible = self.input_size - msi;
        }

        match find_longest_match(buffer, index, start, end, max_possible) {
            None => {
                self.match_scan_index += 1;
                self.flags |= FLAG_HAS_LITERAL;
                self.match_length = 0;
            }
            Some((pos, len)) => {
                self.match_pos = pos;
                self.match_length = len;
            }
        }
        State::YieldTagBit
    }

    fn yield_tag_bit(&mut self, oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldTagBit;
        }
        if self.match_length == 0 {
            self.push_bits(1, 1, oi);
            State::YieldLiteral
        } else {
            self.push_bits(1, 0, oi);
            self.outgoing_bits = self.match_pos - 1;
            self.outgoing_bits_count = self.window_bits;
            State::YieldBrIndex
        }
    }

    fn yield_literal(&mut self, buffer: &[u8], oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldLiteral;
        }
        let offset = (self.input_offset() + self.match_scan_index - 1) as usize;
        let byte = buffer[offset];
        self.push_bits(8, byte, oi);
        self.flags &= !FLAG_HAS_LITERAL;
        if self.on_final_literal() {
            State::FlushBits
        } else if self.match_length > 0 {
            State::YieldTagBit
        } else {
            State::Search
        }
    }

    fn yield_br_index(&mut self, oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldBrIndex;
        }
        if self.push_outgoing_bits(oi) > 0 {
            State::YieldBrIndex
        } else {
            self.outgoing_bits = self.match_length - 1;
            self.outgoing_bits_count = self.lookahead_bits;
            State::YieldBrLength
        }
    }

    fn yield_br_length(&mut self, oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldBrLength;
        }
        if self.push_outgoing_bits(oi) > 0 {
            State::YieldBrLength
        } else {
            self.match_scan_index += self.match_length;
            self.match_length = 0;
            State::Search
        }
    }

    fn step_save_backlog(&mut self, buffer: &mut [u8]) -> State {
        if self.is_finishing() {
            if self.has_literal() {
                self.flags |= FLAG_ON_FINAL_LITERAL;
                State::YieldTagBit
            } else {
                State::FlushBits
            }
        } else {
            self.do_save_backlog(buffer);
            State::NotFull
        }
    }

    /// Shift the still-relevant tail of the buffer down to the front so the
    /// next fill has room, and record how much of `[0, window)` is now
    /// valid backlog for future matches (see spec §3 invariant 1).
    fn do_save_backlog(&mut self, buffer: &mut [u8]) {
        let msi = self.match_scan_index;
        let remaining = self.input_buffer_size - msi;
        let shift_size = self.input_buffer_size + remaining;
        buffer.copy_within(msi as usize..(msi + shift_size) as usize, 0);

        if self.backlog_is_partial() {
            self.flags |= FLAG_BACKLOG_IS_FILLED;
        } else {
            self.flags |= FLAG_BACKLOG_IS_PARTIAL;
        }
        self.match_scan_index = 0;
        self.input_size -= self.input_buffer_size - remaining;
    }

    fn flush_bit_buffer(&mut self, oi: &mut OutputInfo) -> State {
        if self.bit_index == 0x80 {
            State::Done
        } else if oi.can_take_byte() {
            oi.push_byte(self.current_byte);
            State::Done
        } else {
            State::FlushBits
        }
    }

    fn push_outgoing_bits(&mut self, oi: &mut OutputInfo) -> u8 {
        let count = if self.outgoing_bits_count > 8 {
            8
        } else {
            self.outgoing_bits_count
        };
        let bits = if self.outgoing_bits_count > 8 {
            (self.outgoing_bits >> (self.outgoing_bits_count - 8)) as u8
        } else {
            self.outgoing_bits as u8
        };
        if count > 0 {
            self.push_bits(count, bits, oi);
            self.outgoing_bits_count -= count;
        }
        count
    }

    fn push_bits(&mut self, count: u8, bits: u8, oi: &mut OutputInfo) {
        if count == 8 && self.bit_index == 0x80 {
            oi.push_byte(bits);
            return;
        }
        for i in (0..count).rev() {
            if bits & (1 << i) != 0 {
                self.current_byte |= self.bit_index;
            }
            self.bit_index >>= 1;
            if self.bit_index == 0 {
                self.bit_index = 0x80;
                oi.push_byte(self.current_byte);
                self.current_byte = 0;
            }
        }
    }
}

/// Find the longest match for `buffer[end..end+maxlen]` among positions in
/// `[start, end)`, preferring the most recent position on ties. Matches of
/// length `< BREAK_EVEN_LENGTH` are reported as "no match" (see spec §3
/// invariant 3). If `index` is provided, walk the hash chain; otherwise scan
/// linearly. Both must (and do) produce the same result.
fn find_longest_match(
    buffer: &[u8],
    index: Option<&[i32]>,
    start: u16,
    end: u16,
    maxlen: u16,
) -> Option<(u16, u16)> {
    if maxlen == 0 || start == end {
        return None;
    }
    let maxlen = maxlen as usize;
    let needle = end as usize;

    let mut best_len = 0usize;
    let mut best_pos = 0usize;

    let try_pos = |pos: usize, best_len: &mut usize, best_pos: &mut usize| {
        let mut len = 0;
        while len < maxlen && buffer[pos + len] == buffer[needle + len] {
            len += 1;
        }
        if len > *best_len {
            *best_len = len;
            *best_pos = pos;
        }
    };

    if let Some(index) = index {
        let mut pos = index[needle];
        while pos >= start as i32 {
            try_pos(pos as usize, &mut best_len, &mut best_pos);
            if best_len == maxlen {
                break;
            }
            pos = index[pos as usize];
        }
    } else {
        let mut pos = needle - 1;
        loop {
            try_pos(pos, &mut best_len, &mut best_pos);
            if best_len == maxlen || pos == start as usize {
                break;
            }
            pos -= 1;
        }
    }

    if best_len >= BREAK_EVEN_LENGTH {
        Some(((end - best_pos as u16), best_len as u16))
    } else {
        None
    }
}

/// Build flattened linked lists of "previous position with this byte value"
/// over `buffer[0..input_offset + input_size)`.
fn build_index(buffer: &[u8], input_offset: u16, input_size: u16, index: &mut [i32]) {
    let mut last = [NO_LINK; 256];
    let end = (input_offset + input_size) as usize;
    for (i, link) in index.iter_mut().enumerate().take(end) {
        let v = buffer[i] as usize;
        *link = last[v];
        last[v] = i as i32;
    }
}

/// Heap-backed, runtime-parameterized encoder context.
///
/// `window_bits`/`lookahead_bits` are chosen once at construction; the
/// buffer (and, with the `index` feature, the hash-chain search index) are
/// allocated to match and reused for the life of the context. No allocation
/// happens on the `sink`/`poll` hot path.
#[cfg(feature = "std")]
pub struct Encoder {
    core: EncoderCore,
    buffer: Vec<u8>,
    index: Option<Vec<i32>>,
}

#[cfg(feature = "std")]
impl Encoder {
    /// Create an encoder with a `2^window_bits`-byte window and a
    /// `2^lookahead_bits`-byte maximum match length. Returns `None` if the
    /// parameters are out of bounds (see [`crate::bitio::validate_window_and_lookahead`]).
    pub fn new(window_bits: u8, lookahead_bits: u8) -> Option<Self> {
        validate_window_and_lookahead(window_bits, lookahead_bits).ok()?;
        let buf_size = 2usize << window_bits;
        log::debug!("encoder: new window_bits={window_bits} lookahead_bits={lookahead_bits}");
        Some(Encoder {
            core: EncoderCore::new(window_bits, lookahead_bits),
            buffer: vec![0; buf_size],
            index: if cfg!(feature = "index") {
                Some(vec![0i32; buf_size])
            } else {
                None
            },
        })
    }

    /// Reset to the freshly-constructed state; buffers are zeroed.
    pub fn reset(&mut self) {
        self.core.reset();
        self.buffer.iter_mut().for_each(|b| *b = 0);
        if let Some(index) = &mut self.index {
            index.iter_mut().for_each(|i| *i = 0);
        }
    }

    /// Copy as many bytes of `input` as fit into the free tail of the input
    /// region. See [`SinkStatus`].
    pub fn sink(&mut self, input: &[u8]) -> SinkStatus {
        self.core.sink(&mut self.buffer, input)
    }

    /// Advance the state machine, writing compressed bits to `out_buf`. See
    /// [`PollStatus`].
    pub fn poll(&mut self, out_buf: &mut [u8]) -> PollStatus {
        self.core
            .poll(&mut self.buffer, self.index.as_deref_mut(), out_buf)
    }

    /// Declare the input stream closed. Call [`poll`](Self::poll) until this
    /// returns [`FinishStatus::Done`].
    pub fn finish(&mut self) -> FinishStatus {
        self.core.finish()
    }

    /// Configured window size in bits.
    pub fn window_bits(&self) -> u8 {
        self.core.window_bits
    }

    /// Configured lookahead size in bits.
    pub fn lookahead_bits(&self) -> u8 {
        self.core.lookahead_bits
    }
}

/// Const-generic, no-allocation sibling of [`Encoder`].
///
/// `BUF` must equal `2 * 2^window_bits`; this is checked at construction
/// (not at compile time, since `window_bits` is still a runtime value — only
/// the storage is fixed). The static encoder never builds a hash-chain
/// index (there is no heap to put one on), so it always uses the linear
/// match search; this is spec-legal (§4.2 names linear search and
/// hash-chain indexing as equally valid implementations; the index is an
/// optimization, not a correctness requirement).
pub struct StaticEncoder<const BUF: usize> {
    core: EncoderCore,
    buffer: [u8; BUF],
}

impl<const BUF: usize> StaticEncoder<BUF> {
    /// Create an encoder backed by a fixed `BUF`-byte array. `BUF` must be
    /// exactly `2 * 2^window_bits`.
    pub fn new(window_bits: u8, lookahead_bits: u8) -> Result<Self, ConfigError> {
        validate_window_and_lookahead(window_bits, lookahead_bits)?;
        let expected = 2usize << window_bits;
        if expected != BUF {
            return Err(ConfigError::BufferSizeMismatch {
                expected,
                actual: BUF,
            });
        }
        Ok(StaticEncoder {
            core: EncoderCore::new(window_bits, lookahead_bits),
            buffer: [0u8; BUF],
        })
    }

    /// Reset to the freshly-constructed state; the buffer is zeroed.
    pub fn reset(&mut self) {
        self.core.reset();
        self.buffer.iter_mut().for_each(|b| *b = 0);
    }

    /// Copy as many bytes of `input` as fit into the free tail of the input
    /// region. See [`SinkStatus`].
    pub fn sink(&mut self, input: &[u8]) -> SinkStatus {
        self.core.sink(&mut self.buffer, input)
    }

    /// Advance the state machine, writing compressed bits to `out_buf`. See
    /// [`PollStatus`].
    pub fn poll(&mut self, out_buf: &mut [u8]) -> PollStatus {
        self.core.poll(&mut self.buffer, None, out_buf)
    }

    /// Declare the input stream closed. Call [`poll`](Self::poll) until this
    /// returns [`FinishStatus::Done`].
    pub fn finish(&mut self) -> FinishStatus {
        self.core.finish()
    }
}
