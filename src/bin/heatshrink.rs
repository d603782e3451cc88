//! Reference compress/decompress CLI (spec.md §6: "not part of the core").
//!
//! Reads a whole file (or stdin) and drains it through an [`Encoder`] or
//! [`Decoder`] in fixed-size blocks, looping sink/poll/finish until the
//! context reports `Done`. Mirrors the `clap`-derived flag layout of
//! `jcdubois-heatshrink-rs`'s `heatshrink` binary and the stdin/stdout
//! streaming loop of `qsib`'s `hsz`.

use clap::{ArgGroup, Parser};
use heatshrink_core::{Decoder, DecoderFinishStatus, DecoderPollStatus, DecoderSinkStatus};
use heatshrink_core::{Encoder, EncoderFinishStatus, EncoderPollStatus, EncoderSinkStatus};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

const BLOCK_SIZE: usize = 4096;
const DEFAULT_WINDOW_BITS: u8 = 11;
const DEFAULT_LOOKAHEAD_BITS: u8 = 4;
const DEFAULT_INPUT_BUFFER_SIZE: u16 = 256;

#[derive(Parser)]
#[command(author, version, about = "A streaming LZSS-style (de)compressor", long_about = None)]
#[command(group(ArgGroup::new("direction").required(true).args(["encode", "decode"])))]
struct Cli {
    /// Compress the input.
    #[arg(short = 'e', long = "encode")]
    encode: bool,

    /// Decompress the input.
    #[arg(short = 'd', long = "decode")]
    decode: bool,

    /// Window size in bits (must match between encode and decode).
    #[arg(short = 'w', long = "window", default_value_t = DEFAULT_WINDOW_BITS)]
    window_bits: u8,

    /// Lookahead (max match length) size in bits.
    #[arg(short = 'l', long = "lookahead", default_value_t = DEFAULT_LOOKAHEAD_BITS)]
    lookahead_bits: u8,

    /// Report input/output sizes and compression ratio on stderr.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Input file; omit (or pass `-`) to read stdin.
    input: Option<PathBuf>,

    /// Output file; omit (or pass `-`) to write stdout.
    output: Option<PathBuf>,
}

fn open_input(path: &Option<PathBuf>) -> io::Result<Box<dyn Read>> {
    match path.as_deref() {
        None => Ok(Box::new(io::stdin())),
        Some(p) if p == std::path::Path::new("-") => Ok(Box::new(io::stdin())),
        Some(p) => Ok(Box::new(File::open(p)?)),
    }
}

fn open_output(path: &Option<PathBuf>) -> io::Result<Box<dyn Write>> {
    match path.as_deref() {
        None => Ok(Box::new(io::stdout())),
        Some(p) if p == std::path::Path::new("-") => Ok(Box::new(io::stdout())),
        Some(p) => Ok(Box::new(File::create(p)?)),
    }
}

fn run_encode(
    input: &mut dyn Read,
    output: &mut dyn Write,
    window_bits: u8,
    lookahead_bits: u8,
) -> io::Result<(u64, u64)> {
    let mut encoder = Encoder::new(window_bits, lookahead_bits)
        .unwrap_or_else(|| panic!("invalid -w {window_bits} -l {lookahead_bits}"));
    let mut in_buf = vec![0u8; BLOCK_SIZE];
    let mut out_buf = vec![0u8; BLOCK_SIZE * 2];
    let (mut total_in, mut total_out) = (0u64, 0u64);

    loop {
        let read_len = input.read(&mut in_buf)?;
        if read_len == 0 {
            break;
        }
        total_in += read_len as u64;
        let mut remaining = &in_buf[..read_len];
        while !remaining.is_empty() {
            match encoder.sink(remaining) {
                EncoderSinkStatus::Ok(n) => remaining = &remaining[n..],
                EncoderSinkStatus::Misuse => unreachable!("encoder drained before each sink"),
            }
            total_out += drain_encoder(&mut encoder, &mut out_buf, output)?;
        }
    }

    loop {
        total_out += drain_encoder(&mut encoder, &mut out_buf, output)?;
        if let EncoderFinishStatus::Done = encoder.finish() {
            break;
        }
    }
    Ok((total_in, total_out))
}

fn drain_encoder(encoder: &mut Encoder, scratch: &mut [u8], output: &mut dyn Write) -> io::Result<u64> {
    let mut written = 0u64;
    loop {
        match encoder.poll(scratch) {
            EncoderPollStatus::Empty(n) => {
                output.write_all(&scratch[..n])?;
                written += n as u64;
                return Ok(written);
            }
            EncoderPollStatus::More(n) => {
                output.write_all(&scratch[..n])?;
                written += n as u64;
            }
            EncoderPollStatus::Misuse => unreachable!("scratch buffer is never empty"),
        }
    }
}

fn run_decode(
    input: &mut dyn Read,
    output: &mut dyn Write,
    window_bits: u8,
    lookahead_bits: u8,
) -> io::Result<(u64, u64)> {
    let mut decoder = Decoder::new(window_bits, lookahead_bits, DEFAULT_INPUT_BUFFER_SIZE)
        .unwrap_or_else(|| panic!("invalid -w {window_bits} -l {lookahead_bits}"));
    let mut in_buf = vec![0u8; BLOCK_SIZE];
    let mut out_buf = vec![0u8; BLOCK_SIZE * 2];
    let (mut total_in, mut total_out) = (0u64, 0u64);

    loop {
        let read_len = input.read(&mut in_buf)?;
        if read_len == 0 {
            break;
        }
        total_in += read_len as u64;
        let mut remaining = &in_buf[..read_len];
        while !remaining.is_empty() {
            match decoder.sink(remaining) {
                DecoderSinkStatus::Ok(n) => remaining = &remaining[n..],
                DecoderSinkStatus::Full => {
                    total_out += drain_decoder(&mut decoder, &mut out_buf, output)?;
                }
            }
        }
        total_out += drain_decoder(&mut decoder, &mut out_buf, output)?;
    }

    loop {
        total_out += drain_decoder(&mut decoder, &mut out_buf, output)?;
        if let DecoderFinishStatus::Done = decoder.finish() {
            break;
        }
    }
    Ok((total_in, total_out))
}

fn drain_decoder(decoder: &mut Decoder, scratch: &mut [u8], output: &mut dyn Write) -> io::Result<u64> {
    let mut written = 0u64;
    loop {
        match decoder.poll(scratch) {
            DecoderPollStatus::Empty(n) => {
                output.write_all(&scratch[..n])?;
                written += n as u64;
                return Ok(written);
            }
            DecoderPollStatus::More(n) => {
                output.write_all(&scratch[..n])?;
                written += n as u64;
            }
            DecoderPollStatus::Unknown => {
                eprintln!("heatshrink: decoder reached an undefined state; bitstream may be corrupt");
                std::process::exit(1);
            }
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let mut input = match open_input(&cli.input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("heatshrink: failed to open input: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut output = match open_output(&cli.output) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("heatshrink: failed to open output: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.encode {
        run_encode(&mut *input, &mut *output, cli.window_bits, cli.lookahead_bits)
    } else {
        run_decode(&mut *input, &mut *output, cli.window_bits, cli.lookahead_bits)
    };

    match result {
        Ok((total_in, total_out)) => {
            if cli.verbose {
                let ratio = if total_in == 0 {
                    0.0
                } else {
                    100.0 - (100.0 * total_out as f64) / total_in as f64
                };
                eprintln!(
                    "{:.2}% \t{} -> {} (-w {} -l {})",
                    ratio, total_in, total_out, cli.window_bits, cli.lookahead_bits
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("heatshrink: I/O error: {e}");
            ExitCode::FAILURE
        }
    }
}
