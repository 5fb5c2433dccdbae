//! Streaming codec contract shared by every compression backend.
//!
//! Grounded on the teacher's `DeflateEncoder`/`DeflateDecoder` composition
//! style (`writer.rs`, `reader.rs`): a codec is a value that consumes input
//! and produces output incrementally. Unlike a hand-cast opaque `state`
//! pointer shared across all codecs, each backend here owns its own typed
//! state and is reached only through the `Compressor`/`Decompressor` trait
//! objects — calling the wrong codec's `step` is a type error, not a
//! runtime hazard (DESIGN NOTES §9).

pub mod deflate;
pub mod store;
#[cfg(feature = "zstd-support")]
pub mod zstd_codec;

use crate::error::Result;

/// How the caller wants the codec to treat the current call's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// More input may follow in a later call.
    None,
    /// This is the last call; the codec must emit its terminal block (or
    /// treat remaining input as final) before returning `StreamEnd`.
    Finish,
}

/// Outcome of a single `step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Made progress; call again with more input/output space.
    Progress,
    /// Codec reached the end of the stream; no more output will be produced.
    StreamEnd,
    /// Output buffer is full; supply more output space and call again.
    NeedsMoreOutput,
    /// Input buffer is exhausted mid-symbol; supply more input and call
    /// again with `Flush::Finish` only once input is truly exhausted.
    NeedsMoreInput,
}

/// Result of one `step` call: how much of `input`/`output` was used, and
/// what the caller should do next.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub consumed: usize,
    pub produced: usize,
    pub status: StepStatus,
}

/// A streaming compressor. `step` must make monotone progress: it consumes
/// zero or more input bytes and produces zero or more output bytes per
/// call, and must never loop forever on bounded input.
pub trait Compressor {
    fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StepOutcome>;
    fn total_in(&self) -> u64;
    fn total_out(&self) -> u64;
}

/// A streaming decompressor, symmetric to `Compressor`.
pub trait Decompressor {
    fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StepOutcome>;
    fn total_in(&self) -> u64;
    fn total_out(&self) -> u64;
}

/// Runs a decompressor to completion over an in-memory compressed slice,
/// producing exactly `expected_out_len` bytes. Used by the container
/// engine's entry-extraction path, where the whole compressed entry is
/// already buffered.
pub fn decompress_all(
    decompressor: &mut dyn Decompressor,
    mut input: &[u8],
    expected_out_len: usize,
) -> Result<Vec<u8>> {
    let mut out = vec![0u8; expected_out_len];
    let mut out_pos = 0usize;
    loop {
        let outcome = decompressor.step(input, &mut out[out_pos..], Flush::Finish)?;
        input = &input[outcome.consumed..];
        out_pos += outcome.produced;
        match outcome.status {
            StepStatus::StreamEnd => break,
            StepStatus::Progress => continue,
            StepStatus::NeedsMoreOutput => {
                return Err(crate::error::ZipKitError::MalformedPayload(
                    "decoded size exceeded declared uncompressed size".into(),
                ))
            }
            StepStatus::NeedsMoreInput => {
                return Err(crate::error::ZipKitError::MalformedPayload(
                    "compressed stream truncated".into(),
                ))
            }
        }
    }
    out.truncate(out_pos);
    Ok(out)
}

/// Runs a compressor to completion over an in-memory input buffer into a
/// freshly allocated, correctly sized output buffer.
pub fn compress_all(compressor: &mut dyn Compressor, mut input: &[u8], bound: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; bound];
    let mut out_pos = 0usize;
    loop {
        let outcome = compressor.step(input, &mut out[out_pos..], Flush::Finish)?;
        input = &input[outcome.consumed..];
        out_pos += outcome.produced;
        match outcome.status {
            StepStatus::StreamEnd => break,
            StepStatus::Progress => continue,
            StepStatus::NeedsMoreOutput => {
                out.resize(out.len() * 2 + 64, 0);
            }
            StepStatus::NeedsMoreInput => unreachable!("all input is already available"),
        }
    }
    out.truncate(out_pos);
    Ok(out)
}

/// Dispatches a decompressor for a ZIP method code, or `None` if the method
/// is recognized but not backed by a codec (caller maps that to
/// `UnsupportedMethod`).
pub fn decompressor_for(method: u16) -> Option<Box<dyn Decompressor>> {
    match method {
        0 => Some(Box::new(store::StoreCodec::new())),
        8 => Some(Box::new(deflate::Inflater::new_raw())),
        #[cfg(feature = "zstd-support")]
        93 => Some(Box::new(zstd_codec::ZstdDecompressor::new())),
        _ => None,
    }
}

/// Dispatches a compressor for a ZIP method code and level.
pub fn compressor_for(method: u16, level: i32) -> Option<Box<dyn Compressor>> {
    match method {
        0 => Some(Box::new(store::StoreCodec::new())),
        8 => Some(Box::new(deflate::Deflater::new_raw(level))),
        #[cfg(feature = "zstd-support")]
        93 => Some(Box::new(zstd_codec::ZstdCompressor::new(level))),
        _ => None,
    }
}
