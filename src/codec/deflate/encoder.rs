//! RFC 1951 raw DEFLATE encoder.
//!
//! Level 0 emits stored blocks only. Levels 1-9 all use the same match
//! finder — a single-candidate hash table over 3-byte windows, keeping the
//! most recent position per hash instead of a full chain — and a single
//! fixed-Huffman block. This trades ratio for a small, auditable encoder;
//! DESIGN.md records it as the open question's resolution.
//!
//! The whole block is built once the caller signals `Flush::Finish`; before
//! that, input is only buffered. `step` then drains the finished bitstream
//! into the caller's output a slice at a time, so output-buffer size still
//! bounds a single call the way the streaming contract requires.

use std::collections::HashMap;

use super::huffman::canonical_codes;
use super::tables::{
    distance_to_code, fixed_dist_lengths, fixed_litlen_lengths, length_to_code, DIST_BASE,
    DIST_EXTRA, END_OF_BLOCK, LENGTH_BASE, LENGTH_EXTRA, MAX_LENGTH, MIN_LENGTH, WINDOW_SIZE,
};
use crate::bitio::BitWriter;
use crate::codec::{Compressor, Flush, StepOutcome, StepStatus};
use crate::error::Result;

const STORED_CHUNK_MAX: usize = 0xFFFF;

pub struct Deflater {
    level: i32,
    pending_input: Vec<u8>,
    finished: bool,
    encoded: Option<Vec<u8>>,
    delivered: usize,
    total_in: u64,
    total_out: u64,
}

impl Deflater {
    pub fn new_raw(level: i32) -> Self {
        Deflater {
            level,
            pending_input: Vec::new(),
            finished: false,
            encoded: None,
            delivered: 0,
            total_in: 0,
            total_out: 0,
        }
    }

    fn encode_all(&self) -> Result<Vec<u8>> {
        let mut w = BitWriter::new();
        if self.level == 0 {
            write_stored_blocks(&mut w, &self.pending_input);
        } else {
            write_fixed_huffman_block(&mut w, &self.pending_input)?;
        }
        Ok(w.into_bytes())
    }
}

impl Compressor for Deflater {
    fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StepOutcome> {
        self.pending_input.extend_from_slice(input);
        self.total_in += input.len() as u64;
        if flush == Flush::Finish {
            self.finished = true;
        }

        if self.encoded.is_none() {
            if !self.finished {
                return Ok(StepOutcome {
                    consumed: input.len(),
                    produced: 0,
                    status: StepStatus::NeedsMoreInput,
                });
            }
            self.encoded = Some(self.encode_all()?);
        }

        let bytes = self.encoded.as_ref().expect("just populated above");
        let remaining = &bytes[self.delivered..];
        let n = remaining.len().min(output.len());
        output[..n].copy_from_slice(&remaining[..n]);
        self.delivered += n;
        self.total_out += n as u64;
        let status = if self.delivered == bytes.len() {
            StepStatus::StreamEnd
        } else {
            StepStatus::NeedsMoreOutput
        };
        Ok(StepOutcome {
            consumed: input.len(),
            produced: n,
            status,
        })
    }

    fn total_in(&self) -> u64 {
        self.total_in
    }

    fn total_out(&self) -> u64 {
        self.total_out
    }
}

/// Worst-case output size for `len` bytes of input: every byte becomes its
/// own stored block in the pathological case, plus per-block framing.
pub fn compress_bound(len: usize) -> usize {
    len + len / 8 + 11 + 64
}

/// Wraps a raw DEFLATE stream in the minimal gzip member framing (RFC 1952
/// §2.3): a 10-byte header with no optional fields, then an 8-byte trailer
/// of CRC-32 and the uncompressed size mod 2^32. Used by the standalone
/// `-g`/`-d` CLI commands, which speak gzip rather than the ZIP container.
pub fn gzip_wrap(raw_deflate: &[u8], crc32: u32, uncompressed_len: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw_deflate.len() + 18);
    out.extend_from_slice(&[0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 0xFF]);
    out.extend_from_slice(raw_deflate);
    out.extend_from_slice(&crc32.to_le_bytes());
    out.extend_from_slice(&(uncompressed_len as u32).to_le_bytes());
    out
}

fn write_stored_blocks(w: &mut BitWriter, data: &[u8]) {
    if data.is_empty() {
        w.write_bits(1, 1);
        w.write_bits(0, 2);
        w.flush();
        w.write_byte_aligned_byte(0);
        w.write_byte_aligned_byte(0);
        w.write_byte_aligned_byte(0xFF);
        w.write_byte_aligned_byte(0xFF);
        return;
    }

    let mut offset = 0usize;
    while offset < data.len() {
        let chunk_len = (data.len() - offset).min(STORED_CHUNK_MAX);
        let is_final = offset + chunk_len == data.len();
        w.write_bits(if is_final { 1 } else { 0 }, 1);
        w.write_bits(0, 2);
        w.flush();
        let len = chunk_len as u16;
        for b in len.to_le_bytes() {
            w.write_byte_aligned_byte(b);
        }
        for b in (!len).to_le_bytes() {
            w.write_byte_aligned_byte(b);
        }
        for &b in &data[offset..offset + chunk_len] {
            w.write_byte_aligned_byte(b);
        }
        offset += chunk_len;
    }
}

fn emit_symbol(w: &mut BitWriter, codes: &[u32], lengths: &[u8], symbol: u16) {
    let len = lengths[symbol as usize] as u32;
    let code = codes[symbol as usize];
    // Huffman codes are transmitted MSB-first, unlike DEFLATE's other
    // LSB-first fields (RFC 1951 §3.1.1).
    for i in (0..len).rev() {
        w.write_bits((code >> i) & 1, 1);
    }
}

fn write_fixed_huffman_block(w: &mut BitWriter, data: &[u8]) -> Result<()> {
    w.write_bits(1, 1); // single block, always final
    w.write_bits(1, 2); // type 1: fixed Huffman

    let lit_lengths = fixed_litlen_lengths();
    let dist_lengths = fixed_dist_lengths();
    let lit_codes = canonical_codes(&lit_lengths)?;
    let dist_codes = canonical_codes(&dist_lengths)?;

    let mut hash_table: HashMap<[u8; 3], usize> = HashMap::new();
    let mut i = 0usize;
    while i < data.len() {
        let candidate = if i + MIN_LENGTH <= data.len() {
            let key = [data[i], data[i + 1], data[i + 2]];
            hash_table.get(&key).copied().map(|prev| (prev, key))
        } else {
            None
        };

        let found = candidate.and_then(|(prev, key)| {
            let distance = i - prev;
            if distance == 0 || distance > WINDOW_SIZE {
                return None;
            }
            let max_len = (data.len() - i).min(MAX_LENGTH);
            let mut len = 0usize;
            while len < max_len && data[prev + len] == data[i + len] {
                len += 1;
            }
            if len >= MIN_LENGTH {
                Some((len, distance, key))
            } else {
                None
            }
        });

        match found {
            Some((len, distance, _)) => {
                let len_idx = length_to_code(len);
                emit_symbol(w, &lit_codes, &lit_lengths, 257 + len_idx as u16);
                let extra_bits = LENGTH_EXTRA[len_idx] as u32;
                if extra_bits > 0 {
                    let extra = (len - LENGTH_BASE[len_idx] as usize) as u32;
                    w.write_bits(extra, extra_bits);
                }

                let dist_idx = distance_to_code(distance);
                emit_symbol(w, &dist_codes, &dist_lengths, dist_idx as u16);
                let dist_extra_bits = DIST_EXTRA[dist_idx] as u32;
                if dist_extra_bits > 0 {
                    let dist_extra = (distance - DIST_BASE[dist_idx] as usize) as u32;
                    w.write_bits(dist_extra, dist_extra_bits);
                }

                let end = (i + len).min(data.len());
                let mut p = i;
                while p < end && p + MIN_LENGTH <= data.len() {
                    hash_table.insert([data[p], data[p + 1], data[p + 2]], p);
                    p += 1;
                }
                i = end;
            }
            None => {
                emit_symbol(w, &lit_codes, &lit_lengths, data[i] as u16);
                if i + MIN_LENGTH <= data.len() {
                    hash_table.insert([data[i], data[i + 1], data[i + 2]], i);
                }
                i += 1;
            }
        }
    }

    emit_symbol(w, &lit_codes, &lit_lengths, END_OF_BLOCK);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::compress_all;
    use crate::codec::deflate::decoder::Inflater;
    use crate::codec::decompress_all;

    fn round_trip(data: &[u8], level: i32) -> Vec<u8> {
        let mut deflater = Deflater::new_raw(level);
        let compressed = compress_all(&mut deflater, data, compress_bound(data.len())).unwrap();
        let mut inflater = Inflater::new_raw();
        decompress_all(&mut inflater, &compressed, data.len()).unwrap()
    }

    #[test]
    fn store_level_round_trips() {
        let data = b"plain bytes, no modeling attempted".repeat(4);
        assert_eq!(round_trip(&data, 0), data);
    }

    #[test]
    fn repetitive_input_round_trips_through_back_references() {
        let data = b"abcabcabcabcabcabcabcabcabcabcabcabc".to_vec();
        assert_eq!(round_trip(&data, 6), data);
    }

    #[test]
    fn empty_input_round_trips() {
        assert_eq!(round_trip(b"", 6), b"");
    }

    #[test]
    fn large_stored_input_spans_multiple_chunks() {
        let data = vec![0x42u8; STORED_CHUNK_MAX * 2 + 17];
        assert_eq!(round_trip(&data, 0), data);
    }

    #[test]
    fn mixed_literal_and_match_content_round_trips() {
        let mut data = Vec::new();
        for i in 0..2000u32 {
            data.push((i % 251) as u8);
        }
        data.extend_from_slice(b"repeated tail repeated tail repeated tail");
        assert_eq!(round_trip(&data, 6), data);
    }
}
