//! Method 93 (zstd), gated behind the `zstd-support` feature. Unlike
//! `deflate`, zstd is not reimplemented in-tree — the spec only asks for a
//! hand-rolled RFC 1951 codec, so zstd is wired through the real `zstd`
//! crate the teacher already depended on.

use std::io::Write;

use crate::codec::{Compressor, Decompressor, Flush, StepOutcome, StepStatus};
use crate::error::{Result, ZipKitError};

pub struct ZstdCompressor {
    level: i32,
    pending_input: Vec<u8>,
    encoded: Option<Vec<u8>>,
    delivered: usize,
    total_in: u64,
    total_out: u64,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        ZstdCompressor {
            level,
            pending_input: Vec::new(),
            encoded: None,
            delivered: 0,
            total_in: 0,
            total_out: 0,
        }
    }
}

impl Compressor for ZstdCompressor {
    fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StepOutcome> {
        self.pending_input.extend_from_slice(input);
        self.total_in += input.len() as u64;

        if self.encoded.is_none() {
            if flush != Flush::Finish {
                return Ok(StepOutcome {
                    consumed: input.len(),
                    produced: 0,
                    status: StepStatus::NeedsMoreInput,
                });
            }
            let mut encoder = zstd::stream::Encoder::new(Vec::new(), self.level)
                .map_err(|e| ZipKitError::MalformedPayload(format!("zstd init failed: {e}")))?;
            encoder
                .write_all(&self.pending_input)
                .map_err(|e| ZipKitError::MalformedPayload(format!("zstd encode failed: {e}")))?;
            let bytes = encoder
                .finish()
                .map_err(|e| ZipKitError::MalformedPayload(format!("zstd finish failed: {e}")))?;
            self.encoded = Some(bytes);
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

pub struct ZstdDecompressor {
    pending_input: Vec<u8>,
    decoded: Option<Vec<u8>>,
    delivered: usize,
    total_in: u64,
    total_out: u64,
}

impl ZstdDecompressor {
    pub fn new() -> Self {
        ZstdDecompressor {
            pending_input: Vec::new(),
            decoded: None,
            delivered: 0,
            total_in: 0,
            total_out: 0,
        }
    }
}

impl Default for ZstdDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for ZstdDecompressor {
    fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StepOutcome> {
        self.pending_input.extend_from_slice(input);
        self.total_in += input.len() as u64;

        if self.decoded.is_none() {
            if flush != Flush::Finish {
                return Ok(StepOutcome {
                    consumed: input.len(),
                    produced: 0,
                    status: StepStatus::NeedsMoreInput,
                });
            }
            let bytes = zstd::stream::decode_all(&self.pending_input[..])
                .map_err(|e| ZipKitError::MalformedPayload(format!("zstd decode failed: {e}")))?;
            self.decoded = Some(bytes);
        }

        let bytes = self.decoded.as_ref().expect("just populated above");
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
