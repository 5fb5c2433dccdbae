//! Method 0 ("store"): the identity codec.

use super::{Compressor, Decompressor, Flush, StepOutcome, StepStatus};
use crate::error::Result;

pub struct StoreCodec {
    total_in: u64,
    total_out: u64,
}

impl StoreCodec {
    pub fn new() -> Self {
        StoreCodec {
            total_in: 0,
            total_out: 0,
        }
    }
}

impl Default for StoreCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_step(
    input: &[u8],
    output: &mut [u8],
    flush: Flush,
    total_in: &mut u64,
    total_out: &mut u64,
) -> StepOutcome {
    let n = input.len().min(output.len());
    output[..n].copy_from_slice(&input[..n]);
    *total_in += n as u64;
    *total_out += n as u64;
    let status = if n < input.len() {
        StepStatus::NeedsMoreOutput
    } else if flush == Flush::Finish {
        StepStatus::StreamEnd
    } else {
        StepStatus::Progress
    };
    StepOutcome {
        consumed: n,
        produced: n,
        status,
    }
}

impl Compressor for StoreCodec {
    fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StepOutcome> {
        Ok(copy_step(input, output, flush, &mut self.total_in, &mut self.total_out))
    }
    fn total_in(&self) -> u64 {
        self.total_in
    }
    fn total_out(&self) -> u64 {
        self.total_out
    }
}

impl Decompressor for StoreCodec {
    fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StepOutcome> {
        Ok(copy_step(input, output, flush, &mut self.total_in, &mut self.total_out))
    }
    fn total_in(&self) -> u64 {
        self.total_in
    }
    fn total_out(&self) -> u64 {
        self.total_out
    }
}
