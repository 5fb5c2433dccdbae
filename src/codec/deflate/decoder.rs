//! RFC 1951 raw DEFLATE decoder.
//!
//! Resumability is handled by only ever committing the bit-stream cursor
//! once a full unit of work (a block header, a stored-block length pair, a
//! whole dynamic-header table, or one literal/length+distance symbol pair)
//! has been read successfully. If a unit can't be completed with the bits
//! currently buffered, nothing is committed and the step reports
//! `NeedsMoreInput`; the next call retries the same unit once more input
//! has been appended. This keeps the resumable states explicit without
//! threading a parallel sub-state machine through every multi-read unit.

use std::rc::Rc;

use super::huffman::HuffmanTree;
use super::tables::{
    fixed_dist_lengths, fixed_litlen_lengths, CODE_LENGTH_ORDER, DIST_BASE, DIST_EXTRA,
    END_OF_BLOCK, LENGTH_BASE, LENGTH_EXTRA, WINDOW_SIZE,
};
use crate::bitio::BitReader;
use crate::codec::{Decompressor, Flush, StepOutcome, StepStatus};
use crate::error::{Result, ZipKitError};

/// Selects the header convention the decoder expects before the raw
/// DEFLATE bitstream begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Raw,
    Zlib,
    Gzip,
    Auto,
}

#[derive(Debug)]
enum BlockPhase {
    AwaitHeader,
    Stored,
    StoredBody { remaining: u16 },
    Dynamic,
    Symbols,
    Done,
}

#[derive(Debug)]
enum PendingEmit {
    None,
    Literal(u8),
    Copy(usize),
}

struct Window {
    buf: Box<[u8; WINDOW_SIZE]>,
    write: usize,
    filled: usize,
}

impl Window {
    fn new() -> Self {
        Window {
            buf: Box::new([0u8; WINDOW_SIZE]),
            write: 0,
            filled: 0,
        }
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.write] = byte;
        self.write = (self.write + 1) & (WINDOW_SIZE - 1);
        self.filled = (self.filled + 1).min(WINDOW_SIZE);
    }

    /// Byte `n` positions behind the write cursor (`n == 1` is the most
    /// recently pushed byte).
    fn read_back(&self, n: usize) -> u8 {
        let idx = (self.write + WINDOW_SIZE - n) & (WINDOW_SIZE - 1);
        self.buf[idx]
    }
}

/// RFC 1951 decoder.
pub struct Inflater {
    pending: Vec<u8>,
    bit_pos: u32,
    block: BlockPhase,
    final_block: bool,
    trees: Option<(Rc<HuffmanTree>, Rc<HuffmanTree>)>,
    pending_emit: PendingEmit,
    window: Window,
    wrapper: WindowMode,
    header_done: bool,
    total_in: u64,
    total_out: u64,
}

impl Inflater {
    pub fn new_raw() -> Self {
        Self::new(WindowMode::Raw)
    }

    pub fn new(wrapper: WindowMode) -> Self {
        Inflater {
            pending: Vec::new(),
            bit_pos: 0,
            block: BlockPhase::AwaitHeader,
            final_block: false,
            trees: None,
            pending_emit: PendingEmit::None,
            window: Window::new(),
            wrapper,
            header_done: matches!(wrapper, WindowMode::Raw),
            total_in: 0,
            total_out: 0,
        }
    }

    fn reader(&self) -> BitReader<'_> {
        let mut r = BitReader::new(&self.pending);
        if self.bit_pos > 0 {
            r.take(self.bit_pos);
        }
        r
    }

    /// Persists a reader's position after a unit of work fully succeeded:
    /// drops whole consumed bytes from `pending` and keeps any partial byte
    /// in place, remembering how many of its bits are already spent.
    fn commit(&mut self, r: &BitReader<'_>) {
        let (full_bytes, new_bit_pos) = r.position();
        if full_bytes > 0 {
            self.pending.drain(0..full_bytes);
        }
        self.bit_pos = new_bit_pos;
    }

    fn consume_header_if_needed(&mut self) -> Result<bool> {
        if self.header_done {
            return Ok(true);
        }
        match self.wrapper {
            WindowMode::Raw => {
                self.header_done = true;
                Ok(true)
            }
            WindowMode::Zlib => self.try_consume_zlib_header(),
            WindowMode::Gzip => self.try_consume_gzip_header(),
            WindowMode::Auto => {
                if self.pending.len() < 2 {
                    return Ok(false);
                }
                if self.pending[0] == 0x1F && self.pending[1] == 0x8B {
                    self.wrapper = WindowMode::Gzip;
                    self.try_consume_gzip_header()
                } else {
                    self.wrapper = WindowMode::Zlib;
                    self.try_consume_zlib_header()
                }
            }
        }
    }

    fn try_consume_zlib_header(&mut self) -> Result<bool> {
        if self.pending.len() < 2 {
            return Ok(false);
        }
        let cmf = self.pending[0];
        let flg = self.pending[1];
        if cmf & 0x0F != 8 {
            return Err(ZipKitError::MalformedPayload(
                "invalid zlib header: compression method".into(),
            ));
        }
        if (cmf as u32 * 256 + flg as u32) % 31 != 0 {
            return Err(ZipKitError::MalformedPayload(
                "invalid zlib header: check bits".into(),
            ));
        }
        if flg & 0x20 != 0 {
            return Err(ZipKitError::MalformedPayload(
                "zlib preset dictionaries are not supported".into(),
            ));
        }
        self.pending.drain(0..2);
        self.header_done = true;
        Ok(true)
    }

    fn try_consume_gzip_header(&mut self) -> Result<bool> {
        let buf = &self.pending;
        if buf.len() < 10 {
            return Ok(false);
        }
        if buf[0] != 0x1F || buf[1] != 0x8B {
            return Err(ZipKitError::MalformedPayload("invalid gzip magic".into()));
        }
        if buf[2] != 8 {
            return Err(ZipKitError::MalformedPayload(
                "unsupported gzip compression method".into(),
            ));
        }
        let flags = buf[3];
        let mut pos = 10usize;
        if flags & 0x04 != 0 {
            if buf.len() < pos + 2 {
                return Ok(false);
            }
            let xlen = u16::from_le_bytes([buf[pos], buf[pos + 1]]) as usize;
            pos += 2;
            if buf.len() < pos + xlen {
                return Ok(false);
            }
            pos += xlen;
        }
        if flags & 0x08 != 0 {
            match buf[pos..].iter().position(|&b| b == 0) {
                Some(rel) => pos += rel + 1,
                None => return Ok(false),
            }
        }
        if flags & 0x10 != 0 {
            match buf[pos..].iter().position(|&b| b == 0) {
                Some(rel) => pos += rel + 1,
                None => return Ok(false),
            }
        }
        if flags & 0x02 != 0 {
            if buf.len() < pos + 2 {
                return Ok(false);
            }
            pos += 2;
        }
        self.pending.drain(0..pos);
        self.header_done = true;
        Ok(true)
    }

    fn try_read_block_header(&mut self) -> Result<Option<()>> {
        let mut r = self.reader();
        let final_bit = match r.take(1) {
            Some(b) => b,
            None => return Ok(None),
        };
        let block_type = match r.take(2) {
            Some(t) => t,
            None => return Ok(None),
        };
        self.final_block = final_bit == 1;
        self.commit(&r);
        match block_type {
            0 => self.block = BlockPhase::Stored,
            1 => {
                let lit = Rc::new(HuffmanTree::build(&fixed_litlen_lengths())?);
                let dist = Rc::new(HuffmanTree::build(&fixed_dist_lengths())?);
                self.trees = Some((lit, dist));
                self.block = BlockPhase::Symbols;
            }
            2 => self.block = BlockPhase::Dynamic,
            _ => {
                return Err(ZipKitError::MalformedPayload(
                    "reserved block type 3".into(),
                ))
            }
        }
        Ok(Some(()))
    }

    fn try_read_stored_header(&mut self) -> Result<Option<u16>> {
        let mut r = self.reader();
        r.align_to_byte();
        let len_lo = match r.read_byte() {
            Some(b) => b,
            None => return Ok(None),
        };
        let len_hi = match r.read_byte() {
            Some(b) => b,
            None => return Ok(None),
        };
        let nlen_lo = match r.read_byte() {
            Some(b) => b,
            None => return Ok(None),
        };
        let nlen_hi = match r.read_byte() {
            Some(b) => b,
            None => return Ok(None),
        };
        let len = u16::from_le_bytes([len_lo, len_hi]);
        let nlen = u16::from_le_bytes([nlen_lo, nlen_hi]);
        if nlen != !len {
            return Err(ZipKitError::MalformedPayload(
                "stored block NLEN does not complement LEN".into(),
            ));
        }
        self.commit(&r);
        Ok(Some(len))
    }

    fn try_read_dynamic_header(&mut self) -> Result<Option<(Rc<HuffmanTree>, Rc<HuffmanTree>)>> {
        let mut r = self.reader();
        let hlit = match r.take(5) {
            Some(v) => v as usize + 257,
            None => return Ok(None),
        };
        let hdist = match r.take(5) {
            Some(v) => v as usize + 1,
            None => return Ok(None),
        };
        let hclen = match r.take(4) {
            Some(v) => v as usize + 4,
            None => return Ok(None),
        };

        let mut cl_lengths = [0u8; 19];
        for i in 0..hclen {
            let v = match r.take(3) {
                Some(v) => v,
                None => return Ok(None),
            };
            cl_lengths[CODE_LENGTH_ORDER[i]] = v as u8;
        }
        let cl_tree = HuffmanTree::build(&cl_lengths)?;

        let total = hlit + hdist;
        let mut lengths: Vec<u8> = Vec::with_capacity(total);
        let mut cursor = 0u32;
        while lengths.len() < total {
            let sym = match cl_tree.decode(&mut r, &mut cursor)? {
                Some(s) => s,
                None => return Ok(None),
            };
            match sym {
                0..=15 => lengths.push(sym as u8),
                16 => {
                    let extra = match r.take(2) {
                        Some(v) => v,
                        None => return Ok(None),
                    };
                    let repeat = extra as usize + 3;
                    let prev = *lengths
                        .last()
                        .ok_or_else(|| ZipKitError::MalformedPayload("repeat with no previous length".into()))?;
                    if lengths.len() + repeat > total {
                        return Err(ZipKitError::MalformedPayload("code length repeat overruns table".into()));
                    }
                    lengths.extend(std::iter::repeat(prev).take(repeat));
                }
                17 => {
                    let extra = match r.take(3) {
                        Some(v) => v,
                        None => return Ok(None),
                    };
                    let repeat = extra as usize + 3;
                    if lengths.len() + repeat > total {
                        return Err(ZipKitError::MalformedPayload("zero-repeat overruns table".into()));
                    }
                    lengths.extend(std::iter::repeat(0u8).take(repeat));
                }
                18 => {
                    let extra = match r.take(7) {
                        Some(v) => v,
                        None => return Ok(None),
                    };
                    let repeat = extra as usize + 11;
                    if lengths.len() + repeat > total {
                        return Err(ZipKitError::MalformedPayload("zero-repeat overruns table".into()));
                    }
                    lengths.extend(std::iter::repeat(0u8).take(repeat));
                }
                _ => unreachable!("code-length alphabet is 0..=18"),
            }
        }

        self.commit(&r);
        let lit_tree = Rc::new(HuffmanTree::build(&lengths[..hlit])?);
        let dist_tree = Rc::new(HuffmanTree::build(&lengths[hlit..])?);
        Ok(Some((lit_tree, dist_tree)))
    }

    /// Attempts to decode exactly one symbol (a literal, a length/distance
    /// pair, or end-of-block). Returns `Ok(None)` if there aren't enough
    /// bits buffered yet.
    fn try_decode_symbol(&mut self, lit: &HuffmanTree, dist: &HuffmanTree) -> Result<Option<Event>> {
        let mut r = self.reader();
        let mut cursor = 0u32;
        let sym = match lit.decode(&mut r, &mut cursor)? {
            Some(s) => s,
            None => return Ok(None),
        };
        if sym < 256 {
            self.commit(&r);
            return Ok(Some(Event::Literal(sym as u8)));
        }
        if sym == END_OF_BLOCK {
            self.commit(&r);
            return Ok(Some(Event::EndOfBlock));
        }
        let len_idx = (sym - 257) as usize;
        if len_idx >= LENGTH_BASE.len() {
            return Err(ZipKitError::MalformedPayload(format!(
                "invalid length code {}",
                sym
            )));
        }
        let extra_bits = LENGTH_EXTRA[len_idx] as u32;
        let extra = if extra_bits > 0 {
            match r.take(extra_bits) {
                Some(v) => v,
                None => return Ok(None),
            }
        } else {
            0
        };
        let length = LENGTH_BASE[len_idx] as usize + extra as usize;

        let mut dist_cursor = 0u32;
        let dist_sym = match dist.decode(&mut r, &mut dist_cursor)? {
            Some(s) => s,
            None => return Ok(None),
        };
        if dist_sym as usize >= DIST_BASE.len() {
            return Err(ZipKitError::MalformedPayload(format!(
                "invalid distance code {}",
                dist_sym
            )));
        }
        let dist_extra_bits = DIST_EXTRA[dist_sym as usize] as u32;
        let dist_extra = if dist_extra_bits > 0 {
            match r.take(dist_extra_bits) {
                Some(v) => v,
                None => return Ok(None),
            }
        } else {
            0
        };
        let distance = DIST_BASE[dist_sym as usize] as usize + dist_extra as usize;

        self.commit(&r);
        Ok(Some(Event::Match { length, distance }))
    }

    fn emit_pending(&mut self, output: &mut [u8], out_pos: &mut usize) -> bool {
        loop {
            match &mut self.pending_emit {
                PendingEmit::None => return true,
                PendingEmit::Literal(byte) => {
                    if *out_pos >= output.len() {
                        return false;
                    }
                    output[*out_pos] = *byte;
                    *out_pos += 1;
                    self.pending_emit = PendingEmit::None;
                }
                PendingEmit::Copy(remaining) => {
                    while *remaining > 0 {
                        if *out_pos >= output.len() {
                            return false;
                        }
                        let byte = self.window.read_back(*remaining);
                        output[*out_pos] = byte;
                        *out_pos += 1;
                        *remaining -= 1;
                    }
                    self.pending_emit = PendingEmit::None;
                }
            }
        }
    }
}

enum Event {
    Literal(u8),
    Match { length: usize, distance: usize },
    EndOfBlock,
}

impl Decompressor for Inflater {
    fn step(&mut self, input: &[u8], output: &mut [u8], _flush: Flush) -> Result<StepOutcome> {
        self.pending.extend_from_slice(input);
        self.total_in += input.len() as u64;
        let mut out_pos = 0usize;

        loop {
            if !self.emit_pending(output, &mut out_pos) {
                return Ok(StepOutcome {
                    consumed: input.len(),
                    produced: out_pos,
                    status: StepStatus::NeedsMoreOutput,
                });
            }

            if matches!(self.block, BlockPhase::Done) {
                self.total_out += out_pos as u64;
                return Ok(StepOutcome {
                    consumed: input.len(),
                    produced: out_pos,
                    status: StepStatus::StreamEnd,
                });
            }

            if !self.consume_header_if_needed()? {
                self.total_out += out_pos as u64;
                return Ok(StepOutcome {
                    consumed: input.len(),
                    produced: out_pos,
                    status: StepStatus::NeedsMoreInput,
                });
            }

            let progressed = match self.block {
                BlockPhase::AwaitHeader => self.try_read_block_header()?.is_some(),
                BlockPhase::Stored => match self.try_read_stored_header()? {
                    Some(len) => self.run_stored_block(len, output, &mut out_pos) != StoredProgress::NeedInput,
                    None => false,
                },
                BlockPhase::StoredBody { remaining } => {
                    self.run_stored_block(remaining, output, &mut out_pos) != StoredProgress::NeedInput
                }
                BlockPhase::Dynamic => match self.try_read_dynamic_header()? {
                    Some((lit, dist)) => {
                        self.trees = Some((lit, dist));
                        self.block = BlockPhase::Symbols;
                        true
                    }
                    None => false,
                },
                BlockPhase::Symbols => {
                    let (lit, dist) = self
                        .trees
                        .clone()
                        .expect("symbols phase always has trees installed");
                    match self.try_decode_symbol(&lit, &dist)? {
                        Some(Event::Literal(byte)) => {
                            self.window.push(byte);
                            if out_pos < output.len() {
                                output[out_pos] = byte;
                                out_pos += 1;
                            } else {
                                self.pending_emit = PendingEmit::Literal(byte);
                            }
                            true
                        }
                        Some(Event::Match { length, distance }) => {
                            if distance > self.window.filled {
                                return Err(ZipKitError::MalformedPayload(format!(
                                    "back-reference distance {} exceeds window contents {}",
                                    distance, self.window.filled
                                )));
                            }
                            for _ in 0..length {
                                let byte = self.window.read_back(distance);
                                self.window.push(byte);
                            }
                            let mut remaining = length;
                            while remaining > 0 {
                                if out_pos >= output.len() {
                                    self.pending_emit = PendingEmit::Copy(remaining);
                                    break;
                                }
                                output[out_pos] = self.window.read_back(remaining);
                                out_pos += 1;
                                remaining -= 1;
                            }
                            true
                        }
                        Some(Event::EndOfBlock) => {
                            self.trees = None;
                            if self.final_block {
                                self.block = BlockPhase::Done;
                            } else {
                                self.block = BlockPhase::AwaitHeader;
                            }
                            true
                        }
                        None => false,
                    }
                }
                BlockPhase::Done => unreachable!("handled above"),
            };

            if !progressed {
                self.total_out += out_pos as u64;
                return Ok(StepOutcome {
                    consumed: input.len(),
                    produced: out_pos,
                    status: StepStatus::NeedsMoreInput,
                });
            }

            if out_pos >= output.len() && !matches!(self.block, BlockPhase::Done) {
                self.total_out += out_pos as u64;
                return Ok(StepOutcome {
                    consumed: input.len(),
                    produced: out_pos,
                    status: StepStatus::NeedsMoreOutput,
                });
            }
        }
    }

    fn total_in(&self) -> u64 {
        self.total_in
    }

    fn total_out(&self) -> u64 {
        self.total_out
    }
}

/// What happened in one call to `run_stored_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoredProgress {
    /// The block's remaining bytes were all copied (block phase advanced).
    Complete,
    /// Ran out of buffered input; no bytes left in `pending` to copy.
    NeedInput,
    /// The output slice is full; bytes remain to copy on the next call.
    NeedOutput,
}

impl Inflater {
    /// Copies as many of a stored block's `len` remaining bytes as
    /// buffered input and output space allow. Bytes are taken directly off
    /// the front of `pending`, so nothing here needs its own resumable bit
    /// cursor — `len` itself already reflects whatever was copied by an
    /// earlier, partial call.
    fn run_stored_block(&mut self, len: u16, output: &mut [u8], out_pos: &mut usize) -> StoredProgress {
        let mut copied = 0usize;
        while copied < len as usize {
            if *out_pos >= output.len() {
                self.block = BlockPhase::StoredBody {
                    remaining: len - copied as u16,
                };
                return StoredProgress::NeedOutput;
            }
            if self.pending.is_empty() {
                self.block = BlockPhase::StoredBody {
                    remaining: len - copied as u16,
                };
                return StoredProgress::NeedInput;
            }
            let byte = self.pending.remove(0);
            self.window.push(byte);
            output[*out_pos] = byte;
            *out_pos += 1;
            copied += 1;
        }
        self.block = if self.final_block {
            BlockPhase::Done
        } else {
            BlockPhase::AwaitHeader
        };
        StoredProgress::Complete
    }
}
