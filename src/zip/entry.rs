//! In-memory entry model: the parsed (name, method, sizes, CRC, offset)
//! tuple the archive handle keeps per entry, plus the buffer-source
//! adapter used by `add`/`replace` (§3 "Entry record", "Buffer source").

/// One CD/LFH pair, as held by an open archive (§3).
#[derive(Debug, Clone)]
pub struct EntryRecord {
    pub name: Vec<u8>,
    pub lfh_offset: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub method: u16,
    pub crc32: u32,
    pub dos_time: u16,
    pub dos_date: u16,
    pub external_attrs: u32,
}

/// Metadata snapshot returned by `stat` (§4.6).
#[derive(Debug, Clone)]
pub struct EntryStat {
    pub name: Vec<u8>,
    pub index: usize,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub method: u16,
    pub dos_time: u16,
    pub dos_date: u16,
}

impl EntryRecord {
    pub fn stat(&self, index: usize) -> EntryStat {
        EntryStat {
            name: self.name.clone(),
            index,
            uncompressed_size: self.uncompressed_size as u64,
            compressed_size: self.compressed_size as u64,
            crc32: self.crc32,
            method: self.method,
            dos_time: self.dos_time,
            dos_date: self.dos_date,
        }
    }
}

/// A borrow-or-own wrapper around the bytes given to `add`/`replace` (§3).
pub enum BufferSource<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl<'a> BufferSource<'a> {
    pub fn borrowed(bytes: &'a [u8]) -> Self {
        BufferSource::Borrowed(bytes)
    }

    pub fn owned(bytes: Vec<u8>) -> Self {
        BufferSource::Owned(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BufferSource::Borrowed(b) => b,
            BufferSource::Owned(b) => b,
        }
    }
}

/// A fully-materialized decompressed entry (§3 "Opened file"), produced by
/// `open_index`. Owns its buffer and a read cursor; independent of the
/// archive once created.
pub struct OpenedFile {
    buffer: Vec<u8>,
    cursor: usize,
}

impl OpenedFile {
    pub fn new(buffer: Vec<u8>) -> Self {
        OpenedFile { buffer, cursor: 0 }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Copies up to `out.len()` bytes from the current cursor, advancing
    /// it, and returns the number of bytes copied (§4.6 `read`).
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let remaining = &self.buffer[self.cursor..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        n
    }
}
