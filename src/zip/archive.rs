//! The libzip-subset library API (§4.6): archive open/close, enumerate,
//! stat, open-index, add, set-method, replace.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::warn;

use super::dostime::DosTimestamp;
use super::entry::{BufferSource, EntryRecord, EntryStat, OpenedFile};
use super::records::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader, EOCD_FIXED_SIZE,
    LFH_FIXED_SIZE, MAX_ENTRY_SIZE,
};
use crate::codec::deflate::compress_bound;
use crate::codec::{compress_all, compressor_for, decompress_all, decompressor_for};
use crate::config::ArchiveConfig;
use crate::crc32;
use crate::error::{Result, ZipKitError};

/// Maximum bytes to scan backward from EOF looking for the EOCD (22-byte
/// fixed record + up to a 65535-byte comment, §4.5).
const EOCD_SEARCH_WINDOW: u64 = EOCD_FIXED_SIZE as u64 + 0xFFFF;

/// Default method for `add` when neither the archive's default nor an
/// explicit method code is given (§4.5 "Entry addition").
pub const DEFAULT_METHOD_STORE: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    Read,
    Write,
}

/// The archive handle (§3 "Archive handle").
pub struct Archive {
    file: File,
    mode: ArchiveMode,
    entries: Vec<EntryRecord>,
    default_method: Option<u16>,
    write_cursor: u64,
    config: ArchiveConfig,
}

impl Archive {
    /// Opens an existing archive read-only, parsing its EOCD and CD.
    pub fn open_read(path: impl AsRef<Path>, config: ArchiveConfig) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let entries = parse_directory(&mut file, file_size)?;
        Ok(Archive {
            file,
            mode: ArchiveMode::Read,
            entries,
            default_method: None,
            write_cursor: file_size,
            config,
        })
    }

    /// Creates (truncating if it exists) a new archive for writing.
    pub fn open_write_new(path: impl AsRef<Path>, config: ArchiveConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Archive {
            file,
            mode: ArchiveMode::Write,
            entries: Vec::new(),
            default_method: None,
            write_cursor: 0,
            config,
        })
    }

    /// Fails if the path already exists (§4.6 "create-exclusive").
    pub fn open_write_exclusive(path: impl AsRef<Path>, config: ArchiveConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Archive {
            file,
            mode: ArchiveMode::Write,
            entries: Vec::new(),
            default_method: None,
            write_cursor: 0,
            config,
        })
    }

    /// Opens an existing archive for read+append, preserving its entries
    /// and positioning the write cursor at the end of the last payload
    /// (before the old CD, which will be overwritten at close).
    pub fn open_append(path: impl AsRef<Path>, config: ArchiveConfig) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_size = file.metadata()?.len();
        let (eocd, eocd_offset) = locate_eocd(&mut file, file_size)?;
        let entries = read_entries_from_eocd(&mut file, &eocd, eocd_offset)?;
        Ok(Archive {
            file,
            mode: ArchiveMode::Write,
            entries,
            default_method: None,
            write_cursor: eocd.cd_offset as u64,
            config,
        })
    }

    pub fn num_entries(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Linear byte-compare lookup (§4.6 `locate`).
    pub fn locate(&self, name: &[u8]) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn get_name(&self, index: usize) -> Result<&[u8]> {
        self.entries
            .get(index)
            .map(|e| e.name.as_slice())
            .ok_or_else(|| ZipKitError::NotFound(format!("index {}", index)))
    }

    pub fn stat(&self, index: usize) -> Result<EntryStat> {
        self.entries
            .get(index)
            .map(|e| e.stat(index))
            .ok_or_else(|| ZipKitError::NotFound(format!("index {}", index)))
    }

    /// Decodes an entry fully into memory (§4.6 `open_index`).
    pub fn open_index(&mut self, index: usize) -> Result<OpenedFile> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| ZipKitError::NotFound(format!("index {}", index)))?
            .clone();

        if !self
            .config
            .check_expansion(entry.compressed_size as u64, entry.uncompressed_size as u64)
        {
            return Err(ZipKitError::ExpansionRefused {
                uncompressed_size: entry.uncompressed_size as u64,
                compressed_size: entry.compressed_size as u64,
            });
        }

        let data_offset = locate_entry_data(&mut self.file, &entry)?;
        self.file.seek(SeekFrom::Start(data_offset))?;
        let mut compressed = vec![0u8; entry.compressed_size as usize];
        self.file.read_exact(&mut compressed)?;

        let mut decompressor = decompressor_for(entry.method)
            .ok_or(ZipKitError::UnsupportedMethod(entry.method))?;
        let decoded = decompress_all(
            &mut *decompressor,
            &compressed,
            entry.uncompressed_size as usize,
        )?;

        let computed = crc32::checksum(&decoded);
        if computed != entry.crc32 {
            if self.config.strict_crc {
                return Err(ZipKitError::MalformedPayload(format!(
                    "CRC mismatch: expected {:#010x}, computed {:#010x}",
                    entry.crc32, computed
                )));
            }
            warn!(
                "CRC mismatch for entry {:?}: expected {:#010x}, computed {:#010x} (strict_crc disabled, continuing)",
                String::from_utf8_lossy(&entry.name),
                entry.crc32,
                computed
            );
        }

        Ok(OpenedFile::new(decoded))
    }

    /// Adds a new entry from `source`, compressing with the effective
    /// method (§4.5 "Entry addition").
    pub fn add(&mut self, name: &[u8], source: BufferSource<'_>, method: Option<u16>) -> Result<usize> {
        if self.mode != ArchiveMode::Write {
            return Err(ZipKitError::InvalidState(
                "add called on a read-only archive".into(),
            ));
        }
        let bytes = source.as_bytes();
        if bytes.len() as u64 > MAX_ENTRY_SIZE {
            return Err(ZipKitError::Inconsistent(
                "input exceeds the 2 GiB payload ceiling".into(),
            ));
        }
        let crc = crc32::checksum(bytes);
        let effective_method = self
            .default_method
            .or(method)
            .unwrap_or(DEFAULT_METHOD_STORE);

        let (final_method, compressed) = compress_with_fallback(effective_method, bytes)?;

        if self.write_cursor > u32::MAX as u64 {
            return Err(ZipKitError::Inconsistent(
                "local file header offset exceeds the 4 GiB ceiling".into(),
            ));
        }
        let lfh_offset = self.write_cursor as u32;

        let ts = DosTimestamp::now();
        let lfh = LocalFileHeader {
            version_needed: super::records::VERSION_NEEDED,
            flags: 0,
            method: final_method,
            dos_time: ts.time,
            dos_date: ts.date,
            crc32: crc,
            compressed_size: compressed.len() as u32,
            uncompressed_size: bytes.len() as u32,
            name: name.to_vec(),
            extra_len: 0,
        };

        self.file.seek(SeekFrom::Start(self.write_cursor))?;
        self.file.write_all(&lfh.serialize())?;
        self.file.write_all(&compressed)?;
        self.write_cursor += lfh.total_len() as u64 + compressed.len() as u64;

        self.entries.push(EntryRecord {
            name: name.to_vec(),
            lfh_offset,
            compressed_size: compressed.len() as u32,
            uncompressed_size: bytes.len() as u32,
            method: final_method,
            crc32: crc,
            dos_time: ts.time,
            dos_date: ts.date,
            external_attrs: 0o100644 << 16,
        });

        Ok(self.entries.len() - 1)
    }

    /// Records the method for the next entry; a no-op on entries already
    /// written (§4.6 `set_method`).
    pub fn set_method(&mut self, method: u16) {
        self.default_method = Some(method);
    }

    /// Rewrites an entry's payload at the current end of file; the CD will
    /// point at the new payload and the old bytes become unreachable
    /// garbage (§4.6 `replace`).
    pub fn replace(&mut self, index: usize, source: BufferSource<'_>) -> Result<()> {
        if self.mode != ArchiveMode::Write {
            return Err(ZipKitError::InvalidState(
                "replace called on a read-only archive".into(),
            ));
        }
        let name = self
            .entries
            .get(index)
            .ok_or_else(|| ZipKitError::NotFound(format!("index {}", index)))?
            .name
            .clone();
        let method = self.entries[index].method;
        let bytes = source.as_bytes();
        let crc = crc32::checksum(bytes);
        let (final_method, compressed) = compress_with_fallback(method, bytes)?;

        if self.write_cursor > u32::MAX as u64 {
            return Err(ZipKitError::Inconsistent(
                "local file header offset exceeds the 4 GiB ceiling".into(),
            ));
        }
        let lfh_offset = self.write_cursor as u32;
        let ts = DosTimestamp::now();
        let lfh = LocalFileHeader {
            version_needed: super::records::VERSION_NEEDED,
            flags: 0,
            method: final_method,
            dos_time: ts.time,
            dos_date: ts.date,
            crc32: crc,
            compressed_size: compressed.len() as u32,
            uncompressed_size: bytes.len() as u32,
            name: name.clone(),
            extra_len: 0,
        };

        self.file.seek(SeekFrom::Start(self.write_cursor))?;
        self.file.write_all(&lfh.serialize())?;
        self.file.write_all(&compressed)?;
        self.write_cursor += lfh.total_len() as u64 + compressed.len() as u64;

        let entry = &mut self.entries[index];
        entry.lfh_offset = lfh_offset;
        entry.compressed_size = compressed.len() as u32;
        entry.uncompressed_size = bytes.len() as u32;
        entry.method = final_method;
        entry.crc32 = crc;
        entry.dos_time = ts.time;
        entry.dos_date = ts.date;
        Ok(())
    }

    /// Finalizes a write-mode archive: emits the CD and EOCD and releases
    /// resources. A no-op closure step for read-mode archives.
    pub fn close(mut self) -> Result<()> {
        if self.mode != ArchiveMode::Write {
            return Ok(());
        }
        if self.write_cursor > u32::MAX as u64 {
            return Err(ZipKitError::Inconsistent(
                "central directory start exceeds the 4 GiB ceiling".into(),
            ));
        }
        let cd_start = self.write_cursor as u32;
        self.file.seek(SeekFrom::Start(self.write_cursor))?;

        let mut cd_size: u64 = 0;
        for entry in &self.entries {
            let cd = CentralDirectoryHeader {
                version_made_by: super::records::VERSION_MADE_BY_UNIX,
                version_needed: super::records::VERSION_NEEDED,
                flags: 0,
                method: entry.method,
                dos_time: entry.dos_time,
                dos_date: entry.dos_date,
                crc32: entry.crc32,
                compressed_size: entry.compressed_size,
                uncompressed_size: entry.uncompressed_size,
                external_attrs: entry.external_attrs,
                lfh_offset: entry.lfh_offset,
                name: entry.name.clone(),
            };
            let bytes = cd.serialize();
            cd_size += bytes.len() as u64;
            if cd_size > u32::MAX as u64 {
                return Err(ZipKitError::Inconsistent(
                    "central directory size exceeds the 4 GiB ceiling".into(),
                ));
            }
            self.file.write_all(&bytes)?;
        }

        let entry_count = self.entries.len() as u16;
        let eocd = EndOfCentralDirectory {
            entries_on_disk: entry_count,
            entries_total: entry_count,
            cd_size: cd_size as u32,
            cd_offset: cd_start,
        };
        self.file.write_all(&eocd.serialize())?;
        self.file.flush()?;
        Ok(())
    }
}

/// Encodes `bytes` at `method`, falling back to store if the compressed
/// form is not smaller (§4.5 "Compression fallback").
fn compress_with_fallback(method: u16, bytes: &[u8]) -> Result<(u16, Vec<u8>)> {
    let level = -1;
    let bound = match method {
        0 => bytes.len(),
        8 => compress_bound(bytes.len()),
        _ => bytes.len() + bytes.len() / 2 + 64,
    };
    let mut compressor = compressor_for(method, level).ok_or(ZipKitError::UnsupportedMethod(method))?;
    let compressed = compress_all(&mut *compressor, bytes, bound.max(64))?;

    if method != 0 && !bytes.is_empty() && compressed.len() >= bytes.len() {
        let mut store = compressor_for(0, level).expect("store is always available");
        let stored = compress_all(&mut *store, bytes, bytes.len())?;
        return Ok((0, stored));
    }
    Ok((method, compressed))
}

fn locate_eocd(file: &mut File, file_size: u64) -> Result<(EndOfCentralDirectory, u64)> {
    let window = EOCD_SEARCH_WINDOW.min(file_size);
    let tail_start = file_size - window;
    file.seek(SeekFrom::Start(tail_start))?;
    let mut tail = vec![0u8; window as usize];
    file.read_exact(&mut tail)?;
    EndOfCentralDirectory::locate(&tail, tail_start, file_size)
}

fn parse_directory(file: &mut File, file_size: u64) -> Result<Vec<EntryRecord>> {
    if file_size < EOCD_FIXED_SIZE as u64 {
        return Err(ZipKitError::NotAZip("file too small to contain an EOCD".into()));
    }
    let (eocd, eocd_offset) = locate_eocd(file, file_size)?;
    read_entries_from_eocd(file, &eocd, eocd_offset)
}

fn read_entries_from_eocd(
    file: &mut File,
    eocd: &EndOfCentralDirectory,
    _eocd_offset: u64,
) -> Result<Vec<EntryRecord>> {
    file.seek(SeekFrom::Start(eocd.cd_offset as u64))?;
    let mut cd_buf = vec![0u8; eocd.cd_size as usize];
    file.read_exact(&mut cd_buf)?;

    let mut entries = Vec::with_capacity(eocd.entries_total as usize);
    let mut offset = 0usize;
    for _ in 0..eocd.entries_total {
        let (cd, advance) = CentralDirectoryHeader::parse(&cd_buf[offset..])?;
        entries.push(EntryRecord {
            name: cd.name,
            lfh_offset: cd.lfh_offset,
            compressed_size: cd.compressed_size,
            uncompressed_size: cd.uncompressed_size,
            method: cd.method,
            crc32: cd.crc32,
            dos_time: cd.dos_time,
            dos_date: cd.dos_date,
            external_attrs: cd.external_attrs,
        });
        offset += advance;
    }
    Ok(entries)
}

fn locate_entry_data(file: &mut File, entry: &EntryRecord) -> Result<u64> {
    let file_size = file.metadata()?.len();
    if entry.lfh_offset as u64 >= file_size {
        return Err(ZipKitError::Inconsistent(
            "local file header offset is out of bounds".into(),
        ));
    }
    file.seek(SeekFrom::Start(entry.lfh_offset as u64))?;
    let mut header = vec![0u8; LFH_FIXED_SIZE];
    file.read_exact(&mut header)?;
    let name_len = crate::byteio::read_u16_le(&header, 26)? as u64;
    let extra_len = crate::byteio::read_u16_le(&header, 28)? as u64;

    let sig = crate::byteio::read_u32_le(&header, 0)?;
    if sig != super::records::LFH_SIGNATURE {
        return Err(ZipKitError::Inconsistent(
            "local file header signature mismatch".into(),
        ));
    }

    let data_offset = LFH_FIXED_SIZE as u64 + entry.lfh_offset as u64 + name_len + extra_len;
    let data_end = data_offset
        .checked_add(entry.compressed_size as u64)
        .ok_or_else(|| ZipKitError::Inconsistent("entry data range overflows".into()))?;
    if data_end > file_size {
        return Err(ZipKitError::Inconsistent(
            "entry data extends past end of file".into(),
        ));
    }
    Ok(data_offset)
}
