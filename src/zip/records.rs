//! Strongly-typed parsers and writers for the three on-disk record formats
//! (§4.5). Replaces hand-counted offsets with named constants and
//! bounds-checked field access (DESIGN NOTES §9).

use crate::byteio::{
    need, read_u16_le, read_u32_le, write_u16_le, write_u32_le,
};
use crate::error::{Result, ZipKitError};

pub const LFH_SIGNATURE: u32 = 0x0403_4B50;
pub const CD_SIGNATURE: u32 = 0x0201_4B50;
pub const EOCD_SIGNATURE: u32 = 0x0605_4B50;

pub const LFH_FIXED_SIZE: usize = 30;
pub const CD_FIXED_SIZE: usize = 46;
pub const EOCD_FIXED_SIZE: usize = 22;

pub const VERSION_NEEDED: u16 = 20;
pub const VERSION_MADE_BY_UNIX: u16 = 0x031E;

/// Payload size ceiling enforced because ZIP64 is out of scope (§3, §1).
pub const MAX_ENTRY_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// General-purpose flag bits that mark an entry this engine refuses to
/// read (§6: "No encryption").
const GPBF_ENCRYPTED: u16 = 1 << 0;
const GPBF_STRONG_ENCRYPTION: u16 = 1 << 6;
const GPBF_CENTRAL_DIR_ENCRYPTED: u16 = 1 << 13;

/// Parsed Local File Header plus the filename bytes that follow it.
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub dos_time: u16,
    pub dos_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name: Vec<u8>,
    pub extra_len: u16,
}

impl LocalFileHeader {
    /// Size of this header plus its filename and extra field.
    pub fn total_len(&self) -> usize {
        LFH_FIXED_SIZE + self.name.len() + self.extra_len as usize
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        need(buf, 0, LFH_FIXED_SIZE)?;
        let sig = read_u32_le(buf, 0)?;
        if sig != LFH_SIGNATURE {
            return Err(ZipKitError::Inconsistent(format!(
                "local file header signature mismatch: {:#010x}",
                sig
            )));
        }
        let version_needed = read_u16_le(buf, 4)?;
        let flags = read_u16_le(buf, 6)?;
        reject_unsupported_flags(flags)?;
        let method = read_u16_le(buf, 8)?;
        let dos_time = read_u16_le(buf, 10)?;
        let dos_date = read_u16_le(buf, 12)?;
        let crc32 = read_u32_le(buf, 14)?;
        let compressed_size = read_u32_le(buf, 18)?;
        let uncompressed_size = read_u32_le(buf, 22)?;
        let name_len = read_u16_le(buf, 26)? as usize;
        let extra_len = read_u16_le(buf, 28)?;
        need(buf, LFH_FIXED_SIZE, name_len)?;
        let name = buf[LFH_FIXED_SIZE..LFH_FIXED_SIZE + name_len].to_vec();
        Ok(LocalFileHeader {
            version_needed,
            flags,
            method,
            dos_time,
            dos_date,
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            extra_len,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        write_u32_le(&mut out, LFH_SIGNATURE);
        write_u16_le(&mut out, VERSION_NEEDED);
        write_u16_le(&mut out, 0); // general-purpose flag
        write_u16_le(&mut out, self.method);
        write_u16_le(&mut out, self.dos_time);
        write_u16_le(&mut out, self.dos_date);
        write_u32_le(&mut out, self.crc32);
        write_u32_le(&mut out, self.compressed_size);
        write_u32_le(&mut out, self.uncompressed_size);
        write_u16_le(&mut out, self.name.len() as u16);
        write_u16_le(&mut out, 0); // extra length
        out.extend_from_slice(&self.name);
        out
    }
}

fn reject_unsupported_flags(flags: u16) -> Result<()> {
    if flags & (GPBF_ENCRYPTED | GPBF_STRONG_ENCRYPTION | GPBF_CENTRAL_DIR_ENCRYPTED) != 0 {
        return Err(ZipKitError::Inconsistent(
            "encrypted entries are not supported".into(),
        ));
    }
    Ok(())
}

/// Parsed Central Directory header plus its filename.
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub dos_time: u16,
    pub dos_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub external_attrs: u32,
    pub lfh_offset: u32,
    pub name: Vec<u8>,
}

impl CentralDirectoryHeader {
    pub fn total_len(&self) -> usize {
        CD_FIXED_SIZE + self.name.len()
    }

    /// Parses one CD entry starting at `buf[0]`. Returns the entry and how
    /// many bytes it occupied (46 + filename + extra + comment), so the
    /// caller can advance through the CD buffer.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        need(buf, 0, CD_FIXED_SIZE)?;
        let sig = read_u32_le(buf, 0)?;
        if sig != CD_SIGNATURE {
            return Err(ZipKitError::Inconsistent(format!(
                "central directory header signature mismatch: {:#010x}",
                sig
            )));
        }
        let version_made_by = read_u16_le(buf, 4)?;
        let version_needed = read_u16_le(buf, 6)?;
        let flags = read_u16_le(buf, 8)?;
        reject_unsupported_flags(flags)?;
        let method = read_u16_le(buf, 10)?;
        let dos_time = read_u16_le(buf, 12)?;
        let dos_date = read_u16_le(buf, 14)?;
        let crc32 = read_u32_le(buf, 16)?;
        let compressed_size = read_u32_le(buf, 20)?;
        let uncompressed_size = read_u32_le(buf, 24)?;
        let name_len = read_u16_le(buf, 28)? as usize;
        let extra_len = read_u16_le(buf, 30)? as usize;
        let comment_len = read_u16_le(buf, 32)? as usize;
        let external_attrs = read_u32_le(buf, 38)?;
        let lfh_offset = read_u32_le(buf, 42)?;

        if compressed_size as u64 > MAX_ENTRY_SIZE || uncompressed_size as u64 > MAX_ENTRY_SIZE {
            return Err(ZipKitError::Inconsistent(
                "entry size exceeds the 2 GiB payload ceiling".into(),
            ));
        }

        need(buf, CD_FIXED_SIZE, name_len)?;
        let name = buf[CD_FIXED_SIZE..CD_FIXED_SIZE + name_len].to_vec();

        let advance = CD_FIXED_SIZE
            .checked_add(name_len)
            .and_then(|v| v.checked_add(extra_len))
            .and_then(|v| v.checked_add(comment_len))
            .ok_or_else(|| ZipKitError::Inconsistent("central directory entry length overflow".into()))?;
        need(buf, 0, advance)?;

        Ok((
            CentralDirectoryHeader {
                version_made_by,
                version_needed,
                flags,
                method,
                dos_time,
                dos_date,
                crc32,
                compressed_size,
                uncompressed_size,
                external_attrs,
                lfh_offset,
                name,
            },
            advance,
        ))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        write_u32_le(&mut out, CD_SIGNATURE);
        write_u16_le(&mut out, VERSION_MADE_BY_UNIX);
        write_u16_le(&mut out, VERSION_NEEDED);
        write_u16_le(&mut out, 0); // flags
        write_u16_le(&mut out, self.method);
        write_u16_le(&mut out, self.dos_time);
        write_u16_le(&mut out, self.dos_date);
        write_u32_le(&mut out, self.crc32);
        write_u32_le(&mut out, self.compressed_size);
        write_u32_le(&mut out, self.uncompressed_size);
        write_u16_le(&mut out, self.name.len() as u16);
        write_u16_le(&mut out, 0); // extra length
        write_u16_le(&mut out, 0); // comment length
        write_u16_le(&mut out, 0); // disk number
        write_u16_le(&mut out, 0); // internal attrs
        write_u32_le(&mut out, self.external_attrs);
        write_u32_le(&mut out, self.lfh_offset);
        out.extend_from_slice(&self.name);
        out
    }
}

/// Parsed End Of Central Directory record.
#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDirectory {
    pub entries_on_disk: u16,
    pub entries_total: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
}

impl EndOfCentralDirectory {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        need(buf, 0, EOCD_FIXED_SIZE)?;
        let sig = read_u32_le(buf, 0)?;
        if sig != EOCD_SIGNATURE {
            return Err(ZipKitError::Inconsistent(
                "end of central directory signature mismatch".into(),
            ));
        }
        let this_disk = read_u16_le(buf, 4)?;
        let cd_start_disk = read_u16_le(buf, 6)?;
        if this_disk != 0 || cd_start_disk != 0 {
            return Err(ZipKitError::Inconsistent(
                "spanned/multi-disk archives are not supported".into(),
            ));
        }
        let entries_on_disk = read_u16_le(buf, 8)?;
        let entries_total = read_u16_le(buf, 10)?;
        let cd_size = read_u32_le(buf, 12)?;
        let cd_offset = read_u32_le(buf, 16)?;
        Ok(EndOfCentralDirectory {
            entries_on_disk,
            entries_total,
            cd_size,
            cd_offset,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(EOCD_FIXED_SIZE);
        write_u32_le(&mut out, EOCD_SIGNATURE);
        write_u16_le(&mut out, 0); // this disk
        write_u16_le(&mut out, 0); // cd start disk
        write_u16_le(&mut out, self.entries_on_disk);
        write_u16_le(&mut out, self.entries_total);
        write_u32_le(&mut out, self.cd_size);
        write_u32_le(&mut out, self.cd_offset);
        write_u16_le(&mut out, 0); // comment length
        out
    }

    /// Scans `tail` (the last `min(65557, file_size)` bytes of the file)
    /// backward for the EOCD signature, accepting a candidate only if its
    /// CD bounds are consistent with the file (§4.5 "EOCD location").
    pub fn locate(tail: &[u8], tail_start_in_file: u64, file_size: u64) -> Result<(Self, u64)> {
        if tail.len() < EOCD_FIXED_SIZE {
            return Err(ZipKitError::NotAZip("file too small to contain an EOCD".into()));
        }
        let sig_bytes = EOCD_SIGNATURE.to_le_bytes();
        let mut i = tail.len() - EOCD_FIXED_SIZE;
        loop {
            if tail[i..i + 4] == sig_bytes {
                if let Some(candidate) = Self::try_accept(tail, i, tail_start_in_file, file_size) {
                    return Ok(candidate);
                }
            }
            if i == 0 {
                break;
            }
            i -= 1;
        }
        Err(ZipKitError::NotAZip(
            "no valid end of central directory record found".into(),
        ))
    }

    fn try_accept(
        tail: &[u8],
        at: usize,
        tail_start_in_file: u64,
        file_size: u64,
    ) -> Option<(Self, u64)> {
        let record = Self::parse(&tail[at..]).ok()?;
        let cd_offset = record.cd_offset as u64;
        let cd_size = record.cd_size as u64;
        if cd_offset.checked_add(cd_size)? > file_size {
            return None;
        }
        if record.entries_total > 0 {
            let cd_start_in_tail = cd_offset.checked_sub(tail_start_in_file);
            let sig_at_cd = match cd_start_in_tail {
                Some(rel) if (rel as usize) + 4 <= tail.len() => {
                    let rel = rel as usize;
                    u32::from_le_bytes(tail[rel..rel + 4].try_into().ok()?) == CD_SIGNATURE
                }
                _ => false,
            };
            if !sig_at_cd {
                return None;
            }
        }
        let eocd_offset = tail_start_in_file + at as u64;
        Some((record, eocd_offset))
    }
}
