//! Little-endian fixed-width readers and writers over byte slices.
//!
//! Every ZIP record field is a little-endian integer at a fixed offset;
//! these helpers keep field access bounds-checked instead of hand-counted.

use crate::error::{Result, ZipKitError};

pub fn need(buf: &[u8], offset: usize, len: usize) -> Result<()> {
    if offset.checked_add(len).map(|end| end > buf.len()).unwrap_or(true) {
        return Err(ZipKitError::Inconsistent(format!(
            "truncated record: need {} bytes at offset {}, have {}",
            len,
            offset,
            buf.len()
        )));
    }
    Ok(())
}

pub fn read_u16_le(buf: &[u8], offset: usize) -> Result<u16> {
    need(buf, offset, 2)?;
    Ok(u16::from_le_bytes([buf[offset], buf[offset + 1]]))
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32> {
    need(buf, offset, 4)?;
    Ok(u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

pub fn read_u64_le(buf: &[u8], offset: usize) -> Result<u64> {
    need(buf, offset, 8)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    Ok(u64::from_le_bytes(bytes))
}

pub fn write_u16_le(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u32_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u64_le(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}
