//! Error types for zipkit

use std::io;

/// Result type for zipkit operations
pub type Result<T> = std::result::Result<T, ZipKitError>;

/// Error taxonomy a caller can discriminate on.
#[derive(Debug)]
pub enum ZipKitError {
    /// EOCD not found, or not valid.
    NotAZip(String),
    /// CD/LFH cross-checks failed: bad signature, truncated record, out of
    /// bounds offset, oversized field, CD total exceeds the u32 ceiling.
    Inconsistent(String),
    /// Underlying file-system failure.
    Io(io::Error),
    /// The entry's method has no backend compiled in.
    UnsupportedMethod(u16),
    /// The codec reported malformed input, or strict CRC verification failed.
    MalformedPayload(String),
    /// The zipbomb expansion guard rejected an entry.
    ExpansionRefused {
        uncompressed_size: u64,
        compressed_size: u64,
    },
    /// `locate` found no entry with that name.
    NotFound(String),
    /// Operation issued on a handle in the wrong mode (e.g. `add` on a
    /// read-only archive).
    InvalidState(String),
}

impl std::fmt::Display for ZipKitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZipKitError::NotAZip(msg) => write!(f, "not a zip archive: {}", msg),
            ZipKitError::Inconsistent(msg) => write!(f, "inconsistent archive: {}", msg),
            ZipKitError::Io(e) => write!(f, "I/O error: {}", e),
            ZipKitError::UnsupportedMethod(m) => {
                write!(f, "unsupported compression method: {}", m)
            }
            ZipKitError::MalformedPayload(msg) => write!(f, "malformed payload: {}", msg),
            ZipKitError::ExpansionRefused {
                uncompressed_size,
                compressed_size,
            } => write!(
                f,
                "expansion refused: {} compressed bytes declare {} uncompressed bytes",
                compressed_size, uncompressed_size
            ),
            ZipKitError::NotFound(name) => write!(f, "entry not found: {}", name),
            ZipKitError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
        }
    }
}

impl std::error::Error for ZipKitError {}

impl From<io::Error> for ZipKitError {
    fn from(err: io::Error) -> Self {
        ZipKitError::Io(err)
    }
}
