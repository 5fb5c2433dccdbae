//! # zipkit: a self-contained ZIP reader/writer
//!
//! `zipkit` parses and produces PKZIP archives (EOCD, Central Directory,
//! Local File Headers) over a hand-rolled RFC 1951 DEFLATE codec, with a
//! small `Compressor`/`Decompressor` trait boundary so other backends (the
//! `zstd-support` feature) plug in alongside it.
//!
//! ## Quick start
//!
//! ```no_run
//! use zipkit::{Archive, ArchiveConfig, BufferSource};
//!
//! let mut archive = Archive::open_write_new("out.zip", ArchiveConfig::default())?;
//! archive.add(b"hello.txt", BufferSource::borrowed(b"hello, world"), Some(8))?;
//! archive.close()?;
//!
//! let mut archive = Archive::open_read("out.zip", ArchiveConfig::default())?;
//! let index = archive.locate(b"hello.txt").unwrap();
//! let opened = archive.open_index(index)?;
//! assert_eq!(opened.bytes(), b"hello, world");
//! # Ok::<(), zipkit::ZipKitError>(())
//! ```

pub mod bitio;
pub mod byteio;
pub mod codec;
pub mod config;
pub mod crc32;
pub mod error;
pub mod zip;

pub use config::ArchiveConfig;
pub use error::{Result, ZipKitError};
pub use zip::{Archive, ArchiveMode, BufferSource, EntryStat, OpenedFile};
