//! The ZIP container engine: on-disk record formats, DOS timestamps, the
//! in-memory entry model, and the archive handle built on top of them.

pub mod archive;
pub mod dostime;
pub mod entry;
pub mod records;

pub use archive::{Archive, ArchiveMode, DEFAULT_METHOD_STORE};
pub use dostime::DosTimestamp;
pub use entry::{BufferSource, EntryStat, OpenedFile};
