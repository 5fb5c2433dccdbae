//! Hand-rolled RFC 1951 DEFLATE codec: bit-level I/O lives in
//! `crate::bitio`, canonical Huffman coding in `huffman`, the fixed tables
//! from the RFC in `tables`, and the resumable encode/decode state
//! machines in `encoder`/`decoder`.

pub mod decoder;
pub mod encoder;
mod huffman;
mod tables;

pub use decoder::{Inflater, WindowMode};
pub use encoder::{compress_bound, gzip_wrap, Deflater};
