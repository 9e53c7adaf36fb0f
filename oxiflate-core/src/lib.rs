//! # OxiFlate Core
//!
//! Core components for the OxiFlate DEFLATE codec.
//!
//! This crate provides the fundamental building blocks the codec and its
//! containers share:
//!
//! - [`bitstream`]: LSB-first bit-level I/O for variable-length codes
//! - [`dictionary`]: the 32 KiB sliding history for back-references
//! - [`checksum`]: CRC-32 and Adler-32 with pass-through stream adapters
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! OxiFlate is a layered stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L4: CLI                                                 │
//! │     gzip / gunzip front ends                            │
//! ├─────────────────────────────────────────────────────────┤
//! │ L3: Container                                           │
//! │     gzip and zlib header/trailer parsing                │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     DEFLATE (LZ77 + Huffman), encoder strategies        │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitReader/BitWriter, Dictionary, checksums          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_core::bitstream::BitReader;
//! use oxiflate_core::checksum::Crc32;
//! use std::io::Cursor;
//!
//! // Read bits from data
//! let data = vec![0xAB, 0xCD];
//! let mut reader = BitReader::new(Cursor::new(data));
//! let bits = reader.read_bits(12).unwrap();
//! assert_eq!(bits, 0xDAB);
//!
//! // Compute CRC-32
//! let crc = Crc32::compute(b"Hello, World!");
//! assert_eq!(crc, 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod checksum;
pub mod dictionary;
pub mod error;

// Re-exports
pub use bitstream::{BitReader, BitWriter};
pub use checksum::{Adler32, Checksum, ChecksumReader, ChecksumWriter, Crc32};
pub use dictionary::{DICTIONARY_SIZE, Dictionary};
pub use error::{CorruptKind, OxiflateError, Result};
