//! # OxiFlate Deflate
//!
//! Pure Rust implementation of the DEFLATE compressed data format
//! (RFC 1951), plus the zlib wrapper (RFC 1950).
//!
//! ## Decompression
//!
//! Full support for all DEFLATE block types (stored, fixed Huffman,
//! dynamic Huffman) behind a resumable pull interface. [`InflateReader`]
//! adds the stream contract: the first corruption latches and is reported
//! on every later read, and on a seekable source the end-exact mode leaves
//! the source positioned on the first byte after the compressed stream.
//!
//! ## Compression
//!
//! The encoder is a strategy framework: a [`Strategy`](strategy::Strategy)
//! inspects the buffered window and returns a deferred
//! [`Decision`](strategy::Decision) whose exact bit cost is known for every
//! output alignment. Strategies range from stored blocks through
//! run-length and LZ77 coding (fixed or package-merge dynamic codes) up to
//! composites that pick the cheapest candidate per block or recursively
//! split blocks. [`deflate`] maps levels 0-9 onto ready-made stacks.
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_deflate::{deflate, inflate};
//!
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod deflate;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod strategy;
pub mod tables;
pub mod zlib;

// Re-exports
pub use deflate::{DeflateWriter, deflate, strategy_for_level};
pub use huffman::{CanonicalCode, CodeTable, CodeTree};
pub use inflate::{InflateReader, Inflater, inflate};
pub use lz77::{MatchFinder, Token};
pub use zlib::{ZlibReader, ZlibWriter, zlib_compress, zlib_decompress};
