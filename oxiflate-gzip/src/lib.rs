//! # OxiFlate Gzip
//!
//! The gzip container format (RFC 1952) over the OxiFlate DEFLATE codec.
//!
//! A gzip member is a 10-byte header with optional fields, the DEFLATE
//! stream, and an 8-byte trailer: the CRC-32 of the uncompressed data and
//! its size modulo 2^32, both little-endian.
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_gzip::{GzipReader, gzip_compress};
//! use std::io::{Cursor, Read};
//!
//! let compressed = gzip_compress(b"Hello, Gzip!", 6).unwrap();
//! let mut reader = GzipReader::new(Cursor::new(compressed)).unwrap();
//! let mut out = Vec::new();
//! reader.read_to_end(&mut out).unwrap();
//! assert_eq!(out, b"Hello, Gzip!");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod header;

pub use header::{CM_DEFLATE, GZIP_MAGIC, GzipHeader, OS_UNKNOWN, flags};

use crate::header::eof_as_corrupt;
use oxiflate_core::checksum::{Checksum, Crc32};
use oxiflate_core::error::{CorruptKind, OxiflateError, Result};
use oxiflate_deflate::deflate::{DeflateWriter, strategy_for_level};
use oxiflate_deflate::inflate::InflateReader;
use std::io::{self, Read, Seek, Write};

/// Streaming gzip decompressor over a seekable source.
///
/// The header is parsed eagerly; decompressed bytes are served through
/// [`Read`]. When the DEFLATE stream ends, the trailer is read from the
/// repositioned source and both the CRC-32 and the size are verified.
pub struct GzipReader<R: Read + Seek> {
    header: GzipHeader,
    inflate: Option<InflateReader<R>>,
    source_after: Option<R>,
    crc: Crc32,
    count: u64,
}

impl<R: Read + Seek> GzipReader<R> {
    /// Parse and validate the gzip header from `source`.
    pub fn new(mut source: R) -> Result<Self> {
        let header = GzipHeader::read(&mut source)?;
        Ok(Self {
            header,
            inflate: Some(InflateReader::new_end_exact(source)),
            source_after: None,
            crc: Crc32::new(),
            count: 0,
        })
    }

    /// The parsed header.
    pub fn header(&self) -> &GzipHeader {
        &self.header
    }

    /// Decompress bytes; returns 0 only after the trailer verified.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(inflate) = self.inflate.as_mut() else {
            return Ok(0); // finished and verified
        };
        let n = inflate.read_bytes(buf)?;
        if n > 0 || buf.is_empty() {
            self.crc.update(&buf[..n]);
            self.count += n as u64;
            return Ok(n);
        }

        // End of the compressed stream: the source sits on the trailer.
        let mut source = self
            .inflate
            .take()
            .and_then(InflateReader::into_inner)
            .expect("facade still open at end of stream");
        let mut trailer = [0u8; 8];
        source.read_exact(&mut trailer).map_err(eof_as_corrupt)?;
        self.source_after = Some(source);

        let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let stored_size = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
        let computed_crc = self.crc.value();
        if stored_crc != computed_crc {
            return Err(OxiflateError::corrupt_detail(
                CorruptKind::DecompressedChecksumMismatch,
                format!("crc stored {stored_crc:#010x} computed {computed_crc:#010x}"),
            ));
        }
        let actual_size = self.count as u32;
        if stored_size != actual_size {
            return Err(OxiflateError::corrupt_detail(
                CorruptKind::DecompressedSizeMismatch,
                format!("size stored {stored_size} actual {actual_size}"),
            ));
        }
        Ok(0)
    }

    /// Return the source, positioned after the trailer, once done.
    pub fn into_inner(self) -> Option<R> {
        self.source_after
            .or_else(|| self.inflate.and_then(InflateReader::into_inner))
    }
}

impl<R: Read + Seek> Read for GzipReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_data(buf).map_err(Into::into)
    }
}

/// Streaming gzip compressor.
pub struct GzipWriter<W: Write> {
    deflate: DeflateWriter<W>,
    crc: Crc32,
    count: u64,
}

impl<W: Write> GzipWriter<W> {
    /// Write a default header and start compressing at `level`.
    pub fn new(sink: W, level: u8) -> Result<Self> {
        Self::with_header(sink, GzipHeader::new().with_level(level), level)
    }

    /// Write `header` and start compressing at `level`.
    pub fn with_header(mut sink: W, header: GzipHeader, level: u8) -> Result<Self> {
        header.write(&mut sink)?;
        Ok(Self {
            deflate: DeflateWriter::with_strategy(sink, strategy_for_level(level.min(9))),
            crc: Crc32::new(),
            count: 0,
        })
    }

    /// Append uncompressed bytes.
    pub fn write_data(&mut self, buf: &[u8]) -> Result<()> {
        self.crc.update(buf);
        self.count += buf.len() as u64;
        self.deflate.write_data(buf)
    }

    /// Finish the DEFLATE stream, append the trailer, and return the sink.
    pub fn finish(self) -> Result<W> {
        let mut sink = self.deflate.finish()?;
        sink.write_all(&self.crc.value().to_le_bytes())?;
        sink.write_all(&(self.count as u32).to_le_bytes())?;
        Ok(sink)
    }
}

impl<W: Write> Write for GzipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_data(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compress data to a gzip member with a default header.
pub fn gzip_compress(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut writer = GzipWriter::new(Vec::new(), level)?;
    writer.write_data(data)?;
    writer.finish()
}

/// Decompress a complete gzip member held in memory.
pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = GzipReader::new(io::Cursor::new(data))?;
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read_data(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_gzip_roundtrip() {
        let original = b"Hello, GZIP World! This is a test of compression.";
        let compressed = gzip_compress(original, 6).unwrap();
        assert_eq!(gzip_decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_gzip_roundtrip_with_filename() {
        let original = b"Test data with filename";
        let header = GzipHeader::new().with_filename("data.txt").with_mtime(99);
        let mut writer = GzipWriter::with_header(Vec::new(), header, 6).unwrap();
        writer.write_data(original).unwrap();
        let compressed = writer.finish().unwrap();

        let mut reader = GzipReader::new(Cursor::new(&compressed)).unwrap();
        assert_eq!(reader.header().filename.as_deref(), Some("data.txt"));
        assert_eq!(reader.header().mtime, 99);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, original);

        // Source ends exactly past the trailer.
        let source = reader.into_inner().unwrap();
        assert_eq!(source.position() as usize, compressed.len());
    }

    #[test]
    fn test_gzip_empty() {
        let compressed = gzip_compress(b"", 6).unwrap();
        assert!(gzip_decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_gzip_repeated_compresses() {
        let original = vec![b'A'; 10000];
        let compressed = gzip_compress(&original, 9).unwrap();
        assert!(compressed.len() < original.len() / 10);
        assert_eq!(gzip_decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_gzip_crc_mismatch() {
        let mut compressed = gzip_compress(b"checksummed payload", 6).unwrap();
        let len = compressed.len();
        compressed[len - 6] ^= 0xFF; // inside the stored CRC

        let err = gzip_decompress(&compressed).unwrap_err();
        assert_eq!(
            err.corrupt_kind(),
            Some(CorruptKind::DecompressedChecksumMismatch)
        );
    }

    #[test]
    fn test_gzip_size_mismatch() {
        let mut compressed = gzip_compress(b"sized payload", 6).unwrap();
        let len = compressed.len();
        compressed[len - 1] ^= 0x01; // inside ISIZE

        let err = gzip_decompress(&compressed).unwrap_err();
        assert_eq!(
            err.corrupt_kind(),
            Some(CorruptKind::DecompressedSizeMismatch)
        );
    }

    #[test]
    fn test_gzip_truncated_trailer() {
        let compressed = gzip_compress(b"cut short", 6).unwrap();
        let cut = &compressed[..compressed.len() - 3];

        let err = gzip_decompress(cut).unwrap_err();
        assert_eq!(
            err.corrupt_kind(),
            Some(CorruptKind::UnexpectedEndOfStream)
        );
    }
}
