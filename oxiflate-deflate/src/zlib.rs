//! Zlib format wrapper (RFC 1950) over the DEFLATE codec.
//!
//! ```text
//! +---+---+============+---+---+---+---+
//! |CMF|FLG| compressed |    ADLER32    |
//! +---+---+============+---+---+---+---+
//! ```
//!
//! - CMF: CM (bits 0-3, must be 8 for DEFLATE) and CINFO (bits 4-7,
//!   log2(window size) - 8, at most 7)
//! - FLG: FCHECK (bits 0-4, makes `CMF*256 + FLG` divisible by 31),
//!   FDICT (bit 5, preset dictionary id follows), FLEVEL (bits 6-7)
//! - ADLER32: big-endian Adler-32 of the uncompressed data

use crate::deflate::{DeflateWriter, deflate, strategy_for_level};
use crate::inflate::{InflateReader, inflate};
use oxiflate_core::checksum::{Adler32, Checksum};
use oxiflate_core::error::{CorruptKind, OxiflateError, Result};
use std::io::{self, Read, Seek, Write};

/// The DEFLATE compression method id.
const CM_DEFLATE: u8 = 8;

/// CMF for a 32 KiB window: CINFO=7, CM=8.
const CMF_DEFAULT: u8 = 0x78;

/// FLEVEL indicator derived from a compression level 0-9.
fn flevel_for(level: u8) -> u8 {
    match level {
        0..=2 => 0, // fastest
        3..=5 => 1, // fast
        6 => 2,     // default
        _ => 3,     // maximum
    }
}

/// Build the CMF/FLG header pair for a compression level.
fn header_for(level: u8) -> [u8; 2] {
    let flg_high = flevel_for(level) << 6;
    let remainder = ((CMF_DEFAULT as u16) * 256 + flg_high as u16) % 31;
    let fcheck = if remainder == 0 {
        0
    } else {
        (31 - remainder) as u8
    };
    [CMF_DEFAULT, flg_high | fcheck]
}

/// Validate a CMF/FLG pair. Returns the FDICT flag.
fn check_header(cmf: u8, flg: u8) -> Result<bool> {
    if (cmf as u16 * 256 + flg as u16) % 31 != 0 {
        return Err(OxiflateError::corrupt_detail(
            CorruptKind::HeaderChecksumMismatch,
            "zlib FCHECK failed",
        ));
    }
    if cmf & 0x0F != CM_DEFLATE {
        return Err(OxiflateError::corrupt_detail(
            CorruptKind::UnsupportedCompressionMethod,
            format!("zlib CM {}", cmf & 0x0F),
        ));
    }
    if cmf >> 4 > 7 {
        return Err(OxiflateError::corrupt_detail(
            CorruptKind::UnsupportedCompressionMethod,
            format!("zlib CINFO {} exceeds a 32 KiB window", cmf >> 4),
        ));
    }
    Ok(flg & 0x20 != 0)
}

/// Compress data into the zlib format.
///
/// # Example
///
/// ```
/// use oxiflate_deflate::zlib::{zlib_compress, zlib_decompress};
///
/// let data = b"Hello, World! Hello, World!";
/// let compressed = zlib_compress(data, 6).unwrap();
/// let decompressed = zlib_decompress(&compressed).unwrap();
/// assert_eq!(decompressed, data);
/// ```
pub fn zlib_compress(input: &[u8], level: u8) -> Result<Vec<u8>> {
    let level = level.min(9);
    let compressed = deflate(input, level)?;

    let mut output = Vec::with_capacity(6 + compressed.len());
    output.extend_from_slice(&header_for(level));
    output.extend_from_slice(&compressed);
    output.extend_from_slice(&Adler32::compute(input).to_be_bytes());
    Ok(output)
}

/// Decompress zlib format data.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    if input.len() < 6 {
        return Err(OxiflateError::corrupt_detail(
            CorruptKind::UnexpectedEndOfStream,
            "zlib data shorter than header and trailer",
        ));
    }
    let fdict = check_header(input[0], input[1])?;
    let body = &input[2..input.len() - 4];
    if fdict {
        // The 4-byte dictionary id follows the header; no dictionary to
        // match it against here.
        if body.len() < 4 {
            return Err(OxiflateError::corrupt(CorruptKind::UnexpectedEndOfStream));
        }
        return Err(OxiflateError::corrupt_detail(
            CorruptKind::UnsupportedCompressionMethod,
            format!(
                "preset dictionary {:08x}",
                u32::from_be_bytes([body[0], body[1], body[2], body[3]])
            ),
        ));
    }

    let decompressed = inflate(body)?;

    let stored = u32::from_be_bytes([
        input[input.len() - 4],
        input[input.len() - 3],
        input[input.len() - 2],
        input[input.len() - 1],
    ]);
    let computed = Adler32::compute(&decompressed);
    if stored != computed {
        return Err(OxiflateError::corrupt_detail(
            CorruptKind::DecompressedChecksumMismatch,
            format!("adler stored {stored:#010x} computed {computed:#010x}"),
        ));
    }
    Ok(decompressed)
}

/// Streaming zlib compressor.
pub struct ZlibWriter<W: Write> {
    deflate: DeflateWriter<W>,
    adler: Adler32,
}

impl<W: Write> ZlibWriter<W> {
    /// Write the zlib header to `sink` and start compressing at `level`.
    pub fn new(mut sink: W, level: u8) -> Result<Self> {
        let level = level.min(9);
        sink.write_all(&header_for(level))?;
        Ok(Self {
            deflate: DeflateWriter::with_strategy(sink, strategy_for_level(level)),
            adler: Adler32::new(),
        })
    }

    /// Append uncompressed bytes.
    pub fn write_data(&mut self, buf: &[u8]) -> Result<()> {
        self.adler.update(buf);
        self.deflate.write_data(buf)
    }

    /// Finish the DEFLATE stream, append the Adler-32 trailer, and return
    /// the sink.
    pub fn finish(self) -> Result<W> {
        let mut sink = self.deflate.finish()?;
        sink.write_all(&self.adler.value().to_be_bytes())?;
        Ok(sink)
    }
}

impl<W: Write> Write for ZlibWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_data(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Streaming zlib decompressor over a seekable source.
///
/// The trailer is verified when the compressed stream ends; the source is
/// left positioned after it.
pub struct ZlibReader<R: Read + Seek> {
    inflate: Option<InflateReader<R>>,
    source_after: Option<R>,
    adler: Adler32,
}

impl<R: Read + Seek> ZlibReader<R> {
    /// Parse and validate the zlib header from `source`.
    pub fn new(mut source: R) -> Result<Self> {
        let mut header = [0u8; 2];
        source.read_exact(&mut header).map_err(eof_as_corrupt)?;
        if check_header(header[0], header[1])? {
            return Err(OxiflateError::corrupt_detail(
                CorruptKind::UnsupportedCompressionMethod,
                "preset dictionary",
            ));
        }
        Ok(Self {
            inflate: Some(InflateReader::new_end_exact(source)),
            source_after: None,
            adler: Adler32::new(),
        })
    }

    /// Decompress bytes; returns 0 only after the trailer verified.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(inflate) = self.inflate.as_mut() else {
            return Ok(0); // already finished and verified
        };
        let n = inflate.read_bytes(buf)?;
        if n > 0 || buf.is_empty() {
            self.adler.update(&buf[..n]);
            return Ok(n);
        }

        // End of the compressed stream: the source sits on the trailer.
        let mut source = self
            .inflate
            .take()
            .and_then(InflateReader::into_inner)
            .expect("facade still open at end of stream");
        let mut trailer = [0u8; 4];
        source.read_exact(&mut trailer).map_err(eof_as_corrupt)?;
        self.source_after = Some(source);

        let stored = u32::from_be_bytes(trailer);
        let computed = self.adler.value();
        if stored != computed {
            return Err(OxiflateError::corrupt_detail(
                CorruptKind::DecompressedChecksumMismatch,
                format!("adler stored {stored:#010x} computed {computed:#010x}"),
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

impl<R: Read + Seek> Read for ZlibReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_data(buf).map_err(Into::into)
    }
}

/// Map an unexpected-EOF I/O error onto the format error the caller
/// expects for a truncated container.
fn eof_as_corrupt(err: io::Error) -> OxiflateError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        OxiflateError::corrupt(CorruptKind::UnexpectedEndOfStream)
    } else {
        OxiflateError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_zlib_header() {
        let compressed = zlib_compress(b"test", 6).unwrap();
        assert_eq!(compressed[0], 0x78);
        let cmf = compressed[0] as u16;
        let flg = compressed[1] as u16;
        assert_eq!((cmf * 256 + flg) % 31, 0);
    }

    #[test]
    fn test_zlib_roundtrip() {
        let data = b"Hello, World!";
        let compressed = zlib_compress(data, 6).unwrap();
        assert_eq!(zlib_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_zlib_roundtrip_empty() {
        let compressed = zlib_compress(b"", 6).unwrap();
        assert!(zlib_decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_zlib_roundtrip_large() {
        let data: Vec<u8> = (0..10000).map(|i| (i % 256) as u8).collect();
        for level in [0u8, 1, 6, 9] {
            let compressed = zlib_compress(&data, level).unwrap();
            assert_eq!(zlib_decompress(&compressed).unwrap(), data, "level {level}");
        }
    }

    #[test]
    fn test_zlib_checksum_verification() {
        let mut compressed = zlib_compress(b"Test data for checksum", 6).unwrap();
        let len = compressed.len();
        compressed[len - 1] ^= 0xFF;

        let err = zlib_decompress(&compressed).unwrap_err();
        assert_eq!(
            err.corrupt_kind(),
            Some(CorruptKind::DecompressedChecksumMismatch)
        );
    }

    #[test]
    fn test_zlib_bad_method() {
        // CM=7; FCHECK fixed up so only the method is wrong.
        let mut header = [0x77u8, 0x00];
        let rem = (header[0] as u16 * 256) % 31;
        header[1] = if rem == 0 { 0 } else { (31 - rem) as u8 };
        let mut data = header.to_vec();
        data.extend_from_slice(&[0, 0, 0, 0]);
        let err = zlib_decompress(&data).unwrap_err();
        assert_eq!(
            err.corrupt_kind(),
            Some(CorruptKind::UnsupportedCompressionMethod)
        );
    }

    #[test]
    fn test_zlib_fcheck_failure() {
        let data = [0x78u8, 0x9D, 0, 0, 0, 0]; // off-by-one FLG
        let err = zlib_decompress(&data).unwrap_err();
        assert_eq!(
            err.corrupt_kind(),
            Some(CorruptKind::HeaderChecksumMismatch)
        );
    }

    #[test]
    fn test_zlib_too_short() {
        let err = zlib_decompress(&[0x78, 0x9C]).unwrap_err();
        assert_eq!(
            err.corrupt_kind(),
            Some(CorruptKind::UnexpectedEndOfStream)
        );
    }

    #[test]
    fn test_zlib_streaming_roundtrip() {
        let data = b"streaming zlib data, streaming zlib data, streaming zlib data";

        let mut writer = ZlibWriter::new(Vec::new(), 6).unwrap();
        writer.write_data(&data[..10]).unwrap();
        writer.write_data(&data[10..]).unwrap();
        let compressed = writer.finish().unwrap();

        // One-shot agrees.
        assert_eq!(zlib_decompress(&compressed).unwrap(), data.as_slice());

        // Streaming read with trailer verification.
        let mut reader = ZlibReader::new(Cursor::new(&compressed)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);

        // The source ends up positioned past the trailer.
        let source = reader.into_inner().unwrap();
        assert_eq!(source.position() as usize, compressed.len());
    }

    #[test]
    fn test_zlib_streaming_detects_bad_trailer() {
        let mut compressed = zlib_compress(b"payload payload payload", 6).unwrap();
        let len = compressed.len();
        compressed[len - 2] ^= 0x40;

        let mut reader = ZlibReader::new(Cursor::new(&compressed)).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
