//! Error types for OxiFlate operations.
//!
//! This module provides a single error type covering all failure modes of
//! the codec: I/O errors from the underlying reader/writer, data-format
//! corruption detected while decoding, and API misuse.

use std::fmt;
use std::io;
use thiserror::Error;

/// Why a compressed stream was rejected as corrupt.
///
/// Each variant corresponds to one structural rule of the DEFLATE, zlib, or
/// gzip formats. The kind is `Copy` so a stream facade can latch the first
/// failure and report it again on every subsequent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CorruptKind {
    /// The source ended in the middle of a structure that required more bytes.
    UnexpectedEndOfStream,
    /// A block header used the reserved block type 3.
    ReservedBlockType,
    /// A stored block's LEN field does not match the ones-complement NLEN.
    UncompressedBlockLengthMismatch,
    /// A canonical Huffman code left part of its code space unassigned.
    HuffmanCodeUnderFull,
    /// A canonical Huffman code assigned more codes than its code space holds.
    HuffmanCodeOverFull,
    /// Code-length symbol 16 appeared before any length was decoded.
    NoPreviousCodeLengthToCopy,
    /// A code-length run expansion overran the declared symbol count.
    CodeLengthCodeOverFull,
    /// The dynamic literal/length code gives no code to the end-of-block symbol.
    EndOfBlockCodeZeroLength,
    /// Literal/length symbol 286 or 287 was decoded.
    ReservedLengthSymbol,
    /// Distance symbol 30 or 31 was decoded.
    ReservedDistanceSymbol,
    /// A length symbol appeared in a block that declared no distance code.
    LengthEncounteredWithEmptyDistanceCode,
    /// A back-reference reached before the first byte ever produced.
    CopyFromBeforeDictionaryStart,
    /// A container header failed its own checksum (zlib FCHECK, gzip FHCRC).
    HeaderChecksumMismatch,
    /// A container declared a compression method other than DEFLATE.
    UnsupportedCompressionMethod,
    /// The checksum over the decompressed data does not match the trailer.
    DecompressedChecksumMismatch,
    /// The decompressed size does not match the gzip ISIZE trailer field.
    DecompressedSizeMismatch,
    /// The gzip magic bytes `1F 8B` were not present.
    GzipInvalidMagicNumber,
    /// A gzip header set one of the reserved flag bits 5-7.
    GzipReservedFlagsSet,
    /// The gzip OS byte is not a known value.
    GzipUnsupportedOperatingSystem,
}

impl fmt::Display for CorruptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::UnexpectedEndOfStream => "unexpected end of stream",
            Self::ReservedBlockType => "reserved block type",
            Self::UncompressedBlockLengthMismatch => "uncompressed block length mismatch",
            Self::HuffmanCodeUnderFull => "Huffman code under-full",
            Self::HuffmanCodeOverFull => "Huffman code over-full",
            Self::NoPreviousCodeLengthToCopy => "no previous code length to copy",
            Self::CodeLengthCodeOverFull => "code length code over-full",
            Self::EndOfBlockCodeZeroLength => "end-of-block code has zero length",
            Self::ReservedLengthSymbol => "reserved length symbol",
            Self::ReservedDistanceSymbol => "reserved distance symbol",
            Self::LengthEncounteredWithEmptyDistanceCode => {
                "length symbol encountered with empty distance code"
            }
            Self::CopyFromBeforeDictionaryStart => "copy from before dictionary start",
            Self::HeaderChecksumMismatch => "header checksum mismatch",
            Self::UnsupportedCompressionMethod => "unsupported compression method",
            Self::DecompressedChecksumMismatch => "decompressed data checksum mismatch",
            Self::DecompressedSizeMismatch => "decompressed size mismatch",
            Self::GzipInvalidMagicNumber => "invalid gzip magic number",
            Self::GzipReservedFlagsSet => "gzip reserved flags set",
            Self::GzipUnsupportedOperatingSystem => "unsupported gzip operating system",
        };
        f.write_str(msg)
    }
}

/// The main error type for OxiFlate operations.
#[derive(Debug, Error)]
pub enum OxiflateError {
    /// I/O error from the underlying reader/writer, passed through verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The compressed data violates the format.
    #[error("corrupt stream: {kind}{}{detail}", if .detail.is_empty() { "" } else { ": " })]
    Corrupt {
        /// Which structural rule was violated.
        kind: CorruptKind,
        /// Optional context (offending values, positions).
        detail: String,
    },

    /// The API was used in a way its contract forbids.
    #[error("invalid use: {message}")]
    Misuse {
        /// Description of the misuse.
        message: String,
    },
}

/// Result type alias for OxiFlate operations.
pub type Result<T> = std::result::Result<T, OxiflateError>;

impl From<OxiflateError> for io::Error {
    fn from(err: OxiflateError) -> Self {
        match err {
            OxiflateError::Io(e) => e,
            e @ OxiflateError::Corrupt { .. } => io::Error::new(io::ErrorKind::InvalidData, e),
            e @ OxiflateError::Misuse { .. } => io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    }
}

impl OxiflateError {
    /// Create a corruption error with no extra context.
    pub fn corrupt(kind: CorruptKind) -> Self {
        Self::Corrupt {
            kind,
            detail: String::new(),
        }
    }

    /// Create a corruption error with context.
    pub fn corrupt_detail(kind: CorruptKind, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            kind,
            detail: detail.into(),
        }
    }

    /// Create a misuse error.
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse {
            message: message.into(),
        }
    }

    /// The corruption kind, if this is a data-format error.
    pub fn corrupt_kind(&self) -> Option<CorruptKind> {
        match self {
            Self::Corrupt { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OxiflateError::corrupt(CorruptKind::ReservedBlockType);
        assert_eq!(err.to_string(), "corrupt stream: reserved block type");

        let err = OxiflateError::corrupt_detail(
            CorruptKind::UncompressedBlockLengthMismatch,
            "len=16 nlen=44031",
        );
        assert!(err.to_string().contains("len=16"));

        let err = OxiflateError::misuse("read after close");
        assert!(err.to_string().contains("read after close"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: OxiflateError = io_err.into();
        assert!(matches!(err, OxiflateError::Io(_)));
    }

    #[test]
    fn test_corrupt_kind_accessor() {
        let err = OxiflateError::corrupt(CorruptKind::HuffmanCodeOverFull);
        assert_eq!(err.corrupt_kind(), Some(CorruptKind::HuffmanCodeOverFull));
        assert_eq!(OxiflateError::misuse("x").corrupt_kind(), None);
    }
}
