//! GZIP header parsing and writing (RFC 1952).

use oxiflate_core::checksum::{ChecksumReader, ChecksumWriter, Crc32};
use oxiflate_core::error::{CorruptKind, OxiflateError, Result};
use std::io::{self, Read, Write};

/// GZIP magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// GZIP compression method: DEFLATE.
pub const CM_DEFLATE: u8 = 8;

/// GZIP header flag bits.
pub mod flags {
    /// Text file hint.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original filename present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
    /// Bits 5-7 must be zero.
    pub const RESERVED: u8 = 0xE0;
}

/// Known OS identifiers (RFC 1952 section 2.3.1).
const OS_NAMES: [&str; 14] = [
    "FAT filesystem",
    "Amiga",
    "VMS",
    "Unix",
    "VM/CMS",
    "Atari TOS",
    "HPFS filesystem",
    "Macintosh",
    "Z-System",
    "CP/M",
    "TOPS-20",
    "NTFS filesystem",
    "QDOS",
    "Acorn RISCOS",
];

/// The OS value meaning "unknown".
pub const OS_UNKNOWN: u8 = 255;

/// GZIP file header.
#[derive(Debug, Clone)]
pub struct GzipHeader {
    /// Compression method (8 for DEFLATE).
    pub method: u8,
    /// Flag byte; kept consistent with the optional fields below.
    pub flags: u8,
    /// Modification time (Unix timestamp, 0 = unavailable).
    pub mtime: u32,
    /// Extra flags (2 = maximum compression, 4 = fastest).
    pub xfl: u8,
    /// Operating system identifier.
    pub os: u8,
    /// Extra field payload (if FEXTRA set).
    pub extra: Option<Vec<u8>>,
    /// Original filename (if FNAME set), ISO-8859-1.
    pub filename: Option<String>,
    /// Comment (if FCOMMENT set), ISO-8859-1.
    pub comment: Option<String>,
    /// Stored header CRC16 (if FHCRC was set when reading).
    pub header_crc: Option<u16>,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            method: CM_DEFLATE,
            flags: 0,
            mtime: 0,
            xfl: 0,
            os: OS_UNKNOWN,
            extra: None,
            filename: None,
            comment: None,
            header_crc: None,
        }
    }
}

impl GzipHeader {
    /// Create a header with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an original filename.
    pub fn with_filename(mut self, filename: &str) -> Self {
        self.flags |= flags::FNAME;
        self.filename = Some(filename.to_string());
        self
    }

    /// Set the modification time.
    pub fn with_mtime(mut self, mtime: u32) -> Self {
        self.mtime = mtime;
        self
    }

    /// Set XFL from a compression level 0-9.
    pub fn with_level(mut self, level: u8) -> Self {
        self.xfl = match level {
            0..=1 => 4, // fastest
            9 => 2,     // maximum compression
            _ => 0,
        };
        self
    }

    /// The human-readable name of the OS field.
    pub fn os_name(&self) -> &'static str {
        OS_NAMES
            .get(self.os as usize)
            .copied()
            .unwrap_or("unknown")
    }

    /// Read and validate a header.
    ///
    /// When the FHCRC flag is set, the stored CRC16 is checked against the
    /// CRC-32 of every header byte read before it.
    pub fn read<R: Read>(source: &mut R) -> Result<Self> {
        let mut reader = ChecksumReader::new(source, Crc32::new());

        let mut fixed = [0u8; 10];
        reader.read_exact(&mut fixed).map_err(eof_as_corrupt)?;
        if fixed[0..2] != GZIP_MAGIC {
            return Err(OxiflateError::corrupt_detail(
                CorruptKind::GzipInvalidMagicNumber,
                format!("{:02x} {:02x}", fixed[0], fixed[1]),
            ));
        }
        let method = fixed[2];
        if method != CM_DEFLATE {
            return Err(OxiflateError::corrupt_detail(
                CorruptKind::UnsupportedCompressionMethod,
                format!("gzip CM {method}"),
            ));
        }
        let flag_bits = fixed[3];
        if flag_bits & flags::RESERVED != 0 {
            return Err(OxiflateError::corrupt_detail(
                CorruptKind::GzipReservedFlagsSet,
                format!("flags {flag_bits:#04x}"),
            ));
        }
        let mtime = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let xfl = fixed[8];
        let os = fixed[9];
        if os as usize >= OS_NAMES.len() && os != OS_UNKNOWN {
            return Err(OxiflateError::corrupt_detail(
                CorruptKind::GzipUnsupportedOperatingSystem,
                format!("OS {os}"),
            ));
        }

        let extra = if flag_bits & flags::FEXTRA != 0 {
            let mut len_bytes = [0u8; 2];
            reader.read_exact(&mut len_bytes).map_err(eof_as_corrupt)?;
            let mut payload = vec![0u8; u16::from_le_bytes(len_bytes) as usize];
            reader.read_exact(&mut payload).map_err(eof_as_corrupt)?;
            Some(payload)
        } else {
            None
        };

        let filename = if flag_bits & flags::FNAME != 0 {
            Some(read_latin1_string(&mut reader)?)
        } else {
            None
        };
        let comment = if flag_bits & flags::FCOMMENT != 0 {
            Some(read_latin1_string(&mut reader)?)
        } else {
            None
        };

        let header_crc = if flag_bits & flags::FHCRC != 0 {
            // The check covers every header byte before the CRC field.
            let computed = (reader.value() & 0xFFFF) as u16;
            let mut crc_bytes = [0u8; 2];
            reader.read_exact(&mut crc_bytes).map_err(eof_as_corrupt)?;
            let stored = u16::from_le_bytes(crc_bytes);
            if stored != computed {
                return Err(OxiflateError::corrupt_detail(
                    CorruptKind::HeaderChecksumMismatch,
                    format!("FHCRC stored {stored:#06x} computed {computed:#06x}"),
                ));
            }
            Some(stored)
        } else {
            None
        };

        Ok(Self {
            method,
            flags: flag_bits,
            mtime,
            xfl,
            os,
            extra,
            filename,
            comment,
            header_crc,
        })
    }

    /// Write the header, appending a CRC16 when the FHCRC flag is set.
    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        let mut writer = ChecksumWriter::new(sink, Crc32::new());

        writer.write_all(&GZIP_MAGIC)?;
        writer.write_all(&[self.method, self.flags])?;
        writer.write_all(&self.mtime.to_le_bytes())?;
        writer.write_all(&[self.xfl, self.os])?;

        if self.flags & flags::FEXTRA != 0 {
            let extra = self.extra.as_deref().unwrap_or(&[]);
            writer.write_all(&(extra.len() as u16).to_le_bytes())?;
            writer.write_all(extra)?;
        }
        if self.flags & flags::FNAME != 0 {
            write_latin1_string(&mut writer, self.filename.as_deref().unwrap_or(""))?;
        }
        if self.flags & flags::FCOMMENT != 0 {
            write_latin1_string(&mut writer, self.comment.as_deref().unwrap_or(""))?;
        }
        if self.flags & flags::FHCRC != 0 {
            let crc16 = (writer.value() & 0xFFFF) as u16;
            writer.write_all(&crc16.to_le_bytes())?;
        }
        Ok(())
    }
}

/// Read a NUL-terminated ISO-8859-1 string.
fn read_latin1_string<R: Read>(reader: &mut R) -> Result<String> {
    let mut text = String::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte).map_err(eof_as_corrupt)?;
        if byte[0] == 0 {
            return Ok(text);
        }
        // ISO-8859-1 maps bytes to the first 256 code points directly.
        text.push(byte[0] as char);
    }
}

/// Write a string as NUL-terminated ISO-8859-1.
fn write_latin1_string<W: Write>(writer: &mut W, text: &str) -> Result<()> {
    let bytes: Vec<u8> = text
        .chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect();
    writer.write_all(&bytes)?;
    writer.write_all(&[0])?;
    Ok(())
}

/// Map an unexpected-EOF I/O error onto the format error a truncated
/// container deserves.
pub(crate) fn eof_as_corrupt(err: io::Error) -> OxiflateError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        OxiflateError::corrupt(CorruptKind::UnexpectedEndOfStream)
    } else {
        OxiflateError::Io(err)
    }
}
