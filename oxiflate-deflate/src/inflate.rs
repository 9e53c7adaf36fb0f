//! DEFLATE decompression (inflate).
//!
//! This module implements DEFLATE decompression as specified in RFC 1951.
//! It supports all three block types:
//! - Type 0: Stored (uncompressed)
//! - Type 1: Fixed Huffman codes
//! - Type 2: Dynamic Huffman codes
//!
//! [`Inflater`] is the resumable block decoder: a pull interface that
//! decodes as many bytes as the caller's buffer holds and picks up
//! mid-block (even mid-copy) on the next call. [`InflateReader`] wraps it
//! in a [`Read`] facade with the sticky-error contract and the optional
//! end-exact mode for seekable sources.

use crate::huffman::{self, CodeTable, CodeTree};
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS, decode_distance, decode_length,
    fixed_distance_decoder, fixed_litlen_decoder,
};
use oxiflate_core::bitstream::BitReader;
use oxiflate_core::dictionary::Dictionary;
use oxiflate_core::error::{CorruptKind, OxiflateError, Result};
use std::io::{self, Read, Seek, SeekFrom};

/// Decode state for one block.
#[derive(Debug)]
enum BlockState {
    /// Expecting the next block header.
    Between,
    /// Inside a stored block with this many payload bytes left.
    Stored { remaining: u16 },
    /// Inside a Huffman-coded block.
    Huffman(HuffmanState),
}

/// The codes of the Huffman block currently being decoded.
#[derive(Debug)]
enum HuffmanState {
    /// The fixed codes of RFC 1951 section 3.2.6.
    Fixed,
    /// Codes transmitted in the block header.
    Dynamic(Box<DynamicCodes>),
}

#[derive(Debug)]
struct DynamicCodes {
    litlen_tree: CodeTree,
    litlen_table: CodeTable,
    /// Absent for literal-only blocks (single zero distance length).
    distance: Option<(CodeTree, CodeTable)>,
}

impl HuffmanState {
    fn litlen(&self) -> (&CodeTree, &CodeTable) {
        match self {
            Self::Fixed => {
                let (tree, table) = fixed_litlen_decoder();
                (tree, table)
            }
            Self::Dynamic(codes) => (&codes.litlen_tree, &codes.litlen_table),
        }
    }

    fn distance(&self) -> Option<(&CodeTree, &CodeTable)> {
        match self {
            Self::Fixed => {
                let (tree, table) = fixed_distance_decoder();
                Some((tree, table))
            }
            Self::Dynamic(codes) => codes.distance.as_ref().map(|(t, l)| (t, l)),
        }
    }
}

/// What a decode step did to the current block.
enum Step {
    /// More symbols remain (the caller's buffer filled).
    Continue,
    /// The block finished.
    BlockDone,
}

/// Resumable DEFLATE block decoder.
///
/// Owns the bit reader over the compressed source and the 32 KiB sliding
/// dictionary. Decoded bytes always enter the dictionary; bytes that do
/// not fit the caller's buffer stay there, counted by `pending`, and are
/// delivered first on the next call.
#[derive(Debug)]
pub struct Inflater<R: Read> {
    reader: BitReader<R>,
    dictionary: Dictionary,
    block: BlockState,
    /// The current block is the last one (`bfinal` was set).
    last_block: bool,
    /// Decoded bytes in the dictionary not yet handed to the caller.
    pending: usize,
    /// The final block has been fully decoded.
    finished: bool,
}

impl<R: Read> Inflater<R> {
    /// Create a decoder over `source` with the default input buffer.
    pub fn new(source: R) -> Self {
        Self::from_bit_reader(BitReader::new(source))
    }

    /// Create a decoder with the given input buffer capacity.
    ///
    /// # Errors
    ///
    /// Misuse if `capacity` is zero.
    pub fn with_capacity(source: R, capacity: usize) -> Result<Self> {
        Ok(Self::from_bit_reader(BitReader::with_capacity(
            source, capacity,
        )?))
    }

    fn from_bit_reader(reader: BitReader<R>) -> Self {
        Self {
            reader,
            dictionary: Dictionary::new(),
            block: BlockState::Between,
            last_block: false,
            pending: 0,
            finished: false,
        }
    }

    /// Whether the final block has been fully decoded.
    ///
    /// Pending bytes may still be waiting for delivery.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Bytes the bit reader fetched beyond the end of the compressed
    /// stream (meaningful once [`finished`](Self::finished) is true).
    pub fn over_read_bytes(&self) -> u64 {
        self.reader.over_read_bytes()
    }

    /// Get a mutable reference to the underlying source.
    pub fn source_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    /// Consume the decoder and return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Decode up to `buf.len()` bytes. Returns 0 only for an empty `buf`
    /// or at end of stream.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        loop {
            if self.pending > 0 && written < buf.len() {
                let take = self.pending.min(buf.len() - written);
                self.dictionary
                    .read_back(self.pending, &mut buf[written..written + take]);
                self.pending -= take;
                written += take;
            }
            if written == buf.len() || (self.finished && self.pending == 0) {
                return Ok(written);
            }

            let done = match &mut self.block {
                BlockState::Between => {
                    self.begin_block()?;
                    continue;
                }
                BlockState::Stored { remaining } => {
                    let take = (*remaining as usize).min(buf.len() - written);
                    let chunk = &mut buf[written..written + take];
                    self.reader.read_bytes(chunk)?;
                    self.dictionary.extend(chunk);
                    written += take;
                    *remaining -= take as u16;
                    *remaining == 0
                }
                BlockState::Huffman(codes) => {
                    let step = decode_huffman(
                        &mut self.reader,
                        &mut self.dictionary,
                        codes,
                        buf,
                        &mut written,
                        &mut self.pending,
                    )?;
                    matches!(step, Step::BlockDone)
                }
            };

            if done {
                self.block = BlockState::Between;
                if self.last_block {
                    self.finished = true;
                }
            }
        }
    }

    /// Read the next block header and set up its decode state.
    fn begin_block(&mut self) -> Result<()> {
        let bfinal = self.reader.read_bits(1)? == 1;
        let btype = self.reader.read_bits(2)?;
        self.last_block = bfinal;

        self.block = match btype {
            0 => {
                self.reader.align_to_byte();
                let len = self.reader.read_bits(16)? as u16;
                let nlen = self.reader.read_bits(16)? as u16;
                if len != !nlen {
                    return Err(OxiflateError::corrupt_detail(
                        CorruptKind::UncompressedBlockLengthMismatch,
                        format!("len={len} nlen={nlen}"),
                    ));
                }
                BlockState::Stored { remaining: len }
            }
            1 => BlockState::Huffman(HuffmanState::Fixed),
            2 => BlockState::Huffman(HuffmanState::Dynamic(Box::new(
                self.read_dynamic_codes()?,
            ))),
            _ => return Err(OxiflateError::corrupt(CorruptKind::ReservedBlockType)),
        };
        Ok(())
    }

    /// Parse a dynamic block's code descriptions (RFC 1951 section 3.2.7).
    fn read_dynamic_codes(&mut self) -> Result<DynamicCodes> {
        let reader = &mut self.reader;
        let hlit = reader.read_bits(5)? as usize + 257;
        let hdist = reader.read_bits(5)? as usize + 1;
        let hclen = reader.read_bits(4)? as usize + 4;

        // The code-length code's lengths arrive in a fixed permutation.
        let mut codelen_lengths = [0u8; 19];
        for &position in CODE_LENGTH_ORDER.iter().take(hclen) {
            codelen_lengths[position] = reader.read_bits(3)? as u8;
        }
        let codelen_tree = CodeTree::from_lengths(&codelen_lengths)?;

        // Decode the run-length-coded literal/length + distance lengths.
        let mut lengths = vec![0u8; hlit + hdist];
        let mut filled = 0;
        while filled < lengths.len() {
            let sym = codelen_tree.decode_symbol(reader)?;
            let (value, run) = match sym {
                0..=15 => (sym as u8, 1),
                16 => {
                    if filled == 0 {
                        return Err(OxiflateError::corrupt(
                            CorruptKind::NoPreviousCodeLengthToCopy,
                        ));
                    }
                    (lengths[filled - 1], 3 + reader.read_bits(2)? as usize)
                }
                17 => (0, 3 + reader.read_bits(3)? as usize),
                _ => (0, 11 + reader.read_bits(7)? as usize),
            };
            if filled + run > lengths.len() {
                return Err(OxiflateError::corrupt_detail(
                    CorruptKind::CodeLengthCodeOverFull,
                    format!("run of {run} overflows {} lengths", lengths.len()),
                ));
            }
            lengths[filled..filled + run].fill(value);
            filled += run;
        }

        let (litlen_lengths, dist_lengths) = lengths.split_at(hlit);
        if litlen_lengths[256] == 0 {
            return Err(OxiflateError::corrupt(CorruptKind::EndOfBlockCodeZeroLength));
        }
        let litlen_tree = CodeTree::from_lengths(litlen_lengths)?;
        let litlen_table = CodeTable::new(&litlen_tree);

        let distance = if dist_lengths.len() == 1 && dist_lengths[0] == 0 {
            // A single zero length declares a literal-only block.
            None
        } else {
            let ones = dist_lengths.iter().filter(|&&l| l == 1).count();
            let longer = dist_lengths.iter().filter(|&&l| l > 1).count();
            let tree = if ones == 1 && longer == 0 {
                // One real code: pad a 1-bit sentinel at reserved symbol 31
                // so the tree is complete. Decoding the sentinel trips the
                // reserved-symbol check.
                let mut padded = [0u8; 32];
                padded[..dist_lengths.len()].copy_from_slice(dist_lengths);
                padded[31] = 1;
                CodeTree::from_lengths(&padded)?
            } else {
                CodeTree::from_lengths(dist_lengths)?
            };
            let table = CodeTable::new(&tree);
            Some((tree, table))
        };

        Ok(DynamicCodes {
            litlen_tree,
            litlen_table,
            distance,
        })
    }
}

/// Decode Huffman symbols until the block ends or `buf` fills.
fn decode_huffman<R: Read>(
    reader: &mut BitReader<R>,
    dictionary: &mut Dictionary,
    codes: &HuffmanState,
    buf: &mut [u8],
    written: &mut usize,
    pending: &mut usize,
) -> Result<Step> {
    let (litlen_tree, litlen_table) = codes.litlen();
    loop {
        if *written == buf.len() {
            return Ok(Step::Continue);
        }
        let sym = huffman::decode_symbol(reader, litlen_tree, litlen_table)?;
        match sym {
            0..=255 => {
                dictionary.push(sym as u8);
                buf[*written] = sym as u8;
                *written += 1;
            }
            256 => return Ok(Step::BlockDone),
            257..=285 => {
                let extra_bits = LENGTH_EXTRA_BITS[(sym - 257) as usize];
                let extra = if extra_bits > 0 {
                    reader.read_bits(extra_bits as u32)? as u16
                } else {
                    0
                };
                let length = decode_length(sym, extra) as usize;

                let Some((dist_tree, dist_table)) = codes.distance() else {
                    return Err(OxiflateError::corrupt(
                        CorruptKind::LengthEncounteredWithEmptyDistanceCode,
                    ));
                };
                let dist_sym = huffman::decode_symbol(reader, dist_tree, dist_table)?;
                if dist_sym >= 30 {
                    return Err(OxiflateError::corrupt_detail(
                        CorruptKind::ReservedDistanceSymbol,
                        format!("symbol {dist_sym}"),
                    ));
                }
                let dist_extra_bits = DISTANCE_EXTRA_BITS[dist_sym as usize];
                let dist_extra = if dist_extra_bits > 0 {
                    reader.read_bits(dist_extra_bits as u32)? as u16
                } else {
                    0
                };
                let distance = decode_distance(dist_sym, dist_extra) as usize;

                // The whole run goes into the dictionary; whatever exceeds
                // the caller's buffer is delivered on the next call.
                dictionary.copy_match(distance, length)?;
                let take = length.min(buf.len() - *written);
                dictionary.read_back(length, &mut buf[*written..*written + take]);
                *written += take;
                *pending = length - take;
            }
            _ => {
                return Err(OxiflateError::corrupt_detail(
                    CorruptKind::ReservedLengthSymbol,
                    format!("symbol {sym}"),
                ));
            }
        }
    }
}

/// Facade state: open, latched on the first corruption, or closed.
#[derive(Debug)]
enum FacadeState<R: Read> {
    Open(Inflater<R>),
    Sticky { kind: CorruptKind, detail: String },
    Closed,
}

/// A byte-oriented [`Read`] facade over the DEFLATE decoder.
///
/// The first data-format failure latches: every later read reports the
/// same error without touching the source. I/O errors pass through
/// unlatched. [`close`](Self::close) is allowed from any state and is
/// idempotent; reading after it is a contract violation.
///
/// In end-exact mode (available for seekable sources via
/// [`new_end_exact`](Self::new_end_exact)), completing the final block
/// repositions the source onto the first byte after the compressed
/// stream, counting a partially consumed byte as fully consumed.
#[derive(Debug)]
pub struct InflateReader<R: Read> {
    state: FacadeState<R>,
    /// Monomorphized seek-back hook; present only in end-exact mode.
    rewinder: Option<fn(&mut R, u64) -> io::Result<()>>,
    rewound: bool,
}

impl<R: Read> InflateReader<R> {
    /// Create a facade over `source`.
    pub fn new(source: R) -> Self {
        Self {
            state: FacadeState::Open(Inflater::new(source)),
            rewinder: None,
            rewound: false,
        }
    }

    /// Create a facade with the given input buffer capacity.
    ///
    /// # Errors
    ///
    /// Misuse if `capacity` is zero.
    pub fn with_capacity(source: R, capacity: usize) -> Result<Self> {
        Ok(Self {
            state: FacadeState::Open(Inflater::with_capacity(source, capacity)?),
            rewinder: None,
            rewound: false,
        })
    }

    /// Decode up to `buf.len()` bytes; see [`Read::read`] for the
    /// short-read contract.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let result = match &mut self.state {
            FacadeState::Open(inflater) => inflater.read(buf),
            FacadeState::Sticky { kind, detail } => {
                return Err(OxiflateError::corrupt_detail(*kind, detail.clone()));
            }
            FacadeState::Closed => return Err(OxiflateError::misuse("read after close")),
        };
        match result {
            Ok(n) => {
                self.maybe_rewind()?;
                Ok(n)
            }
            Err(OxiflateError::Corrupt { kind, detail }) => {
                self.state = FacadeState::Sticky {
                    kind,
                    detail: detail.clone(),
                };
                Err(OxiflateError::Corrupt { kind, detail })
            }
            Err(other) => Err(other),
        }
    }

    /// Decode a single byte, or `None` at end of stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok(match self.read_bytes(&mut byte)? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    /// Drop the decoder state. Idempotent, allowed from any state.
    pub fn close(&mut self) {
        self.state = FacadeState::Closed;
    }

    /// Consume the facade and return the source, if still open.
    ///
    /// In end-exact mode the source has been repositioned exactly past the
    /// compressed stream once decoding completed.
    pub fn into_inner(self) -> Option<R> {
        match self.state {
            FacadeState::Open(inflater) => Some(inflater.into_inner()),
            _ => None,
        }
    }

    fn maybe_rewind(&mut self) -> Result<()> {
        if self.rewound {
            return Ok(());
        }
        let Some(rewind) = self.rewinder else {
            return Ok(());
        };
        if let FacadeState::Open(inflater) = &mut self.state {
            if inflater.finished() {
                let over_read = inflater.over_read_bytes();
                rewind(inflater.source_mut(), over_read)?;
                self.rewound = true;
            }
        }
        Ok(())
    }
}

impl<R: Read + Seek> InflateReader<R> {
    /// Create a facade in end-exact mode over a seekable source.
    pub fn new_end_exact(source: R) -> Self {
        fn rewind<R: Seek>(source: &mut R, bytes: u64) -> io::Result<()> {
            source.seek(SeekFrom::Current(-(bytes as i64))).map(|_| ())
        }
        Self {
            state: FacadeState::Open(Inflater::new(source)),
            rewinder: Some(rewind::<R>),
            rewound: false,
        }
    }
}

impl<R: Read> Read for InflateReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(Into::into)
    }
}

/// Decompress a complete DEFLATE stream held in memory.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Inflater::new(data);
    let mut output = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = inflater.read(&mut buf)?;
        if n == 0 {
            return Ok(output);
        }
        output.extend_from_slice(&buf[..n]);
    }
}
