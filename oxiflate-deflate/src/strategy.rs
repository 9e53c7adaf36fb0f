//! Encoder strategies for the deflater.
//!
//! A [`Strategy`] looks at the window (history plus unencoded data) and
//! returns a [`Decision`]: a deferred description of how the next block or
//! blocks will be encoded. The decision knows its own cost in bits for
//! every possible bit position of the writer (stored blocks pay an
//! alignment-dependent padding) and emits itself exactly once when the
//! facade commits to it.
//!
//! Composite strategies compose decisions instead of bits:
//! [`MultiStrategy`] keeps every candidate and picks the cheapest at
//! emission time, [`BinarySplit`] recursively weighs one block against two.

use crate::huffman::{CanonicalCode, package_merge};
use crate::lz77::{MIN_MATCH_LENGTH, MatchFinder, Token};
use crate::tables::{
    CODE_LENGTH_ORDER, CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, END_OF_BLOCK,
    LITLEN_ALPHABET_SIZE, MAX_MATCH_LENGTH, distance_to_code, fixed_distance_encoder,
    fixed_litlen_encoder, fixed_litlen_lengths, length_to_code,
};
use oxiflate_core::bitstream::BitWriter;
use oxiflate_core::error::{OxiflateError, Result};
use std::io::Write;

/// Largest payload of one stored block.
const MAX_STORED_BLOCK: usize = 65535;

/// How the next chunk of data will be encoded.
///
/// A decision is immutable once made: composites hold their sub-decisions,
/// so the tree of candidates is evaluated lazily and collapsed exactly once
/// at emission.
#[derive(Debug)]
pub enum Decision<'a> {
    /// Stored blocks of at most 65 535 bytes each.
    Stored {
        /// The raw bytes to store.
        data: &'a [u8],
    },
    /// One Huffman block carrying a token stream.
    Tokens {
        /// Literal and back-reference tokens, end-of-block excluded.
        tokens: Vec<Token>,
        /// Which codes encode the tokens.
        codes: CodeChoice,
        /// Total block cost in bits (header included), alignment-free.
        bits: u64,
    },
    /// Sub-decisions emitted back to back.
    Split {
        /// The parts, in emission order.
        parts: Vec<Decision<'a>>,
    },
    /// Alternative decisions; the cheapest at the writer's current bit
    /// position is emitted.
    Choice {
        /// The candidates, in preference order on ties.
        candidates: Vec<Decision<'a>>,
    },
}

/// The code pair used by a [`Decision::Tokens`] block.
#[derive(Debug)]
pub enum CodeChoice {
    /// The fixed codes of RFC 1951 section 3.2.6.
    Fixed,
    /// Codes built for this block and transmitted in its header.
    Dynamic(Box<DynamicHeader>),
}

/// A fully precomputed dynamic block header.
///
/// Everything the header transmission needs is derived at decision time so
/// the cost is exact and emission is a single pass.
#[derive(Debug)]
pub struct DynamicHeader {
    /// Literal/length code lengths, trimmed to HLIT entries (>= 257).
    litlen_lengths: Vec<u8>,
    /// Distance code lengths, trimmed to HDIST entries (>= 1). A single
    /// zero declares a literal-only block.
    dist_lengths: Vec<u8>,
    /// Code lengths of the code-length code itself (7-bit limited).
    codelen_lengths: [u8; CODELEN_ALPHABET_SIZE],
    /// The run-length-coded length stream as
    /// `(symbol, extra_value, extra_bits)` triples.
    codelen_symbols: Vec<(u8, u8, u8)>,
    /// Transmitted HCLEN value (entry count minus 4).
    hclen: usize,
}

impl DynamicHeader {
    /// Build the header for a token stream's symbol histogram.
    fn build(tokens: &[Token]) -> Self {
        let (mut litlen_freq, mut dist_freq) = token_frequencies(tokens);

        // The decoder refuses codes with fewer than two symbols; an
        // otherwise-empty histogram gets a dummy literal next to the
        // always-present end-of-block symbol.
        if litlen_freq.iter().filter(|&&f| f > 0).count() < 2 {
            litlen_freq[0] += 1;
        }
        let litlen_full = package_merge(&litlen_freq, 15);

        let dist_used = dist_freq.iter().filter(|&&f| f > 0).count();
        let dist_full = match dist_used {
            0 => vec![0u8; 1],
            _ => {
                if dist_used == 1 {
                    // A one-symbol distance code cannot form a full tree;
                    // give a second, unused symbol a dummy code.
                    let used = dist_freq.iter().position(|&f| f > 0).unwrap();
                    dist_freq[if used == 0 { 1 } else { 0 }] = 1;
                }
                package_merge(&dist_freq, 15)
            }
        };

        // Trim trailing zeros down to the transmitted counts.
        let hlit_count = litlen_full
            .iter()
            .rposition(|&l| l > 0)
            .map_or(257, |last| (last + 1).max(257));
        let hdist_count = dist_full
            .iter()
            .rposition(|&l| l > 0)
            .map_or(1, |last| last + 1);
        let mut litlen_lengths = litlen_full;
        litlen_lengths.truncate(hlit_count);
        let mut dist_lengths = dist_full;
        dist_lengths.truncate(hdist_count);

        // Run-length-code the combined length vector with symbols 16/17/18
        // and build the code-length code over the result.
        let mut combined = litlen_lengths.clone();
        combined.extend_from_slice(&dist_lengths);
        let (codelen_symbols, mut codelen_freq) = rle_encode_lengths(&combined);
        if codelen_freq.iter().filter(|&&f| f > 0).count() < 2 {
            // Give an unused symbol a dummy code so the tree is full; it
            // costs three header bits and is never emitted.
            let unused = codelen_freq.iter().position(|&f| f == 0).unwrap();
            codelen_freq[unused] = 1;
        }
        let codelen_vec = package_merge(&codelen_freq, 7);
        let mut codelen_lengths = [0u8; CODELEN_ALPHABET_SIZE];
        codelen_lengths.copy_from_slice(&codelen_vec);

        let mut hclen_count = CODELEN_ALPHABET_SIZE;
        while hclen_count > 4 && codelen_lengths[CODE_LENGTH_ORDER[hclen_count - 1]] == 0 {
            hclen_count -= 1;
        }

        Self {
            litlen_lengths,
            dist_lengths,
            codelen_lengths,
            codelen_symbols,
            hclen: hclen_count - 4,
        }
    }

    /// Header cost in bits, after the 3-bit block header.
    fn header_bits(&self) -> u64 {
        let mut bits = 5 + 5 + 4 + 3 * (self.hclen as u64 + 4);
        for &(sym, _, extra_bits) in &self.codelen_symbols {
            bits += self.codelen_lengths[sym as usize] as u64 + extra_bits as u64;
        }
        bits
    }

    /// Code length of a literal/length symbol.
    fn litlen_length(&self, symbol: usize) -> u64 {
        self.litlen_lengths.get(symbol).copied().unwrap_or(0) as u64
    }

    /// Code length of a distance symbol.
    fn dist_length(&self, symbol: usize) -> u64 {
        self.dist_lengths.get(symbol).copied().unwrap_or(0) as u64
    }

    /// Emit HLIT/HDIST/HCLEN, the code-length code, and the coded lengths.
    fn write_to<W: Write>(&self, writer: &mut BitWriter<W>) -> Result<()> {
        writer.write_bits((self.litlen_lengths.len() - 257) as u32, 5)?;
        writer.write_bits((self.dist_lengths.len() - 1) as u32, 5)?;
        writer.write_bits(self.hclen as u32, 4)?;
        for &position in CODE_LENGTH_ORDER.iter().take(self.hclen + 4) {
            writer.write_bits(self.codelen_lengths[position] as u32, 3)?;
        }

        let codelen_code = CanonicalCode::from_lengths(&self.codelen_lengths);
        for &(sym, extra, extra_bits) in &self.codelen_symbols {
            let (code, len) = codelen_code.code(sym as usize);
            writer.write_bits(code as u32, len as u32)?;
            if extra_bits > 0 {
                writer.write_bits(extra as u32, extra_bits as u32)?;
            }
        }
        Ok(())
    }
}

impl<'a> Decision<'a> {
    /// Build a token-block decision, computing its exact cost.
    pub fn tokens(tokens: Vec<Token>, codes: CodeChoice) -> Self {
        let body = match &codes {
            CodeChoice::Fixed => {
                let lengths = fixed_litlen_lengths();
                tokens_body_bits(&tokens, |sym| lengths[sym] as u64, |_| 5)
            }
            CodeChoice::Dynamic(header) => {
                header.header_bits()
                    + tokens_body_bits(
                        &tokens,
                        |sym| header.litlen_length(sym),
                        |sym| header.dist_length(sym),
                    )
            }
        };
        Decision::Tokens {
            tokens,
            codes,
            bits: 3 + body,
        }
    }

    /// Estimated bits to emit this decision, indexed by the writer's bit
    /// position at the moment emission starts.
    pub fn bit_lengths(&self) -> [u64; 8] {
        let mut lengths = [0u64; 8];
        for (position, slot) in lengths.iter_mut().enumerate() {
            *slot = self.bits_at(position as u32);
        }
        lengths
    }

    /// Cost at one specific starting bit position.
    fn bits_at(&self, position: u32) -> u64 {
        match self {
            Decision::Stored { data } => {
                let mut total = 0u64;
                let mut pos = position;
                for chunk in stored_chunks(data) {
                    total += 3;
                    pos = (pos + 3) % 8;
                    let padding = (8 - pos) % 8;
                    total += padding as u64 + 32 + 8 * chunk.len() as u64;
                    pos = 0;
                }
                total
            }
            Decision::Tokens { bits, .. } => *bits,
            Decision::Split { parts } => {
                let mut total = 0u64;
                let mut pos = position;
                for part in parts {
                    let bits = part.bits_at(pos);
                    total += bits;
                    pos = ((pos as u64 + bits) % 8) as u32;
                }
                total
            }
            Decision::Choice { candidates } => candidates
                .iter()
                .map(|candidate| candidate.bits_at(position))
                .min()
                .expect("choice has at least one candidate"),
        }
    }

    /// Emit the block header(s) and body.
    ///
    /// `is_final` marks the last emitted block as the stream's final one.
    pub fn compress_to<W: Write>(&self, writer: &mut BitWriter<W>, is_final: bool) -> Result<()> {
        match self {
            Decision::Stored { data } => {
                let chunks: Vec<&[u8]> = stored_chunks(data).collect();
                let last = chunks.len() - 1;
                for (i, chunk) in chunks.into_iter().enumerate() {
                    writer.write_bit(is_final && i == last)?;
                    writer.write_bits(0b00, 2)?;
                    writer.align_to_byte()?;
                    writer.write_bits(chunk.len() as u32, 16)?;
                    writer.write_bits(!(chunk.len() as u16) as u32, 16)?;
                    writer.write_bytes(chunk)?;
                }
                Ok(())
            }
            Decision::Tokens { tokens, codes, .. } => {
                writer.write_bit(is_final)?;
                match codes {
                    CodeChoice::Fixed => {
                        writer.write_bits(0b01, 2)?;
                        write_tokens(
                            writer,
                            tokens,
                            fixed_litlen_encoder(),
                            Some(fixed_distance_encoder()),
                        )
                    }
                    CodeChoice::Dynamic(header) => {
                        writer.write_bits(0b10, 2)?;
                        header.write_to(writer)?;
                        let litlen_code = CanonicalCode::from_lengths(&header.litlen_lengths);
                        let dist_code = if header.dist_lengths.iter().any(|&l| l > 0) {
                            Some(CanonicalCode::from_lengths(&header.dist_lengths))
                        } else {
                            None
                        };
                        write_tokens(writer, tokens, &litlen_code, dist_code.as_ref())
                    }
                }
            }
            Decision::Split { parts } => {
                let last = parts.len() - 1;
                for (i, part) in parts.iter().enumerate() {
                    part.compress_to(writer, is_final && i == last)?;
                }
                Ok(())
            }
            Decision::Choice { candidates } => {
                let position = writer.bit_position();
                let best = candidates
                    .iter()
                    .min_by_key(|candidate| candidate.bits_at(position))
                    .expect("choice has at least one candidate");
                best.compress_to(writer, is_final)
            }
        }
    }
}

/// The stored-block chunking: at least one chunk, each at most 65 535
/// bytes, so an empty payload still yields one (empty) block.
fn stored_chunks<'a>(data: &'a [u8]) -> Box<dyn Iterator<Item = &'a [u8]> + 'a> {
    if data.is_empty() {
        Box::new(std::iter::once(&data[..0]))
    } else {
        Box::new(data.chunks(MAX_STORED_BLOCK))
    }
}

/// Body cost of a token stream under the given code lengths, end-of-block
/// included, extra bits counted.
fn tokens_body_bits(
    tokens: &[Token],
    litlen_length: impl Fn(usize) -> u64,
    dist_length: impl Fn(usize) -> u64,
) -> u64 {
    let mut bits = 0u64;
    for token in tokens {
        match token {
            Token::Literal(byte) => bits += litlen_length(*byte as usize),
            Token::Match { length, distance } => {
                let (len_sym, len_extra, _) = length_to_code(*length);
                bits += litlen_length(len_sym as usize) + len_extra as u64;
                let (dist_sym, dist_extra, _) = distance_to_code(*distance);
                bits += dist_length(dist_sym as usize) + dist_extra as u64;
            }
        }
    }
    bits + litlen_length(END_OF_BLOCK as usize)
}

/// Emit a token stream plus the end-of-block symbol.
fn write_tokens<W: Write>(
    writer: &mut BitWriter<W>,
    tokens: &[Token],
    litlen_code: &CanonicalCode,
    dist_code: Option<&CanonicalCode>,
) -> Result<()> {
    let write_symbol = |writer: &mut BitWriter<W>, code: &CanonicalCode, sym: usize| {
        let (bits, len) = code.code(sym);
        debug_assert!(len > 0, "emitting symbol {sym} with no code");
        writer.write_bits(bits as u32, len as u32)
    };

    for token in tokens {
        match token {
            Token::Literal(byte) => {
                write_symbol(writer, litlen_code, *byte as usize)?;
            }
            Token::Match { length, distance } => {
                let (len_sym, len_extra_bits, len_extra) = length_to_code(*length);
                write_symbol(writer, litlen_code, len_sym as usize)?;
                if len_extra_bits > 0 {
                    writer.write_bits(len_extra as u32, len_extra_bits as u32)?;
                }
                let dist_code = dist_code.expect("match token in a literal-only block");
                let (dist_sym, dist_extra_bits, dist_extra) = distance_to_code(*distance);
                write_symbol(writer, dist_code, dist_sym as usize)?;
                if dist_extra_bits > 0 {
                    writer.write_bits(dist_extra as u32, dist_extra_bits as u32)?;
                }
            }
        }
    }
    write_symbol(writer, litlen_code, END_OF_BLOCK as usize)
}

/// Histogram of a token stream, end-of-block counted once.
fn token_frequencies(tokens: &[Token]) -> ([u32; LITLEN_ALPHABET_SIZE - 2], [u32; 30]) {
    let mut litlen_freq = [0u32; LITLEN_ALPHABET_SIZE - 2];
    let mut dist_freq = [0u32; DISTANCE_ALPHABET_SIZE];
    for token in tokens {
        match token {
            Token::Literal(byte) => litlen_freq[*byte as usize] += 1,
            Token::Match { length, distance } => {
                let (len_sym, _, _) = length_to_code(*length);
                litlen_freq[len_sym as usize] += 1;
                let (dist_sym, _, _) = distance_to_code(*distance);
                dist_freq[dist_sym as usize] += 1;
            }
        }
    }
    litlen_freq[END_OF_BLOCK as usize] += 1;
    (litlen_freq, dist_freq)
}

/// Run-length-code a combined length vector with symbols 16/17/18.
///
/// Returns the `(symbol, extra_value, extra_bits)` stream and the symbol
/// histogram for building the code-length code.
fn rle_encode_lengths(lengths: &[u8]) -> (Vec<(u8, u8, u8)>, [u32; CODELEN_ALPHABET_SIZE]) {
    let mut symbols = Vec::new();
    let mut freqs = [0u32; CODELEN_ALPHABET_SIZE];
    let mut i = 0;
    while i < lengths.len() {
        let value = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == value {
            run += 1;
        }
        i += run;

        if value == 0 {
            let mut remaining = run;
            while remaining > 0 {
                if remaining >= 11 {
                    let n = remaining.min(138);
                    symbols.push((18, (n - 11) as u8, 7));
                    freqs[18] += 1;
                    remaining -= n;
                } else if remaining >= 3 {
                    symbols.push((17, (remaining - 3) as u8, 3));
                    freqs[17] += 1;
                    remaining = 0;
                } else {
                    symbols.push((0, 0, 0));
                    freqs[0] += 1;
                    remaining -= 1;
                }
            }
        } else {
            symbols.push((value, 0, 0));
            freqs[value as usize] += 1;
            let mut remaining = run - 1;
            while remaining > 0 {
                if remaining >= 3 {
                    let n = remaining.min(6);
                    symbols.push((16, (n - 3) as u8, 2));
                    freqs[16] += 1;
                    remaining -= n;
                } else {
                    symbols.push((value, 0, 0));
                    freqs[value as usize] += 1;
                    remaining -= 1;
                }
            }
        }
    }
    (symbols, freqs)
}

/// Collect the run-length tokens the RLE strategies share: literals for
/// singletons, distance-1 matches for runs of at least three repeats.
fn rle_tokens(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        if i > 0 && data[i] == data[i - 1] {
            let byte = data[i - 1];
            let mut run = 1;
            while i + run < data.len() && data[i + run] == byte {
                run += 1;
            }
            if run >= MIN_MATCH_LENGTH {
                let mut remaining = run;
                while remaining >= MIN_MATCH_LENGTH {
                    let n = remaining.min(MAX_MATCH_LENGTH);
                    tokens.push(Token::Match {
                        length: n as u16,
                        distance: 1,
                    });
                    remaining -= n;
                }
                for _ in 0..remaining {
                    tokens.push(Token::Literal(byte));
                }
                i += run;
                continue;
            }
        }
        tokens.push(Token::Literal(data[i]));
        i += 1;
    }
    tokens
}

/// Decides how the next block of data is encoded.
pub trait Strategy {
    /// Inspect `window[history_len..history_len + data_len]` (with the
    /// preceding history available for back-references) and produce the
    /// encoding decision for it.
    fn decide<'a>(&self, window: &'a [u8], history_len: usize, data_len: usize) -> Decision<'a>;
}

/// Emits stored blocks only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncompressed;

impl Strategy for Uncompressed {
    fn decide<'a>(&self, window: &'a [u8], history_len: usize, data_len: usize) -> Decision<'a> {
        Decision::Stored {
            data: &window[history_len..history_len + data_len],
        }
    }
}

/// Emits one block with the fixed codes.
///
/// The plain form codes every byte as a literal; the run-length form
/// additionally turns repeat runs into distance-1 matches.
#[derive(Debug, Clone, Copy)]
pub struct StaticHuffman {
    rle: bool,
}

impl StaticHuffman {
    /// Literals only.
    pub fn new() -> Self {
        Self { rle: false }
    }

    /// Literals plus distance-1 runs.
    pub fn run_length() -> Self {
        Self { rle: true }
    }
}

impl Default for StaticHuffman {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for StaticHuffman {
    fn decide<'a>(&self, window: &'a [u8], history_len: usize, data_len: usize) -> Decision<'a> {
        let data = &window[history_len..history_len + data_len];
        let tokens = if self.rle {
            rle_tokens(data)
        } else {
            data.iter().map(|&byte| Token::Literal(byte)).collect()
        };
        Decision::tokens(tokens, CodeChoice::Fixed)
    }
}

/// Emits one block with codes fitted to the block's own histogram.
///
/// Code lengths come from the package-merge algorithm, so they are optimal
/// under the 15-bit limit.
#[derive(Debug, Clone, Copy)]
pub struct DynamicHuffman {
    rle: bool,
}

impl DynamicHuffman {
    /// Literals only.
    pub fn literal() -> Self {
        Self { rle: false }
    }

    /// Literals plus distance-1 runs.
    pub fn run_length() -> Self {
        Self { rle: true }
    }
}

impl Strategy for DynamicHuffman {
    fn decide<'a>(&self, window: &'a [u8], history_len: usize, data_len: usize) -> Decision<'a> {
        let data = &window[history_len..history_len + data_len];
        let tokens = if self.rle {
            rle_tokens(data)
        } else {
            data.iter().map(|&byte| Token::Literal(byte)).collect()
        };
        let header = DynamicHeader::build(&tokens);
        Decision::tokens(tokens, CodeChoice::Dynamic(Box::new(header)))
    }
}

/// Full LZ77 matching, with either the fixed or a per-block dynamic code.
#[derive(Debug, Clone)]
pub struct Lz77Huffman {
    finder: MatchFinder,
    dynamic: bool,
}

impl Lz77Huffman {
    /// LZ77 matches emitted with the fixed codes.
    pub fn fixed(finder: MatchFinder) -> Self {
        Self {
            finder,
            dynamic: false,
        }
    }

    /// LZ77 matches emitted with per-block dynamic codes.
    pub fn dynamic(finder: MatchFinder) -> Self {
        Self {
            finder,
            dynamic: true,
        }
    }
}

impl Strategy for Lz77Huffman {
    fn decide<'a>(&self, window: &'a [u8], history_len: usize, data_len: usize) -> Decision<'a> {
        let tokens = self
            .finder
            .tokenize(&window[..history_len + data_len], history_len);
        if self.dynamic {
            let header = DynamicHeader::build(&tokens);
            Decision::tokens(tokens, CodeChoice::Dynamic(Box::new(header)))
        } else {
            Decision::tokens(tokens, CodeChoice::Fixed)
        }
    }
}

/// Evaluates several strategies and defers to the cheapest decision.
pub struct MultiStrategy {
    strategies: Vec<Box<dyn Strategy>>,
}

impl MultiStrategy {
    /// Combine `strategies`; at least one is required.
    ///
    /// # Errors
    ///
    /// Misuse when `strategies` is empty.
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(OxiflateError::misuse("MultiStrategy needs a sub-strategy"));
        }
        Ok(Self { strategies })
    }
}

impl Strategy for MultiStrategy {
    fn decide<'a>(&self, window: &'a [u8], history_len: usize, data_len: usize) -> Decision<'a> {
        Decision::Choice {
            candidates: self
                .strategies
                .iter()
                .map(|strategy| strategy.decide(window, history_len, data_len))
                .collect(),
        }
    }
}

/// Recursively weighs encoding a region as one block against splitting it
/// in half, with the left half serving as extra history for the right.
pub struct BinarySplit {
    base: Box<dyn Strategy>,
    minimum_block_length: usize,
}

impl BinarySplit {
    /// Refine `base` with recursive splitting, never considering blocks
    /// shorter than `minimum_block_length`.
    ///
    /// # Errors
    ///
    /// Misuse when `minimum_block_length` is zero.
    pub fn new(base: Box<dyn Strategy>, minimum_block_length: usize) -> Result<Self> {
        if minimum_block_length == 0 {
            return Err(OxiflateError::misuse(
                "minimum block length must be positive",
            ));
        }
        Ok(Self {
            base,
            minimum_block_length,
        })
    }
}

impl Strategy for BinarySplit {
    fn decide<'a>(&self, window: &'a [u8], history_len: usize, data_len: usize) -> Decision<'a> {
        let whole = self.base.decide(window, history_len, data_len);
        if data_len < 2 * self.minimum_block_length {
            return whole;
        }
        let half = data_len / 2;
        let left = self.decide(window, history_len, half);
        let right = self.decide(window, history_len + half, data_len - half);
        Decision::Choice {
            candidates: vec![
                whole,
                Decision::Split {
                    parts: vec![left, right],
                },
            ],
        }
    }
}
