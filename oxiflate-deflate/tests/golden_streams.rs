//! Golden DEFLATE streams and malformed-stream scenarios.
//!
//! Inputs are written as bit strings in stream order (LSB-first within
//! each byte) so they can be checked against the format specification
//! directly.

use oxiflate_core::error::CorruptKind;
use oxiflate_deflate::inflate;

/// Pack a bit string ('0'/'1', everything else ignored) LSB-first,
/// zero-padding the final byte.
fn bits(pattern: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut acc = 0u8;
    let mut used = 0;
    for c in pattern.chars().filter(|c| *c == '0' || *c == '1') {
        if c == '1' {
            acc |= 1 << used;
        }
        used += 1;
        if used == 8 {
            bytes.push(acc);
            acc = 0;
            used = 0;
        }
    }
    if used > 0 {
        bytes.push(acc);
    }
    bytes
}

fn kind_of(data: &[u8]) -> CorruptKind {
    inflate(data)
        .unwrap_err()
        .corrupt_kind()
        .expect("a data-format error")
}

#[test]
fn golden_stored_empty() {
    let data = bits("1 00 00000 0000000000000000 1111111111111111");
    assert_eq!(inflate(&data).unwrap(), b"");
}

#[test]
fn golden_stored_three_bytes() {
    let data = bits(
        "1 00 00000 1100000000000000 0011111111111111 10100000 00101000 11000100",
    );
    assert_eq!(inflate(&data).unwrap(), [0x05, 0x14, 0x23]);
}

#[test]
fn golden_fixed_empty() {
    let data = bits("1 10 0000000");
    assert_eq!(inflate(&data).unwrap(), b"");
}

#[test]
fn golden_fixed_with_match() {
    // Literals 00 01 02, then length 3 at distance 3.
    let data = bits("1 10 00110000 00110001 00110010 0000001 00010 0000000");
    assert_eq!(inflate(&data).unwrap(), [0x00, 0x01, 0x02, 0x00, 0x01, 0x02]);
}

#[test]
fn golden_fixed_overlapping_run() {
    // Literal 01, then length 4 at distance 1.
    let data = bits("1 10 00110001 0000010 00000 0000000");
    assert_eq!(inflate(&data).unwrap(), [0x01; 5]);
}

#[test]
fn golden_dynamic_empty() {
    // HLIT=257, HDIST=2, HCLEN=19; code-length code gives 1-bit codes to
    // symbols 1 and 18; lengths expand to one literal, 255 zeros, the
    // end-of-block code, and two 1-bit distance codes; body is just EOB.
    let data = bits(
        "1 01 00000 10000 1111 \
         000 000 100 000 000 000 000 000 000 000 000 000 000 000 000 000 000 100 000 \
         0 11111111 10101011 0 0 0 1",
    );
    assert_eq!(inflate(&data).unwrap(), b"");
}

#[test]
fn fails_on_empty_input() {
    assert_eq!(kind_of(&[]), CorruptKind::UnexpectedEndOfStream);
}

#[test]
fn fails_on_reserved_block_type() {
    assert_eq!(kind_of(&bits("1 11 00000")), CorruptKind::ReservedBlockType);
}

#[test]
fn fails_on_stored_length_mismatch() {
    assert_eq!(
        kind_of(&bits("1 00 00000 0010000000010000 1111100100110101")),
        CorruptKind::UncompressedBlockLengthMismatch
    );
}

#[test]
fn fails_on_reserved_length_symbol() {
    // The fixed code decodes 11000110 as symbol 286.
    assert_eq!(
        kind_of(&bits("1 10 11000110")),
        CorruptKind::ReservedLengthSymbol
    );
}

#[test]
fn fails_on_over_full_code_length_code() {
    // HCLEN=4 with code-length code lengths {1, 1, 1, 0}.
    assert_eq!(
        kind_of(&bits("1 01 00000 00000 0000 100 100 100 000")),
        CorruptKind::HuffmanCodeOverFull
    );
}

#[test]
fn fails_on_under_full_code_length_code() {
    // HCLEN=4 with code-length code lengths {0, 0, 1, 0}.
    assert_eq!(
        kind_of(&bits("1 01 00000 00000 0000 000 000 100 000")),
        CorruptKind::HuffmanCodeUnderFull
    );
}

#[test]
fn fails_on_premature_end_inside_stored_payload() {
    // LEN=3 but only one payload byte follows.
    assert_eq!(
        kind_of(&bits("1 00 00000 1100000000000000 0011111111111111 10100000")),
        CorruptKind::UnexpectedEndOfStream
    );
}

#[test]
fn fails_on_copy_before_stream_start() {
    // Length 3 at distance 3 with an empty dictionary.
    assert_eq!(
        kind_of(&bits("1 10 0000001 00010 0000000")),
        CorruptKind::CopyFromBeforeDictionaryStart
    );
}

#[test]
fn trailing_padding_bits_are_ignored() {
    // The same fixed empty block with every trailing padding pattern.
    let zero_padded = bits("1 10 0000000 000000");
    let one_padded = bits("1 10 0000000 111111");
    assert_eq!(inflate(&zero_padded).unwrap(), b"");
    assert_eq!(inflate(&one_padded).unwrap(), b"");
}

#[test]
fn stored_block_padding_bits_are_ignored() {
    // Garbage in the five bits between the header and LEN.
    let data = bits("1 00 10110 1000000000000000 0111111111111111 11111111");
    assert_eq!(inflate(&data).unwrap(), [0xFF]);
}
