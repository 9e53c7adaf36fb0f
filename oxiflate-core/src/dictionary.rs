//! Sliding dictionary for DEFLATE decompression.
//!
//! The decoder maintains a ring buffer of the most recent 32 KiB of output
//! so back-references can copy previously emitted data. Copies are resolved
//! byte-by-byte, which makes overlapping runs (distance smaller than the
//! length) propagate the way LZ77 requires.

use crate::error::{CorruptKind, OxiflateError, Result};

/// Dictionary size mandated by DEFLATE (32 KiB).
pub const DICTIONARY_SIZE: usize = 32768;

const MASK: usize = DICTIONARY_SIZE - 1;

/// A 32 KiB ring buffer of recently emitted decompressed bytes.
#[derive(Debug, Clone)]
pub struct Dictionary {
    /// The underlying buffer.
    buffer: Box<[u8]>,
    /// Current write position (next byte will be written here).
    position: usize,
    /// Number of bytes written, saturating at the capacity.
    size: usize,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self {
            buffer: vec![0u8; DICTIONARY_SIZE].into_boxed_slice(),
            position: 0,
            size: 0,
        }
    }

    /// Number of bytes of history available, up to 32 KiB.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Append a single byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & MASK;
        if self.size < DICTIONARY_SIZE {
            self.size += 1;
        }
    }

    /// Append a slice of bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Append a back-reference copy of `length` bytes starting `distance`
    /// before the write cursor.
    ///
    /// The copy proceeds byte-by-byte so an overlapping run (for example
    /// `distance = 1`) repeats the propagated bytes.
    ///
    /// # Errors
    ///
    /// `CopyFromBeforeDictionaryStart` if `distance` exceeds the number of
    /// bytes emitted so far (or is zero).
    pub fn copy_match(&mut self, distance: usize, length: usize) -> Result<()> {
        if distance == 0 || distance > self.size {
            return Err(OxiflateError::corrupt_detail(
                CorruptKind::CopyFromBeforeDictionaryStart,
                format!("distance {distance} with only {} bytes of history", self.size),
            ));
        }
        let mut src = (self.position.wrapping_sub(distance)) & MASK;
        for _ in 0..length {
            let byte = self.buffer[src];
            self.push(byte);
            src = (src + 1) & MASK;
        }
        Ok(())
    }

    /// Copy `out.len()` bytes starting `distance` before the write cursor
    /// into `out`, in stream order.
    ///
    /// Used to hand a caller bytes that were decoded into the dictionary
    /// while its output buffer was full. `distance` must not exceed the
    /// current fill, and `out` must not reach past the cursor.
    pub fn read_back(&self, distance: usize, out: &mut [u8]) {
        debug_assert!(distance <= self.size && out.len() <= distance);
        for (i, slot) in out.iter_mut().enumerate() {
            let index = (self.position.wrapping_sub(distance - i)) & MASK;
            *slot = self.buffer[index];
        }
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_len() {
        let mut dict = Dictionary::new();
        dict.extend(b"Hello");
        assert_eq!(dict.len(), 5);

        let mut out = [0u8; 5];
        dict.read_back(5, &mut out);
        assert_eq!(&out, b"Hello");
    }

    #[test]
    fn test_copy_match() {
        let mut dict = Dictionary::new();
        dict.extend(b"ABCD");
        dict.copy_match(4, 4).unwrap();

        let mut out = [0u8; 8];
        dict.read_back(8, &mut out);
        assert_eq!(&out, b"ABCDABCD");
    }

    #[test]
    fn test_copy_overlap() {
        // length > distance repeats the pattern
        let mut dict = Dictionary::new();
        dict.extend(b"AB");
        dict.copy_match(2, 6).unwrap();

        let mut out = [0u8; 8];
        dict.read_back(8, &mut out);
        assert_eq!(&out, b"ABABABAB");
    }

    #[test]
    fn test_single_byte_repeat() {
        let mut dict = Dictionary::new();
        dict.push(b'X');
        dict.copy_match(1, 5).unwrap();

        let mut out = [0u8; 6];
        dict.read_back(6, &mut out);
        assert_eq!(&out, b"XXXXXX");
    }

    #[test]
    fn test_invalid_distance() {
        let mut dict = Dictionary::new();
        let err = dict.copy_match(1, 1).unwrap_err();
        assert_eq!(
            err.corrupt_kind(),
            Some(CorruptKind::CopyFromBeforeDictionaryStart)
        );

        dict.extend(b"abc");
        assert!(dict.copy_match(4, 1).is_err());
        assert!(dict.copy_match(0, 1).is_err());
        assert!(dict.copy_match(3, 1).is_ok());
    }

    #[test]
    fn test_wraparound() {
        let mut dict = Dictionary::new();
        for i in 0..DICTIONARY_SIZE + 10 {
            dict.push((i % 251) as u8);
        }
        assert_eq!(dict.len(), DICTIONARY_SIZE);

        // The most recent byte survives the wrap.
        let mut out = [0u8; 1];
        dict.read_back(1, &mut out);
        assert_eq!(out[0], ((DICTIONARY_SIZE + 9) % 251) as u8);

        // A full-window back-reference is still addressable.
        assert!(dict.copy_match(DICTIONARY_SIZE, 1).is_ok());
    }
}
