//! LZ77 match finding for the DEFLATE encoder.
//!
//! The matcher maintains hash chains over three-byte prefixes and walks
//! them nearest-first, so the reported match is the longest available
//! within the distance bound, at the smallest distance when several
//! candidates tie. Chains link every position whose three-byte prefix
//! hashes together, which covers every possible match of three bytes or
//! more.

use crate::tables::{MAX_MATCH_DISTANCE, MAX_MATCH_LENGTH};
use oxiflate_core::error::{OxiflateError, Result};

/// Minimum back-reference length representable by DEFLATE.
pub const MIN_MATCH_LENGTH: usize = 3;

/// Size of the hash table (power of 2).
const HASH_SIZE: usize = 32768;

/// Hash mask.
const HASH_MASK: usize = HASH_SIZE - 1;

/// Chain terminator.
const EMPTY: u32 = u32::MAX;

/// A token produced by the encoder's tokenizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

/// Greedy longest-match tokenizer over a window slice.
#[derive(Debug, Clone)]
pub struct MatchFinder {
    min_length: usize,
    max_length: usize,
    min_distance: usize,
    max_distance: usize,
}

impl MatchFinder {
    /// Create a matcher with the given search bounds.
    ///
    /// # Errors
    ///
    /// Misuse unless `3 <= min_length <= max_length <= 258` and
    /// `1 <= min_distance <= max_distance <= 32768`.
    pub fn new(
        min_length: usize,
        max_length: usize,
        min_distance: usize,
        max_distance: usize,
    ) -> Result<Self> {
        if min_length < MIN_MATCH_LENGTH || min_length > max_length || max_length > MAX_MATCH_LENGTH
        {
            return Err(OxiflateError::misuse(format!(
                "match length bounds {min_length}..={max_length} outside 3..=258"
            )));
        }
        if min_distance < 1 || min_distance > max_distance || max_distance > MAX_MATCH_DISTANCE {
            return Err(OxiflateError::misuse(format!(
                "match distance bounds {min_distance}..={max_distance} outside 1..=32768"
            )));
        }
        Ok(Self {
            min_length,
            max_length,
            min_distance,
            max_distance,
        })
    }

    /// A matcher with the format's full bounds.
    pub fn full_range() -> Self {
        Self {
            min_length: MIN_MATCH_LENGTH,
            max_length: MAX_MATCH_LENGTH,
            min_distance: 1,
            max_distance: MAX_MATCH_DISTANCE,
        }
    }

    #[inline]
    fn hash(window: &[u8], pos: usize) -> usize {
        let h = (window[pos] as usize).wrapping_mul(506832829)
            ^ ((window[pos + 1] as usize).wrapping_mul(2654435761) << 8)
            ^ ((window[pos + 2] as usize).wrapping_mul(374761393) << 16);
        (h ^ (h >> 15)) & HASH_MASK
    }

    /// Tokenize `window[start..]`, with `window[..start]` available as
    /// match history.
    pub fn tokenize(&self, window: &[u8], start: usize) -> Vec<Token> {
        let mut tokens = Vec::new();
        if window.len() < start {
            return tokens;
        }

        let mut head = vec![EMPTY; HASH_SIZE];
        let mut prev = vec![EMPTY; window.len()];
        let insert = |pos: usize, head: &mut [u32], prev: &mut [u32]| {
            if pos + MIN_MATCH_LENGTH <= window.len() {
                let h = Self::hash(window, pos);
                prev[pos] = head[h];
                head[h] = pos as u32;
            }
        };

        for pos in 0..start {
            insert(pos, &mut head, &mut prev);
        }

        let mut pos = start;
        while pos < window.len() {
            let best = self.find_match(window, pos, &head, &prev);
            match best {
                Some((length, distance)) => {
                    tokens.push(Token::Match {
                        length: length as u16,
                        distance: distance as u16,
                    });
                    for covered in pos..pos + length {
                        insert(covered, &mut head, &mut prev);
                    }
                    pos += length;
                }
                None => {
                    tokens.push(Token::Literal(window[pos]));
                    insert(pos, &mut head, &mut prev);
                    pos += 1;
                }
            }
        }
        tokens
    }

    /// The longest match at `pos`, smallest distance on ties, or `None`
    /// when nothing reaches the minimum length.
    fn find_match(
        &self,
        window: &[u8],
        pos: usize,
        head: &[u32],
        prev: &[u32],
    ) -> Option<(usize, usize)> {
        let cap = self.max_length.min(window.len() - pos);
        if cap < self.min_length {
            return None;
        }

        let mut best_len = self.min_length - 1;
        let mut best_dist = 0usize;
        let mut candidate = head[Self::hash(window, pos)];

        while candidate != EMPTY {
            let cand = candidate as usize;
            let distance = pos - cand;
            if distance > self.max_distance {
                break; // chains are position-ordered; everything further is older
            }
            if distance >= self.min_distance {
                // Reject cheaply on the byte that would extend the best.
                if window[cand + best_len] == window[pos + best_len] {
                    let mut len = 0;
                    while len < cap && window[cand + len] == window[pos + len] {
                        len += 1;
                    }
                    if len > best_len {
                        best_len = len;
                        best_dist = distance;
                        if len == cap {
                            break; // nothing longer exists at this position
                        }
                    }
                }
            }
            candidate = prev[cand];
        }

        (best_dist > 0).then_some((best_len, best_dist))
    }
}

impl Default for MatchFinder {
    fn default() -> Self {
        Self::full_range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(tokens: &[Token], history: &[u8]) -> Vec<u8> {
        let mut out = history.to_vec();
        for token in tokens {
            match token {
                Token::Literal(byte) => out.push(*byte),
                Token::Match { length, distance } => {
                    for _ in 0..*length {
                        let byte = out[out.len() - *distance as usize];
                        out.push(byte);
                    }
                }
            }
        }
        out[history.len()..].to_vec()
    }

    #[test]
    fn test_literals_only() {
        let input = b"abcdefgh";
        let tokens = MatchFinder::full_range().tokenize(input, 0);
        assert!(tokens.iter().all(|t| matches!(t, Token::Literal(_))));
        assert_eq!(tokens.len(), 8);
    }

    #[test]
    fn test_repeated_pattern() {
        let input = b"abcabcabcabc";
        let tokens = MatchFinder::full_range().tokenize(input, 0);
        // Three literals then one overlapping match of nine.
        assert_eq!(tokens.len(), 4);
        assert_eq!(
            tokens[3],
            Token::Match {
                length: 9,
                distance: 3
            }
        );
        assert_eq!(reconstruct(&tokens, b""), input);
    }

    #[test]
    fn test_smallest_distance_wins_tie() {
        // "abcd" is available at distance 5 and at distance 10 when the
        // final copy is probed; nearest-first keeps distance 5.
        let input = b"abcd_abcd+abcd";
        let tokens = MatchFinder::full_range().tokenize(input, 0);
        let last = tokens.last().unwrap();
        assert_eq!(
            *last,
            Token::Match {
                length: 4,
                distance: 5
            }
        );
        assert_eq!(reconstruct(&tokens, b""), input);
    }

    #[test]
    fn test_history_is_searchable() {
        let mut window = Vec::new();
        window.extend_from_slice(b"needle and haystack ");
        let start = window.len();
        window.extend_from_slice(b"needle");

        let tokens = MatchFinder::full_range().tokenize(&window, start);
        assert_eq!(
            tokens,
            vec![Token::Match {
                length: 6,
                distance: 20
            }]
        );
    }

    #[test]
    fn test_run_compresses_to_overlapping_match() {
        let input = vec![7u8; 300];
        let tokens = MatchFinder::full_range().tokenize(&input, 0);
        assert_eq!(
            tokens,
            vec![
                Token::Literal(7),
                Token::Match {
                    length: 258,
                    distance: 1
                },
                Token::Match {
                    length: 41,
                    distance: 1
                },
            ]
        );
        assert_eq!(reconstruct(&tokens, b""), input);
    }

    #[test]
    fn test_distance_bound_respected() {
        let finder = MatchFinder::new(3, 258, 1, 4).unwrap();
        // The only copy of "abcd" is 8 back, beyond the bound.
        let input = b"abcd....abcd";
        let tokens = finder.tokenize(input, 0);
        assert!(tokens.iter().all(|t| match t {
            Token::Match { distance, .. } => *distance <= 4,
            Token::Literal(_) => true,
        }));
        assert_eq!(reconstruct(&tokens, b""), input);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(MatchFinder::new(2, 258, 1, 32768).is_err());
        assert!(MatchFinder::new(3, 259, 1, 32768).is_err());
        assert!(MatchFinder::new(3, 258, 0, 32768).is_err());
        assert!(MatchFinder::new(3, 258, 1, 32769).is_err());
        assert!(MatchFinder::new(10, 5, 1, 100).is_err());
    }
}
