//! Splitting oversized replies into transport-sized fragments.
//!
//! Mesh radio frames are small; plugin replies often are not. The chunker
//! slices a reply into ordered fragments, each carrying a `[i/N] ` position
//! prefix and, on every non-final fragment, a trailing `+` continuation
//! marker. Marker bytes are reserved from the per-fragment budget *before*
//! slicing, so a fragment never exceeds the limit. Slicing never lands inside
//! a UTF-8 codepoint and prefers newline boundaries.
//!
//! Joining the payload portions of all fragments reconstructs the input
//! exactly. Text that already fits the limit passes through untouched, with
//! no marker overhead.

use thiserror::Error;

/// Smallest workable fragment limit: marker overhead for a two-digit split
/// plus a few payload bytes. Anything below this is a configuration error.
pub const MIN_CHUNK_SIZE: usize = 16;

const CONTINUATION: char = '+';

#[derive(Debug, Error, PartialEq)]
pub enum ChunkerError {
    #[error("Chunk limit {limit} is too small (minimum {MIN_CHUNK_SIZE} bytes)")]
    LimitTooSmall { limit: usize },

    #[error("Marker overhead for {fragments} fragments does not fit in limit {limit}")]
    MarkerOverflow { fragments: usize, limit: usize },
}

/// Deterministic, pure splitter: same input and limit always produce the
/// same fragment sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentChunker {
    max_size: usize,
}

impl ContentChunker {
    /// Fails loudly when the limit cannot fit marker overhead - corrupt
    /// fragments are worse than refusing to start.
    pub fn new(max_size: usize) -> Result<Self, ChunkerError> {
        if max_size < MIN_CHUNK_SIZE {
            return Err(ChunkerError::LimitTooSmall { limit: max_size });
        }
        Ok(Self { max_size })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Split `text` into fragments of at most `max_size` bytes each.
    pub fn split(&self, text: &str) -> Result<Vec<String>, ChunkerError> {
        if text.len() <= self.max_size {
            return Ok(vec![text.to_string()]);
        }

        // Marker width depends on the fragment count, which depends on the
        // payload budget, which depends on the marker width. Iterate to a
        // fixed point; the count estimate only ever grows.
        let mut count_guess = 2;
        let payloads = loop {
            let overhead = marker_overhead(count_guess);
            if overhead >= self.max_size {
                return Err(ChunkerError::MarkerOverflow {
                    fragments: count_guess,
                    limit: self.max_size,
                });
            }
            let budget = self.max_size - overhead;
            let payloads = slice_payloads(text, budget);
            if payloads.len() <= count_guess {
                break payloads;
            }
            count_guess = payloads.len();
        };

        let total = payloads.len();
        let chunks = payloads
            .into_iter()
            .enumerate()
            .map(|(idx, payload)| {
                let mut chunk = format!("[{}/{}] {}", idx + 1, total, payload);
                if idx + 1 < total {
                    chunk.push(CONTINUATION);
                }
                chunk
            })
            .collect();
        Ok(chunks)
    }
}

/// Worst-case marker bytes for `count` fragments: widest `[i/N] ` prefix
/// plus the continuation suffix.
fn marker_overhead(count: usize) -> usize {
    format!("[{}/{}] ", count, count).len() + CONTINUATION.len_utf8()
}

/// Slice text into payloads of at most `budget` bytes without splitting
/// codepoints, preferring to break after a newline when one falls in the
/// back half of the slice.
fn slice_payloads(text: &str, budget: usize) -> Vec<String> {
    let mut payloads = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= budget {
            payloads.push(remaining.to_string());
            break;
        }
        let mut end = budget;
        while end > 0 && !remaining.is_char_boundary(end) {
            end -= 1;
        }
        let slice = &remaining[..end];
        if let Some(pos) = slice.rfind('\n') {
            if pos > 0 && pos + 1 >= end / 2 {
                let piece = &slice[..=pos];
                payloads.push(piece.to_string());
                remaining = &remaining[pos + 1..];
                continue;
            }
        }
        payloads.push(slice.to_string());
        remaining = &remaining[end..];
    }
    payloads
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strip the `[i/N] ` prefix and trailing `+` from a fragment.
    fn payload_of(chunk: &str) -> &str {
        let rest = chunk.splitn(2, "] ").nth(1).unwrap_or(chunk);
        rest.strip_suffix('+').unwrap_or(rest)
    }

    #[test]
    fn rejects_limit_below_minimum() {
        assert_eq!(
            ContentChunker::new(8),
            Err(ChunkerError::LimitTooSmall { limit: 8 })
        );
    }

    #[test]
    fn short_text_passes_through_unmarked() {
        let chunker = ContentChunker::new(50).unwrap();
        let chunks = chunker.split("short reply").unwrap();
        assert_eq!(chunks, vec!["short reply".to_string()]);
    }

    #[test]
    fn text_exactly_at_limit_stays_single() {
        let chunker = ContentChunker::new(20).unwrap();
        let text = "x".repeat(20);
        assert_eq!(chunker.split(&text).unwrap(), vec![text]);
    }

    #[test]
    fn every_fragment_respects_limit() {
        let chunker = ContentChunker::new(40).unwrap();
        let text = "word ".repeat(60);
        let chunks = chunker.split(&text).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 40, "fragment too long: {:?}", chunk);
        }
    }

    #[test]
    fn payloads_rejoin_to_original() {
        let chunker = ContentChunker::new(30).unwrap();
        let text = "The quick brown fox\njumps over\nthe lazy dog. ".repeat(8);
        let chunks = chunker.split(&text).unwrap();
        let rejoined: String = chunks.iter().map(|c| payload_of(c)).collect();
        assert_eq!(rejoined, text);
    }

    #[test]
    fn markers_number_fragments_in_order() {
        let chunker = ContentChunker::new(25).unwrap();
        let text = "abcdefghij".repeat(10);
        let chunks = chunker.split(&text).unwrap();
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.starts_with(&format!("[{}/{}] ", i + 1, total)));
            if i + 1 < total {
                assert!(chunk.ends_with('+'), "non-final fragment missing marker");
            } else {
                assert!(!chunk.ends_with('+'));
            }
        }
    }

    #[test]
    fn never_splits_multibyte_codepoints() {
        let chunker = ContentChunker::new(20).unwrap();
        let text = "日本語テキスト".repeat(10);
        let chunks = chunker.split(&text).unwrap();
        let rejoined: String = chunks.iter().map(|c| payload_of(c)).collect();
        assert_eq!(rejoined, text);
    }

    #[test]
    fn deterministic_for_same_input() {
        let chunker = ContentChunker::new(32).unwrap();
        let text = "lorem ipsum dolor sit amet ".repeat(20);
        assert_eq!(chunker.split(&text).unwrap(), chunker.split(&text).unwrap());
    }
}
