//! Fixed-window text chunking.
//!
//! Documents are split into overlapping character windows so each chunk
//! can be embedded independently. Chunk ids are a dense zero-based
//! sequence over emitted chunks, which makes `{doc_id}_{chunk_id}` a
//! stable vector-record id across re-ingestion of the same text.

use serde::{Deserialize, Serialize};

use crate::errors::DocumentLoadError;

/// Window size in characters.
pub const CHUNK_SIZE: usize = 300;
/// Overlap between consecutive windows in characters.
pub const OVERLAP: usize = 50;

/// A bounded, overlapping substring of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub doc_id: String,
    pub chunk_id: usize,
}

impl Chunk {
    /// The id under which this chunk is stored in the vector index.
    pub fn record_id(&self) -> String {
        format!("{}_{}", self.doc_id, self.chunk_id)
    }
}

/// Split `text` into overlapping windows of [`CHUNK_SIZE`] characters,
/// advancing by `CHUNK_SIZE - OVERLAP` each step.
///
/// Windows are whitespace-trimmed; windows that trim to empty are skipped
/// without consuming a chunk id, so emitted ids are exactly `0..N-1`.
/// Deterministic: identical `(text, doc_id)` always yields an identical
/// chunk sequence.
pub fn chunk_text(text: &str, doc_id: &str) -> Result<Vec<Chunk>, DocumentLoadError> {
    // Indexing is by character, never by byte, so multi-byte text cannot
    // split a code point.
    let chars: Vec<char> = text.chars().collect();
    let step = CHUNK_SIZE - OVERLAP;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_id = 0usize;

    while start < chars.len() {
        let end = (start + CHUNK_SIZE).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                text: trimmed.to_string(),
                doc_id: doc_id.to_string(),
                chunk_id,
            });
            chunk_id += 1;
        }
        start += step;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_input() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let a = chunk_text(&text, "doc-1").unwrap();
        let b = chunk_text(&text, "doc-1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn boundary_math_for_400_chars() {
        let text = "A".repeat(400);
        let chunks = chunk_text(&text, "d1").unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_id, 0);
        assert_eq!(chunks[0].text, "A".repeat(300));
        assert_eq!(chunks[1].chunk_id, 1);
        // Second window starts at 250 and runs to the end of the text.
        assert_eq!(chunks[1].text, "A".repeat(150));
    }

    #[test]
    fn windows_cover_text_end_to_end() {
        for len in [1usize, 50, 299, 300, 301, 750, 1234] {
            let text: String = (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
            let chunks = chunk_text(&text, "d1").unwrap();

            // Reconstruct coverage: window k spans [k*250, k*250+300).
            let mut covered = vec![false; len];
            for (k, chunk) in chunks.iter().enumerate() {
                let start = k * (CHUNK_SIZE - OVERLAP);
                assert_eq!(chunk.text.chars().count(), (len - start).min(CHUNK_SIZE));
                for pos in start..(start + CHUNK_SIZE).min(len) {
                    covered[pos] = true;
                }
            }
            assert!(covered.iter().all(|c| *c), "gap in coverage for len={}", len);
        }
    }

    #[test]
    fn empty_windows_are_suppressed_and_ids_stay_dense() {
        // 300 chars of content, then 250 spaces (a window of pure
        // whitespace), then more content.
        let mut text = "x".repeat(300);
        text.push_str(&" ".repeat(250));
        text.push_str(&"y".repeat(100));
        let chunks = chunk_text(&text, "d1").unwrap();

        let ids: Vec<usize> = chunks.iter().map(|c| c.chunk_id).collect();
        assert_eq!(ids, (0..chunks.len()).collect::<Vec<_>>());
        assert!(chunks.iter().all(|c| !c.text.trim().is_empty()));
    }

    #[test]
    fn whitespace_only_text_yields_no_chunks() {
        let chunks = chunk_text("   \n\t  ", "d1").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "日本語のテキスト。".repeat(120);
        let chunks = chunk_text(&text, "d1").unwrap();
        assert!(!chunks.is_empty());
    }

    #[test]
    fn record_id_joins_doc_and_chunk() {
        let chunk = Chunk {
            text: "t".into(),
            doc_id: "doc-9".into(),
            chunk_id: 3,
        };
        assert_eq!(chunk.record_id(), "doc-9_3");
    }
}
