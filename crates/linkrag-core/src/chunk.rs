//! Sliding-window text chunker.
//!
//! Splits document content into overlapping windows of `chunk_size`
//! characters. Windows are the unit of retrieval: each one is tokenized,
//! scored and cited independently.
//!
//! # Algorithm
//!
//! 1. If the content fits in one window, return it whole.
//! 2. Otherwise slide a `chunk_size` window forward by
//!    `step = max(chunk_size - overlap, 100)`.
//! 3. Trim each window; drop windows that trim to nothing.
//! 4. Stop right after the window that ends at the last character, so no
//!    tail is ever left unindexed.
//!
//! Lengths are counted in characters, not bytes, so multi-byte text never
//! splits inside a code point.
//!
//! # Example
//!
//! ```rust
//! use linkrag_core::chunk::split_into_chunks;
//!
//! let text = "word ".repeat(100);
//! let chunks = split_into_chunks(&text, 200, 50);
//! assert_eq!(chunks.len(), 3);
//! ```

/// Smallest distance a window ever advances, whatever the overlap.
pub const MIN_STEP: usize = 100;

/// Split `content` into trimmed, overlapping windows.
///
/// # Guarantees
///
/// - Identical inputs always produce identical boundaries.
/// - The last window ends at the end of `content`.
/// - With `overlap <= chunk_size / 2`, consecutive windows touch or overlap,
///   so every character falls in at least one window (modulo trimmed
///   whitespace).
pub fn split_into_chunks(content: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let char_count = content.chars().count();
    if char_count <= chunk_size {
        return vec![content.to_string()];
    }

    // Byte offset of every character start, plus the end of the string.
    let offsets: Vec<usize> = content
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(content.len()))
        .collect();

    let step = chunk_size.saturating_sub(overlap).max(MIN_STEP);
    let mut chunks = Vec::new();
    let mut cursor = 0;

    while cursor < char_count {
        let end = (cursor + chunk_size).min(char_count);
        let window = content[offsets[cursor]..offsets[end]].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        if end == char_count {
            break;
        }
        cursor += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = split_into_chunks("Hello, world!", 800, 120);
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_exact_fit_is_single_chunk() {
        let text = "x".repeat(200);
        assert_eq!(split_into_chunks(&text, 200, 0).len(), 1);
    }

    #[test]
    fn test_last_window_reaches_end() {
        let text: String = (0..1234).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = split_into_chunks(&text, 300, 60);
        let last = chunks.last().unwrap();
        assert!(text.ends_with(last.as_str()));
    }

    #[test]
    fn test_step_never_below_minimum() {
        // overlap nearly equal to chunk_size would give a step of 10;
        // the minimum step keeps the window count bounded.
        let text = "y".repeat(1000);
        let chunks = split_into_chunks(&text, 200, 190);
        assert_eq!(chunks.len(), 9);
    }

    #[test]
    fn test_windows_cover_whole_document() {
        let text: String = (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunk_size = 400;
        let overlap = 120;
        let chunks = split_into_chunks(&text, chunk_size, overlap);

        let step = chunk_size - overlap;
        let mut rebuilt = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i + 1 == chunks.len() {
                rebuilt.push_str(chunk);
            } else {
                rebuilt.extend(chunk.chars().take(step));
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_whitespace_windows_dropped() {
        let text = format!("{}{}", "a".repeat(150), " ".repeat(400));
        let chunks = split_into_chunks(&text, 200, 0);
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert_eq!(chunks, vec!["a".repeat(150)]);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──┐│é│└──┘".repeat(40);
        let chunks = split_into_chunks(&text, 200, 40);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 200);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta. ".repeat(80);
        assert_eq!(
            split_into_chunks(&text, 250, 100),
            split_into_chunks(&text, 250, 100)
        );
    }
}
