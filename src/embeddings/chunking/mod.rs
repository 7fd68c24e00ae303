
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sentence terminators tried, in order, when looking for a chunk break
const SENTENCE_BREAKS: [[char; 2]; 4] = [['.', ' '], ['.', '\n'], ['!', ' '], ['?', '\n']];

/// Configuration for text chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Text no longer than `chunk_size` comes back unchanged as a single chunk.
/// Otherwise each window is cut after the last sentence terminator found in
/// its second half, the next window starts `overlap` characters before the
/// previous cut, and chunks are trimmed with blank ones dropped.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= chunk_size {
        return vec![text.to_string()];
    }

    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + chunk_size).min(len);

        if end < len {
            if let Some(cut) = sentence_break(&chars[start..end], chunk_size) {
                end = start + cut;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        start = if end < len {
            end.saturating_sub(overlap).max(start + 1)
        } else {
            end
        };
    }

    debug!(
        "Split {} characters into {} chunks (size {}, overlap {})",
        len,
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

/// Position just past the first terminator (in priority order) whose last
/// occurrence lies beyond half of `chunk_size`.
fn sentence_break(window: &[char], chunk_size: usize) -> Option<usize> {
    SENTENCE_BREAKS.iter().find_map(|terminator| {
        let position = window
            .windows(2)
            .rposition(|pair| pair == terminator.as_slice())?;
        (position * 2 > chunk_size).then_some(position + 2)
    })
}
