//! Sliding-window text chunker.
//!
//! Splits text into fixed-size, overlapping windows. Window size and
//! overlap are measured in characters (Unicode scalar values), so a window
//! never ends inside a multi-byte character.
//!
//! # Algorithm
//!
//! 1. Reject `chunk_size == 0` and `overlap >= chunk_size` (the window
//!    would never advance).
//! 2. Emit `text[start, start + chunk_size)`, clipped to the text length.
//! 3. Advance `start` by `chunk_size - overlap`.
//! 4. Stop once `start` reaches or passes the end of the text.
//!
//! The final chunk may be shorter than `chunk_size`.
//!
//! # Example
//!
//! ```rust
//! use docrag::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefghij", 4, 1).unwrap();
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, vec!["abcd", "defg", "ghij", "j"]);
//! ```

use crate::error::{Error, Result};
use crate::models::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_OVERLAP: usize = 50;

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// # Errors
///
/// Returns [`Error::Config`] when `chunk_size` is zero or `overlap` is not
/// strictly smaller than `chunk_size`. Parameters are checked before the
/// text, so an invalid configuration is reported even for empty input.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    validate_window(chunk_size, overlap)?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_len = offsets.len();
    let byte_at = |c: usize| offsets.get(c).copied().unwrap_or(text.len());

    let step = chunk_size - overlap;
    let mut chunks = Vec::with_capacity(char_len / step + 1);
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(char_len);
        chunks.push(Chunk {
            index: chunks.len(),
            start_offset: start,
            text: text[byte_at(start)..byte_at(end)].to_string(),
        });
        start += step;
        if start >= char_len {
            break;
        }
    }

    Ok(chunks)
}

/// Check window parameters without chunking anything.
pub fn validate_window(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::config("chunk_size must be > 0"));
    }
    if overlap >= chunk_size {
        return Err(Error::config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}
