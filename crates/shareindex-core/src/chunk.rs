//! Sliding-window text chunker.
//!
//! Splits document body text on whitespace into a token sequence and emits
//! windows of `chunk_size` tokens starting at multiples of
//! `chunk_size - overlap`. The last window may be shorter. Chunking is
//! deterministic: the same input and options always yield the same
//! sequence, which is what makes re-ingestion comparisons possible.

use serde::Serialize;

use crate::error::{Error, Result};

/// A bounded-size slice of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub content: String,
    /// Window ordinal within the document, starting at 0.
    pub index: usize,
}

/// Chunking parameters. Sizes are in whitespace-delimited tokens.
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 0,
        }
    }
}

/// Split `text` into overlapping token windows.
///
/// Empty or whitespace-only text yields an empty sequence, not an error.
///
/// # Errors
///
/// `InvalidConfig` if `chunk_size` is zero or `overlap >= chunk_size`
/// (the window stride must be positive).
pub fn chunk(text: &str, opts: &ChunkOptions) -> Result<Vec<Chunk>> {
    if opts.chunk_size == 0 {
        return Err(Error::InvalidConfig("chunk_size must be > 0".into()));
    }
    if opts.overlap >= opts.chunk_size {
        return Err(Error::InvalidConfig(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            opts.overlap, opts.chunk_size
        )));
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let stride = opts.chunk_size - opts.overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < tokens.len() {
        let end = (start + opts.chunk_size).min(tokens.len());
        chunks.push(Chunk {
            content: tokens[start..end].join(" "),
            index,
        });
        index += 1;
        start += stride;
    }

    Ok(chunks)
}
