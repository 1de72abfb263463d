//! Text chunking module
//!
//! Splits document text into fixed-size overlapping character windows.

use stormwatch_common::config::validate_chunking;
use stormwatch_common::errors::Result;
use stormwatch_common::models::{Chunk, Document};
use tracing::debug;

/// Sliding-window chunker over characters
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker; `overlap` must be smaller than `max_chunk_size`
    pub fn new(max_chunk_size: usize, overlap: usize) -> Result<Self> {
        validate_chunking(max_chunk_size, overlap)?;
        Ok(Self {
            max_chunk_size,
            overlap,
        })
    }

    /// Split a document into ordered chunks.
    ///
    /// Text no longer than `max_chunk_size` yields exactly one chunk equal to
    /// the text. Otherwise consecutive chunks share exactly `overlap`
    /// characters and the last chunk ends at the end of the text.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        let total_len = chars.len();
        let step = self.max_chunk_size - self.overlap;

        let mut chunks = Vec::with_capacity(total_len / step + 1);
        let mut start = 0;

        loop {
            let end = (start + self.max_chunk_size).min(total_len);
            chunks.push(Chunk {
                text: chars[start..end].iter().collect(),
                index: chunks.len(),
                start,
                metadata: document.metadata.clone(),
            });

            if end == total_len {
                break;
            }
            start += step;
        }

        debug!(
            document_id = %document.metadata.id,
            input_len = total_len,
            chunk_count = chunks.len(),
            "Document chunked"
        );

        chunks
    }

    /// Chunk every document, preserving document order
    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunk(document)).collect()
    }
}
