//! Documents and text chunks
//!
//! A document is split into ordered chunks before anything else happens;
//! every downstream artifact (entity, community, summary) points back at
//! chunk ids. Chunks are immutable once created.

use crate::graph::types::{ChunkId, DocumentId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A source document: plain text plus a stable identity.
///
/// Format decoding (PDF, DOCX, ...) happens upstream; the engine only sees
/// extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Document {
            id: DocumentId::new(id),
            text: text.into(),
        }
    }
}

/// One ordered piece of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub ordinal: u32,
    pub text: String,
}

/// Splits a document into ordered chunks.
pub trait Chunker: Send + Sync {
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Paragraph-based splitter with a word budget and fractional overlap.
///
/// Paragraphs (blank-line separated) are kept whole when they fit; oversized
/// paragraphs are re-split at `max_words` with `overlap` carried between
/// pieces. Markdown headings start a new chunk, which keeps chapters from
/// bleeding into each other.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    pub max_words: usize,
    pub overlap: f32,
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self {
            max_words: 300,
            overlap: 0.2,
        }
    }
}

impl ParagraphChunker {
    fn split_oversized(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let max_words = self.max_words.max(1);
        // Overlap must leave the window room to advance.
        let overlap_words = ((max_words as f32 * self.overlap) as usize).min(max_words - 1);
        let mut pieces = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + max_words).min(words.len());
            pieces.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap_words;
        }
        pieces
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut ordinal = 0u32;
        let mut push = |text: String, ordinal: &mut u32| {
            chunks.push(Chunk {
                id: ChunkId::new(&document.id, *ordinal),
                document_id: document.id.clone(),
                ordinal: *ordinal,
                text,
            });
            *ordinal += 1;
        };

        let mut heading: Option<String> = None;
        for paragraph in document.text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if paragraph.starts_with('#') && !paragraph.contains('\n') {
                // Heading becomes a prefix for the chunks that follow it
                heading = Some(paragraph.trim_start_matches('#').trim().to_string());
                continue;
            }

            let prefixed = match &heading {
                Some(h) => format!("{}\n{}", h, paragraph),
                None => paragraph.to_string(),
            };

            if prefixed.split_whitespace().count() <= self.max_words {
                push(prefixed, &mut ordinal);
            } else {
                for piece in self.split_oversized(&prefixed) {
                    push(piece, &mut ordinal);
                }
            }
        }
        chunks
    }
}

/// All chunks of a run, looked up by id, in document order.
#[derive(Debug, Clone, Default)]
pub struct ChunkSet {
    chunks: IndexMap<ChunkId, Chunk>,
}

impl ChunkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunk every document with the given chunker.
    pub fn from_documents(chunker: &dyn Chunker, documents: &[Document]) -> Self {
        let mut set = Self::new();
        for document in documents {
            for chunk in chunker.chunk(document) {
                set.chunks.insert(chunk.id.clone(), chunk);
            }
        }
        set
    }

    pub fn get(&self, id: &ChunkId) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_chunking_ordinals() {
        let doc = Document::new("guide", "First paragraph.\n\nSecond paragraph.\n\nThird.");
        let chunks = ParagraphChunker::default().chunk(&doc);

        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i as u32);
            assert_eq!(chunk.document_id, DocumentId::new("guide"));
        }
        assert_eq!(chunks[1].text, "Second paragraph.");
    }

    #[test]
    fn test_heading_prefixes_following_chunks() {
        let doc = Document::new("guide", "# Setup\n\nInstall the tool.\n\nRun it.");
        let chunks = ParagraphChunker::default().chunk(&doc);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("Setup\n"));
        assert!(chunks[1].text.starts_with("Setup\n"));
    }

    #[test]
    fn test_oversized_paragraph_is_split_with_overlap() {
        let words: Vec<String> = (0..250).map(|i| format!("w{}", i)).collect();
        let doc = Document::new("big", words.join(" "));
        let chunker = ParagraphChunker {
            max_words: 100,
            overlap: 0.2,
        };
        let chunks = chunker.chunk(&doc);

        assert!(chunks.len() >= 3);
        // Overlap: the start of chunk 1 repeats the tail of chunk 0
        assert!(chunks[1].text.starts_with("w80"));
    }

    #[test]
    fn test_full_overlap_still_terminates() {
        let words: Vec<String> = (0..30).map(|i| format!("w{}", i)).collect();
        let doc = Document::new("big", words.join(" "));
        let chunker = ParagraphChunker {
            max_words: 10,
            overlap: 1.0,
        };
        let chunks = chunker.chunk(&doc);

        // Overlap is capped below the window size, so every piece advances
        // by at least one word and the tail is reached
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= 30);
        let last_words: Vec<&str> = chunks.last().unwrap().text.split_whitespace().collect();
        assert_eq!(last_words.last(), Some(&"w29"));
    }

    #[test]
    fn test_chunk_set_lookup() {
        let docs = vec![
            Document::new("a", "One.\n\nTwo."),
            Document::new("b", "Three."),
        ];
        let set = ChunkSet::from_documents(&ParagraphChunker::default(), &docs);

        assert_eq!(set.len(), 3);
        let id = ChunkId::new(&DocumentId::new("b"), 0);
        assert_eq!(set.get(&id).unwrap().text, "Three.");
    }
}
