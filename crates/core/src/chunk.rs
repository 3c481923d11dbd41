//! Chunk types
//!
//! A chunk is an immutable span of corpus text produced at ingestion time.
//! Chunks are read-only to the request path; the `chunk_id` doubles as the
//! citation label shown to the answer model.

use serde::{Deserialize, Serialize};

/// Label used wherever a chunk has no identifier
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Unit of retrieved text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub content: String,
    /// Source document file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// 1-based page number within the source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Stable identifier, `"<file>, page <p>, chunk <i>"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

impl Chunk {
    /// Create a chunk with content only
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_file: None,
            page_number: None,
            chunk_id: None,
        }
    }

    /// Create a fully identified chunk
    pub fn identified(
        content: impl Into<String>,
        source_file: impl Into<String>,
        page_number: u32,
        index: u32,
    ) -> Self {
        let source_file = source_file.into();
        Self {
            chunk_id: Some(format_chunk_id(&source_file, page_number, index)),
            content: content.into(),
            source_file: Some(source_file),
            page_number: Some(page_number),
        }
    }

    /// Attach an explicit identifier
    pub fn with_chunk_id(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    /// Identifier used as the citation label
    pub fn source_label(&self) -> &str {
        self.chunk_id.as_deref().unwrap_or(UNKNOWN_SOURCE)
    }

    /// Reference form persisted in audit records
    pub fn to_ref(&self) -> ChunkRef {
        ChunkRef {
            chunk_id: self.source_label().to_string(),
            content: self.content.clone(),
        }
    }
}

/// Persisted reference to a chunk (identifier + full text)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub chunk_id: String,
    pub content: String,
}

/// Build the canonical chunk identifier
pub fn format_chunk_id(source_file: &str, page_number: u32, index: u32) -> String {
    format!("{}, page {}, chunk {}", source_file, page_number, index)
}

/// Split a canonical chunk identifier into (file, page, index)
///
/// File names may themselves contain commas, so the split is anchored on the
/// trailing `", page "` and `", chunk "` markers.
pub fn parse_chunk_id(chunk_id: &str) -> Option<(&str, u32, u32)> {
    let (rest, index) = chunk_id.rsplit_once(", chunk ")?;
    let (file, page) = rest.rsplit_once(", page ")?;
    Some((file, page.parse().ok()?, index.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identified_chunk_format() {
        let chunk = Chunk::identified("The model achieves 92% accuracy.", "paper.pdf", 2, 7);
        assert_eq!(chunk.chunk_id.as_deref(), Some("paper.pdf, page 2, chunk 7"));
        assert_eq!(chunk.source_label(), "paper.pdf, page 2, chunk 7");
    }

    #[test]
    fn test_parse_chunk_id_with_commas_in_file() {
        let parsed = parse_chunk_id("smith, jones 2021.pdf, page 12, chunk 0");
        assert_eq!(parsed, Some(("smith, jones 2021.pdf", 12, 0)));
        assert_eq!(parse_chunk_id("not a chunk id"), None);
        assert_eq!(parse_chunk_id("a.pdf, page x, chunk 1"), None);
    }

    #[test]
    fn test_unknown_source_label() {
        let chunk = Chunk::new("orphan text");
        assert_eq!(chunk.source_label(), UNKNOWN_SOURCE);
        assert_eq!(chunk.to_ref().chunk_id, "Unknown");
    }
}
