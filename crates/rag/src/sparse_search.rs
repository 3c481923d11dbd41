//! Sparse Search using Tantivy (BM25)
//!
//! Provides keyword-based search for hybrid retrieval. Questions arrive as
//! free text, so the query string is parsed leniently: stray quotes, colons
//! or parentheses degrade to plain terms instead of failing the request.

use std::path::Path;

use docqa_core::Chunk;
use parking_lot::Mutex;
use tantivy::{
    collector::TopDocs,
    query::QueryParser,
    schema::{
        Field, IndexRecordOption, OwnedValue, Schema, TextFieldIndexing, TextOptions, STORED,
        STRING,
    },
    tokenizer::{Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer},
    Index, IndexReader, IndexWriter, TantivyDocument,
};

use crate::RagError;

const TOKENIZER_NAME: &str = "corpus";
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Sparse search configuration
#[derive(Debug, Clone)]
pub struct SparseConfig {
    /// Index path (use RAM if None)
    pub index_path: Option<String>,
    /// Enable English stemming
    pub stemming: bool,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            stemming: true,
        }
    }
}

struct Fields {
    chunk_id: Field,
    content: Field,
    source_file: Field,
    page_number: Field,
}

/// Sparse index for BM25 search
pub struct SparseIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<Option<IndexWriter>>,
    fields: Fields,
}

impl SparseIndex {
    /// Open (or create) the index described by `config`
    pub fn new(config: SparseConfig) -> Result<Self, RagError> {
        let mut schema_builder = Schema::builder();

        let text_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(TOKENIZER_NAME)
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        let fields = Fields {
            chunk_id: schema_builder.add_text_field("chunk_id", STRING | STORED),
            content: schema_builder.add_text_field("content", text_options),
            source_file: schema_builder.add_text_field("source_file", STRING | STORED),
            page_number: schema_builder.add_u64_field("page_number", STORED),
        };

        let schema = schema_builder.build();

        let index = match config.index_path {
            Some(ref path) => {
                std::fs::create_dir_all(path).map_err(|e| RagError::Index(e.to_string()))?;
                let dir = tantivy::directory::MmapDirectory::open(Path::new(path))
                    .map_err(|e| RagError::Index(e.to_string()))?;
                Index::open_or_create(dir, schema).map_err(|e| RagError::Index(e.to_string()))?
            },
            None => Index::create_in_ram(schema),
        };

        index
            .tokenizers()
            .register(TOKENIZER_NAME, Self::build_tokenizer(&config));

        let reader = index.reader().map_err(|e| RagError::Index(e.to_string()))?;

        tracing::info!(
            path = ?config.index_path,
            stemming = config.stemming,
            docs = reader.searcher().num_docs(),
            "Sparse index opened"
        );

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(None),
            fields,
        })
    }

    fn build_tokenizer(config: &SparseConfig) -> TextAnalyzer {
        let base = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(100))
            .filter(LowerCaser);

        if config.stemming {
            base.filter(Stemmer::new(Language::English)).build()
        } else {
            base.build()
        }
    }

    /// Add chunks and commit
    ///
    /// The writer is created on first use, so a read-only deployment never
    /// takes the index lock.
    pub fn index_chunks(&self, chunks: &[Chunk]) -> Result<(), RagError> {
        let mut guard = self.writer.lock();
        if guard.is_none() {
            let writer = self
                .index
                .writer(WRITER_HEAP_BYTES)
                .map_err(|e| RagError::Index(e.to_string()))?;
            *guard = Some(writer);
        }
        let writer = guard
            .as_mut()
            .ok_or_else(|| RagError::Index("Writer not available".to_string()))?;

        for chunk in chunks {
            let mut doc = TantivyDocument::default();
            doc.add_text(self.fields.content, &chunk.content);

            if let Some(ref chunk_id) = chunk.chunk_id {
                doc.add_text(self.fields.chunk_id, chunk_id);
            }
            if let Some(ref source_file) = chunk.source_file {
                doc.add_text(self.fields.source_file, source_file);
            }
            if let Some(page) = chunk.page_number {
                doc.add_u64(self.fields.page_number, u64::from(page));
            }

            writer
                .add_document(doc)
                .map_err(|e| RagError::Index(e.to_string()))?;
        }

        writer
            .commit()
            .map_err(|e| RagError::Index(e.to_string()))?;

        self.reader
            .reload()
            .map_err(|e| RagError::Index(e.to_string()))?;

        Ok(())
    }

    /// BM25 search, best match first
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>, RagError> {
        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.fields.content]);

        let (query, errors) = query_parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "Lenient query parse dropped clauses");
        }

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(top_k))
            .map_err(|e| RagError::Search(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());

        for (_score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| RagError::Search(e.to_string()))?;

            let text = |field: Field| match doc.get_first(field) {
                Some(OwnedValue::Str(s)) => Some(s.to_string()),
                _ => None,
            };

            let page_number = match doc.get_first(self.fields.page_number) {
                Some(OwnedValue::U64(n)) => u32::try_from(*n).ok(),
                _ => None,
            };

            results.push(Chunk {
                content: text(self.fields.content).unwrap_or_default(),
                source_file: text(self.fields.source_file),
                page_number,
                chunk_id: text(self.fields.chunk_id),
            });
        }

        Ok(results)
    }

    /// Get document count
    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Chunk> {
        vec![
            Chunk::identified("The model achieves 92% accuracy.", "paper.pdf", 2, 7),
            Chunk::identified("Training used eight GPUs for three days.", "paper.pdf", 3, 9),
            Chunk::new("Unlabelled appendix text about accuracy metrics."),
        ]
    }

    #[test]
    fn test_sparse_index_create() {
        let index = SparseIndex::new(SparseConfig::default()).unwrap();
        assert_eq!(index.doc_count(), 0);
    }

    #[test]
    fn test_index_and_search() {
        let index = SparseIndex::new(SparseConfig::default()).unwrap();
        index.index_chunks(&corpus()).unwrap();
        assert_eq!(index.doc_count(), 3);

        let results = index.search("GPUs training", 5).unwrap();
        assert!(!results.is_empty());
        assert_eq!(
            results[0].chunk_id.as_deref(),
            Some("paper.pdf, page 3, chunk 9")
        );
        assert_eq!(results[0].source_file.as_deref(), Some("paper.pdf"));
        assert_eq!(results[0].page_number, Some(3));
    }

    #[test]
    fn test_missing_metadata_round_trips_as_none() {
        let index = SparseIndex::new(SparseConfig::default()).unwrap();
        index.index_chunks(&corpus()).unwrap();

        let results = index.search("appendix", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].chunk_id.is_none());
        assert!(results[0].page_number.is_none());
    }

    #[test]
    fn test_punctuation_does_not_fail_search() {
        let index = SparseIndex::new(SparseConfig::default()).unwrap();
        index.index_chunks(&corpus()).unwrap();

        let results = index.search("What accuracy did the model achieve?", 5).unwrap();
        assert!(results
            .iter()
            .any(|c| c.chunk_id.as_deref() == Some("paper.pdf, page 2, chunk 7")));

        assert!(index.search("what (accuracy", 5).is_ok());
        assert!(index.search("\"unbalanced", 5).is_ok());
    }

    #[test]
    fn test_top_k_limits_results() {
        let index = SparseIndex::new(SparseConfig::default()).unwrap();
        index.index_chunks(&corpus()).unwrap();
        assert_eq!(index.search("accuracy", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_on_disk_index_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let config = SparseConfig {
            index_path: Some(dir.path().join("bm25").to_string_lossy().into_owned()),
            ..SparseConfig::default()
        };

        {
            let index = SparseIndex::new(config.clone()).unwrap();
            index.index_chunks(&corpus()).unwrap();
        }

        let reopened = SparseIndex::new(config).unwrap();
        assert_eq!(reopened.doc_count(), 3);
    }
}
