//! Core traits and types for the document QA pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - `Chunk`, the unit of retrieval and citation
//! - The `DocumentIndex` trait consumed by the retrieval stage
//! - Error types

pub mod chunk;
pub mod error;
pub mod traits;

pub use chunk::{format_chunk_id, parse_chunk_id, Chunk, ChunkRef};
pub use error::{Error, Result};
pub use traits::{DocumentIndex, SearchKind};
