//! Trait seams between the pipeline and its collaborators

mod index;

pub use index::{DocumentIndex, SearchKind};
