//! File-backed persistence for the QA service
//!
//! Provides the append-only audit log:
//! - Q&A records, one per freshly answered question (also the answer cache)
//! - Error records for failed answer generation
//!
//! Records are stored as JSON lines in one file per calendar day and kind,
//! e.g. `logs/qa_log_20250114.jsonl` and `logs/error_log_20250114.jsonl`.

pub mod audit;
pub mod error;
pub mod partition;

pub use audit::{same_question, AuditLog, CachedAnswer, ErrorRecord, JsonlAuditLog, QaRecord};
pub use error::PersistenceError;
pub use partition::{PartitionKind, PartitionLayout};

use docqa_config::AuditConfig;

/// Open the audit log described by configuration
///
/// The directory is created lazily on first write; a missing directory reads
/// as an empty cache.
pub fn init(config: &AuditConfig) -> JsonlAuditLog {
    JsonlAuditLog::new(PartitionLayout::from_config(config))
}
