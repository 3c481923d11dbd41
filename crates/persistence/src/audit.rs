//! Append-only audit log
//!
//! Every freshly answered question is appended as a `QaRecord`; failed
//! generations are appended as an `ErrorRecord` to a separate partition
//! family. Q&A partitions double as the answer cache: `find_answer` scans
//! them newest day first for a case-insensitive, whitespace-trimmed match.
//!
//! Each append is one `write_all` of a complete, newline-terminated line on a
//! file opened in append mode, serialized by an in-process lock, so
//! concurrent requests never interleave partial records. Records are never
//! rewritten or deleted here.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use docqa_core::ChunkRef;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::partition::{PartitionKind, PartitionLayout};
use crate::PersistenceError;

/// One answered question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    /// Local wall-clock time, ISO-8601 without offset
    pub timestamp: NaiveDateTime,
    pub question: String,
    pub rewritten_queries: Vec<String>,
    pub answer: String,
    pub citations: Vec<String>,
    pub reranked_context: Vec<ChunkRef>,
}

impl QaRecord {
    /// Build a record stamped with the current local time
    pub fn now(
        question: impl Into<String>,
        rewritten_queries: Vec<String>,
        answer: impl Into<String>,
        citations: Vec<String>,
        reranked_context: Vec<ChunkRef>,
    ) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            question: question.into(),
            rewritten_queries,
            answer: answer.into(),
            citations,
            reranked_context,
        }
    }
}

/// One failed answer generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub error_type: String,
    pub error_message: String,
    pub question: String,
}

impl ErrorRecord {
    pub fn now(
        error_type: impl Into<String>,
        error_message: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            error_type: error_type.into(),
            error_message: error_message.into(),
            question: question.into(),
        }
    }
}

/// Answer recovered from a prior Q&A record
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CachedAnswer {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Audit log trait
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append a Q&A record to today's partition
    async fn append_qa(&self, record: &QaRecord) -> Result<(), PersistenceError>;

    /// Append an error record to today's error partition
    async fn append_error(&self, record: &ErrorRecord) -> Result<(), PersistenceError>;

    /// Most recent prior answer to an equivalent question
    ///
    /// Unreadable partitions and malformed lines are skipped, so this never
    /// fails; a miss is `None`.
    async fn find_answer(&self, question: &str) -> Option<CachedAnswer>;
}

/// Question equality used by the cache: trimmed, case-insensitive
pub fn same_question(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

struct Inner {
    layout: PartitionLayout,
    write_lock: Mutex<()>,
}

/// JSON-lines audit log on the local filesystem
#[derive(Clone)]
pub struct JsonlAuditLog {
    inner: Arc<Inner>,
}

impl JsonlAuditLog {
    pub fn new(layout: PartitionLayout) -> Self {
        Self {
            inner: Arc::new(Inner {
                layout,
                write_lock: Mutex::new(()),
            }),
        }
    }

    async fn append<T: Serialize>(
        &self,
        kind: PartitionKind,
        timestamp: NaiveDateTime,
        record: &T,
    ) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.append_line(kind, timestamp, &line)).await??;

        Ok(())
    }
}

impl Inner {
    fn append_line(
        &self,
        kind: PartitionKind,
        timestamp: NaiveDateTime,
        line: &str,
    ) -> Result<(), PersistenceError> {
        let path = self.layout.path(kind, timestamp.date());

        let _guard = self.write_lock.lock();
        std::fs::create_dir_all(self.layout.dir())?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }

    fn scan(&self, question: &str) -> Option<CachedAnswer> {
        let partitions = match self.layout.list_newest_first(PartitionKind::Qa) {
            Ok(partitions) => partitions,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    dir = %self.layout.dir().display(),
                    "Could not list audit log directory, treating as empty cache"
                );
                return None;
            },
        };

        for path in partitions {
            match scan_partition(&path, question) {
                Ok(Some(hit)) => return Some(hit),
                Ok(None) => {},
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        file = %path.display(),
                        "Could not read audit log partition, skipping"
                    );
                },
            }
        }

        None
    }
}

/// First matching record in one partition, in file order
fn scan_partition(path: &Path, question: &str) -> std::io::Result<Option<CachedAnswer>> {
    let reader = BufReader::new(File::open(path)?);

    for line in reader.split(b'\n') {
        let line = line?;
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        let entry: CachedAnswer = match serde_json::from_slice(&line) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, file = %path.display(), "Skipping malformed log line");
                continue;
            },
        };

        if same_question(&entry.question, question) {
            return Ok(Some(entry));
        }
    }

    Ok(None)
}

#[async_trait]
impl AuditLog for JsonlAuditLog {
    async fn append_qa(&self, record: &QaRecord) -> Result<(), PersistenceError> {
        self.append(PartitionKind::Qa, record.timestamp, record).await
    }

    async fn append_error(&self, record: &ErrorRecord) -> Result<(), PersistenceError> {
        self.append(PartitionKind::Error, record.timestamp, record).await
    }

    async fn find_answer(&self, question: &str) -> Option<CachedAnswer> {
        let inner = self.inner.clone();
        let question = question.to_string();

        match tokio::task::spawn_blocking(move || inner.scan(&question)).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "Cache scan task failed, treating as miss");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn record(ts: NaiveDateTime, question: &str, answer: &str) -> QaRecord {
        QaRecord {
            timestamp: ts,
            question: question.to_string(),
            rewritten_queries: vec!["q1".into(), "q2".into(), "q3".into()],
            answer: answer.to_string(),
            citations: vec!["paper.pdf, page 2, chunk 7".to_string()],
            reranked_context: vec![ChunkRef {
                chunk_id: "paper.pdf, page 2, chunk 7".to_string(),
                content: "The model achieves 92% accuracy.".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_append_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(PartitionLayout::new(dir.path()));

        log.append_qa(&record(at(2025, 1, 4), "What accuracy?", "92%."))
            .await
            .unwrap();

        let hit = log.find_answer("  what ACCURACY?  ").await.unwrap();
        assert_eq!(hit.answer, "92%.");
        assert_eq!(hit.citations, vec!["paper.pdf, page 2, chunk 7"]);
        assert!(log.find_answer("What accuracy").await.is_none());

        let written =
            std::fs::read_to_string(dir.path().join("qa_log_20250104.jsonl")).unwrap();
        assert_eq!(written.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(value["timestamp"], "2025-01-04T10:30:00");
        assert_eq!(value["reranked_context"][0]["chunk_id"], "paper.pdf, page 2, chunk 7");
    }

    #[tokio::test]
    async fn test_newest_partition_wins() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(PartitionLayout::new(dir.path()));

        log.append_qa(&record(at(2024, 12, 1), "Who wrote it?", "old answer"))
            .await
            .unwrap();
        log.append_qa(&record(at(2025, 2, 1), "who wrote it?", "new answer"))
            .await
            .unwrap();

        let hit = log.find_answer("Who wrote it?").await.unwrap();
        assert_eq!(hit.answer, "new answer");
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("qa_log_20250105.jsonl"),
            b"{not json\n\xff\xfe garbage\n\n{\"question\": \"Q\", \"answer\": \"A\", \"citations\": []}\n",
        )
        .unwrap();

        let log = JsonlAuditLog::new(PartitionLayout::new(dir.path()));
        let hit = log.find_answer("q").await.unwrap();
        assert_eq!(hit.answer, "A");
        assert!(hit.citations.is_empty());
    }

    #[tokio::test]
    async fn test_error_records_are_not_cache_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(PartitionLayout::new(dir.path()));

        let mut error = ErrorRecord::now("TimeoutError", "Timeout", "What accuracy?");
        error.timestamp = at(2025, 1, 4);
        log.append_error(&error).await.unwrap();

        assert!(dir.path().join("error_log_20250104.jsonl").exists());
        assert!(log.find_answer("What accuracy?").await.is_none());
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(PartitionLayout::new(dir.path().join("nope")));
        assert!(log.find_answer("anything").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_stay_line_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(PartitionLayout::new(dir.path()));
        let big = "x".repeat(64 * 1024);

        let mut handles = Vec::new();
        for i in 0..16 {
            let log = log.clone();
            let answer = format!("{}-{}", i, big);
            handles.push(tokio::spawn(async move {
                log.append_qa(&record(at(2025, 3, 3), &format!("q{}", i), &answer))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let written =
            std::fs::read_to_string(dir.path().join("qa_log_20250303.jsonl")).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 16);
        for line in lines {
            let parsed: QaRecord = serde_json::from_str(line).unwrap();
            assert!(parsed.answer.ends_with(&big));
        }
    }

    #[test]
    fn test_same_question() {
        assert!(same_question(" Hello World ", "hello world"));
        assert!(!same_question("hello  world", "hello world"));
    }
}
