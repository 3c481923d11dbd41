//! Day-partitioned file layout

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use docqa_config::constants::audit;
use docqa_config::AuditConfig;

/// Record kind, each written to its own partition family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Qa,
    Error,
}

/// Where partitions live and how they are named
#[derive(Debug, Clone)]
pub struct PartitionLayout {
    dir: PathBuf,
    qa_prefix: String,
    error_prefix: String,
}

impl PartitionLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            qa_prefix: audit::QA_PREFIX.to_string(),
            error_prefix: audit::ERROR_PREFIX.to_string(),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.log_dir),
            qa_prefix: config.qa_prefix.clone(),
            error_prefix: config.error_prefix.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn prefix(&self, kind: PartitionKind) -> &str {
        match kind {
            PartitionKind::Qa => &self.qa_prefix,
            PartitionKind::Error => &self.error_prefix,
        }
    }

    /// File name for a kind and day: `<prefix>_YYYYMMDD.jsonl`
    pub fn file_name(&self, kind: PartitionKind, date: NaiveDate) -> String {
        format!(
            "{}_{}.{}",
            self.prefix(kind),
            date.format("%Y%m%d"),
            audit::EXTENSION
        )
    }

    pub fn path(&self, kind: PartitionKind, date: NaiveDate) -> PathBuf {
        self.dir.join(self.file_name(kind, date))
    }

    /// Whether a file name belongs to the given partition family
    pub fn matches(&self, kind: PartitionKind, file_name: &str) -> bool {
        let Some(rest) = file_name.strip_prefix(self.prefix(kind)) else {
            return false;
        };
        let Some(stamp) = rest
            .strip_prefix('_')
            .and_then(|r| r.strip_suffix(&format!(".{}", audit::EXTENSION)))
        else {
            return false;
        };
        stamp.len() == 8 && stamp.bytes().all(|b| b.is_ascii_digit())
    }

    /// Existing partitions of a kind, newest day first
    ///
    /// A missing directory yields no partitions.
    pub fn list_newest_first(&self, kind: PartitionKind) -> std::io::Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| self.matches(kind, name))
            .collect();

        // YYYYMMDD sorts lexically in date order
        names.sort_unstable_by(|a, b| b.cmp(a));

        Ok(names.into_iter().map(|name| self.dir.join(name)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        let layout = PartitionLayout::new("logs");
        let date = NaiveDate::from_ymd_opt(2025, 1, 4).unwrap();
        assert_eq!(layout.file_name(PartitionKind::Qa, date), "qa_log_20250104.jsonl");
        assert_eq!(
            layout.file_name(PartitionKind::Error, date),
            "error_log_20250104.jsonl"
        );
    }

    #[test]
    fn test_matches() {
        let layout = PartitionLayout::new("logs");
        assert!(layout.matches(PartitionKind::Qa, "qa_log_20250104.jsonl"));
        assert!(!layout.matches(PartitionKind::Qa, "error_log_20250104.jsonl"));
        assert!(!layout.matches(PartitionKind::Qa, "qa_log_2025.jsonl"));
        assert!(!layout.matches(PartitionKind::Qa, "qa_log_20250104.jsonl.bak"));
        assert!(layout.matches(PartitionKind::Error, "error_log_20241231.jsonl"));
    }

    #[test]
    fn test_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "qa_log_20240101.jsonl",
            "qa_log_20250301.jsonl",
            "qa_log_20241120.jsonl",
            "error_log_20250302.jsonl",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let layout = PartitionLayout::new(dir.path());
        let files: Vec<String> = layout
            .list_newest_first(PartitionKind::Qa)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            files,
            vec![
                "qa_log_20250301.jsonl",
                "qa_log_20241120.jsonl",
                "qa_log_20240101.jsonl"
            ]
        );
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PartitionLayout::new(dir.path().join("does-not-exist"));
        assert!(layout.list_newest_first(PartitionKind::Qa).unwrap().is_empty());
    }
}
