//! Processed-id log — append-only dedup store.
//!
//! One message id per line, UTF-8, flushed per append. Startup loads the
//! whole file into an in-memory set; the file itself is never rewritten,
//! so a crash mid-append can at worst lose the id being written, never
//! corrupt earlier entries. Single writer: only the monitor loop touches
//! this.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::info;

/// Persisted set of already-processed message ids.
#[derive(Debug)]
pub struct ProcessedLog {
    path: PathBuf,
    seen: HashSet<String>,
}

impl ProcessedLog {
    /// Load the log, creating parent directories as needed. A missing file
    /// means a fresh start, not an error.
    pub fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut seen = HashSet::new();
        if path.exists() {
            for line in fs::read_to_string(&path)?.lines() {
                let id = line.trim();
                if !id.is_empty() {
                    seen.insert(id.to_string());
                }
            }
            info!(count = seen.len(), path = %path.display(), "Loaded processed message ids");
        } else {
            info!(path = %path.display(), "No processed-id log found, starting fresh");
        }

        Ok(Self { path, seen })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Append an id to the log and the in-memory set. Idempotent: an id
    /// already in the set is not written again.
    pub fn record(&mut self, id: &str) -> io::Result<()> {
        if self.seen.contains(id) {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{id}")?;
        file.flush()?;
        self.seen.insert(id.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProcessedLog::load(dir.path().join("ids.log")).unwrap();
        assert!(log.is_empty());
        assert!(!log.contains("anything"));
    }

    #[test]
    fn survives_three_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.log");

        for id in ["a", "b", "c"] {
            let mut log = ProcessedLog::load(&path).unwrap();
            log.record(id).unwrap();
        }

        let log = ProcessedLog::load(&path).unwrap();
        assert_eq!(log.len(), 3);
        for id in ["a", "b", "c"] {
            assert!(log.contains(id));
        }
    }

    #[test]
    fn record_is_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.log");

        let mut log = ProcessedLog::load(&path).unwrap();
        log.record("dup").unwrap();
        log.record("dup").unwrap();
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("dup").count(), 1);
    }

    #[test]
    fn blank_lines_are_ignored_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.log");
        std::fs::write(&path, "a\n\n  \nb\n").unwrap();

        let log = ProcessedLog::load(&path).unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.contains("a") && log.contains("b"));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/ids.log");
        let mut log = ProcessedLog::load(&path).unwrap();
        log.record("x").unwrap();
        assert!(path.exists());
    }
}
