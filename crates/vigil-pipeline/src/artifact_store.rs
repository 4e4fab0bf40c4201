//! File-backed persistence for every pipeline artifact.
//!
//! All writes, appends included, go through `vigil_core::write_text_atomic`,
//! so a reader never sees a half-written scenario document, script, log, or
//! counter. Deletes are idempotent.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use vigil_core::{append_text_atomic, write_text_atomic};

use crate::layout::{key_from_scenario_file_name, ArtifactLayout};
use crate::summary::ExecutionSummary;

/// Retries consumed in the current failure episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetryCounter(u32);

impl RetryCounter {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn incremented(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn has_reached(self, max_retry: u32) -> bool {
        self.0 >= max_retry
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    layout: ArtifactLayout,
}

impl ArtifactStore {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    pub fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn read(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    }

    pub fn write(&self, path: &Path, content: &str) -> Result<()> {
        write_text_atomic(path, content)
    }

    pub fn append(&self, path: &Path, content: &str) -> Result<()> {
        append_text_atomic(path, content)
    }

    pub fn delete_file(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => {
                Err(error).with_context(|| format!("failed to delete {}", path.display()))
            }
        }
    }

    pub fn delete_dir(&self, path: &Path) -> Result<()> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => {
                Err(error).with_context(|| format!("failed to delete {}", path.display()))
            }
        }
    }

    /// Deletes a file or a directory tree; missing paths are not an error.
    pub fn delete_path(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            self.delete_dir(path)
        } else {
            self.delete_file(path)
        }
    }

    /// Entries of the logs directory in name order; empty when it is missing.
    pub fn log_entries(&self) -> Result<Vec<PathBuf>> {
        let logs_dir = self.layout.logs_dir();
        let entries = match std::fs::read_dir(&logs_dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to list {}", logs_dir.display()));
            }
        };
        let mut paths = entries
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("failed to list {}", logs_dir.display()))?;
        paths.sort();
        Ok(paths)
    }

    /// Creates the directories every later write assumes.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.layout.scripts_dir(),
            self.layout.logs_dir(),
            self.layout.screenshots_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn read_scenario_document(&self, key: &str) -> Result<Option<String>> {
        self.read_optional(&self.layout.scenario_document_path(key))
    }

    pub fn write_scenario_document(&self, key: &str, content: &str) -> Result<PathBuf> {
        let path = self.layout.scenario_document_path(key);
        self.write(&path, content)?;
        Ok(path)
    }

    /// Most recently modified scenario document key, if any.
    pub fn latest_scenario_key(&self) -> Result<Option<String>> {
        let docs_dir = self.layout.docs_dir();
        let entries = match std::fs::read_dir(&docs_dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to list {}", docs_dir.display()));
            }
        };

        let mut latest: Option<(SystemTime, String)> = None;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", docs_dir.display()))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(key) = key_from_scenario_file_name(&file_name) else {
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .with_context(|| format!("failed to stat {}", entry.path().display()))?;
            let newer = latest
                .as_ref()
                .map_or(true, |(current, _)| modified > *current);
            if newer {
                latest = Some((modified, key.to_string()));
            }
        }
        Ok(latest.map(|(_, key)| key))
    }

    pub fn write_script(&self, path: &Path, content: &str) -> Result<()> {
        self.write(path, content)
    }

    /// Persists the pre-fix script next to the original.
    pub fn write_backup(&self, script_path: &Path, original: &str) -> Result<PathBuf> {
        let backup = ArtifactLayout::backup_path(script_path);
        self.write(&backup, original)?;
        Ok(backup)
    }

    pub fn read_failure_log(&self) -> Result<Option<String>> {
        self.read_optional(&self.layout.failure_log_path())
    }

    /// Opens a failure episode: the current failure log plus an immutable
    /// history copy named after `stamp`.
    pub fn record_failure(&self, entry: &str, stamp: &str) -> Result<PathBuf> {
        let path = self.layout.failure_log_path();
        self.write(&path, entry)?;
        self.write(&self.layout.failure_history_path(stamp), entry)?;
        Ok(path)
    }

    pub fn append_retry_output(&self, output: &str) -> Result<()> {
        self.append(
            &self.layout.failure_log_path(),
            &format!("\n\n=== RETRY FAILED OUTPUT ===\n{output}\n"),
        )
    }

    /// Unparseable counter content counts as exhausted so a corrupted file
    /// can never re-enable retries.
    pub fn read_retry_counter(&self, max_retry: u32) -> Result<RetryCounter> {
        let path = self.layout.retry_counter_path();
        let Some(raw) = self.read_optional(&path)? else {
            return Ok(RetryCounter::default());
        };
        match raw.trim().parse::<u32>() {
            Ok(value) => Ok(RetryCounter::new(value)),
            Err(_) => {
                tracing::warn!(
                    path = %path.display(),
                    content = raw.trim(),
                    "retry counter is unreadable, treating retries as exhausted"
                );
                Ok(RetryCounter::new(max_retry))
            }
        }
    }

    pub fn write_retry_counter(&self, counter: RetryCounter) -> Result<()> {
        self.write(
            &self.layout.retry_counter_path(),
            &counter.value().to_string(),
        )
    }

    /// Closes the failure episode.
    pub fn clear_failure_episode(&self) -> Result<()> {
        self.delete_file(&self.layout.failure_log_path())?;
        self.delete_file(&self.layout.retry_counter_path())
    }

    pub fn append_decision(&self, entry: &str) -> Result<()> {
        self.append(&self.layout.decision_log_path(), entry)
    }

    pub fn write_summary(&self, summary: &ExecutionSummary) -> Result<PathBuf> {
        let path = self.layout.summary_path();
        self.write(&path, &summary.render())?;
        Ok(path)
    }
}
