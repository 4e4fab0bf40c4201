use std::path::PathBuf;

use anyhow::Result;

use crate::artifact_store::ArtifactStore;
use crate::layout::SUMMARY_FILE;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
}

/// Clears the artifacts of a recovered failure episode, keeping only the
/// execution summary.
pub struct CleanupCoordinator<'a> {
    store: &'a ArtifactStore,
}

impl<'a> CleanupCoordinator<'a> {
    pub fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    pub fn cleanup(&self) -> Result<CleanupReport> {
        let layout = self.store.layout();
        let mut report = CleanupReport::default();

        let screenshots = layout.screenshots_dir();
        if screenshots.exists() {
            self.store.delete_dir(&screenshots)?;
            report.removed.push(screenshots);
        }

        for path in self.store.log_entries()? {
            if path.file_name().is_some_and(|name| name == SUMMARY_FILE) {
                continue;
            }
            self.store.delete_path(&path)?;
            report.removed.push(path);
        }

        report.removed.sort();
        tracing::info!(removed = report.removed.len(), "cleanup finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::CleanupCoordinator;
    use crate::artifact_store::{ArtifactStore, RetryCounter};
    use crate::layout::ArtifactLayout;
    use crate::summary::ExecutionSummary;

    #[test]
    fn functional_cleanup_keeps_only_summary_and_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(ArtifactLayout::new(temp.path()));
        store.ensure_directories().expect("dirs");
        store.record_failure("boom", "stamp").expect("failure");
        store.write_retry_counter(RetryCounter::new(1)).expect("counter");
        store.append_decision("decision").expect("decision");
        store
            .write(&store.layout().screenshots_dir().join("a.png"), "png")
            .expect("screenshot");
        let summary_path = store.write_summary(&ExecutionSummary::passed()).expect("summary");

        let report = CleanupCoordinator::new(&store).cleanup().expect("cleanup");
        assert_eq!(report.removed.len(), 5);
        assert!(!store.layout().screenshots_dir().exists());
        let remaining = std::fs::read_dir(store.layout().logs_dir())
            .expect("logs")
            .map(|entry| entry.expect("entry").path())
            .collect::<Vec<_>>();
        assert_eq!(remaining, vec![summary_path]);

        let again = CleanupCoordinator::new(&store).cleanup().expect("cleanup again");
        assert!(again.removed.is_empty());
    }

    #[test]
    fn unit_cleanup_without_directories_is_a_no_op() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(ArtifactLayout::new(temp.path()));
        let report = CleanupCoordinator::new(&store).cleanup().expect("cleanup");
        assert!(report.removed.is_empty());
    }
}
