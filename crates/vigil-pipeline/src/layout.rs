use std::path::{Path, PathBuf};

pub const DOCS_DIR: &str = "doc";
pub const SCRIPTS_DIR: &str = "tests";
pub const LOGS_DIR: &str = "logs";
pub const SCREENSHOTS_DIR: &str = "screenshots";
pub const REPORT_DIR: &str = "reports/playwright-report";
pub const TEST_RESULTS_DIR: &str = "test-results";
pub const TEST_DATA_FILE: &str = "testdata/data.txt";

pub const FAILURE_LOG_FILE: &str = "playwright-failures.log";
pub const RETRY_COUNTER_FILE: &str = "retry-count.txt";
pub const DECISION_LOG_FILE: &str = "agent-decisions.log";
pub const SUMMARY_FILE: &str = "index.txt";

pub const SCENARIO_DOCUMENT_SUFFIX: &str = "_testcases.txt";
pub const SCRIPT_SUFFIX: &str = ".spec.js";
pub const BACKUP_SUFFIX: &str = ".backup";

/// Fixed on-disk layout of every artifact, rooted at the project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a root-relative path as it appears in runner logs.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root.join(DOCS_DIR)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(SCRIPTS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join(SCREENSHOTS_DIR)
    }

    pub fn report_dir(&self) -> PathBuf {
        self.root.join(REPORT_DIR)
    }

    pub fn test_results_dir(&self) -> PathBuf {
        self.root.join(TEST_RESULTS_DIR)
    }

    pub fn test_data_path(&self) -> PathBuf {
        self.root.join(TEST_DATA_FILE)
    }

    pub fn scenario_document_path(&self, key: &str) -> PathBuf {
        self.docs_dir()
            .join(format!("{key}{SCENARIO_DOCUMENT_SUFFIX}"))
    }

    /// Script location relative to the root, the form handed to the runner.
    pub fn script_relative_path(&self, key: &str) -> PathBuf {
        Path::new(SCRIPTS_DIR).join(format!("{key}{SCRIPT_SUFFIX}"))
    }

    pub fn script_path(&self, key: &str) -> PathBuf {
        self.root.join(self.script_relative_path(key))
    }

    pub fn backup_path(script_path: &Path) -> PathBuf {
        let mut raw = script_path.as_os_str().to_os_string();
        raw.push(BACKUP_SUFFIX);
        PathBuf::from(raw)
    }

    pub fn failure_log_path(&self) -> PathBuf {
        self.logs_dir().join(FAILURE_LOG_FILE)
    }

    pub fn failure_history_path(&self, stamp: &str) -> PathBuf {
        self.logs_dir().join(format!("failure-history-{stamp}.log"))
    }

    pub fn retry_counter_path(&self) -> PathBuf {
        self.logs_dir().join(RETRY_COUNTER_FILE)
    }

    pub fn decision_log_path(&self) -> PathBuf {
        self.logs_dir().join(DECISION_LOG_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.logs_dir().join(SUMMARY_FILE)
    }
}

/// Extracts the document key from a `<key>_testcases.txt` file name.
pub fn key_from_scenario_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(SCENARIO_DOCUMENT_SUFFIX)
        .filter(|key| !key.is_empty())
}
