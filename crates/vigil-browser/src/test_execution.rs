use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::process::{parse_command_line, run_captured, CommandLine};

pub const DEFAULT_TEST_COMMAND: &str = "npx playwright test";

/// What the runner should execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    Script(PathBuf),
    /// Only the tests that failed in the runner's previous invocation.
    LastFailed,
}

impl ExecutionTarget {
    pub fn label(&self) -> String {
        match self {
            Self::Script(path) => path.display().to_string(),
            Self::LastFailed => "last-failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub combined_output: String,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("invalid test executor command: {0}")]
    InvalidCommand(String),
    #[error("failed to launch test executor '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Trait contract for the test-execution collaborator.
///
/// A failing suite is an `Ok` outcome with `success == false`; `Err` is
/// reserved for failures to invoke the runner at all.
pub trait TestExecutor {
    fn execute(&self, target: &ExecutionTarget) -> Result<ExecutionOutcome, ExecutorError>;
}

/// Playwright test runner invoked as a child process.
#[derive(Debug, Clone)]
pub struct PlaywrightTestExecutor {
    command: CommandLine,
    working_dir: PathBuf,
    config_path: Option<String>,
    envs: Vec<(String, String)>,
    timeout_ms: u64,
}

impl PlaywrightTestExecutor {
    pub fn new(
        command: &str,
        working_dir: impl Into<PathBuf>,
        timeout_ms: u64,
    ) -> Result<Self, ExecutorError> {
        let command = parse_command_line(command).map_err(ExecutorError::InvalidCommand)?;
        Ok(Self {
            command,
            working_dir: working_dir.into(),
            config_path: None,
            envs: Vec::new(),
            timeout_ms: timeout_ms.max(1),
        })
    }

    pub fn with_config(mut self, config_path: impl Into<String>) -> Self {
        let config_path = config_path.into();
        self.config_path = if config_path.trim().is_empty() {
            None
        } else {
            Some(config_path)
        };
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn target_args(&self, target: &ExecutionTarget) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config_path) = &self.config_path {
            args.push(format!("--config={config_path}"));
        }
        match target {
            ExecutionTarget::Script(path) => args.push(path.to_string_lossy().replace('\\', "/")),
            ExecutionTarget::LastFailed => args.push("--last-failed".to_string()),
        }
        args
    }
}

impl TestExecutor for PlaywrightTestExecutor {
    fn execute(&self, target: &ExecutionTarget) -> Result<ExecutionOutcome, ExecutorError> {
        let args = self.target_args(target);
        tracing::info!(
            command = %self.command.render(),
            target = %target.label(),
            "running test suite"
        );
        let output = run_captured(
            &self.command,
            &args,
            Some(&self.working_dir),
            &self.envs,
            Duration::from_millis(self.timeout_ms),
        )
        .map_err(|source| ExecutorError::Launch {
            command: self.command.render(),
            source,
        })?;

        let mut combined_output = output.combined();
        if output.timed_out {
            combined_output.push_str(&format!(
                "\n[vigil] test execution timed out after {} ms\n",
                self.timeout_ms
            ));
        }
        Ok(ExecutionOutcome {
            success: output.succeeded(),
            exit_code: output.exit_code(),
            timed_out: output.timed_out,
            combined_output,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{ExecutionTarget, ExecutorError, PlaywrightTestExecutor, TestExecutor};

    #[cfg(unix)]
    fn write_executable(path: &std::path::Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        std::fs::write(path, body).expect("write script");
        let mut perms = std::fs::metadata(path).expect("stat").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).expect("chmod");
    }

    #[test]
    fn unit_target_args_include_config_and_selection() {
        let executor = PlaywrightTestExecutor::new("npx playwright test", ".", 1_000)
            .expect("executor")
            .with_config("playwright.config.js");
        assert_eq!(
            executor.target_args(&ExecutionTarget::Script(PathBuf::from("tests/login.spec.js"))),
            vec!["--config=playwright.config.js", "tests/login.spec.js"]
        );
        assert_eq!(
            executor.target_args(&ExecutionTarget::LastFailed),
            vec!["--config=playwright.config.js", "--last-failed"]
        );
    }

    #[test]
    fn unit_blank_config_path_is_ignored() {
        let executor = PlaywrightTestExecutor::new("npx playwright test", ".", 1_000)
            .expect("executor")
            .with_config("  ");
        assert_eq!(
            executor.target_args(&ExecutionTarget::LastFailed),
            vec!["--last-failed"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn functional_failing_suite_is_an_outcome_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = temp.path().join("fake-playwright.sh");
        write_executable(
            &runner,
            "#!/usr/bin/env bash\necho \"running $1 against $TEST_URL\"\necho '1 failed' >&2\nexit 1\n",
        );

        let executor = PlaywrightTestExecutor::new(&runner.to_string_lossy(), temp.path(), 10_000)
            .expect("executor")
            .with_env("TEST_URL", "https://example.test/");
        let outcome = executor
            .execute(&ExecutionTarget::Script(PathBuf::from("tests/a.spec.js")))
            .expect("outcome");
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(1));
        assert!(outcome
            .combined_output
            .contains("running tests/a.spec.js against https://example.test/"));
        assert!(outcome.combined_output.contains("1 failed"));
    }

    #[cfg(unix)]
    #[test]
    fn integration_passing_suite_runs_in_working_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("marker.txt"), "here").expect("marker");
        let runner = temp.path().join("fake-playwright.sh");
        write_executable(&runner, "#!/usr/bin/env bash\ncat marker.txt\n");

        let executor =
            PlaywrightTestExecutor::new(&runner.to_string_lossy(), temp.path(), 10_000)
                .expect("executor");
        let outcome = executor
            .execute(&ExecutionTarget::LastFailed)
            .expect("outcome");
        assert!(outcome.success);
        assert_eq!(outcome.combined_output, "here");
    }

    #[test]
    fn regression_missing_runner_is_a_launch_error() {
        let executor =
            PlaywrightTestExecutor::new("/nonexistent/vigil-playwright", ".", 1_000)
                .expect("executor");
        assert!(matches!(
            executor.execute(&ExecutionTarget::LastFailed),
            Err(ExecutorError::Launch { .. })
        ));
    }
}
