//! Bounded classify, repair, and retry episode for a failed run.
//!
//! ```text
//! Idle -> Analyzing -> FixDecision -> Retrying -> Succeeded | Failed
//! ```
//!
//! The retry counter is persisted before the runner is invoked, so an
//! interrupted attempt still counts against [`MAX_RETRY`] and repeated
//! invocations can never exceed it.

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use vigil_browser::{ExecutionTarget, TestExecutor};

use crate::artifact_store::{ArtifactStore, RetryCounter};
use crate::classifier::{Classification, FailureClassifier};
use crate::cleanup::{CleanupCoordinator, CleanupReport};
use crate::error::PipelineError;
use crate::generated_text::{looks_like_script, strip_code_fences};
use crate::layout::{SCRIPTS_DIR, SCRIPT_SUFFIX};
use crate::prompts::fix_prompt;
use crate::runner::ExecutionRunner;
use crate::summary::{ExecutionSummary, FinalStatus};
use crate::text_generation::TextGenerator;

/// Retries allowed per failure episode.
pub const MAX_RETRY: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemediationState {
    Idle,
    Analyzing,
    FixDecision,
    Retrying,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixDecision {
    NotRecommended,
    /// Script rewritten; the pre-fix content is at `backup`.
    Applied { backup: PathBuf },
    /// The generated fix did not look like a script; the original was kept.
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// No failure log: nothing to remediate.
    NoFailure,
    /// The failing script could not be identified or no longer exists.
    TargetNotFound {
        detail: String,
        failure_log: PathBuf,
    },
    /// The counter was already at the limit; no run was attempted.
    RetryExhausted {
        attempts: u32,
        summary_path: PathBuf,
    },
    Succeeded {
        attempts: u32,
        summary_path: PathBuf,
        cleanup: CleanupReport,
    },
    Failed {
        attempts: u32,
        summary_path: PathBuf,
        failure_log: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationReport {
    pub outcome: RemediationOutcome,
    pub classification: Option<Classification>,
    pub script: Option<PathBuf>,
    pub fix: Option<FixDecision>,
}

impl RemediationReport {
    fn without_analysis(outcome: RemediationOutcome) -> Self {
        Self {
            outcome,
            classification: None,
            script: None,
            fix: None,
        }
    }
}

pub struct RemediationEngine<'a> {
    store: &'a ArtifactStore,
    generator: &'a dyn TextGenerator,
    executor: &'a dyn TestExecutor,
    max_retry: u32,
}

impl<'a> RemediationEngine<'a> {
    pub fn new(
        store: &'a ArtifactStore,
        generator: &'a dyn TextGenerator,
        executor: &'a dyn TestExecutor,
    ) -> Self {
        Self {
            store,
            generator,
            executor,
            max_retry: MAX_RETRY,
        }
    }

    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn remediate(&self) -> Result<RemediationReport, PipelineError> {
        enter(RemediationState::Idle);
        let Some(raw_log) = self.store.read_failure_log()? else {
            tracing::info!("no failure log, nothing to remediate");
            return Ok(RemediationReport::without_analysis(
                RemediationOutcome::NoFailure,
            ));
        };
        let counter = self.store.read_retry_counter(self.max_retry)?;

        enter(RemediationState::Analyzing);
        let classification = FailureClassifier::new(self.generator).classify(&raw_log)?;
        self.store
            .append_decision(&classification.decision_log_entry(&decision_timestamp()))?;

        let script = match self.locate_target(&raw_log) {
            Ok(script) => script,
            Err(detail) => {
                tracing::warn!(%detail, "remediation target not found");
                return Ok(RemediationReport {
                    outcome: RemediationOutcome::TargetNotFound {
                        detail,
                        failure_log: self.store.layout().failure_log_path(),
                    },
                    classification: Some(classification),
                    script: None,
                    fix: None,
                });
            }
        };

        enter(RemediationState::FixDecision);
        let fix = if classification.verdict.fix_recommended {
            self.apply_fix(&script, &raw_log)?
        } else {
            tracing::info!(script = %script.display(), "fix not recommended, keeping script");
            FixDecision::NotRecommended
        };

        let outcome = if counter.has_reached(self.max_retry) {
            self.retry_exhausted(counter, &classification)?
        } else {
            self.retry(counter, &classification)?
        };
        Ok(RemediationReport {
            outcome,
            classification: Some(classification),
            script: Some(script),
            fix: Some(fix),
        })
    }

    /// Finds the failing script named in the runner log, resolved under the
    /// workspace root.
    fn locate_target(&self, raw_log: &str) -> Result<PathBuf, String> {
        let relative = find_script_reference(raw_log)
            .ok_or_else(|| "no failing spec file is named in the failure log".to_string())?;
        let path = self.store.layout().resolve(Path::new(&relative));
        if !path.is_file() {
            return Err(format!("spec file does not exist: {relative}"));
        }
        tracing::info!(script = %relative, "located failing script");
        Ok(path)
    }

    fn apply_fix(&self, script: &Path, raw_log: &str) -> Result<FixDecision, PipelineError> {
        let current = self.store.read(script)?;
        let fixed = strip_code_fences(&self.generator.generate(&fix_prompt(raw_log, &current))?);
        if !looks_like_script(&fixed) {
            let reason = "generated fix lacks a test( call or an import".to_string();
            tracing::warn!(script = %script.display(), %reason, "rejecting generated fix");
            return Ok(FixDecision::Rejected { reason });
        }
        let backup = self.store.write_backup(script, &current)?;
        self.store.write_script(script, &fixed)?;
        tracing::info!(
            script = %script.display(),
            backup = %backup.display(),
            "script rewritten"
        );
        Ok(FixDecision::Applied { backup })
    }

    fn retry_exhausted(
        &self,
        counter: RetryCounter,
        classification: &Classification,
    ) -> Result<RemediationOutcome, PipelineError> {
        tracing::warn!(
            attempts = counter.value(),
            max_retry = self.max_retry,
            "retry budget exhausted"
        );
        enter(RemediationState::Failed);
        let summary_path = self.store.write_summary(&ExecutionSummary {
            retry_attempts_used: counter.value(),
            final_status: FinalStatus::Failed,
            analysis: classification.analysis.clone(),
            retry_output: None,
        })?;
        Ok(RemediationOutcome::RetryExhausted {
            attempts: counter.value(),
            summary_path,
        })
    }

    fn retry(
        &self,
        counter: RetryCounter,
        classification: &Classification,
    ) -> Result<RemediationOutcome, PipelineError> {
        enter(RemediationState::Retrying);
        let attempt = counter.incremented();
        self.store.write_retry_counter(attempt)?;
        let result = ExecutionRunner::new(self.executor).run(&ExecutionTarget::LastFailed)?;

        if result.success {
            enter(RemediationState::Succeeded);
            self.store.clear_failure_episode()?;
            let summary_path = self.store.write_summary(&ExecutionSummary {
                retry_attempts_used: attempt.value(),
                final_status: FinalStatus::PassedAfterRetry,
                analysis: classification.analysis.clone(),
                retry_output: None,
            })?;
            let cleanup = CleanupCoordinator::new(self.store).cleanup()?;
            return Ok(RemediationOutcome::Succeeded {
                attempts: attempt.value(),
                summary_path,
                cleanup,
            });
        }

        enter(RemediationState::Failed);
        self.store.append_retry_output(&result.raw_log)?;
        let summary_path = self.store.write_summary(&ExecutionSummary {
            retry_attempts_used: attempt.value(),
            final_status: FinalStatus::Failed,
            analysis: classification.analysis.clone(),
            retry_output: Some(result.raw_log),
        })?;
        Ok(RemediationOutcome::Failed {
            attempts: attempt.value(),
            summary_path,
            failure_log: self.store.layout().failure_log_path(),
        })
    }
}

fn enter(state: RemediationState) {
    tracing::debug!(?state, "remediation state");
}

fn decision_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// First `tests/<...>.spec.js` reference in a runner log, with `/`
/// separators. References that climb out of the workspace are ignored.
pub fn find_script_reference(raw_log: &str) -> Option<String> {
    let pattern = format!(
        r"{}[\\/][^\s]+{}",
        regex::escape(SCRIPTS_DIR),
        regex::escape(SCRIPT_SUFFIX)
    );
    let pattern = Regex::new(&pattern).ok()?;
    let reference = pattern
        .find_iter(raw_log)
        .map(|found| found.as_str().replace('\\', "/"))
        .find(|candidate| {
            Path::new(candidate)
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        });
    reference
}
