//! The three phases a user invokes: generate, execute, and run.

use std::path::PathBuf;

use chrono::Utc;
use vigil_browser::{ExecutionTarget, PageInspector, TestExecutor};

use crate::artifact_store::ArtifactStore;
use crate::error::PipelineError;
use crate::layout::ArtifactLayout;
use crate::remediation::{RemediationEngine, RemediationReport, MAX_RETRY};
use crate::runner::ExecutionRunner;
use crate::scenario_generator::{GenerationReport, ScenarioGenerator};
use crate::summary::ExecutionSummary;
use crate::synthesizer::ScriptSynthesizer;
use crate::text_generation::TextGenerator;

const FAILURE_LOG_RULE: &str = "========================================";

/// Injected capabilities; fakes in tests, process and HTTP adapters in the
/// binaries.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub generator: &'a dyn TextGenerator,
    pub inspector: &'a dyn PageInspector,
    pub executor: &'a dyn TestExecutor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    Reused,
    Synthesized { test_count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionReport {
    Passed {
        key: String,
        script: PathBuf,
        script_source: ScriptSource,
        summary_path: PathBuf,
    },
    Remediated {
        key: String,
        script: PathBuf,
        script_source: ScriptSource,
        remediation: RemediationReport,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub generation: GenerationReport,
    pub execution: ExecutionReport,
}

pub struct Pipeline<'a> {
    store: ArtifactStore,
    collaborators: Collaborators<'a>,
    max_retry: u32,
}

impl<'a> Pipeline<'a> {
    pub fn new(layout: ArtifactLayout, collaborators: Collaborators<'a>) -> Self {
        Self {
            store: ArtifactStore::new(layout),
            collaborators,
            max_retry: MAX_RETRY,
        }
    }

    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn generate(&self, url: &str) -> Result<GenerationReport, PipelineError> {
        ScenarioGenerator::new(
            &self.store,
            self.collaborators.inspector,
            self.collaborators.generator,
        )
        .generate(url)
    }

    /// Runs the script for `key`, or for the most recently written scenario
    /// document when no key is given, and remediates a failure.
    pub fn execute(&self, key: Option<&str>) -> Result<ExecutionReport, PipelineError> {
        self.prepare_workspace()?;
        let key = self.select_key(key)?;
        let (script, script_source) = self.ensure_script(&key)?;

        let relative = self.store.layout().script_relative_path(&key);
        let result = ExecutionRunner::new(self.collaborators.executor)
            .run(&ExecutionTarget::Script(relative))?;

        if result.success {
            self.store.clear_failure_episode()?;
            let summary_path = self.store.write_summary(&ExecutionSummary::passed())?;
            tracing::info!(%key, "all tests passed");
            return Ok(ExecutionReport::Passed {
                key,
                script,
                script_source,
                summary_path,
            });
        }

        let now = Utc::now();
        let entry = format!(
            "\n{FAILURE_LOG_RULE}\nFAILURE LOG\nTimestamp: {}\n{FAILURE_LOG_RULE}\n\n{}\n",
            now.to_rfc3339(),
            result.raw_log
        );
        let failure_log = self
            .store
            .record_failure(&entry, &now.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string())?;
        tracing::warn!(%key, failure_log = %failure_log.display(), "tests failed, remediating");

        let remediation = RemediationEngine::new(
            &self.store,
            self.collaborators.generator,
            self.collaborators.executor,
        )
        .with_max_retry(self.max_retry)
        .remediate()?;
        Ok(ExecutionReport::Remediated {
            key,
            script,
            script_source,
            remediation,
        })
    }

    /// Generates scenarios for `url`, then executes the document they landed in.
    pub fn run(&self, url: &str) -> Result<RunReport, PipelineError> {
        let generation = self.generate(url)?;
        let execution = self.execute(Some(&generation.key))?;
        Ok(RunReport {
            generation,
            execution,
        })
    }

    /// Drops reports and runner state left by earlier runs.
    fn prepare_workspace(&self) -> Result<(), PipelineError> {
        let layout = self.store.layout();
        self.store.delete_dir(&layout.report_dir())?;
        self.store.delete_dir(&layout.screenshots_dir())?;
        self.store.delete_dir(&layout.test_results_dir())?;
        self.store.ensure_directories()?;
        Ok(())
    }

    fn select_key(&self, key: Option<&str>) -> Result<String, PipelineError> {
        if let Some(key) = key {
            if self.store.read_scenario_document(key)?.is_none() {
                return Err(PipelineError::NoValidScenarios(format!(
                    "no scenario document for '{key}'"
                )));
            }
            return Ok(key.to_string());
        }
        self.store.latest_scenario_key()?.ok_or_else(|| {
            PipelineError::NoValidScenarios(format!(
                "no scenario documents in {}",
                self.store.layout().docs_dir().display()
            ))
        })
    }

    fn ensure_script(&self, key: &str) -> Result<(PathBuf, ScriptSource), PipelineError> {
        let script = self.store.layout().script_path(key);
        if self.store.exists(&script) {
            tracing::info!(script = %script.display(), "reusing existing script");
            return Ok((script, ScriptSource::Reused));
        }

        let document = self.store.read_scenario_document(key)?.unwrap_or_default();
        let artifact =
            ScriptSynthesizer::new(self.collaborators.generator).synthesize(key, &document)?;
        self.store.write_script(&script, &artifact.content)?;
        tracing::info!(
            script = %script.display(),
            tests = artifact.test_count,
            strategy = ?artifact.strategy,
            "script written"
        );
        Ok((
            script,
            ScriptSource::Synthesized {
                test_count: artifact.test_count,
            },
        ))
    }
}
