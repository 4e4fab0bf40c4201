use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use vigil_ai::GoogleClient;
use vigil_browser::{CommandPageInspector, PlaywrightTestExecutor};
use vigil_pipeline::{
    ArtifactLayout, Collaborators, ExecutionReport, GenerationReport, LlmTextGenerator,
    Pipeline, PipelineError, RemediationOutcome, MAX_RETRY,
};

use crate::cli_args::Phase;
use crate::startup_config::{VigilConfig, API_KEY_ENV};

/// Runs one phase end to end and maps the result to a process exit code.
///
/// Terminal states, including failed test runs, exit 0 after printing their
/// status line; only fatal errors exit non-zero.
pub fn run_phase(phase: Phase, url: &str) -> ExitCode {
    let config = match VigilConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}: {error:#}", phase.binary_name());
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?phase, workspace = %config.workspace.display(), "starting phase");

    match run_with_config(phase, url, &config) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(error) if error.is_fatal() => {
            tracing::error!(%error, "phase aborted");
            eprintln!("{}: {error}", phase.binary_name());
            ExitCode::FAILURE
        }
        Err(error) => {
            println!("{}", render_error(&error));
            ExitCode::SUCCESS
        }
    }
}

fn run_with_config(
    phase: Phase,
    url: &str,
    config: &VigilConfig,
) -> Result<Vec<String>, PipelineError> {
    let google_config = config.google_config().ok_or_else(|| {
        PipelineError::CollaboratorUnavailable(format!("{API_KEY_ENV} is not set"))
    })?;
    let client = GoogleClient::new(google_config)
        .map_err(|error| PipelineError::CollaboratorUnavailable(error.to_string()))?;
    let generator = LlmTextGenerator::new(Arc::new(client), config.model.clone())?;
    let inspector =
        CommandPageInspector::new(&config.inspect_command, config.page_load_timeout_ms)?;
    let executor = PlaywrightTestExecutor::new(
        &config.test_command,
        &config.workspace,
        config.test_timeout_ms,
    )?
    .with_config(config.playwright_config.clone())
    .with_env("TEST_URL", url);

    let pipeline = Pipeline::new(
        ArtifactLayout::new(&config.workspace),
        Collaborators {
            generator: &generator,
            inspector: &inspector,
            executor: &executor,
        },
    );
    let root = config.workspace.as_path();
    match phase {
        Phase::Generate => Ok(vec![render_generation(&pipeline.generate(url)?, root)]),
        Phase::Execute => Ok(vec![render_execution(&pipeline.execute(None)?, root)]),
        Phase::Run => {
            let report = pipeline.run(url)?;
            Ok(vec![
                render_generation(&report.generation, root),
                render_execution(&report.execution, root),
            ])
        }
    }
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
        .replace('\\', "/")
}

pub fn render_generation(report: &GenerationReport, root: &Path) -> String {
    format!(
        "Generated {} new scenario(s) for {} ({} total): {}",
        report.new_count,
        report.key,
        report.total_count,
        display_relative(&report.document_path, root)
    )
}

pub fn render_execution(report: &ExecutionReport, root: &Path) -> String {
    match report {
        ExecutionReport::Passed { summary_path, .. } => format!(
            "PASSED: all tests passed. Summary: {}",
            display_relative(summary_path, root)
        ),
        ExecutionReport::Remediated { remediation, .. } => match &remediation.outcome {
            RemediationOutcome::NoFailure => {
                "No failures recorded; nothing to remediate.".to_string()
            }
            RemediationOutcome::TargetNotFound {
                detail,
                failure_log,
            } => format!(
                "FAILED: remediation stopped ({detail}). Failure log: {}",
                display_relative(failure_log, root)
            ),
            RemediationOutcome::RetryExhausted {
                attempts,
                summary_path,
            } => format!(
                "FAILED: retry limit reached ({attempts}/{MAX_RETRY}), no retry run. Summary: {}",
                display_relative(summary_path, root)
            ),
            RemediationOutcome::Succeeded {
                attempts,
                summary_path,
                ..
            } => format!(
                "PASSED_AFTER_RETRY: passed after {attempts} retry. Summary: {}",
                display_relative(summary_path, root)
            ),
            RemediationOutcome::Failed {
                attempts,
                summary_path,
                failure_log,
            } => format!(
                "FAILED: still failing after {attempts} retry. Summary: {} Failure log: {}",
                display_relative(summary_path, root),
                display_relative(failure_log, root)
            ),
        },
    }
}

pub fn render_error(error: &PipelineError) -> String {
    match error {
        PipelineError::NoValidScenarios(detail) => format!("No valid scenarios: {detail}"),
        PipelineError::NoValidScript(detail) => format!("No valid script: {detail}"),
        PipelineError::PageLoadTimeout { url, reason } => {
            format!("Page did not load: {url} ({reason})")
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use vigil_pipeline::{
        CleanupReport, ExecutionReport, GenerationReport, PipelineError, RemediationOutcome,
        RemediationReport, ScriptSource,
    };

    use super::{render_error, render_execution, render_generation};

    fn remediated(outcome: RemediationOutcome) -> ExecutionReport {
        ExecutionReport::Remediated {
            key: "login".to_string(),
            script: PathBuf::from("/work/tests/login.spec.js"),
            script_source: ScriptSource::Reused,
            remediation: RemediationReport {
                outcome,
                classification: None,
                script: None,
                fix: None,
            },
        }
    }

    #[test]
    fn unit_generation_line_names_document_relative_to_root() {
        let line = render_generation(
            &GenerationReport {
                key: "Login".to_string(),
                document_path: PathBuf::from("/work/doc/Login_testcases.txt"),
                new_count: 2,
                total_count: 5,
                dropped_duplicates: 1,
                dropped_malformed: 0,
            },
            Path::new("/work"),
        );
        assert_eq!(
            line,
            "Generated 2 new scenario(s) for Login (5 total): doc/Login_testcases.txt"
        );
    }

    #[test]
    fn unit_every_terminal_state_names_a_durable_report() {
        let root = Path::new("/work");
        let summary = PathBuf::from("/work/logs/index.txt");
        let failure_log = PathBuf::from("/work/logs/playwright-failures.log");
        let lines = [
            render_execution(
                &ExecutionReport::Passed {
                    key: "login".to_string(),
                    script: PathBuf::from("/work/tests/login.spec.js"),
                    script_source: ScriptSource::Reused,
                    summary_path: summary.clone(),
                },
                root,
            ),
            render_execution(
                &remediated(RemediationOutcome::Succeeded {
                    attempts: 1,
                    summary_path: summary.clone(),
                    cleanup: CleanupReport::default(),
                }),
                root,
            ),
            render_execution(
                &remediated(RemediationOutcome::Failed {
                    attempts: 1,
                    summary_path: summary.clone(),
                    failure_log: failure_log.clone(),
                }),
                root,
            ),
            render_execution(
                &remediated(RemediationOutcome::RetryExhausted {
                    attempts: 1,
                    summary_path: summary.clone(),
                }),
                root,
            ),
        ];
        for line in &lines {
            assert!(line.contains("logs/index.txt"), "{line}");
        }
        assert!(lines[1].starts_with("PASSED_AFTER_RETRY"));
        assert!(lines[3].contains("retry limit reached (1/1)"));

        let not_found = render_execution(
            &remediated(RemediationOutcome::TargetNotFound {
                detail: "no failing spec file".to_string(),
                failure_log,
            }),
            root,
        );
        assert!(not_found.contains("logs/playwright-failures.log"));
    }

    #[test]
    fn unit_non_fatal_errors_render_as_status_lines() {
        let line = render_error(&PipelineError::PageLoadTimeout {
            url: "https://slow.test".to_string(),
            reason: "30000 ms".to_string(),
        });
        assert_eq!(line, "Page did not load: https://slow.test (30000 ms)");
        assert!(render_error(&PipelineError::NoValidScenarios("empty".to_string()))
            .starts_with("No valid scenarios"));
    }
}
