use vigil_browser::{ExecutionTarget, TestExecutor};

use crate::error::PipelineError;

/// A finished run. A failing suite is a result, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub raw_log: String,
}

pub struct ExecutionRunner<'a> {
    executor: &'a dyn TestExecutor,
}

impl<'a> ExecutionRunner<'a> {
    pub fn new(executor: &'a dyn TestExecutor) -> Self {
        Self { executor }
    }

    pub fn run(&self, target: &ExecutionTarget) -> Result<ExecutionResult, PipelineError> {
        let outcome = self.executor.execute(target)?;
        if outcome.timed_out {
            tracing::warn!(target = %target.label(), "test execution timed out");
        }
        tracing::info!(
            target = %target.label(),
            success = outcome.success,
            exit_code = ?outcome.exit_code,
            "test execution finished"
        );
        Ok(ExecutionResult {
            success: outcome.success,
            raw_log: outcome.combined_output,
        })
    }
}
